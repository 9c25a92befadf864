#![no_main]

use libfuzzer_sys::fuzz_target;
use perfrepo_store::LikePattern;

fuzz_target!(|input: (String, String, bool)| {
    let (pattern, probe, case_insensitive) = input;
    // compilation may reject the pattern, matching must never panic
    if let Ok(like) = LikePattern::new(&pattern, case_insensitive) {
        let _ = like.matches(&probe);
    }
});
