#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Tag expressions come straight from user input - only attempt if valid UTF-8
    if let Ok(s) = std::str::from_utf8(data) {
        let query = perfrepo_store::TagQuery::parse(s);
        // every retained token is folded and non-empty
        for tag in query.included.iter().chain(query.excluded.iter()) {
            assert!(!tag.is_empty());
            assert_eq!(*tag, tag.to_lowercase());
        }
    }
});
