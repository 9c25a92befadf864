#![no_main]

use libfuzzer_sys::fuzz_target;
use perfrepo_report::ReportConfig;
use std::collections::BTreeMap;

fuzz_target!(|properties: BTreeMap<String, String>| {
    // decoding is lenient and never fails, whatever the stored map holds
    let config = ReportConfig::decode(&properties);
    // once decoded, a configuration survives the store round trip unchanged
    let reread = ReportConfig::decode(&config.encode());
    assert_eq!(reread, config);
});
