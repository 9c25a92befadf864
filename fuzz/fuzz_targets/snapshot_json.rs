#![no_main]

use libfuzzer_sys::fuzz_target;
use perfrepo_store::Repository;
use perfrepo_types::Snapshot;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(snapshot) = serde_json::from_str::<Snapshot>(text) else {
        return;
    };
    let Ok(repo) = Repository::from_snapshot(snapshot) else {
        return;
    };

    // a loaded store emits a canonical snapshot: loading that snapshot
    // again must be lossless
    let first = repo.snapshot().expect("snapshot of a fresh store");
    let reloaded = Repository::from_snapshot(first.clone()).expect("canonical snapshot loads");
    let second = reloaded.snapshot().expect("snapshot of the reloaded store");
    assert_eq!(second, first);
});
