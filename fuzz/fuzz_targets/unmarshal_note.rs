#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_core::note::CommitNote;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(note) = CommitNote::unmarshal(text) {
        let _ = note.marshal();
        let _ = note.ranked();
    }
});
