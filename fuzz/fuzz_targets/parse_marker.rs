#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_core::event::{marker_name, parse_marker_name};

fuzz_target!(|data: &[u8]| {
    let Ok(name) = std::str::from_utf8(data) else {
        return;
    };
    if let Some(window) = parse_marker_name(name) {
        assert_eq!(window.rem_euclid(60), 0);
        assert!(parse_marker_name(&marker_name(window, 0)).is_some());
    }
});
