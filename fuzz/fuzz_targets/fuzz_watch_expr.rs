#![no_main]

use libfuzzer_sys::fuzz_target;
use stout::Watch;

// Fuzz target for the watch expression grammar
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(watch) = text.parse::<Watch>() {
        // whatever parses must round-trip through its display form
        let again: Watch = watch.to_string().parse().expect("display must re-parse");
        assert_eq!(again, watch);
    }
});
