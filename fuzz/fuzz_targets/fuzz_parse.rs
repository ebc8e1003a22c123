#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target focusing on datagram parsing edge cases
fuzz_target!(|data: &[u8]| {
    let Ok(event) = stout::parse(data) else {
        return;
    };

    // anything the parser accepts must survive a reformat verbatim
    let line = stout::format_counter(&event.name, event.value);
    let again = stout::parse(line.as_bytes()).expect("formatted datagram must parse");
    assert_eq!(again.name, event.name);
    assert_eq!(again.value, event.value);
});
