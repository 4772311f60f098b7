#![no_main]
use afc_core::BoardCommand;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u16, [u16; 4])| {
    let raw = BoardCommand::new(input.0, input.1);
    let _ = afc_core::Command::try_from(raw);
});
