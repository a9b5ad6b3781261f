#![no_main]

use libfuzzer_sys::fuzz_target;
use realmgate::protocol::realm::decode;

fuzz_target!(|data: &[u8]| {
    // Fuzz realm body decoding - malformed bodies must be errors, never panics
    if let Some((&opcode, body)) = data.split_first() {
        let _ = decode(opcode, body);
    }
});
