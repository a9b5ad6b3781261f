#![no_main]

use libfuzzer_sys::fuzz_target;
use realmgate::protocol::game::decode;
use realmgate::protocol::game::stat_string;
use realmgate::service::join_gate::JoinGate;

fuzz_target!(|data: &[u8]| {
    if let Some((&opcode, body)) = data.split_first() {
        let _ = decode(opcode, body);
    }

    // Whole stream through the join gate
    let mut gate = JoinGate::new();
    let _ = gate.on_bytes(data);

    let _ = stat_string::decode(data);
});
