#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use realmgate::core::codec::FrameCodec;
use realmgate::core::framer::TransportFramer;
use realmgate::core::packet::REALM_MARKER;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size so split points vary between runs
    let Some((&chunk, stream)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk.max(1));

    let mut framer = TransportFramer::new(REALM_MARKER);
    let mut framed = Vec::new();
    for piece in stream.chunks(chunk) {
        framer.feed(piece);
        while let Some(next) = framer.next_packet() {
            match next {
                Ok(packet) => framed.push(packet),
                Err(_) => break,
            }
        }
    }

    // The codec must agree with the framer on the same bytes
    let mut codec = FrameCodec::new(REALM_MARKER);
    let mut buf = BytesMut::from(stream);
    let mut decoded = Vec::new();
    while let Ok(Some(packet)) = codec.decode(&mut buf) {
        decoded.push(packet);
    }
    assert_eq!(framed, decoded);
});
