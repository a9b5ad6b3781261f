//! Stat string coding used in game advertisements.
//!
//! The raw stat block contains zero bytes, which would terminate the string on
//! the wire. Encoding makes every byte odd and records, per group of up to
//! seven bytes, which ones were already odd in a leading mask byte.
//!
//! ```text
//! [Mask] [b0] [b1] ... [b6] [Mask] [b7] ...
//! ```
//! Mask bit 0 is always set; bit `n + 1` set means byte `n` of the group was
//! odd and stored unchanged, clear means it was even and stored plus one.

/// Encodes a raw stat block.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 7 + 1);
    for group in data.chunks(7) {
        let mut mask = 1u8;
        let mask_at = out.len();
        out.push(0);
        for (i, &byte) in group.iter().enumerate() {
            if byte % 2 == 0 {
                out.push(byte + 1);
            } else {
                out.push(byte);
                mask |= 1 << (i + 1);
            }
        }
        out[mask_at] = mask;
    }
    out
}

/// Reverses [`encode`]. A trailing mask byte with no data is ignored.
pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for group in data.chunks(8) {
        let Some((&mask, bytes)) = group.split_first() else {
            continue;
        };
        for (i, &byte) in bytes.iter().enumerate() {
            if mask & (1 << (i + 1)) == 0 {
                out.push(byte.wrapping_sub(1));
            } else {
                out.push(byte);
            }
        }
    }
    out
}
