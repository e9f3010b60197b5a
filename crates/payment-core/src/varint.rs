//! Unsigned LEB128 as used by Monero for output indices in derivation hashes.

pub fn write(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    write(value, &mut out);
    out
}

/// Decode one varint from the front of `input`, returning the value and the
/// number of bytes consumed. `None` if the input ends mid-value or the value
/// does not fit in 64 bits.
pub fn decode(input: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in input.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift >= 64 {
            return None;
        }
        let bits = u64::from(byte & 0x7F);
        if shift > 0 && bits >> (64 - shift) != 0 {
            return None;
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
