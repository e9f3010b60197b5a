//! Monero's block-based Base58.
//!
//! Input is split into 8-byte blocks, each encoded independently into a
//! fixed number of symbols (11 for a full block). Unlike Bitcoin's Base58 the
//! output length depends only on the input length.

use crate::error::{Error, Result};

pub const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;

/// Encoded symbol count for each raw block size 0..=8.
const ENCODED_BLOCK_SIZES: [usize; FULL_BLOCK_SIZE + 1] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

const INVALID: u8 = 0xFF;

const DECODE_TABLE: [u8; 128] = {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Raw byte count for an encoded block of `len` symbols, if that length is legal.
fn decoded_block_size(len: usize) -> Option<usize> {
    ENCODED_BLOCK_SIZES.iter().position(|&size| size == len)
}

/// Number of symbols [`encode`] produces for `len` input bytes.
pub fn encoded_len(len: usize) -> usize {
    (len / FULL_BLOCK_SIZE) * FULL_ENCODED_BLOCK_SIZE + ENCODED_BLOCK_SIZES[len % FULL_BLOCK_SIZE]
}

pub fn encode(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(encoded_len(data.len()));
    for block in data.chunks(FULL_BLOCK_SIZE) {
        encode_block(block, &mut out);
    }
    // Every pushed byte comes from ALPHABET.
    out.into_iter().map(char::from).collect()
}

fn encode_block(block: &[u8], out: &mut Vec<u8>) {
    let size = ENCODED_BLOCK_SIZES[block.len()];
    let mut num = block
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));

    let start = out.len();
    out.resize(start + size, ALPHABET[0]);
    for slot in out[start..].iter_mut().rev() {
        *slot = ALPHABET[(num % 58) as usize];
        num /= 58;
    }
}

pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let symbols = encoded.as_bytes();
    let tail = symbols.len() % FULL_ENCODED_BLOCK_SIZE;
    let tail_size = decoded_block_size(tail).ok_or(Error::InvalidBlockLength(tail))?;

    let mut out = Vec::with_capacity(
        (symbols.len() / FULL_ENCODED_BLOCK_SIZE) * FULL_BLOCK_SIZE + tail_size,
    );
    for (n, block) in symbols.chunks(FULL_ENCODED_BLOCK_SIZE).enumerate() {
        decode_block(block, n * FULL_ENCODED_BLOCK_SIZE, &mut out)?;
    }
    Ok(out)
}

fn decode_block(block: &[u8], offset: usize, out: &mut Vec<u8>) -> Result<()> {
    let size = decoded_block_size(block.len()).ok_or(Error::InvalidBlockLength(block.len()))?;

    let mut num = 0u64;
    for (i, &symbol) in block.iter().enumerate() {
        let digit = DECODE_TABLE
            .get(symbol as usize)
            .copied()
            .filter(|&d| d != INVALID)
            .ok_or_else(|| Error::InvalidBase58Symbol {
                symbol: char::from(symbol),
                position: offset + i,
            })?;
        num = num
            .checked_mul(58)
            .and_then(|n| n.checked_add(u64::from(digit)))
            .ok_or(Error::Base58Overflow)?;
    }

    if size < FULL_BLOCK_SIZE && num >> (8 * size) != 0 {
        return Err(Error::Base58Overflow);
    }

    out.extend_from_slice(&num.to_be_bytes()[FULL_BLOCK_SIZE - size..]);
    Ok(())
}
