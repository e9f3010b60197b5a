//! Narrow gateway to the edwards25519 group and the Keccak-256 hash.
//!
//! The deriver and matcher only ever talk to [`CurveOps`]; [`Ed25519`] is the
//! `curve25519-dalek` backed implementation. Every value crossing the gateway
//! is a 32-byte encoding; scalars must be canonical (reduced mod l) and points
//! must decompress.

use crate::error::{Error, Result};
use curve25519_dalek::{
    constants::ED25519_BASEPOINT_TABLE,
    edwards::{CompressedEdwardsY, EdwardsPoint},
    Scalar,
};
use sha3::{Digest, Keccak256};

pub trait CurveOps: Send + Sync {
    /// `a + b mod l`.
    fn scalar_add(&self, a: &[u8; 32], b: &[u8; 32]) -> Result<[u8; 32]>;
    /// Reduce a hash output of up to 64 bytes mod l.
    fn scalar_reduce(&self, wide: &[u8]) -> Result<[u8; 32]>;
    /// `s·G`.
    fn scalar_mult_base(&self, s: &[u8; 32]) -> Result<[u8; 32]>;
    /// `s·P`.
    fn scalar_mult(&self, s: &[u8; 32], p: &[u8; 32]) -> Result<[u8; 32]>;
    /// `P + Q`.
    fn point_add(&self, p: &[u8; 32], q: &[u8; 32]) -> Result<[u8; 32]>;
}

/// Keccak-256 (the original Keccak padding Monero uses, not SHA3-256).
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519;

impl Ed25519 {
    fn scalar(bytes: &[u8; 32]) -> Result<Scalar> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(*bytes))
            .ok_or(Error::NonCanonicalScalar("scalar"))
    }

    fn point(bytes: &[u8; 32]) -> Result<EdwardsPoint> {
        CompressedEdwardsY(*bytes)
            .decompress()
            .ok_or(Error::InvalidPoint("point"))
    }
}

impl CurveOps for Ed25519 {
    fn scalar_add(&self, a: &[u8; 32], b: &[u8; 32]) -> Result<[u8; 32]> {
        Ok((Self::scalar(a)? + Self::scalar(b)?).to_bytes())
    }

    fn scalar_reduce(&self, wide: &[u8]) -> Result<[u8; 32]> {
        match wide.len() {
            0..=32 => {
                let mut buf = [0u8; 32];
                buf[..wide.len()].copy_from_slice(wide);
                Ok(Scalar::from_bytes_mod_order(buf).to_bytes())
            }
            33..=64 => {
                let mut buf = [0u8; 64];
                buf[..wide.len()].copy_from_slice(wide);
                Ok(Scalar::from_bytes_mod_order_wide(&buf).to_bytes())
            }
            got => Err(Error::InvalidLength {
                label: "wide scalar",
                expected: 64,
                got,
            }),
        }
    }

    fn scalar_mult_base(&self, s: &[u8; 32]) -> Result<[u8; 32]> {
        let s = Self::scalar(s)?;
        Ok((&s * ED25519_BASEPOINT_TABLE).compress().to_bytes())
    }

    fn scalar_mult(&self, s: &[u8; 32], p: &[u8; 32]) -> Result<[u8; 32]> {
        let s = Self::scalar(s)?;
        let p = Self::point(p)?;
        Ok((s * p).compress().to_bytes())
    }

    fn point_add(&self, p: &[u8; 32], q: &[u8; 32]) -> Result<[u8; 32]> {
        Ok((Self::point(p)? + Self::point(q)?).compress().to_bytes())
    }
}
