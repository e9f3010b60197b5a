use std::fmt;

use curve25519_dalek::{edwards::CompressedEdwardsY, Scalar};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

pub(crate) fn parse_hex32(value: &str, label: &'static str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value.trim()).map_err(|e| Error::hex(label, e))?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| Error::InvalidLength {
        label,
        expected: 32,
        got,
    })
}

/// Private view key. Only ever held in memory; wiped on drop and never
/// printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretViewKey([u8; 32]);

impl SecretViewKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        if bool::from(Scalar::from_canonical_bytes(bytes).is_none()) {
            return Err(Error::NonCanonicalScalar("secret view key"));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let mut bytes = parse_hex32(value, "secret view key")?;
        let key = Self::from_bytes(bytes);
        bytes.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SecretViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretViewKey(<redacted>)")
    }
}

/// Compressed edwards25519 point as it appears on chain and in addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn from_hex(value: &str) -> Result<Self> {
        parse_hex32(value, "public key").map(Self)
    }

    /// Like [`PublicKey::from_hex`] but also requires the bytes to
    /// decompress to a curve point.
    pub fn from_hex_checked(value: &str) -> Result<Self> {
        let key = Self::from_hex(value)?;
        key.ensure_on_curve()?;
        Ok(key)
    }

    pub fn ensure_on_curve(&self) -> Result<()> {
        CompressedEdwardsY(self.0)
            .decompress()
            .map(|_| ())
            .ok_or(Error::InvalidPoint("public key"))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 32]> for PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
