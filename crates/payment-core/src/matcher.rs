//! Stealth output recognition and ECDH amount decryption for a single
//! transaction.
//!
//! With tx public key `R`, private view key `a` and recipient spend key `B`:
//!
//! ```text
//! S   = (8a)·R                              key derivation
//! r_i = Hs(S || varint(i))                  per-output scalar
//! P_i = r_i·G + B                           expected one-time key
//! amount_i = enc_i XOR Keccak("amount" || r_i)[..8]
//! ```

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    amount::XmrAmount,
    curve::{keccak256, CurveOps, Ed25519},
    error::Result,
    keys::{PublicKey, SecretViewKey},
    varint,
};

const TX_PUBKEY_TAG: u8 = 0x01;
const AMOUNT_DOMAIN: &[u8] = b"amount";
const VIEW_TAG_DOMAIN: &[u8] = b"view_tag";

/// Shared secret `8·a·R` for one transaction.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyDerivation([u8; 32]);

impl KeyDerivation {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `S || varint(index)`, the preimage of both the output scalar and the view tag.
    fn with_index(&self, index: u64) -> Zeroizing<Vec<u8>> {
        let mut buf = Zeroizing::new(Vec::with_capacity(32 + 10));
        buf.extend_from_slice(&self.0);
        varint::write(index, &mut buf);
        buf
    }
}

impl std::fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyDerivation(<redacted>)")
    }
}

/// One transaction output as the matcher sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputCandidate {
    pub index: u64,
    pub stealth_key: PublicKey,
    pub encrypted_amount: Option<[u8; 8]>,
    pub view_tag: Option<u8>,
}

/// Result of [`PaymentMatcher::find_payment`].
///
/// `index` is only meaningful when `matched` is set; otherwise it is the last
/// index examined (0 for a transaction without outputs).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StealthMatch {
    pub matched: bool,
    pub index: u64,
}

/// An output recognised as ours, with its amount when one could be decrypted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnedOutput {
    pub index: u64,
    pub amount: Option<XmrAmount>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PaymentMatcher<C = Ed25519> {
    curve: C,
}

impl<C: CurveOps> PaymentMatcher<C> {
    pub fn new(curve: C) -> Self {
        Self { curve }
    }

    /// `(8·a)·R`. The cofactor is folded into the scalar with three doublings.
    pub fn key_derivation(
        &self,
        view_key: &SecretViewKey,
        tx_public_key: &PublicKey,
    ) -> Result<KeyDerivation> {
        let mut s = Zeroizing::new(*view_key.as_bytes());
        for _ in 0..3 {
            *s = self.curve.scalar_add(&s, &s)?;
        }
        let derivation = self.curve.scalar_mult(&s, tx_public_key.as_bytes())?;
        Ok(KeyDerivation(derivation))
    }

    /// `Hs(S || varint(index))`.
    pub fn derivation_scalar(
        &self,
        derivation: &KeyDerivation,
        index: u64,
    ) -> Result<Zeroizing<[u8; 32]>> {
        let hash = Zeroizing::new(keccak256(derivation.with_index(index).as_slice()));
        self.curve.scalar_reduce(hash.as_slice()).map(Zeroizing::new)
    }

    /// One-time key an output at `index` would carry if it paid `spend_public`.
    pub fn expected_output_key(
        &self,
        derivation: &KeyDerivation,
        spend_public: &PublicKey,
        index: u64,
    ) -> Result<PublicKey> {
        let r = self.derivation_scalar(derivation, index)?;
        let rg = self.curve.scalar_mult_base(&r)?;
        self.curve
            .point_add(&rg, spend_public.as_bytes())
            .map(PublicKey)
    }

    /// Scan `output_keys` in order and report the first one addressed to
    /// `spend_public`.
    pub fn find_payment(
        &self,
        view_key: &SecretViewKey,
        spend_public: &PublicKey,
        tx_public_key: &PublicKey,
        output_keys: &[PublicKey],
    ) -> Result<StealthMatch> {
        if output_keys.is_empty() {
            return Ok(StealthMatch {
                matched: false,
                index: 0,
            });
        }
        let derivation = self.key_derivation(view_key, tx_public_key)?;
        let mut last = 0;
        for (i, key) in output_keys.iter().enumerate() {
            last = i as u64;
            if self.expected_output_key(&derivation, spend_public, last)? == *key {
                return Ok(StealthMatch {
                    matched: true,
                    index: last,
                });
            }
        }
        Ok(StealthMatch {
            matched: false,
            index: last,
        })
    }

    /// First output owned by `spend_public`, decrypting its amount on the way.
    ///
    /// Outputs carrying a view tag are pre-filtered with it before any point
    /// arithmetic; outputs without one get the full check.
    pub fn find_owned_output(
        &self,
        derivation: &KeyDerivation,
        spend_public: &PublicKey,
        outputs: &[OutputCandidate],
    ) -> Result<Option<OwnedOutput>> {
        for output in outputs {
            if let Some(tag) = output.view_tag {
                if tag != view_tag(derivation, output.index) {
                    continue;
                }
            }
            let r = self.derivation_scalar(derivation, output.index)?;
            let rg = self.curve.scalar_mult_base(&r)?;
            let candidate = self.curve.point_add(&rg, spend_public.as_bytes())?;
            if candidate != output.stealth_key.0 {
                continue;
            }
            return Ok(Some(OwnedOutput {
                index: output.index,
                amount: output
                    .encrypted_amount
                    .map(|enc| decrypt_with_scalar(&r, &enc)),
            }));
        }
        Ok(None)
    }

    pub fn decrypt_amount(
        &self,
        view_key: &SecretViewKey,
        tx_public_key: &PublicKey,
        encrypted_amount: &[u8; 8],
        output_index: u64,
    ) -> Result<XmrAmount> {
        let derivation = self.key_derivation(view_key, tx_public_key)?;
        let r = self.derivation_scalar(&derivation, output_index)?;
        Ok(decrypt_with_scalar(&r, encrypted_amount))
    }

    /// Decrypt the output amount and compare it to `expected` in atomic units.
    pub fn verify_amount(
        &self,
        view_key: &SecretViewKey,
        tx_public_key: &PublicKey,
        encrypted_amount: &[u8; 8],
        output_index: u64,
        expected: XmrAmount,
    ) -> Result<bool> {
        let amount =
            self.decrypt_amount(view_key, tx_public_key, encrypted_amount, output_index)?;
        Ok(amount == expected)
    }
}

fn amount_mask(scalar: &[u8; 32]) -> u64 {
    let mut preimage = Zeroizing::new(Vec::with_capacity(AMOUNT_DOMAIN.len() + 32));
    preimage.extend_from_slice(AMOUNT_DOMAIN);
    preimage.extend_from_slice(scalar);
    let mut hash = keccak256(preimage.as_slice());
    let mut mask = [0u8; 8];
    mask.copy_from_slice(&hash[..8]);
    hash.zeroize();
    u64::from_le_bytes(mask)
}

/// XOR an atomic amount with the mask for output scalar `scalar`.
pub fn encrypt_amount(scalar: &[u8; 32], amount: XmrAmount) -> [u8; 8] {
    (amount.atomic() ^ amount_mask(scalar)).to_le_bytes()
}

pub fn decrypt_with_scalar(scalar: &[u8; 32], encrypted: &[u8; 8]) -> XmrAmount {
    XmrAmount::from_atomic(u64::from_le_bytes(*encrypted) ^ amount_mask(scalar))
}

/// First byte of `Keccak("view_tag" || S || varint(index))`.
pub fn view_tag(derivation: &KeyDerivation, index: u64) -> u8 {
    let mut preimage = Zeroizing::new(Vec::with_capacity(VIEW_TAG_DOMAIN.len() + 42));
    preimage.extend_from_slice(VIEW_TAG_DOMAIN);
    preimage.extend_from_slice(derivation.with_index(index).as_slice());
    keccak256(preimage.as_slice())[0]
}

/// The transaction public key, if `extra` starts with a tx-pubkey field.
///
/// Only a leading `0x01` tag is recognised; anything else, or fewer than 33
/// bytes, is "not found".
pub fn extract_tx_public_key(extra: &[u8]) -> Option<PublicKey> {
    match extra {
        [TX_PUBKEY_TAG, rest @ ..] if rest.len() >= 32 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&rest[..32]);
            Some(PublicKey(key))
        }
        _ => None,
    }
}

pub fn find_payment(
    view_key: &SecretViewKey,
    spend_public: &PublicKey,
    tx_public_key: &PublicKey,
    output_keys: &[PublicKey],
) -> Result<StealthMatch> {
    PaymentMatcher::new(Ed25519).find_payment(view_key, spend_public, tx_public_key, output_keys)
}

pub fn verify_amount(
    view_key: &SecretViewKey,
    tx_public_key: &PublicKey,
    encrypted_amount: &[u8; 8],
    output_index: u64,
    expected: XmrAmount,
) -> Result<bool> {
    PaymentMatcher::new(Ed25519).verify_amount(
        view_key,
        tx_public_key,
        encrypted_amount,
        output_index,
        expected,
    )
}
