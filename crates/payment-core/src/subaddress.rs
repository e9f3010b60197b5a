//! Deterministic subaddress derivation from a base address and the private
//! view key.
//!
//! For index `(major, minor) != (0, 0)`:
//!
//! ```text
//! m = Hs("SubAddr\0" || view_secret || LE32(major) || LE32(minor))
//! D = B + m·G          subaddress spend key
//! C = view_secret·D    subaddress view key
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    address::{Address, AddressKind, Network},
    base58,
    curve::{keccak256, CurveOps, Ed25519},
    error::{Error, Result},
    keys::{PublicKey, SecretViewKey},
};

const SUBADDRESS_DOMAIN: &[u8] = b"SubAddr\0";
/// Network byte plus public spend key.
const SPEND_KEY_END: usize = 33;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SubaddressIndex {
    pub major: u32,
    pub minor: u32,
}

impl SubaddressIndex {
    /// `(0, 0)` stands for the base address itself.
    pub const PRIMARY: SubaddressIndex = SubaddressIndex { major: 0, minor: 0 };

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Range-checked constructor for indices arriving as wider integers.
    pub fn try_new(major: u64, minor: u64) -> Result<Self> {
        let major = u32::try_from(major).map_err(|_| Error::IndexOutOfRange {
            label: "major",
            value: major,
        })?;
        let minor = u32::try_from(minor).map_err(|_| Error::IndexOutOfRange {
            label: "minor",
            value: minor,
        })?;
        Ok(Self { major, minor })
    }

    pub fn is_primary(&self) -> bool {
        self.major == 0 && self.minor == 0
    }
}

impl fmt::Display for SubaddressIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.major, self.minor)
    }
}

/// A derived deposit address together with the keys the matcher needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedSubaddress {
    pub index: SubaddressIndex,
    pub address: String,
    #[serde(with = "hex_key")]
    pub spend_public: PublicKey,
    #[serde(with = "hex_key")]
    pub view_public: PublicKey,
}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::keys::PublicKey;

    pub fn serialize<S: Serializer>(key: &PublicKey, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&key.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        let value = String::deserialize(d)?;
        PublicKey::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SubaddressDeriver<C = Ed25519> {
    curve: C,
}

impl<C: CurveOps> SubaddressDeriver<C> {
    pub fn new(curve: C) -> Self {
        Self { curve }
    }

    /// Derive the subaddress string for `index`.
    ///
    /// The primary index returns `base_address` untouched without decoding it.
    /// Otherwise only the Base58 layer is decoded: the spend key is read from
    /// bytes `1..33` and the checksum is not consulted. A recognised network
    /// byte selects that network's subaddress prefix, anything else falls back
    /// to mainnet (`0x2A`).
    pub fn derive(
        &self,
        base_address: &str,
        view_key: &SecretViewKey,
        index: SubaddressIndex,
    ) -> Result<String> {
        if index.is_primary() {
            return Ok(base_address.to_string());
        }
        let raw = base58::decode(base_address.trim())?;
        if raw.len() < SPEND_KEY_END {
            return Err(Error::TruncatedAddress(raw.len()));
        }
        let network = Network::classify(raw[0]).map_or(Network::Mainnet, |(net, _)| net);
        let mut spend = [0u8; 32];
        spend.copy_from_slice(&raw[1..SPEND_KEY_END]);
        Ok(self
            .derive_from_spend(network, &PublicKey(spend), view_key, index)?
            .address)
    }

    pub fn derive_keys(
        &self,
        base: &Address,
        view_key: &SecretViewKey,
        index: SubaddressIndex,
    ) -> Result<DerivedSubaddress> {
        if index.is_primary() {
            return Ok(DerivedSubaddress {
                index,
                address: base.to_string(),
                spend_public: base.spend_public,
                view_public: base.view_public,
            });
        }
        self.derive_from_spend(base.network, &base.spend_public, view_key, index)
    }

    fn derive_from_spend(
        &self,
        network: Network,
        base_spend: &PublicKey,
        view_key: &SecretViewKey,
        index: SubaddressIndex,
    ) -> Result<DerivedSubaddress> {
        let m = subaddress_secret(view_key, index);
        let r = self.curve.scalar_reduce(m.as_slice())?;
        let rg = self.curve.scalar_mult_base(&r)?;
        let spend = self.curve.point_add(base_spend.as_bytes(), &rg)?;
        let view = self.curve.scalar_mult(view_key.as_bytes(), &spend)?;

        let address = Address::new(
            network,
            AddressKind::Subaddress,
            PublicKey(spend),
            PublicKey(view),
        );
        log::debug!("derived subaddress {index} on {network}");

        Ok(DerivedSubaddress {
            index,
            address: address.to_string(),
            spend_public: address.spend_public,
            view_public: address.view_public,
        })
    }
}

fn subaddress_secret(view_key: &SecretViewKey, index: SubaddressIndex) -> Zeroizing<[u8; 32]> {
    let mut data = Zeroizing::new(Vec::with_capacity(SUBADDRESS_DOMAIN.len() + 40));
    data.extend_from_slice(SUBADDRESS_DOMAIN);
    data.extend_from_slice(view_key.as_bytes());
    data.extend_from_slice(&index.major.to_le_bytes());
    data.extend_from_slice(&index.minor.to_le_bytes());
    Zeroizing::new(keccak256(data.as_slice()))
}

/// Convenience wrapper over [`SubaddressDeriver`] with the dalek backend and
/// range-checked indices.
pub fn derive_subaddress(
    base_address: &str,
    view_key: &SecretViewKey,
    major: u64,
    minor: u64,
) -> Result<String> {
    let index = SubaddressIndex::try_new(major, minor)?;
    SubaddressDeriver::new(Ed25519).derive(base_address, view_key, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::tests::DONATION_ADDRESS;

    fn view_key() -> SecretViewKey {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x2a;
        bytes[1] = 0x11;
        SecretViewKey::from_bytes(bytes).unwrap()
    }

    #[test]
    fn primary_index_is_identity() {
        let deriver = SubaddressDeriver::new(Ed25519);
        // Not even decoded: any string round-trips.
        assert_eq!(
            deriver
                .derive("not-an-address", &view_key(), SubaddressIndex::PRIMARY)
                .unwrap(),
            "not-an-address"
        );
    }

    #[test]
    fn subaddress_uses_network_prefix_and_valid_checksum() {
        let derived = derive_subaddress(DONATION_ADDRESS, &view_key(), 1, 2).unwrap();
        let raw = base58::decode(&derived).unwrap();
        assert_eq!(raw.len(), 69);
        assert_eq!(raw[0], 0x2A);

        let parsed = Address::parse(&derived).unwrap();
        assert_eq!(parsed.network, Network::Mainnet);
        assert_eq!(parsed.kind, AddressKind::Subaddress);
        parsed.spend_public.ensure_on_curve().unwrap();
    }

    #[test]
    fn view_key_relation_holds() {
        let base = Address::parse(DONATION_ADDRESS).unwrap();
        let key = view_key();
        let derived = SubaddressDeriver::new(Ed25519)
            .derive_keys(&base, &key, SubaddressIndex::new(3, 7))
            .unwrap();
        let expected_view = Ed25519
            .scalar_mult(key.as_bytes(), derived.spend_public.as_bytes())
            .unwrap();
        assert_eq!(derived.view_public.0, expected_view);
        assert_ne!(derived.spend_public, base.spend_public);
    }

    #[test]
    fn index_order_matters() {
        let a = derive_subaddress(DONATION_ADDRESS, &view_key(), 1, 2).unwrap();
        let b = derive_subaddress(DONATION_ADDRESS, &view_key(), 2, 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let too_big = u64::from(u32::MAX) + 1;
        assert!(matches!(
            derive_subaddress(DONATION_ADDRESS, &view_key(), too_big, 0),
            Err(Error::IndexOutOfRange { label: "major", .. })
        ));
        assert!(matches!(
            SubaddressIndex::try_new(0, too_big),
            Err(Error::IndexOutOfRange { label: "minor", .. })
        ));
    }

    #[test]
    fn derived_subaddress_serializes_keys_as_hex() {
        let base = Address::parse(DONATION_ADDRESS).unwrap();
        let derived = SubaddressDeriver::<Ed25519>::default()
            .derive_keys(&base, &view_key(), SubaddressIndex::new(1, 1))
            .unwrap();
        let json = serde_json::to_value(&derived).unwrap();
        assert_eq!(json["spend_public"], derived.spend_public.to_hex());
        let back: DerivedSubaddress = serde_json::from_value(json).unwrap();
        assert_eq!(back, derived);
    }

    fn reencode(mutate: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut raw = base58::decode(DONATION_ADDRESS).unwrap();
        mutate(&mut raw);
        base58::encode(&raw)
    }

    #[test]
    fn derivation_ignores_base_checksum() {
        let corrupted = reencode(|raw| {
            let last = raw.len() - 1;
            raw[last] ^= 0xff;
        });
        assert!(matches!(
            Address::parse(&corrupted),
            Err(Error::ChecksumMismatch)
        ));
        assert_eq!(
            derive_subaddress(&corrupted, &view_key(), 1, 2).unwrap(),
            derive_subaddress(DONATION_ADDRESS, &view_key(), 1, 2).unwrap()
        );
    }

    #[test]
    fn unknown_network_byte_falls_back_to_mainnet_prefix() {
        let foreign = reencode(|raw| raw[0] = 0x7b);
        let derived = derive_subaddress(&foreign, &view_key(), 1, 2).unwrap();
        assert_eq!(base58::decode(&derived).unwrap()[0], 0x2A);
        assert_eq!(
            derived,
            derive_subaddress(DONATION_ADDRESS, &view_key(), 1, 2).unwrap()
        );
    }

    #[test]
    fn stagenet_base_keeps_its_network() {
        let stagenet = reencode(|raw| raw[0] = Network::Stagenet.prefix(AddressKind::Standard));
        let derived = derive_subaddress(&stagenet, &view_key(), 1, 2).unwrap();
        assert_eq!(
            base58::decode(&derived).unwrap()[0],
            Network::Stagenet.prefix(AddressKind::Subaddress)
        );
    }

    #[test]
    fn truncated_base_is_rejected() {
        let short = base58::encode(&[0x12; 20]);
        assert!(matches!(
            derive_subaddress(&short, &view_key(), 1, 2),
            Err(Error::TruncatedAddress(20))
        ));
    }
}
