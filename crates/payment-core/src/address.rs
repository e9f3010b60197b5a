//! Monero address parsing and encoding.
//!
//! Layout after Base58 decoding:
//! `[network byte | spend key (32) | view key (32) | payment id (8, integrated only) | checksum (4)]`
//! where the checksum is the first four bytes of Keccak-256 over everything before it.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    base58,
    curve::keccak256,
    error::{Error, Result},
    keys::PublicKey,
};

const CHECKSUM_LEN: usize = 4;
/// Standard and subaddress payload length including checksum.
pub const ADDRESS_LEN: usize = 1 + 32 + 32 + CHECKSUM_LEN;
const INTEGRATED_ADDRESS_LEN: usize = ADDRESS_LEN + 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Stagenet,
    Testnet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Standard,
    Integrated,
    Subaddress,
}

impl Network {
    pub fn prefix(self, kind: AddressKind) -> u8 {
        match (self, kind) {
            (Network::Mainnet, AddressKind::Standard) => 18,
            (Network::Mainnet, AddressKind::Integrated) => 19,
            (Network::Mainnet, AddressKind::Subaddress) => 42,
            (Network::Stagenet, AddressKind::Standard) => 24,
            (Network::Stagenet, AddressKind::Integrated) => 25,
            (Network::Stagenet, AddressKind::Subaddress) => 36,
            (Network::Testnet, AddressKind::Standard) => 53,
            (Network::Testnet, AddressKind::Integrated) => 54,
            (Network::Testnet, AddressKind::Subaddress) => 63,
        }
    }

    pub fn classify(prefix: u8) -> Option<(Network, AddressKind)> {
        [Network::Mainnet, Network::Stagenet, Network::Testnet]
            .into_iter()
            .flat_map(|net| {
                [
                    AddressKind::Standard,
                    AddressKind::Integrated,
                    AddressKind::Subaddress,
                ]
                .into_iter()
                .map(move |kind| (net, kind))
            })
            .find(|(net, kind)| net.prefix(*kind) == prefix)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Mainnet => "mainnet",
            Network::Stagenet => "stagenet",
            Network::Testnet => "testnet",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    pub network: Network,
    pub kind: AddressKind,
    pub spend_public: PublicKey,
    pub view_public: PublicKey,
    pub payment_id: Option<[u8; 8]>,
}

impl Address {
    pub fn new(
        network: Network,
        kind: AddressKind,
        spend_public: PublicKey,
        view_public: PublicKey,
    ) -> Self {
        Self {
            network,
            kind,
            spend_public,
            view_public,
            payment_id: None,
        }
    }

    /// Decode and validate a Base58 address string.
    pub fn parse(encoded: &str) -> Result<Self> {
        let raw = base58::decode(encoded.trim())?;
        if raw.len() != ADDRESS_LEN && raw.len() != INTEGRATED_ADDRESS_LEN {
            return Err(Error::InvalidLength {
                label: "address",
                expected: ADDRESS_LEN,
                got: raw.len(),
            });
        }

        let (payload, checksum) = raw.split_at(raw.len() - CHECKSUM_LEN);
        if keccak256(payload)[..CHECKSUM_LEN] != *checksum {
            return Err(Error::ChecksumMismatch);
        }

        let (network, kind) =
            Network::classify(payload[0]).ok_or(Error::UnknownNetworkByte(payload[0]))?;
        let expects_payment_id = kind == AddressKind::Integrated;
        if expects_payment_id != (raw.len() == INTEGRATED_ADDRESS_LEN) {
            return Err(Error::InvalidLength {
                label: "address",
                expected: if expects_payment_id {
                    INTEGRATED_ADDRESS_LEN
                } else {
                    ADDRESS_LEN
                },
                got: raw.len(),
            });
        }

        let mut spend = [0u8; 32];
        spend.copy_from_slice(&payload[1..33]);
        let mut view = [0u8; 32];
        view.copy_from_slice(&payload[33..65]);
        let payment_id = expects_payment_id.then(|| {
            let mut id = [0u8; 8];
            id.copy_from_slice(&payload[65..73]);
            id
        });

        Ok(Self {
            network,
            kind,
            spend_public: PublicKey(spend),
            view_public: PublicKey(view),
            payment_id,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(INTEGRATED_ADDRESS_LEN);
        data.push(self.network.prefix(self.kind));
        data.extend_from_slice(self.spend_public.as_bytes());
        data.extend_from_slice(self.view_public.as_bytes());
        if let Some(id) = &self.payment_id {
            data.extend_from_slice(id);
        }
        let checksum = keccak256(&data);
        data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
        data
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base58::encode(&self.to_bytes()))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}
