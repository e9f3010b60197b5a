//! payment-core: view-only Monero payment detection.
//!
//! Pieces:
//! - base58 / varint: Monero's wire encodings
//! - curve: the edwards25519 + Keccak gateway everything else goes through
//! - address / subaddress: parse base addresses, derive one-time deposit subaddresses
//! - matcher: recognise stealth outputs and decrypt their amounts
//! - storage: minor-index cursor so no subaddress is handed out twice
//! - config: merchant settings validated into a [`ViewPair`]
//!
//! Nothing here can spend; the only secret handled is the private view key.
pub mod address;
pub mod amount;
pub mod base58;
pub mod config;
pub mod curve;
pub mod error;
pub mod keys;
pub mod matcher;
pub mod model;
pub mod storage;
pub mod subaddress;
pub mod varint;

pub use address::{Address, AddressKind, Network};
pub use amount::{payment_uri, XmrAmount, ATOMIC_PER_XMR};
pub use config::{MerchantConfig, ViewPair};
pub use curve::{keccak256, CurveOps, Ed25519};
pub use error::{Error, ErrorKind, Result};
pub use keys::{PublicKey, SecretViewKey};
pub use matcher::{
    extract_tx_public_key, find_payment, verify_amount, KeyDerivation, OutputCandidate,
    OwnedOutput, PaymentMatcher, StealthMatch,
};
pub use model::{PaymentResult, TxSource};
pub use storage::{CursorStore, FileCursorStore, InMemoryStore};
pub use subaddress::{derive_subaddress, DerivedSubaddress, SubaddressDeriver, SubaddressIndex};
