use serde::{Deserialize, Serialize};

use crate::{amount::XmrAmount, subaddress::SubaddressIndex};

/// Where a matched transaction was seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxSource {
    Mempool,
    Block,
}

/// Terminal value of a scan session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub matched: bool,
    pub output_index: u64,
    /// Decrypted amount; atomic units, printed as decimal XMR.
    pub amount: XmrAmount,
    pub tx_hash: String,
    pub source: TxSource,
    pub subaddress: SubaddressIndex,
}

impl PaymentResult {
    pub fn in_pool(&self) -> bool {
        self.source == TxSource::Mempool
    }
}
