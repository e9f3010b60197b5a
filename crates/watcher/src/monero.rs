// SPDX-License-Identifier: Apache-2.0

//! Cancellable scan loop that waits for a payment to a fresh subaddress.
//!
//! Each session reserves a new minor index, derives the deposit subaddress,
//! then polls the daemon's mempool and the most recent blocks until an output
//! paying that subaddress the expected amount shows up. A failing RPC call is
//! logged and counts as "no results"; it never ends the session.

use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use monero_rpc::{DaemonTransaction, MoneroRpc, RpcError, TransactionJson};
use payment_core::{
    extract_tx_public_key, CursorStore, DerivedSubaddress, Ed25519, MerchantConfig,
    OutputCandidate, PaymentMatcher, PaymentResult, PublicKey, SubaddressDeriver,
    SubaddressIndex, TxSource, ViewPair, XmrAmount,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::stream::{ScanEvent, ScanState, ScanStream};

/// Restricted daemons reject larger `get_transactions` batches.
pub const GET_TRANSACTIONS_BATCH_LIMIT: usize = 100;
const EVENT_BUFFER: usize = 32;

/// Abstraction over the subset of Monero RPC used by the scan loop.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn transaction_pool_hashes(&self) -> Result<Vec<String>>;
    /// Number of blocks; the tip is at `block_count - 1`.
    async fn block_count(&self) -> Result<u64>;
    async fn block_tx_hashes(&self, height: u64) -> Result<Vec<String>>;
    /// Daemon-decoded transactions for `hashes`; unknown hashes are omitted.
    async fn transactions(&self, hashes: &[String]) -> Result<Vec<DaemonTransaction>>;
}

#[async_trait]
impl NodeRpc for MoneroRpc {
    async fn transaction_pool_hashes(&self) -> Result<Vec<String>> {
        self.get_transaction_pool_hashes()
            .await
            .map_err(map_rpc_err)
    }

    async fn block_count(&self) -> Result<u64> {
        self.get_block_count().await.map_err(map_rpc_err)
    }

    async fn block_tx_hashes(&self, height: u64) -> Result<Vec<String>> {
        self.get_block_by_height(height)
            .await
            .map(|block| block.tx_hashes)
            .map_err(map_rpc_err)
    }

    async fn transactions(&self, hashes: &[String]) -> Result<Vec<DaemonTransaction>> {
        self.get_transactions_as_json(hashes)
            .await
            .map(|response| response.txs)
            .map_err(map_rpc_err)
    }
}

fn map_rpc_err(err: RpcError) -> anyhow::Error {
    if err.is_transport() {
        anyhow!("monero node unreachable: {err}")
    } else {
        anyhow!("malformed monero rpc answer: {err}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Wait between polls that found nothing new.
    pub poll_interval: Duration,
    /// Blocks below the tip searched on every poll.
    pub recent_blocks: u64,
    pub batch_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            recent_blocks: 3,
            batch_limit: GET_TRANSACTIONS_BATCH_LIMIT,
        }
    }
}

impl From<&MerchantConfig> for ScanConfig {
    fn from(cfg: &MerchantConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval(),
            recent_blocks: cfg.recent_blocks,
            ..Self::default()
        }
    }
}

/// What one session waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    pub expected: XmrAmount,
    /// Use this minor index instead of reserving one from the cursor store.
    pub minor_override: Option<u32>,
}

impl ScanRequest {
    pub fn new(expected: XmrAmount) -> Self {
        Self {
            expected,
            minor_override: None,
        }
    }
}

/// Long-lived scanner; every [`PaymentScanner::run_scan`] call starts an
/// independent session on the current tokio runtime.
pub struct PaymentScanner<Rpc = MoneroRpc> {
    rpc: Arc<Rpc>,
    store: Arc<dyn CursorStore>,
    view: Arc<ViewPair>,
    config: ScanConfig,
}

impl<Rpc> Clone for PaymentScanner<Rpc> {
    fn clone(&self) -> Self {
        Self {
            rpc: Arc::clone(&self.rpc),
            store: Arc::clone(&self.store),
            view: Arc::clone(&self.view),
            config: self.config,
        }
    }
}

impl<Rpc: NodeRpc + 'static> PaymentScanner<Rpc> {
    pub fn new(rpc: Arc<Rpc>, store: Arc<dyn CursorStore>, view: ViewPair) -> Self {
        Self {
            rpc,
            store,
            view: Arc::new(view),
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Start a session. Must be called from within a tokio runtime.
    pub fn run_scan(&self, request: ScanRequest) -> ScanStream {
        self.run_scan_with_cancel(request, CancellationToken::new())
    }

    /// Like [`PaymentScanner::run_scan`] but stops when `cancel` fires as well
    /// as when the returned stream is dropped.
    pub fn run_scan_with_cancel(
        &self,
        request: ScanRequest,
        cancel: CancellationToken,
    ) -> ScanStream {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let session = ScanSession {
            rpc: Arc::clone(&self.rpc),
            store: Arc::clone(&self.store),
            view: Arc::clone(&self.view),
            config: self.config,
            request,
            cancel: cancel.clone(),
            events,
            state: ScanState::Idle,
            evaluated: HashSet::new(),
        };
        tokio::spawn(session.run());
        ScanStream::new(rx, cancel)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Candidate {
    hash: String,
    source: TxSource,
}

struct ScanSession<Rpc> {
    rpc: Arc<Rpc>,
    store: Arc<dyn CursorStore>,
    view: Arc<ViewPair>,
    config: ScanConfig,
    request: ScanRequest,
    cancel: CancellationToken,
    events: mpsc::Sender<ScanEvent>,
    state: ScanState,
    /// Hashes already checked this session and still in the polled range.
    evaluated: HashSet<String>,
}

impl<Rpc: NodeRpc + 'static> ScanSession<Rpc> {
    async fn run(mut self) {
        self.emit(ScanEvent::Transition(ScanState::Idle)).await;
        match self.drive().await {
            Ok(Some(result)) => {
                log::info!(
                    "payment of {} XMR confirmed in tx {} output {}",
                    result.amount,
                    result.tx_hash,
                    result.output_index
                );
                self.transition(ScanState::Matched).await;
                self.emit(ScanEvent::Matched(result)).await;
            }
            Ok(None) => {
                log::info!("scan cancelled");
                self.transition(ScanState::Cancelled).await;
                self.emit(ScanEvent::Cancelled).await;
            }
            Err(err) => {
                log::error!("scan failed: {err:#}");
                self.emit(ScanEvent::Failed(format!("{err:#}"))).await;
            }
        }
    }

    async fn drive(&mut self) -> Result<Option<PaymentResult>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        self.transition(ScanState::Deriving).await;
        let derived = self.derive()?;
        self.emit(ScanEvent::SubaddressReady(derived.clone())).await;

        loop {
            self.transition(ScanState::Polling).await;
            let cancel = self.cancel.clone();
            let candidates = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                candidates = self.poll_candidates() => candidates,
            };

            if !candidates.is_empty() {
                self.transition(ScanState::Verifying).await;
                let found = tokio::select! {
                    _ = cancel.cancelled() => return Ok(None),
                    found = self.verify_candidates(&derived, candidates) => found,
                };
                if let Some(result) = found {
                    return Ok(Some(result));
                }
            }

            if !self.wait(self.config.poll_interval).await {
                return Ok(None);
            }
        }
    }

    fn derive(&self) -> Result<DerivedSubaddress> {
        let major = self.view.major_index;
        let minor = match self.request.minor_override {
            Some(minor) => minor,
            None => self.store.next_minor(major)?,
        };
        let index = SubaddressIndex::new(major, minor);
        let derived = SubaddressDeriver::new(Ed25519).derive_keys(
            &self.view.base,
            &self.view.view_key,
            index,
        )?;
        log::info!("waiting for payment to subaddress {index}");
        Ok(derived)
    }

    /// Union of mempool hashes and the hashes in the last few blocks, minus
    /// anything already evaluated. Mempool entries come first.
    ///
    /// After a poll where every call succeeded, evaluated hashes that are no
    /// longer in the union are forgotten.
    async fn poll_candidates(&mut self) -> Vec<Candidate> {
        let mut observed = Vec::new();
        let mut complete = true;

        match self.rpc.transaction_pool_hashes().await {
            Ok(hashes) => observed.extend(hashes.into_iter().map(|h| (h, TxSource::Mempool))),
            Err(err) => {
                log::warn!("mempool query failed: {err:#}");
                complete = false;
            }
        }

        if self.cancel.is_cancelled() {
            return Vec::new();
        }
        let count = match self.rpc.block_count().await {
            Ok(count) => count,
            Err(err) => {
                log::warn!("block count query failed: {err:#}");
                complete = false;
                0
            }
        };
        let lowest = count.saturating_sub(self.config.recent_blocks);
        for height in (lowest..count).rev() {
            if self.cancel.is_cancelled() {
                return Vec::new();
            }
            match self.rpc.block_tx_hashes(height).await {
                Ok(hashes) => observed.extend(hashes.into_iter().map(|h| (h, TxSource::Block))),
                Err(err) => {
                    log::warn!("block {height} query failed: {err:#}");
                    complete = false;
                }
            }
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (hash, source) in observed {
            let hash = hash.to_ascii_lowercase();
            if seen.insert(hash.clone()) && !self.evaluated.contains(&hash) {
                candidates.push(Candidate { hash, source });
            }
        }
        if complete {
            let before = self.evaluated.len();
            self.evaluated.retain(|hash| seen.contains(hash));
            if self.evaluated.len() < before {
                log::debug!(
                    "forgot {} evaluated hash(es) no longer in range",
                    before - self.evaluated.len()
                );
            }
        }

        log::debug!("{} new candidate transaction(s)", candidates.len());
        candidates
    }

    async fn verify_candidates(
        &mut self,
        derived: &DerivedSubaddress,
        candidates: Vec<Candidate>,
    ) -> Option<PaymentResult> {
        let limit = self.config.batch_limit.max(1);
        for chunk in candidates.chunks(limit) {
            if self.cancel.is_cancelled() {
                return None;
            }
            let hashes: Vec<String> = chunk.iter().map(|c| c.hash.clone()).collect();
            let txs = match self.rpc.transactions(&hashes).await {
                Ok(txs) => txs,
                Err(err) => {
                    log::warn!("get_transactions for {} hash(es) failed: {err:#}", hashes.len());
                    continue;
                }
            };

            for tx in txs {
                let hash = tx.tx_hash.to_ascii_lowercase();
                let source = chunk
                    .iter()
                    .find(|c| c.hash == hash)
                    .map(|c| c.source)
                    .unwrap_or(if tx.in_pool {
                        TxSource::Mempool
                    } else {
                        TxSource::Block
                    });
                let decoded = match tx.decode_json() {
                    Ok(decoded) => decoded,
                    Err(err) => {
                        log::debug!("skipping {hash}: {err}");
                        continue;
                    }
                };
                let result = self.evaluate(derived, &hash, source, &decoded);
                self.evaluated.insert(hash);
                if result.is_some() {
                    return result;
                }
            }
        }
        None
    }

    fn evaluate(
        &self,
        derived: &DerivedSubaddress,
        hash: &str,
        source: TxSource,
        tx: &TransactionJson,
    ) -> Option<PaymentResult> {
        let Some(tx_public_key) = extract_tx_public_key(&tx.extra) else {
            log::debug!("skipping {hash}: no leading tx public key in extra");
            return None;
        };
        let outputs = output_candidates(tx);
        let matcher = PaymentMatcher::new(Ed25519);
        let owned = matcher
            .key_derivation(&self.view.view_key, &tx_public_key)
            .and_then(|derivation| {
                matcher.find_owned_output(&derivation, &derived.spend_public, &outputs)
            });
        let owned = match owned {
            Ok(Some(owned)) => owned,
            Ok(None) => return None,
            Err(err) => {
                log::debug!("skipping {hash}: {err}");
                return None;
            }
        };

        match owned.amount {
            Some(amount) if amount == self.request.expected => Some(PaymentResult {
                matched: true,
                output_index: owned.index,
                amount,
                tx_hash: hash.to_string(),
                source,
                subaddress: derived.index,
            }),
            Some(amount) => {
                log::info!(
                    "tx {hash} pays the subaddress {amount} XMR, expected {}",
                    self.request.expected
                );
                None
            }
            None => {
                log::debug!("tx {hash} output {} has no encrypted amount", owned.index);
                None
            }
        }
    }

    async fn transition(&mut self, next: ScanState) {
        if self.state == next {
            return;
        }
        log::debug!("scan {} -> {}", self.state, next);
        self.state = next;
        self.emit(ScanEvent::Transition(next)).await;
    }

    async fn emit(&self, event: ScanEvent) {
        // A closed receiver means the stream was dropped, which also cancels.
        let _ = self.events.send(event).await;
    }

    /// Sleep for `interval`; `false` if cancelled first.
    async fn wait(&self, interval: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(interval) => true,
        }
    }
}

/// Outputs of `tx` in matcher form. Outputs whose key does not decode are
/// dropped; their index is still honoured for the rest.
fn output_candidates(tx: &TransactionJson) -> Vec<OutputCandidate> {
    tx.vout
        .iter()
        .enumerate()
        .filter_map(|(i, out)| {
            let stealth_key = out
                .target
                .one_time_key()
                .and_then(|key| PublicKey::from_hex(key).ok())?;
            let encrypted_amount = tx
                .rct_signatures
                .ecdh_info
                .get(i)
                .and_then(|info| decode_fixed::<8>(&info.amount));
            let view_tag = out
                .target
                .view_tag()
                .and_then(|tag| decode_fixed::<1>(tag))
                .map(|tag| tag[0]);
            Some(OutputCandidate {
                index: i as u64,
                stealth_key,
                encrypted_amount,
                view_tag,
            })
        })
        .collect()
}

fn decode_fixed<const N: usize>(value: &str) -> Option<[u8; N]> {
    hex::decode(value.trim()).ok()?.try_into().ok()
}
