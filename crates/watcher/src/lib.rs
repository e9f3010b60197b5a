// SPDX-License-Identifier: Apache-2.0

//! watcher: waits for a point-of-sale payment to land on a fresh subaddress.
//!
//! [`PaymentScanner::run_scan`] drives the `Idle → Deriving → Polling →
//! Verifying → Matched | Cancelled` state machine on a tokio task and reports
//! progress as a [`ScanStream`].
pub mod monero;
pub mod stream;

pub use monero::{
    NodeRpc, PaymentScanner, ScanConfig, ScanRequest, GET_TRANSACTIONS_BATCH_LIMIT,
};
pub use stream::{ScanEvent, ScanState, ScanStream};
