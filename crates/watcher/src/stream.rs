// SPDX-License-Identifier: Apache-2.0

//! Event surface of a running scan.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use payment_core::{DerivedSubaddress, PaymentResult};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tokio_util::sync::{CancellationToken, DropGuard};

/// States of one scan session.
///
/// `Idle → Deriving → Polling ⇄ Verifying → Matched | Cancelled`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanState {
    Idle,
    Deriving,
    Polling,
    Verifying,
    Matched,
    Cancelled,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Matched | ScanState::Cancelled)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanState::Idle => "idle",
            ScanState::Deriving => "deriving",
            ScanState::Polling => "polling",
            ScanState::Verifying => "verifying",
            ScanState::Matched => "matched",
            ScanState::Cancelled => "cancelled",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    Transition(ScanState),
    /// The deposit address for this session; show it to the payer.
    SubaddressReady(DerivedSubaddress),
    Matched(PaymentResult),
    Cancelled,
    /// The session could not start (cursor storage or derivation failed).
    Failed(String),
}

/// Stream of [`ScanEvent`]s for one session. Dropping it cancels the scan.
pub struct ScanStream {
    events: ReceiverStream<ScanEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ScanStream {
    pub(crate) fn new(events: mpsc::Receiver<ScanEvent>, cancel: CancellationToken) -> Self {
        Self {
            events: ReceiverStream::new(events),
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Ask the scan to stop. The stream then yields `Cancelled` and ends.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the stream until the session ends, returning the payment if one
    /// was confirmed.
    pub async fn wait_for_payment(mut self) -> Option<PaymentResult> {
        while let Some(event) = self.next().await {
            match event {
                ScanEvent::Matched(result) => return Some(result),
                ScanEvent::Cancelled | ScanEvent::Failed(_) => return None,
                _ => {}
            }
        }
        None
    }
}

impl Stream for ScanStream {
    type Item = ScanEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ScanEvent>> {
        Pin::new(&mut self.events).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}
