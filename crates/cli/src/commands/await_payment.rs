use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Args;
use log::{debug, info, warn};
use monero_rpc::MoneroRpc;
use payment_core::{
    payment_uri, CursorStore, FileCursorStore, InMemoryStore, MerchantConfig, PaymentResult,
    ViewPair, XmrAmount,
};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use watcher::{PaymentScanner, ScanConfig, ScanEvent, ScanRequest};

use super::common::{init_logging, load_config};

#[derive(Clone, Debug, Args)]
pub struct AwaitPaymentArgs {
    /// Merchant configuration file (JSON).
    #[arg(long)]
    pub config: PathBuf,
    /// Expected amount in XMR, e.g. 0.125.
    #[arg(long)]
    pub amount: String,
    /// Override the daemon URL from the config file.
    #[arg(long)]
    pub node: Option<String>,
    /// Use this minor index instead of reserving the next one.
    #[arg(long)]
    pub minor: Option<u32>,
    /// Print the confirmed payment as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: AwaitPaymentArgs) -> Result<()> {
    init_logging();
    let mut cfg = load_config(&args.config)?;
    if let Some(node) = &args.node {
        cfg.node_url = node.clone();
    }
    let view = cfg.validate().context("invalid configuration")?;
    let amount = XmrAmount::parse(&args.amount).context("parsing --amount")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match rt.block_on(scan(&cfg, view, amount, &args))? {
        Some(result) => report(&result, args.json),
        None => {
            println!("cancelled");
            Ok(())
        }
    }
}

async fn scan(
    cfg: &MerchantConfig,
    view: ViewPair,
    amount: XmrAmount,
    args: &AwaitPaymentArgs,
) -> Result<Option<PaymentResult>> {
    let rpc = MoneroRpc::with_timeout(&cfg.node_url, cfg.node_auth(), cfg.request_timeout())
        .context("building daemon client")?;
    let store: Arc<dyn CursorStore> = match &cfg.cursor_path {
        Some(path) => Arc::new(FileCursorStore::new(path.clone())),
        None => {
            warn!("no cursor_path configured; minor indices restart at 1 on every run");
            Arc::new(InMemoryStore::new())
        }
    };
    let scanner =
        PaymentScanner::new(Arc::new(rpc), store, view).with_config(ScanConfig::from(cfg));

    let mut request = ScanRequest::new(amount);
    request.minor_override = args.minor;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping scan");
            interrupt.cancel();
        }
    });

    follow(scanner.run_scan_with_cancel(request, cancel), amount).await
}

/// Print the deposit details and wait for the session's terminal event.
/// `Ok(None)` means the scan was cancelled.
async fn follow<S>(mut events: S, amount: XmrAmount) -> Result<Option<PaymentResult>>
where
    S: Stream<Item = ScanEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        match event {
            ScanEvent::Transition(state) if state.is_terminal() => info!("scan {state}"),
            ScanEvent::Transition(state) => debug!("scan state: {state}"),
            ScanEvent::SubaddressReady(sub) => {
                info!("awaiting {amount} XMR on subaddress {}", sub.index);
                println!("address={}", sub.address);
                println!("uri={}", payment_uri(&sub.address, Some(amount)));
            }
            ScanEvent::Matched(result) => return Ok(Some(result)),
            ScanEvent::Cancelled => return Ok(None),
            ScanEvent::Failed(reason) => bail!("scan failed: {reason}"),
        }
    }
    bail!("scan ended without a result")
}

fn report(result: &PaymentResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!("tx_hash={}", result.tx_hash);
    println!("output_index={}", result.output_index);
    println!("amount={}", result.amount);
    println!("in_pool={}", result.in_pool());
    Ok(())
}
