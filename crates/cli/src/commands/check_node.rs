use anyhow::{bail, Result};
use clap::Args;

#[derive(Clone, Debug, Args)]
pub struct CheckNodeArgs {
    /// Daemon base URL, e.g. http://127.0.0.1:18081.
    #[arg(long)]
    pub node: String,
}

pub fn run(args: CheckNodeArgs) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    if rt.block_on(monero_rpc::check_node(&args.node)) {
        println!("reachable");
        Ok(())
    } else {
        println!("unreachable");
        bail!("node {} is not reachable", args.node.trim())
    }
}
