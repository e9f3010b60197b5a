use anyhow::{Context, Result};
use clap::Args;
use payment_core::{Address, Ed25519, SubaddressDeriver, SubaddressIndex};

use super::common::parse_view_key;

#[derive(Clone, Debug, Args)]
pub struct DeriveArgs {
    /// Primary (standard) address.
    #[arg(long)]
    pub address: String,
    /// Private view key, 32-byte hex.
    #[arg(long)]
    pub view_key: String,
    #[arg(long, default_value_t = 0)]
    pub major: u64,
    #[arg(long, default_value_t = 0)]
    pub minor: u64,
    /// Also print the subaddress public keys.
    #[arg(long)]
    pub keys: bool,
}

pub fn run(args: DeriveArgs) -> Result<()> {
    let view_key = parse_view_key(&args.view_key)?;
    let index = SubaddressIndex::try_new(args.major, args.minor)?;
    let deriver = SubaddressDeriver::new(Ed25519);

    if !args.keys {
        let address = deriver
            .derive(args.address.trim(), &view_key, index)
            .context("deriving subaddress")?;
        println!("{address}");
        return Ok(());
    }

    let base = Address::parse(&args.address).context("decoding base address")?;
    let sub = deriver
        .derive_keys(&base, &view_key, index)
        .context("deriving subaddress")?;
    println!("address={}", sub.address);
    println!("index={}", sub.index);
    println!("spend_public={}", sub.spend_public);
    println!("view_public={}", sub.view_public);
    Ok(())
}
