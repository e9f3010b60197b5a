use anyhow::{Context, Result};
use clap::Args;
use payment_core::Address;

use super::common::kind_label;

#[derive(Clone, Debug, Args)]
pub struct DecodeAddressArgs {
    /// Base58 Monero address.
    pub address: String,
}

pub fn run(args: DecodeAddressArgs) -> Result<()> {
    let addr = Address::parse(&args.address).context("decoding address")?;
    println!("network={}", addr.network);
    println!("kind={}", kind_label(addr.kind));
    println!("spend_public={}", addr.spend_public);
    println!("view_public={}", addr.view_public);
    if let Some(id) = addr.payment_id {
        println!("payment_id={}", hex::encode(id));
    }
    Ok(())
}
