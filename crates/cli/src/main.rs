mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xmrpos-cli", about = "Monero point-of-sale payment tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a subaddress from a primary address and private view key.
    Derive(commands::derive::DeriveArgs),
    /// Print the network, kind and public keys of an address.
    DecodeAddress(commands::decode_address::DecodeAddressArgs),
    /// Check a daemon's RPC endpoint.
    CheckNode(commands::check_node::CheckNodeArgs),
    /// Reserve a fresh subaddress and wait for the exact amount to arrive.
    AwaitPayment(commands::await_payment::AwaitPaymentArgs),
}

fn main() {
    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Derive(args) => commands::derive::run(args),
        Commands::DecodeAddress(args) => commands::decode_address::run(args),
        Commands::CheckNode(args) => commands::check_node::run(args),
        Commands::AwaitPayment(args) => commands::await_payment::run(args),
    };
    if let Err(err) = outcome {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
