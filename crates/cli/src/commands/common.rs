use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use payment_core::{AddressKind, MerchantConfig, SecretViewKey};
use tracing_subscriber::EnvFilter;

pub fn parse_hex_array<const N: usize>(value: &str, label: &str) -> Result<[u8; N]> {
    let bytes = parse_hex_vec(value, label)?;
    ensure!(
        bytes.len() == N,
        "{label} must be {N} bytes, got {}",
        bytes.len()
    );
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

pub fn parse_hex_vec(value: &str, label: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim().trim_start_matches("0x");
    hex::decode(trimmed).with_context(|| format!("{label} is not valid hex"))
}

pub fn parse_view_key(value: &str) -> Result<SecretViewKey> {
    let bytes = parse_hex_array::<32>(value, "view key")?;
    SecretViewKey::from_bytes(bytes).context("view key is not a canonical scalar")
}

pub fn load_config(path: &Path) -> Result<MerchantConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    MerchantConfig::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn kind_label(kind: AddressKind) -> &'static str {
    match kind {
        AddressKind::Standard => "standard",
        AddressKind::Integrated => "integrated",
        AddressKind::Subaddress => "subaddress",
    }
}

/// Human-readable logs on stderr; `RUST_LOG` overrides the default level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
