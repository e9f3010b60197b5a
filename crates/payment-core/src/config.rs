use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::{
    address::{Address, AddressKind, Network},
    error::{Error, Result},
    keys::SecretViewKey,
};

fn default_major_index() -> u64 {
    1
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_recent_blocks() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    20
}

/// Merchant settings as stored on disk (JSON).
#[derive(Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    /// Daemon base URL, e.g. `http://node.example:18081`.
    pub node_url: String,
    #[serde(default)]
    pub node_user: Option<String>,
    #[serde(default)]
    pub node_pass: Option<String>,
    /// Primary (standard) address payments are derived from.
    pub base_address: String,
    /// Private view key, hex.
    pub secret_view_key: String,
    /// Account the deposit subaddresses live under.
    #[serde(default = "default_major_index")]
    pub major_index: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// How many blocks back from the tip are searched on each poll.
    #[serde(default = "default_recent_blocks")]
    pub recent_blocks: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Minor-index cursor file. In-memory cursor when unset.
    #[serde(default)]
    pub cursor_path: Option<PathBuf>,
}

impl std::fmt::Debug for MerchantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerchantConfig")
            .field("node_url", &self.node_url)
            .field("node_user", &self.node_user)
            .field("base_address", &self.base_address)
            .field("major_index", &self.major_index)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("recent_blocks", &self.recent_blocks)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cursor_path", &self.cursor_path)
            .finish_non_exhaustive()
    }
}

impl MerchantConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Check every caller-supplied value up front so nothing malformed
    /// surfaces once a scan is running.
    pub fn validate(&self) -> Result<ViewPair> {
        let base = Address::parse(&self.base_address)?;
        if base.kind != AddressKind::Standard {
            return Err(Error::InvalidConfig(format!(
                "base address must be a standard address, got {:?}",
                base.kind
            )));
        }
        base.spend_public.ensure_on_curve()?;
        let view_key = SecretViewKey::from_hex(&self.secret_view_key)?;
        let major_index = u32::try_from(self.major_index).map_err(|_| Error::IndexOutOfRange {
            label: "major",
            value: self.major_index,
        })?;
        if self.poll_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval_secs must be positive".into(),
            ));
        }
        Ok(ViewPair {
            base,
            base_address: self.base_address.trim().to_string(),
            view_key,
            major_index,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn node_auth(&self) -> Option<(String, String)> {
        match (&self.node_user, &self.node_pass) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }
}

/// Validated view-only key material the scanner works from.
#[derive(Clone, Debug)]
pub struct ViewPair {
    pub base: Address,
    /// The base address exactly as configured.
    pub base_address: String,
    pub view_key: SecretViewKey,
    pub major_index: u32,
}

impl ViewPair {
    pub fn network(&self) -> Network {
        self.base.network
    }
}
