//! monero-rpc
//!
//! Minimal async HTTP client for the `monerod` public endpoints a payment
//! detector needs. Endpoints used (public RPC only):
//! - GET  /get_info
//! - GET  /get_transaction_pool_hashes
//! - POST /json_rpc     (methods: "get_block_count", "get_block")
//! - POST /get_transactions (with `decode_as_json`)
//!
//! Only response *shape* matters to callers: a decoded transaction exposes
//! `extra`, `rct_signatures.ecdhInfo[].amount` and `vout[].target` keys.

use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default per-request timeout for daemon calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
/// Timeout used by [`check_node`].
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(2500);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("rpc returned error: {0}")]
    Node(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RpcError {
    /// True when the failure came from the transport (connect, timeout, HTTP
    /// status) rather than from the shape of a daemon answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Http(_) | RpcError::Node(_))
    }
}

#[derive(Clone)]
pub struct MoneroRpc {
    base: Url,
    client: Client,
    auth_header: Option<HeaderValue>,
}

impl MoneroRpc {
    /// Create a new client. `base` like "http://127.0.0.1:18081".
    /// Optional basic auth via (user, pass). If None, no Authorization header is sent.
    pub fn new(base: &str, auth: Option<(String, String)>) -> Result<Self, RpcError> {
        Self::with_timeout(base, auth, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base: &str,
        auth: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let base = Url::parse(base)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let auth_header = match auth {
            Some((user, pass)) => {
                let token = format!("{user}:{pass}");
                let enc = general_purpose::STANDARD.encode(token);
                let header_value = HeaderValue::from_str(&format!("Basic {}", enc))
                    .map_err(|e| RpcError::Decode(format!("auth header encode: {e}")))?;
                Some(header_value)
            }
            None => None,
        };

        Ok(Self {
            base,
            client,
            auth_header,
        })
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(a) = &self.auth_header {
            h.insert(AUTHORIZATION, a.clone());
        }
        h
    }

    async fn json_rpc<P, R>(&self, method: &str, params: Option<&P>) -> Result<R, RpcError>
    where
        P: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        #[derive(Serialize)]
        struct Request<'a, T> {
            jsonrpc: &'a str,
            id: &'a str,
            method: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            params: Option<&'a T>,
        }

        #[derive(Deserialize)]
        struct Envelope<T> {
            result: Option<T>,
            error: Option<RpcErrorDetail>,
        }

        #[derive(Deserialize)]
        struct RpcErrorDetail {
            code: i64,
            message: String,
        }

        let url = self.base.join("/json_rpc")?;
        let request = Request {
            jsonrpc: "2.0",
            id: "0",
            method,
            params,
        };

        let resp = self
            .client
            .post(url)
            .headers(self.auth_headers())
            .json(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RpcError::Node(format!("{method} HTTP {}", resp.status())));
        }
        let envelope: Envelope<R> = resp.json().await?;
        if let Some(err) = envelope.error {
            return Err(RpcError::Node(format!(
                "{method} error code={} message={}",
                err.code, err.message
            )));
        }
        envelope
            .result
            .ok_or_else(|| RpcError::Node(format!("{method} missing result")))
    }

    async fn get_json<R>(&self, path: &str) -> Result<R, RpcError>
    where
        R: for<'de> Deserialize<'de>,
    {
        let url = self.base.join(path)?;
        let resp = self
            .client
            .get(url)
            .headers(self.auth_headers())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RpcError::Node(format!(
                "{} HTTP {}",
                path.trim_start_matches('/'),
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    fn ensure_status_ok(status: &str, context: &str) -> Result<(), RpcError> {
        if status == "OK" {
            return Ok(());
        }
        Err(RpcError::Node(format!(
            "{context} returned status {status}"
        )))
    }

    /// GET /get_info
    pub async fn get_info(&self) -> Result<GetInfo, RpcError> {
        let info: GetInfo = self.get_json("/get_info").await?;
        Self::ensure_status_ok(&info.status, "get_info")?;
        Ok(info)
    }

    /// GET /get_transaction_pool_hashes
    pub async fn get_transaction_pool_hashes(&self) -> Result<Vec<String>, RpcError> {
        let response: TransactionPoolHashesResponse =
            self.get_json("/get_transaction_pool_hashes").await?;
        Self::ensure_status_ok(&response.status, "get_transaction_pool_hashes")?;
        Ok(response.tx_hashes)
    }

    /// JSON-RPC `get_block_count`. The count is one past the tip height.
    pub async fn get_block_count(&self) -> Result<u64, RpcError> {
        let response: BlockCountResult = self.json_rpc::<(), _>("get_block_count", None).await?;
        Self::ensure_status_ok(&response.status, "get_block_count")?;
        Ok(response.count)
    }

    /// JSON-RPC `get_block` with arbitrary parameters.
    pub async fn get_block(&self, params: &GetBlockParams) -> Result<BlockResult, RpcError> {
        let response: BlockResult = self.json_rpc("get_block", Some(params)).await?;
        Self::ensure_status_ok(&response.status, "get_block")?;
        Ok(response)
    }

    /// JSON-RPC `get_block` by height.
    pub async fn get_block_by_height(&self, height: u64) -> Result<BlockResult, RpcError> {
        let params = GetBlockParams {
            hash: None,
            height: Some(height),
            fill_pow_hash: None,
        };
        self.get_block(&params).await
    }

    /// POST `/get_transactions`.
    pub async fn get_transactions(
        &self,
        request: &GetTransactionsRequest,
    ) -> Result<GetTransactionsResponse, RpcError> {
        let url = self.base.join("/get_transactions")?;
        let resp = self
            .client
            .post(url)
            .headers(self.auth_headers())
            .json(request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RpcError::Node(format!(
                "get_transactions HTTP {}",
                resp.status()
            )));
        }
        let response: GetTransactionsResponse = resp.json().await?;
        Self::ensure_status_ok(&response.status, "get_transactions")?;
        Ok(response)
    }

    /// `get_transactions` with `decode_as_json` set, the form payment
    /// detection consumes.
    pub async fn get_transactions_as_json(
        &self,
        hashes: &[String],
    ) -> Result<GetTransactionsResponse, RpcError> {
        let request = GetTransactionsRequest {
            txs_hashes: hashes.to_vec(),
            decode_as_json: Some(true),
            ..Default::default()
        };
        self.get_transactions(&request).await
    }
}

/// Check `base` with a short-timeout `GET /get_info`. Any HTTP 200 counts as
/// reachable; every failure maps to `false`.
pub async fn check_node(base: &str) -> bool {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return false;
    }
    let rpc = match MoneroRpc::with_timeout(trimmed.trim_end_matches('/'), None, HEALTH_CHECK_TIMEOUT)
    {
        Ok(rpc) => rpc,
        Err(_) => return false,
    };
    let url = match rpc.base.join("/get_info") {
        Ok(url) => url,
        Err(_) => return false,
    };
    match rpc.client.get(url).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

/// Partial `get_info` result (fields we commonly use).
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GetInfo {
    pub height: u64,
    pub target_height: u64,
    pub mainnet: bool,
    pub stagenet: bool,
    pub testnet: bool,
    pub nettype: String,
    pub synchronized: bool,
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TransactionPoolHashesResponse {
    pub credits: u64,
    pub status: String,
    pub top_hash: String,
    pub tx_hashes: Vec<String>,
    pub untrusted: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BlockCountResult {
    pub count: u64,
    pub status: String,
    pub untrusted: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BlockHeader {
    pub block_size: u64,
    pub depth: u64,
    pub hash: String,
    pub height: u64,
    pub major_version: u8,
    pub miner_tx_hash: String,
    pub minor_version: u8,
    pub num_txes: u64,
    pub orphan_status: bool,
    pub prev_hash: String,
    pub reward: u64,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BlockResult {
    pub blob: String,
    pub block_header: BlockHeader,
    pub credits: u64,
    pub json: String,
    pub miner_tx_hash: String,
    pub status: String,
    pub top_hash: String,
    pub tx_hashes: Vec<String>,
    pub untrusted: bool,
}

#[derive(Debug, Serialize, Clone, Default)]
#[serde(default)]
pub struct GetBlockParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_pow_hash: Option<bool>,
}

#[derive(Debug, Serialize, Clone, Default)]
#[serde(default)]
pub struct GetTransactionsRequest {
    pub txs_hashes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_as_json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GetTransactionsResponse {
    pub credits: u64,
    pub status: String,
    pub top_hash: String,
    pub txs: Vec<DaemonTransaction>,
    pub txs_as_hex: Vec<String>,
    pub txs_as_json: Vec<String>,
    #[serde(rename = "missed_tx")]
    pub missed_tx: Vec<String>,
    pub untrusted: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DaemonTransaction {
    pub as_hex: String,
    pub as_json: String,
    pub block_height: u64,
    pub confirmations: u64,
    pub double_spend_seen: bool,
    pub in_pool: bool,
    pub tx_hash: String,
    pub block_timestamp: u64,
    pub received_timestamp: u64,
    pub output_indices: Vec<u64>,
}

impl DaemonTransaction {
    /// Decode the embedded `as_json` document. A blank field or a document
    /// that does not match [`TransactionJson`] is a decode error.
    pub fn decode_json(&self) -> Result<TransactionJson, RpcError> {
        if self.as_json.trim().is_empty() {
            return Err(RpcError::Decode(format!(
                "transaction {} has no as_json body",
                self.tx_hash
            )));
        }
        serde_json::from_str(&self.as_json)
            .map_err(|e| RpcError::Decode(format!("transaction {} as_json: {e}", self.tx_hash)))
    }
}

/// The subset of a daemon-decoded transaction needed to find and unblind
/// outputs.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TransactionJson {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub unlock_time: u64,
    pub extra: Vec<u8>,
    #[serde(default)]
    pub rct_signatures: RctSignatures,
    pub vout: Vec<TxOut>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RctSignatures {
    #[serde(rename = "type", default)]
    pub rct_type: u8,
    #[serde(rename = "txnFee", default)]
    pub txn_fee: u64,
    #[serde(rename = "ecdhInfo", alias = "ecdh_info", default)]
    pub ecdh_info: Vec<EcdhInfo>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EcdhInfo {
    /// Hex-encoded encrypted amount (8 bytes for compact RingCT).
    #[serde(default)]
    pub amount: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TxOut {
    #[serde(default)]
    pub amount: u64,
    pub target: OutputTarget,
}

/// Output target: post-view-tag outputs carry `tagged_key`, older ones `key`.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct OutputTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagged_key: Option<TaggedKey>,
}

impl OutputTarget {
    pub fn one_time_key(&self) -> Option<&str> {
        self.tagged_key
            .as_ref()
            .map(|tagged| tagged.key.as_str())
            .or(self.key.as_deref())
    }

    pub fn view_tag(&self) -> Option<&str> {
        self.tagged_key
            .as_ref()
            .and_then(|tagged| tagged.view_tag.as_deref())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TaggedKey {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn deserialize_block_fixture() {
        #[derive(Deserialize)]
        struct Fixture {
            result: BlockResult,
        }
        let fixture: Fixture =
            serde_json::from_str(include_str!("../tests/fixtures/get_block.json")).unwrap();
        assert_eq!(fixture.result.status, "OK");
        assert_eq!(fixture.result.block_header.height, 3_100_000);
        assert_eq!(fixture.result.tx_hashes.len(), 2);
    }

    #[test]
    fn deserialize_transactions_fixture_and_decode_as_json() {
        let response: GetTransactionsResponse =
            serde_json::from_str(include_str!("../tests/fixtures/get_transactions.json")).unwrap();
        assert_eq!(response.status, "OK");
        assert_eq!(response.txs.len(), 1);
        let tx = response.txs[0].decode_json().unwrap();
        assert_eq!(tx.extra[0], 1);
        assert_eq!(tx.extra.len(), 44);
        assert_eq!(tx.vout.len(), 2);
        assert_eq!(tx.rct_signatures.ecdh_info.len(), 2);
        assert_eq!(tx.rct_signatures.ecdh_info[0].amount, "fa2d8a9c4ddc6e2b");
        assert_eq!(
            tx.vout[0].target.one_time_key(),
            Some("e3a1c5d1a0b9e1b6a1f4c7ba3dc0c3a9d8e42a6a9d2b0b8f2bd3f09a6c2e8a11")
        );
        assert_eq!(tx.vout[0].target.view_tag(), Some("3f"));
    }

    #[test]
    fn legacy_output_target_uses_plain_key() {
        let target: OutputTarget = serde_json::from_value(json!({ "key": "ab" })).unwrap();
        assert_eq!(target.one_time_key(), Some("ab"));
        assert_eq!(target.view_tag(), None);
    }

    #[test]
    fn blank_as_json_is_decode_error() {
        let entry = DaemonTransaction {
            tx_hash: "feed".into(),
            ..Default::default()
        };
        match entry.decode_json() {
            Err(RpcError::Decode(msg)) => assert!(msg.contains("feed")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn get_transactions_request_serialization_matches_daemon_payload() {
        let request = GetTransactionsRequest {
            txs_hashes: vec!["abc".into(), "def".into()],
            decode_as_json: Some(true),
            prune: None,
            split: None,
        };

        let serialized = serde_json::to_value(&request).unwrap();
        assert_eq!(
            serialized,
            json!({
                "txs_hashes": ["abc", "def"],
                "decode_as_json": true
            })
        );
    }

    #[tokio::test]
    async fn get_transactions_http_error_becomes_rpc_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/get_transactions");
                then.status(500).body("boom");
            })
            .await;

        let rpc = MoneroRpc::new(&server.base_url(), None).unwrap();
        let err = rpc
            .get_transactions_as_json(&["deadbeef".to_string()])
            .await
            .unwrap_err();
        mock.assert_async().await;
        match err {
            RpcError::Node(msg) => assert!(msg.contains("HTTP 500")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn pool_hashes_non_ok_status_maps_to_rpc_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/get_transaction_pool_hashes");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "status": "BUSY", "tx_hashes": [] }));
            })
            .await;

        let rpc = MoneroRpc::new(&server.base_url(), None).unwrap();
        let err = rpc.get_transaction_pool_hashes().await.unwrap_err();
        mock.assert_async().await;
        match err {
            RpcError::Node(msg) => assert!(msg.contains("status BUSY")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn block_count_reads_json_rpc_result() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/json_rpc")
                    .json_body_partial(r#"{"method":"get_block_count"}"#);
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "id": "0",
                        "jsonrpc": "2.0",
                        "result": { "count": 3_100_001u64, "status": "OK", "untrusted": false }
                    }));
            })
            .await;

        let rpc = MoneroRpc::new(&server.base_url(), None).unwrap();
        assert_eq!(rpc.get_block_count().await.unwrap(), 3_100_001);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn json_rpc_error_envelope_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/json_rpc");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "id": "0",
                        "jsonrpc": "2.0",
                        "error": { "code": -2, "message": "Requested block height too big" }
                    }));
            })
            .await;

        let rpc = MoneroRpc::new(&server.base_url(), None).unwrap();
        let err = rpc.get_block_by_height(99).await.unwrap_err();
        match err {
            RpcError::Node(msg) => {
                assert!(msg.contains("get_block"));
                assert!(msg.contains("too big"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn basic_auth_header_is_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/get_transaction_pool_hashes")
                    .header("authorization", "Basic dXNlcjpwYXNz");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "status": "OK", "tx_hashes": ["aa", "bb"] }));
            })
            .await;

        let rpc = MoneroRpc::new(
            &server.base_url(),
            Some(("user".to_string(), "pass".to_string())),
        )
        .unwrap();
        let hashes = rpc.get_transaction_pool_hashes().await.unwrap();
        mock.assert_async().await;
        assert_eq!(hashes, vec!["aa".to_string(), "bb".to_string()]);
    }

    #[tokio::test]
    async fn check_node_reports_reachability() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/get_info");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "status": "OK", "height": 10 }));
            })
            .await;

        assert!(check_node(&format!("{}/", server.base_url())).await);
        assert!(!check_node("").await);
        assert!(!check_node("not a url").await);
    }
}
