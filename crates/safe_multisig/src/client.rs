//! Typed client for the Safe Transaction Service.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use tracing::{debug, trace};
use url::Url;

use std::{collections::HashMap, sync::Mutex};

use crate::{
    consts::get_transaction_service_url,
    error::{Result, SafeError},
    transaction_data::{
        ConfirmationBody, MultisigTransaction, ProposeTransactionBody, SafeInfo,
        SafeTransactionData,
    },
};

/// Access to the relay that stores proposed transactions and their confirmations.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Cached after the first successful fetch, until [`invalidate`](Self::invalidate).
    async fn get_safe_info(&self, safe: Address) -> Result<SafeInfo>;

    fn invalidate(&self, safe: Address);

    /// Every not yet executed transaction of `safe`, across all pages.
    async fn get_pending_transactions(&self, safe: Address) -> Result<Vec<MultisigTransaction>>;

    async fn get_transaction(&self, safe_tx_hash: B256) -> Result<MultisigTransaction>;

    async fn propose_transaction(
        &self,
        safe: Address,
        tx: &SafeTransactionData,
        safe_tx_hash: B256,
        sender: Address,
        signature: Bytes,
    ) -> Result<B256>;

    async fn post_confirmation(
        &self,
        safe_tx_hash: B256,
        signature: Bytes,
        owner: Address,
    ) -> Result<()>;
}

/// One page of a list endpoint.
///
/// Deserializes from a bare array, `{"results": [...]}` or `{"data": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedList<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageShape<T> {
    Bare(Vec<T>),
    Results {
        count: Option<usize>,
        next: Option<String>,
        previous: Option<String>,
        results: Vec<T>,
    },
    Data {
        data: Vec<T>,
    },
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for PagedList<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match PageShape::deserialize(deserializer)? {
            PageShape::Bare(results) | PageShape::Data { data: results } => {
                PagedList { count: results.len(), next: None, previous: None, results }
            }
            PageShape::Results { count, next, previous, results } => PagedList {
                count: count.unwrap_or(results.len()),
                next,
                previous,
                results,
            },
        })
    }
}

pub struct SafeClient {
    tx_service_url: String,
    http: Client,
    safe_info: Mutex<HashMap<Address, SafeInfo>>,
}

impl SafeClient {
    /// Client for the public transaction service of `chain_id`.
    pub fn new(chain_id: u64) -> Result<Self> {
        let tx_service_url = get_transaction_service_url(chain_id)?;
        Self::with_url(&tx_service_url)
    }

    /// Client for a custom service, e.g. `https://safe-transaction-sepolia.safe.global/api`.
    pub fn with_url(tx_service_url: &str) -> Result<Self> {
        let url = Url::parse(tx_service_url).map_err(|e| {
            SafeError::configuration(format!("invalid transaction service url {tx_service_url:?}: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SafeError::configuration(format!(
                "transaction service url must be http(s), got {tx_service_url:?}"
            )));
        }

        Ok(Self {
            tx_service_url: tx_service_url.trim_end_matches('/').to_string(),
            http: Client::new(),
            safe_info: Mutex::new(HashMap::new()),
        })
    }

    pub fn tx_service_url(&self) -> &str {
        &self.tx_service_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.tx_service_url, path)
    }

    fn cached(&self, safe: &Address) -> Option<SafeInfo> {
        self.safe_info.lock().ok().and_then(|cache| cache.get(safe).cloned())
    }
}

#[async_trait]
impl TransactionService for SafeClient {
    async fn get_safe_info(&self, safe: Address) -> Result<SafeInfo> {
        if let Some(info) = self.cached(&safe) {
            trace!(%safe, "safe info cache hit");
            return Ok(info);
        }

        let info: SafeInfo = send_json(self.http.get(self.url(&format!("safes/{safe}/")))).await?;
        validate_safe_info(&info)?;

        if let Ok(mut cache) = self.safe_info.lock() {
            cache.insert(safe, info.clone());
        }
        Ok(info)
    }

    fn invalidate(&self, safe: Address) {
        if let Ok(mut cache) = self.safe_info.lock() {
            cache.remove(&safe);
        }
    }

    async fn get_pending_transactions(&self, safe: Address) -> Result<Vec<MultisigTransaction>> {
        let mut url = self.url(&format!("safes/{safe}/multisig-transactions/?executed=false"));
        let mut pending = Vec::new();

        loop {
            let page: PagedList<MultisigTransaction> = send_json(self.http.get(&url)).await?;
            debug!(%safe, results = page.results.len(), count = page.count, "fetched pending page");
            pending.extend(page.results);

            match page.next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        // the `executed` filter is not honoured by every deployment
        pending.retain(|tx| !tx.is_executed);
        Ok(pending)
    }

    async fn get_transaction(&self, safe_tx_hash: B256) -> Result<MultisigTransaction> {
        send_json(self.http.get(self.url(&format!("multisig-transactions/{safe_tx_hash}/")))).await
    }

    async fn propose_transaction(
        &self,
        safe: Address,
        tx: &SafeTransactionData,
        safe_tx_hash: B256,
        sender: Address,
        signature: Bytes,
    ) -> Result<B256> {
        let body = ProposeTransactionBody {
            safe_tx: tx.clone(),
            contract_transaction_hash: safe_tx_hash,
            sender,
            signature,
            origin: None,
        };

        let url = self.url(&format!("safes/{safe}/multisig-transactions/"));
        send(self.http.post(url).json(&body)).await?;

        debug!(%safe, %safe_tx_hash, "transaction proposed");
        Ok(safe_tx_hash)
    }

    async fn post_confirmation(
        &self,
        safe_tx_hash: B256,
        signature: Bytes,
        owner: Address,
    ) -> Result<()> {
        let url = self.url(&format!("multisig-transactions/{safe_tx_hash}/confirmations/"));
        send(self.http.post(url).json(&ConfirmationBody { signature, owner })).await?;

        debug!(%safe_tx_hash, %owner, "confirmation posted");
        Ok(())
    }
}

/// Rejects Safe metadata the aggregator could not work with.
pub fn validate_safe_info(info: &SafeInfo) -> Result<()> {
    if info.threshold == 0 || info.threshold as usize > info.owners.len() {
        return Err(SafeError::configuration(format!(
            "invalid safe info for {}: threshold {} with {} owners",
            info.address,
            info.threshold,
            info.owners.len()
        )));
    }
    Ok(())
}

/// Sends the request and returns the raw body, or [`SafeError::Relay`] on a non-2xx status.
async fn send(request: RequestBuilder) -> Result<String> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SafeError::Relay { status: status.as_u16(), body });
    }
    Ok(body)
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let body = send(request).await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction_data::SafeTransactionData;
    use alloy_primitives::{address, U256};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use std::sync::Arc;

    const SAFE: Address = address!("5AFE3855358E112B5647B952709E6165E1C1EEEe");

    type Requests = Arc<Mutex<Vec<String>>>;

    /// Answers each incoming connection with the next canned `(status, body)` and
    /// records `"METHOD /path body"` for every request.
    async fn serve(listener: TcpListener, responses: Vec<(u16, String)>) -> Requests {
        let requests: Requests = Arc::default();
        let recorded = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else { return };

                let mut raw = Vec::new();
                let mut buf = [0u8; 4096];
                let (head_len, content_length) = loop {
                    let n = stream.read(&mut buf).await.unwrap();
                    raw.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&raw);
                    if let Some(pos) = text.find("\r\n\r\n") {
                        let content_length = text[..pos]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse().ok())?
                            })
                            .unwrap_or(0usize);
                        break (pos + 4, content_length);
                    }
                };
                while raw.len() < head_len + content_length {
                    let n = stream.read(&mut buf).await.unwrap();
                    raw.extend_from_slice(&buf[..n]);
                }

                let text = String::from_utf8_lossy(&raw).to_string();
                let request_line = text.lines().next().unwrap_or_default();
                let mut parts = request_line.split(' ');
                let method = parts.next().unwrap_or_default();
                let path = parts.next().unwrap_or_default();
                recorded.lock().unwrap().push(format!("{method} {path} {}", &text[head_len..]));

                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
        });

        requests
    }

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api", listener.local_addr().unwrap());
        (listener, url)
    }

    fn relay_tx(nonce: u64, executed: bool) -> serde_json::Value {
        serde_json::json!({
            "safe": SAFE,
            "to": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045",
            "value": "0",
            "data": null,
            "operation": 0,
            "gasToken": Address::ZERO,
            "safeTxGas": "0",
            "baseGas": "0",
            "gasPrice": "0",
            "refundReceiver": Address::ZERO,
            "nonce": nonce,
            "safeTxHash": B256::with_last_byte(nonce as u8),
            "isExecuted": executed,
            "confirmations": []
        })
    }

    #[test]
    fn paged_list_accepts_all_shapes() {
        let tx = relay_tx(1, false);

        let bare: PagedList<MultisigTransaction> =
            serde_json::from_value(serde_json::json!([tx])).unwrap();
        let results: PagedList<MultisigTransaction> = serde_json::from_value(serde_json::json!({
            "count": 4, "next": "http://relay/page2", "previous": null, "results": [tx]
        }))
        .unwrap();
        let data: PagedList<MultisigTransaction> =
            serde_json::from_value(serde_json::json!({ "data": [tx] })).unwrap();

        assert_eq!(bare.results, data.results);
        assert_eq!(bare.results, results.results);
        assert_eq!(bare.count, 1);
        assert_eq!(results.count, 4);
        assert_eq!(results.next.as_deref(), Some("http://relay/page2"));
        assert!(data.next.is_none());
    }

    #[test]
    fn rejects_bad_service_urls() {
        assert!(matches!(SafeClient::with_url("not a url"), Err(SafeError::Configuration(_))));
        assert!(matches!(SafeClient::with_url("ftp://relay/api"), Err(SafeError::Configuration(_))));
        assert_eq!(SafeClient::with_url("http://relay/api/").unwrap().tx_service_url(), "http://relay/api");
    }

    #[test]
    fn safe_info_threshold_is_validated() {
        let mut info = SafeInfo {
            address: SAFE,
            nonce: U256::ZERO,
            threshold: 2,
            owners: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            version: Some("1.3.0".into()),
        };
        assert!(validate_safe_info(&info).is_ok());
        info.threshold = 3;
        assert!(validate_safe_info(&info).is_err());
        info.threshold = 0;
        assert!(validate_safe_info(&info).is_err());
    }

    #[tokio::test]
    async fn pending_follows_next_and_drops_executed() {
        let (listener, url) = listener().await;
        let page2 = format!("{url}/v1/safes/{SAFE}/multisig-transactions/?executed=false&offset=2");
        let responses = vec![
            (
                200,
                serde_json::json!({
                    "count": 3, "next": page2, "previous": null,
                    "results": [relay_tx(4, false), relay_tx(3, true)]
                })
                .to_string(),
            ),
            (200, serde_json::json!({ "data": [relay_tx(5, false)] }).to_string()),
        ];
        let requests = serve(listener, responses).await;

        let client = SafeClient::with_url(&url).unwrap();
        let pending = client.get_pending_transactions(SAFE).await.unwrap();

        let nonces: Vec<_> = pending.iter().map(|tx| tx.nonce()).collect();
        assert_eq!(nonces, vec![U256::from(4), U256::from(5)]);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with(&format!(
            "GET /api/v1/safes/{SAFE}/multisig-transactions/?executed=false "
        )));
        assert!(requests[1].contains("offset=2"));
    }

    #[tokio::test]
    async fn relay_errors_keep_the_body_verbatim() {
        let (listener, url) = listener().await;
        let body = r#"{"nonMultisigTransactionData": true}"#;
        let requests = serve(listener, vec![(400, body.to_string())]).await;

        let client = SafeClient::with_url(&url).unwrap();
        let tx = SafeTransactionData::rejection(SAFE, U256::from(1));
        let err = client
            .propose_transaction(SAFE, &tx, B256::repeat_byte(7), Address::repeat_byte(9), Bytes::new())
            .await
            .unwrap_err();

        match err {
            SafeError::Relay { status, body: returned } => {
                assert_eq!(status, 400);
                assert_eq!(returned, body);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with(&format!("POST /api/v1/safes/{SAFE}/multisig-transactions/ ")));
        assert!(requests[0].contains("contractTransactionHash"));
    }

    #[tokio::test]
    async fn safe_info_is_cached_until_invalidated() {
        let (listener, url) = listener().await;
        let info = serde_json::json!({
            "address": SAFE,
            "nonce": 7,
            "threshold": 1,
            "owners": [Address::repeat_byte(1)],
            "version": "1.3.0+L2"
        })
        .to_string();
        let requests = serve(listener, vec![(200, info.clone()), (200, info)]).await;

        let client = SafeClient::with_url(&url).unwrap();
        let first = client.get_safe_info(SAFE).await.unwrap();
        let second = client.get_safe_info(SAFE).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.nonce, U256::from(7));
        assert_eq!(requests.lock().unwrap().len(), 1);

        client.invalidate(SAFE);
        client.get_safe_info(SAFE).await.unwrap();
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn confirmation_body_is_signature_and_owner() {
        let (listener, url) = listener().await;
        let requests = serve(listener, vec![(201, String::new())]).await;

        let client = SafeClient::with_url(&url).unwrap();
        let hash = B256::repeat_byte(0x42);
        client
            .post_confirmation(hash, Bytes::from(vec![0xaa; 65]), Address::repeat_byte(1))
            .await
            .unwrap();

        let requests = requests.lock().unwrap();
        assert!(requests[0].starts_with(&format!("POST /api/v1/multisig-transactions/{hash}/confirmations/ ")));
        assert!(requests[0].contains(r#""signature":"0xaaaa"#));
        assert!(requests[0].contains(r#""owner":"0x0101010101010101010101010101010101010101""#));
    }
}
