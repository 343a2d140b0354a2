//! JSON-RPC over HTTP provider for node-managed accounts (Hardhat, Anvil).

use crate::errors::{ProviderRpcError, SessionError};
use crate::ports::outbound::{methods, Eip1193Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// `null` is a valid result (pending receipt).
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ProviderRpcError>,
}

impl JsonRpcResponse {
    fn into_result(self) -> Result<Value, ProviderRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}

/// Provider backed by a node's HTTP endpoint.
#[derive(Debug)]
pub struct HttpProvider {
    client: Client,
    url: String,
    request_id: AtomicU64,
}

impl HttpProvider {
    /// Creates a provider for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(2)))
            .build()
            .map_err(|e| SessionError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };
        debug!(method, id = request.id, url = %self.url, "json-rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderRpcError::disconnected(format!("cannot reach {}: {e}", self.url))
                } else {
                    ProviderRpcError::internal(e.to_string())
                }
            })?;

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderRpcError::internal(format!("invalid response: {e}")))?;
        body.into_result()
    }
}

#[async_trait]
impl Eip1193Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        match self.call(method, params.clone()).await {
            // Nodes expose unlocked accounts without a prompt
            Err(e) if method == methods::REQUEST_ACCOUNTS && e.is_unsupported_method() => {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.call(methods::ACCOUNTS, params).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    /// Answers one JSON-RPC request per connection, like a node without
    /// wallet methods: `eth_requestAccounts` is -32601, `eth_accounts`
    /// lists `accounts`.
    async fn node_without_wallet(accounts: Value) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                answer(stream, &accounts, &log).await;
            }
        });
        (url, seen)
    }

    async fn answer(stream: TcpStream, accounts: &Value, seen: &Mutex<Vec<String>>) {
        let mut reader = BufReader::new(stream);
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.unwrap();

        let request: Value = serde_json::from_slice(&body).unwrap();
        let method = request["method"].as_str().unwrap().to_string();
        seen.lock().push(method.clone());
        let reply = match method.as_str() {
            methods::ACCOUNTS => json!({"jsonrpc": "2.0", "id": request["id"], "result": accounts}),
            _ => json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32601, "message": "method not found"}
            }),
        }
        .to_string();

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{reply}",
            reply.len()
        );
        let mut stream = reader.into_inner();
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    #[test]
    fn test_request_envelope() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: methods::CHAIN_ID,
            params: json!([]),
            id: 7,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"jsonrpc": "2.0", "method": "eth_chainId", "params": [], "id": 7})
        );
    }

    #[test]
    fn test_null_result_is_kept() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_error_response() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        let err = response.into_result().unwrap_err();
        assert!(err.is_unsupported_method());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_disconnected() {
        let provider = HttpProvider::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = provider
            .request(methods::CHAIN_ID, json!([]))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::DISCONNECTED);
    }

    #[tokio::test]
    async fn test_request_accounts_falls_back_to_accounts() {
        let accounts = json!(["0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0"]);
        let (url, seen) = node_without_wallet(accounts.clone()).await;
        let provider = HttpProvider::new(url, Duration::from_secs(5)).unwrap();

        let result = provider
            .request(methods::REQUEST_ACCOUNTS, json!([]))
            .await
            .unwrap();
        assert_eq!(result, accounts);
        assert_eq!(
            *seen.lock(),
            vec![methods::REQUEST_ACCOUNTS.to_string(), methods::ACCOUNTS.to_string()]
        );
    }

    #[tokio::test]
    async fn test_unsupported_method_is_not_retried() {
        let (url, seen) = node_without_wallet(json!([])).await;
        let provider = HttpProvider::new(url, Duration::from_secs(5)).unwrap();

        let err = provider
            .request(methods::CHAIN_ID, json!([]))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_method());
        assert_eq!(*seen.lock(), vec![methods::CHAIN_ID.to_string()]);
    }
}
