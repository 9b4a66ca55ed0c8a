use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, trace};

use super::ChainClient;
use crate::helpers::app_config::AppConfig;
use crate::helpers::hex::{parse_hex_u64, to_hex_quantity};
use crate::interfaces::error::ChainError;
use crate::interfaces::rpc::{
    RawBlock, RpcRequest, RpcResponse, METHOD_BLOCK_NUMBER, METHOD_GET_BLOCK_BY_NUMBER,
};

/// JSON-RPC over HTTP POST.
///
/// Every request waits `delay` before being sent. The delay only paces the
/// node; failed requests are not retried here.
pub struct JsonRpcChainClient {
    client: Client,
    url: String,
    delay: Duration,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    pub fn new(url: &str, delay: Duration, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Connectivity(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            delay,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ChainError> {
        Self::new(
            &config.rpc_url(),
            config.request_delay(),
            config.request_timeout(),
        )
    }

    async fn rpc_request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        sleep(self.delay).await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!("rpc #{id} {method} {params}");
        let request = RpcRequest::new(id, method, params);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: RpcResponse = response.json().await?;

        into_result(method, body)
    }
}

fn into_result(method: &str, body: RpcResponse) -> Result<Value, ChainError> {
    if let Some(error) = body.error {
        return Err(ChainError::Protocol(format!(
            "{method} failed with code {}: {}",
            error.code, error.message
        )));
    }
    Ok(body.result.unwrap_or(Value::Null))
}

fn parse_block_number(value: &Value) -> Result<u64, ChainError> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::Protocol(format!("expected a hex quantity, got {value}")))?;
    parse_hex_u64("result", text).map_err(|e| ChainError::Protocol(e.to_string()))
}

fn parse_block(value: Value) -> Result<Option<RawBlock>, ChainError> {
    serde_json::from_value(value)
        .map_err(|e| ChainError::Protocol(format!("unexpected block object: {e}")))
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn fetch_highest_block_number(&self) -> Result<u64, ChainError> {
        let result = self.rpc_request(METHOD_BLOCK_NUMBER, json!([])).await?;
        let number = parse_block_number(&result)?;
        debug!("Highest block found on the node: {}", number);
        Ok(number)
    }

    async fn fetch_block(&self, number: u64) -> Result<Option<RawBlock>, ChainError> {
        let result = self
            .rpc_request(
                METHOD_GET_BLOCK_BY_NUMBER,
                json!([to_hex_quantity(number), true]),
            )
            .await?;
        parse_block(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    /// Answers each connection with the next canned body and returns the raw
    /// requests it saw.
    async fn serve(bodies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
            requests
        });

        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn client(url: &str, delay: Duration) -> JsonRpcChainClient {
        JsonRpcChainClient::new(url, delay, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_the_frontier() {
        let (url, server) = serve(vec![r#"{"jsonrpc":"2.0","id":0,"result":"0xf4241"}"#]).await;

        let number = client(&url, Duration::ZERO)
            .fetch_highest_block_number()
            .await
            .unwrap();

        assert_eq!(number, 1_000_001);
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST "));
        assert!(requests[0].contains(r#""method":"eth_blockNumber""#));
        assert!(requests[0].contains(r#""params":[]"#));
    }

    #[tokio::test]
    async fn requests_blocks_with_full_transactions() {
        let (url, server) = serve(vec![
            r#"{"jsonrpc":"2.0","id":0,"result":{"number":"0xf4241","hash":"0xcb5c","transactions":[]}}"#,
        ])
        .await;

        let block = client(&url, Duration::ZERO)
            .fetch_block(1_000_001)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(block.number.as_deref(), Some("0xf4241"));
        assert_eq!(block.transactions, Some(vec![]));
        let requests = server.await.unwrap();
        assert!(requests[0].contains(r#""method":"eth_getBlockByNumber""#));
        assert!(requests[0].contains(r#""params":["0xf4241",true]"#));
    }

    #[tokio::test]
    async fn null_block_means_not_yet_available() {
        let (url, _server) = serve(vec![r#"{"jsonrpc":"2.0","id":0,"result":null}"#]).await;

        let block = client(&url, Duration::ZERO).fetch_block(99).await.unwrap();

        assert!(block.is_none());
    }

    #[tokio::test]
    async fn rpc_errors_are_protocol_errors() {
        let (url, _server) = serve(vec![
            r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32601,"message":"method not found"}}"#,
        ])
        .await;

        let err = client(&url, Duration::ZERO)
            .fetch_highest_block_number()
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::Protocol(msg) if msg.contains("-32601")));
    }

    #[tokio::test]
    async fn non_hex_frontier_is_a_protocol_error() {
        let (url, _server) = serve(vec![r#"{"jsonrpc":"2.0","id":0,"result":1234}"#]).await;

        let err = client(&url, Duration::ZERO)
            .fetch_highest_block_number()
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::Protocol(_)));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_connectivity_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"), Duration::ZERO)
            .fetch_highest_block_number()
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::Connectivity(_)));
    }

    #[tokio::test]
    async fn waits_before_every_request() {
        let (url, _server) = serve(vec![
            r#"{"jsonrpc":"2.0","id":0,"result":"0x1"}"#,
            r#"{"jsonrpc":"2.0","id":1,"result":"0x2"}"#,
        ])
        .await;
        let client = client(&url, Duration::from_millis(40));

        let start = Instant::now();
        assert_eq!(client.fetch_highest_block_number().await.unwrap(), 1);
        assert_eq!(client.fetch_highest_block_number().await.unwrap(), 2);

        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
