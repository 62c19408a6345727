//! Common test utilities - DicedTest harness for end-to-end testing

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use diced::{Config, Server};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Test harness that spawns a real diced server on a random port
pub struct DicedTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl DicedTest {
    /// Start a server with rate limiting relaxed enough for tests
    pub async fn start() -> Result<Self> {
        Self::start_with(|config| {
            config.min_request_interval_ms = 0;
        })
        .await
    }

    /// Start a server, adjusting the default test config first
    pub async fn start_with(adjust: impl FnOnce(&mut Config)) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let mut config = Config {
            bind_addr: addr,
            seed: Some(1234),
            ..Config::default()
        };
        adjust(&mut config);

        let server = Arc::new(Server::new(config));
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// POST a raw JSON-RPC body to /rpc as the given caller
    pub async fn rpc_raw(&self, client_id: &str, body: String) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/rpc", self.base_url()))
            .header("x-client-id", client_id)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await?)
    }

    /// Call a JSON-RPC method and return the parsed response
    pub async fn rpc(&self, client_id: &str, id: u64, method: &str, params: Value) -> Result<Value> {
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let resp = self.rpc_raw(client_id, body.to_string()).await?;
        anyhow::ensure!(resp.status() == 200, "unexpected status {}", resp.status());
        Ok(resp.json().await?)
    }

    /// Call a tool and return the structured envelope
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let resp = self
            .rpc("tester", 1, "tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(resp["result"]["structuredContent"].clone())
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for DicedTest {
    fn drop(&mut self) {
        self.shutdown();
    }
}
