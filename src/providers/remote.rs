//! Remote tool provider
//!
//! Speaks the streamable HTTP JSON-RPC protocol from [`super::protocol`]:
//! `initialize` opens a session (the server may hand back a session id
//! header), `tools/list` populates the capability list, and `tools/call`
//! forwards invocations. Connection attempts are retried with exponential
//! backoff; calls are retried a bounded number of times with a fixed delay.
//! Failover to other providers is the router's job, never this one's.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::protocol::{CallToolResult, RpcRequest, RpcResponse, WireTool};
use super::{ResultEnvelope, ToolDescriptor, ToolProvider};
use crate::config::ProviderServiceConfig;
use crate::error::{Error, Result};

/// Remote session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Calling,
}

/// Open-session bookkeeping
#[derive(Debug, Default)]
struct SessionHandle {
    /// Session id echoed back to the server on every frame, when assigned
    session_id: Option<String>,
}

/// Tool provider backed by a remote streamable tool server
pub struct RemoteProvider {
    id: String,
    endpoint: Url,
    api_key: Option<SecretString>,
    http: reqwest::Client,
    timeout: Duration,
    connect_retries: u32,
    call_retries: u32,
    call_retry_delay: Duration,
    next_id: AtomicU64,
    session: RwLock<Option<SessionHandle>>,
    capabilities: RwLock<Vec<String>>,
    state: RwLock<SessionState>,
}

impl RemoteProvider {
    /// Create a provider from its service configuration
    pub fn new(id: impl Into<String>, config: &ProviderServiceConfig) -> Result<Self> {
        let id = id.into();
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::Config(format!("provider '{}' has no url", id)))?;
        let endpoint = Url::parse(url)
            .map_err(|e| Error::Config(format!("provider '{}' url invalid: {}", id, e)))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(Error::Http)?;

        Ok(RemoteProvider {
            id,
            endpoint,
            api_key: config.api_key.clone(),
            http,
            timeout: Duration::from_secs(config.timeout_seconds),
            connect_retries: config.connect_retries,
            call_retries: config.call_retries.max(1),
            call_retry_delay: Duration::from_millis(config.call_retry_delay_ms),
            next_id: AtomicU64::new(1),
            session: RwLock::new(None),
            capabilities: RwLock::new(Vec::new()),
            state: RwLock::new(SessionState::Disconnected),
        })
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    /// Send one frame and parse the response, capturing any session id the
    /// server assigns.
    async fn send_request(&self, request: RpcRequest) -> Result<RpcResponse> {
        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        if let Some(session) = self.session.read().await.as_ref() {
            if let Some(session_id) = &session.session_id {
                builder = builder.header("Mcp-Session-Id", session_id.clone());
            }
        }

        debug!("rpc -> {}: {}", self.id, request.method);
        let response = builder.send().await?;

        let assigned_session = response
            .headers()
            .get("Mcp-Session-Id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Connection(format!(
                "tool server '{}' returned {}: {}",
                self.id, status, body
            )));
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| {
            Error::Connection(format!("invalid response from '{}': {}", self.id, e))
        })?;

        if let Some(session_id) = assigned_session {
            let mut session = self.session.write().await;
            if let Some(handle) = session.as_mut() {
                handle.session_id = Some(session_id);
            } else {
                *session = Some(SessionHandle {
                    session_id: Some(session_id),
                });
            }
        }

        if let Some(error) = &parsed.error {
            return Err(Error::Provider(format!(
                "rpc error from '{}': {} (code {})",
                self.id, error.message, error.code
            )));
        }

        Ok(parsed)
    }

    async fn send_with_timeout(&self, request: RpcRequest) -> Result<RpcResponse> {
        match tokio::time::timeout(self.timeout, self.send_request(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "tool server '{}' did not answer within {}s",
                self.id,
                self.timeout.as_secs()
            ))),
        }
    }

    /// One connection attempt: handshake, then best-effort catalog fetch.
    async fn try_connect(&self) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut session = self.session.write().await;
            *session = Some(SessionHandle::default());
        }

        let response = self.send_with_timeout(RpcRequest::initialize(id)).await?;
        debug!("session to '{}' initialized: {:?}", self.id, response.result);

        // Capabilities come from the initial catalog; a failure here leaves
        // them empty but the connection open (the server may expose tools
        // later).
        match self.fetch_tools().await {
            Ok(tools) => {
                let mut capabilities = self.capabilities.write().await;
                *capabilities = tools.into_iter().map(|t| t.name).collect();
                debug!("'{}' exposes {} tools", self.id, capabilities.len());
            }
            Err(e) => {
                warn!("initial tool list from '{}' failed: {}", self.id, e);
                self.capabilities.write().await.clear();
            }
        }

        Ok(())
    }

    /// Fetch the live catalog over the open session
    async fn fetch_tools(&self) -> Result<Vec<WireTool>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = self.send_with_timeout(RpcRequest::list_tools(id)).await?;

        let result = response.result.unwrap_or_default();
        let tools: Vec<WireTool> = result
            .get("tools")
            .and_then(|t| serde_json::from_value(t.clone()).ok())
            .unwrap_or_default();
        Ok(tools)
    }
}

#[async_trait]
impl ToolProvider for RemoteProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn capabilities(&self) -> Vec<String> {
        self.capabilities.read().await.clone()
    }

    async fn is_available(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn connect(&self) -> Result<()> {
        if self.session.read().await.is_some() {
            return Ok(());
        }
        self.set_state(SessionState::Connecting).await;

        let mut backoff = ExponentialBackoff {
            max_elapsed_time: None,
            ..Default::default()
        };
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_connect().await {
                Ok(()) => {
                    self.set_state(SessionState::Ready).await;
                    return Ok(());
                }
                Err(e) => {
                    *self.session.write().await = None;
                    if attempt > self.connect_retries {
                        self.set_state(SessionState::Disconnected).await;
                        return Err(e);
                    }
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_secs(1));
                    warn!(
                        "connect to '{}' failed (attempt {}): {}; retrying in {:?}",
                        self.id, attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn disconnect(&self) {
        // Idempotent: a second disconnect finds no session and does nothing.
        let mut session = self.session.write().await;
        if session.take().is_some() {
            debug!("session to '{}' released", self.id);
        }
        self.capabilities.write().await.clear();
        *self.state.write().await = SessionState::Disconnected;
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        if self.session.read().await.is_none() {
            return Err(Error::Connection(format!("'{}' is not connected", self.id)));
        }
        let tools = self.fetch_tools().await?;
        Ok(tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.name,
                description: tool.description,
                input_schema: tool.input_schema,
                provider_id: None,
            })
            .collect())
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<ResultEnvelope> {
        if self.session.read().await.is_none() {
            return Err(Error::Connection(format!("'{}' is not connected", self.id)));
        }

        self.set_state(SessionState::Calling).await;
        let mut last_error = None;
        for attempt in 1..=self.call_retries {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let request = RpcRequest::call_tool(id, name, arguments.clone());

            match self.send_with_timeout(request).await {
                Ok(response) => {
                    let result = response.result.unwrap_or_default();
                    let wire: CallToolResult = serde_json::from_value(result).map_err(|e| {
                        Error::Provider(format!("unparseable tool result from '{}': {}", self.id, e))
                    })?;
                    if wire.is_error {
                        warn!("remote tool '{}' on '{}' reported an error", name, self.id);
                    }
                    self.set_state(SessionState::Ready).await;
                    return Ok(ResultEnvelope::from_wire(wire));
                }
                Err(e) if e.is_retryable() && attempt < self.call_retries => {
                    warn!(
                        "call '{}' on '{}' failed (attempt {}/{}): {}",
                        name, self.id, attempt, self.call_retries, e
                    );
                    last_error = Some(e);
                    tokio::time::sleep(self.call_retry_delay).await;
                }
                Err(e) => {
                    // A transport error does not tear the session down; the
                    // next call re-attempts or surfaces the error again.
                    self.set_state(SessionState::Ready).await;
                    return Err(e);
                }
            }
        }

        self.set_state(SessionState::Ready).await;
        Err(last_error.unwrap_or_else(|| {
            Error::Provider(format!("call '{}' on '{}' exhausted retries", name, self.id))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_config(url: &str) -> ProviderServiceConfig {
        ProviderServiceConfig {
            provider_type: crate::config::ProviderType::Cloud,
            url: Some(url.to_string()),
            timeout_seconds: 5,
            connect_retries: 1,
            call_retries: 2,
            call_retry_delay_ms: 10,
            ..Default::default()
        }
    }

    fn rpc_result(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result
        }))
    }

    async fn mock_handshake(server: &MockServer, tools: Value) {
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(
                rpc_result(json!({"protocolVersion": "2024-11-05"}))
                    .insert_header("Mcp-Session-Id", "sess-1"),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(rpc_result(json!({"tools": tools})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn connect_discovers_capabilities() {
        let server = MockServer::start().await;
        mock_handshake(
            &server,
            json!([{"name": "fetch_url", "description": "Fetch a URL", "inputSchema": {"type": "object"}}]),
        )
        .await;

        let provider = RemoteProvider::new("cloud", &provider_config(&server.uri())).unwrap();
        provider.connect().await.unwrap();

        assert!(provider.is_available().await);
        assert_eq!(provider.state().await, SessionState::Ready);
        assert_eq!(provider.capabilities().await, vec!["fetch_url"]);

        let tools = provider.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "fetch_url");
    }

    #[tokio::test]
    async fn call_normalizes_wire_results() {
        let server = MockServer::start().await;
        mock_handshake(&server, json!([{"name": "fetch_url"}])).await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(rpc_result(json!({
                "content": [{"type": "text", "text": "<html>ok</html>"}],
                "isError": false
            })))
            .mount(&server)
            .await;

        let provider = RemoteProvider::new("cloud", &provider_config(&server.uri())).unwrap();
        provider.connect().await.unwrap();

        let envelope = provider
            .call("fetch_url", json!({"url": "http://x"}))
            .await
            .unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.payload.as_str(), Some("<html>ok</html>"));
        assert_eq!(provider.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn call_retries_transport_failures() {
        let server = MockServer::start().await;
        mock_handshake(&server, json!([])).await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(rpc_result(json!({
                "content": [{"type": "text", "text": "recovered"}],
                "isError": false
            })))
            .mount(&server)
            .await;

        let provider = RemoteProvider::new("cloud", &provider_config(&server.uri())).unwrap();
        provider.connect().await.unwrap();

        let envelope = provider.call("fetch_url", json!({})).await.unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.payload.as_str(), Some("recovered"));
    }

    #[tokio::test]
    async fn failed_catalog_fetch_leaves_connection_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(rpc_result(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = RemoteProvider::new("cloud", &provider_config(&server.uri())).unwrap();
        provider.connect().await.unwrap();

        assert!(provider.is_available().await);
        assert!(provider.capabilities().await.is_empty());
    }

    #[tokio::test]
    async fn connect_gives_up_after_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = RemoteProvider::new("cloud", &provider_config(&server.uri())).unwrap();
        let result = provider.connect().await;
        assert!(result.is_err());
        assert!(!provider.is_available().await);
        assert_eq!(provider.state().await, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let server = MockServer::start().await;
        mock_handshake(&server, json!([])).await;

        let provider = RemoteProvider::new("cloud", &provider_config(&server.uri())).unwrap();
        provider.connect().await.unwrap();
        provider.disconnect().await;
        provider.disconnect().await;
        assert!(!provider.is_available().await);
    }
}
