//! Session attach
//!
//! Opens the remote-control client connection to a running Chrome's
//! debugging endpoint. Discovery goes through `/json/version` on the
//! loopback HTTP endpoint, the control connection itself is the CDP
//! websocket it advertises. One attach per process lifetime; re-attaching
//! before detaching is a precondition violation, not something this module
//! defends against.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};
use tracing::{debug, info, warn};

use ch_core::RemoteDriver;

use crate::error::{BrowserError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bound on the version handshake after the websocket is up
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// An open remote-control connection to one Chrome process
///
/// Registered in the harness driver registry under an alias; harness steps
/// resolve it from there. Owned by the lifecycle manager.
#[derive(Debug)]
pub struct ControlSession {
    debugger_url: String,
    browser_version: String,
    socket: tokio::sync::Mutex<Option<WsStream>>,
}

impl ControlSession {
    /// Connect to the debugging endpoint on `127.0.0.1:<port>`
    ///
    /// Fails if nothing listens on the port (the browser is not ready or
    /// died right after spawn) or if the CDP handshake does not complete.
    pub async fn connect(port: u16) -> Result<Self> {
        let debugger_url = discover_debugger_url(port).await?;
        debug!("Connecting control session to {}", debugger_url);

        let (mut socket, _) = connect_async(&debugger_url)
            .await
            .map_err(|e| BrowserError::Attach(format!("websocket connect failed: {}", e)))?;

        let browser_version = handshake(&mut socket).await?;
        info!("Control session attached to {}", browser_version);

        Ok(Self {
            debugger_url,
            browser_version,
            socket: tokio::sync::Mutex::new(Some(socket)),
        })
    }

    /// The websocket URL this session is connected to
    pub fn debugger_url(&self) -> &str {
        &self.debugger_url
    }

    /// Browser product string reported during the handshake
    pub fn browser_version(&self) -> &str {
        &self.browser_version
    }

    /// Whether the connection has not been quit yet
    pub async fn is_open(&self) -> bool {
        self.socket.lock().await.is_some()
    }
}

#[async_trait]
impl RemoteDriver for ControlSession {
    async fn quit(&self) -> ch_core::Result<()> {
        let mut guard = self.socket.lock().await;
        match guard.take() {
            Some(mut socket) => {
                socket
                    .close(None)
                    .await
                    .map_err(|e| ch_core::Error::Driver(format!("close failed: {}", e)))?;
                debug!("Control session closed");
                Ok(())
            }
            None => Err(ch_core::Error::Driver(
                "control session already closed".to_string(),
            )),
        }
    }
}

/// Ask the HTTP side of the debugging endpoint for the websocket URL
async fn discover_debugger_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/version", port);
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| BrowserError::Attach(format!("http client: {}", e)))?;

    let version: serde_json::Value = client
        .get(&url)
        .send()
        .await
        .map_err(|e| BrowserError::Attach(format!("no debugging endpoint at {}: {}", url, e)))?
        .json()
        .await
        .map_err(|e| BrowserError::Attach(format!("bad /json/version response: {}", e)))?;

    version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            BrowserError::Attach("endpoint reported no webSocketDebuggerUrl".to_string())
        })
}

/// One round-trip CDP call proving the connection is live
///
/// Sends `Browser.getVersion` and waits for the matching response id,
/// returning the product string.
async fn handshake(socket: &mut WsStream) -> Result<String> {
    let request = json!({"id": 1, "method": "Browser.getVersion"}).to_string();
    socket
        .send(WsMessage::Text(request.into()))
        .await
        .map_err(|e| BrowserError::Attach(format!("handshake send failed: {}", e)))?;

    let response = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        while let Some(message) = socket.next().await {
            match message {
                Ok(WsMessage::Text(text)) => {
                    let value: serde_json::Value = match serde_json::from_str(&text) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!("Unparseable CDP message during handshake: {}", e);
                            continue;
                        }
                    };
                    if value.get("id").and_then(|v| v.as_u64()) == Some(1) {
                        return Ok(value);
                    }
                    // Events may arrive before our response; keep reading
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(BrowserError::Attach(format!("handshake read failed: {}", e)));
                }
            }
        }
        Err(BrowserError::Attach("connection closed during handshake".to_string()))
    })
    .await
    .map_err(|_| BrowserError::Attach("handshake timed out".to_string()))??;

    let product = response
        .pointer("/result/product")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown browser")
        .to_string();
    Ok(product)
}
