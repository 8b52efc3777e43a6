//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chet_api::AppState;
use chet_core::config::{AppConfig, HubConfig, SecretsConfig};
use chet_realtime::{ChatHub, ConnectionHandle, ManualClock, OutboundFrame};

pub const ADMIN_SECRET: &str = "admin-secret";
pub const OWNER_SECRET: &str = "owner-secret";
pub const VIP_SECRET: &str = "vip-secret";

/// Hub configuration used by every test.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.hub = HubConfig {
        channel_history_capacity: 5,
        secrets: SecretsConfig {
            owner: Some(OWNER_SECRET.into()),
            admin: Some(ADMIN_SECRET.into()),
            vip: Some(VIP_SECRET.into()),
        },
        ..HubConfig::default()
    };
    config
}

pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

/// A hub driven directly through in-memory Session queues.
pub struct TestHub {
    pub hub: ChatHub,
    pub clock: ManualClock,
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_config(test_config().hub)
    }

    pub fn with_config(config: HubConfig) -> Self {
        let clock = ManualClock::default();
        let hub = ChatHub::new(config, Arc::new(clock.clone()));
        Self { hub, clock }
    }

    /// Opens a Session without joining.
    pub fn connect(&self, origin: IpAddr) -> TestClient {
        let (handle, rx) = self.hub.connect(origin);
        TestClient {
            hub: self.hub.clone(),
            handle,
            rx,
        }
    }

    /// Opens a Session and joins as `name`, discarding the join replies.
    pub fn join(&self, name: &str) -> TestClient {
        self.join_with(name, json!({}), ip(1))
    }

    /// Joins with the admin secret.
    pub fn join_admin(&self, name: &str) -> TestClient {
        self.join_with(name, json!({"secrets": [ADMIN_SECRET]}), ip(1))
    }

    /// Joins with the owner secret.
    pub fn join_owner(&self, name: &str) -> TestClient {
        self.join_with(name, json!({"secrets": [OWNER_SECRET]}), ip(1))
    }

    /// Joins with extra `join` fields from `extra`.
    pub fn join_with(&self, name: &str, extra: Value, origin: IpAddr) -> TestClient {
        let mut client = self.connect(origin);
        let mut frame = json!({"type": "join", "displayName": name});
        if let (Some(frame), Some(extra)) = (frame.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                frame.insert(k.clone(), v.clone());
            }
        }
        client.send(frame);
        let joined = client.expect("joined");
        assert!(joined["displayName"].is_string());
        client
    }

    /// Drains every client's queue.
    pub fn drain_all(&self, clients: &mut [&mut TestClient]) {
        for client in clients.iter_mut() {
            client.drain();
        }
    }
}

/// One in-memory Session.
pub struct TestClient {
    pub hub: ChatHub,
    pub handle: Arc<ConnectionHandle>,
    pub rx: mpsc::Receiver<OutboundFrame>,
}

impl TestClient {
    /// Sends one inbound frame.
    pub fn send(&self, frame: Value) {
        self.hub.handle_text(&self.handle.id, &frame.to_string());
    }

    /// Sends raw text.
    pub fn send_raw(&self, raw: &str) {
        self.hub.handle_text(&self.handle.id, raw);
    }

    /// Every queued text frame, parsed. Records whether a Close was queued.
    pub fn drain(&mut self) -> Vec<Value> {
        self.drain_frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => serde_json::from_str(&text).ok(),
                OutboundFrame::Close => None,
            })
            .collect()
    }

    pub fn drain_frames(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Queued frames of the given `type`.
    pub fn frames_of(&mut self, kind: &str) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|f| f["type"] == kind)
            .collect()
    }

    /// The first queued frame of the given `type`; panics if absent.
    pub fn expect(&mut self, kind: &str) -> Value {
        let frames = self.drain();
        frames
            .iter()
            .find(|f| f["type"] == kind)
            .cloned()
            .unwrap_or_else(|| panic!("expected a '{kind}' frame, got {frames:?}"))
    }

    /// The `error` frame from the queue; panics if absent.
    pub fn expect_error(&mut self, kind: &str) -> Value {
        let err = self.expect("error");
        assert_eq!(err["kind"], kind, "unexpected error frame {err}");
        err
    }

    pub fn name(&self) -> Option<String> {
        self.hub
            .registry()
            .by_conn(&self.handle.id)
            .map(|m| m.display_name)
    }
}

/// A real server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: ChatHub,
    pub router: Router,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(test_config()).await
    }

    /// A server that treats the loopback peer as a trusted proxy.
    pub async fn start_behind_proxy() -> Self {
        let mut config = test_config();
        config.hub.trust_forwarded_for = true;
        config.hub.trusted_proxies = vec![IpAddr::V4(Ipv4Addr::LOCALHOST)];
        Self::start_with(config).await
    }

    pub async fn start_with(config: AppConfig) -> Self {
        let hub = chet_api::build_hub(&config);
        let router = chet_api::build_app(AppState::new(config, hub.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        let serve_hub = hub.clone();
        let app = router.clone();
        tokio::spawn(async move {
            let _ = chet_api::serve(
                listener,
                app,
                serve_hub,
                std::future::pending(),
                Duration::from_secs(1),
            )
            .await;
        });

        Self { addr, hub, router }
    }

    /// Opens a WebSocket, optionally claiming an `X-Forwarded-For` origin.
    pub async fn ws(&self, forwarded_for: Option<&str>) -> WsClient {
        let mut request = format!("ws://{}/ws", self.addr)
            .into_client_request()
            .expect("client request");
        if let Some(origin) = forwarded_for {
            request
                .headers_mut()
                .insert("x-forwarded-for", origin.parse().expect("header value"));
        }
        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("websocket connect");
        WsClient { stream }
    }
}

/// A WebSocket test client.
pub struct WsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send(&mut self, frame: Value) {
        self.stream
            .send(Message::text(frame.to_string()))
            .await
            .expect("send frame");
    }

    /// Next JSON frame, or `None` once the server closed the socket.
    pub async fn next_json(&mut self) -> Option<Value> {
        loop {
            let next = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("timed out waiting for a frame")?;
            match next {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(text.as_str()).expect("json frame"));
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
    }

    /// Reads until a frame of `type` arrives.
    pub async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            match self.next_json().await {
                Some(frame) if frame["type"] == kind => return frame,
                Some(_) => continue,
                None => panic!("socket closed before a '{kind}' frame"),
            }
        }
    }
}
