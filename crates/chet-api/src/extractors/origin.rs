//! `ClientOrigin` extractor: the network origin a Session is attributed to.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use chet_core::config::HubConfig;

use crate::error::ApiError;
use crate::state::AppState;

/// Network origin of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOrigin(pub IpAddr);

/// First parseable `X-Forwarded-For` entry.
pub fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
}

impl FromRequestParts<AppState> for ClientOrigin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(resolve_origin(&state.config.hub, peer, &parts.headers)))
    }
}

/// Origin for a request from `peer`: the forwarded client when `peer` is a
/// trusted proxy, else `peer` itself.
pub fn resolve_origin(config: &HubConfig, peer: Option<IpAddr>, headers: &HeaderMap) -> IpAddr {
    let Some(peer) = peer else {
        tracing::debug!("No peer address available, attributing to 0.0.0.0");
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };

    if config.trusts_proxy(&peer) {
        if let Some(client) = forwarded_for(headers) {
            return client;
        }
    } else if headers.contains_key("x-forwarded-for") {
        tracing::debug!(peer = %peer, "Ignoring X-Forwarded-For from untrusted peer");
    }
    peer
}
