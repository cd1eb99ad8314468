use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use std::net::SocketAddr;
use std::sync::Arc;
use crate::api::AppState;
use crate::auth::gate::{resolve_client_ip, AccessAttempt};
use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Axum extractor that runs the authorization gate.
/// Add this as a handler parameter to make the route privileged.
/// Every rejection is the same 403, whichever check failed.
pub struct ApiKeyAuth {
    pub client_ip: String,
}

impl FromRequestParts<Arc<AppState>> for ApiKeyAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let forwarded_for = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let client_ip = resolve_client_ip(forwarded_for, peer, state.trust_forwarded_for);

        let credential = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok());

        let attempt = AccessAttempt {
            client_ip: &client_ip,
            credential,
            method: parts.method.as_str(),
            path: parts.uri.path(),
            user_agent,
        };

        state.gate.authorize(&attempt).await.into_result()?;

        Ok(ApiKeyAuth { client_ip })
    }
}
