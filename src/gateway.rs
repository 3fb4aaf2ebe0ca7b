//! Upstream proxy used by the gateway
//!
//! Forwards a request to one of the backend services, carrying the caller's
//! `Authorization` header byte for byte, and relays status and body back.

use crate::config::UpstreamConfig;
use crate::error::AppError;
use axum::{
    body::Bytes,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, Method,
    },
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::debug;
use url::Url;

/// Backend services behind the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Users,
    Customers,
    Sales,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Users => write!(f, "user-service"),
            Upstream::Customers => write!(f, "customer-service"),
            Upstream::Sales => write!(f, "sales-service"),
        }
    }
}

pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn base(&self, upstream: Upstream) -> &Url {
        match upstream {
            Upstream::Users => &self.config.user_service,
            Upstream::Customers => &self.config.customer_service,
            Upstream::Sales => &self.config.sales_service,
        }
    }

    /// Forward one request. `path_and_query` is resolved against the
    /// service's base URL.
    pub async fn forward(
        &self,
        upstream: Upstream,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let url = self
            .base(upstream)
            .join(path_and_query)
            .map_err(|e| AppError::Internal(format!("Cannot build {} URL: {}", upstream, e)))?;

        debug!(%upstream, %method, %url, "forwarding request");

        let mut request = self.client.request(method, url);
        if let Some(authorization) = headers.get(AUTHORIZATION) {
            request = request.header(AUTHORIZATION, authorization.clone());
        }
        if let Some(content_type) = headers.get(CONTENT_TYPE) {
            request = request.header(CONTENT_TYPE, content_type.clone());
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let reply = request.send().await?;
        let status = reply.status();
        let content_type = reply.headers().get(CONTENT_TYPE).cloned();
        let bytes = reply.bytes().await?;

        debug!(%upstream, %status, "upstream replied");

        let mut response = (status, bytes).into_response();
        if let Some(content_type) = content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        Ok(response)
    }
}
