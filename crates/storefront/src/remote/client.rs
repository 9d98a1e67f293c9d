//! HTTP implementation of the backend transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shopfront_core::{
    Cart, CartItemRequest, Credential, DeviceToken, DeviceTokenRequest, ErrorBody, LineWrite,
    Product, ProductId, StoreId,
};
use tracing::{debug, instrument};
use url::Url;

use super::{CartApi, CatalogApi, DeviceTokenApi, RemoteError};
use crate::config::EngineConfig;

/// Client for the Shopfront backend's JSON API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client with the configured base URL and request timeout.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Network` if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.clone(),
            }),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
    ) -> Result<RequestBuilder, RemoteError> {
        let url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| RemoteError::Network(format!("invalid path '{path}': {e}")))?;
        let request = self.inner.client.request(method, url);
        Ok(match credential {
            Some(credential) => request.bearer_auth(credential.expose()),
            None => request,
        })
    }

    /// Send a request, returning the body of a 2xx response.
    async fn execute(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            return Ok(body);
        }

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned server error"
            );
        } else {
            debug!(status = %status, "Backend rejected request");
        }
        Err(classify(status, &body))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            RemoteError::Decode(e.to_string())
        })
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Network(err.to_string())
    }
}

/// Map a non-success response onto the transport error taxonomy.
fn classify(status: StatusCode, body: &str) -> RemoteError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().map_or_else(
        || body.chars().take(200).collect(),
        |error| error.message.clone(),
    );

    if status == StatusCode::UNAUTHORIZED {
        return RemoteError::Unauthorized;
    }

    if status.is_server_error() {
        return RemoteError::Server {
            status: status.as_u16(),
            message,
        };
    }

    if let Some(ErrorBody {
        error,
        product_id: Some(product_id),
        requested: Some(requested),
        available: Some(available),
        ..
    }) = parsed
        && error == "insufficient_stock"
    {
        return RemoteError::InsufficientStock {
            product_id,
            requested,
            available,
        };
    }

    RemoteError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl CartApi for ApiClient {
    #[instrument(skip(self, credential))]
    async fn fetch_cart(
        &self,
        credential: &Credential,
        store_id: StoreId,
    ) -> Result<Cart, RemoteError> {
        let request = self.request(
            Method::GET,
            &format!("api/stores/{store_id}/cart"),
            Some(credential),
        )?;
        self.execute_json(request).await
    }

    #[instrument(skip(self, credential))]
    async fn write_item(
        &self,
        credential: &Credential,
        store_id: StoreId,
        product_id: ProductId,
        write: LineWrite,
    ) -> Result<Cart, RemoteError> {
        let request = self
            .request(
                Method::PUT,
                &format!("api/stores/{store_id}/cart/items"),
                Some(credential),
            )?
            .json(&CartItemRequest::new(product_id, write));
        self.execute_json(request).await
    }
}

#[async_trait]
impl CatalogApi for ApiClient {
    #[instrument(skip(self))]
    async fn store_products(&self, store_id: StoreId) -> Result<Vec<Product>, RemoteError> {
        let request = self.request(
            Method::GET,
            &format!("api/stores/{store_id}/products"),
            None,
        )?;
        self.execute_json(request).await
    }
}

#[async_trait]
impl DeviceTokenApi for ApiClient {
    #[instrument(skip_all, fields(token = %token))]
    async fn register_device(
        &self,
        credential: Option<&Credential>,
        token: &DeviceToken,
    ) -> Result<(), RemoteError> {
        let request = self
            .request(Method::POST, "api/device-tokens", credential)?
            .json(&DeviceTokenRequest {
                token: token.clone(),
            });
        self.execute(request).await.map(|_| ())
    }
}
