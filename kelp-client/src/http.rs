//! HTTP adapter for the order store CRUD surface

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::models::order::{Order, OrderStatus};
use shared::response::ApiResponse;

use crate::config::BoardConfig;
use crate::error::{ClientResult, StoreError};
use crate::persist::{OrderFilters, OrderStore};

/// HTTP-backed order store
///
/// Thin adapter over the store's REST surface; carries no state beyond
/// the connection pool and the bearer token.
#[derive(Debug, Clone)]
pub struct HttpOrderStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpOrderStore {
    /// Create an HTTP store adapter from configuration
    pub fn new(config: &BoardConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        }
    }

    /// Set the authentication token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Build authorization header value
    fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_header() {
            Some(auth) => request.header(reqwest::header::AUTHORIZATION, auth),
            None => request,
        }
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.authorized(self.client.get(self.url(path)));
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Make a PATCH request with JSON body
    async fn patch<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.authorized(self.client.patch(self.url(path)).json(body));
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Make a DELETE request
    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.authorized(self.client.delete(self.url(path)));
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return match status {
                StatusCode::UNAUTHORIZED => Err(StoreError::Unauthorized),
                StatusCode::NOT_FOUND => Err(StoreError::NotFound(text)),
                StatusCode::BAD_REQUEST => Err(StoreError::Validation(text)),
                _ => Err(StoreError::Internal(text)),
            };
        }

        response.json().await.map_err(Into::into)
    }

    fn unwrap_data<T>(response: ApiResponse<T>) -> ClientResult<T> {
        if !response.is_success() {
            return Err(StoreError::Internal(response.message));
        }
        response
            .data
            .ok_or_else(|| StoreError::InvalidResponse("Missing data field".to_string()))
    }
}

#[async_trait]
impl OrderStore for HttpOrderStore {
    async fn fetch_active_orders(
        &self,
        restaurant_id: &str,
        filters: &OrderFilters,
    ) -> ClientResult<Vec<Order>> {
        let mut path = format!("api/orders/active?restaurant_id={}", restaurant_id);
        for status in &filters.statuses {
            path.push_str(&format!("&status={}", status));
        }
        if let Some(table) = &filters.table_name {
            path.push_str(&format!("&table={}", table));
        }

        let response: ApiResponse<Vec<Order>> = self.get(&path).await?;
        Self::unwrap_data(response)
    }

    async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()> {
        #[derive(serde::Serialize)]
        struct SetStatusRequest {
            status: OrderStatus,
        }

        let response: ApiResponse<serde_json::Value> = self
            .patch(
                &format!("api/orders/{}/status", order_id),
                &SetStatusRequest { status },
            )
            .await?;

        if !response.is_success() {
            return Err(StoreError::Internal(response.message));
        }
        Ok(())
    }

    async fn fetch_order(&self, order_id: &str) -> ClientResult<Option<Order>> {
        match self
            .get::<ApiResponse<Order>>(&format!("api/orders/{}", order_id))
            .await
        {
            Ok(response) => Ok(Some(Self::unwrap_data(response)?)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_order(&self, order_id: &str) -> ClientResult<()> {
        let response: ApiResponse<serde_json::Value> =
            self.delete(&format!("api/orders/{}", order_id)).await?;

        if !response.is_success() {
            return Err(StoreError::Internal(response.message));
        }
        Ok(())
    }
}
