//! HTTP client for the Vendora marketplace REST API.
//!
//! This module provides the `ApiClient` struct for authentication calls and
//! for fetching the account's orders, storefront and feed data. All
//! endpoints share one `reqwest` connection pool and one bearer token slot.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::session::SelectedEntity;
use crate::models::{
    Announcement, CanId, CategoryFilter, Comment, CustomerAddress, DigitalStamp, Document,
    MarketplaceItem, Notification, Order, Profile, VendorOrder, VendorStoreReview, Voucher,
};

use super::error::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the production API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.vendora.app";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Successful login payload. The token is handed to the session store; the
/// client's own token slot is only written by the transition listener.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub token: String,
    #[serde(rename = "selectedEntity")]
    pub selected_entity: Option<SelectedEntity>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "displayName")]
    display_name: &'a str,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    #[serde(rename = "newPassword")]
    new_password: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyEmailRequest<'a> {
    token: &'a str,
}

/// API client for the Vendora backend.
/// Clone is cheap - the connection pool and the token slot are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a new API client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Set the bearer token for authenticated requests. Shared across clones.
    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap() = Some(token);
        debug!("Bearer token set on API client");
    }

    /// Drop the bearer token. Subsequent requests go out unauthenticated.
    pub fn clear_token(&self) {
        *self.token.write().unwrap() = None;
        debug!("Bearer token cleared from API client");
    }

    pub fn current_token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = self.token.read().unwrap().as_ref() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.request(Method::GET, path).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response.json().await.map_err(|e| {
                        ApiError::InvalidResponse(format!("{} (GET {})", e, path))
                    });
                }
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.request(Method::POST, path).json(body).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response.json().await.map_err(|e| {
                        ApiError::InvalidResponse(format!("{} (POST {})", e, path))
                    });
                }
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Send a request where only the status matters; the body is discarded.
    async fn send_ok<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .request(method.clone(), path)
                .json(body)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(_) => return Ok(()),
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Account Endpoints =====

    /// Exchange credentials for a token. Does not touch the client's own
    /// token slot.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post("/users/login", &LoginRequest { email, password })
            .await
    }

    /// Tell the server to drop the given token. Takes the token explicitly
    /// because the caller's local session is cleared before this call runs,
    /// which also empties the client's token slot. No retry: the local state
    /// is already gone either way.
    pub async fn logout_with_token(&self, token: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/users/logout"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<(), ApiError> {
        let request = RegisterRequest {
            email,
            password,
            display_name,
        };
        self.send_ok(Method::POST, "/users/register", &request).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.send_ok(
            Method::POST,
            "/users/forgot-password",
            &ForgotPasswordRequest { email },
        )
        .await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        self.send_ok(
            Method::POST,
            "/users/reset-password",
            &ResetPasswordRequest {
                token,
                new_password,
            },
        )
        .await
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        self.send_ok(Method::PUT, "/users/verify-email", &VerifyEmailRequest { token })
            .await
    }

    // ===== Data Fetching Methods =====

    /// Fetch the customer-side order list
    pub async fn fetch_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get("/orders").await
    }

    /// Fetch incoming orders for the account's vendor store
    pub async fn fetch_vendor_orders(&self) -> Result<Vec<VendorOrder>, ApiError> {
        self.get("/vendor/orders").await
    }

    /// Fetch registered carrier account numbers
    pub async fn fetch_can_ids(&self) -> Result<Vec<CanId>, ApiError> {
        self.get("/shipping/can-ids").await
    }

    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.get("/profile").await
    }

    pub async fn fetch_marketplace(&self) -> Result<Vec<MarketplaceItem>, ApiError> {
        self.get("/marketplace/items").await
    }

    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get("/notifications").await
    }

    /// Fetch the conversation thread for one order
    pub async fn fetch_comments(&self, order_id: i64) -> Result<Vec<Comment>, ApiError> {
        self.get(&format!("/orders/{}/comments", order_id)).await
    }

    pub async fn fetch_documents(&self) -> Result<Vec<Document>, ApiError> {
        self.get("/documents").await
    }

    pub async fn fetch_announcements(&self) -> Result<Vec<Announcement>, ApiError> {
        self.get("/announcements").await
    }

    pub async fn fetch_digital_stamps(&self) -> Result<Vec<DigitalStamp>, ApiError> {
        self.get("/shipping/digital-stamps").await
    }

    pub async fn fetch_vouchers(&self) -> Result<Vec<Voucher>, ApiError> {
        self.get("/vouchers").await
    }

    pub async fn fetch_category_filters(&self) -> Result<Vec<CategoryFilter>, ApiError> {
        self.get("/marketplace/category-filters").await
    }

    pub async fn fetch_customer_addresses(&self) -> Result<Vec<CustomerAddress>, ApiError> {
        self.get("/profile/addresses").await
    }

    pub async fn fetch_vendor_store_reviews(&self) -> Result<Vec<VendorStoreReview>, ApiError> {
        self.get("/vendor/store/reviews").await
    }
}
