use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ApiError;
use crate::types::{AlertChannelPayload, CheckPayload, CreatedCheck, CreatedNumeric, GroupPayload};

pub const DEFAULT_BASE_URL: &str = "https://api.checklyhq.com";

/// The create/update/delete surface of the external monitoring service.
///
/// Checks are identified by strings, groups and alert channels by integers.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    async fn create_check(&self, check: &CheckPayload) -> Result<String, ApiError>;
    async fn update_check(&self, id: &str, check: &CheckPayload) -> Result<(), ApiError>;
    async fn delete_check(&self, id: &str) -> Result<(), ApiError>;

    async fn create_group(&self, group: &GroupPayload) -> Result<i64, ApiError>;
    async fn update_group(&self, id: i64, group: &GroupPayload) -> Result<(), ApiError>;
    async fn delete_group(&self, id: i64) -> Result<(), ApiError>;

    async fn create_alert_channel(&self, channel: &AlertChannelPayload) -> Result<i64, ApiError>;
    async fn update_alert_channel(
        &self,
        id: i64,
        channel: &AlertChannelPayload,
    ) -> Result<(), ApiError>;
    async fn delete_alert_channel(&self, id: i64) -> Result<(), ApiError>;
}

/// Maps a non-success status onto the error taxonomy.
pub fn classify_status(status: StatusCode, resource: &str, id: &str, body: &str) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::not_found(resource, id),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ApiError::transient(format!("HTTP {status}: {body}"))
        }
        s if s.is_server_error() => ApiError::transient(format!("HTTP {status}: {body}")),
        _ => ApiError::validation(format!("HTTP {status}: {body}")),
    }
}

/// HTTP client for the Checkly public REST API.
pub struct ChecklyClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    account_id: String,
}

impl ChecklyClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        account_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        // A trailing slash keeps any path prefix when joining endpoint paths.
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| ApiError::InvalidConfig(format!("invalid base URL {base_url:?}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("checkop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            account_id: account_id.into(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidConfig(format!("invalid path {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json");
        if !self.account_id.is_empty() {
            req = req.header("X-Checkly-Account", &self.account_id);
        }
        req
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        resource: &str,
        id: &str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let resp = self
            .request(method, self.url(path)?)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, resource, id, &text));
        }
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::transient(format!("failed to decode {resource} response: {e}")))
    }

    async fn send_empty<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        resource: &str,
        id: &str,
    ) -> Result<(), ApiError>
    where
        B: Serialize + Sync,
    {
        let mut req = self.request(method, self.url(path)?);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, resource, id, &text));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChecklyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecklyClient")
            .field("base_url", &self.base_url.as_str())
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MonitoringApi for ChecklyClient {
    async fn create_check(&self, check: &CheckPayload) -> Result<String, ApiError> {
        let created: CreatedCheck = self
            .send_json(Method::POST, "v1/checks", check, "check", &check.name)
            .await?;
        Ok(created.id)
    }

    async fn update_check(&self, id: &str, check: &CheckPayload) -> Result<(), ApiError> {
        self.send_empty(
            Method::PUT,
            &format!("v1/checks/{id}"),
            Some(check),
            "check",
            id,
        )
        .await
    }

    async fn delete_check(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty::<()>(Method::DELETE, &format!("v1/checks/{id}"), None, "check", id)
            .await
    }

    async fn create_group(&self, group: &GroupPayload) -> Result<i64, ApiError> {
        let created: CreatedNumeric = self
            .send_json(Method::POST, "v1/check-groups", group, "group", &group.name)
            .await?;
        Ok(created.id)
    }

    async fn update_group(&self, id: i64, group: &GroupPayload) -> Result<(), ApiError> {
        self.send_empty(
            Method::PUT,
            &format!("v1/check-groups/{id}"),
            Some(group),
            "group",
            &id.to_string(),
        )
        .await
    }

    async fn delete_group(&self, id: i64) -> Result<(), ApiError> {
        self.send_empty::<()>(
            Method::DELETE,
            &format!("v1/check-groups/{id}"),
            None,
            "group",
            &id.to_string(),
        )
        .await
    }

    async fn create_alert_channel(&self, channel: &AlertChannelPayload) -> Result<i64, ApiError> {
        let created: CreatedNumeric = self
            .send_json(
                Method::POST,
                "v1/alert-channels",
                channel,
                "alert channel",
                channel.config.channel_type(),
            )
            .await?;
        Ok(created.id)
    }

    async fn update_alert_channel(
        &self,
        id: i64,
        channel: &AlertChannelPayload,
    ) -> Result<(), ApiError> {
        self.send_empty(
            Method::PUT,
            &format!("v1/alert-channels/{id}"),
            Some(channel),
            "alert channel",
            &id.to_string(),
        )
        .await
    }

    async fn delete_alert_channel(&self, id: i64) -> Result<(), ApiError> {
        self.send_empty::<()>(
            Method::DELETE,
            &format!("v1/alert-channels/{id}"),
            None,
            "alert channel",
            &id.to_string(),
        )
        .await
    }
}
