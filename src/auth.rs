use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

/// Thin proxy in front of the managed auth backend. Session handling,
/// credentials and account activation all live upstream; this service only
/// forwards and never inspects the tokens it passes through.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpPayload {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_activated: bool,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Value>;
    async fn sign_up(&self, payload: &SignUpPayload) -> Result<Value>;
    async fn session_user(&self, access_token: &str) -> Result<Value>;
    async fn profile(&self, access_token: &str, user_id: &str) -> Result<Option<UserProfile>>;
    async fn activate_account(&self, access_token: &str, code: &str) -> Result<Value>;
}

impl AuthClient {
    /// Returns `None` when the backend is not configured; the auth routes
    /// are simply not mounted in that case.
    pub fn from_env() -> Result<Option<Self>> {
        let base_url = match env::var("AUTH_BASE_URL") {
            Ok(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => return Ok(None),
        };
        let api_key = env::var("AUTH_API_KEY").context("AUTH_API_KEY not set")?;
        let user_agent = format!("cinetaste/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build auth HTTP client")?;
        Ok(Some(Self {
            client,
            base_url,
            api_key,
        }))
    }

    async fn post_json(&self, path: &str, bearer: Option<&str>, body: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.context("auth request failed")?;
        let status = res.status();
        let payload: Value = res.json().await.context("auth response was not JSON")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, payload));
        }
        Ok(payload)
    }

    async fn get_json(&self, path: &str, bearer: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .send()
            .await
            .context("auth request failed")?;
        let status = res.status();
        let payload: Value = res.json().await.context("auth response was not JSON")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", url, payload));
        }
        Ok(payload)
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Value> {
        self.post_json(
            "/auth/v1/token?grant_type=password",
            None,
            json!({ "email": credentials.email, "password": credentials.password }),
        )
        .await
    }

    async fn sign_up(&self, payload: &SignUpPayload) -> Result<Value> {
        let session = self
            .post_json(
                "/auth/v1/signup",
                None,
                json!({ "email": payload.email, "password": payload.password }),
            )
            .await?;
        // Best-effort profile upsert right after signup; a failure here
        // doesn't invalidate the new account.
        if let (Some(token), Some(user_id)) = (
            session.get("access_token").and_then(|t| t.as_str()),
            session
                .get("user")
                .and_then(|u| u.get("id"))
                .and_then(|id| id.as_str()),
        ) {
            let upsert = self
                .post_json(
                    "/rest/v1/user_profiles",
                    Some(token),
                    json!({
                        "id": user_id,
                        "full_name": payload.full_name,
                        "phone": payload.phone,
                        "is_activated": false,
                    }),
                )
                .await;
            if let Err(e) = upsert {
                tracing::warn!("Profile upsert after signup failed: {:#}", e);
            }
        }
        Ok(session)
    }

    async fn session_user(&self, access_token: &str) -> Result<Value> {
        self.get_json("/auth/v1/user", access_token).await
    }

    async fn profile(&self, access_token: &str, user_id: &str) -> Result<Option<UserProfile>> {
        let rows = self
            .get_json(
                &format!(
                    "/rest/v1/user_profiles?id=eq.{}&select=*",
                    urlencoding::encode(user_id)
                ),
                access_token,
            )
            .await?;
        let profiles: Vec<UserProfile> =
            serde_json::from_value(rows).context("unexpected profile shape")?;
        Ok(profiles.into_iter().next())
    }

    async fn activate_account(&self, access_token: &str, code: &str) -> Result<Value> {
        self.post_json(
            "/rest/v1/rpc/activate_account",
            Some(access_token),
            json!({ "p_code": code }),
        )
        .await
    }
}
