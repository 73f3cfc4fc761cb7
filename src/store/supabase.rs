//! Concrete message store over the hosted backend: PostgREST for rows, the
//! realtime websocket for live inserts, the auth endpoint for identity.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::common::ChatMessage;

use super::realtime;
use super::{MessageStore, StoreError, Subscription, SubscriptionHandle};

// The backend itself imposes no request deadline; without one a stalled
// history fetch would hold the "Loading" state forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MESSAGES_TABLE: &str = "messages";
const SUBSCRIPTION_BUFFER: usize = 64;

/// Client for one backend project. Cheap to clone: the inner HTTP client is
/// shared. Constructed once at composition time and injected; there is no
/// ambient global instance.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

/// The authenticated user, as returned by the auth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
}

impl SupabaseStore {
    pub fn new(
        base_url: &str,
        anon_key: &str,
        access_token: Option<String>,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token,
        })
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    /// Identity lookup. `Ok(None)` means "not signed in": no token was
    /// configured or the backend no longer accepts it.
    pub async fn current_user(&self) -> Result<Option<UserIdentity>, StoreError> {
        let Some(token) = self.access_token.as_deref() else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "identity lookup failed: {}",
                response.status()
            )));
        }

        let user = response
            .json::<UserIdentity>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        Ok(Some(user))
    }
}

impl MessageStore for SupabaseStore {
    async fn fetch_history(&self, room: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let response = self
            .http
            .get(format!("{}/rest/v1/{MESSAGES_TABLE}", self.base_url))
            .query(&[
                ("select", "*".to_string()),
                ("room", format!("eq.{room}")),
                ("order", "created_at.asc".to_string()),
            ])
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer()))
            .send()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "history fetch failed: {}",
                response.status()
            )));
        }

        response
            .json::<Vec<ChatMessage>>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))
    }

    fn subscribe(&self, room: &str) -> Subscription {
        let (events_tx, events_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let url = realtime::websocket_url(&self.base_url, &self.anon_key);
        let task = tokio::spawn(realtime::run_channel(url, room.to_string(), events_tx));
        Subscription { events: events_rx, handle: SubscriptionHandle::new(task) }
    }

    async fn send(&self, room: &str, username: &str, content: &str) -> Result<(), StoreError> {
        let Some(user) = self.current_user().await? else {
            return Err(StoreError::Unauthenticated);
        };

        // Configured name wins; otherwise fall back to the profile name,
        // then to the platform default.
        let display_name = if username.is_empty() {
            user.user_metadata.name.as_deref().unwrap_or("users")
        } else {
            username
        };

        let row = json!({
            "content": content,
            "room": room,
            "user_id": user.id,
            "username": display_name,
        });

        let response = self
            .http
            .post(format!("{}/rest/v1/{MESSAGES_TABLE}", self.base_url))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer()))
            .json(&row)
            .send()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::SendRejected(format!("{status}: {body}")));
        }
        Ok(())
    }
}
