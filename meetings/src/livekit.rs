//! HTTP client for a LiveKit-compatible SFU.
//!
//! Room management goes through the Twirp room service
//! (`POST /twirp/livekit.RoomService/<Method>`), authenticated by a
//! short-lived admin JWT. Participant tokens are HS256 JWTs minted locally
//! with the same API key and secret; the `video` grant carries the
//! capability flags.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chama_types::Timestamp;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::conferencing::{ConferencingClient, ConferencingError, TokenGrant};

const ROOM_SERVICE: &str = "/twirp/livekit.RoomService";

/// Lifetime of the admin token sent with each room-service call.
const ADMIN_TOKEN_TTL_SECS: u64 = 60;

#[derive(Clone)]
pub struct LiveKitConfig {
    /// `ws://` or `wss://` URL clients connect to.
    pub ws_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Bound on every room-service call.
    pub timeout: Duration,
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("ws_url", &self.ws_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room: Option<String>,
    #[serde(default)]
    room_join: bool,
    #[serde(default)]
    room_create: bool,
    #[serde(default)]
    room_admin: bool,
    #[serde(default)]
    can_publish: bool,
    #[serde(default)]
    can_subscribe: bool,
    #[serde(default)]
    can_publish_data: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    #[serde(default)]
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    nbf: u64,
    exp: u64,
    video: VideoGrant,
}

#[derive(Serialize)]
struct CreateRoomRequest<'a> {
    name: &'a str,
    max_participants: u32,
}

#[derive(Serialize)]
struct DeleteRoomRequest<'a> {
    room: &'a str,
}

#[derive(Deserialize)]
struct RoomResponse {
    sid: String,
}

pub struct LiveKitClient {
    config: LiveKitConfig,
    api_url: String,
    http_client: reqwest::Client,
}

impl LiveKitClient {
    pub fn new(config: LiveKitConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            api_url: api_url(&config.ws_url),
            config,
            http_client,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, ConferencingError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )
        .map_err(|e| ConferencingError::Token(e.to_string()))
    }

    /// The SFU checks this token against its own clock, so it uses wall time.
    fn admin_token(&self) -> Result<String, ConferencingError> {
        let now = Timestamp::now().as_secs();
        self.sign(&Claims {
            iss: self.config.api_key.clone(),
            sub: String::new(),
            name: None,
            nbf: now,
            exp: now + ADMIN_TOKEN_TTL_SECS,
            video: VideoGrant {
                room_create: true,
                ..VideoGrant::default()
            },
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ConferencingError>>,
    ) -> Result<T, ConferencingError> {
        tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| ConferencingError::Timeout(self.config.timeout))?
    }

    async fn post<B: Serialize>(&self, method: &str, body: &B) -> Result<reqwest::Response, ConferencingError> {
        let url = format!("{}{ROOM_SERVICE}/{method}", self.api_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.admin_token()?)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConferencingError::Timeout(self.config.timeout)
                } else if e.is_connect() {
                    ConferencingError::Unreachable(format!("connection failed: {e}"))
                } else {
                    ConferencingError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ConferencingError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

/// Room-service base URL for a client websocket URL.
fn api_url(ws_url: &str) -> String {
    let trimmed = ws_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl ConferencingClient for LiveKitClient {
    async fn create_room(&self, name: &str, max_participants: u32) -> Result<String, ConferencingError> {
        self.bounded(async {
            let response = self
                .post("CreateRoom", &CreateRoomRequest { name, max_participants })
                .await?;
            let room: RoomResponse = response
                .json()
                .await
                .map_err(|e| ConferencingError::InvalidResponse(e.to_string()))?;
            Ok(room.sid)
        })
        .await
    }

    async fn delete_room(&self, name: &str) -> Result<(), ConferencingError> {
        self.bounded(async {
            self.post("DeleteRoom", &DeleteRoomRequest { room: name }).await?;
            Ok(())
        })
        .await
    }

    async fn mint_token(&self, grant: &TokenGrant) -> Result<String, ConferencingError> {
        let caps = grant.capabilities;
        self.sign(&Claims {
            iss: self.config.api_key.clone(),
            sub: grant.identity.clone(),
            name: grant.display_name.clone(),
            nbf: grant.issued_at.as_secs(),
            exp: grant.expires_at().as_secs(),
            video: VideoGrant {
                room: Some(grant.room.clone()),
                room_join: true,
                room_create: false,
                room_admin: caps.room_admin,
                can_publish: caps.can_publish_av,
                can_subscribe: caps.can_subscribe,
                can_publish_data: caps.can_publish_data,
            },
        })
    }
}
