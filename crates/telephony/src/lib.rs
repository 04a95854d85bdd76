use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("Telephony configuration error: {0}")]
    Configuration(String),

    #[error("Failed to mint API token: {0}")]
    Token(String),

    #[error("Request to telephony API failed: {0}")]
    Request(String),

    #[error("Telephony API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for TelephonyError {
    fn from(e: reqwest::Error) -> Self {
        TelephonyError::Request(e.to_string())
    }
}

impl From<TelephonyError> for calldesk_common::AgentError {
    fn from(e: TelephonyError) -> Self {
        calldesk_common::AgentError::Telephony(e.to_string())
    }
}

/// Room-level call control. Transfer hands the live call to another number;
/// remove disconnects the participant, which ends the call for the caller.
#[async_trait]
pub trait TelephonyClient: Send + Sync {
    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
        play_dialtone: bool,
    ) -> Result<(), TelephonyError>;

    async fn remove_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
    ) -> Result<(), TelephonyError>;
}

#[derive(Debug, Clone)]
pub struct TelephonyConfig {
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
    pub token_ttl_minutes: i64,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_minutes: 10,
        }
    }
}

impl TelephonyConfig {
    pub fn from_env() -> Result<Self, TelephonyError> {
        let url = std::env::var("LIVEKIT_URL")
            .map_err(|_| TelephonyError::Configuration("LIVEKIT_URL is not set".to_string()))?;
        let api_key = std::env::var("LIVEKIT_API_KEY")
            .map_err(|_| TelephonyError::Configuration("LIVEKIT_API_KEY is not set".to_string()))?;
        let api_secret = std::env::var("LIVEKIT_API_SECRET").map_err(|_| {
            TelephonyError::Configuration("LIVEKIT_API_SECRET is not set".to_string())
        })?;

        Ok(Self {
            url,
            api_key,
            api_secret,
            ..Default::default()
        })
    }

    pub fn validate(&self) -> Result<(), TelephonyError> {
        if self.url.is_empty() {
            return Err(TelephonyError::Configuration(
                "Telephony API URL is required".to_string(),
            ));
        }
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(TelephonyError::Configuration(
                "Telephony API key and secret are required".to_string(),
            ));
        }
        Ok(())
    }

    /// The signalling URL is usually ws(s)://; the twirp API speaks http(s).
    pub fn http_url(&self) -> String {
        if let Some(rest) = self.url.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if let Some(rest) = self.url.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else {
            self.url.clone()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct VideoGrant {
    #[serde(rename = "roomAdmin")]
    room_admin: bool,
    room: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String, // API key
    nbf: i64,
    exp: i64,
    video: VideoGrant,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    participant_identity: &'a str,
    room_name: &'a str,
    transfer_to: &'a str,
    play_dialtone: bool,
}

#[derive(Debug, Serialize)]
struct RemoveParticipantRequest<'a> {
    room: &'a str,
    identity: &'a str,
}

pub struct HttpTelephonyClient {
    config: TelephonyConfig,
    client: reqwest::Client,
}

impl HttpTelephonyClient {
    pub fn new(config: TelephonyConfig) -> Result<Self, TelephonyError> {
        config.validate()?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn mint_token(&self, room_name: &str) -> Result<String, TelephonyError> {
        let now = Utc::now();
        let claims = Claims {
            iss: self.config.api_key.clone(),
            nbf: now.timestamp(),
            exp: (now + Duration::minutes(self.config.token_ttl_minutes)).timestamp(),
            video: VideoGrant {
                room_admin: true,
                room: room_name.to_string(),
            },
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )
        .map_err(|e| TelephonyError::Token(e.to_string()))
    }

    async fn twirp_post<T: Serialize>(
        &self,
        service_method: &str,
        room_name: &str,
        body: &T,
    ) -> Result<(), TelephonyError> {
        let token = self.mint_token(room_name)?;
        let url = format!("{}/twirp/{}", self.config.http_url(), service_method);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Telephony API error ({}): {}", status, error_text);
            return Err(TelephonyError::Api(format!("{}: {}", status, error_text)));
        }

        Ok(())
    }
}

#[async_trait]
impl TelephonyClient for HttpTelephonyClient {
    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
        play_dialtone: bool,
    ) -> Result<(), TelephonyError> {
        debug!(
            "Transferring participant {} in room {} to {}",
            participant_identity, room_name, transfer_to
        );

        let request = TransferRequest {
            participant_identity,
            room_name,
            transfer_to,
            play_dialtone,
        };

        self.twirp_post("livekit.SIP/TransferSIPParticipant", room_name, &request)
            .await?;

        info!(
            "Transferred participant {} to {}",
            participant_identity, transfer_to
        );
        Ok(())
    }

    async fn remove_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
    ) -> Result<(), TelephonyError> {
        debug!(
            "Removing participant {} from room {}",
            participant_identity, room_name
        );

        let request = RemoveParticipantRequest {
            room: room_name,
            identity: participant_identity,
        };

        self.twirp_post("livekit.RoomService/RemoveParticipant", room_name, &request)
            .await?;

        info!("Removed participant {}", participant_identity);
        Ok(())
    }
}
