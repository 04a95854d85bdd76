pub mod prompts;
pub mod session;

use calldesk_common::{AgentError, CallSession, CallStage, Language, Result};
use calldesk_notify::{SmsGateway, TwilioConfig, TwilioSmsGateway};
use calldesk_store::{create_store, ComplaintStore, StoreConfig};
use calldesk_telephony::{HttpTelephonyClient, TelephonyClient, TelephonyConfig};
use calldesk_tools::{build_registry, ToolContext, ToolError, ToolRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use prompts::{greeting, system_prompt, Desk, PromptBranch};
use session::{identify_caller, SessionManager};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub store_config: StoreConfig,
    pub twilio_config: TwilioConfig,
    pub telephony_config: TelephonyConfig,
    pub transfer_target: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store_config: StoreConfig::default(),
            twilio_config: TwilioConfig::default(),
            telephony_config: TelephonyConfig::default(),
            transfer_target: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub room_name: String,
    pub participant_identity: String,
    #[serde(default)]
    pub sip_phone_number: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub desk: Desk,
}

#[derive(Debug, Serialize)]
pub struct SessionStart {
    pub session_id: Uuid,
    pub mobile: Option<String>,
    pub returning_caller: bool,
    pub stage: CallStage,
    pub prompt: String,
    pub greeting: String,
}

#[derive(Debug, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub room_name: String,
    pub participant_identity: String,
    pub mobile: Option<String>,
    pub language: Language,
    pub stage: CallStage,
    pub started_at: DateTime<Utc>,
}

impl From<CallSession> for SessionState {
    fn from(session: CallSession) -> Self {
        Self {
            session_id: session.id,
            room_name: session.room_name,
            participant_identity: session.participant_identity,
            mobile: session.mobile,
            language: session.language,
            stage: session.stage,
            started_at: session.started_at,
        }
    }
}

pub struct AgentCore {
    pub store: Arc<dyn ComplaintStore>,
    pub registry: Arc<ToolRegistry>,
    pub sessions: SessionManager,
}

impl AgentCore {
    /// Build the core from configuration, constructing the real adapters.
    pub async fn new(config: CoreConfig) -> Result<Self> {
        let store = create_store(&config.store_config).await?;
        let sms: Arc<dyn SmsGateway> = Arc::new(TwilioSmsGateway::new(config.twilio_config)?);
        let telephony: Arc<dyn TelephonyClient> =
            Arc::new(HttpTelephonyClient::new(config.telephony_config)?);

        Ok(Self::with_adapters(
            store,
            sms,
            telephony,
            config.transfer_target,
        ))
    }

    /// Wire the core against already-constructed adapters.
    pub fn with_adapters(
        store: Arc<dyn ComplaintStore>,
        sms: Arc<dyn SmsGateway>,
        telephony: Arc<dyn TelephonyClient>,
        transfer_target: String,
    ) -> Self {
        let registry = Arc::new(build_registry(
            store.clone(),
            sms,
            telephony,
            transfer_target,
        ));

        Self {
            store,
            registry,
            sessions: SessionManager::new(),
        }
    }

    /// Open a session for an inbound call: resolve the caller, pick the
    /// conversational branch, and hand the driver its prompt and greeting.
    pub async fn open_session(&self, request: OpenSessionRequest) -> SessionStart {
        let mobile = identify_caller(request.sip_phone_number.as_deref(), &request.room_name);

        let previous = match (&mobile, request.desk) {
            (Some(number), Desk::Complaints) => {
                match self.store.find_latest_complaint(number).await {
                    Ok(found) => found,
                    Err(e) => {
                        // Degrade to the new-caller branch, but say so.
                        warn!("Complaint lookup failed, treating caller as new: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        let branch = match (request.desk, &previous) {
            (Desk::Appointments, _) => PromptBranch::AppointmentDesk,
            (Desk::Complaints, Some(record)) => PromptBranch::ReturningCaller(record),
            (Desk::Complaints, None) => PromptBranch::NewCaller,
        };

        let prompt = system_prompt(&branch, request.language);
        let spoken_greeting = greeting(request.language, previous.as_ref());

        let mut session = CallSession::new(
            request.room_name,
            request.participant_identity,
            mobile.clone(),
            request.language,
        );
        session.stage = if previous.is_some() {
            CallStage::ReturningCaller
        } else {
            CallStage::NewCaller
        };

        info!(
            "Opened session {} for {} ({})",
            session.id,
            session.room_name,
            if previous.is_some() { "returning caller" } else { "new caller" }
        );

        let start = SessionStart {
            session_id: session.id,
            mobile,
            returning_caller: previous.is_some(),
            stage: session.stage,
            prompt,
            greeting: spoken_greeting,
        };

        self.sessions.insert(session).await;
        start
    }

    pub async fn session_state(&self, id: Uuid) -> Result<SessionState> {
        let handle = self
            .sessions
            .get(id)
            .await
            .ok_or_else(|| AgentError::NotFound(format!("Session not found: {}", id)))?;
        let session = handle.read().await.clone();
        Ok(session.into())
    }

    /// Record a stage transition driven by the conversation itself (the
    /// collection and confirmation steps have no tool invocation).
    pub async fn mark_stage(&self, id: Uuid, stage: CallStage) -> Result<SessionState> {
        let handle = self
            .sessions
            .get(id)
            .await
            .ok_or_else(|| AgentError::NotFound(format!("Session not found: {}", id)))?;
        let mut session = handle.write().await;
        session.stage = stage;
        Ok(session.clone().into())
    }

    /// Dispatch one tool invocation for a session. The returned string is
    /// what the assistant speaks back.
    pub async fn invoke_tool(
        &self,
        session_id: Uuid,
        tool_name: &str,
        args: &serde_json::Value,
    ) -> Result<String> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| AgentError::NotFound(format!("Session not found: {}", session_id)))?;

        let ctx = ToolContext::new(handle.clone());
        let spoken = self
            .registry
            .invoke(tool_name, &ctx, args)
            .await
            .map_err(|e| match e {
                ToolError::UnknownTool(name) => {
                    AgentError::NotFound(format!("Unknown tool: {}", name))
                }
                ToolError::InvalidParams(msg) => AgentError::Validation(msg),
            })?;

        // A disconnected caller has no further turns.
        if handle.read().await.is_ended() {
            self.sessions.remove(session_id).await;
            info!("Session {} ended and removed", session_id);
        }

        Ok(spoken)
    }
}
