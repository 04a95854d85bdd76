//! Callables exposed to the external conversation driver.
//!
//! Every operation the LLM can invoke during a call is a [`Tool`]: a named
//! handler with a flat parameter schema (name, type, description). The
//! [`ToolRegistry`] is a plain dispatch table; the driver fetches the
//! descriptors once and invokes by name. Return values are short strings
//! spoken back to the caller, including the apologies produced when a
//! backend fails; no error escapes the tool boundary to the call session.

pub mod appointment;
pub mod call_control;
pub mod complaint;
pub mod registry;

pub use appointment::{BookAppointmentTool, CancelAppointmentTool, ModifyAppointmentTool};
pub use call_control::{EndCallTool, TransferCallTool};
pub use complaint::{EscalatePriorityTool, SubmitComplaintTool};
pub use registry::{build_registry, ToolRegistry};

use calldesk_common::{CallSession, CallStage};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

/// Per-call context handed to every tool execution. Tools read caller
/// details from the session and record stage transitions through it.
#[derive(Clone)]
pub struct ToolContext {
    session: Arc<RwLock<CallSession>>,
}

impl ToolContext {
    pub fn new(session: Arc<RwLock<CallSession>>) -> Self {
        Self { session }
    }

    pub async fn session(&self) -> CallSession {
        self.session.read().await.clone()
    }

    pub async fn mobile(&self) -> Option<String> {
        self.session.read().await.mobile.clone()
    }

    pub async fn set_stage(&self, stage: CallStage) {
        self.session.write().await.stage = stage;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

/// One declared tool parameter: name, type, description. This is the whole
/// schema surface the driver sees. A table, not reflection.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: ParamType::String,
            description: description.to_string(),
            required: true,
        }
    }
}

/// Descriptor surfaced to the driver for tool registration.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the driver invokes the tool by.
    fn name(&self) -> &str;

    /// Description surfaced to the LLM.
    fn description(&self) -> &str;

    /// Declared parameters, validated by the registry before dispatch.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Run the tool. The returned string is spoken back to the caller.
    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError>;
}

/// Fetch a required, non-empty string argument.
///
/// The registry has already type-checked declared parameters; this guards
/// the presence-and-non-blank precondition on free-text fields.
pub(crate) fn require_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidParams(format!("Missing required field: {}", name)))
}

/// Spoken fallback when a backend operation fails mid-call.
pub(crate) const APOLOGY: &str =
    "I'm sorry, something went wrong on our side. Please try again in a moment.";
