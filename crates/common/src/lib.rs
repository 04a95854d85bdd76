use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Highest priority a complaint can be escalated to.
pub const MAX_PRIORITY: u8 = 5;

/// Priority a freshly submitted complaint starts at.
pub const INITIAL_PRIORITY: u8 = 1;

/// Next priority after one escalation step, capped at [`MAX_PRIORITY`].
pub fn next_priority(current: u8) -> u8 {
    current.saturating_add(1).min(MAX_PRIORITY)
}

// Complaint lifecycle types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub id: Uuid,
    pub mobile: String,
    pub name: String,
    pub address: String,
    pub product: String,
    pub issue: String,
    pub status: ComplaintStatus,
    pub priority: u8,
    pub complaint_number: String,
    pub timestamp: DateTime<Utc>,
}

impl ComplaintRecord {
    /// Build a new pending complaint with a freshly generated complaint
    /// number and the initial priority.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        product: impl Into<String>,
        issue: impl Into<String>,
        mobile: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mobile: mobile.into(),
            name: name.into(),
            address: address.into(),
            product: product.into(),
            issue: issue.into(),
            status: ComplaintStatus::Pending,
            priority: INITIAL_PRIORITY,
            complaint_number: generate_complaint_number(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintStatus {
    Pending,
    Resolved,
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplaintStatus::Pending => write!(f, "pending"),
            ComplaintStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ComplaintStatus::Pending),
            "resolved" => Ok(ComplaintStatus::Resolved),
            _ => Err(format!("Invalid complaint status: {}", s)),
        }
    }
}

/// Short numeric token handed to the caller. Uniqueness is not guaranteed;
/// records are keyed by mobile number, the token is for humans.
pub fn generate_complaint_number() -> String {
    let n = Uuid::new_v4().as_u128() % 9000 + 1000;
    n.to_string()
}

/// Outcome of a successful priority escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub complaint_number: String,
    pub mobile: String,
    pub old_priority: u8,
    pub new_priority: u8,
}

// Appointment types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub mobile: String,
    pub customer_name: String,
    pub reason: String,
    pub scheduled_at: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentRecord {
    pub fn new(
        customer_name: impl Into<String>,
        reason: impl Into<String>,
        scheduled_at: impl Into<String>,
        mobile: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mobile: mobile.into(),
            customer_name: customer_name.into(),
            reason: reason.into(),
            scheduled_at: scheduled_at.into(),
            status: AppointmentStatus::Booked,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "booked"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "booked" => Ok(AppointmentStatus::Booked),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            _ => Err(format!("Invalid appointment status: {}", s)),
        }
    }
}

// Call session types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
    Gujarati,
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

/// Stage of a single call. Transitions happen as the effect of opening a
/// session and of tool invocations; turn sequencing itself belongs to the
/// external conversation driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallStage {
    Start,
    ReturningCaller,
    NewCaller,
    InformationCollection,
    ConfirmationPending,
    Submitted,
    Escalated,
    Closing,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub id: Uuid,
    pub room_name: String,
    pub participant_identity: String,
    pub mobile: Option<String>,
    pub language: Language,
    pub stage: CallStage,
    pub started_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(
        room_name: impl Into<String>,
        participant_identity: impl Into<String>,
        mobile: Option<String>,
        language: Language,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_name: room_name.into(),
            participant_identity: participant_identity.into(),
            mobile,
            language,
            stage: CallStage::Start,
            started_at: Utc::now(),
        }
    }

    pub fn is_ended(&self) -> bool {
        self.stage == CallStage::Ended
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Telephony error: {0}")]
    Telephony(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

// API response types
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
