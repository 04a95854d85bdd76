use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification configuration error: {0}")]
    Configuration(String),

    #[error("Request to messaging gateway failed: {0}")]
    Request(String),

    #[error("Messaging gateway rejected the message: {0}")]
    Gateway(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Request(e.to_string())
    }
}

impl From<NotifyError> for calldesk_common::AgentError {
    fn from(e: NotifyError) -> Self {
        calldesk_common::AgentError::Notification(e.to_string())
    }
}

/// Outbound SMS seam. Fire-and-forget from the caller's perspective: the
/// returned message id is informational only.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String, NotifyError>;
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: "https://api.twilio.com".to_string(),
        }
    }
}

impl TwilioConfig {
    pub fn from_env() -> Result<Self, NotifyError> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID")
            .map_err(|_| NotifyError::Configuration("TWILIO_ACCOUNT_SID is not set".to_string()))?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN")
            .map_err(|_| NotifyError::Configuration("TWILIO_AUTH_TOKEN is not set".to_string()))?;
        let from_number = std::env::var("TWILIO_FROM_NUMBER")
            .map_err(|_| NotifyError::Configuration("TWILIO_FROM_NUMBER is not set".to_string()))?;

        Ok(Self {
            account_sid,
            auth_token,
            from_number,
            ..Default::default()
        })
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.account_sid.is_empty() {
            return Err(NotifyError::Configuration(
                "Twilio account SID is required".to_string(),
            ));
        }
        if self.auth_token.is_empty() {
            return Err(NotifyError::Configuration(
                "Twilio auth token is required".to_string(),
            ));
        }
        if self.from_number.is_empty() {
            return Err(NotifyError::Configuration(
                "Twilio from-number is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

pub struct TwilioSmsGateway {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioSmsGateway {
    pub fn new(config: TwilioConfig) -> Result<Self, NotifyError> {
        config.validate()?;
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base, self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsGateway for TwilioSmsGateway {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String, NotifyError> {
        debug!("Sending SMS to {}", to);

        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Messaging gateway error ({}): {}", status, error_text);
            return Err(NotifyError::Gateway(format!("{}: {}", status, error_text)));
        }

        let message: MessageResponse = response.json().await?;
        info!("SMS sent to {} (sid {})", to, message.sid);
        Ok(message.sid)
    }
}

// Message templates spoken for by the conversational flow. Kept in one
// place so the wording matches what the prompts promise the caller.

pub fn complaint_confirmation(name: &str, complaint_number: &str) -> String {
    format!(
        "Hello {}. Your Complaint Number is {}. We will address your issue as soon as possible.",
        name, complaint_number
    )
}

pub fn escalation_notice(complaint_number: &str, new_priority: u8) -> String {
    format!(
        "Your complaint (#{}) priority has been increased to {}. We will address it on priority basis.",
        complaint_number, new_priority
    )
}

pub fn appointment_confirmation(customer_name: &str, scheduled_at: &str) -> String {
    format!(
        "Hello {}. Your appointment has been booked for {}. You will receive a reminder before the visit.",
        customer_name, scheduled_at
    )
}

pub fn appointment_rescheduled(customer_name: &str, scheduled_at: &str) -> String {
    format!(
        "Hello {}. Your appointment has been rescheduled to {}.",
        customer_name, scheduled_at
    )
}

pub fn appointment_cancelled(customer_name: &str) -> String {
    format!(
        "Hello {}. Your appointment has been cancelled. Call us any time to book a new one.",
        customer_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complaint_confirmation_mentions_name_and_number() {
        let body = complaint_confirmation("Asha", "4821");
        assert!(body.contains("Asha"));
        assert!(body.contains("4821"));
    }

    #[test]
    fn test_escalation_notice_mentions_priority() {
        let body = escalation_notice("4821", 3);
        assert!(body.contains("#4821"));
        assert!(body.contains("increased to 3"));
    }

    #[test]
    fn test_appointment_templates() {
        assert!(appointment_confirmation("Rahul", "Monday 10 AM").contains("Monday 10 AM"));
        assert!(appointment_rescheduled("Rahul", "Tuesday 3 PM").contains("Tuesday 3 PM"));
        assert!(appointment_cancelled("Rahul").contains("cancelled"));
    }

    #[test]
    fn test_config_validation() {
        let config = TwilioConfig::default();
        assert!(config.validate().is_err());

        let config = TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15707295650".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_messages_url_includes_account_sid() {
        let gateway = TwilioSmsGateway::new(TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15707295650".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            gateway.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }
}
