use crate::{ParamSpec, Tool, ToolContext, ToolError};
use calldesk_common::CallStage;
use calldesk_telephony::TelephonyClient;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// Disconnects the caller after the closing line has been spoken.
pub struct EndCallTool {
    telephony: Arc<dyn TelephonyClient>,
}

impl EndCallTool {
    pub fn new(telephony: Arc<dyn TelephonyClient>) -> Self {
        Self { telephony }
    }
}

#[async_trait]
impl Tool for EndCallTool {
    fn name(&self) -> &str {
        "end_call"
    }

    fn description(&self) -> &str {
        "Ends the call after successful completion of the conversation. \
         Call this only after the final message has been spoken to the customer."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn execute(&self, ctx: &ToolContext, _args: &Value) -> Result<String, ToolError> {
        let session = ctx.session().await;

        match self
            .telephony
            .remove_participant(&session.room_name, &session.participant_identity)
            .await
        {
            Ok(()) => {
                info!("Disconnected participant {}", session.participant_identity);
                ctx.set_stage(CallStage::Ended).await;
                Ok("Call ended successfully".to_string())
            }
            Err(e) => {
                // Reported, not retried; the caller can still hang up.
                error!("Error ending call: {}", e);
                Ok("I wasn't able to end the call from my side. You may hang up now.".to_string())
            }
        }
    }
}

/// Hands the live call over to a human agent's number.
pub struct TransferCallTool {
    telephony: Arc<dyn TelephonyClient>,
    transfer_to: String,
}

impl TransferCallTool {
    pub fn new(telephony: Arc<dyn TelephonyClient>, transfer_to: String) -> Self {
        Self {
            telephony,
            transfer_to,
        }
    }
}

#[async_trait]
impl Tool for TransferCallTool {
    fn name(&self) -> &str {
        "transfer_call"
    }

    fn description(&self) -> &str {
        "Transfers the ongoing call to a human agent. The assistant is no \
         longer active on the call once the transfer completes."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn execute(&self, ctx: &ToolContext, _args: &Value) -> Result<String, ToolError> {
        let session = ctx.session().await;

        // Transfer is a phone-call affair; a session without a caller
        // number did not arrive over telephony.
        if session.mobile.is_none() {
            return Ok("I'm sorry, I can't transfer this call.".to_string());
        }

        match self
            .telephony
            .transfer_participant(
                &session.room_name,
                &session.participant_identity,
                &self.transfer_to,
                true,
            )
            .await
        {
            Ok(()) => {
                info!(
                    "Transferred participant {} to {}",
                    session.participant_identity, self.transfer_to
                );
                ctx.set_stage(CallStage::Closing).await;
                Ok("Transferring your call now. Please stay on the line.".to_string())
            }
            Err(e) => {
                // The session stays active so the conversation can continue.
                error!("Failed to transfer call: {}", e);
                Ok(
                    "I'm sorry, I couldn't transfer your call. Is there something else \
                     I can help with?"
                        .to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{session_with_mobile, MockTelephony};
    use calldesk_telephony::TelephonyError;
    use serde_json::json;

    #[tokio::test]
    async fn test_end_call_disconnects_and_marks_ended() {
        let mut telephony = MockTelephony::new();
        telephony
            .expect_remove_participant()
            .times(1)
            .returning(|_, _| Ok(()));

        let tool = EndCallTool::new(Arc::new(telephony));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool.execute(&ctx, &json!({})).await.unwrap();
        assert_eq!(spoken, "Call ended successfully");
        assert!(ctx.session().await.is_ended());
    }

    #[tokio::test]
    async fn test_end_call_failure_is_reported_not_retried() {
        let mut telephony = MockTelephony::new();
        telephony
            .expect_remove_participant()
            .times(1)
            .returning(|_, _| Err(TelephonyError::Api("404: no participant".to_string())));

        let tool = EndCallTool::new(Arc::new(telephony));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool.execute(&ctx, &json!({})).await.unwrap();
        assert!(spoken.contains("hang up"));
        assert!(!ctx.session().await.is_ended());
    }

    #[tokio::test]
    async fn test_transfer_happy_path() {
        let mut telephony = MockTelephony::new();
        telephony
            .expect_transfer_participant()
            .withf(|_room: &str, identity: &str, to: &str, dialtone: &bool| {
                identity == "sip-test" && to == "+916355703851" && *dialtone
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let tool = TransferCallTool::new(Arc::new(telephony), "+916355703851".to_string());
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool.execute(&ctx, &json!({})).await.unwrap();
        assert!(spoken.contains("stay on the line"));
        assert_eq!(ctx.session().await.stage, CallStage::Closing);
    }

    #[tokio::test]
    async fn test_transfer_failure_keeps_call_active() {
        let mut telephony = MockTelephony::new();
        telephony
            .expect_transfer_participant()
            .times(1)
            .returning(|_, _, _, _| Err(TelephonyError::Request("connection reset".to_string())));

        let tool = TransferCallTool::new(Arc::new(telephony), "+916355703851".to_string());
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool.execute(&ctx, &json!({})).await.unwrap();
        assert!(spoken.contains("couldn't transfer"));

        let session = ctx.session().await;
        assert!(!session.is_ended());
        assert_ne!(session.stage, CallStage::Closing);
    }

    #[tokio::test]
    async fn test_transfer_without_caller_number_is_skipped() {
        let mut telephony = MockTelephony::new();
        telephony.expect_transfer_participant().times(0);

        let tool = TransferCallTool::new(Arc::new(telephony), "+916355703851".to_string());
        let ctx = session_with_mobile(None);

        let spoken = tool.execute(&ctx, &json!({})).await.unwrap();
        assert!(spoken.contains("can't transfer"));
    }
}
