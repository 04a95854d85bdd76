use crate::{require_str, ParamSpec, Tool, ToolContext, ToolError, APOLOGY};
use calldesk_common::{CallStage, ComplaintRecord};
use calldesk_notify::{complaint_confirmation, escalation_notice, SmsGateway};
use calldesk_store::ComplaintStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Registers a new complaint once the conversational flow has collected and
/// confirmed all customer information.
pub struct SubmitComplaintTool {
    store: Arc<dyn ComplaintStore>,
    sms: Arc<dyn SmsGateway>,
}

impl SubmitComplaintTool {
    pub fn new(store: Arc<dyn ComplaintStore>, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, sms }
    }
}

#[async_trait]
impl Tool for SubmitComplaintTool {
    fn name(&self) -> &str {
        "submit_complaint"
    }

    fn description(&self) -> &str {
        "Called when all customer information has been collected and confirmed. \
         Registers the complaint and sends an SMS with the complaint number."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("name", "Customer's name in English"),
            ParamSpec::string("address", "Customer's address in English"),
            ParamSpec::string("product", "Product owned by the customer in English"),
            ParamSpec::string(
                "issue",
                "Issue or complaint the customer is facing with the product in English",
            ),
        ]
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let name = require_str(args, "name")?;
        let address = require_str(args, "address")?;
        let product = require_str(args, "product")?;
        let issue = require_str(args, "issue")?;

        // The caller's number comes from telephony metadata, not the LLM.
        // Without one the complaint is still registered, it just cannot be
        // confirmed over SMS.
        let mobile = ctx.mobile().await.unwrap_or_default();
        let record = ComplaintRecord::new(name, address, product, issue, mobile.clone());
        let complaint_number = record.complaint_number.clone();

        if let Err(e) = self.store.insert_complaint(&record).await {
            error!("Failed to store complaint: {}", e);
            return Ok(APOLOGY.to_string());
        }

        info!(
            "Registered complaint {} for {}",
            complaint_number,
            if mobile.is_empty() { "<no mobile>" } else { mobile.as_str() }
        );
        ctx.set_stage(CallStage::Submitted).await;

        // Partial-success policy: the record exists even if the SMS fails.
        if mobile.is_empty() {
            warn!(
                "No caller number on session; skipping confirmation SMS for complaint {}",
                complaint_number
            );
        } else if let Err(e) = self
            .sms
            .send_sms(&mobile, &complaint_confirmation(name, &complaint_number))
            .await
        {
            warn!(
                "Confirmation SMS for complaint {} failed: {}",
                complaint_number, e
            );
        }

        Ok(format!(
            "Your complaint has been registered. Your complaint number is {}. \
             You will receive an SMS confirmation shortly.",
            complaint_number
        ))
    }
}

/// Raises the priority of an existing pending complaint when a customer
/// calls again about the same issue.
pub struct EscalatePriorityTool {
    store: Arc<dyn ComplaintStore>,
    sms: Arc<dyn SmsGateway>,
}

impl EscalatePriorityTool {
    pub fn new(store: Arc<dyn ComplaintStore>, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, sms }
    }
}

#[async_trait]
impl Tool for EscalatePriorityTool {
    fn name(&self) -> &str {
        "escalate_priority"
    }

    fn description(&self) -> &str {
        "Updates the priority of an existing complaint when a customer calls \
         again regarding the same complaint. Use the customer's complaint number."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string(
            "complaint_number",
            "Customer's complaint number",
        )]
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let complaint_number = require_str(args, "complaint_number")?;

        let escalation = match self.store.escalate_priority(complaint_number).await {
            Ok(Some(escalation)) => escalation,
            Ok(None) => {
                return Ok(format!(
                    "No pending complaint found with number {}.",
                    complaint_number
                ));
            }
            Err(e) => {
                error!("Failed to escalate complaint {}: {}", complaint_number, e);
                return Ok(APOLOGY.to_string());
            }
        };

        info!(
            "Escalated complaint {} from {} to {}",
            complaint_number, escalation.old_priority, escalation.new_priority
        );
        ctx.set_stage(CallStage::Escalated).await;

        if escalation.mobile.is_empty() {
            warn!(
                "Complaint {} has no mobile on record; skipping escalation SMS",
                complaint_number
            );
        } else if let Err(e) = self
            .sms
            .send_sms(
                &escalation.mobile,
                &escalation_notice(complaint_number, escalation.new_priority),
            )
            .await
        {
            warn!(
                "Escalation SMS for complaint {} failed: {}",
                complaint_number, e
            );
        }

        Ok(format!(
            "Priority updated for complaint #{} from {} to {}. \
             You will receive an SMS confirmation.",
            complaint_number, escalation.old_priority, escalation.new_priority
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{session_with_mobile, MockSms, MockStore};
    use calldesk_common::{ComplaintStatus, Escalation, INITIAL_PRIORITY};
    use calldesk_notify::NotifyError;
    use calldesk_store::StoreError;
    use mockall::predicate::*;
    use serde_json::json;

    fn submit_args() -> Value {
        json!({
            "name": "Asha",
            "address": "12 MG Road",
            "product": "Model X200",
            "issue": "No hot water",
        })
    }

    #[tokio::test]
    async fn test_submit_stores_pending_record_and_sends_sms() {
        let mut store = MockStore::new();
        store
            .expect_insert_complaint()
            .withf(|record: &ComplaintRecord| {
                record.status == ComplaintStatus::Pending
                    && record.priority == INITIAL_PRIORITY
                    && !record.complaint_number.is_empty()
                    && record.mobile == "+919000000001"
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut sms = MockSms::new();
        sms.expect_send_sms()
            .withf(|to: &str, body: &str| to == "+919000000001" && body.contains("Asha"))
            .times(1)
            .returning(|_, _| Ok("SM123".to_string()));

        let tool = SubmitComplaintTool::new(Arc::new(store), Arc::new(sms));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool.execute(&ctx, &submit_args()).await.unwrap();
        assert!(spoken.contains("complaint number"));
        assert_eq!(ctx.session().await.stage, CallStage::Submitted);
    }

    #[tokio::test]
    async fn test_submit_store_failure_becomes_spoken_apology() {
        let mut store = MockStore::new();
        store
            .expect_insert_complaint()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("connection refused".to_string())));

        let mut sms = MockSms::new();
        sms.expect_send_sms().times(0);

        let tool = SubmitComplaintTool::new(Arc::new(store), Arc::new(sms));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool.execute(&ctx, &submit_args()).await.unwrap();
        assert_eq!(spoken, APOLOGY);
        assert_ne!(ctx.session().await.stage, CallStage::Submitted);
    }

    #[tokio::test]
    async fn test_submit_survives_sms_failure() {
        let mut store = MockStore::new();
        store.expect_insert_complaint().times(1).returning(|_| Ok(()));

        let mut sms = MockSms::new();
        sms.expect_send_sms()
            .times(1)
            .returning(|_, _| Err(NotifyError::Gateway("420: rate limited".to_string())));

        let tool = SubmitComplaintTool::new(Arc::new(store), Arc::new(sms));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool.execute(&ctx, &submit_args()).await.unwrap();
        assert!(spoken.contains("registered"));
    }

    #[tokio::test]
    async fn test_submit_without_mobile_skips_sms() {
        let mut store = MockStore::new();
        store
            .expect_insert_complaint()
            .withf(|record: &ComplaintRecord| record.mobile.is_empty())
            .times(1)
            .returning(|_| Ok(()));

        let mut sms = MockSms::new();
        sms.expect_send_sms().times(0);

        let tool = SubmitComplaintTool::new(Arc::new(store), Arc::new(sms));
        let ctx = session_with_mobile(None);

        let spoken = tool.execute(&ctx, &submit_args()).await.unwrap();
        assert!(spoken.contains("registered"));
    }

    #[tokio::test]
    async fn test_escalate_reports_old_and_new_priority() {
        let mut store = MockStore::new();
        store
            .expect_escalate_priority()
            .with(eq("4821"))
            .times(1)
            .returning(|_| {
                Ok(Some(Escalation {
                    complaint_number: "4821".to_string(),
                    mobile: "+919000000001".to_string(),
                    old_priority: 2,
                    new_priority: 3,
                }))
            });

        let mut sms = MockSms::new();
        sms.expect_send_sms()
            .withf(|to: &str, body: &str| to == "+919000000001" && body.contains("increased to 3"))
            .times(1)
            .returning(|_, _| Ok("SM456".to_string()));

        let tool = EscalatePriorityTool::new(Arc::new(store), Arc::new(sms));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool
            .execute(&ctx, &json!({"complaint_number": "4821"}))
            .await
            .unwrap();
        assert!(spoken.contains("from 2 to 3"));
        assert_eq!(ctx.session().await.stage, CallStage::Escalated);
    }

    #[tokio::test]
    async fn test_escalate_unknown_number_sends_nothing() {
        let mut store = MockStore::new();
        store
            .expect_escalate_priority()
            .with(eq("9999"))
            .times(1)
            .returning(|_| Ok(None));

        let mut sms = MockSms::new();
        sms.expect_send_sms().times(0);

        let tool = EscalatePriorityTool::new(Arc::new(store), Arc::new(sms));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool
            .execute(&ctx, &json!({"complaint_number": "9999"}))
            .await
            .unwrap();
        assert!(spoken.contains("No pending complaint"));
        assert_ne!(ctx.session().await.stage, CallStage::Escalated);
    }

    #[tokio::test]
    async fn test_escalate_store_failure_becomes_spoken_apology() {
        let mut store = MockStore::new();
        store
            .expect_escalate_priority()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("timeout".to_string())));

        let mut sms = MockSms::new();
        sms.expect_send_sms().times(0);

        let tool = EscalatePriorityTool::new(Arc::new(store), Arc::new(sms));
        let ctx = session_with_mobile(Some("+919000000001"));

        let spoken = tool
            .execute(&ctx, &json!({"complaint_number": "4821"}))
            .await
            .unwrap();
        assert_eq!(spoken, APOLOGY);
    }
}
