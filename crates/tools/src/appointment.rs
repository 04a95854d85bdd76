use crate::{require_str, ParamSpec, Tool, ToolContext, ToolError, APOLOGY};
use calldesk_common::{AppointmentRecord, CallStage};
use calldesk_notify::{
    appointment_cancelled, appointment_confirmation, appointment_rescheduled, SmsGateway,
};
use calldesk_store::ComplaintStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Books a new appointment for the caller.
pub struct BookAppointmentTool {
    store: Arc<dyn ComplaintStore>,
    sms: Arc<dyn SmsGateway>,
}

impl BookAppointmentTool {
    pub fn new(store: Arc<dyn ComplaintStore>, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, sms }
    }
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Books a new appointment once the name, reason for the visit, and \
         preferred date and time have been collected and confirmed."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("customer_name", "Customer's full name"),
            ParamSpec::string("reason", "Reason for the visit"),
            ParamSpec::string("date_time", "Preferred date and time for the appointment"),
        ]
    }

    async fn execute(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let customer_name = require_str(args, "customer_name")?;
        let reason = require_str(args, "reason")?;
        let date_time = require_str(args, "date_time")?;

        let mobile = ctx.mobile().await.unwrap_or_default();
        let record = AppointmentRecord::new(customer_name, reason, date_time, mobile.clone());

        if let Err(e) = self.store.insert_appointment(&record).await {
            error!("Failed to store appointment: {}", e);
            return Ok(APOLOGY.to_string());
        }

        info!("Booked appointment for {} at {}", customer_name, date_time);
        ctx.set_stage(CallStage::Submitted).await;

        if mobile.is_empty() {
            warn!("No caller number on session; skipping appointment confirmation SMS");
        } else if let Err(e) = self
            .sms
            .send_sms(&mobile, &appointment_confirmation(customer_name, date_time))
            .await
        {
            warn!("Appointment confirmation SMS failed: {}", e);
        }

        Ok(format!(
            "Your appointment has been booked for {}. \
             You will receive a confirmation message shortly.",
            date_time
        ))
    }
}

/// Moves the caller's latest booked appointment to a new date and time.
pub struct ModifyAppointmentTool {
    store: Arc<dyn ComplaintStore>,
    sms: Arc<dyn SmsGateway>,
}

impl ModifyAppointmentTool {
    pub fn new(store: Arc<dyn ComplaintStore>, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, sms }
    }
}

#[async_trait]
impl Tool for ModifyAppointmentTool {
    fn name(&self) -> &str {
        "modify_appointment"
    }

    fn description(&self) -> &str {
        "Reschedules the customer's existing appointment, located by their \
         registered phone number, to a new date and time."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("phone_number", "Customer's registered phone number"),
            ParamSpec::string("new_date_time", "New date and time for the appointment"),
        ]
    }

    async fn execute(&self, _ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let phone_number = require_str(args, "phone_number")?;
        let new_date_time = require_str(args, "new_date_time")?;

        let appointment = match self
            .store
            .reschedule_appointment(phone_number, new_date_time)
            .await
        {
            Ok(Some(appointment)) => appointment,
            Ok(None) => {
                return Ok(
                    "I couldn't find a booked appointment for that phone number.".to_string(),
                );
            }
            Err(e) => {
                error!("Failed to reschedule appointment: {}", e);
                return Ok(APOLOGY.to_string());
            }
        };

        info!(
            "Rescheduled appointment for {} to {}",
            phone_number, new_date_time
        );

        if let Err(e) = self
            .sms
            .send_sms(
                phone_number,
                &appointment_rescheduled(&appointment.customer_name, new_date_time),
            )
            .await
        {
            warn!("Reschedule confirmation SMS failed: {}", e);
        }

        Ok(format!(
            "Your appointment has been moved to {}. \
             You will receive a confirmation message shortly.",
            new_date_time
        ))
    }
}

/// Cancels the caller's latest booked appointment.
pub struct CancelAppointmentTool {
    store: Arc<dyn ComplaintStore>,
    sms: Arc<dyn SmsGateway>,
}

impl CancelAppointmentTool {
    pub fn new(store: Arc<dyn ComplaintStore>, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, sms }
    }
}

#[async_trait]
impl Tool for CancelAppointmentTool {
    fn name(&self) -> &str {
        "cancel_appointment"
    }

    fn description(&self) -> &str {
        "Cancels the customer's existing appointment, located by their \
         registered phone number."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string(
            "phone_number",
            "Customer's registered phone number",
        )]
    }

    async fn execute(&self, _ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        let phone_number = require_str(args, "phone_number")?;

        let appointment = match self.store.cancel_appointment(phone_number).await {
            Ok(Some(appointment)) => appointment,
            Ok(None) => {
                return Ok(
                    "I couldn't find a booked appointment for that phone number.".to_string(),
                );
            }
            Err(e) => {
                error!("Failed to cancel appointment: {}", e);
                return Ok(APOLOGY.to_string());
            }
        };

        info!("Cancelled appointment for {}", phone_number);

        if let Err(e) = self
            .sms
            .send_sms(
                phone_number,
                &appointment_cancelled(&appointment.customer_name),
            )
            .await
        {
            warn!("Cancellation confirmation SMS failed: {}", e);
        }

        Ok("Your appointment has been cancelled. \
            You will receive a confirmation message shortly."
            .to_string())
    }
}
