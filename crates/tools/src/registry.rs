use crate::{
    BookAppointmentTool, CancelAppointmentTool, EndCallTool, EscalatePriorityTool,
    ModifyAppointmentTool, SubmitComplaintTool, Tool, ToolContext, ToolDescriptor, ToolError,
    TransferCallTool,
};
use calldesk_notify::SmsGateway;
use calldesk_store::ComplaintStore;
use calldesk_telephony::TelephonyClient;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Dispatch table mapping tool names to handlers. Argument validation
/// happens here, against each tool's declared parameters, before the
/// handler runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn invoke(
        &self,
        name: &str,
        ctx: &ToolContext,
        args: &Value,
    ) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        validate_args(&tool.parameters(), args)?;

        debug!("Invoking tool {}", name);
        tool.execute(ctx, args).await
    }
}

fn validate_args(specs: &[crate::ParamSpec], args: &Value) -> Result<(), ToolError> {
    if specs.is_empty() {
        return Ok(());
    }

    let object = args
        .as_object()
        .ok_or_else(|| ToolError::InvalidParams("Arguments must be an object".to_string()))?;

    for spec in specs {
        match object.get(&spec.name) {
            None if spec.required => {
                return Err(ToolError::InvalidParams(format!(
                    "Missing required field: {}",
                    spec.name
                )));
            }
            Some(value) if !spec.param_type.matches(value) => {
                return Err(ToolError::InvalidParams(format!(
                    "Field '{}' must be of type {:?}",
                    spec.name, spec.param_type
                )));
            }
            _ => {}
        }
    }

    // Undeclared extra arguments are tolerated; the driver's LLM sometimes
    // passes more than it was asked for.
    Ok(())
}

/// Register the full call-center tool set against the shared adapters.
pub fn build_registry(
    store: Arc<dyn ComplaintStore>,
    sms: Arc<dyn SmsGateway>,
    telephony: Arc<dyn TelephonyClient>,
    transfer_target: String,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(SubmitComplaintTool::new(
        store.clone(),
        sms.clone(),
    )));
    registry.register(Arc::new(EscalatePriorityTool::new(
        store.clone(),
        sms.clone(),
    )));
    registry.register(Arc::new(BookAppointmentTool::new(store.clone(), sms.clone())));
    registry.register(Arc::new(ModifyAppointmentTool::new(
        store.clone(),
        sms.clone(),
    )));
    registry.register(Arc::new(CancelAppointmentTool::new(store, sms)));
    registry.register(Arc::new(TransferCallTool::new(
        telephony.clone(),
        transfer_target,
    )));
    registry.register(Arc::new(EndCallTool::new(telephony)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::session_with_mobile;
    use crate::ParamSpec;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the message back"
        }

        fn parameters(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::string("message", "Text to echo")]
        }

        async fn execute(&self, _ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
            Ok(crate::require_str(args, "message")?.to_string())
        }
    }

    #[tokio::test]
    async fn test_invoke_dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ctx = session_with_mobile(Some("+919000000001"));
        let spoken = registry
            .invoke("echo", &ctx, &json!({"message": "hello"}))
            .await
            .unwrap();
        assert_eq!(spoken, "hello");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let registry = ToolRegistry::new();
        let ctx = session_with_mobile(None);
        let result = registry.invoke("nope", &ctx, &json!({})).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn test_missing_required_param_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ctx = session_with_mobile(None);
        let result = registry.invoke("echo", &ctx, &json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_wrong_param_type_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ctx = session_with_mobile(None);
        let result = registry.invoke("echo", &ctx, &json!({"message": 7})).await;
        assert!(matches!(result, Err(ToolError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_extra_args_are_tolerated() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let ctx = session_with_mobile(None);
        let spoken = registry
            .invoke("echo", &ctx, &json!({"message": "hi", "mood": "cheerful"}))
            .await
            .unwrap();
        assert_eq!(spoken, "hi");
    }

    #[test]
    fn test_descriptors_are_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "echo");
        assert_eq!(descriptors[0].parameters.len(), 1);
    }
}
