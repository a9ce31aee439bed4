//! Terminate tool — the model's way of declaring the task finished.
//!
//! The step loop treats a call to this tool specially: after it executes,
//! the run ends instead of continuing to the next step.

use async_trait::async_trait;
use openmanus_core::error::ToolError;
use openmanus_core::tool::{Tool, ToolResult};

/// The name the step loop matches on to end the run.
pub const TERMINATE_TOOL_NAME: &str = "terminate";

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "End the current task. Call this when the request is fully handled, or when you cannot make further progress."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the task",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let status = arguments["status"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'status' argument".into()))?;

        if status != "success" && status != "failure" {
            return Err(ToolError::InvalidArguments(format!(
                "status must be 'success' or 'failure', got '{status}'"
            )));
        }

        Ok(ToolResult::ok(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_finish_status() {
        let tool = TerminateTool;
        let result = tool
            .execute(serde_json::json!({"status": "success"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("success"));
    }

    #[tokio::test]
    async fn rejects_unknown_status() {
        let tool = TerminateTool;
        let result = tool.execute(serde_json::json!({"status": "maybe"})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn schema_declares_status_enum() {
        let tool = TerminateTool;
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["status"]));
        assert_eq!(
            schema["properties"]["status"]["enum"],
            serde_json::json!(["success", "failure"])
        );
    }
}
