//! Python execution tool — run a snippet with `python3 -c` under a timeout.
//!
//! Only stdout/stderr are captured, so scripts should print what they want
//! the model to see. A snippet that exceeds the deadline is killed.

use async_trait::async_trait;
use openmanus_core::error::ToolError;
use openmanus_core::tool::{Tool, ToolResult};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

pub struct PythonExecuteTool {
    timeout: Duration,
}

impl PythonExecuteTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Tool for PythonExecuteTool {
    fn name(&self) -> &str {
        "python_execute"
    }

    fn description(&self) -> &str {
        "Execute Python code and return its printed output. Only print() output is captured; the value of the last expression is not."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to execute"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let code = arguments["code"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'code' argument".into()))?;

        debug!(bytes = code.len(), "Executing Python snippet");

        let child = Command::new("python3")
            .args(["-c", code])
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "python_execute".into(),
                reason: format!("Failed to start python3: {e}"),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: "python_execute".into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "python_execute".into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            Ok(ToolResult::ok(text.trim().to_string()))
        } else {
            let code = output.status.code().unwrap_or(-1);
            Ok(ToolResult::error(
                format!("[exit code: {code}]\n{stderr}").trim().to_string(),
            ))
        }
    }
}
