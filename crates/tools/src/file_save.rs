//! File save tool — write content to a file inside the workspace.
//!
//! Relative paths are resolved under the workspace directory. Paths that
//! would escape the workspace (absolute paths outside it, `..` traversal)
//! are rejected before any I/O happens.

use async_trait::async_trait;
use openmanus_core::error::ToolError;
use openmanus_core::tool::{Tool, ToolResult};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub struct FileSaveTool {
    workspace_dir: PathBuf,
}

impl FileSaveTool {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }

    /// Resolve a user-supplied path against the workspace root.
    ///
    /// Rejects `..` components and absolute paths that land outside the
    /// workspace. Does not require the file to exist.
    fn resolve(&self, path: &str) -> std::result::Result<PathBuf, ToolError> {
        let candidate = Path::new(path);

        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ToolError::InvalidArguments(format!(
                "path '{path}' must not contain '..'"
            )));
        }

        let resolved = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace_dir.join(candidate)
        };

        if !resolved.starts_with(&self.workspace_dir) {
            return Err(ToolError::InvalidArguments(format!(
                "path '{path}' is outside the workspace directory"
            )));
        }

        Ok(resolved)
    }
}

#[async_trait]
impl Tool for FileSaveTool {
    fn name(&self) -> &str {
        "file_save"
    }

    fn description(&self) -> &str {
        "Save content to a file in the workspace. Creates the file (and parent directories) if needed, overwrites by default, or appends when requested."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path, relative to the workspace directory"
                },
                "content": {
                    "type": "string",
                    "description": "The content to save"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append to the file instead of overwriting (default false)",
                    "default": false
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let append = arguments["append"].as_bool().unwrap_or(false);

        let resolved = self.resolve(path)?;
        debug!(path = %resolved.display(), append, "Saving file");

        if let Some(parent) = resolved.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult::error(format!(
                "Failed to create directory: {e}"
            )));
        }

        let write_result = if append {
            use tokio::io::AsyncWriteExt;
            match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .await
            {
                Ok(mut file) => file.write_all(content.as_bytes()).await,
                Err(e) => Err(e),
            }
        } else {
            tokio::fs::write(&resolved, content).await
        };

        match write_result {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Saved {} bytes to {}",
                content.len(),
                resolved.display()
            ))),
            Err(e) => Ok(ToolResult::error(format!("Failed to save file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaveTool::new(dir.path());

        let result = tool
            .execute(serde_json::json!({
                "path": "notes/output.txt",
                "content": "Hello from test!"
            }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("16 bytes"));
        let content = std::fs::read_to_string(dir.path().join("notes/output.txt")).unwrap();
        assert_eq!(content, "Hello from test!");
    }

    #[tokio::test]
    async fn append_mode() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaveTool::new(dir.path());

        for part in ["one\n", "two\n"] {
            tool.execute(serde_json::json!({
                "path": "log.txt",
                "content": part,
                "append": true
            }))
            .await
            .unwrap();
        }

        let content = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }

    #[tokio::test]
    async fn traversal_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaveTool::new(dir.path());

        let result = tool
            .execute(serde_json::json!({
                "path": "../escape.txt",
                "content": "nope"
            }))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn absolute_path_outside_workspace_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaveTool::new(dir.path());

        let result = tool
            .execute(serde_json::json!({
                "path": "/etc/shadow",
                "content": "nope"
            }))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn absolute_path_inside_workspace_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaveTool::new(dir.path());
        let inside = dir.path().join("ok.txt");

        let result = tool
            .execute(serde_json::json!({
                "path": inside.to_str().unwrap(),
                "content": "fine"
            }))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn missing_content_argument() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaveTool::new(dir.path());
        let result = tool.execute(serde_json::json!({"path": "a.txt"})).await;
        assert!(result.is_err());
    }
}
