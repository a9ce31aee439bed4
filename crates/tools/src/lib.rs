//! Built-in tool implementations for OpenManus.
//!
//! Tools give the agent the ability to act in the world: search the web,
//! save files into the workspace, run shell commands and Python snippets,
//! and declare the task finished via `terminate`.

pub mod file_save;
pub mod python_execute;
pub mod shell;
pub mod terminate;
pub mod web_search;

pub use terminate::TERMINATE_TOOL_NAME;

use openmanus_config::AppConfig;
use openmanus_core::error::ToolError;
use openmanus_core::tool::ToolRegistry;

/// Create the default tool registry with all built-in tools.
///
/// Security defaults come from the configuration: the shell allowlist,
/// subprocess timeout, and the workspace directory file_save is scoped to.
pub fn default_registry(config: &AppConfig) -> std::result::Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(shell::ShellTool::new(
        config.tools.shell_allowlist.clone(),
        config.tools.timeout_secs,
    )))?;
    registry.register(Box::new(python_execute::PythonExecuteTool::new(
        config.tools.timeout_secs,
    )))?;
    registry.register(Box::new(file_save::FileSaveTool::new(
        config.workspace_dir(),
    )))?;
    registry.register(Box::new(web_search::WebSearchTool))?;
    registry.register(Box::new(terminate::TerminateTool))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let config = AppConfig::default();
        let registry = default_registry(&config).unwrap();
        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "file_save",
                "python_execute",
                "shell",
                "terminate",
                "web_search"
            ]
        );
    }

    #[test]
    fn definitions_cover_every_tool() {
        let config = AppConfig::default();
        let registry = default_registry(&config).unwrap();
        assert_eq!(registry.definitions().len(), 5);
    }
}
