//! Tool registry.
//!
//! The registration table is built once at startup and keyed by
//! [`ToolName`], so every dispatch goes through the closed enum.

use crate::{BoxedTool, ToolName};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<ToolName, BoxedTool>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the built-in tools.
    ///
    /// `spawn_agent` is not registered here; it needs an engine handle and is
    /// registered by the embedding engine.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(crate::write::WriteToFileTool));
        registry.register(Arc::new(crate::read::ReadFileTool));
        registry.register(Arc::new(crate::list::ListFilesTool));
        registry.register(Arc::new(crate::search::SearchFilesTool));
        registry.register(Arc::new(crate::command::ExecuteCommandTool));
        registry.register(Arc::new(crate::web_search::WebSearchTool::new()));
        registry.register(Arc::new(crate::followup::AskFollowupQuestionTool));
        registry.register(Arc::new(crate::completion::AttemptCompletionTool));

        registry
    }

    /// Register a tool under its own name.
    pub fn register(&mut self, tool: BoxedTool) {
        self.tools.insert(tool.name(), tool);
    }

    /// Get a tool by kind.
    pub fn get(&self, name: ToolName) -> Option<&BoxedTool> {
        self.tools.get(&name)
    }

    /// List the registered tool kinds.
    pub fn list(&self) -> Vec<ToolName> {
        let mut names: Vec<ToolName> = self.tools.keys().copied().collect();
        names.sort_by_key(|name| name.as_str());
        names
    }

    /// Get all tools.
    pub fn all(&self) -> impl Iterator<Item = &BoxedTool> {
        self.tools.values()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
