// Tool Manager - Routes tool calls to the service that owns the tool
use super::{comments::CommentTools, review::ReviewTools, service_trait::ToolService};
use crate::{
    bitbucket::DiffSource,
    diff::{CodeMatcher, ConfidenceWeights},
    errors::{McpError, McpResult},
    mcp::McpTool,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct ToolManager {
    /// Registration order, which is also listing order
    services: Vec<Arc<dyn ToolService>>,
    routes: HashMap<String, Arc<dyn ToolService>>,
}

impl ToolManager {
    pub fn new(source: Arc<dyn DiffSource>, weights: ConfidenceWeights) -> Self {
        let mut manager = Self::empty();
        manager.register(Arc::new(ReviewTools::new(source.clone())));
        manager.register(Arc::new(CommentTools::new(source, CodeMatcher::new(weights))));
        manager
    }

    pub fn empty() -> Self {
        Self {
            services: Vec::new(),
            routes: HashMap::new(),
        }
    }

    pub fn register(&mut self, service: Arc<dyn ToolService>) {
        for tool in service.list_tools() {
            debug!(service = service.id(), tool = %tool.name, "Registering tool");
            self.routes.insert(tool.name, service.clone());
        }
        self.services.push(service);
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn tool_count(&self) -> usize {
        self.routes.len()
    }

    /// List all tools from all services
    pub fn list_all_tools(&self) -> Vec<McpTool> {
        self.services
            .iter()
            .flat_map(|service| service.list_tools())
            .collect()
    }

    pub async fn call_tool(&self, name: &str, args: Value) -> McpResult<Value> {
        let service = self
            .routes
            .get(name)
            .ok_or_else(|| McpError::ToolNotFound(format!("Unknown tool: {name}")))?;

        service.call_tool(name, args).await
    }
}
