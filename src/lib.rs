// Core modules
pub mod config;
pub mod gate;
pub mod maps_client;
pub mod server;
pub mod session;
pub mod tools;
pub mod types;

// Re-export key types and functions
pub use config::{AppConfig, KvConfig};
pub use gate::{AuthContext, AuthSettings, GateSettings, GateState};
pub use maps_client::{MapsClient, MapsConfig};
pub use server::McpServer;
pub use session::{DurableStore, SessionStore, VolatileStore};
pub use tools::{ToolHandler, ToolRegistry};
pub use types::{PlaceId, SessionId};

use std::sync::Arc;

use anyhow::Result;

/// Convenience function to create a fully configured MCP server.
///
/// Builds the maps client, registers the mapping tools, and returns a
/// `McpServer` that implements rmcp's `ServerHandler`.
pub fn create_server(maps_api_key: impl Into<String>) -> Result<Arc<McpServer>> {
    let maps = Arc::new(MapsClient::new(MapsConfig::new(maps_api_key)));
    let tool_registry = Arc::new(tools::mapping_tools(maps));
    Ok(Arc::new(McpServer::new(tool_registry)))
}
