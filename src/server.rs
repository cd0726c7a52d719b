//! MCP server implementation using rmcp.
//!
//! Handles protocol requests and delegates tool calls to the registry. The
//! HTTP entry point wires the request gate in front of the rmcp service so
//! every transport-level request is checked before the protocol sees it.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::*,
    service::{NotificationContext, RequestContext, RoleServer},
};
use tower_http::trace::TraceLayer;

use crate::gate::{AuthContext, GateState};
use crate::tools::{ToolContext, ToolRegistry};

/// Type alias for HTTP request parts stored in rmcp extensions.
type HttpParts = http::request::Parts;

const SERVER_INSTRUCTIONS: &str = "Mapping toolset backed by a places and routes provider. Use \
     atlas.search_places to find candidate places, atlas.place_details for a full record, and \
     atlas.compute_route for distance and travel time between two waypoints.";

/// MCP server that handles protocol requests and delegates to tool handlers.
#[derive(Clone)]
pub struct McpServer {
    tool_registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(tool_registry: Arc<ToolRegistry>) -> Self {
        Self { tool_registry }
    }

    pub fn tool_registry(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }

    /// Pull the gate's decision out of the rmcp request context.
    ///
    /// The HTTP transport stores `http::request::Parts` in rmcp extensions;
    /// the gate middleware attached the [`AuthContext`] to those parts.
    /// Absent on stdio, where there is no gate.
    fn auth_context(context: &RequestContext<RoleServer>) -> Option<AuthContext> {
        context
            .extensions
            .get::<HttpParts>()
            .and_then(|parts| parts.extensions.get::<AuthContext>())
            .cloned()
    }

    fn capabilities() -> ServerCapabilities {
        ServerCapabilities::builder().enable_tools().build()
    }
}

impl ServerHandler for McpServer {
    fn ping(
        &self,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<(), McpError>> + Send + '_ {
        std::future::ready(Ok(()))
    }

    fn initialize(
        &self,
        _request: InitializeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<InitializeResult, McpError>> + Send + '_ {
        std::future::ready(Ok(InitializeResult {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: Self::capabilities(),
            server_info: Implementation::from_build_env(),
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }))
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let result = ListToolsResult {
            tools: self.tool_registry.list_tools(),
            next_cursor: None,
            ..Default::default()
        };
        std::future::ready(Ok(result))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let tool_name = request.name.to_string();
        let args = request.arguments.unwrap_or_default();
        let registry = self.tool_registry.clone();
        let ctx = ToolContext::with_auth(Self::auth_context(&context));

        async move {
            match registry.call_tool(&tool_name, args, &ctx).await {
                Ok(result) => Ok(result),
                Err(e) => Err(McpError::internal_error(
                    format!("Tool execution failed: {}", e),
                    None,
                )),
            }
        }
    }

    // Default implementations for unsupported features

    fn complete(
        &self,
        _request: CompleteRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CompleteResult, McpError>> + Send + '_ {
        std::future::ready(Err(McpError::method_not_found::<CompleteRequestMethod>()))
    }

    fn set_level(
        &self,
        _request: SetLevelRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<(), McpError>> + Send + '_ {
        std::future::ready(Err(McpError::method_not_found::<SetLevelRequestMethod>()))
    }

    fn on_cancelled(
        &self,
        _notification: CancelledNotificationParam,
        _context: NotificationContext<RoleServer>,
    ) -> impl Future<Output = ()> + Send + '_ {
        std::future::ready(())
    }

    fn on_progress(
        &self,
        _notification: ProgressNotificationParam,
        _context: NotificationContext<RoleServer>,
    ) -> impl Future<Output = ()> + Send + '_ {
        std::future::ready(())
    }

    fn on_initialized(
        &self,
        _context: NotificationContext<RoleServer>,
    ) -> impl Future<Output = ()> + Send + '_ {
        std::future::ready(())
    }

    fn on_roots_list_changed(
        &self,
        _context: NotificationContext<RoleServer>,
    ) -> impl Future<Output = ()> + Send + '_ {
        std::future::ready(())
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: Self::capabilities(),
            server_info: Implementation::from_build_env(),
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }
    }
}

/// Build the HTTP router: the rmcp streamable service at `/mcp`, gated.
///
/// Split from [`start_http`] so tests can drive the router without binding
/// a socket.
pub fn http_router(server: Arc<McpServer>, gate: GateState) -> Router {
    let service = StreamableHttpService::new(
        {
            let tool_registry = server.tool_registry().clone();
            move || Ok(McpServer::new(tool_registry.clone()))
        },
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .nest_service("/mcp", service)
        .layer(axum::middleware::from_fn_with_state(
            gate,
            crate::gate::middleware::enforce,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Serve MCP over Streamable HTTP on the given bind address.
pub async fn start_http(server: Arc<McpServer>, bind: &str, gate: GateState) -> Result<()> {
    let auth_required = gate.settings().auth.requires_auth();
    let router = http_router(server, gate);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    if auth_required {
        tracing::info!("MCP HTTP server listening on http://{} (auth enabled)", bind);
    } else {
        tracing::info!("MCP HTTP server listening on http://{} (anonymous mode)", bind);
    }

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{AuthSettings, GateSettings};
    use crate::maps_client::{MapsClient, MapsConfig};
    use crate::session::VolatileStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_router(settings: GateSettings) -> Router {
        let maps = Arc::new(MapsClient::new(MapsConfig::new("test-key")));
        let server = Arc::new(McpServer::new(Arc::new(crate::tools::mapping_tools(maps))));
        let gate = GateState::new(settings, Arc::new(VolatileStore::new()));
        http_router(server, gate)
    }

    #[tokio::test]
    async fn test_gated_endpoint_challenges_without_token() {
        let router = test_router(GateSettings::new(AuthSettings::bearer("abc123")));
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));
    }

    #[tokio::test]
    async fn test_gate_applies_to_every_path() {
        let router = test_router(GateSettings::new(AuthSettings::bearer("abc123")));
        let request = Request::builder()
            .uri("/anything")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_server_info_advertises_tools() {
        let maps = Arc::new(MapsClient::new(MapsConfig::new("test-key")));
        let server = McpServer::new(Arc::new(crate::tools::mapping_tools(maps)));
        let info = server.get_info();
        assert_eq!(info.protocol_version, ProtocolVersion::V_2025_06_18);
        assert!(info.capabilities.tools.is_some());
    }
}
