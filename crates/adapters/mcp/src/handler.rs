//! Method dispatch: one JSON-RPC request in, at most one response out.

use std::sync::Arc;

use serde_json::{Value, json};

use chotu_app::dispatcher::{CommandDispatcher, Turn};
use chotu_domain::prompt::{PromptCatalog, Role};

use crate::protocol::{
    Content, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, NamedCallParams,
    PROTOCOL_VERSION, Prompt, PromptArgument, PromptGetResult, PromptMessage, SERVER_NAME,
    SERVER_VERSION, Tool, ToolCallResult, error_codes, methods,
};

/// Serves MCP methods on top of the command dispatcher and prompt catalog.
pub struct McpHandler {
    dispatcher: Arc<CommandDispatcher>,
    prompts: PromptCatalog,
}

impl McpHandler {
    #[must_use]
    pub fn new(dispatcher: Arc<CommandDispatcher>, prompts: PromptCatalog) -> Self {
        Self {
            dispatcher,
            prompts,
        }
    }

    /// Claim the request's place in its actuator's queue.
    ///
    /// Must be called in the order requests arrive on the wire.
    pub fn admit(&self, request: &JsonRpcRequest) -> Turn {
        if request.is_notification() || request.method != methods::TOOLS_CALL {
            return Turn::unordered();
        }
        match request
            .params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
        {
            Some(name) => self.dispatcher.admit(name),
            None => Turn::unordered(),
        }
    }

    /// Handle one request. Notifications yield no response.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let turn = self.admit(&request);
        self.handle_in_turn(request, turn).await
    }

    /// Handle a request admitted earlier with [`admit`](Self::admit).
    pub async fn handle_in_turn(
        &self,
        request: JsonRpcRequest,
        turn: Turn,
    ) -> Option<JsonRpcResponse> {
        tracing::debug!(method = %request.method, "mcp request");
        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                error_codes::INVALID_REQUEST,
                format!("Invalid request: unsupported jsonrpc version `{}`", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            methods::INITIALIZE => JsonRpcResponse::success(id, initialize_result()),
            methods::PING => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => JsonRpcResponse::success(id, self.tools_list()),
            methods::TOOLS_CALL => self.tools_call(id, request.params, turn).await,
            methods::PROMPTS_LIST => JsonRpcResponse::success(id, self.prompts_list()),
            methods::PROMPTS_GET => self.prompts_get(id, request.params),
            other => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        if request.method == methods::INITIALIZED {
            tracing::info!(
                commands = self.dispatcher.registry().commands().len(),
                "client initialized"
            );
        } else {
            tracing::debug!(method = %request.method, "ignoring notification");
        }
    }

    fn tools_list(&self) -> Value {
        let tools: Vec<Tool> = self
            .dispatcher
            .registry()
            .commands()
            .iter()
            .map(|c| Tool {
                name: c.name,
                description: c.description,
                input_schema: c.shape.json_schema(),
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn tools_call(&self, id: Value, params: Option<Value>, turn: Turn) -> JsonRpcResponse {
        let params = match parse_params(params) {
            Ok(params) => params,
            Err(message) => return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, message),
        };

        let invoked = self
            .dispatcher
            .invoke_in_turn(turn, &params.name, &params.arguments)
            .await;
        let result = match invoked {
            Ok(output) => ToolCallResult {
                content: vec![Content::text(output.text)],
                is_error: false,
            },
            Err(err) => ToolCallResult {
                content: vec![Content::text(format!("Error: {}", err.describe()))],
                is_error: true,
            },
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, err.to_string()),
        }
    }

    fn prompts_list(&self) -> Value {
        let prompts: Vec<Prompt> = self
            .prompts
            .prompts()
            .iter()
            .map(|p| Prompt {
                name: p.name,
                description: p.description,
                arguments: p
                    .shape
                    .args()
                    .iter()
                    .map(|a| PromptArgument {
                        name: a.name,
                        description: a.description,
                        required: true,
                    })
                    .collect(),
            })
            .collect();
        json!({ "prompts": prompts })
    }

    fn prompts_get(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = match parse_params(params) {
            Ok(params) => params,
            Err(message) => return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, message),
        };
        let description = self
            .prompts
            .prompts()
            .iter()
            .find(|p| p.name == params.name)
            .map(|p| p.description.to_string())
            .unwrap_or_default();

        let message = match self.prompts.render(&params.name, &params.arguments) {
            Ok(message) => message,
            Err(err) => {
                return JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, err.describe());
            }
        };
        let result = PromptGetResult {
            description,
            messages: vec![PromptMessage {
                role: role_name(message.role).to_string(),
                content: Content::text(message.text),
            }],
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, err.to_string()),
        }
    }
}

fn parse_params(params: Option<Value>) -> Result<NamedCallParams, String> {
    let params = params.ok_or_else(|| "missing params".to_string())?;
    serde_json::from_value(params).map_err(|err| format!("invalid params: {err}"))
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "prompts": {},
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
        },
    })
}
