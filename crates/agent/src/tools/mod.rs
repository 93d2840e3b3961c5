//! Sandboxed toolkit

pub mod filesystem;
pub mod invocation;
pub mod sandbox;
pub mod script;

pub use filesystem::{ListDirectoryTool, ReadFileTool, WriteFileTool};
pub use invocation::ToolInvocation;
pub use sandbox::{Action, Sandbox};
pub use script::RunScriptTool;

use async_trait::async_trait;
use sandpit_provider::{FunctionCall, Tool, ToolResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

pub const LIST_DIRECTORY: &str = "list_directory";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const RUN_SCRIPT: &str = "run_script";

/// Maximum characters a tool result may carry back to the model
pub const MAX_OUTPUT_CHARS: usize = 10_000;

/// Tool failures. Rendered into the tool result, never raised past the registry.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Cannot {action} \"{path}\" as it is outside the permitted working directory")]
    OutsideSandbox { path: String, action: Action },

    #[error("\"{0}\" does not exist")]
    NotFound(String),

    #[error("\"{0}\" is not a directory")]
    NotADirectory(String),

    #[error("File not found or is not a regular file: \"{0}\"")]
    NotAFile(String),

    #[error("Cannot write to \"{0}\" as it is a directory")]
    IsADirectory(String),

    #[error("\"{path}\" is not a supported script (expected {expected})")]
    UnsupportedScript { path: String, expected: &'static str },

    #[error("Failed to start \"{path}\": {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },

    #[error("\"{path}\" timed out after {secs} seconds and was terminated")]
    Timeout { path: String, secs: u64 },

    #[error("I/O error on \"{path}\": {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{tool} failed unexpectedly: {reason}")]
    Internal { tool: String, reason: String },
}

impl ToolError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        ToolError::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// A tool the model may call. `Args` is the typed argument bag decoded at the
/// registry boundary.
#[async_trait]
pub trait SandboxTool: Send + Sync {
    type Args: DeserializeOwned + Send + 'static;

    const NAME: &'static str;

    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;
    async fn run(&self, args: Self::Args) -> Result<String, ToolError>;

    fn declaration(&self) -> Tool {
        Tool::new(Self::NAME, self.description(), self.parameters())
    }
}

/// Truncate to `max` characters on a char boundary. Returns whether anything was cut.
pub(crate) fn truncate_chars(content: &mut String, max: usize) -> bool {
    match content.char_indices().nth(max) {
        Some((idx, _)) => {
            content.truncate(idx);
            true
        }
        None => false,
    }
}

/// Run a tool future on its own task so a panic surfaces as a `JoinError`
/// instead of unwinding through the agent loop.
async fn run_guarded<F>(tool: &str, future: F) -> Result<String, ToolError>
where
    F: Future<Output = Result<String, ToolError>> + Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(result) => result,
        Err(e) => {
            error!("tool {} aborted: {}", tool, e);
            let reason = if e.is_panic() {
                "tool panicked".to_string()
            } else {
                e.to_string()
            };
            Err(ToolError::Internal {
                tool: tool.to_string(),
                reason,
            })
        }
    }
}

/// Fixed registry of the four sandboxed tools
pub struct ToolRegistry {
    list_directory: ListDirectoryTool,
    read_file: ReadFileTool,
    write_file: WriteFileTool,
    run_script: RunScriptTool,
}

impl ToolRegistry {
    pub fn new(sandbox: Sandbox) -> Self {
        Self::with_script_timeout(sandbox, script::DEFAULT_TIMEOUT)
    }

    pub fn with_script_timeout(sandbox: Sandbox, timeout: Duration) -> Self {
        Self {
            list_directory: ListDirectoryTool::new(sandbox.clone()),
            read_file: ReadFileTool::new(sandbox.clone()),
            write_file: WriteFileTool::new(sandbox.clone()),
            run_script: RunScriptTool::with_timeout(sandbox, timeout),
        }
    }

    /// Declarations sent to the model, in registry order
    pub fn definitions(&self) -> Vec<Tool> {
        vec![
            self.list_directory.declaration(),
            self.read_file.declaration(),
            self.write_file.declaration(),
            self.run_script.declaration(),
        ]
    }

    pub fn names(&self) -> Vec<&'static str> {
        vec![LIST_DIRECTORY, READ_FILE, WRITE_FILE, RUN_SCRIPT]
    }

    pub fn has(&self, name: &str) -> bool {
        self.names().contains(&name)
    }

    /// Execute one call. Every failure, including a panic inside the tool,
    /// comes back as an `Error: ...` payload.
    pub async fn dispatch(self: &Arc<Self>, call: &FunctionCall) -> ToolResult {
        let outcome = match ToolInvocation::parse(call) {
            Ok(invocation) => {
                debug!("dispatching {}: {:?}", invocation.name(), invocation);
                let registry = Arc::clone(self);
                run_guarded(&call.name, async move { registry.invoke(invocation).await }).await
            }
            Err(e) => Err(e),
        };

        let payload = match outcome {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        };
        ToolResult::new(&call.name, payload)
    }

    async fn invoke(&self, invocation: ToolInvocation) -> Result<String, ToolError> {
        match invocation {
            ToolInvocation::ListDirectory(args) => self.list_directory.run(args).await,
            ToolInvocation::ReadFile(args) => self.read_file.run(args).await,
            ToolInvocation::WriteFile(args) => self.write_file.run(args).await,
            ToolInvocation::RunScript(args) => self.run_script.run(args).await,
        }
    }
}
