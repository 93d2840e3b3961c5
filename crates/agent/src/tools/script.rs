//! Script execution tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::sandbox::{Action, Sandbox};
use super::{truncate_chars, SandboxTool, ToolError, MAX_OUTPUT_CHARS, RUN_SCRIPT};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SUPPORTED_EXTENSIONS: &str = ".py or .sh";

/// Interpreter chosen from the script extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpreter {
    Python,
    Shell,
}

impl Interpreter {
    pub fn for_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => Some(Interpreter::Python),
            Some("sh") => Some(Interpreter::Shell),
            _ => None,
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Interpreter::Python => "python3",
            Interpreter::Shell => "sh",
        }
    }
}

/// Runs a script from the sandbox with the sandbox as its working directory
pub struct RunScriptTool {
    sandbox: Sandbox,
    timeout: Duration,
}

impl RunScriptTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self::with_timeout(sandbox, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(sandbox: Sandbox, timeout: Duration) -> Self {
        Self { sandbox, timeout }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunScriptArgs {
    pub file_path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[async_trait]
impl SandboxTool for RunScriptTool {
    type Args = RunScriptArgs;

    const NAME: &'static str = RUN_SCRIPT;

    fn description(&self) -> &'static str {
        "Executes a Python (.py) or shell (.sh) script within the working directory and returns its exit code, stdout and stderr."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "file_path": {
                    "type": "STRING",
                    "description": "Path to the script to run, relative to the working directory."
                },
                "args": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Optional list of arguments to pass to the script."
                }
            },
            "required": ["file_path"]
        })
    }

    async fn run(&self, args: RunScriptArgs) -> Result<String, ToolError> {
        let file_path = args.file_path;
        let path = self.sandbox.resolve(&file_path, Action::Execute).await?;

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Err(ToolError::NotAFile(file_path)),
        }
        let interpreter =
            Interpreter::for_path(&path).ok_or_else(|| ToolError::UnsupportedScript {
                path: file_path.clone(),
                expected: SUPPORTED_EXTENSIONS,
            })?;

        debug!(
            "executing {} {:?} {:?}",
            interpreter.program(),
            path,
            args.args
        );
        let mut command = Command::new(interpreter.program());
        command
            .arg(&path)
            .args(&args.args)
            .current_dir(self.sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so the script's children can be killed with it
        #[cfg(unix)]
        {
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            path: file_path.clone(),
            source,
        })?;
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let timeout = self.timeout;
        let wait = async {
            let status = tokio::time::timeout(timeout, child.wait()).await;
            // Leftover background processes would otherwise keep running and
            // hold the output pipes open
            kill_process_group(&mut child, pid);
            match status {
                Ok(result) => Some(result),
                Err(_) => {
                    if let Err(e) = child.wait().await {
                        warn!("failed to reap {}: {}", file_path, e);
                    }
                    None
                }
            }
        };
        let (status, stdout, stderr) =
            tokio::join!(wait, read_stream(stdout), read_stream(stderr));

        let status = match status {
            Some(Ok(status)) => status,
            Some(Err(e)) => return Err(ToolError::io(&file_path, e)),
            None => {
                warn!("{} exceeded {:?}, killed", file_path, timeout);
                return Err(ToolError::Timeout {
                    path: file_path,
                    secs: timeout.as_secs(),
                });
            }
        };
        let output = Output {
            status,
            stdout,
            stderr,
        };

        Ok(format_output(&output))
    }
}

/// SIGKILL the script's whole process group. The group may already be gone.
fn kill_process_group(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // SAFETY: killpg takes no pointers; a stale group id only yields ESRCH
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
    if let Err(e) = child.start_kill() {
        debug!("direct kill skipped: {}", e);
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            warn!("failed to read script output: {}", e);
        }
    }
    buf
}

/// Exit line, empty marker, then labeled stdout/stderr blocks
fn format_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut parts = Vec::new();
    if !output.status.success() {
        match output.status.code() {
            Some(code) => parts.push(format!("Process exited with code {}", code)),
            None => parts.push("Process terminated by signal".to_string()),
        }
    }
    if stdout.is_empty() && stderr.is_empty() {
        parts.push("No output produced".to_string());
    }
    if !stdout.is_empty() {
        parts.push(format!("STDOUT:\n{}", stdout));
    }
    if !stderr.is_empty() {
        parts.push(format!("STDERR:\n{}", stderr));
    }

    let mut result = parts.join("\n");
    if truncate_chars(&mut result, MAX_OUTPUT_CHARS) {
        result.push_str(&format!(
            "\n[...Output truncated at {} characters]",
            MAX_OUTPUT_CHARS
        ));
    }
    result
}
