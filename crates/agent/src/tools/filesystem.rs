//! File system tools: list, read, write

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::io::ErrorKind;

use tracing::debug;

use super::sandbox::{Action, Sandbox};
use super::{
    truncate_chars, SandboxTool, ToolError, LIST_DIRECTORY, MAX_OUTPUT_CHARS, READ_FILE,
    WRITE_FILE,
};

/// Directory listing tool
pub struct ListDirectoryTool {
    sandbox: Sandbox,
}

impl ListDirectoryTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDirectoryArgs {
    #[serde(default = "default_directory")]
    pub directory: String,
}

fn default_directory() -> String {
    ".".to_string()
}

#[async_trait]
impl SandboxTool for ListDirectoryTool {
    type Args = ListDirectoryArgs;

    const NAME: &'static str = LIST_DIRECTORY;

    fn description(&self) -> &'static str {
        "Lists files in the specified directory along with their sizes, constrained to the working directory."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "directory": {
                    "type": "STRING",
                    "description": "The directory to list files from, relative to the working directory. If not provided, lists files in the working directory itself."
                }
            }
        })
    }

    async fn run(&self, args: ListDirectoryArgs) -> Result<String, ToolError> {
        let dir = args.directory;
        let path = self.sandbox.resolve(&dir, Action::List).await?;

        debug!("listing {:?}", path);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ToolError::NotFound(dir)),
            Err(e) => return Err(ToolError::io(&dir, e)),
        };
        if !metadata.is_dir() {
            return Err(ToolError::NotADirectory(dir));
        }

        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| ToolError::io(&dir, e))?;
        let mut items = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ToolError::io(&dir, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            // Follow symlinks for size/type; fall back to the link itself when dangling
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(_) => entry.metadata().await.map_err(|e| ToolError::io(&dir, e))?,
            };
            items.push((name, metadata.len(), metadata.is_dir()));
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));

        if items.is_empty() {
            return Ok(format!("Directory \"{}\" is empty", dir));
        }
        Ok(items
            .iter()
            .map(|(name, size, is_dir)| {
                format!("- {}: file_size={} bytes, is_dir={}", name, size, is_dir)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// File reading tool
pub struct ReadFileTool {
    sandbox: Sandbox,
}

impl ReadFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFileArgs {
    pub file_path: String,
}

#[async_trait]
impl SandboxTool for ReadFileTool {
    type Args = ReadFileArgs;

    const NAME: &'static str = READ_FILE;

    fn description(&self) -> &'static str {
        "Reads the contents of a file (up to 10000 characters), constrained to the working directory."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "file_path": {
                    "type": "STRING",
                    "description": "Path of the file to read, relative to the working directory."
                }
            },
            "required": ["file_path"]
        })
    }

    async fn run(&self, args: ReadFileArgs) -> Result<String, ToolError> {
        let file_path = args.file_path;
        let path = self.sandbox.resolve(&file_path, Action::Read).await?;

        debug!("reading {:?}", path);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Err(ToolError::NotAFile(file_path)),
        }

        let mut content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::io(&file_path, e))?;
        if truncate_chars(&mut content, MAX_OUTPUT_CHARS) {
            content.push_str(&format!(
                "[...File \"{}\" truncated at {} characters]",
                file_path, MAX_OUTPUT_CHARS
            ));
        }
        Ok(content)
    }
}

/// File writing tool
pub struct WriteFileTool {
    sandbox: Sandbox,
}

impl WriteFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFileArgs {
    pub file_path: String,
    pub content: String,
}

#[async_trait]
impl SandboxTool for WriteFileTool {
    type Args = WriteFileArgs;

    const NAME: &'static str = WRITE_FILE;

    fn description(&self) -> &'static str {
        "Writes content to a file, creating parent directories as needed and overwriting any existing content. Constrained to the working directory."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "file_path": {
                    "type": "STRING",
                    "description": "Path of the file to write, relative to the working directory."
                },
                "content": {
                    "type": "STRING",
                    "description": "The full content to write to the file."
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn run(&self, args: WriteFileArgs) -> Result<String, ToolError> {
        let file_path = args.file_path;
        let path = self.sandbox.resolve(&file_path, Action::Write).await?;

        if let Ok(metadata) = tokio::fs::metadata(&path).await {
            if metadata.is_dir() {
                return Err(ToolError::IsADirectory(file_path));
            }
        }

        debug!("writing {:?}", path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io(&file_path, e))?;
        }
        tokio::fs::write(&path, &args.content)
            .await
            .map_err(|e| ToolError::io(&file_path, e))?;

        Ok(format!(
            "Successfully wrote to \"{}\" ({} characters written)",
            file_path,
            args.content.chars().count()
        ))
    }
}
