//! Typed decoding of model-issued function calls

use sandpit_provider::FunctionCall;
use serde_json::Value;

use super::filesystem::{ListDirectoryArgs, ReadFileArgs, WriteFileArgs};
use super::script::RunScriptArgs;
use super::{ToolError, LIST_DIRECTORY, READ_FILE, RUN_SCRIPT, WRITE_FILE};

/// One validated tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    ListDirectory(ListDirectoryArgs),
    ReadFile(ReadFileArgs),
    WriteFile(WriteFileArgs),
    RunScript(RunScriptArgs),
}

impl ToolInvocation {
    /// Decode a call by name. Unknown tools and unknown, missing or mistyped
    /// fields are rejected; omissible fields get their defaults here.
    pub fn parse(call: &FunctionCall) -> Result<Self, ToolError> {
        let args = &call.args;
        match call.name.as_str() {
            LIST_DIRECTORY => decode(LIST_DIRECTORY, args).map(ToolInvocation::ListDirectory),
            READ_FILE => decode(READ_FILE, args).map(ToolInvocation::ReadFile),
            WRITE_FILE => decode(WRITE_FILE, args).map(ToolInvocation::WriteFile),
            RUN_SCRIPT => decode(RUN_SCRIPT, args).map(ToolInvocation::RunScript),
            other => Err(ToolError::UnknownFunction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolInvocation::ListDirectory(_) => LIST_DIRECTORY,
            ToolInvocation::ReadFile(_) => READ_FILE,
            ToolInvocation::WriteFile(_) => WRITE_FILE,
            ToolInvocation::RunScript(_) => RUN_SCRIPT,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolError> {
    // Gemini omits `args` entirely for argument-less calls
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(name: &str, args: Value) -> Result<ToolInvocation, ToolError> {
        ToolInvocation::parse(&FunctionCall::new(name, args))
    }

    #[test]
    fn test_list_directory_defaults_to_dot() {
        let invocation = parse(LIST_DIRECTORY, json!({})).unwrap();
        assert_eq!(
            invocation,
            ToolInvocation::ListDirectory(ListDirectoryArgs {
                directory: ".".to_string()
            })
        );

        let invocation = parse(LIST_DIRECTORY, Value::Null).unwrap();
        assert_eq!(invocation.name(), LIST_DIRECTORY);
    }

    #[test]
    fn test_run_script_args_default_empty() {
        match parse(RUN_SCRIPT, json!({"file_path": "main.py"})).unwrap() {
            ToolInvocation::RunScript(args) => {
                assert_eq!(args.file_path, "main.py");
                assert!(args.args.is_empty());
            }
            other => panic!("Expected RunScript, got {:?}", other),
        }
    }

    #[test]
    fn test_write_file_requires_content() {
        let err = parse(WRITE_FILE, json!({"file_path": "a.txt"})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid arguments for write_file"), "{}", msg);
        assert!(msg.contains("content"), "{}", msg);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse(READ_FILE, json!({"file_path": "a.txt", "mode": "rb"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(err.to_string().contains("mode"));
    }

    #[test]
    fn test_mistyped_field_rejected() {
        let err = parse(LIST_DIRECTORY, json!({"directory": 5})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == LIST_DIRECTORY));

        let err = parse(RUN_SCRIPT, json!({"file_path": "a.py", "args": "--x"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_unknown_function() {
        let err = parse("delete_everything", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Unknown function: delete_everything");
    }
}
