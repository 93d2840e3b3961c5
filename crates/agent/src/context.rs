//! System instruction sent with every request

use sandpit_provider::Tool;

/// Build the system instruction from the declared tools, so the operations it
/// advertises always match what the registry can run.
pub fn system_prompt(tools: &[Tool]) -> String {
    let operations = tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful AI coding agent.

When a user asks a question or makes a request, make a function call plan. You can perform the following operations:

{}

All paths you provide should be relative to the working directory. You do not need to specify the working directory in your function calls as it is automatically injected for security reasons.

When you have gathered enough information, answer with a final text response instead of another function call."#,
        operations
    )
}
