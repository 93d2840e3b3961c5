//! Every tool refuses paths outside the working directory and leaves the
//! filesystem untouched when it does.

use sandpit_agent::ToolRegistry;
use sandpit_agent::Sandbox;
use sandpit_provider::FunctionCall;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Temp tree with `work/` as the sandbox root and `work-evil/` as a sibling
/// sharing its string prefix
fn layout() -> (TempDir, Arc<ToolRegistry>) {
    let temp_dir = TempDir::new().unwrap();
    let work = temp_dir.path().join("work");
    let evil = temp_dir.path().join("work-evil");
    fs::create_dir_all(&work).unwrap();
    fs::create_dir_all(&evil).unwrap();
    fs::write(temp_dir.path().join("secret.txt"), "top secret").unwrap();
    fs::write(evil.join("payload.sh"), "echo pwned > ../pwned.txt\n").unwrap();
    fs::write(work.join("main.py"), "print(1)\n").unwrap();

    let registry = Arc::new(ToolRegistry::new(Sandbox::new(&work).unwrap()));
    (temp_dir, registry)
}

fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path.clone());
                entries.push((path.display().to_string(), Vec::new()));
            } else {
                entries.push((path.display().to_string(), fs::read(&path).unwrap()));
            }
        }
    }
    entries.sort();
    entries
}

const ESCAPES: &[&str] = &[
    "../secret.txt",
    "../work-evil/payload.sh",
    "../../etc/passwd",
    "/etc/passwd",
    "/bin",
    "sub/../../secret.txt",
];

fn assert_rejected(payload: &str, verb: &str) {
    assert!(
        payload.starts_with(&format!("Error: Cannot {} ", verb)),
        "unexpected payload: {}",
        payload
    );
    assert!(payload.ends_with("as it is outside the permitted working directory"));
}

#[tokio::test]
async fn test_list_directory_rejects_escapes() {
    let (tmp, registry) = layout();
    let before = snapshot(tmp.path());

    for path in ESCAPES {
        let call = FunctionCall::new("list_directory", json!({ "directory": path }));
        let result = registry.dispatch(&call).await;
        assert_rejected(&result.payload, "list");
    }

    assert_eq!(before, snapshot(tmp.path()));
}

#[tokio::test]
async fn test_read_file_rejects_escapes() {
    let (tmp, registry) = layout();
    let before = snapshot(tmp.path());

    for path in ESCAPES {
        let call = FunctionCall::new("read_file", json!({ "file_path": path }));
        let result = registry.dispatch(&call).await;
        assert_rejected(&result.payload, "read");
        assert!(!result.payload.contains("top secret"));
    }

    assert_eq!(before, snapshot(tmp.path()));
}

#[tokio::test]
async fn test_write_file_rejects_escapes() {
    let (tmp, registry) = layout();
    let before = snapshot(tmp.path());

    for path in ESCAPES {
        let call = FunctionCall::new(
            "write_file",
            json!({ "file_path": path, "content": "overwritten" }),
        );
        let result = registry.dispatch(&call).await;
        assert_rejected(&result.payload, "write to");
    }

    assert_eq!(before, snapshot(tmp.path()));
}

#[tokio::test]
async fn test_run_script_rejects_escapes() {
    let (tmp, registry) = layout();
    let before = snapshot(tmp.path());

    for path in ESCAPES {
        let call = FunctionCall::new("run_script", json!({ "file_path": path }));
        let result = registry.dispatch(&call).await;
        assert_rejected(&result.payload, "execute");
    }

    assert!(!tmp.path().join("pwned.txt").exists());
    assert_eq!(before, snapshot(tmp.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_out_of_sandbox_is_rejected() {
    let (tmp, registry) = layout();
    std::os::unix::fs::symlink(tmp.path(), tmp.path().join("work").join("link")).unwrap();

    let read = FunctionCall::new("read_file", json!({ "file_path": "link/secret.txt" }));
    let result = registry.dispatch(&read).await;
    assert_rejected(&result.payload, "read");

    let write = FunctionCall::new(
        "write_file",
        json!({ "file_path": "link/new.txt", "content": "x" }),
    );
    let result = registry.dispatch(&write).await;
    assert_rejected(&result.payload, "write to");
    assert!(!tmp.path().join("new.txt").exists());
}

#[tokio::test]
async fn test_inside_paths_still_work() {
    let (_tmp, registry) = layout();

    let call = FunctionCall::new("read_file", json!({ "file_path": "./sub/../main.py" }));
    let result = registry.dispatch(&call).await;

    assert_eq!(result.payload, "print(1)\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_root_under_symlink_reads_back_its_writes() {
    let temp_dir = TempDir::new().unwrap();
    let real = temp_dir.path().join("real");
    fs::create_dir(&real).unwrap();
    std::os::unix::fs::symlink(&real, temp_dir.path().join("link")).unwrap();
    let root = temp_dir.path().join("link").join("work");
    let registry = Arc::new(ToolRegistry::new(Sandbox::new(&root).unwrap()));

    let write = FunctionCall::new("write_file", json!({ "file_path": "a.txt", "content": "hi" }));
    let result = registry.dispatch(&write).await;
    assert_eq!(result.payload, "Successfully wrote to \"a.txt\" (2 characters written)");

    let read = FunctionCall::new("read_file", json!({ "file_path": "a.txt" }));
    let result = registry.dispatch(&read).await;
    assert_eq!(result.payload, "hi");

    let list = FunctionCall::new("list_directory", json!({}));
    let result = registry.dispatch(&list).await;
    assert_eq!(result.payload, "- a.txt: file_size=2 bytes, is_dir=false");
}
