//! Common test utilities for sandpit integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated HOME, config directory and working directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub workspace_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".sandpit");
        let workspace_dir = temp_dir.path().join("workspace");

        std::fs::create_dir_all(&config_dir)?;
        std::fs::create_dir_all(&workspace_dir)?;

        Ok(Self {
            temp_dir,
            config_dir,
            workspace_dir,
        })
    }

    /// Command with a clean environment: no key, no overrides, no `.env`
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sandpit"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.current_dir(self.temp_dir.path());
        cmd.env_remove("GEMINI_API_KEY");
        cmd.env_remove("SANDPIT_WORKDIR");
        cmd.env_remove("SANDPIT_MODEL");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn write_config(&self, content: &str) -> anyhow::Result<()> {
        std::fs::write(self.config_dir.join("config.json"), content)?;
        Ok(())
    }

    /// Config pointing the sandbox at the workspace and the API at `api_base`
    pub fn create_config(&self, api_base: &str, max_iterations: u32) -> anyhow::Result<()> {
        let config = format!(
            r#"{{
  "agent": {{
    "working_directory": "{}",
    "max_iterations": {}
  }},
  "provider": {{
    "api_base": "{}"
  }}
}}"#,
            self.workspace_dir.display(),
            max_iterations,
            api_base
        );
        self.write_config(&config)
    }
}
