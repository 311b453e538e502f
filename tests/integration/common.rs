//! Shared helpers for driving the binary.

use anyhow::Result;
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use refgraph_cli::test_utils::GraphFixture;

/// A temporary directory holding graph files and an isolated config location.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_fixture(&self, fixture: &GraphFixture) -> Result<PathBuf> {
        fixture.write_to(self.path())
    }

    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// A `refgraph` command that ignores the user's real configuration.
    pub fn refgraph(&self) -> Command {
        let mut cmd = Command::cargo_bin("refgraph").unwrap();
        cmd.current_dir(self.path())
            .env("REFGRAPH_CONFIG_PATH", self.path().join("config.toml"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}
