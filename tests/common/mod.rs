//! Shared test infrastructure for integration tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// LM command that runs `tests/mock-lm.sh` through `sh`.
pub fn mock_lm_command() -> String {
    let script = manifest_dir().join("tests/mock-lm.sh");
    format!("sh {}", shell_words::quote(&script.to_string_lossy()))
}

/// A throwaway workspace plus a way to run `seows` against it.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp workspace"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Run `seows` with no LM configured anywhere.
    pub fn run_without_lm(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run seows")
    }

    /// Run `seows --lm <mock>`.
    pub fn run(&self, args: &[&str]) -> Output {
        self.command()
            .arg("--lm")
            .arg(mock_lm_command())
            .args(args)
            .output()
            .expect("run seows")
    }

    /// Run and require success; returns stdout.
    pub fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "seows {args:?} failed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).expect("utf-8 stdout")
    }

    pub fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let stdout = self.run_ok(args);
        serde_json::from_str(&stdout).unwrap_or_else(|err| panic!("{err}: {stdout}"))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_seows"));
        command
            .arg("--workspace")
            .arg(self.dir.path())
            .env_remove("SEOWS_WORKSPACE")
            .env_remove("SEOWS_LM_COMMAND")
            .env_remove("FREEPIK_API_KEY")
            .env_remove("DATA_FOR_SEO_API_KEY")
            .env("SEOWS_LOG", "warn");
        command
    }
}
