#![allow(dead_code)]
#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const VXLAN_LAB: &str = include_str!("../../../../demos/vxlan-lab/plinth.kdl");

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// Project seeded with the VXLAN lab
    pub fn lab() -> Self {
        let project = Self::new();
        project.write_plinth_kdl(VXLAN_LAB);
        project
    }

    pub fn write_plinth_kdl(&self, content: &str) {
        fs::write(self.root.path().join("plinth.kdl"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.path().join(".plinth")
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir().join("state.json")
    }

    /// `plinth` running inside the project with a clean environment
    pub fn plinth(&self) -> Command {
        command_in(self.root.path())
    }

    pub fn read_state(&self) -> serde_json::Value {
        let content = fs::read_to_string(self.state_file()).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}

pub fn command_in(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("plinth").unwrap();
    cmd.current_dir(dir)
        .env_remove("PLINTH_CONFIG_PATH")
        .env_remove("PLINTH_SIM_FAIL")
        .env_remove("PLINTH_SIM_THROTTLE")
        .env_remove("PLINTH_SIM_LATENCY_MS")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}
