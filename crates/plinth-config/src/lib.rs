pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// Environment variable naming the project file directly
pub const CONFIG_PATH_ENV: &str = "PLINTH_CONFIG_PATH";

/// Project directory holding state and, optionally, the project file
pub const PROJECT_DIR: &str = ".plinth";

const CANDIDATES: [&str; 4] = [
    "plinth.local.kdl",
    ".plinth.local.kdl",
    "plinth.kdl",
    ".plinth.kdl",
];

/// Locate the project file
///
/// Search order:
/// 1. `explicit` (the `--file` flag)
/// 2. environment variable PLINTH_CONFIG_PATH
/// 3. current directory: plinth.local.kdl, .plinth.local.kdl, plinth.kdl, .plinth.kdl
/// 4. ./.plinth/ with the same names
pub fn find_project_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::ExplicitPathMissing(path.to_path_buf()));
    }

    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{CONFIG_PATH_ENV} points at a missing file");
    }

    let current_dir = std::env::current_dir()?;
    find_in_dir(&current_dir)
        .or_else(|| {
            let project_dir = current_dir.join(PROJECT_DIR);
            project_dir
                .is_dir()
                .then(|| find_in_dir(&project_dir))
                .flatten()
        })
        .ok_or(ConfigError::ProjectFileNotFound)
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Root directory of a project: the directory containing its file, or the
/// parent of `.plinth/` when the file lives there
pub fn project_root(project_file: &Path) -> PathBuf {
    let parent = project_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    if parent.file_name().and_then(|n| n.to_str()) == Some(PROJECT_DIR) {
        parent
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    } else {
        parent.to_path_buf()
    }
}
