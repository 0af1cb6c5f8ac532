use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Project file not found. Looked in:\n\
        - current directory: plinth.local.kdl, .plinth.local.kdl, plinth.kdl, .plinth.kdl\n\
        - ./.plinth/ directory\n\
        Use --file or the PLINTH_CONFIG_PATH environment variable to point at one"
    )]
    ProjectFileNotFound,

    #[error("Project file does not exist: {0}")]
    ExplicitPathMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
