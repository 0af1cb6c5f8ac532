use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid value for '{key}' in resource '{resource}': {message}")]
    InvalidValue {
        resource: String,
        key: String,
        message: String,
    },

    #[error("Invalid reference '{0}' (expected \"<resource>.<attribute>\")")]
    InvalidReference(String),

    #[error("Variable '{0}' is used but never declared")]
    UndeclaredVariable(String),

    #[error(
        "Variable '{0}' has no default and no value was given\nhint: pass --var {0}=<value> or set PLINTH_VAR_{0}"
    )]
    MissingVariable(String),

    #[error("Output '{0}' is declared more than once")]
    DuplicateOutput(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
