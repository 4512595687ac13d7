use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("File error ({}): {message}", .path.display())]
    File { path: PathBuf, message: String },

    #[error("Invalid Gemfile.lock at {}: {message}", .path.display())]
    InvalidLockfile { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Advisory source error: {0}")]
    Advisory(String),

    #[error("Package manager error (`{command}`): {message}")]
    PackageManager { command: String, message: String },

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    pub fn file(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn invalid_lockfile(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::InvalidLockfile {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        2
    }
}
