use std::path::PathBuf;

use thiserror::Error;

use crate::wallpaper::OsKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("malformed response ({context}): {reason}")]
    Parse { context: String, reason: String },

    #[error("could not decode image from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Fatal failure of one wallpaper operation, after every fallback ran.
    #[error("failed to set wallpaper on {os} at stage `{stage}`: {detail}")]
    SetWallpaper {
        os: OsKind,
        stage: String,
        detail: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn network(url: &str, reason: impl ToString) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
