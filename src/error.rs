use std::fmt::Display;

use crate::model::Provider;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid URL: {0}")]
    Invalid(String),

    #[error("Unsupported {provider} URL: {reason}")]
    Unsupported { provider: Provider, reason: String },

    #[error("{provider} request failed: {message}")]
    Upstream { provider: Provider, message: String },
}
impl ResolveError {
    pub fn upstream(provider: Provider, message: impl Display) -> Self {
        Self::Upstream {
            provider,
            message: message.to_string(),
        }
    }

    pub fn unsupported(provider: Provider, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            provider,
            reason: reason.into(),
        }
    }

    pub const fn provider(&self) -> Provider {
        match self {
            Self::Invalid(_) => Provider::Invalid,
            Self::Unsupported { provider, .. } | Self::Upstream { provider, .. } => *provider,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Missing type or metadata")]
    MissingFields,

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid format: {0:?}")]
    InvalidFormat(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidInput(#[from] JobError),

    #[error("Worker request failed: {0}")]
    Worker(String),
}
