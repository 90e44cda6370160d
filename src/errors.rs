//! Crate-wide error taxonomy.
//!
//! Every component classifies its failures into one of these kinds before
//! handing them to a caller. The coordinator and control-plane controllers
//! map `IndexerError` onto HTTP status codes; workers map it onto queue
//! retry/fail decisions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("response could not be parsed: {0}")]
    Parse(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("no alternative provider configured for this chain")]
    NoAlternative,

    #[error("unknown chain id {0}")]
    UnknownChain(i64),

    #[error("rpc result set exceeds provider limit")]
    MaxResultsExceeded,
}

impl RpcError {
    /// §4.1 `isRetryable`.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(e) => e.is_timeout() || e.is_connect() || e.status().is_none(),
            RpcError::Timeout(_) => true,
            RpcError::Rpc { code, message } => {
                let m = message.to_lowercase();
                *code == -32005
                    || m.contains("rate")
                    || m.contains("nonce")
                    || m.contains("gas price")
                    || m.contains("gas-price")
                    || m.contains("block not found")
                    || m.contains("pending transaction")
            }
            RpcError::Http { status, .. } => *status == 429 || *status >= 500,
            RpcError::MaxResultsExceeded => false,
            RpcError::NoAlternative | RpcError::UnknownChain(_) | RpcError::Parse(_) => false,
        }
    }

    /// §4.1 `shouldSwitchProvider`.
    pub fn should_switch_provider(&self) -> bool {
        match self {
            RpcError::Transport(e) => {
                e.status().map(|s| s.as_u16() >= 400).unwrap_or(true)
            }
            RpcError::Rpc { message, .. } => {
                let m = message.to_lowercase();
                m.contains("rate limit")
                    || m.contains("quota exceeded")
                    || m.contains("service unavailable")
                    || m.contains("gateway timeout")
                    || m.contains("bad gateway")
                    || m.contains("rpc unavailable")
                    || m.contains("node syncing")
                    || m.contains("connection refused")
            }
            RpcError::Http { status, .. } => *status == 429 || *status >= 500,
            RpcError::Timeout(_) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("provider switch required: {0}")]
    ProviderSwitchRequired(String),

    #[error("rpc result set exceeds max results")]
    MaxResultsExceeded,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("repeated request: {0}")]
    RepeatedRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

impl IndexerError {
    pub fn status_code(&self) -> u16 {
        match self {
            IndexerError::NotFound(_) => 404,
            IndexerError::Validation(_) => 400,
            IndexerError::RepeatedRequest(_) => 400,
            IndexerError::Fatal(_) => 503,
            _ => 500,
        }
    }
}

impl From<IndexerError> for loco_rs::Error {
    fn from(err: IndexerError) -> Self {
        match &err {
            IndexerError::NotFound(_) => loco_rs::Error::NotFound,
            IndexerError::Validation(msg) | IndexerError::RepeatedRequest(msg) => {
                loco_rs::Error::string(msg)
            }
            other => loco_rs::Error::string(&other.to_string()),
        }
    }
}
