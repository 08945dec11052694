/// Shared error type used across all VoiceBridge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("carrier handshake: {0}")]
    CarrierHandshake(String),

    #[error("AI handshake: {0}")]
    AiHandshake(String),

    #[error("config: {0}")]
    Config(String),

    #[error("protocol framing: {0}")]
    Protocol(String),

    #[error("booking store: {0}")]
    Store(String),

    #[error("log write: {0}")]
    LogWrite(String),

    #[error("peer closed: {0}")]
    PeerClosed(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
