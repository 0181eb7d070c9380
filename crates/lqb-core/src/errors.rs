/// Core error type for the qualification bot.
///
/// Adapter crates should map their specific errors into this type so the
/// conversation core can handle failures consistently (drop vs retry vs
/// user-visible reply).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// No tenant binding and no deep link. The turn is dropped with an audit
    /// entry; the user may get a generic "use your agent's link" reply.
    #[error("unresolved identity: {0}")]
    UnresolvedIdentity(String),

    /// Durable storage failure. Fatal to the current turn so the transport
    /// can redeliver the message.
    #[error("storage error: {0}")]
    Storage(String),

    /// Versioned save lost a race. Retried once against reloaded state
    /// before escalating to `EngineFault`.
    #[error("conflicting write for lead {0}")]
    ConflictingWrite(String),

    #[error("engine fault: {0}")]
    EngineFault(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
