use std::str::Utf8Error;

/// All error types that can occur while emulating a bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A discovery datagram had a malformed request or header line.
    #[error("invalid header: {line}")]
    Parse { line: String },

    /// A discovery datagram contained invalid UTF-8.
    #[error("utf8 decoding error: {0:?}")]
    Utf8Decode(Utf8Error),

    /// A light with the same name is already stored.
    #[error("light with name {0} already exists")]
    DuplicateName(String),

    /// The requested light does not exist.
    #[error("light {0} not found")]
    NotFound(String),

    /// A storage namespace was used before it was created.
    #[error("bucket {0} does not exist")]
    BucketMissing(String),

    /// The storage backend failed.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The storage backend lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    StorePoisoned,

    /// Failed to serialize a record to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize a stored record.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A state change was applied but could not be written back.
    #[error("failed to persist state of light {id}: {source}")]
    StatePersist {
        id: String,
        #[source]
        source: Box<Error>,
    },

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The discovery address could not be resolved for the configured network.
    #[error("cannot resolve {0}")]
    Resolve(String),

    /// The configured network interface is unusable.
    #[error("network interface {0}")]
    Interface(String),

    /// The emulator configuration is incomplete or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create a new parse error for the offending line
    pub fn parse(line: &str) -> Self {
        Error::Parse {
            line: line.to_string(),
        }
    }

    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Wrap a write-back failure that followed a successful state change
    pub fn state_persist(id: &str, source: Error) -> Self {
        Error::StatePersist {
            id: id.to_string(),
            source: Box::new(source),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::Utf8Decode(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, Error::DuplicateName(_))
    }

    /// True for persistence failures, including a failed state write-back.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Error::BucketMissing(_)
                | Error::Store(_)
                | Error::StorePoisoned
                | Error::JsonDump(_)
                | Error::JsonLoad(_)
                | Error::StatePersist { .. }
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::Socket { .. } | Error::Resolve(_) | Error::Interface(_)
        )
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
