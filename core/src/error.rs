use thiserror::Error;

/// Errors surfaced by the provisioning core.
///
/// Storage corruption and scan failures are recovered locally by the
/// components that detect them; those variants reach callers only through
/// diagnostic accessors and the event queue, never as fatal conditions.
/// A connection attempt that runs out its timeout is not an error value at
/// all: it is observed as the status returning to `Disconnected`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed caller input, rejected before any mutation.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The persisted record failed magic/version/checksum validation.
    #[error("stored record failed validation: {0}")]
    Corrupted(&'static str),

    /// A scan was requested while one is already running.
    #[error("scan already in progress")]
    ScanBusy,

    /// The radio reported a scan failure.
    #[error("scan failed: {0}")]
    ScanFailed(String),

    /// A radio operation other than scan or AP bring-up failed.
    #[error("radio error: {0}")]
    Radio(String),

    /// The storage backend rejected a read or write.
    #[error("storage backend error: {0}")]
    Storage(String),

    /// Access-point creation failed; the manager enters the `Error` state.
    #[error("access point start failed: {0}")]
    PortalStart(String),
}

pub type Result<T> = core::result::Result<T, Error>;
