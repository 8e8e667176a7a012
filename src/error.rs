//! The crate's single error type (`C1`-`C8` all funnel into this).

use thiserror::Error;

/// Error types returned by this crate.
///
/// Non-fatal outcomes — "not enough bytes yet", "pipeline is full" — are
/// *not* represented here; they are ordinary return values (see
/// [`crate::codec::DecodeError`] and [`crate::registry::Dispatch`]). This
/// enum is reserved for conditions that are genuinely fatal to the request,
/// the connection, or the batch in flight.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The reply status in a generic reply header was not one of the known
    /// discriminators.
    #[error("invalid rpc reply status {0}")]
    InvalidReplyStatus(u32),

    /// A request or reply could not be read from the buffer because it did
    /// not contain a complete header.
    #[error("incomplete header (need {need} bytes, have {have})")]
    IncompleteHeader {
        /// Bytes required for this header.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// The server rejected the request's credentials (`MSG_DENIED` /
    /// `AUTH_ERROR` / `BADCRED`).
    #[error("request rejected: bad credentials")]
    BadCredentials,

    /// The requested `(program, procedure)` pair does not exist.
    #[error("program or procedure mismatch")]
    ProgramMismatch,

    /// The procedure handler could not decode its argument tuple.
    #[error("garbage arguments")]
    GarbageArgs,

    /// A reply in a client batch carried a non-success status.
    #[error("rpc call failed: {0}")]
    CallFailed(&'static str),

    /// Trailing bytes remained in the client's inbound buffer after every
    /// pending reply in the batch was parsed.
    #[error("trailing garbage after last reply in batch")]
    TrailingGarbage,

    /// `Service::bind` was called more times than the configured
    /// [`MaxProceduresPerService`](crate::config::MAX_PROCEDURES_PER_SERVICE).
    #[error("too many procedures registered on this service")]
    TooManyProcedures,

    /// `Server::add_service` was called more times than
    /// [`MaxServices`](crate::config::MAX_SERVICES).
    #[error("too many services registered on this server")]
    TooManyServices,

    /// An I/O error occurred reading or writing a socket.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
