//! Fixed capacity limits (`C1`-`C8` share these). All of them are compile-time
//! constants rather than runtime configuration — the original system sized
//! its buffers and tables statically, and nothing in the spec calls for
//! making them adjustable at runtime.

/// Maximum size, in bytes, of a single inbound request's argument payload
/// (excludes the 40-byte call header).
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Maximum size, in bytes, of a single outbound reply's result payload
/// (excludes the reply header).
pub const MAX_RESPONSE_SIZE: usize = 128;

/// Maximum number of calls a [`crate::client::Client`] may have in flight
/// (sent but not yet collected) at once.
pub const MAX_PIPELINE: usize = 8;

/// Maximum number of services a [`crate::server::Server`] may register.
pub const MAX_SERVICES: usize = 128;

/// Maximum number of procedures a single [`crate::registry::Service`] may
/// bind.
pub const MAX_PROCEDURES_PER_SERVICE: usize = 128;

/// Backlog passed to `listen(2)` for the server's accept socket.
pub const LISTEN_BACKLOG: u32 = 128;

/// Maximum number of `mio` events drained from [`mio::Poll`] per loop
/// iteration.
pub const POLL_BATCH_SIZE: usize = 128;

/// How long a connection may sit idle before it becomes eligible for
/// eviction.
///
/// `Server::check_timeout` walks the LRU list from its tail and closes any
/// connection idle past this horizon (see `DESIGN.md`).
pub const IDLE_EVICTION_HORIZON: std::time::Duration = std::time::Duration::from_secs(60);
