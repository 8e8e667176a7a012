//! A single accepted TCP connection (`C6`): framing state, in/out buffers,
//! and the intrusive LRU linkage the server uses to track connections by
//! slot index rather than through a `HashMap`.
//!
//! Grounded on the `mio`-based stream wrapper pattern used elsewhere in the
//! retrieval pack: a connection owns its socket and its buffers, and exposes
//! a `poll_with`-shaped entry point the event loop drives on readiness.

use crate::buffer::SlidingBuffer;
use crate::config::{MAX_REQUEST_SIZE, MAX_RESPONSE_SIZE};
use crate::wire::{CallDecodeError, CallHeader};
use mio::net::TcpStream;
use std::io::{self, Read, Write};
use std::time::Instant;

/// Whether a connection should remain registered with the event loop.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    /// The socket is still usable.
    Alive,
    /// The peer closed the connection, or it hit a fatal I/O error; the
    /// server should close and recycle this slot.
    Closed,
}

/// One accepted connection: its socket, its read/write buffers, and the
/// doubly-linked slot indices the server's LRU list threads through it.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    inbound: SlidingBuffer,
    outbound: SlidingBuffer,
    last_active: Instant,
    error: bool,

    /// Intrusive LRU links: the slot index of the neighbouring connections
    /// in the server's most-recently-used list, or `None` at a list end.
    pub(crate) lru_prev: Option<usize>,
    pub(crate) lru_next: Option<usize>,
}

// Calls in flight on one connection never exceed the pipeline cap, and a
// call header plus its maximum payload always fits comfortably inside the
// inbound buffer without needing mid-parse compaction against the header
// itself.
const INBOUND_CAPACITY: usize = (CallHeader::ENCODED_LEN + MAX_REQUEST_SIZE) * 2;
const OUTBOUND_CAPACITY: usize = MAX_RESPONSE_SIZE * 16;

impl Connection {
    /// Wraps a freshly accepted socket.
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            inbound: SlidingBuffer::new(INBOUND_CAPACITY),
            outbound: SlidingBuffer::new(OUTBOUND_CAPACITY),
            last_active: Instant::now(),
            error: false,
            lru_prev: None,
            lru_next: None,
        }
    }

    /// The underlying socket, for registering with a [`mio::Poll`].
    pub fn stream(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// The timestamp of this connection's last successful read or write.
    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    /// Marks this connection as fatally errored: a BADCRED, PROG_MISMATCH,
    /// or GARBAGE_ARGS reply has been queued and the stream can no longer be
    /// resynchronised (spec §4.2/§7). The server defers closing the socket
    /// until [`Connection::has_error`] is true *and* the outbound buffer has
    /// been fully drained, so the peer observes the reply before the reset.
    pub fn mark_error(&mut self) {
        self.error = true;
    }

    /// Whether [`Connection::mark_error`] has been called on this
    /// connection.
    pub fn has_error(&self) -> bool {
        self.error
    }

    /// Reads as much as the socket currently has available into the inbound
    /// buffer, without blocking.
    ///
    /// Returns [`ConnState::Closed`] on EOF or a fatal I/O error;
    /// `WouldBlock` is not an error here, it just means there was nothing
    /// more to read this tick.
    pub fn fill(&mut self) -> ConnState {
        self.inbound.slide(MAX_REQUEST_SIZE);
        loop {
            if self.inbound.residual() == 0 {
                // Saturated with an unconsumed request; nothing productive
                // to do until the caller drains it via `peek_header`/`consume_call`.
                return ConnState::Alive;
            }

            match self.stream.read(self.inbound.writable_mut()) {
                Ok(0) => return ConnState::Closed,
                Ok(n) => {
                    self.inbound.advance_end(n);
                    self.last_active = Instant::now();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return ConnState::Alive,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return ConnState::Closed,
            }
        }
    }

    /// Parses the next call header at the front of the inbound window
    /// without consuming anything.
    ///
    /// `Ok(None)` means the buffer holds fewer bytes than a full header;
    /// retry after the next successful [`Connection::fill`]. `Err` means the
    /// framing itself is invalid and the connection must be torn down after
    /// a `BADCRED` reply is flushed, per spec §4.2 (malformed requests are
    /// not resynchronised by scanning).
    ///
    /// There is no length field carrying the argument payload's size — this
    /// protocol lays messages back to back with no record-marking framing
    /// — so the caller must decode the arguments itself (via the matching
    /// [`crate::registry::Service`]) to learn how many payload bytes beyond
    /// the header belong to this call, then report that back through
    /// [`Connection::consume_call`].
    pub fn peek_header(&self) -> Result<Option<(CallHeader, usize)>, CallDecodeError> {
        match CallHeader::decode_from(self.inbound.readable()) {
            Ok((header, header_len)) => Ok(Some((header, header_len))),
            Err(CallDecodeError::Incomplete) => Ok(None),
            Err(CallDecodeError::Malformed) => Err(CallDecodeError::Malformed),
        }
    }

    /// Every readable byte after the first `header_len` bytes: a candidate
    /// argument payload for whatever call [`Connection::peek_header`] just
    /// returned. This may contain bytes belonging to a *subsequent*
    /// pipelined call too; only as many of them as the argument type
    /// actually decodes belong to the current one.
    pub fn payload_candidate(&self, header_len: usize) -> &[u8] {
        &self.inbound.readable()[header_len..]
    }

    /// Marks one fully dispatched call as consumed: `header_len` header
    /// bytes plus `payload_consumed` argument bytes.
    pub fn consume_call(&mut self, header_len: usize, payload_consumed: usize) {
        self.inbound.advance_start(header_len + payload_consumed);
    }

    /// Queues `bytes` for writing, returning `false` if the outbound buffer
    /// does not have room.
    pub fn queue_write(&mut self, bytes: &[u8]) -> bool {
        self.outbound.slide(bytes.len());
        if self.outbound.residual() < bytes.len() {
            return false;
        }
        self.outbound.writable_mut()[..bytes.len()].copy_from_slice(bytes);
        self.outbound.advance_end(bytes.len());
        true
    }

    /// Whether the outbound buffer has at least `n` bytes of residual, after
    /// compacting. Lets a caller check there is room for a reply *before*
    /// invoking the handler that produces it, per spec §4.5 ("failure to
    /// produce exits the loop without side effect").
    pub fn outbound_has_room(&mut self, n: usize) -> bool {
        self.outbound.slide(self.outbound.capacity());
        self.outbound.residual() >= n
    }

    /// True if there is queued, unsent data for this connection.
    pub fn has_pending_writes(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Writes as much of the outbound buffer as the socket currently
    /// accepts, without blocking.
    pub fn drain(&mut self) -> ConnState {
        loop {
            if self.outbound.is_empty() {
                return ConnState::Alive;
            }
            match self.stream.write(self.outbound.readable()) {
                Ok(0) => return ConnState::Closed,
                Ok(n) => {
                    self.outbound.advance_start(n);
                    self.last_active = Instant::now();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return ConnState::Alive,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return ConnState::Closed,
            }
        }
    }
}
