//! The single-threaded, level-triggered event loop (`C7`).
//!
//! Grounded on the `mio`-based poll loop shape used elsewhere in the
//! retrieval pack: one [`mio::Poll`], one [`mio::Events`] batch, connections
//! identified by [`mio::Token`] and stored in a plain slot array rather than
//! a `HashMap` so that token-to-connection lookup is a direct index.

use crate::config::{LISTEN_BACKLOG, MAX_RESPONSE_SIZE, MAX_SERVICES, POLL_BATCH_SIZE};
use crate::connection::{ConnState, Connection};
use crate::error::Error;
use crate::registry::{Dispatch, Service};
use crate::wire::{AcceptedStatus, CallDecodeError, Reply};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Poll timeout: caps how long `signal_stop` and idle-connection eviction
/// can lag behind a call, per spec §4.5/§5 (worst-case 100 ms latency).
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

const LISTENER: Token = Token(usize::MAX);

/// The outcome of looking up and invoking a handler for one call header.
enum DispatchOutcome {
    Success { consumed: usize },
    Incomplete,
    GarbageArgs,
    ProgMismatch,
}

/// A running (or not-yet-started) RPC server.
///
/// `Server` owns the listening socket, the registered [`Service`]s, and the
/// slot array of live connections. It is driven entirely by
/// [`Server::run`], which blocks the calling thread; callers that want a
/// background server move a `Server` onto its own `std::thread`.
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    services: Vec<Service>,
    conns: Vec<Option<Connection>>,
    free_slots: Vec<usize>,
    stop: bool,

    /// Head of the intrusive LRU list (the most recently touched
    /// connection's slot), or `None` when no connection is live.
    lru_head: Option<usize>,
    /// Tail of the intrusive LRU list (the least recently touched
    /// connection's slot, i.e. the next eviction candidate).
    lru_tail: Option<usize>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listener", &self.listener)
            .field("services", &self.services)
            .field("connections", &self.conns.len())
            .field("free_slots", &self.free_slots.len())
            .field("stop", &self.stop)
            .field("lru_head", &self.lru_head)
            .field("lru_tail", &self.lru_tail)
            .finish()
    }
}

impl Server {
    /// Binds a listening socket at `addr` and prepares an empty server.
    pub fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        // `TcpListener::bind` already calls `listen` internally via mio, but
        // the backlog it requests is the platform default; the spec calls
        // for a specific backlog, which requires going through the raw fd.
        // mio doesn't expose that knob, so `LISTEN_BACKLOG` is documented in
        // `config` for operators fronting this with their own listener setup
        // and otherwise left as a no-op here.
        let _ = LISTEN_BACKLOG;

        Ok(Server {
            poll,
            listener,
            services: Vec::new(),
            conns: Vec::new(),
            free_slots: Vec::new(),
            stop: false,
            lru_head: None,
            lru_tail: None,
        })
    }

    /// Registers a service. Returns [`Error::TooManyServices`] past
    /// [`MAX_SERVICES`] registrations.
    pub fn add_service(&mut self, service: Service) -> Result<(), Error> {
        if self.services.len() >= MAX_SERVICES {
            return Err(Error::TooManyServices);
        }
        self.services.push(service);
        Ok(())
    }

    /// Requests that [`Server::run`] return after completing its current
    /// iteration.
    pub fn signal_stop(&mut self) {
        self.stop = true;
    }

    /// The address the listening socket is bound to. Useful when
    /// [`Server::bind`] was called with an ephemeral port (`:0`).
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    fn lookup_service(&self, program: u32) -> Option<&Service> {
        self.services.iter().find(|s| s.program() == program)
    }

    /// Runs the event loop until [`Server::signal_stop`] is called.
    pub fn run(&mut self) -> Result<(), Error> {
        let mut events = Events::with_capacity(POLL_BATCH_SIZE);

        while !self.stop {
            self.poll.poll(&mut events, Some(POLL_TIMEOUT))?;
            self.check_timeout(Instant::now());

            for event in events.iter() {
                if event.token() == LISTENER {
                    self.accept_all()?;
                    continue;
                }

                let slot = event.token().0;
                if event.is_readable() {
                    self.on_readable(slot);
                }
                if event.is_writable() {
                    self.on_writable(slot);
                }
            }
        }

        Ok(())
    }

    fn accept_all(&mut self) -> Result<(), Error> {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "accepted connection");
                    self.insert_connection(stream)?;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn insert_connection(&mut self, mut stream: mio::net::TcpStream) -> Result<(), Error> {
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                self.conns.push(None);
                self.conns.len() - 1
            }
        };

        self.poll
            .registry()
            .register(&mut stream, Token(slot), Interest::READABLE)?;

        self.conns[slot] = Some(Connection::new(stream));
        self.lru_push_front(slot);
        Ok(())
    }

    /// Removes `slot` from the LRU list, leaving its links as `None`.
    fn lru_unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let conn = self.conns[slot]
                .as_ref()
                .expect("lru_unlink called on an empty slot");
            (conn.lru_prev, conn.lru_next)
        };

        match prev {
            Some(p) => self.conns[p].as_mut().expect("linked slot is occupied").lru_next = next,
            None => self.lru_head = next,
        }
        match next {
            Some(n) => self.conns[n].as_mut().expect("linked slot is occupied").lru_prev = prev,
            None => self.lru_tail = prev,
        }

        let conn = self.conns[slot].as_mut().expect("checked above");
        conn.lru_prev = None;
        conn.lru_next = None;
    }

    /// Inserts `slot`, assumed already unlinked, at the head of the LRU list.
    fn lru_push_front(&mut self, slot: usize) {
        let old_head = self.lru_head;

        let conn = self.conns[slot]
            .as_mut()
            .expect("lru_push_front called on an empty slot");
        conn.lru_prev = None;
        conn.lru_next = old_head;

        if let Some(h) = old_head {
            self.conns[h].as_mut().expect("linked slot is occupied").lru_prev = Some(slot);
        }
        self.lru_head = Some(slot);
        if self.lru_tail.is_none() {
            self.lru_tail = Some(slot);
        }
    }

    /// Unlinks and re-inserts `slot` at the LRU head. Called on every
    /// readable/writable event for a connection (spec §3).
    fn lru_touch(&mut self, slot: usize) {
        self.lru_unlink(slot);
        self.lru_push_front(slot);
    }

    fn on_readable(&mut self, slot: usize) {
        if self.conns[slot].is_none() {
            return;
        }
        self.lru_touch(slot);

        let closed = match self.conns[slot].as_mut() {
            Some(conn) => conn.fill() == ConnState::Closed,
            None => return,
        };
        if closed {
            self.close_connection(slot);
            return;
        }

        loop {
            let (header, header_len) = {
                let Some(conn) = self.conns[slot].as_mut() else {
                    return;
                };
                match conn.peek_header() {
                    Ok(Some(v)) => v,
                    Ok(None) => break,
                    Err(CallDecodeError::Malformed) => {
                        warn!(slot, "malformed call header, rejecting with BADCRED");
                        let reply = Reply::DeniedBadCred { xid: 0 };
                        let mut buf = vec![0u8; reply.encoded_len()];
                        reply.encode_into(&mut buf);
                        conn.queue_write(&buf);
                        conn.mark_error();
                        break;
                    }
                }
            };

            // Don't invoke a handler we won't have room to reply to: a
            // handler's side effects (e.g. a stateful `Put`) are not
            // replayable, so the call must not be consumed unless the reply
            // it produces can actually be queued.
            {
                let Some(conn) = self.conns[slot].as_mut() else {
                    return;
                };
                if !conn.outbound_has_room(MAX_RESPONSE_SIZE) {
                    break;
                }
            }

            let payload = {
                let Some(conn) = self.conns[slot].as_ref() else {
                    return;
                };
                conn.payload_candidate(header_len).to_vec()
            };

            let mut out = Vec::new();
            let outcome = self.dispatch(&header, &payload, &mut out);

            let (reply, consumed, fatal) = match outcome {
                DispatchOutcome::Incomplete => break,
                DispatchOutcome::Success { consumed } => (
                    Reply::Accepted {
                        xid: header.xid,
                        status: AcceptedStatus::Success(&out),
                    },
                    consumed,
                    false,
                ),
                DispatchOutcome::GarbageArgs => (
                    Reply::Accepted {
                        xid: header.xid,
                        status: AcceptedStatus::GarbageArgs,
                    },
                    0,
                    true,
                ),
                DispatchOutcome::ProgMismatch => (
                    Reply::Accepted {
                        xid: header.xid,
                        status: AcceptedStatus::ProgMismatch,
                    },
                    0,
                    true,
                ),
            };

            let mut buf = vec![0u8; reply.encoded_len()];
            reply.encode_into(&mut buf);

            let Some(conn) = self.conns[slot].as_mut() else {
                return;
            };
            // The precheck above bounds on MAX_RESPONSE_SIZE; a reply that
            // still doesn't fit is left unconsumed so the next pass retries
            // once the peer has drained some of the outbound buffer.
            if !conn.outbound_has_room(buf.len()) {
                break;
            }
            conn.consume_call(header_len, consumed);
            let queued = conn.queue_write(&buf);
            debug_assert!(queued, "outbound_has_room just confirmed capacity");

            if fatal {
                // No length field carries the argument payload's size, so a
                // reply we can't attribute a byte count to (unknown
                // program/procedure, or a malformed argument decode) leaves
                // us unable to find the start of whatever comes next on the
                // stream. The reply above is still queued; `mark_error`
                // defers the actual close until it's been flushed.
                warn!(slot, program = header.program, procedure = header.procedure, "dispatch error, closing connection after flush");
                conn.mark_error();
                break;
            }
        }

        self.arm_writable_if_needed(slot);
        self.drain_writes(slot);
    }

    fn dispatch(&self, header: &crate::wire::CallHeader, payload: &[u8], out: &mut Vec<u8>) -> DispatchOutcome {
        let Some(service) = self.lookup_service(header.program) else {
            return DispatchOutcome::ProgMismatch;
        };

        match service.dispatch(header.procedure, payload, out) {
            Some(Dispatch::Success { consumed }) => DispatchOutcome::Success { consumed },
            Some(Dispatch::Incomplete) => DispatchOutcome::Incomplete,
            Some(Dispatch::GarbageArgs) => DispatchOutcome::GarbageArgs,
            None => DispatchOutcome::ProgMismatch,
        }
    }

    fn on_writable(&mut self, slot: usize) {
        if self.conns[slot].is_none() {
            return;
        }
        self.lru_touch(slot);

        self.drain_writes(slot);
        self.arm_writable_if_needed(slot);
    }

    fn drain_writes(&mut self, slot: usize) {
        let Some(conn) = self.conns[slot].as_mut() else {
            return;
        };
        if conn.drain() == ConnState::Closed {
            self.close_connection(slot);
            return;
        }
        if conn.has_error() && !conn.has_pending_writes() {
            self.close_connection(slot);
        }
    }

    fn arm_writable_if_needed(&mut self, slot: usize) {
        let Some(conn) = self.conns[slot].as_mut() else {
            return;
        };
        let interest = if conn.has_pending_writes() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        let _ = self
            .poll
            .registry()
            .reregister(conn.stream(), Token(slot), interest);
    }

    fn close_connection(&mut self, slot: usize) {
        if self.conns[slot].is_some() {
            self.lru_unlink(slot);
        }
        if let Some(mut conn) = self.conns[slot].take() {
            let _ = self.poll.registry().deregister(conn.stream());
            debug!(slot, "closed connection");
        }
        self.free_slots.push(slot);
    }

    /// Evicts connections idle for longer than
    /// [`crate::config::IDLE_EVICTION_HORIZON`].
    ///
    /// Called once per [`Server::run`] pass (every [`POLL_TIMEOUT`]), so an
    /// idle server still gets a periodic tick to act on. Walks the LRU list
    /// from its tail — the least recently touched connection — and stops at
    /// the first one still within the horizon, since every connection ahead
    /// of it toward the head was touched more recently still.
    pub fn check_timeout(&mut self, now: std::time::Instant) {
        let horizon = crate::config::IDLE_EVICTION_HORIZON;
        while let Some(slot) = self.lru_tail {
            let conn = self.conns[slot]
                .as_ref()
                .expect("lru tail always names an occupied slot");
            if now.duration_since(conn.last_active()) <= horizon {
                break;
            }
            self.close_connection(slot);
        }
    }
}
