//! The pipelined client batcher (`C8`).
//!
//! Calls are queued with [`Client::call`], flushed to the wire in one write
//! with [`Client::flush`], and their results collected in submission order
//! with [`Client::collect`]. Up to [`crate::config::MAX_PIPELINE`] calls may
//! be outstanding (sent but not yet collected) at once; the socket is left
//! in blocking mode for writes and switched to non-blocking only while
//! reading replies back, since a `connect`ed client has nothing useful to do
//! but wait for its own replies.
//!
//! A non-success reply anywhere in a batch fails the whole
//! [`Client::collect`] call rather than just that one slot — there is no
//! partial-batch recovery (see `DESIGN.md`).

use crate::codec::{Decode, DecodeError, Encode};
use crate::config::MAX_PIPELINE;
use crate::error::Error;
use crate::registry::Procedure;
use crate::wire::CallHeader;
use byteorder::{BigEndian, ByteOrder};
use std::any::Any;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use tracing::warn;

const GENERIC_REPLY_HEADER_LEN: usize = 12; // xid + msg_type + reply_stat
const VERIFIER_LEN: usize = 8; // verf_flavor + verf_length
const ACCEPT_STAT_LEN: usize = 4;
const ACCEPTED_HEADER_LEN: usize = GENERIC_REPLY_HEADER_LEN + VERIFIER_LEN + ACCEPT_STAT_LEN;
const REJECTED_HEADER_LEN: usize = GENERIC_REPLY_HEADER_LEN + 8; // reject_stat + auth_stat

/// A call queued by [`Client::call`], awaiting [`Client::flush`] and
/// [`Client::collect`].
struct Pending {
    xid: u32,
    decode: Box<dyn FnOnce(&[u8]) -> Result<(Box<dyn Any>, usize), DecodeError>>,
}

/// A pipelined ONC RPC client.
///
/// `Client` does not implement any particular wire framing beyond what
/// [`crate::wire`] defines; it only sequences calls and matches replies back
/// to callers by submission order, mirroring the bounded
/// request/flush/collect batching the original system exposed.
pub struct Client {
    stream: TcpStream,
    next_xid: u32,
    outbound: Vec<u8>,
    in_flight: VecDeque<Pending>,
    errored: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("stream", &self.stream)
            .field("next_xid", &self.next_xid)
            .field("in_flight", &self.in_flight.len())
            .field("errored", &self.errored)
            .finish()
    }
}

impl Client {
    /// Connects to `addr`.
    pub fn connect(addr: SocketAddr) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Client {
            stream,
            next_xid: 1,
            outbound: Vec::new(),
            in_flight: VecDeque::new(),
            errored: false,
        })
    }

    /// Whether this client has hit a fatal protocol or I/O error. Sticky:
    /// once set, a `Client` never clears it (spec §4.6/§7 — the client
    /// enters a sticky error state rather than trying to recover mid-stream).
    pub fn has_error(&self) -> bool {
        self.errored
    }

    /// Queues a call to `procedure` with `args`, returning `false` if the
    /// in-flight window is already at [`MAX_PIPELINE`] and the call was not
    /// queued.
    pub fn call<Args, Ret>(&mut self, procedure: Procedure<Args, Ret>, args: Args) -> bool
    where
        Args: Encode,
        Ret: Decode + 'static,
    {
        if self.in_flight.len() >= MAX_PIPELINE {
            return false;
        }

        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);

        let header = CallHeader::new(xid, procedure.program(), procedure.procedure());
        let mut buf = vec![0u8; CallHeader::ENCODED_LEN + args.encoded_len()];
        header.encode_into(&mut buf);
        args.encode_into(&mut buf[CallHeader::ENCODED_LEN..]);
        self.outbound.extend_from_slice(&buf);

        self.in_flight.push_back(Pending {
            xid,
            decode: Box::new(|body| {
                let (ret, consumed) = Ret::decode_from(body)?;
                Ok((Box::new(ret) as Box<dyn Any>, consumed))
            }),
        });

        true
    }

    /// Writes every queued call to the socket in one blocking write.
    pub fn flush(&mut self) -> Result<(), Error> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        self.stream.set_nonblocking(false)?;
        self.stream.write_all(&self.outbound)?;
        self.outbound.clear();
        Ok(())
    }

    /// Blocks until every call queued since the last [`Client::collect`] has
    /// a reply, then returns their results in submission order.
    pub fn collect<Ret: 'static>(&mut self) -> Result<Vec<Ret>, Error> {
        self.stream.set_nonblocking(false)?;

        let mut inbuf = Vec::new();
        let mut results = Vec::with_capacity(self.in_flight.len());

        while let Some(pending) = self.in_flight.pop_front() {
            match self.read_one_reply::<Ret>(&mut inbuf, pending) {
                Ok(value) => results.push(value),
                Err(e) => return Err(self.fail(e)),
            }
        }

        if !inbuf.is_empty() {
            return Err(self.fail(Error::TrailingGarbage));
        }

        Ok(results)
    }

    /// Marks the client as sticky-errored, drops every remaining pending
    /// slot (spec §4.6 step 4/5: unfilled slots are abandoned, the batch
    /// counters reset to zero regardless of outcome), and closes the
    /// socket, then hands the triggering error back to the caller.
    fn fail(&mut self, err: Error) -> Error {
        warn!(error = %err, "client protocol failure, entering sticky error state");
        self.errored = true;
        self.in_flight.clear();
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        err
    }

    /// Parses exactly one reply belonging to `pending` out of `inbuf`,
    /// reading more from the socket as needed, and leaves any bytes
    /// belonging to a later reply untouched for the next call.
    fn read_one_reply<Ret: 'static>(
        &mut self,
        inbuf: &mut Vec<u8>,
        pending: Pending,
    ) -> Result<Ret, Error> {
        loop {
            if inbuf.len() < GENERIC_REPLY_HEADER_LEN {
                self.fill_more(inbuf)?;
                continue;
            }
            let xid = BigEndian::read_u32(&inbuf[0..4]);
            let reply_stat = BigEndian::read_u32(&inbuf[8..12]);
            if xid != pending.xid {
                return Err(Error::CallFailed(
                    "reply xid did not match the next pending call",
                ));
            }

            if reply_stat == 1 {
                // MSG_DENIED: reject_stat + auth_stat follow in place of the
                // verifier/accept_stat pair.
                if inbuf.len() < REJECTED_HEADER_LEN {
                    self.fill_more(inbuf)?;
                    continue;
                }
                inbuf.drain(..REJECTED_HEADER_LEN);
                return Err(Error::BadCredentials);
            }
            if reply_stat != 0 {
                inbuf.drain(..GENERIC_REPLY_HEADER_LEN);
                return Err(Error::InvalidReplyStatus(reply_stat));
            }

            if inbuf.len() < ACCEPTED_HEADER_LEN {
                self.fill_more(inbuf)?;
                continue;
            }
            let accept_stat = BigEndian::read_u32(
                &inbuf[GENERIC_REPLY_HEADER_LEN + VERIFIER_LEN..ACCEPTED_HEADER_LEN],
            );

            match accept_stat {
                0 => match (pending.decode)(&inbuf[ACCEPTED_HEADER_LEN..]) {
                    Ok((value, consumed)) => {
                        inbuf.drain(..ACCEPTED_HEADER_LEN + consumed);
                        return Ok(*value.downcast::<Ret>().expect("Ret type matches call site"));
                    }
                    Err(DecodeError::Incomplete) => {
                        self.fill_more(inbuf)?;
                        continue;
                    }
                    Err(DecodeError::Malformed) => {
                        return Err(Error::CallFailed("could not decode return value"));
                    }
                },
                2 => {
                    let total = ACCEPTED_HEADER_LEN + 8; // low, high version bounds
                    if inbuf.len() < total {
                        self.fill_more(inbuf)?;
                        continue;
                    }
                    inbuf.drain(..total);
                    return Err(Error::ProgramMismatch);
                }
                4 => {
                    inbuf.drain(..ACCEPTED_HEADER_LEN);
                    return Err(Error::GarbageArgs);
                }
                other => {
                    inbuf.drain(..ACCEPTED_HEADER_LEN);
                    return Err(Error::InvalidReplyStatus(other));
                }
            }
        }
    }

    fn fill_more(&mut self, inbuf: &mut Vec<u8>) -> Result<(), Error> {
        let mut chunk = [0u8; 256];
        let n = self.stream.read(&mut chunk)?;
        if n == 0 {
            return Err(Error::IncompleteHeader {
                need: GENERIC_REPLY_HEADER_LEN,
                have: inbuf.len(),
            });
        }
        inbuf.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_client() -> Client {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _accept_thread = std::thread::spawn(move || listener.accept());
        Client {
            stream: TcpStream::connect(addr).unwrap(),
            next_xid: 1,
            outbound: Vec::new(),
            in_flight: VecDeque::new(),
            errored: false,
        }
    }

    #[test]
    fn pipeline_cap_is_enforced() {
        let mut client = loopback_client();

        let mut iface = crate::registry::Interface::new(1);
        let proc_: Procedure<u32, u32> = iface.procedure();

        for _ in 0..MAX_PIPELINE {
            assert!(client.call(proc_, 1));
        }
        assert!(!client.call(proc_, 1));
    }

    #[test]
    fn xid_counter_wraps_without_panicking() {
        let mut client = loopback_client();
        client.next_xid = u32::MAX;

        let mut iface = crate::registry::Interface::new(1);
        let proc_: Procedure<u32, u32> = iface.procedure();

        assert!(client.call(proc_, 1));
        assert_eq!(client.next_xid, 0);
    }

    #[test]
    fn fresh_client_has_no_error() {
        let client = loopback_client();
        assert!(!client.has_error());
    }

    #[test]
    fn collect_sets_sticky_error_on_trailing_garbage() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_thread = std::thread::spawn(move || {
            use std::io::Write;
            let (mut sock, _) = listener.accept().unwrap();
            // A bare accepted reply for xid 1 with a zero-length result,
            // followed by one stray trailing byte the batch never asked for.
            let reply = crate::wire::Reply::Accepted {
                xid: 1,
                status: crate::wire::AcceptedStatus::Success(&[]),
            };
            let mut buf = vec![0u8; reply.encoded_len() + 1];
            reply.encode_into(&mut buf).unwrap();
            sock.write_all(&buf).unwrap();
        });

        let mut client = Client::connect(addr).unwrap();
        let mut iface = crate::registry::Interface::new(1);
        let proc_: Procedure<(), ()> = iface.procedure();

        assert!(client.call(proc_, ()));
        client.flush().unwrap();
        let result = client.collect::<()>();

        assert!(result.is_err());
        assert!(client.has_error());
        accept_thread.join().unwrap();
    }
}
