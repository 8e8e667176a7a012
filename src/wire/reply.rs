use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

const MSG_TYPE_REPLY: u32 = 1;

const REPLY_ACCEPTED: u32 = 0;
const REPLY_DENIED: u32 = 1;

const ACCEPT_SUCCESS: u32 = 0;
const ACCEPT_PROG_MISMATCH: u32 = 2;
const ACCEPT_GARBAGE_ARGS: u32 = 4;

const REJECT_AUTH_ERROR: u32 = 1;
const AUTH_ERROR_BADCRED: u32 = 2;

/// The status carried by an `MSG_ACCEPTED` reply (spec §4.2, restricted to
/// the three outcomes this runtime produces).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptedStatus<'a> {
    /// The call was dispatched and the handler's encoded return value
    /// follows the header verbatim.
    Success(&'a [u8]),
    /// No service was registered for the requested `(program, procedure)`.
    ProgMismatch,
    /// The handler could not decode the argument tuple out of the payload.
    GarbageArgs,
}

/// A reply header this runtime is able to produce.
///
/// Only the null-auth, `AUTH_ERROR`/`BADCRED` rejection path is modelled —
/// this runtime never emits `RPC_MISMATCH` (it advertises exactly one RPC
/// version) and never emits any rejection status but `BADCRED`, since it
/// never issues a verifier of its own to mismatch against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    /// `MSG_ACCEPTED`, with a zero-length null-auth verifier.
    Accepted {
        /// Echoes the `xid` of the call this is a reply to.
        xid: u32,
        /// The accept status and (on success) the encoded result.
        status: AcceptedStatus<'a>,
    },
    /// `MSG_DENIED` / `AUTH_ERROR` / `BADCRED`.
    DeniedBadCred {
        /// Echoes the `xid` of the call this is a reply to.
        xid: u32,
    },
}

impl<'a> Reply<'a> {
    /// The number of bytes [`Reply::encode_into`] will write.
    pub fn encoded_len(&self) -> usize {
        match self {
            // generic header (12) + verifier (8) + accept_stat (4)
            Reply::Accepted {
                status: AcceptedStatus::Success(body),
                ..
            } => 12 + 8 + 4 + body.len(),
            Reply::Accepted {
                status: AcceptedStatus::ProgMismatch,
                ..
            } => 12 + 8 + 4 + 8, // + low/high version bounds
            Reply::Accepted {
                status: AcceptedStatus::GarbageArgs,
                ..
            } => 12 + 8 + 4,
            // generic header (12) + reject_stat (4) + auth_stat (4)
            Reply::DeniedBadCred { .. } => 12 + 4 + 4,
        }
    }

    /// Serialises this reply into `buf`, returning the number of bytes
    /// written, or `None` if `buf` is smaller than [`Reply::encoded_len`].
    pub fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
        let len = self.encoded_len();
        if buf.len() < len {
            return None;
        }
        let mut w = &mut buf[..len];

        match self {
            Reply::Accepted { xid, status } => {
                w.write_u32::<BigEndian>(*xid).ok()?;
                w.write_u32::<BigEndian>(MSG_TYPE_REPLY).ok()?;
                w.write_u32::<BigEndian>(REPLY_ACCEPTED).ok()?;
                w.write_u32::<BigEndian>(0).ok()?; // verf_flavor = AUTH_NULL
                w.write_u32::<BigEndian>(0).ok()?; // verf_length
                match status {
                    AcceptedStatus::Success(body) => {
                        w.write_u32::<BigEndian>(ACCEPT_SUCCESS).ok()?;
                        w.write_all(body).ok()?;
                    }
                    AcceptedStatus::ProgMismatch => {
                        w.write_u32::<BigEndian>(ACCEPT_PROG_MISMATCH).ok()?;
                        w.write_u32::<BigEndian>(0).ok()?; // low
                        w.write_u32::<BigEndian>(0).ok()?; // high
                    }
                    AcceptedStatus::GarbageArgs => {
                        w.write_u32::<BigEndian>(ACCEPT_GARBAGE_ARGS).ok()?;
                    }
                }
            }
            Reply::DeniedBadCred { xid } => {
                w.write_u32::<BigEndian>(*xid).ok()?;
                w.write_u32::<BigEndian>(MSG_TYPE_REPLY).ok()?;
                w.write_u32::<BigEndian>(REPLY_DENIED).ok()?;
                w.write_u32::<BigEndian>(REJECT_AUTH_ERROR).ok()?;
                w.write_u32::<BigEndian>(AUTH_ERROR_BADCRED).ok()?;
            }
        }

        Some(len)
    }
}
