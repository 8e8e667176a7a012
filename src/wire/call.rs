use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

const MSG_TYPE_CALL: u32 = 0;
const RPC_VERSION: u32 = 2;

/// Outcome of attempting to parse a [`CallHeader`] from a buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum CallDecodeError {
    /// The buffer does not yet contain a full 40-byte header.
    Incomplete,
    /// The header was complete but failed validation: the message type
    /// wasn't `CALL`, the RPC version wasn't `2`, or the credentials/verifier
    /// were not the null-auth flavor with zero length.
    ///
    /// Per spec §4.2 the server responds to this with `MSG_DENIED` /
    /// `AUTH_ERROR` / `BADCRED` and the malformed request is consumed
    /// wholesale rather than resynchronised by scanning.
    Malformed,
}

/// The fixed 40-byte call header (`call_body`, RFC 5531 §9), restricted to
/// the null-auth flavor only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallHeader {
    /// The client-assigned exchange id for this call.
    pub xid: u32,
    /// The registered service `instance_id` (`program` in the RFC).
    pub program: u32,
    /// The program version. This runtime only ever uses `0`.
    pub program_version: u32,
    /// The procedure id within `program`.
    pub procedure: u32,
}

impl CallHeader {
    /// The on-wire size of a call header, in bytes.
    pub const ENCODED_LEN: usize = 40;

    /// Constructs a new call header addressed at `(program, procedure)`.
    pub fn new(xid: u32, program: u32, procedure: u32) -> Self {
        CallHeader {
            xid,
            program,
            program_version: 0,
            procedure,
        }
    }

    /// Parses a `CallHeader` from the front of `buf`.
    pub fn decode_from(buf: &[u8]) -> Result<(Self, usize), CallDecodeError> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(CallDecodeError::Incomplete);
        }

        let mut r = Cursor::new(&buf[..Self::ENCODED_LEN]);
        // Cursor reads over a fixed-size, in-memory slice; the only error
        // `ReadBytesExt` can return here is UnexpectedEof, which the length
        // check above already rules out.
        let xid = r.read_u32::<BigEndian>().unwrap();
        let msg_type = r.read_u32::<BigEndian>().unwrap();
        let rpc_version = r.read_u32::<BigEndian>().unwrap();
        let program = r.read_u32::<BigEndian>().unwrap();
        let program_version = r.read_u32::<BigEndian>().unwrap();
        let procedure = r.read_u32::<BigEndian>().unwrap();
        let cred_flavor = r.read_u32::<BigEndian>().unwrap();
        let cred_length = r.read_u32::<BigEndian>().unwrap();
        let verf_flavor = r.read_u32::<BigEndian>().unwrap();
        let verf_length = r.read_u32::<BigEndian>().unwrap();

        if msg_type != MSG_TYPE_CALL || rpc_version != RPC_VERSION {
            return Err(CallDecodeError::Malformed);
        }
        if cred_flavor != 0 || cred_length != 0 || verf_flavor != 0 || verf_length != 0 {
            return Err(CallDecodeError::Malformed);
        }

        Ok((
            CallHeader {
                xid,
                program,
                program_version,
                procedure,
            },
            Self::ENCODED_LEN,
        ))
    }

    /// Serialises this header into `buf`, returning the number of bytes
    /// written, or `None` if `buf` is smaller than [`CallHeader::ENCODED_LEN`].
    pub fn encode_into(&self, buf: &mut [u8]) -> Option<usize> {
        if buf.len() < Self::ENCODED_LEN {
            return None;
        }
        let mut w = &mut buf[..Self::ENCODED_LEN];
        use byteorder::WriteBytesExt;
        w.write_u32::<BigEndian>(self.xid).ok()?;
        w.write_u32::<BigEndian>(MSG_TYPE_CALL).ok()?;
        w.write_u32::<BigEndian>(RPC_VERSION).ok()?;
        w.write_u32::<BigEndian>(self.program).ok()?;
        w.write_u32::<BigEndian>(self.program_version).ok()?;
        w.write_u32::<BigEndian>(self.procedure).ok()?;
        w.write_u32::<BigEndian>(0).ok()?; // cred_flavor = AUTH_NULL
        w.write_u32::<BigEndian>(0).ok()?; // cred_length
        w.write_u32::<BigEndian>(0).ok()?; // verf_flavor = AUTH_NULL
        w.write_u32::<BigEndian>(0).ok()?; // verf_length
        Some(Self::ENCODED_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn round_trip() {
        let h = CallHeader::new(7, 100, 3);
        let mut buf = [0u8; CallHeader::ENCODED_LEN];
        assert_eq!(h.encode_into(&mut buf), Some(CallHeader::ENCODED_LEN));

        let (got, n) = CallHeader::decode_from(&buf).unwrap();
        assert_eq!(n, CallHeader::ENCODED_LEN);
        assert_eq!(got, h);
    }

    #[test]
    fn incomplete_header_is_not_malformed() {
        let h = CallHeader::new(7, 100, 3);
        let mut buf = [0u8; CallHeader::ENCODED_LEN];
        h.encode_into(&mut buf).unwrap();

        assert_eq!(
            CallHeader::decode_from(&buf[..CallHeader::ENCODED_LEN - 1]),
            Err(CallDecodeError::Incomplete)
        );
    }

    #[test]
    fn non_null_auth_is_malformed() {
        #[rustfmt::skip]
        let raw: [u8; CallHeader::ENCODED_LEN] = hex!(
            "00000001" // xid
            "00000000" // msg_type = CALL
            "00000002" // rpc_version = 2
            "00000064" // program = 100
            "00000000" // program_version
            "00000003" // procedure
            "00000001" // cred_flavor = AUTH_UNIX (non-null!)
            "00000000" // cred_length
            "00000000" // verf_flavor
            "00000000" // verf_length
        );
        assert_eq!(
            CallHeader::decode_from(&raw),
            Err(CallDecodeError::Malformed)
        );
    }

    #[test]
    fn wrong_rpc_version_is_malformed() {
        #[rustfmt::skip]
        let raw: [u8; CallHeader::ENCODED_LEN] = hex!(
            "00000001" "00000000" "00000003" "00000064" "00000000" "00000003"
            "00000000" "00000000" "00000000" "00000000"
        );
        assert_eq!(
            CallHeader::decode_from(&raw),
            Err(CallDecodeError::Malformed)
        );
    }
}
