//! Service registry and procedure binding (`C4`/`C5`).
//!
//! The original system identified a remote procedure by a bound C++ member
//! function pointer, captured at registration time. That representation has
//! no safe Rust equivalent (a member function pointer plus its `this`
//! adjustment is not `Copy`-safe across unrelated vtables), so this runtime
//! replaces it with a typed, zero-sized descriptor instead: [`Procedure`]
//! carries nothing but the two wire ids and a `PhantomData` tag for its
//! argument and return types.
//!
//! The contract is unchanged from the original: a client and a server only
//! agree on what procedure id `3` means because both sides register their
//! procedures in the same order. [`Interface`] exists to make that ordering
//! explicit rather than implicit — both sides call
//! [`Interface::procedure`] the same number of times, in the same order, and
//! get back [`Procedure`] descriptors that are guaranteed to agree as long
//! as they do.

use crate::codec::{Decode, Encode};
use crate::config::MAX_PROCEDURES_PER_SERVICE;
use crate::error::Error;
use std::marker::PhantomData;

/// A typed, zero-sized handle identifying one remote procedure.
///
/// `Args` and `Ret` are phantom: they exist so that [`crate::client::Client::call`]
/// can require the caller to supply arguments of the right shape and get
/// back a result of the right shape, without the descriptor itself owning
/// any data.
pub struct Procedure<Args, Ret> {
    program: u32,
    procedure: u32,
    _marker: PhantomData<fn(Args) -> Ret>,
}

// Manual impls: `#[derive(Clone, Copy)]` would require `Args: Clone` and
// `Ret: Copy`, which is wrong for a marker-only type.

impl<Args, Ret> Clone for Procedure<Args, Ret> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Args, Ret> Copy for Procedure<Args, Ret> {}

impl<Args, Ret> std::fmt::Debug for Procedure<Args, Ret> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("program", &self.program)
            .field("procedure", &self.procedure)
            .finish()
    }
}

impl<Args, Ret> Procedure<Args, Ret> {
    /// The registered service id this procedure belongs to.
    pub fn program(&self) -> u32 {
        self.program
    }

    /// This procedure's id within its program.
    pub fn procedure(&self) -> u32 {
        self.procedure
    }
}

/// Builds a sequence of [`Procedure`] descriptors for one program id.
///
/// Construct one `Interface` per program, on both the client and the
/// server, and call [`Interface::procedure`] once per RPC in the same
/// order on each side.
#[derive(Debug)]
pub struct Interface {
    program: u32,
    next_procedure: u32,
}

impl Interface {
    /// Starts a new interface for the given program id.
    pub fn new(program: u32) -> Self {
        Interface {
            program,
            next_procedure: 0,
        }
    }

    /// Registers the next procedure in sequence, returning its descriptor.
    pub fn procedure<Args, Ret>(&mut self) -> Procedure<Args, Ret> {
        let procedure = self.next_procedure;
        self.next_procedure += 1;
        Procedure {
            program: self.program,
            procedure,
            _marker: PhantomData,
        }
    }
}

/// The outcome of dispatching one request payload to a bound handler.
///
/// There is no argument-length field on the wire, so a handler only learns
/// where its payload ends by successfully decoding it. [`Dispatch::Incomplete`]
/// lets the caller distinguish "wait for more bytes" from
/// [`Dispatch::GarbageArgs`], a genuine decode failure the connection cannot
/// recover framing from (the original spec forgoes record-marking, so
/// nothing downstream can be resynchronised).
#[derive(Debug)]
pub enum Dispatch {
    /// The handler ran and `out` holds its encoded return value;
    /// `consumed` is the number of payload bytes the argument tuple used.
    Success {
        /// Bytes consumed from the payload by the argument decode.
        consumed: usize,
    },
    /// Not enough bytes have arrived yet to decode the argument tuple.
    Incomplete,
    /// The payload's bytes do not decode into the handler's expected
    /// argument tuple; the connection cannot be resynchronised past this
    /// point and must be closed after the reply is sent.
    GarbageArgs,
}

type BoxedHandler = Box<dyn Fn(&[u8], &mut Vec<u8>) -> Dispatch + Send>;

/// A server-side binding of handler closures to one program id.
///
/// Procedure ids are assigned implicitly by call order: the first
/// [`Service::bind`] call becomes procedure `0`, the second becomes
/// procedure `1`, and so on. This must match the order in which the
/// corresponding client-side [`Interface::procedure`] calls were made.
pub struct Service {
    program: u32,
    handlers: Vec<BoxedHandler>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("program", &self.program)
            .field("procedures", &self.handlers.len())
            .finish()
    }
}

impl Service {
    /// Starts a new, empty service for the given program id.
    pub fn new(program: u32) -> Self {
        Service {
            program,
            handlers: Vec::new(),
        }
    }

    /// This service's program id.
    pub fn program(&self) -> u32 {
        self.program
    }

    /// Binds the next procedure (in registration order) to `handler`.
    ///
    /// Returns [`Error::TooManyProcedures`] once
    /// [`MAX_PROCEDURES_PER_SERVICE`] bound handlers are already registered.
    pub fn bind<Args, Ret, F>(&mut self, handler: F) -> Result<(), Error>
    where
        Args: Decode,
        Ret: Encode,
        F: Fn(Args) -> Ret + Send + 'static,
    {
        if self.handlers.len() >= MAX_PROCEDURES_PER_SERVICE {
            return Err(Error::TooManyProcedures);
        }

        self.handlers.push(Box::new(move |payload, out| {
            let (args, consumed) = match Args::decode_from(payload) {
                Ok(v) => v,
                Err(crate::codec::DecodeError::Incomplete) => return Dispatch::Incomplete,
                Err(crate::codec::DecodeError::Malformed) => return Dispatch::GarbageArgs,
            };
            let ret = handler(args);
            out.resize(ret.encoded_len(), 0);
            // `out` was just resized to exactly `encoded_len()`, so this
            // cannot fail for undersized capacity.
            ret.encode_into(out);
            Dispatch::Success { consumed }
        }));

        Ok(())
    }

    /// Invokes the handler bound at `procedure`, decoding `payload` as its
    /// argument tuple and appending the encoded result to `out`.
    ///
    /// Returns `None` if no handler is bound at that id; the caller treats
    /// this identically to an unknown `program` (`ACCEPT_PROG_MISMATCH`).
    pub fn dispatch(&self, procedure: u32, payload: &[u8], out: &mut Vec<u8>) -> Option<Dispatch> {
        let handler = self.handlers.get(procedure as usize)?;
        Some(handler(payload, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_assigns_sequential_ids() {
        let mut iface = Interface::new(7);
        let a: Procedure<u32, u32> = iface.procedure();
        let b: Procedure<(u32, u32), bool> = iface.procedure();

        assert_eq!(a.program(), 7);
        assert_eq!(a.procedure(), 0);
        assert_eq!(b.program(), 7);
        assert_eq!(b.procedure(), 1);
    }

    #[test]
    fn service_dispatches_by_registration_order() {
        let mut svc = Service::new(7);
        svc.bind::<u32, u32, _>(|x: u32| x * 2).unwrap();
        svc.bind::<(u32, u32), u32, _>(|(a, b): (u32, u32)| a + b)
            .unwrap();

        let mut payload = vec![0u8; 4];
        Encode::encode_into(&21u32, &mut payload).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            svc.dispatch(0, &payload, &mut out),
            Some(Dispatch::Success { consumed: 4 })
        ));
        let (got, _) = u32::decode_from(&out).unwrap();
        assert_eq!(got, 42);
    }

    #[test]
    fn unknown_procedure_returns_none() {
        let svc = Service::new(7);
        let mut out = Vec::new();
        assert!(svc.dispatch(0, &[], &mut out).is_none());
    }

    #[test]
    fn incomplete_args_are_reported_distinctly() {
        let mut svc = Service::new(7);
        svc.bind::<u32, u32, _>(|x: u32| x).unwrap();

        let mut out = Vec::new();
        // Empty payload: not enough bytes for a u32 yet.
        assert!(matches!(
            svc.dispatch(0, &[], &mut out),
            Some(Dispatch::Incomplete)
        ));
    }

    #[test]
    fn garbage_args_reported_without_panicking() {
        let mut svc = Service::new(7);
        svc.bind::<String, String, _>(|s: String| s).unwrap();

        let mut out = Vec::new();
        // Length byte claims 1 payload byte, which is an invalid UTF-8
        // continuation byte on its own.
        let payload = [1u8, 0x80];
        assert!(matches!(
            svc.dispatch(0, &payload, &mut out),
            Some(Dispatch::GarbageArgs)
        ));
    }

    #[test]
    fn too_many_procedures_is_rejected() {
        let mut svc = Service::new(1);
        for _ in 0..MAX_PROCEDURES_PER_SERVICE {
            svc.bind::<u32, u32, _>(|x: u32| x).unwrap();
        }
        assert!(matches!(
            svc.bind::<u32, u32, _>(|x: u32| x),
            Err(Error::TooManyProcedures)
        ));
    }
}
