//! Wire framing (`C3`): the fixed-shape call header and the handful of reply
//! header variants this runtime supports (null-auth only, §4.2).
//!
//! Unlike the payload codec in [`crate::codec`], these header types are not
//! generic over an arbitrary `T` — they have one fixed shape each, so they
//! expose `serialise_into`/`serialised_len`/`from_cursor`-style methods
//! directly rather than going through a trait.

mod call;
mod reply;

pub use call::{CallDecodeError, CallHeader};
pub use reply::{AcceptedStatus, Reply};
