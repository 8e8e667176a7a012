#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::todo,
    clippy::unimplemented,
    clippy::use_self,
    clippy::doc_markdown,
    clippy::print_stdout,
    missing_debug_implementations,
    unused_crate_dependencies,
    unreachable_pub,
    missing_docs
)]

//! See the crate-level README above for scope; module docs below cover each
//! component's design in more depth.

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod server;
pub mod wire;

pub use error::Error;

// Unused crate lint workaround for dev dependencies that are only exercised
// by the `benches` and `demos` targets, not by `cargo test` on the library
// itself.
#[cfg(test)]
use criterion as _;
#[cfg(test)]
use tracing_subscriber as _;
