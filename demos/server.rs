//! Runs the demo service set on `127.0.0.1:9000` until killed.

#[path = "common.rs"]
mod common;

use rpcd::server::Server;

fn main() -> Result<(), rpcd::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let addr = "127.0.0.1:9000".parse().expect("valid socket address");
    let mut server = Server::bind(addr)?;
    server.add_service(common::build_service())?;

    tracing::info!(%addr, "demo server listening");
    server.run()
}
