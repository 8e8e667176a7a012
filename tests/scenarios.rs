//! End-to-end scenarios against a real loopback server, reproducing the six
//! worked examples from the original system's own test suite.

#[path = "../demos/common.rs"]
mod common;

use rpcd::client::Client;
use rpcd::server::Server;
use std::net::SocketAddr;
use std::thread;

/// Starts a demo server on an ephemeral port and returns its address. The
/// server thread is intentionally left detached: it lives for the rest of
/// the test binary's process.
fn spawn_server() -> SocketAddr {
    let mut server = Server::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    server.add_service(common::build_service()).unwrap();
    let addr = server.local_addr().unwrap();

    thread::spawn(move || {
        let _ = server.run();
    });

    addr
}

fn connect(addr: SocketAddr) -> Client {
    // The listener is already bound and polling by the time `spawn_server`
    // returns; `connect` may still race the first `accept`, so retry a few
    // times rather than flake under load.
    for _ in 0..50 {
        if let Ok(client) = Client::connect(addr) {
            return client;
        }
        thread::sleep(std::time::Duration::from_millis(10));
    }
    panic!("could not connect to demo server at {addr}");
}

#[test]
fn hash_service_matches_worked_example() {
    let addr = spawn_server();
    let mut client = connect(addr);
    let procs = common::procedures();

    client.call(procs.do_hash, 1998);
    client.flush().unwrap();
    let results: Vec<u32> = client.collect().unwrap();

    assert_eq!(results, vec![1_425_526_035]);
}

#[test]
fn pipeline_saturates_at_eight_in_flight() {
    let addr = spawn_server();
    let mut client = connect(addr);
    let procs = common::procedures();

    let mut accepted = 0;
    for _ in 0..9 {
        if client.call(procs.do_hash, 1998) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 8, "the 9th call must be rejected by the pipeline cap");

    client.flush().unwrap();
    let results: Vec<u32> = client.collect().unwrap();
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|&r| r == 1_425_526_035));
}

#[test]
fn string_echo_concatenates_ten_times() {
    let addr = spawn_server();
    let mut client = connect(addr);
    let procs = common::procedures();

    client.call(procs.repeat, ("WIN".to_owned(), 10));
    client.flush().unwrap();
    let results: Vec<String> = client.collect().unwrap();

    let want = "WIN".repeat(10);
    assert_eq!(want.len(), 30);
    assert_eq!(results, vec![want]);
}

#[test]
fn guess_matches_magic_value_only() {
    let addr = spawn_server();
    let mut client = connect(addr);
    let procs = common::procedures();

    client.call(procs.guess, 0xc0defefe);
    client.call(procs.guess, 1998);
    client.flush().unwrap();
    let results: Vec<String> = client.collect().unwrap();

    assert_eq!(results, vec!["WIN".to_owned(), String::new()]);
}

#[test]
fn sign_preservation_matches_worked_example() {
    let addr = spawn_server();
    let mut client = connect(addr);
    let procs = common::procedures();

    client.call(procs.test_sign, (-1, 0xFFFF_FFFF));
    client.flush().unwrap();
    let results: Vec<u64> = client.collect().unwrap();

    assert_eq!(results, vec![0xFFFF_FFFF_7FFF_FFFF]);
}

#[test]
fn kv_round_trip() {
    let addr = spawn_server();
    let mut client = connect(addr);
    let procs = common::procedures();

    client.call(procs.get, "K".to_owned());
    client.flush().unwrap();
    let before: Vec<String> = client.collect().unwrap();
    assert_eq!(before, vec![String::new()]);

    client.call(procs.put, ("K".to_owned(), "Wall".to_owned()));
    client.flush().unwrap();
    let _: Vec<()> = client.collect().unwrap();

    client.call(procs.get, "K".to_owned());
    client.flush().unwrap();
    let after: Vec<String> = client.collect().unwrap();
    assert_eq!(after, vec!["Wall".to_owned()]);

    client.call(procs.get, "Nothing".to_owned());
    client.flush().unwrap();
    let missing: Vec<String> = client.collect().unwrap();
    assert_eq!(missing, vec![String::new()]);
}

#[test]
fn initialize_then_check_initialized() {
    let addr = spawn_server();
    let mut client = connect(addr);
    let procs = common::procedures();

    client.call(procs.initialize, ());
    client.flush().unwrap();
    let _: Vec<()> = client.collect().unwrap();

    client.call(procs.check_initialized, ());
    client.flush().unwrap();
    let results: Vec<bool> = client.collect().unwrap();

    assert_eq!(results, vec![true]);
}
