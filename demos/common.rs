//! Shared service definitions for the `demo-server`/`demo-client` pair,
//! reproducing the worked examples the original system's own test suite
//! exercised end to end.

use rpcd::registry::{Interface, Procedure, Service};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// The single program id every demo procedure is registered under.
pub const PROGRAM: u32 = 1;

/// Client-side descriptors for every demo procedure, in the same order the
/// server binds its handlers in [`build_service`].
pub struct Procedures {
    pub do_hash: Procedure<u32, u32>,
    pub guess: Procedure<u32, String>,
    pub repeat: Procedure<(String, u32), String>,
    pub test_sign: Procedure<(i32, u32), u64>,
    pub put: Procedure<(String, String), ()>,
    pub get: Procedure<String, String>,
    pub initialize: Procedure<(), ()>,
    pub check_initialized: Procedure<(), bool>,
}

/// Builds the client-side descriptors. Must be called in the same order as
/// [`build_service`] binds its handlers.
pub fn procedures() -> Procedures {
    let mut iface = Interface::new(PROGRAM);
    Procedures {
        do_hash: iface.procedure(),
        guess: iface.procedure(),
        repeat: iface.procedure(),
        test_sign: iface.procedure(),
        put: iface.procedure(),
        get: iface.procedure(),
        initialize: iface.procedure(),
        check_initialized: iface.procedure(),
    }
}

/// `DoHash(x) = (x * 2654435761) mod 2147483647`.
pub fn do_hash(x: u32) -> u32 {
    ((x as u64) * 2_654_435_761 % 2_147_483_647) as u32
}

/// `Guess(x) = "WIN"` for the one magic value, empty otherwise.
pub fn guess(x: u32) -> String {
    if x == 0xc0defefe {
        "WIN".to_owned()
    } else {
        String::new()
    }
}

/// `TestSign(a, b) = ((a >> 1) << 32) | (b >> 1)`, preserving `a`'s sign
/// through the arithmetic right shift before the result is reinterpreted as
/// an unsigned 64-bit value.
pub fn test_sign(a: i32, b: u32) -> u64 {
    (((a >> 1) as i64) << 32) as u64 | (b >> 1) as u64
}

/// Builds the server-side service, binding handlers in registration order:
/// `DoHash`, `Guess`, `Repeat`, `TestSign`, `Put`, `Get`, `Initialize`,
/// `CheckInitialized`.
pub fn build_service() -> Service {
    let mut svc = Service::new(PROGRAM);
    let store: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
    let initialized = Arc::new(AtomicBool::new(false));

    svc.bind::<u32, u32, _>(do_hash).unwrap();

    svc.bind::<u32, String, _>(guess).unwrap();

    svc.bind::<(String, u32), String, _>(|(s, n): (String, u32)| s.repeat(n as usize))
        .unwrap();

    svc.bind::<(i32, u32), u64, _>(|(a, b): (i32, u32)| test_sign(a, b))
        .unwrap();

    let put_store = Arc::clone(&store);
    svc.bind::<(String, String), (), _>(move |(k, v): (String, String)| {
        put_store.lock().unwrap().insert(k, v);
    })
    .unwrap();

    let get_store = Arc::clone(&store);
    svc.bind::<String, String, _>(move |k: String| {
        get_store
            .lock()
            .unwrap()
            .get(&k)
            .cloned()
            .unwrap_or_default()
    })
    .unwrap();

    let init_flag = Arc::clone(&initialized);
    svc.bind::<(), (), _>(move |(): ()| init_flag.store(true, Ordering::SeqCst))
        .unwrap();

    let check_flag = Arc::clone(&initialized);
    svc.bind::<(), bool, _>(move |(): ()| check_flag.load(Ordering::SeqCst))
        .unwrap();

    svc
}
