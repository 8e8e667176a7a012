#![no_main]

use libfuzzer_sys::fuzz_target;
use rpcd::registry::Service;

// Dispatch has no length-prefixed framing to fall back on; a malformed or
// truncated payload must be reported through `Dispatch`, never a panic.
fuzz_target!(|data: &[u8]| {
    let mut svc = Service::new(1);
    // Clamped so a decoded-but-adversarial `n` can't drive `String::repeat`
    // into an allocator abort; the no-panic claim above is about the decode
    // path, not about a handler free to allocate without bound.
    svc.bind::<(u32, String), String, _>(|(n, s)| s.repeat(n.min(64) as usize))
        .unwrap();

    let mut out = Vec::new();
    let _ = svc.dispatch(0, data, &mut out);
});
