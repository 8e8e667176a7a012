#![no_main]

use libfuzzer_sys::fuzz_target;
use rpcd::wire::CallHeader;

fuzz_target!(|data: &[u8]| {
    if let Ok((header, consumed)) = CallHeader::decode_from(data) {
        let mut buf = vec![0u8; CallHeader::ENCODED_LEN];
        header.encode_into(&mut buf).expect("should be able to serialise");
        let (got, n) = CallHeader::decode_from(&buf).expect("must be valid");
        assert_eq!(header, got);
        assert_eq!(consumed, n);
    }
});
