#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let codec = appgrid::query::CursorCodec::new("fuzz");
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = codec.decode(s);
    }
    // hex of arbitrary bytes reaches the payload checks
    let _ = codec.decode(&hex::encode(data));
});
