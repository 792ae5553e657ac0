#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 16384 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        // Fuzz parse_ql; should not panic
        if let Ok(stmt) = appgrid::query::parse_ql(s) {
            let _ = appgrid::query::parse_predicate(&stmt.predicate.to_string());
        }
    }
});
