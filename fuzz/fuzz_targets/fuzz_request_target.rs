//! Fuzz target: request-target parsing
//!
//! Feeds arbitrary bytes through `Request::parse` and the `upd` query
//! helpers, verifying:
//! - No panics on malformed percent-encoding or non-UTF-8 input
//! - Parsed paths never keep the leading slash
//! - Watermarks always come out finite
//!
//! cargo fuzz run fuzz_request_target

#![no_main]

use doorwatch::web::{Request, format_updates, is_valid_callback, parse_watermark};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let target = String::from_utf8_lossy(data);
    let req = Request::parse(&target);
    assert!(!req.path.starts_with('/'));

    let mark = parse_watermark(req.param("lastupdate"));
    assert!(mark.is_finite());

    if let Some(cb) = req.param("callback").filter(|cb| is_valid_callback(cb)) {
        let body = format_updates(mark, &[], Some(cb));
        assert!(body.starts_with(cb));
        assert!(body.ends_with(')'));
    }
});
