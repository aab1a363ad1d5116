#![no_main]

use libfuzzer_sys::fuzz_target;
use xrequests::ChunkedDecoder;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    // Feed in uneven slices so state survives across calls.
    let mut decoder = ChunkedDecoder::new();
    for piece in data.chunks(3) {
        match decoder.feed(piece) {
            Ok(_) if decoder.is_done() => break,
            Ok(_) => {}
            Err(_) => return,
        }
    }
    let _ = decoder.finish();
});
