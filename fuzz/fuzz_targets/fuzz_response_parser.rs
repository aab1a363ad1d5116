#![no_main]

use libfuzzer_sys::fuzz_target;
use xrequests::ResponseParser;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    // Errors are expected; panics and hangs are not.
    let mut reader = data;
    let _ = ResponseParser::default().read_response(&mut reader, true);

    let mut reader = data;
    let _ = ResponseParser::new(7, 512, false).read_response(&mut reader, false);
});
