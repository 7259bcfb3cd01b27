#![no_main]

use libfuzzer_sys::fuzz_target;

use shark::parser;

fuzz_target!(|data: &[u8]| {
    // We don't care about the result - we're looking for panics/crashes
    let _ = parser::read_archive(data.to_vec());
});
