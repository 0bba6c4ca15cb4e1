#![no_main]
use libfuzzer_sys::fuzz_target;
use shtrace_core::TraceConverter;

fuzz_target!(|data: &[u8]| {
    let _ = TraceConverter::unpack(data);
});
