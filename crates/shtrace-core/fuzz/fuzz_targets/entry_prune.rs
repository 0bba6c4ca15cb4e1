#![no_main]
use libfuzzer_sys::fuzz_target;
use shtrace_core::{TraceConverter, TransactionId};
use std::collections::HashSet;

// First byte picks how many of the decoded ids to request; the rest is the entry.
fuzz_target!(|data: &[u8]| {
    let Some((&pick, entry)) = data.split_first() else {
        return;
    };
    let Ok(traces) = TraceConverter::unpack(entry) else {
        return;
    };
    let mut ids: HashSet<TransactionId> = traces
        .iter()
        .map(|t| t.as_v0().id)
        .take(usize::from(pick))
        .collect();

    let mut buf = entry.to_vec();
    let before = buf.len();
    if let Ok(Some(range)) = TraceConverter::prune_traces(&mut buf, &mut ids) {
        assert!(range.end <= before);
        assert_eq!(buf[..range.start], entry[..range.start]);
        assert!(TraceConverter::unpack(&buf).is_ok());
    }
    assert_eq!(buf.len(), before);
});
