//! Fuzzing target for line reassembly and classification

#![no_main]
use libfuzzer_sys::fuzz_target;

use kpse_output::{LineBuffer, OutputLine, MAX_LINE_LEN};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the chunk size so splits vary between runs
    let chunk = (data[0] as usize % 64) + 1;
    let data = &data[1..data.len().min(20000)];

    let mut whole = LineBuffer::new();
    let expected = whole.feed(data);

    let mut split = LineBuffer::new();
    let mut got = Vec::new();
    for piece in data.chunks(chunk) {
        split.feed_with(piece, |line| {
            let _ = OutputLine::parse(&line);
            got.push(line);
        });
        assert!(split.pending_len() <= MAX_LINE_LEN, "partial line exceeded cap");
    }

    assert_eq!(whole.finish(), split.finish());
    // Forced flushes may cut at different points, so only compare when none happened
    if whole.stats().forced_flushes == 0 && split.stats().forced_flushes == 0 {
        assert_eq!(expected, got);
    }
});
