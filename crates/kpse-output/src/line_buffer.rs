use memchr::memchr;

/// Longest partial line kept before it is force-flushed.
///
/// MetaFont occasionally writes long runs of progress characters without a
/// newline; without a cap those would grow the buffer until the run ends.
pub const MAX_LINE_LEN: usize = 4096;

/// Statistics about the buffer (useful for debugging and monitoring)
#[derive(Debug, Default, Clone)]
pub struct LineStats {
    pub bytes_processed: u64,
    pub lines_emitted: u64,
    pub forced_flushes: u64,
    pub max_line_len_seen: usize,
}

impl LineStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reassembles complete lines from arbitrarily split output chunks.
///
/// Bytes are kept undecoded until a line terminator arrives so that a UTF-8
/// sequence split across two reads decodes correctly. Lines are emitted in
/// exactly the order their terminators were seen. A trailing `\r` (pseudo
/// terminals translate `\n` to `\r\n`) is stripped.
pub struct LineBuffer {
    pending: Vec<u8>,
    max_len: usize,
    stats: LineStats,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_len: max_len.max(1),
            stats: LineStats::default(),
        }
    }

    /// Feed a chunk and collect every line it completes.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        self.feed_with(data, |line| lines.push(line));
        lines
    }

    /// Feed a chunk, handing each completed line to `emit` as soon as it is found.
    pub fn feed_with<F: FnMut(String)>(&mut self, data: &[u8], mut emit: F) {
        self.stats.bytes_processed += data.len() as u64;

        let mut rest = data;
        while let Some(pos) = memchr(b'\n', rest) {
            self.pending.extend_from_slice(&rest[..pos]);
            rest = &rest[pos + 1..];
            emit(self.take_line());
        }
        self.pending.extend_from_slice(rest);

        while self.pending.len() > self.max_len {
            let tail = self.pending.split_off(self.max_len);
            self.stats.forced_flushes += 1;
            emit(self.take_line());
            self.pending = tail;
        }
    }

    /// Flush whatever partial line is left, e.g. once the producer has exited.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    /// Number of buffered bytes still waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &LineStats {
        &self.stats
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn take_line(&mut self) -> String {
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        self.stats.lines_emitted += 1;
        self.stats.max_line_len_seen = self.stats.max_line_len_seen.max(self.pending.len());
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_complete_lines_are_emitted() {
        let mut buf = LineBuffer::new();
        let lines = buf.feed(b"/tex/cmr10.600pk\n/tex/cmbx10.600pk\n");
        assert_eq!(lines, vec!["/tex/cmr10.600pk", "/tex/cmbx10.600pk"]);
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let mut buf = LineBuffer::new();
        assert!(buf.feed(b"/tex/cm").is_empty());
        assert_eq!(buf.pending_len(), 7);
        assert_eq!(buf.feed(b"r10.600pk\nkpathsea"), vec!["/tex/cmr10.600pk"]);
        assert_eq!(buf.finish().as_deref(), Some("kpathsea"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.feed(b"one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.feed(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut buf = LineBuffer::new();
        let text = "Schrift größe\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xc3).unwrap() + 1;
        assert!(buf.feed(&text[..split]).is_empty());
        assert_eq!(buf.feed(&text[split..]), vec!["Schrift größe"]);
    }

    #[test]
    fn test_overlong_line_is_force_flushed() {
        let mut buf = LineBuffer::with_max_len(8);
        let lines = buf.feed(b"....................");
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == 8));
        assert_eq!(buf.pending_len(), 4);
        assert_eq!(buf.stats().forced_flushes, 2);
    }

    #[test]
    fn test_random_chunking_preserves_lines() {
        let text = "kpathsea: Running mktexpk --mfmode ljfour --bdpi 600 --mag 1+0/600 --dpi 600 cmr10\r\n\
                    This is METAFONT, Version 2.71828182\r\n\
                    (/usr/share/texmf/fonts/source/public/cm/cmr10.mf\r\n\
                    /var/lib/texmf/fonts/pk/ljfour/public/cm/cmr10.600pk\r\n";
        let expected = LineBuffer::new().feed(text.as_bytes());
        assert_eq!(expected.len(), 4);

        let mut rng = rand::rng();
        for _ in 0..200 {
            let mut buf = LineBuffer::new();
            let mut got = Vec::new();
            let mut rest = text.as_bytes();
            while !rest.is_empty() {
                let n = rng.random_range(1..=rest.len().min(17));
                got.extend(buf.feed(&rest[..n]));
                rest = &rest[n..];
            }
            assert_eq!(got, expected);
            assert_eq!(buf.finish(), None);
        }
    }

    #[test]
    fn test_stats_track_lines() {
        let mut buf = LineBuffer::new();
        buf.feed(b"abc\nde\n");
        assert_eq!(buf.stats().lines_emitted, 2);
        assert_eq!(buf.stats().bytes_processed, 7);
        assert_eq!(buf.stats().max_line_len_seen, 3);
        let mut stats = buf.stats().clone();
        stats.reset();
        assert_eq!(stats.lines_emitted, 0);
    }
}
