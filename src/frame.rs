//! Frame reader: splits a byte stream into candidate sentence lines.
//!
//! Bytes are accumulated until a line feed. A completed line is a candidate
//! only if, after leading whitespace, it starts with `$`; anything else is a
//! garbled fragment and is dropped without surfacing an error.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::source::{ByteSource, TransportError};
use crate::stats::DecoderStats;

/// Default limit on a buffered line before it is treated as garbage.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// A candidate sentence line, `$` marker retained, line feed removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSentence(String);

impl RawSentence {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RawSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.trim_end())
    }
}

/// Reasons a buffered line is dropped.
#[derive(Debug)]
enum FrameError {
    MissingMarker(String),
    Overlong(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MissingMarker(line) => write!(f, "no leading '$' in {:?}", line),
            FrameError::Overlong(len) => write!(f, "line exceeds {} bytes", len),
        }
    }
}

/// Pulls candidate sentences out of a [`ByteSource`].
pub struct FrameReader<S> {
    source: S,
    buf: Vec<u8>,
    max_line_len: usize,
    /// Dropping the rest of an overlong line up to its line feed.
    skipping: bool,
    stats: Arc<DecoderStats>,
}

impl<S: ByteSource> FrameReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_stats(source, Arc::new(DecoderStats::new()))
    }

    pub fn with_stats(source: S, stats: Arc<DecoderStats>) -> Self {
        Self {
            source,
            buf: Vec::with_capacity(128),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            skipping: false,
            stats,
        }
    }

    /// Set the length beyond which a buffered line is discarded.
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len.max(1);
        self
    }

    pub fn stats(&self) -> &Arc<DecoderStats> {
        &self.stats
    }

    /// Block until the next candidate line is complete.
    ///
    /// Fails only when the byte source does. A partial line buffered at that
    /// point is dropped, so the next call starts from a clean buffer.
    pub fn next_sentence(&mut self) -> Result<RawSentence, TransportError> {
        loop {
            let byte = match self.source.read_byte() {
                Ok(byte) => byte,
                Err(e) => {
                    self.buf.clear();
                    self.skipping = false;
                    return Err(e);
                }
            };
            self.stats.record_bytes(1);

            if byte != b'\n' {
                if self.skipping {
                    continue;
                }
                if self.buf.len() >= self.max_line_len {
                    self.discard(FrameError::Overlong(self.max_line_len));
                    self.skipping = true;
                    continue;
                }
                self.buf.push(byte);
                continue;
            }

            if self.skipping {
                self.skipping = false;
                continue;
            }

            let line = String::from_utf8_lossy(&self.buf).trim_start().to_string();
            self.buf.clear();

            if line.starts_with('$') {
                return Ok(RawSentence(line));
            }

            self.discard(FrameError::MissingMarker(line));
        }
    }

    fn discard(&mut self, reason: FrameError) {
        debug!("Discarding frame: {}", reason);
        self.buf.clear();
        self.stats.record_discarded_frame();
    }

    /// Close the underlying byte source.
    pub fn close(&mut self) {
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ReaderSource;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    fn reader(input: &str) -> FrameReader<ReaderSource<Cursor<Vec<u8>>>> {
        FrameReader::new(ReaderSource::new(Cursor::new(input.as_bytes().to_vec())))
    }

    #[test]
    fn test_splits_on_line_feed() {
        let mut frames = reader("$GPHDT,1,T\r\n$GPHDT,2,T\n");

        assert_eq!(frames.next_sentence().unwrap().as_str(), "$GPHDT,1,T\r");
        assert_eq!(frames.next_sentence().unwrap().as_str(), "$GPHDT,2,T");
        assert!(frames.next_sentence().unwrap_err().is_disconnect());
    }

    #[test]
    fn test_discards_garbled_lines() {
        let mut frames = reader("PGGA,12,3\n\n  $GPGGA,1\n");

        assert_eq!(frames.next_sentence().unwrap().as_str(), "$GPGGA,1");
        assert_eq!(frames.stats().discarded_frames.load(Ordering::Relaxed), 2);
    }

    /// Replays a fixed sequence of bytes and failures.
    struct Scripted(VecDeque<Result<u8, TransportError>>);

    impl Scripted {
        fn new(parts: Vec<Result<&str, TransportError>>) -> Self {
            let mut script = VecDeque::new();
            for part in parts {
                match part {
                    Ok(text) => script.extend(text.bytes().map(Ok)),
                    Err(e) => script.push_back(Err(e)),
                }
            }
            Self(script)
        }
    }

    impl ByteSource for Scripted {
        fn read_byte(&mut self) -> Result<u8, TransportError> {
            self.0.pop_front().unwrap_or(Err(TransportError::Closed))
        }

        fn close(&mut self) {
            self.0.clear();
        }
    }

    #[test]
    fn test_timeout_drops_partial_line() {
        let source = Scripted::new(vec![
            Ok("$GPGGA,1235"),
            Err(TransportError::Timeout),
            Ok("$GPRMC,123519,A\n"),
        ]);
        let mut frames = FrameReader::new(source);

        assert!(matches!(frames.next_sentence(), Err(TransportError::Timeout)));
        assert_eq!(frames.next_sentence().unwrap().as_str(), "$GPRMC,123519,A");
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut frames = reader("$GPGGA,0123456789\n$GPHDT,1\n").with_max_line_len(10);

        assert_eq!(frames.next_sentence().unwrap().as_str(), "$GPHDT,1");
        assert_eq!(frames.stats().discarded_frames.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_overlong_line_tail_is_not_a_candidate() {
        let mut frames = reader("XXXXXXXXXX$GPHDT,9\n$GPHDT,2\n").with_max_line_len(10);

        assert_eq!(frames.next_sentence().unwrap().as_str(), "$GPHDT,2");
        assert_eq!(frames.stats().discarded_frames.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_counts_bytes() {
        let mut frames = reader("$GPHDT,1\n");
        frames.next_sentence().unwrap();

        assert_eq!(frames.stats().bytes_read.load(Ordering::Relaxed), 9);
    }
}
