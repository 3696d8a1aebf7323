//! Statistics tracking for the decoder.
//!
//! Counts raw bytes, sentences per type, discarded frames, transport
//! failures and acquisition outcomes, plus a distribution of sentence
//! lengths.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::sentence::SentenceType;

/// Thread-safe statistics collector for a decoder session.
#[derive(Debug)]
pub struct DecoderStats {
    /// Total bytes pulled from the byte source
    pub bytes_read: AtomicU64,

    /// Candidate lines that were classified
    pub sentences: AtomicU64,

    /// Lines discarded for lacking a `$` marker or exceeding the length limit
    pub discarded_frames: AtomicU64,

    /// Failed byte reads (timeouts, disconnects, I/O errors)
    pub transport_errors: AtomicU64,

    /// Acquisitions that produced a usable fix
    pub fixes: AtomicU64,

    /// Acquisitions that ended in an error
    pub failed_acquisitions: AtomicU64,

    /// Sentence length in bytes
    length_histogram: RwLock<Histogram<u64>>,

    /// Sentences per type
    sentences_by_type: RwLock<HashMap<SentenceType, u64>>,

    start_time: Instant,
}

impl DecoderStats {
    pub fn new() -> Self {
        Self {
            bytes_read: AtomicU64::new(0),
            sentences: AtomicU64::new(0),
            discarded_frames: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            fixes: AtomicU64::new(0),
            failed_acquisitions: AtomicU64::new(0),
            // NMEA caps sentences at 82 bytes; leave room for oversized vendor lines
            length_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 4096, 2).expect("Failed to create length histogram"),
            ),
            sentences_by_type: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a classified sentence and its raw length.
    pub fn record_sentence(&self, kind: SentenceType, len: usize) {
        self.sentences.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut hist) = self.length_histogram.write() {
            let _ = hist.record((len as u64).clamp(1, 4096));
        }

        if let Ok(mut map) = self.sentences_by_type.write() {
            *map.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn record_discarded_frame(&self) {
        self.discarded_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fix(&self) {
        self.fixes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_acquisition(&self) {
        self.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Sentences decoded per second since the collector was created.
    pub fn sentences_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.sentences.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Generate a summary report.
    pub fn summary(&self) -> StatsSummary {
        let length_percentiles = self
            .length_histogram
            .read()
            .ok()
            .filter(|h| h.len() > 0)
            .map(|h| HistogramPercentiles {
                p50: h.value_at_quantile(0.50),
                p90: h.value_at_quantile(0.90),
                p99: h.value_at_quantile(0.99),
                min: h.min(),
                max: h.max(),
                mean: h.mean(),
            });

        let sentences_by_type = self
            .sentences_by_type
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        StatsSummary {
            elapsed_secs: self.elapsed().as_secs_f64(),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            sentences: self.sentences.load(Ordering::Relaxed),
            discarded_frames: self.discarded_frames.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            fixes: self.fixes.load(Ordering::Relaxed),
            failed_acquisitions: self.failed_acquisitions.load(Ordering::Relaxed),
            sentences_per_second: self.sentences_per_second(),
            length_percentiles,
            sentences_by_type,
        }
    }
}

impl Default for DecoderStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub elapsed_secs: f64,
    pub bytes_read: u64,
    pub sentences: u64,
    pub discarded_frames: u64,
    pub transport_errors: u64,
    pub fixes: u64,
    pub failed_acquisitions: u64,
    pub sentences_per_second: f64,
    pub length_percentiles: Option<HistogramPercentiles>,
    pub sentences_by_type: HashMap<String, u64>,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                  NMEA DECODER STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(f, "Bytes read: {}", self.bytes_read)?;
        writeln!(f, "Sentences: {}", self.sentences)?;
        writeln!(f, "Discarded frames: {}", self.discarded_frames)?;
        writeln!(f, "Transport errors: {}", self.transport_errors)?;
        writeln!(
            f,
            "Fixes: {} (failed acquisitions: {})",
            self.fixes, self.failed_acquisitions
        )?;
        writeln!(f, "Rate: {:.1} sentences/sec", self.sentences_per_second)?;
        writeln!(f)?;

        if let Some(ref p) = self.length_percentiles {
            writeln!(f, "Sentence Length (bytes):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
            writeln!(f)?;
        }

        if !self.sentences_by_type.is_empty() {
            writeln!(f, "Sentences by Type:")?;
            let mut types: Vec<_> = self.sentences_by_type.iter().collect();
            types.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (kind, count) in types {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}
