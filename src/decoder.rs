//! Decoder session.
//!
//! A [`Decoder`] owns the frame reader and the single [`FixRecord`] it
//! writes to. Readers on other threads get snapshots, either returned from
//! [`Decoder::acquire`] or published through a `watch` channel.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::acquire::{AcquireError, Acquisition, AcquisitionPolicy, AcquisitionState, Phase};
use crate::fix::FixRecord;
use crate::frame::FrameReader;
use crate::parser::parse_fields;
use crate::sentence::{SentenceType, classify};
use crate::source::{ByteSource, TransportError};
use crate::stats::DecoderStats;

/// Cancellation signal: the session stops once the value turns `true`.
pub type Shutdown = watch::Receiver<bool>;

/// One item of a live decoding loop.
#[derive(Debug)]
pub enum Frame {
    /// A usable fix was acquired.
    Fix(FixRecord),

    /// The acquisition failed; the next one starts from the same record.
    Error(AcquireError),
}

/// Streaming NMEA decoder bound to one byte source.
pub struct Decoder<S> {
    reader: FrameReader<S>,
    fix: FixRecord,
    policy: AcquisitionPolicy,
    stats: Arc<DecoderStats>,
    publisher: Option<watch::Sender<FixRecord>>,
}

impl<S: ByteSource> Decoder<S> {
    pub fn new(source: S) -> Self {
        Self::from_reader(FrameReader::new(source))
    }

    /// Build a decoder around a configured frame reader, sharing its stats.
    pub fn from_reader(reader: FrameReader<S>) -> Self {
        let stats = Arc::clone(reader.stats());
        Self {
            reader,
            fix: FixRecord::new(),
            policy: AcquisitionPolicy::default(),
            stats,
            publisher: None,
        }
    }

    pub fn with_policy(mut self, policy: AcquisitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Publish a snapshot to `publisher` after every successful acquisition.
    pub fn with_publisher(mut self, publisher: watch::Sender<FixRecord>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn fix(&self) -> &FixRecord {
        &self.fix
    }

    pub fn stats(&self) -> &Arc<DecoderStats> {
        &self.stats
    }

    /// Perform one read attempt: frame, classify, parse and merge.
    pub fn read_once(&mut self) -> Result<SentenceType, TransportError> {
        let raw = self.reader.next_sentence()?;

        let Some((kind, fields)) = classify(raw.as_str()) else {
            return Ok(SentenceType::Unknown);
        };

        self.stats.record_sentence(kind, raw.as_str().len());
        trace!("{} sentence: {}", kind, raw);

        let update = parse_fields(kind, &fields);
        self.fix.merge(update, kind);

        Ok(kind)
    }

    /// Read until the policy is satisfied, fails, or `shutdown` fires.
    pub fn acquire(&mut self, shutdown: &Shutdown) -> Acquisition {
        let mut state = AcquisitionState::new(self.policy);

        loop {
            if *shutdown.borrow() {
                debug!("Acquisition cancelled after {} reads", state.reads());
                return Acquisition::Failed(AcquireError::Cancelled);
            }

            let step = match self.read_once() {
                Ok(kind) => state.record_read(kind),
                Err(e) => {
                    self.stats.record_transport_error();
                    warn!("Read failed ({} in a row): {}", state.errors() + 1, e);
                    state.record_failure(e)
                }
            };

            match step {
                Ok(Phase::Satisfied) => {
                    self.stats.record_fix();
                    let snapshot = self.fix.clone();
                    if let Some(publisher) = &self.publisher {
                        publisher.send_replace(snapshot.clone());
                    }
                    return Acquisition::Satisfied(snapshot);
                }
                Ok(_) => continue,
                Err(e) => {
                    self.stats.record_failed_acquisition();
                    return Acquisition::Failed(e);
                }
            }
        }
    }

    /// Iterate over successive acquisitions until cancelled or disconnected.
    pub fn frames(&mut self, shutdown: Shutdown) -> Frames<'_, S> {
        Frames {
            decoder: self,
            shutdown,
            done: false,
        }
    }

    /// Close the byte source.
    pub fn close(mut self) {
        self.reader.close();
    }
}

/// Iterator returned by [`Decoder::frames`].
pub struct Frames<'a, S> {
    decoder: &'a mut Decoder<S>,
    shutdown: Shutdown,
    done: bool,
}

impl<S: ByteSource> Iterator for Frames<'_, S> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.done {
            return None;
        }

        match self.decoder.acquire(&self.shutdown) {
            Acquisition::Satisfied(fix) => Some(Frame::Fix(fix)),
            Acquisition::Failed(AcquireError::Cancelled) => {
                self.done = true;
                None
            }
            Acquisition::Failed(e) => {
                self.done = e.is_disconnect();
                Some(Frame::Error(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FieldName, FieldValue};
    use crate::source::ReaderSource;
    use std::io::Cursor;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\n";
    const GSV: &str = "$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74\n";

    fn decoder(input: String) -> Decoder<ReaderSource<Cursor<Vec<u8>>>> {
        Decoder::new(ReaderSource::new(Cursor::new(input.into_bytes())))
    }

    fn running() -> (watch::Sender<bool>, Shutdown) {
        watch::channel(false)
    }

    #[test]
    fn test_round_trip_gga() {
        let mut dec = decoder(GGA.to_string());

        assert_eq!(dec.read_once().unwrap(), SentenceType::Gga);

        let fix = dec.fix();
        for (name, expected) in [
            (FieldName::Time, "123519"),
            (FieldName::Latitude, "4807.038"),
            (FieldName::LatRef, "N"),
            (FieldName::Longitude, "01131.000"),
            (FieldName::LongRef, "E"),
            (FieldName::Quality, "1"),
            (FieldName::Hdop, "0.9"),
            (FieldName::Altitude, "545.4"),
            (FieldName::AltUnit, "M"),
            (FieldName::HeightGeoid, "46.9"),
            (FieldName::HeightGeoidUnit, "M"),
        ] {
            assert_eq!(fix.text(name), Some(expected), "field {}", name);
        }
        assert_eq!(fix.get(FieldName::NumSat), Some(&FieldValue::Int(8)));
        assert!(fix.get(FieldName::LastDgps).is_none());
        assert!(fix.get(FieldName::Dgps).is_none());
    }

    #[test]
    fn test_truncated_rmc() {
        let mut dec = decoder("$GPRMC,123519,A\n".to_string());

        assert_eq!(dec.read_once().unwrap(), SentenceType::Rmc);
        assert_eq!(dec.fix().text(FieldName::Time), Some("123519"));
        assert_eq!(dec.fix().text(FieldName::Validity), Some("A"));
        assert_eq!(dec.fix().fields().len(), 2);
    }

    #[test]
    fn test_acquire_satisfied() {
        let input = format!("{}{}{}noise\n{}", GGA, RMC, GSV, GSV.repeat(3));
        let mut dec = decoder(input);
        let (_tx, shutdown) = running();

        let fix = dec.acquire(&shutdown).into_result().expect("Should acquire a fix");

        assert!(fix.has_seen(SentenceType::Gga));
        assert!(fix.has_seen(SentenceType::Rmc));
        assert!(fix.date_time().is_some());
        assert_eq!(dec.stats().summary().fixes, 1);
        assert_eq!(dec.stats().summary().discarded_frames, 1);
    }

    #[test]
    fn test_acquire_times_out_without_rmc() {
        let input = GGA.repeat(30);
        let mut dec = decoder(input);
        let (_tx, shutdown) = running();

        match dec.acquire(&shutdown) {
            Acquisition::Failed(AcquireError::DataTimeout { reads }) => assert_eq!(reads, 26),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_acquire_fails_on_exhausted_stream() {
        let mut dec = decoder(GGA.to_string());
        let (_tx, shutdown) = running();

        let err = dec.acquire(&shutdown).into_result().unwrap_err();
        assert!(matches!(err, AcquireError::Transport { attempts: 6, .. }));
        assert!(err.is_disconnect());
        assert_eq!(dec.stats().summary().transport_errors, 6);
    }

    #[test]
    fn test_acquire_honors_cancellation() {
        let mut dec = decoder(GGA.repeat(10));
        let (tx, shutdown) = running();
        tx.send(true).unwrap();

        assert!(matches!(
            dec.acquire(&shutdown),
            Acquisition::Failed(AcquireError::Cancelled)
        ));
        assert_eq!(dec.stats().summary().sentences, 0);
    }

    #[test]
    fn test_frames_yield_fixes_then_end_on_disconnect() {
        let cycle = format!("{}{}{}", GGA, RMC, GSV);
        let mut dec = decoder(cycle.repeat(4));
        let (_tx, shutdown) = running();

        let frames: Vec<Frame> = dec.frames(shutdown).collect();

        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[0], Frame::Fix(_)));
        assert!(matches!(frames[1], Frame::Fix(_)));
        assert!(matches!(&frames[2], Frame::Error(e) if e.is_disconnect()));
    }

    #[test]
    fn test_publisher_receives_snapshot() {
        let cycle = format!("{}{}", GGA, RMC);
        let mut dec = decoder(cycle.repeat(3));
        let (tx, rx) = watch::channel(FixRecord::new());
        dec = dec.with_publisher(tx);
        let (_stop, shutdown) = running();

        dec.acquire(&shutdown).into_result().unwrap();

        assert_eq!(rx.borrow().text(FieldName::Altitude), Some("545.4"));
    }
}
