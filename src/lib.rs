//! NMEA Fix - a streaming NMEA-0183 decoder for serial GPS receivers.
//!
//! This crate provides:
//! - A frame reader that splits a noisy byte stream into `$`-marked lines
//! - A sentence classifier and per-type field parsers (GGA, RMC, GLL, RMA,
//!   GSA, GSV, HDT, ZDA)
//! - A fix accumulator that merges successive sentences into one record
//! - An acquisition policy deciding when the accumulated fix is usable
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use nmea_fix::{Decoder, FieldName, ReaderSource, SentenceType};
//!
//! let input = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n";
//! let mut decoder = Decoder::new(ReaderSource::new(Cursor::new(input)));
//!
//! assert_eq!(decoder.read_once().unwrap(), SentenceType::Gga);
//! assert_eq!(decoder.fix().text(FieldName::Altitude), Some("545.4"));
//! ```

pub mod acquire;
pub mod config;
pub mod decoder;
pub mod fix;
pub mod frame;
pub mod metrics;
pub mod parser;
pub mod sentence;
pub mod source;
pub mod stats;

pub use acquire::{AcquireError, Acquisition, AcquisitionPolicy, AcquisitionState, Phase};
pub use config::Config;
pub use decoder::{Decoder, Frame, Frames, Shutdown};
pub use fix::{DateFormatError, FixRecord, SatelliteSlot};
pub use frame::{FrameReader, RawSentence};
pub use parser::{FieldName, FieldUpdate, FieldValue, parse_fields};
pub use sentence::{SentenceType, classify};
pub use source::{ByteSource, ReaderSource, TransportError, open_serial};
pub use stats::{DecoderStats, StatsSummary};
