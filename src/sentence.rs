//! Sentence classification for NMEA-0183 lines.
//!
//! A candidate line looks like:
//! ```text
//! $GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47
//! ```
//! The first field carries the `$` marker, a 2-character talker ID and the
//! 3-letter sentence code. Classification never fails: anything that is not
//! a sentence yields `None`, anything unrecognized yields
//! [`SentenceType::Unknown`].

use nom::{
    IResult, Parser,
    bytes::complete::{take, take_while_m_n},
    character::complete::char,
    sequence::preceded,
};
use serde::Serialize;
use std::fmt;

/// The sentence types understood by the field parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentenceType {
    /// Fix data
    Gga,
    /// Recommended minimum GNSS data
    Rmc,
    /// Geographic position
    Gll,
    /// Recommended minimum Loran-C data
    Rma,
    /// DOP and active satellites
    Gsa,
    /// Satellites in view
    Gsv,
    /// True heading
    Hdt,
    /// Date and time
    Zda,
    /// Anything else
    Unknown,
}

impl SentenceType {
    /// Every type with a field parser.
    pub const SUPPORTED: [SentenceType; 8] = [
        SentenceType::Gga,
        SentenceType::Rmc,
        SentenceType::Gll,
        SentenceType::Rma,
        SentenceType::Gsa,
        SentenceType::Gsv,
        SentenceType::Hdt,
        SentenceType::Zda,
    ];

    /// Look up a 3-letter sentence code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "GGA" => SentenceType::Gga,
            "RMC" => SentenceType::Rmc,
            "GLL" => SentenceType::Gll,
            "RMA" => SentenceType::Rma,
            "GSA" => SentenceType::Gsa,
            "GSV" => SentenceType::Gsv,
            "HDT" => SentenceType::Hdt,
            "ZDA" => SentenceType::Zda,
            _ => SentenceType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentenceType::Gga => "GGA",
            SentenceType::Rmc => "RMC",
            SentenceType::Gll => "GLL",
            SentenceType::Rma => "RMA",
            SentenceType::Gsa => "GSA",
            SentenceType::Gsv => "GSV",
            SentenceType::Hdt => "HDT",
            SentenceType::Zda => "ZDA",
            SentenceType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SentenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `$` + talker ID, returning up to 3 characters of sentence code.
fn sentence_code(input: &str) -> IResult<&str, &str> {
    preceded(
        (char('$'), take(2usize)),
        take_while_m_n(0, 3, |_: char| true),
    )
    .parse(input)
}

/// Remove an unvalidated `*hh` checksum suffix from the end of a line.
fn strip_checksum(line: &str) -> &str {
    match line.rsplit_once('*') {
        Some((body, sum)) if sum.chars().all(|c| c.is_ascii_hexdigit()) => body,
        _ => line,
    }
}

/// Classify a candidate line, returning its type and the data fields that
/// follow the type code.
///
/// # Example
///
/// ```
/// use nmea_fix::sentence::{SentenceType, classify};
///
/// let (kind, fields) = classify("$GPHDT,274.07,T").unwrap();
/// assert_eq!(kind, SentenceType::Hdt);
/// assert_eq!(fields, vec!["274.07", "T"]);
/// ```
pub fn classify(line: &str) -> Option<(SentenceType, Vec<String>)> {
    if line.is_empty() {
        return None;
    }

    let line = strip_checksum(line.trim_end_matches(['\r', '\n']));
    let mut fields = line.split(',');

    let first = fields.next()?;
    if !first.starts_with('$') {
        return None;
    }

    let kind = match sentence_code(first) {
        Ok((_, code)) => SentenceType::from_code(code),
        Err(_) => SentenceType::Unknown,
    };

    Some((kind, fields.map(str::to_string).collect()))
}
