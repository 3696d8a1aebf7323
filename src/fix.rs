//! The fix accumulator.
//!
//! A [`FixRecord`] holds the superset of every field ever reported during a
//! decoder session. Updates overwrite per field name; satellite slots merge
//! positionally. Nothing is ever cleared, so a field keeps its last reported
//! value even after its sentence type stops arriving.

use chrono::{DateTime, NaiveDate, Utc};
use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_while_m_n},
    character::complete::char,
    combinator::{all_consuming, map_res},
    sequence::{separated_pair, terminated},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::parser::{FieldName, FieldUpdate, FieldValue, SlotId, SlotUpdate};
use crate::sentence::SentenceType;

/// Errors composing a timestamp from the `date` and `time` fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateFormatError {
    #[error("date/time {0:?} does not match DDMMYY HHMMSS UTC")]
    Layout(String),

    #[error("date/time {0:?} is out of range")]
    OutOfRange(String),
}

/// One satellite slot, addressed by position.
///
/// GSA fills `id`, GSV fills the rest. The two are not guaranteed to describe
/// the same physical satellite at a given index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SatelliteSlot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azimuth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr: Option<String>,
}

impl SatelliteSlot {
    fn apply(&mut self, update: SlotUpdate) {
        match update.id {
            Some(SlotId::Set(id)) => self.id = Some(id),
            Some(SlotId::Clear) => self.id = None,
            None => {}
        }
        if update.elevation.is_some() {
            self.elevation = update.elevation;
        }
        if update.azimuth.is_some() {
            self.azimuth = update.azimuth;
        }
        if update.snr.is_some() {
            self.snr = update.snr;
        }
    }
}

/// Accumulated state of every sentence seen by a decoder session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixRecord {
    #[serde(flatten)]
    fields: BTreeMap<FieldName, FieldValue>,
    satellites: Vec<SatelliteSlot>,
    last_sentence_type: Option<SentenceType>,
    seen_types: BTreeSet<SentenceType>,
}

impl FixRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the output of one field parser.
    pub fn merge(&mut self, update: FieldUpdate, kind: SentenceType) {
        if kind == SentenceType::Unknown {
            return;
        }

        self.fields.extend(update.fields);

        for slot in update.slots {
            if self.satellites.len() <= slot.index {
                self.satellites.resize_with(slot.index + 1, SatelliteSlot::default);
            }
            self.satellites[slot.index].apply(slot);
        }

        self.seen_types.insert(kind);
        self.last_sentence_type = Some(kind);
    }

    pub fn get(&self, name: FieldName) -> Option<&FieldValue> {
        self.fields.get(&name)
    }

    pub fn text(&self, name: FieldName) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn int(&self, name: FieldName) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    pub fn fields(&self) -> &BTreeMap<FieldName, FieldValue> {
        &self.fields
    }

    pub fn satellites(&self) -> &[SatelliteSlot] {
        &self.satellites
    }

    pub fn last_sentence_type(&self) -> Option<SentenceType> {
        self.last_sentence_type
    }

    pub fn seen_types(&self) -> &BTreeSet<SentenceType> {
        &self.seen_types
    }

    pub fn has_seen(&self, kind: SentenceType) -> bool {
        self.seen_types.contains(&kind)
    }

    /// Compose a UTC timestamp from the `date` and `time` fields.
    ///
    /// Returns `Ok(None)` if either field is missing.
    pub fn try_date_time(&self) -> Result<Option<DateTime<Utc>>, DateFormatError> {
        let (Some(date), Some(time)) = (self.text(FieldName::Date), self.text(FieldName::Time))
        else {
            return Ok(None);
        };

        parse_date_time(date, time).map(Some)
    }

    /// Like [`FixRecord::try_date_time`], degrading malformed values to `None`.
    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        self.try_date_time().unwrap_or_else(|e| {
            debug!("Ignoring fix timestamp: {}", e);
            None
        })
    }
}

/// Drop a fractional-seconds suffix ("123519.00" -> "123519").
fn strip_fraction(time: &str) -> &str {
    match time.rsplit_once('.') {
        Some((whole, frac)) if !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()) => {
            whole
        }
        _ => time,
    }
}

fn two_digits(input: &str) -> IResult<&str, u32> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u32>(),
    )
    .parse(input)
}

type Triple = (u32, u32, u32);

/// Parse `DDMMYY HHMMSS UTC`.
fn stamp(input: &str) -> IResult<&str, (Triple, Triple)> {
    all_consuming(terminated(
        separated_pair(
            (two_digits, two_digits, two_digits),
            char(' '),
            (two_digits, two_digits, two_digits),
        ),
        tag(" UTC"),
    ))
    .parse(input)
}

/// Expand a two-digit year: 00-79 is 20xx, 80-99 is 19xx.
pub fn expand_year(yy: u32) -> i32 {
    if yy < 80 {
        2000 + yy as i32
    } else {
        1900 + yy as i32
    }
}

/// Compose and parse a `DDMMYY` date and `HHMMSS[.sss]` time as UTC.
pub fn parse_date_time(date: &str, time: &str) -> Result<DateTime<Utc>, DateFormatError> {
    let composed = format!("{} {} UTC", date, strip_fraction(time));

    let ((day, month, yy), (hour, minute, second)) = match stamp(&composed) {
        Ok((_, parts)) => parts,
        Err(_) => return Err(DateFormatError::Layout(composed)),
    };

    // A leap second is carried as 59 plus a full second of fraction.
    NaiveDate::from_ymd_opt(expand_year(yy), month, day)
        .and_then(|d| match second {
            60 => d.and_hms_milli_opt(hour, minute, 59, 1000),
            _ => d.and_hms_opt(hour, minute, second),
        })
        .map(|dt| dt.and_utc())
        .ok_or(DateFormatError::OutOfRange(composed))
}

fn field_or_dash(fix: &FixRecord, name: FieldName) -> String {
    fix.get(name)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for FixRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FieldName::*;

        match self.date_time() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S UTC"))?,
            None => write!(f, "{:<23}", "no time")?,
        }

        write!(
            f,
            "  {} {} {} {}  alt {} {}  sats {}  q {}  hdop {}  spd {}  crs {}  hdg {}",
            field_or_dash(self, Latitude),
            field_or_dash(self, LatRef),
            field_or_dash(self, Longitude),
            field_or_dash(self, LongRef),
            field_or_dash(self, Altitude),
            field_or_dash(self, AltUnit),
            field_or_dash(self, NumSat),
            field_or_dash(self, Quality),
            field_or_dash(self, Hdop),
            field_or_dash(self, Speed),
            field_or_dash(self, Course),
            field_or_dash(self, Heading),
        )?;

        let seen: Vec<&str> = self.seen_types.iter().map(|t| t.as_str()).collect();
        write!(f, "  [{}]", seen.join(" "))
    }
}
