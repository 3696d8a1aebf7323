//! Field parsers for the supported NMEA-0183 sentence types.
//!
//! Each parser consumes the data fields of one sentence (type code already
//! stripped) and produces a [`FieldUpdate`]. Fields are consumed with a
//! "shift or yield absent" discipline: a short sentence simply produces a
//! smaller update, and empty fields are never recorded.
//!
//! # Layouts
//!
//! ```text
//! GGA  time,latitude,lat_ref,longitude,long_ref,quality,num_sat,hdop,altitude,
//!      alt_unit,height_geoid,height_geoid_unit,last_dgps,dgps
//! RMC  time,validity,latitude,lat_ref,longitude,long_ref,speed,course,date,
//!      variation,var_direction
//! GLL  latitude,lat_ref,longitude,long_ref,time
//! RMA  -,latitude,lat_ref,longitude,long_ref,-,-,speed,course,variation,var_direction
//! GSA  mode,mode_dimension,id x12,pdop,hdop,vdop
//! GSV  msg_count,msg_num,num_sat,(id,elevation,azimuth,snr) x4
//! HDT  heading
//! ZDA  time,day,month,year,local_hour_offset,local_minute_offset
//! ```

use nom::{
    IResult, Parser,
    character::complete::{digit1, one_of},
    combinator::{map_res, opt, recognize},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::sentence::SentenceType;

/// Number of satellite id slots in a GSA sentence.
pub const GSA_SLOTS: usize = 12;

/// Number of satellites described by one GSV message.
pub const GSV_SLOTS_PER_MESSAGE: usize = 4;

/// Number of GSV messages tracked per talker cycle.
pub const GSV_MAX_MESSAGES: usize = 4;

/// The closed set of semantic field names produced by the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Time,
    Date,
    Latitude,
    LatRef,
    Longitude,
    LongRef,
    Quality,
    NumSat,
    Hdop,
    Altitude,
    AltUnit,
    HeightGeoid,
    HeightGeoidUnit,
    LastDgps,
    Dgps,
    Validity,
    Speed,
    Course,
    Variation,
    VarDirection,
    Mode,
    ModeDimension,
    Pdop,
    Vdop,
    MsgCount,
    MsgNum,
    Heading,
    Day,
    Month,
    Year,
    LocalHourOffset,
    LocalMinuteOffset,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Time => "time",
            FieldName::Date => "date",
            FieldName::Latitude => "latitude",
            FieldName::LatRef => "lat_ref",
            FieldName::Longitude => "longitude",
            FieldName::LongRef => "long_ref",
            FieldName::Quality => "quality",
            FieldName::NumSat => "num_sat",
            FieldName::Hdop => "hdop",
            FieldName::Altitude => "altitude",
            FieldName::AltUnit => "alt_unit",
            FieldName::HeightGeoid => "height_geoid",
            FieldName::HeightGeoidUnit => "height_geoid_unit",
            FieldName::LastDgps => "last_dgps",
            FieldName::Dgps => "dgps",
            FieldName::Validity => "validity",
            FieldName::Speed => "speed",
            FieldName::Course => "course",
            FieldName::Variation => "variation",
            FieldName::VarDirection => "var_direction",
            FieldName::Mode => "mode",
            FieldName::ModeDimension => "mode_dimension",
            FieldName::Pdop => "pdop",
            FieldName::Vdop => "vdop",
            FieldName::MsgCount => "msg_count",
            FieldName::MsgNum => "msg_num",
            FieldName::Heading => "heading",
            FieldName::Day => "day",
            FieldName::Month => "month",
            FieldName::Year => "year",
            FieldName::LocalHourOffset => "local_hour_offset",
            FieldName::LocalMinuteOffset => "local_minute_offset",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Change to a satellite slot id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotId {
    Set(String),
    /// GSA reported the slot as empty.
    Clear,
}

/// Positional update to one satellite slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotUpdate {
    pub index: usize,
    pub id: Option<SlotId>,
    pub elevation: Option<String>,
    pub azimuth: Option<String>,
    pub snr: Option<String>,
}

impl SlotUpdate {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.elevation.is_none()
            && self.azimuth.is_none()
            && self.snr.is_none()
    }
}

/// The typed output of one field parser invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    pub fields: BTreeMap<FieldName, FieldValue>,
    pub slots: Vec<SlotUpdate>,
}

impl FieldUpdate {
    /// Record a text field unless it is absent or empty.
    fn text(&mut self, name: FieldName, value: Option<&str>) {
        if let Some(v) = non_empty(value) {
            self.fields.insert(name, FieldValue::Text(v.to_string()));
        }
    }

    /// Record an integer field unless it is absent or empty.
    fn int(&mut self, name: FieldName, value: Option<&str>) {
        if let Some(v) = non_empty(value) {
            self.fields.insert(name, FieldValue::Int(lenient_int(v)));
        }
    }

    /// Record a run of consecutive text fields.
    fn texts(&mut self, cursor: &mut FieldCursor<'_>, names: &[FieldName]) {
        for name in names {
            self.text(*name, cursor.shift());
        }
    }

    fn slot(&mut self, slot: SlotUpdate) {
        if !slot.is_empty() {
            self.slots.push(slot);
        }
    }

    pub fn get(&self, name: FieldName) -> Option<&FieldValue> {
        self.fields.get(&name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.slots.is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Sequential access to a sentence's fields that yields `None` once exhausted.
struct FieldCursor<'a> {
    fields: std::slice::Iter<'a, String>,
}

impl<'a> FieldCursor<'a> {
    fn new(fields: &'a [String]) -> Self {
        Self {
            fields: fields.iter(),
        }
    }

    fn shift(&mut self) -> Option<&'a str> {
        self.fields.next().map(String::as_str)
    }

    fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.fields.next();
        }
    }
}

/// Parse an optionally signed run of leading digits.
fn leading_int(input: &str) -> IResult<&str, i64> {
    map_res(recognize((opt(one_of("+-")), digit1)), |s: &str| {
        s.parse::<i64>()
    })
    .parse(input)
}

/// Convert text to an integer, tolerating trailing garbage.
///
/// Text without a numeric prefix (or one that overflows) converts to 0.
pub fn lenient_int(text: &str) -> i64 {
    leading_int(text.trim_start())
        .map(|(_, n)| n)
        .unwrap_or(0)
}

/// Run the field parser for `kind` over the data fields of a sentence.
///
/// # Example
///
/// ```
/// use nmea_fix::parser::{FieldName, FieldValue, parse_fields};
/// use nmea_fix::sentence::classify;
///
/// let (kind, fields) = classify("$GPGLL,4916.45,N,12311.12,W,225444,A").unwrap();
/// let update = parse_fields(kind, &fields);
/// assert_eq!(
///     update.get(FieldName::Time),
///     Some(&FieldValue::Text("225444".to_string()))
/// );
/// ```
pub fn parse_fields(kind: SentenceType, fields: &[String]) -> FieldUpdate {
    let mut cursor = FieldCursor::new(fields);

    match kind {
        SentenceType::Gga => parse_gga(&mut cursor),
        SentenceType::Rmc => parse_rmc(&mut cursor),
        SentenceType::Gll => parse_gll(&mut cursor),
        SentenceType::Rma => parse_rma(&mut cursor),
        SentenceType::Gsa => parse_gsa(&mut cursor),
        SentenceType::Gsv => parse_gsv(&mut cursor),
        SentenceType::Hdt => parse_hdt(&mut cursor),
        SentenceType::Zda => parse_zda(&mut cursor),
        SentenceType::Unknown => FieldUpdate::default(),
    }
}

fn parse_gga(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    use FieldName::*;

    let mut update = FieldUpdate::default();
    update.texts(cursor, &[Time, Latitude, LatRef, Longitude, LongRef, Quality]);
    update.int(NumSat, cursor.shift());
    update.texts(
        cursor,
        &[
            Hdop,
            Altitude,
            AltUnit,
            HeightGeoid,
            HeightGeoidUnit,
            LastDgps,
            Dgps,
        ],
    );
    update
}

fn parse_rmc(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    use FieldName::*;

    let mut update = FieldUpdate::default();
    update.texts(
        cursor,
        &[
            Time,
            Validity,
            Latitude,
            LatRef,
            Longitude,
            LongRef,
            Speed,
            Course,
            Date,
            Variation,
            VarDirection,
        ],
    );
    update
}

fn parse_gll(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    use FieldName::*;

    let mut update = FieldUpdate::default();
    update.texts(cursor, &[Latitude, LatRef, Longitude, LongRef, Time]);
    update
}

fn parse_rma(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    use FieldName::*;

    let mut update = FieldUpdate::default();
    // status
    cursor.skip(1);
    update.texts(cursor, &[Latitude, LatRef, Longitude, LongRef]);
    // time differences A and B
    cursor.skip(2);
    update.texts(cursor, &[Speed, Course, Variation, VarDirection]);
    update
}

fn parse_gsa(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    use FieldName::*;

    let mut update = FieldUpdate::default();
    update.texts(cursor, &[Mode, ModeDimension]);

    for index in 0..GSA_SLOTS {
        let id = match cursor.shift() {
            None => None,
            Some("") => Some(SlotId::Clear),
            Some(id) => Some(SlotId::Set(id.to_string())),
        };
        update.slot(SlotUpdate {
            index,
            id,
            ..Default::default()
        });
    }

    update.texts(cursor, &[Pdop, Hdop, Vdop]);
    update
}

fn parse_gsv(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    use FieldName::*;

    let mut update = FieldUpdate::default();
    update.text(MsgCount, cursor.shift());

    let msg_num = cursor.shift();
    update.text(MsgNum, msg_num);
    update.int(NumSat, cursor.shift());

    let number = non_empty(msg_num).map(lenient_int).unwrap_or(0);
    if !(1..=GSV_MAX_MESSAGES as i64).contains(&number) {
        debug!("GSV message number {:?} out of range, ignoring satellites", msg_num);
        return update;
    }
    let base = (number as usize - 1) * GSV_SLOTS_PER_MESSAGE;

    for offset in 0..GSV_SLOTS_PER_MESSAGE {
        // The satellite id is not correlated with GSA slots.
        cursor.skip(1);
        update.slot(SlotUpdate {
            index: base + offset,
            id: None,
            elevation: non_empty(cursor.shift()).map(str::to_string),
            azimuth: non_empty(cursor.shift()).map(str::to_string),
            snr: non_empty(cursor.shift()).map(str::to_string),
        });
    }

    update
}

fn parse_hdt(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    let mut update = FieldUpdate::default();
    update.text(FieldName::Heading, cursor.shift());
    update
}

fn parse_zda(cursor: &mut FieldCursor<'_>) -> FieldUpdate {
    use FieldName::*;

    let mut update = FieldUpdate::default();
    update.text(Time, cursor.shift());

    let day = non_empty(cursor.shift());
    let month = non_empty(cursor.shift());
    let year = non_empty(cursor.shift());
    update.text(Day, day);
    update.text(Month, month);
    update.text(Year, year);

    if let (Some(day), Some(month), Some(year)) = (day, month, year) {
        let date = format!("{}{}{}", day, month, two_digit_year(year));
        update.text(Date, Some(date.as_str()));
    }

    update.texts(cursor, &[LocalHourOffset, LocalMinuteOffset]);
    update
}

/// Reduce a year to its last two characters ("2024" -> "24").
fn two_digit_year(year: &str) -> &str {
    let cut = year
        .char_indices()
        .rev()
        .nth(1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &year[cut..]
}
