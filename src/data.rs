use std::{
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};

/// Date layouts recognised in text cells when building date fragments.
pub const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m/%d", "%m/%d/%Y", "%m-%d-%Y"];

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A single spreadsheet cell value.
///
/// Equality and hashing are type-sensitive: `Number(5.0)` never equals
/// `String("5")`, which is what lookup matching relies on.
#[derive(Debug, Clone, Default)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            CellValue::Boolean(true) => "True".to_string(),
            CellValue::Boolean(false) => "False".to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    fn number_bits(value: f64) -> u64 {
        // -0.0 and 0.0 must hash alike since they compare equal.
        if value == 0.0 { 0 } else { value.to_bits() }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Empty, CellValue::Empty) => true,
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Number(a), CellValue::Number(b)) => {
                CellValue::number_bits(*a) == CellValue::number_bits(*b)
            }
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a == b,
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Empty => {}
            CellValue::String(s) => s.hash(state),
            CellValue::Number(f) => CellValue::number_bits(*f).hash(state),
            CellValue::Boolean(b) => b.hash(state),
            CellValue::DateTime(dt) => dt.hash(state),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::DateTime(value.and_time(chrono::NaiveTime::MIN))
    }
}

/// Parses text in one of [`DATE_FORMATS`], optionally followed by `HH:MM:SS`.
pub fn parse_date_text(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some(parsed);
        }
        let with_time = format!("{fmt} %H:%M:%S");
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, &with_time) {
            return Some(parsed.date());
        }
    }
    None
}

pub fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    const ISO_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    for fmt in ISO_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN)
}

/// Converts a workbook date serial (with fractional time) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    excel_epoch().checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

pub fn datetime_to_excel_serial(value: &NaiveDateTime) -> f64 {
    (*value - excel_epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Maps a numeric date serial to a calendar date as `1900-01-01 + (trunc(serial) - 2)` days.
///
/// Serials below 61 land one day earlier than a spreadsheet would show them
/// (the fictitious 1900-02-29 is not accounted for). Codes already issued were
/// built with this mapping, so it is kept as is.
pub fn legacy_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let offset = (serial.trunc() as i64).checked_sub(2)?;
    let date = NaiveDate::from_ymd_opt(1900, 1, 1)?.checked_add_signed(TimeDelta::try_days(offset)?)?;
    (1..=9999).contains(&date.year()).then_some(date)
}
