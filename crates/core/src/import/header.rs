//! Weather file tokenizing, format detection, and row parsing.
//!
//! Files are header-labelled: the first recognizable header line names the
//! columns, which may appear in any order. Tokens are separated by commas,
//! semicolons, spaces, tabs, or quotes; column names match a fixed
//! case-insensitive alias set.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rustc_hash::FxHashMap;

use crate::error::StreamError;

/// Date formats tried in order when the caller does not pin one.
pub(crate) const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
];

fn is_delimiter(c: char) -> bool {
    matches!(c, ',' | ' ' | ';' | '\t' | '"' | '\'' | '\r' | '\n')
}

/// Split a line into tokens, stripping quotes and empty fields.
pub(crate) fn tokenize(line: &str) -> Vec<String> {
    line.split(is_delimiter)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Recognized weather file layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileFormat {
    Daily,
    Hourly,
}

/// What a candidate header line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderMatch {
    Format(FileFormat),
    /// A station-export layout this pipeline does not ingest.
    Unsupported,
    /// Not a header; keep scanning.
    Unknown,
}

pub(crate) fn classify_header(header: &[String]) -> HeaderMatch {
    let Some(first) = header.first() else {
        return HeaderMatch::Unknown;
    };
    if first.eq_ignore_ascii_case("daily") {
        return HeaderMatch::Format(FileFormat::Daily);
    }
    if first.eq_ignore_ascii_case("hourly") {
        return HeaderMatch::Format(FileFormat::Hourly);
    }
    if first.eq_ignore_ascii_case("date") {
        let hourly = header[1..]
            .iter()
            .any(|h| h.eq_ignore_ascii_case("hour") || h.eq_ignore_ascii_case("Time(CST)"));
        return HeaderMatch::Format(if hourly {
            FileFormat::Hourly
        } else {
            FileFormat::Daily
        });
    }
    if first == "Name" || first == "StationID" || first == "weather_date" {
        return HeaderMatch::Unsupported;
    }
    HeaderMatch::Unknown
}

/// Semantic columns of a daily-summary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DailyField {
    MinTemp,
    MaxTemp,
    Rh,
    Wd,
    MinWs,
    MaxWs,
    MinWg,
    MaxWg,
    Precip,
}

/// Semantic columns of an hourly file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum HourlyField {
    Hour,
    Temp,
    Rh,
    Wd,
    Ws,
    Wg,
    Precip,
    Ffmc,
    Dmc,
    Dc,
    Bui,
    Isi,
    Fwi,
}

fn daily_alias_map() -> FxHashMap<&'static str, DailyField> {
    let mut m = FxHashMap::default();
    m.insert("min_temp", DailyField::MinTemp);
    m.insert("max_temp", DailyField::MaxTemp);
    m.insert("rh", DailyField::Rh);
    m.insert("min_rh", DailyField::Rh);
    m.insert("relative_humidity", DailyField::Rh);
    m.insert("wd", DailyField::Wd);
    m.insert("dir", DailyField::Wd);
    m.insert("wind_direction", DailyField::Wd);
    m.insert("min_ws", DailyField::MinWs);
    m.insert("max_ws", DailyField::MaxWs);
    m.insert("min_wg", DailyField::MinWg);
    m.insert("max_wg", DailyField::MaxWg);
    m.insert("precip", DailyField::Precip);
    m.insert("rain", DailyField::Precip);
    m.insert("precipitation", DailyField::Precip);
    m
}

fn hourly_alias_map() -> FxHashMap<&'static str, HourlyField> {
    let mut m = FxHashMap::default();
    m.insert("hour", HourlyField::Hour);
    m.insert("temp", HourlyField::Temp);
    m.insert("temperature", HourlyField::Temp);
    m.insert("rh", HourlyField::Rh);
    m.insert("relative_humidity", HourlyField::Rh);
    m.insert("min_rh", HourlyField::Rh);
    m.insert("wd", HourlyField::Wd);
    m.insert("dir", HourlyField::Wd);
    m.insert("wind_direction", HourlyField::Wd);
    m.insert("direction", HourlyField::Wd);
    m.insert("ws", HourlyField::Ws);
    m.insert("wspd", HourlyField::Ws);
    m.insert("wind_speed", HourlyField::Ws);
    m.insert("windspeed", HourlyField::Ws);
    m.insert("wg", HourlyField::Wg);
    m.insert("gust", HourlyField::Wg);
    m.insert("gusting", HourlyField::Wg);
    m.insert("wind_gust", HourlyField::Wg);
    m.insert("windgust", HourlyField::Wg);
    m.insert("precip", HourlyField::Precip);
    m.insert("rain", HourlyField::Precip);
    m.insert("precipitation", HourlyField::Precip);
    m.insert("prec", HourlyField::Precip);
    m.insert("ffmc", HourlyField::Ffmc);
    m.insert("hffmc", HourlyField::Ffmc);
    m.insert("dmc", HourlyField::Dmc);
    m.insert("dc", HourlyField::Dc);
    m.insert("bui", HourlyField::Bui);
    m.insert("isi", HourlyField::Isi);
    m.insert("hisi", HourlyField::Isi);
    m.insert("fwi", HourlyField::Fwi);
    m.insert("hfwi", HourlyField::Fwi);
    m
}

/// Parse a date token against the configured (or default) formats.
pub(crate) fn parse_date(token: &str, format: Option<&str>) -> Option<NaiveDate> {
    match format {
        Some(f) => NaiveDate::parse_from_str(token, f).ok(),
        None => DEFAULT_DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(token, f).ok()),
    }
}

/// One parsed daily-summary row, still in file units (degrees, percent).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DailyRow {
    pub line: usize,
    pub date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
    pub rh: f64,
    pub precip: f64,
    pub min_ws: f64,
    pub max_ws: f64,
    pub min_wg: Option<f64>,
    pub max_wg: Option<f64>,
    pub wd: f64,
    pub corrected: bool,
}

/// One parsed hourly row, still in file units.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HourlyRow {
    pub line: usize,
    pub time: NaiveDateTime,
    pub temp: f64,
    pub rh: f64,
    pub wd: f64,
    pub ws: f64,
    pub wg: Option<f64>,
    pub precip: f64,
    pub ffmc: Option<f64>,
    pub dmc: Option<f64>,
    pub dc: Option<f64>,
    pub bui: Option<f64>,
    pub isi: Option<f64>,
    pub fwi: Option<f64>,
    pub corrected: bool,
    pub interpolated: bool,
}

fn bad_number(line: usize, token: &str) -> StreamError {
    StreamError::InvalidData {
        line,
        reason: format!("unparseable numeric value '{token}'"),
    }
}

/// Parse one daily data row against the header columns.
pub(crate) fn parse_daily_row(
    header: &[String],
    tokens: &[String],
    line: usize,
    date_format: Option<&str>,
) -> Result<DailyRow, StreamError> {
    let aliases = daily_alias_map();
    let Some(date_token) = tokens.first() else {
        return Err(StreamError::InvalidData {
            line,
            reason: "empty row".into(),
        });
    };
    let date = parse_date(date_token, date_format).ok_or_else(|| StreamError::InvalidData {
        line,
        reason: format!("unparseable date '{date_token}'"),
    })?;

    let mut row = DailyRow {
        line,
        date,
        min_temp: -100.0,
        max_temp: -100.0,
        rh: -100.0,
        precip: -100.0,
        min_ws: -100.0,
        max_ws: -100.0,
        min_wg: None,
        max_wg: None,
        wd: -100.0,
        corrected: false,
    };

    for (i, token) in tokens.iter().enumerate().skip(1) {
        let Some(name) = header.get(i) else { break };
        let Some(field) = aliases.get(name.to_ascii_lowercase().as_str()) else {
            continue;
        };
        let value: f64 = token.parse().map_err(|_| bad_number(line, token))?;
        match field {
            DailyField::MinTemp => row.min_temp = value,
            DailyField::MaxTemp => row.max_temp = value,
            DailyField::Rh => row.rh = value,
            DailyField::Wd => row.wd = value,
            DailyField::MinWs => row.min_ws = value,
            DailyField::MaxWs => row.max_ws = value,
            DailyField::MinWg => row.min_wg = Some(value),
            DailyField::MaxWg => row.max_wg = Some(value),
            DailyField::Precip => row.precip = value,
        }
    }
    Ok(row)
}

/// Parse an `h`, `h:mm`, or `h:mm:ss` time token.
fn parse_hour_token(token: &str) -> Option<NaiveTime> {
    let mut parts = token.split(':');
    let h: u32 = parts.next()?.parse().ok()?;
    let m: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let s: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    NaiveTime::from_hms_opt(h, m, s)
}

/// Parse one hourly data row against the header columns.
pub(crate) fn parse_hourly_row(
    header: &[String],
    tokens: &[String],
    line: usize,
    date_format: Option<&str>,
) -> Result<HourlyRow, StreamError> {
    let aliases = hourly_alias_map();
    let Some(date_token) = tokens.first() else {
        return Err(StreamError::InvalidData {
            line,
            reason: "empty row".into(),
        });
    };
    let date = parse_date(date_token, date_format).ok_or_else(|| StreamError::InvalidData {
        line,
        reason: format!("unparseable date '{date_token}'"),
    })?;

    let mut time = NaiveTime::MIN;
    let mut row = HourlyRow {
        line,
        time: date.and_time(time),
        temp: 0.0,
        rh: 0.0,
        wd: 0.0,
        ws: 0.0,
        wg: None,
        precip: 0.0,
        ffmc: None,
        dmc: None,
        dc: None,
        bui: None,
        isi: None,
        fwi: None,
        corrected: false,
        interpolated: false,
    };

    for (i, token) in tokens.iter().enumerate().skip(1) {
        let Some(name) = header.get(i) else { break };
        let lower = name.to_ascii_lowercase();
        if token.contains(':') {
            if lower == "hour" {
                time = parse_hour_token(token).ok_or_else(|| StreamError::InvalidData {
                    line,
                    reason: format!("unparseable time '{token}'"),
                })?;
                continue;
            }
            if matches!(lower.as_str(), "sunrise" | "solar_noon" | "sunset") {
                // Derived solar columns trail the data; nothing further to read.
                break;
            }
        }
        let Some(field) = aliases.get(lower.as_str()) else {
            continue;
        };
        let value: f64 = token.parse().map_err(|_| bad_number(line, token))?;
        match field {
            HourlyField::Hour => {
                let h = value as i64;
                if !(0..24).contains(&h) {
                    return Err(StreamError::InvalidData {
                        line,
                        reason: format!("hour {h} outside 0..=23"),
                    });
                }
                time = NaiveTime::from_hms_opt(h as u32, 0, 0).unwrap_or(NaiveTime::MIN);
            }
            HourlyField::Temp => row.temp = value,
            HourlyField::Rh => row.rh = value,
            HourlyField::Wd => row.wd = value,
            HourlyField::Ws => row.ws = value,
            HourlyField::Wg => row.wg = Some(value),
            HourlyField::Precip => row.precip = value,
            HourlyField::Ffmc => row.ffmc = (value >= 0.0).then_some(value),
            HourlyField::Dmc => row.dmc = (value >= 0.0).then_some(value),
            HourlyField::Dc => row.dc = (value >= 0.0).then_some(value),
            HourlyField::Bui => row.bui = (value >= 0.0).then_some(value),
            HourlyField::Isi => row.isi = (value >= 0.0).then_some(value),
            HourlyField::Fwi => row.fwi = (value >= 0.0).then_some(value),
        }
    }
    row.time = date.and_time(time);
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn tokenizer_handles_mixed_delimiters() {
        let t = tokenize("daily,min_temp;\"max_temp\"\trh wd\r\n");
        assert_eq!(t, strings(&["daily", "min_temp", "max_temp", "rh", "wd"]));
    }

    #[test]
    fn header_detection_by_keyword() {
        assert_eq!(
            classify_header(&strings(&["daily", "min_temp"])),
            HeaderMatch::Format(FileFormat::Daily)
        );
        assert_eq!(
            classify_header(&strings(&["hourly", "temp"])),
            HeaderMatch::Format(FileFormat::Hourly)
        );
        assert_eq!(
            classify_header(&strings(&["date", "hour", "temp"])),
            HeaderMatch::Format(FileFormat::Hourly)
        );
        assert_eq!(
            classify_header(&strings(&["date", "min_temp"])),
            HeaderMatch::Format(FileFormat::Daily)
        );
        assert_eq!(classify_header(&strings(&["StationID"])), HeaderMatch::Unsupported);
        assert_eq!(classify_header(&strings(&["garbage"])), HeaderMatch::Unknown);
    }

    #[test]
    fn daily_row_maps_columns_in_any_order() {
        let header = strings(&["daily", "max_temp", "min_temp", "rh", "wd", "precip", "min_ws", "max_ws"]);
        let tokens = strings(&["2023-07-01", "20", "10", "60", "180", "5", "5", "15"]);
        let row = parse_daily_row(&header, &tokens, 2, None).unwrap();
        assert_eq!(row.min_temp, 10.0);
        assert_eq!(row.max_temp, 20.0);
        assert_eq!(row.rh, 60.0);
        assert_eq!(row.wd, 180.0);
        assert_eq!(row.precip, 5.0);
    }

    #[test]
    fn hourly_row_parses_clock_token() {
        let header = strings(&["hourly", "hour", "temp", "rh", "ws", "wd", "precip"]);
        let tokens = strings(&["2023-07-01", "13:00", "22.5", "45", "12", "270", "0"]);
        let row = parse_hourly_row(&header, &tokens, 3, None).unwrap();
        assert_eq!(row.time.time(), NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        assert_eq!(row.temp, 22.5);
    }

    #[test]
    fn hourly_row_reads_fwi_columns_as_overrides() {
        let header = strings(&["hourly", "hour", "temp", "rh", "ws", "wd", "precip", "ffmc", "dmc", "dc"]);
        let tokens = strings(&["2023-07-01", "13", "22.5", "45", "12", "270", "0", "88.1", "-1", "300"]);
        let row = parse_hourly_row(&header, &tokens, 3, None).unwrap();
        assert_eq!(row.ffmc, Some(88.1));
        assert_eq!(row.dmc, None, "-1 sentinel means unset");
        assert_eq!(row.dc, Some(300.0));
    }

    #[test]
    fn alias_lookup_is_case_insensitive() {
        let header = strings(&["hourly", "HOUR", "Temp", "RH", "WSPD", "DIR", "Rain"]);
        let tokens = strings(&["2023-07-01", "6", "15", "80", "7", "90", "1.2"]);
        let row = parse_hourly_row(&header, &tokens, 4, None).unwrap();
        assert_eq!(row.ws, 7.0);
        assert_eq!(row.wd, 90.0);
        assert_eq!(row.precip, 1.2);
    }

    #[test]
    fn unparseable_number_is_invalid_data() {
        let header = strings(&["daily", "min_temp"]);
        let tokens = strings(&["2023-07-01", "abc"]);
        assert!(matches!(
            parse_daily_row(&header, &tokens, 7, None),
            Err(StreamError::InvalidData { line: 7, .. })
        ));
    }

    #[test]
    fn pinned_date_format_is_exclusive() {
        assert!(parse_date("01/07/2023", Some("%d/%m/%Y")).is_some());
        assert!(parse_date("2023-07-01", Some("%d/%m/%Y")).is_none());
        assert!(parse_date("2023-07-01", None).is_some());
    }
}
