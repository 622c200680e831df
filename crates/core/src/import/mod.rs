//! Weather file ingestion: header detection, row validation and correction,
//! missing-hour spline interpolation, and commit into the timeline store.
//!
//! Imports are two-phase: the whole file is parsed and every ordering and
//! range check runs against a simulated timeline first, so a rejected
//! import leaves the existing stream untouched.

pub(crate) mod header;
pub(crate) mod spline;

use std::io::BufRead;

use chrono::{Duration, NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::core_types::compass_to_cartesian_rad;
use crate::error::{ImportReport, StreamError};
use crate::stream::day::{DailySummaryValues, DayMode, HourlyReading};
use crate::stream::store::WeatherStream;

use header::{
    classify_header, parse_daily_row, parse_hourly_row, tokenize, DailyRow, FileFormat,
    HeaderMatch, HourlyRow,
};
use spline::NaturalCubicSpline;

/// Longest run of consecutive missing hours that interpolation will fill.
const MAX_INTERPOLATED_RUN: i64 = 5;

/// How out-of-range values are handled during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidPolicy {
    /// Reject the entire import on the first violation.
    #[default]
    Fail,
    /// Keep the raw value and mark the row corrected/invalid.
    Allow,
    /// Clamp to the nearest bound and mark the row corrected.
    Fix,
}

/// Options controlling one import operation.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Clear the stream before importing.
    pub purge: bool,
    /// Permit rows that extend the timeline past its current end.
    pub allow_append: bool,
    /// Permit rows that replace existing data.
    pub allow_overwrite: bool,
    pub invalid: InvalidPolicy,
    /// Pinned date format (chrono syntax); the default alias list is tried
    /// otherwise.
    pub date_format: Option<String>,
}

/// Import a weather file from any line source.
pub fn import_reader(
    stream: &mut WeatherStream,
    reader: impl BufRead,
    options: &ImportOptions,
) -> Result<ImportReport, StreamError> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    import_text(stream, &lines, options)
}

/// Import a weather file already split into lines.
pub fn import_text(
    stream: &mut WeatherStream,
    lines: &[String],
    options: &ImportOptions,
) -> Result<ImportReport, StreamError> {
    let mut idx = 0;
    let (format, header) = loop {
        let Some(line) = lines.get(idx) else {
            return Err(StreamError::BadFileType);
        };
        idx += 1;
        let header = tokenize(line);
        match classify_header(&header) {
            HeaderMatch::Format(f) => break (f, header),
            HeaderMatch::Unsupported => return Err(StreamError::BadFileType),
            HeaderMatch::Unknown => {}
        }
    };
    debug!(?format, columns = header.len(), "weather file header detected");
    match format {
        FileFormat::Daily => import_daily(stream, &header, lines, idx, options),
        FileFormat::Hourly => import_hourly(stream, &header, lines, idx, options),
    }
}

struct Violation {
    what: &'static str,
}

fn check(violations: &mut Vec<Violation>, ok: bool, what: &'static str) {
    if !ok {
        violations.push(Violation { what });
    }
}

fn apply_policy(
    violations: Vec<Violation>,
    line: usize,
    policy: InvalidPolicy,
    report: &mut ImportReport,
) -> Result<bool, StreamError> {
    if violations.is_empty() {
        return Ok(false);
    }
    let reason = violations
        .iter()
        .map(|v| v.what)
        .collect::<Vec<_>>()
        .join(", ");
    match policy {
        InvalidPolicy::Fail => Err(StreamError::InvalidData { line, reason }),
        InvalidPolicy::Allow => {
            warn!(line, %reason, "keeping out-of-range values");
            report.corrected = true;
            report.warnings.push(format!("line {line}: kept out-of-range value(s): {reason}"));
            Ok(true)
        }
        InvalidPolicy::Fix => {
            warn!(line, %reason, "clamping out-of-range values");
            report.corrected = true;
            report.warnings.push(format!("line {line}: clamped out-of-range value(s): {reason}"));
            Ok(true)
        }
    }
}

/// Compass degrees to internal Cartesian radians, distinguishing calm (zero
/// speed, zero angle) from a true-north wind, which maps to 2π.
fn convert_direction(wd_deg: f64, max_ws: f64) -> f64 {
    let wd = compass_to_cartesian_rad(wd_deg);
    if max_ws > 0.0 && wd == 0.0 {
        std::f64::consts::TAU
    } else {
        wd
    }
}

fn import_daily(
    stream: &mut WeatherStream,
    header: &[String],
    lines: &[String],
    first_data_line: usize,
    options: &ImportOptions,
) -> Result<ImportReport, StreamError> {
    let mut report = ImportReport::default();
    let mut rows: Vec<DailyRow> = Vec::new();

    for (offset, line) in lines[first_data_line..].iter().enumerate() {
        let line_no = first_data_line + offset + 1;
        let tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        let mut row = parse_daily_row(header, &tokens, line_no, options.date_format.as_deref())?;

        let mut violations = Vec::new();
        check(&mut violations, (0.0..=360.0).contains(&row.wd), "wind direction");
        check(&mut violations, row.min_ws >= 0.0 && row.max_ws >= 0.0, "wind speed");
        check(&mut violations, (0.0..=100.0).contains(&row.rh), "relative humidity");
        check(&mut violations, row.precip >= 0.0, "precipitation");
        check(
            &mut violations,
            (-50.0..=60.0).contains(&row.min_temp) && (-50.0..=60.0).contains(&row.max_temp),
            "temperature",
        );
        let flagged = apply_policy(violations, line_no, options.invalid, &mut report)?;
        if flagged && options.invalid == InvalidPolicy::Fix {
            row.wd = row.wd.clamp(0.0, 360.0);
            row.min_ws = row.min_ws.max(0.0);
            row.max_ws = row.max_ws.max(0.0);
            row.rh = row.rh.clamp(0.0, 100.0);
            row.precip = row.precip.max(0.0);
            row.min_temp = row.min_temp.clamp(-50.0, 60.0);
            row.max_temp = row.max_temp.clamp(-50.0, 60.0);
        }
        row.corrected = flagged;

        // Reversed aggregate pairs are swapped rather than rejected.
        if row.min_temp > row.max_temp {
            std::mem::swap(&mut row.min_temp, &mut row.max_temp);
        }
        if row.min_ws > row.max_ws {
            std::mem::swap(&mut row.min_ws, &mut row.max_ws);
        }
        if let (Some(lo), Some(hi)) = (row.min_wg, row.max_wg) {
            if lo > hi {
                row.min_wg = Some(hi);
                row.max_wg = Some(lo);
            }
        }
        rows.push(row);
    }

    // Ordering dry-run against the (possibly purged) timeline state.
    let starts_empty = stream.is_empty() || options.purge;
    let can_append = options.allow_append || starts_empty;
    let sim_start = if starts_empty {
        rows.first()
            .map(|r| r.date.and_time(chrono::NaiveTime::MIN))
    } else {
        stream.start_time()
    };
    let mut sim_len = if starts_empty { 0 } else { stream.num_days() };
    // Append point: midnight after the last existing day.
    let mut last_t: Option<NaiveDateTime> = if starts_empty {
        None
    } else {
        sim_start.map(|s| s + Duration::days(sim_len as i64))
    };
    let mut prev_t: Option<NaiveDateTime> = None;

    for (k, row) in rows.iter().enumerate() {
        let t = row.date.and_time(chrono::NaiveTime::MIN);
        let Some(start) = sim_start else { break };
        if t < start {
            return Err(StreamError::AttemptPrepend { line: row.line });
        }
        if let Some(lt) = last_t {
            if t < lt && !options.allow_overwrite {
                return Err(StreamError::AttemptOverwrite { line: row.line });
            }
            if k == 0 && t > lt {
                return Err(StreamError::InvalidTime {
                    line: row.line,
                    reason: "first row leaves a gap after the existing data".into(),
                });
            }
        }
        if k > 0 {
            if let Some(p) = prev_t {
                if t != p + Duration::days(1) {
                    return Err(StreamError::InvalidTime {
                        line: row.line,
                        reason: "daily rows must advance by exactly one day".into(),
                    });
                }
            }
        }
        let day_idx = (t - start).num_days() as usize;
        if day_idx >= sim_len {
            if !can_append || day_idx != sim_len {
                return Err(StreamError::AttemptAppend { line: row.line });
            }
            sim_len += 1;
        }
        prev_t = Some(t);
        last_t = Some(t);
    }

    // Commit.
    if options.purge {
        stream.clear();
    }
    stream.first_hour = 0;
    stream.last_hour = 23;
    for row in &rows {
        let t = row.date.and_time(chrono::NaiveTime::MIN);
        let Some(idx) = stream.day_index_or_create(t, can_append) else {
            return Err(StreamError::AttemptAppend { line: row.line });
        };
        stream.days[idx].mode = DayMode::DailySummary;
        stream.days[idx].origin_file = true;
        stream.days[idx].summary = DailySummaryValues {
            min_temp: row.min_temp,
            max_temp: row.max_temp,
            min_ws: row.min_ws,
            max_ws: row.max_ws,
            min_gust: row.min_wg,
            max_gust: row.max_wg,
            mean_rh: row.rh * 0.01,
            precip: row.precip,
            mean_wd: convert_direction(row.wd, row.max_ws),
        };
        report.rows += 1;
    }
    stream.invalidate();
    debug!(rows = report.rows, "daily import committed");
    Ok(report)
}

fn validate_hourly(
    row: &mut HourlyRow,
    policy: InvalidPolicy,
    report: &mut ImportReport,
) -> Result<(), StreamError> {
    let mut violations = Vec::new();
    check(&mut violations, (0.0..=360.0).contains(&row.wd), "wind direction");
    check(&mut violations, row.ws >= 0.0, "wind speed");
    check(&mut violations, (0.0..=100.0).contains(&row.rh), "relative humidity");
    check(&mut violations, row.precip >= 0.0, "precipitation");
    check(&mut violations, (-50.0..=60.0).contains(&row.temp), "temperature");
    check(
        &mut violations,
        row.dmc.is_none_or(|v| (0.0..=500.0).contains(&v)),
        "DMC",
    );
    check(
        &mut violations,
        row.dc.is_none_or(|v| (0.0..=1500.0).contains(&v)),
        "DC",
    );
    let flagged = apply_policy(violations, row.line, policy, report)?;
    if flagged && policy == InvalidPolicy::Fix {
        row.wd = row.wd.clamp(0.0, 360.0);
        row.ws = row.ws.max(0.0);
        row.wg = row.wg.map(|g| g.max(0.0));
        row.rh = row.rh.clamp(0.0, 100.0);
        row.precip = row.precip.max(0.0);
        row.temp = row.temp.clamp(-50.0, 60.0);
        row.dmc = row.dmc.map(|v| v.clamp(0.0, 500.0));
        row.dc = row.dc.map(|v| v.clamp(0.0, 1500.0));
    }
    row.corrected = flagged;
    Ok(())
}

fn hour_offset(start: NaiveDateTime, t: NaiveDateTime) -> f64 {
    (t - start).num_seconds() as f64 / 3600.0
}

#[allow(clippy::too_many_lines)]
fn import_hourly(
    stream: &mut WeatherStream,
    header: &[String],
    lines: &[String],
    first_data_line: usize,
    options: &ImportOptions,
) -> Result<ImportReport, StreamError> {
    let mut report = ImportReport::default();
    let mut rows: Vec<HourlyRow> = Vec::new();

    for (offset, line) in lines[first_data_line..].iter().enumerate() {
        let line_no = first_data_line + offset + 1;
        let tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        let mut row = parse_hourly_row(header, &tokens, line_no, options.date_format.as_deref())?;
        validate_hourly(&mut row, options.invalid, &mut report)?;
        // File units to internal units.
        row.wd = convert_direction(row.wd, row.ws);
        row.rh *= 0.01;
        rows.push(row);
    }
    if rows.is_empty() {
        return Ok(report);
    }
    rows.sort_by_key(|r| r.time);

    let starts_empty = stream.is_empty() || options.purge;
    let start_mid = if starts_empty {
        WeatherStream::midnight_of(rows[0].time)
    } else {
        stream.start_time().unwrap_or_else(|| WeatherStream::midnight_of(rows[0].time))
    };

    if starts_empty && rows[0].time > stream.location().noon_local(start_mid.date()) {
        return Err(StreamError::StartAfterNoon);
    }

    // Missing-hour scan over whole-hour offsets from the timeline start.
    let mut missing: Vec<i64> = Vec::new();
    let mut last_off: i64 = 0;
    let mut first = true;
    for row in &rows {
        if row.time < start_mid {
            return Err(StreamError::AttemptPrepend { line: row.line });
        }
        let off = hour_offset(start_mid, row.time);
        let whole = off.floor() as i64;
        if first {
            last_off = whole - 1;
            first = false;
        }
        let mut run = 0;
        while last_off < whole - 1 {
            last_off += 1;
            run += 1;
            missing.push(last_off);
        }
        if run > MAX_INTERPOLATED_RUN {
            return Err(StreamError::InvalidData {
                line: row.line,
                reason: format!("{run} consecutive hours missing (limit {MAX_INTERPOLATED_RUN})"),
            });
        }
        last_off = whole;
    }

    // The first retained row must land on an exact hour at or before local
    // solar-mean noon of its day.
    let first_off = hour_offset(start_mid, rows[0].time);
    let noon_lst = if stream.location().dst_amount_secs != 0 { 13 } else { 12 };
    if (first_off.floor() as i64).rem_euclid(24) > noon_lst || first_off.fract() != 0.0 {
        return Err(StreamError::InvalidData {
            line: rows[0].line,
            reason: "hourly data must start on an exact hour at or before solar noon".into(),
        });
    }

    if !missing.is_empty() {
        report.interpolated = true;
        report
            .warnings
            .push(format!("{} missing hour(s) filled by spline interpolation", missing.len()));
        warn!(count = missing.len(), "interpolating missing hours");
        fill_missing_hours(&mut rows, &missing, start_mid);
    }

    // Ordering dry-run.
    let can_append = options.allow_append || starts_empty;
    let mut last_t: Option<NaiveDateTime> = if starts_empty {
        None
    } else {
        stream.end_time_of_hours()
    };
    let mut sim_days = if starts_empty { 0 } else { stream.num_days() };
    let mut prev_t: Option<NaiveDateTime> = None;
    for (k, row) in rows.iter().enumerate() {
        if let Some(lt) = last_t {
            if row.time < lt && !options.allow_overwrite {
                return Err(StreamError::AttemptOverwrite { line: row.line });
            }
            if k == 0 && row.time > lt {
                return Err(StreamError::InvalidTime {
                    line: row.line,
                    reason: "first row leaves a gap after the existing data".into(),
                });
            }
        }
        if k > 0 {
            if let Some(p) = prev_t {
                if row.time != p + Duration::hours(1) {
                    return Err(StreamError::InvalidTime {
                        line: row.line,
                        reason: "hourly rows must advance by exactly one hour".into(),
                    });
                }
            }
        }
        let day_idx = (WeatherStream::midnight_of(row.time) - start_mid).num_days() as usize;
        if day_idx >= sim_days {
            if !can_append || day_idx != sim_days {
                return Err(StreamError::AttemptAppend { line: row.line });
            }
            sim_days += 1;
        }
        prev_t = Some(row.time);
        last_t = Some(row.time);
    }

    // Commit.
    if options.purge {
        stream.clear();
    }
    let was_empty = stream.is_empty();
    if was_empty {
        stream.first_hour = rows[0].time.hour() as usize;
    }
    let noon_hour = stream.location().noon_hour(start_mid.date());
    let mut any_codes = false;

    for (k, row) in rows.iter().enumerate() {
        let Some(idx) = stream.day_index_or_create(row.time, can_append) else {
            return Err(StreamError::AttemptAppend { line: row.line });
        };
        let hour = row.time.hour() as usize;
        stream.days[idx].mode = DayMode::Hourly;
        stream.days[idx].origin_file = true;

        let at_stream_origin = (row.time == start_mid && hour == 0) || k == 0;
        if let Some(dmc) = row.dmc {
            if at_stream_origin {
                stream.starting.dmc = Some(dmc);
            } else if hour == noon_hour {
                stream.days[idx].fwi.spec_day.dmc = Some(dmc);
            }
            any_codes = true;
        }
        if let Some(dc) = row.dc {
            if at_stream_origin {
                stream.starting.dc = Some(dc);
            } else if hour == noon_hour {
                stream.days[idx].fwi.spec_day.dc = Some(dc);
            }
            any_codes = true;
        }
        if let Some(bui) = row.bui {
            if at_stream_origin {
                stream.starting.bui = Some(bui);
            }
            stream.days[idx].fwi.spec_day.bui = Some(bui);
            any_codes = true;
        }
        if let Some(isi) = row.isi {
            stream.days[idx].fwi.spec_hr[hour].isi = Some(isi);
            any_codes = true;
        }
        if let Some(fwi) = row.fwi {
            stream.days[idx].fwi.spec_hr[hour].fwi = Some(fwi);
            any_codes = true;
        }
        if let Some(ffmc) = row.ffmc {
            stream.days[idx].fwi.spec_hr[hour].ffmc = Some(ffmc);
            any_codes = true;
            if hour == noon_hour + 4 {
                // Four hours past noon the hourly and daily codes coincide;
                // the file value seeds the daily FFMC too.
                stream.days[idx].fwi.spec_day.ffmc = Some(ffmc);
                if row.time.date() == start_mid.date() {
                    stream.starting.hffmc = ffmc;
                    stream.starting.hffmc_time_secs = Some((noon_hour as i64 + 4) * 3600);
                }
            }
        }

        stream.last_hour = hour;
        stream.days[idx].set_hourly_weather(
            hour,
            HourlyReading {
                temp: row.temp,
                rh: row.rh,
                precip: row.precip,
                ws: row.ws,
                gust: row.wg,
                wd: row.wd,
                dew: None,
            },
        );
        stream.days[idx].hflags[hour].interpolated = row.interpolated;
        stream.days[idx].hflags[hour].corrected = row.corrected;
        report.rows += 1;
    }

    if any_codes {
        stream.options.use_specified_fwi = true;
    }
    stream.invalidate();
    stream.ensure_calculated();
    debug!(rows = report.rows, interpolated = report.interpolated, "hourly import committed");
    Ok(report)
}

/// Fill the listed missing whole-hour offsets by natural-cubic-spline
/// interpolation per channel, clamped to the bracketing known values. Wind
/// direction copies the preceding row; precipitation is zero.
fn fill_missing_hours(rows: &mut Vec<HourlyRow>, missing: &[i64], start_mid: NaiveDateTime) {
    let offsets: Vec<f64> = rows.iter().map(|r| hour_offset(start_mid, r.time)).collect();
    let temps: Vec<f64> = rows.iter().map(|r| r.temp).collect();
    let rhs: Vec<f64> = rows.iter().map(|r| r.rh).collect();
    let wss: Vec<f64> = rows.iter().map(|r| r.ws).collect();
    let gusts: Option<Vec<f64>> = rows.iter().map(|r| r.wg).collect();

    let s_temp = NaturalCubicSpline::fit(&offsets, &temps);
    let s_rh = NaturalCubicSpline::fit(&offsets, &rhs);
    let s_ws = NaturalCubicSpline::fit(&offsets, &wss);
    let s_gust = gusts.as_ref().and_then(|g| NaturalCubicSpline::fit(&offsets, g));

    // Bracketing known values for the no-overshoot clamp.
    let bracket = |off: f64, values: &[f64]| -> (f64, f64) {
        let mut lo = values[0];
        let mut hi = values[values.len() - 1];
        for w in 0..offsets.len() - 1 {
            if offsets[w] <= off && off <= offsets[w + 1] {
                lo = values[w].min(values[w + 1]);
                hi = values[w].max(values[w + 1]);
                break;
            }
        }
        (lo, hi)
    };

    // Fractional-hour observations only supported the fit; the committed
    // series is whole hours.
    let mut clean: Vec<HourlyRow> = rows
        .iter()
        .filter(|r| hour_offset(start_mid, r.time).fract() == 0.0)
        .cloned()
        .collect();

    for &h in missing {
        let off = h as f64;
        let time = start_mid + Duration::hours(h);
        let pos = clean.partition_point(|r| r.time < time);
        if pos == 0 {
            continue;
        }
        let eval = |s: &Option<NaturalCubicSpline>, values: &[f64]| -> f64 {
            s.as_ref().map_or(0.0, |s| {
                let (lo, hi) = bracket(off, values);
                s.value(off).clamp(lo, hi)
            })
        };
        let template = &clean[pos - 1];
        let filled = HourlyRow {
            line: template.line,
            time,
            temp: eval(&s_temp, &temps),
            rh: eval(&s_rh, &rhs).clamp(0.0, 1.0),
            wd: template.wd,
            ws: eval(&s_ws, &wss).max(0.0),
            wg: match (&s_gust, &gusts) {
                (Some(s), Some(g)) => {
                    let (lo, hi) = bracket(off, g);
                    Some(s.value(off).clamp(lo, hi).max(0.0))
                }
                _ => None,
            },
            precip: 0.0,
            ffmc: None,
            dmc: None,
            dc: None,
            bui: None,
            isi: None,
            fwi: None,
            corrected: false,
            interpolated: true,
        };
        clean.insert(pos, filled);
    }
    *rows = clean;
}
