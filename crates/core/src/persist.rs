//! Persisted stream representation.
//!
//! The snapshot preserves seeds, options, curve parameters, the location,
//! and the raw per-day/per-hour inputs plus specified FWI values — enough
//! to reproduce every calculated value deterministically. Calculated values
//! are never persisted; restore always leaves the stream dirty.
//!
//! Compatibility is driven by a declarative gate table: fields introduced
//! after a snapshot's version default in with a human-readable warning,
//! while versions below the supported baseline (or above the current
//! writer) are a hard failure. The legacy packed option bits survive only
//! here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core_types::{CurveParams, FfmcPolicy, Location, StartingCodes, StreamOptions, HOURS_PER_DAY};
use crate::error::StreamError;
use crate::stream::day::{DailyFwi, DailySummaryValues, DayMode, DayRecord, HourFlags, HourlyFwi};
use crate::stream::store::WeatherStream;

/// Version written by this engine.
pub const SNAPSHOT_VERSION: u16 = 2;
/// Oldest version restore still understands.
pub const MIN_SUPPORTED_VERSION: u16 = 1;

/// A field gated by snapshot version: absent in older snapshots, defaulted
/// on restore with `warning` appended.
struct FieldGate {
    min_version: u16,
    warning: &'static str,
}

const FIELD_GATES: &[FieldGate] = &[
    FieldGate {
        min_version: 2,
        warning: "pre-stream rain accumulation not present; defaulted to 0",
    },
    FieldGate {
        min_version: 2,
        warning: "wind gust channel not present; gusts restored as unspecified",
    },
    FieldGate {
        min_version: 2,
        warning: "diurnal curve parameters not present; standard fit restored",
    },
];

/// Legacy packed option bits: bits 0-1 select the hourly FFMC policy,
/// bit 2 enables specified-FWI precedence.
fn pack_options(options: StreamOptions) -> u32 {
    let policy = match options.ffmc_policy {
        FfmcPolicy::VanWagner => 0x1,
        FfmcPolicy::Hybrid => 0x2,
        FfmcPolicy::Lawson => 0x3,
    };
    policy | if options.use_specified_fwi { 0x4 } else { 0 }
}

fn unpack_options(bits: u32) -> StreamOptions {
    StreamOptions {
        ffmc_policy: match bits & 0x3 {
            0x2 => FfmcPolicy::Hybrid,
            0x3 => FfmcPolicy::Lawson,
            _ => FfmcPolicy::VanWagner,
        },
        use_specified_fwi: bits & 0x4 != 0,
    }
}

/// Raw hourly channels of one hourly-specified day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyChannelsSnapshot {
    pub temp: Vec<f64>,
    pub dewpt: Vec<f64>,
    pub rh: Vec<f64>,
    pub ws: Vec<f64>,
    #[serde(default)]
    pub gust: Option<Vec<f64>>,
    pub wd: Vec<f64>,
    pub precip: Vec<f64>,
    pub flags: Vec<HourFlags>,
}

/// One persisted day: raw inputs and specified values only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub mode: DayMode,
    pub origin_file: bool,
    pub summary: DailySummaryValues,
    /// Present only for hourly-specified days.
    #[serde(default)]
    pub hours: Option<HourlyChannelsSnapshot>,
    pub spec_day: DailyFwi,
    pub spec_hr: Vec<HourlyFwi>,
}

/// The complete persisted form of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub version: u16,
    pub location: Location,
    pub start: Option<NaiveDateTime>,
    pub options_bits: u32,
    pub starting: StartingCodes,
    #[serde(default)]
    pub curve: Option<CurveParams>,
    pub first_hour: u8,
    pub last_hour: u8,
    pub days: Vec<DaySnapshot>,
}

impl WeatherStream {
    /// Capture the persistable state of this stream.
    pub fn snapshot(&self) -> StreamSnapshot {
        let days = self
            .days
            .iter()
            .map(|d| DaySnapshot {
                mode: d.mode,
                origin_file: d.origin_file,
                summary: d.summary,
                hours: (d.mode == DayMode::Hourly).then(|| HourlyChannelsSnapshot {
                    temp: d.hourly_temp.to_vec(),
                    dewpt: d.hourly_dewpt.to_vec(),
                    rh: d.hourly_rh.to_vec(),
                    ws: d.hourly_ws.to_vec(),
                    gust: Some(d.hourly_gust.to_vec()),
                    wd: d.hourly_wd.to_vec(),
                    precip: d.hourly_precip.to_vec(),
                    flags: d.hflags.to_vec(),
                }),
                spec_day: d.fwi.spec_day,
                spec_hr: d.fwi.spec_hr.to_vec(),
            })
            .collect();
        StreamSnapshot {
            version: SNAPSHOT_VERSION,
            location: self.location,
            start: self.start,
            options_bits: pack_options(self.options),
            starting: self.starting.clone(),
            curve: Some(self.curve),
            first_hour: self.first_hour as u8,
            last_hour: self.last_hour as u8,
            days,
        }
    }

    /// Rebuild a stream from a snapshot. Returns the stream plus any
    /// compatibility warnings from the version gate table. The restored
    /// stream is dirty; the first read recomputes all derived values.
    pub fn restore(snapshot: &StreamSnapshot) -> Result<(WeatherStream, Vec<String>), StreamError> {
        if snapshot.version < MIN_SUPPORTED_VERSION || snapshot.version > SNAPSHOT_VERSION {
            return Err(StreamError::UnsupportedVersion {
                version: snapshot.version,
                min: MIN_SUPPORTED_VERSION,
                max: SNAPSHOT_VERSION,
            });
        }
        let mut warnings = Vec::new();
        for gate in FIELD_GATES {
            if snapshot.version < gate.min_version {
                warnings.push(gate.warning.to_string());
            }
        }

        let mut stream = WeatherStream::new(snapshot.location);
        stream.options = unpack_options(snapshot.options_bits);
        stream.starting = snapshot.starting.clone();
        stream.curve = snapshot.curve.unwrap_or_default();
        stream.start = snapshot.start;
        stream.first_hour = usize::from(snapshot.first_hour).min(HOURS_PER_DAY - 1);
        stream.last_hour = usize::from(snapshot.last_hour).min(HOURS_PER_DAY - 1);

        let Some(start) = snapshot.start else {
            return Ok((stream, warnings));
        };
        for (i, snap) in snapshot.days.iter().enumerate() {
            let mut day = DayRecord::new(start + chrono::Duration::days(i as i64));
            day.mode = snap.mode;
            day.origin_file = snap.origin_file;
            day.summary = snap.summary;
            if let Some(hours) = &snap.hours {
                copy_channel(&mut day.hourly_temp, &hours.temp);
                copy_channel(&mut day.hourly_dewpt, &hours.dewpt);
                copy_channel(&mut day.hourly_rh, &hours.rh);
                copy_channel(&mut day.hourly_ws, &hours.ws);
                if let Some(gust) = &hours.gust {
                    copy_channel(&mut day.hourly_gust, gust);
                }
                copy_channel(&mut day.hourly_wd, &hours.wd);
                copy_channel(&mut day.hourly_precip, &hours.precip);
                for (dst, src) in day.hflags.iter_mut().zip(hours.flags.iter()) {
                    *dst = *src;
                }
                if hours.gust.is_none() {
                    for f in &mut day.hflags {
                        f.gust_specified = false;
                    }
                }
            }
            day.fwi.spec_day = snap.spec_day;
            for (dst, src) in day.fwi.spec_hr.iter_mut().zip(snap.spec_hr.iter()) {
                *dst = *src;
            }
            stream.days.push(day);
        }
        stream.invalidate();
        Ok((stream, warnings))
    }
}

fn copy_channel(dst: &mut [f64; HOURS_PER_DAY], src: &[f64]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d = *s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_bits_roundtrip() {
        for policy in [FfmcPolicy::VanWagner, FfmcPolicy::Hybrid, FfmcPolicy::Lawson] {
            for spec in [false, true] {
                let o = StreamOptions {
                    ffmc_policy: policy,
                    use_specified_fwi: spec,
                };
                assert_eq!(unpack_options(pack_options(o)), o);
            }
        }
    }

    #[test]
    fn zero_policy_bits_default_to_van_wagner() {
        assert_eq!(unpack_options(0).ffmc_policy, FfmcPolicy::VanWagner);
    }

    #[test]
    fn version_below_baseline_is_hard_failure() {
        let snap = StreamSnapshot {
            version: 0,
            location: Location::default(),
            start: None,
            options_bits: 1,
            starting: StartingCodes::default(),
            curve: None,
            first_hour: 0,
            last_hour: 23,
            days: vec![],
        };
        assert!(matches!(
            WeatherStream::restore(&snap),
            Err(StreamError::UnsupportedVersion { version: 0, .. })
        ));
    }

    #[test]
    fn newer_snapshot_is_rejected() {
        let snap = StreamSnapshot {
            version: SNAPSHOT_VERSION + 1,
            location: Location::default(),
            start: None,
            options_bits: 1,
            starting: StartingCodes::default(),
            curve: None,
            first_hour: 0,
            last_hour: 23,
            days: vec![],
        };
        assert!(WeatherStream::restore(&snap).is_err());
    }

    #[test]
    fn old_version_defaults_with_warnings() {
        let snap = StreamSnapshot {
            version: 1,
            location: Location::default(),
            start: None,
            options_bits: 0x3 | 0x4,
            starting: StartingCodes::default(),
            curve: None,
            first_hour: 0,
            last_hour: 23,
            days: vec![],
        };
        let (stream, warnings) = WeatherStream::restore(&snap).unwrap();
        assert_eq!(warnings.len(), FIELD_GATES.len());
        assert_eq!(stream.options().ffmc_policy, FfmcPolicy::Lawson);
        assert!(stream.options().use_specified_fwi);
        assert_eq!(stream.curve_params(), CurveParams::default());
    }
}
