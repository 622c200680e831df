//! One calendar day of the timeline: raw weather channels, per-hour flags,
//! daily aggregates, and the paired specified/calculated FWI record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core_types::location::SunTimes;
use crate::core_types::HOURS_PER_DAY;

/// How a day's weather is represented. The two modes are exclusive: hourly
/// writes are rejected on a daily-summary day and vice versa, unless the
/// mode is switched explicitly first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayMode {
    /// Only min/max/mean aggregates are known; hourly detail is synthesized.
    DailySummary,
    /// All populated hours carry observed values.
    Hourly,
}

/// Per-hour diagnostic flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourFlags {
    /// A wind gust was supplied for this hour.
    pub gust_specified: bool,
    /// A dew point was supplied rather than derived.
    pub dewpoint_specified: bool,
    /// The hour was filled by gap interpolation during import.
    pub interpolated: bool,
    /// The hour's values were out of range and kept/clamped during import.
    pub corrected: bool,
}

/// Daily aggregate values, authoritative in `DailySummary` mode and cached
/// from the hourly channels otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySummaryValues {
    pub min_temp: f64,
    pub max_temp: f64,
    pub min_ws: f64,
    pub max_ws: f64,
    #[serde(default)]
    pub min_gust: Option<f64>,
    #[serde(default)]
    pub max_gust: Option<f64>,
    /// Mean relative humidity as a fraction in `[0, 1]`.
    pub mean_rh: f64,
    /// Total precipitation, mm.
    pub precip: f64,
    /// Mean wind direction, Cartesian radians.
    pub mean_wd: f64,
}

/// Daily-granularity FWI values. `None` means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyFwi {
    pub ffmc: Option<f64>,
    pub dmc: Option<f64>,
    pub dc: Option<f64>,
    pub bui: Option<f64>,
    pub isi: Option<f64>,
    pub fwi: Option<f64>,
}

/// Hourly-granularity FWI values. `None` means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyFwi {
    pub ffmc: Option<f64>,
    pub isi: Option<f64>,
    pub fwi: Option<f64>,
}

/// Specified (user override) and calculated FWI values for one day.
///
/// `calculated` is a pure function of the specified values, the raw weather,
/// the neighbouring days' calculated values, and the stream options; it is
/// cache, never independent state.
#[derive(Debug, Clone, PartialEq)]
pub struct FwiRecord {
    pub spec_day: DailyFwi,
    pub calc_day: DailyFwi,
    pub spec_hr: [HourlyFwi; HOURS_PER_DAY],
    pub calc_hr: [HourlyFwi; HOURS_PER_DAY],
}

impl Default for FwiRecord {
    fn default() -> Self {
        FwiRecord {
            spec_day: DailyFwi::default(),
            calc_day: DailyFwi::default(),
            spec_hr: [HourlyFwi::default(); HOURS_PER_DAY],
            calc_hr: [HourlyFwi::default(); HOURS_PER_DAY],
        }
    }
}

impl FwiRecord {
    /// Whether any daily or hourly override is present.
    pub fn any_specified(&self) -> bool {
        let d = &self.spec_day;
        if d.ffmc.is_some() || d.dmc.is_some() || d.dc.is_some() || d.bui.is_some() {
            return true;
        }
        self.spec_hr
            .iter()
            .any(|h| h.ffmc.is_some() || h.isi.is_some() || h.fwi.is_some())
    }
}

/// The populated hour range of a day within the stream (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourSpan {
    pub first: usize,
    pub last: usize,
}

impl HourSpan {
    pub const FULL: HourSpan = HourSpan { first: 0, last: 23 };
}

/// One observed (or synthesized) hour of weather.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyReading {
    /// Air temperature, °C.
    pub temp: f64,
    /// Relative humidity as a fraction in `[0, 1]`.
    pub rh: f64,
    /// Precipitation over the hour, mm.
    pub precip: f64,
    /// Wind speed, km/h.
    pub ws: f64,
    /// Wind gust, km/h, when observed.
    pub gust: Option<f64>,
    /// Wind direction, Cartesian radians.
    pub wd: f64,
    /// Dew point, °C, when observed; derived from temp/RH otherwise.
    pub dew: Option<f64>,
}

/// One calendar day of the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    /// Local midnight opening this day.
    pub day_start: NaiveDateTime,
    pub mode: DayMode,
    /// Values came from an imported file rather than programmatic writes.
    pub origin_file: bool,
    /// Solar events, resolved during calculation.
    pub sun: SunTimes,

    pub(crate) hourly_temp: [f64; HOURS_PER_DAY],
    pub(crate) hourly_dewpt: [f64; HOURS_PER_DAY],
    pub(crate) hourly_rh: [f64; HOURS_PER_DAY],
    pub(crate) hourly_ws: [f64; HOURS_PER_DAY],
    pub(crate) hourly_gust: [f64; HOURS_PER_DAY],
    pub(crate) hourly_wd: [f64; HOURS_PER_DAY],
    pub(crate) hourly_precip: [f64; HOURS_PER_DAY],
    pub(crate) hflags: [HourFlags; HOURS_PER_DAY],

    pub(crate) summary: DailySummaryValues,
    pub fwi: FwiRecord,

    /// Synthesized temperature at sunset, cached for the next day's
    /// overnight segment.
    pub(crate) synth_sunset_temp: f64,
}

impl DayRecord {
    pub fn new(day_start: NaiveDateTime) -> Self {
        DayRecord {
            day_start,
            mode: DayMode::DailySummary,
            origin_file: false,
            sun: SunTimes::default(),
            hourly_temp: [0.0; HOURS_PER_DAY],
            hourly_dewpt: [0.0; HOURS_PER_DAY],
            hourly_rh: [0.0; HOURS_PER_DAY],
            hourly_ws: [0.0; HOURS_PER_DAY],
            hourly_gust: [0.0; HOURS_PER_DAY],
            hourly_wd: [0.0; HOURS_PER_DAY],
            hourly_precip: [0.0; HOURS_PER_DAY],
            hflags: [HourFlags::default(); HOURS_PER_DAY],
            summary: DailySummaryValues::default(),
            fwi: FwiRecord::default(),
            synth_sunset_temp: 0.0,
        }
    }

    /// Weather values for one hour of the day.
    pub fn hourly_weather(&self, hour: usize) -> HourlyReading {
        let hour = hour.min(HOURS_PER_DAY - 1);
        HourlyReading {
            temp: self.hourly_temp[hour],
            rh: self.hourly_rh[hour],
            precip: self.hourly_precip[hour],
            ws: self.hourly_ws[hour],
            gust: self.hflags[hour]
                .gust_specified
                .then(|| self.hourly_gust[hour]),
            wd: self.hourly_wd[hour],
            dew: Some(self.hourly_dewpt[hour]),
        }
    }

    /// Store one hour of observed weather. Fails when the day is in
    /// daily-summary mode.
    pub fn set_hourly_weather(&mut self, hour: usize, reading: HourlyReading) -> bool {
        if self.mode != DayMode::Hourly || hour >= HOURS_PER_DAY {
            return false;
        }
        self.hourly_temp[hour] = reading.temp;
        self.hourly_rh[hour] = reading.rh;
        self.hourly_precip[hour] = reading.precip;
        self.hourly_ws[hour] = reading.ws;
        match reading.gust {
            Some(g) if g >= 0.0 => {
                self.hourly_gust[hour] = g;
                self.hflags[hour].gust_specified = true;
            }
            _ => self.hflags[hour].gust_specified = false,
        }
        self.hourly_wd[hour] = reading.wd;
        match reading.dew {
            Some(d) => {
                self.hourly_dewpt[hour] = d;
                self.hflags[hour].dewpoint_specified = true;
            }
            None => self.hflags[hour].dewpoint_specified = false,
        }
        true
    }

    /// Store the daily aggregates. Fails when the day is hourly-specified.
    pub fn set_daily_weather(&mut self, summary: DailySummaryValues) -> bool {
        if self.mode != DayMode::DailySummary {
            return false;
        }
        self.summary = summary;
        true
    }

    pub fn hour_flags(&self, hour: usize) -> HourFlags {
        self.hflags[hour.min(HOURS_PER_DAY - 1)]
    }

    /// Any hour of this day was corrected during import.
    pub fn has_any_corrected(&self) -> bool {
        self.hflags.iter().any(|f| f.corrected)
    }

    fn fold_hours(&self, span: HourSpan, values: &[f64; HOURS_PER_DAY], min: bool) -> f64 {
        let last = span.last.min(HOURS_PER_DAY - 1);
        let mut acc = values[span.first.min(last)];
        for &v in &values[span.first.min(last)..=last] {
            if (min && v < acc) || (!min && v > acc) {
                acc = v;
            }
        }
        acc
    }

    pub fn daily_min_temp(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.min_temp,
            DayMode::Hourly => self.fold_hours(span, &self.hourly_temp, true),
        }
    }

    pub fn daily_max_temp(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.max_temp,
            DayMode::Hourly => self.fold_hours(span, &self.hourly_temp, false),
        }
    }

    pub fn daily_mean_temp(&self, span: HourSpan) -> f64 {
        let last = span.last.min(HOURS_PER_DAY - 1);
        let first = span.first.min(last);
        let sum: f64 = self.hourly_temp[first..=last].iter().sum();
        sum / ((last - first + 1) as f64)
    }

    pub fn daily_min_ws(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.min_ws,
            DayMode::Hourly => self.fold_hours(span, &self.hourly_ws, true),
        }
    }

    pub fn daily_max_ws(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.max_ws,
            DayMode::Hourly => self.fold_hours(span, &self.hourly_ws, false),
        }
    }

    pub fn daily_min_gust(&self, span: HourSpan) -> Option<f64> {
        match self.mode {
            DayMode::DailySummary => self.summary.min_gust,
            DayMode::Hourly => self
                .hflags
                .iter()
                .any(|f| f.gust_specified)
                .then(|| self.fold_hours(span, &self.hourly_gust, true)),
        }
    }

    pub fn daily_max_gust(&self, span: HourSpan) -> Option<f64> {
        match self.mode {
            DayMode::DailySummary => self.summary.max_gust,
            DayMode::Hourly => self
                .hflags
                .iter()
                .any(|f| f.gust_specified)
                .then(|| self.fold_hours(span, &self.hourly_gust, false)),
        }
    }

    /// Minimum RH over the day, as a fraction. Daily-summary days report
    /// their stored mean.
    pub fn daily_min_rh(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.mean_rh,
            DayMode::Hourly => self.fold_hours(span, &self.hourly_rh, true),
        }
    }

    pub fn daily_mean_rh(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.mean_rh,
            DayMode::Hourly => {
                let last = span.last.min(HOURS_PER_DAY - 1);
                let first = span.first.min(last);
                let sum: f64 = self.hourly_rh[first..=last].iter().sum();
                sum / ((last - first + 1) as f64)
            }
        }
    }

    /// Representative wind direction: the stored mean for daily-summary
    /// days, the midday observation for hourly days.
    pub fn daily_wd(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.mean_wd,
            DayMode::Hourly => self.hourly_wd[12.min(span.last)],
        }
    }

    /// Total precipitation recorded on this calendar day's populated hours.
    /// The noon-to-noon accounting used by the FWI chain lives at the
    /// stream level, which can see neighbouring days.
    pub fn calendar_precip(&self, span: HourSpan) -> f64 {
        match self.mode {
            DayMode::DailySummary => self.summary.precip,
            DayMode::Hourly => {
                let last = span.last.min(HOURS_PER_DAY - 1);
                self.hourly_precip[span.first.min(last)..=last].iter().sum()
            }
        }
    }

    /// Cache aggregates from the hourly channels so neighbouring days can
    /// read them uniformly during synthesis.
    pub(crate) fn cache_daily_from_hourly(&mut self, span: HourSpan) {
        if self.mode != DayMode::Hourly {
            return;
        }
        self.summary = DailySummaryValues {
            min_temp: self.daily_min_temp(span),
            max_temp: self.daily_max_temp(span),
            min_ws: self.daily_min_ws(span),
            max_ws: self.daily_max_ws(span),
            min_gust: self.daily_min_gust(span),
            max_gust: self.daily_max_gust(span),
            mean_rh: self.daily_min_rh(span),
            precip: self.calendar_precip(span),
            mean_wd: self.daily_wd(span),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day() -> DayRecord {
        let start = NaiveDate::from_ymd_opt(2023, 7, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        DayRecord::new(start)
    }

    #[test]
    fn mode_is_exclusive() {
        let mut d = day();
        let reading = HourlyReading {
            temp: 20.0,
            rh: 0.5,
            precip: 0.0,
            ws: 10.0,
            gust: None,
            wd: 0.0,
            dew: None,
        };
        assert!(!d.set_hourly_weather(10, reading), "daily day rejects hourly write");
        d.mode = DayMode::Hourly;
        assert!(d.set_hourly_weather(10, reading));
        assert!(!d.set_daily_weather(DailySummaryValues::default()));
    }

    #[test]
    fn aggregates_respect_hour_span() {
        let mut d = day();
        d.mode = DayMode::Hourly;
        for h in 0..24 {
            d.hourly_temp[h] = h as f64;
        }
        let span = HourSpan { first: 6, last: 18 };
        assert_eq!(d.daily_min_temp(span), 6.0);
        assert_eq!(d.daily_max_temp(span), 18.0);
    }

    #[test]
    fn gust_absent_until_specified() {
        let mut d = day();
        d.mode = DayMode::Hourly;
        assert_eq!(d.daily_max_gust(HourSpan::FULL), None);
        let reading = HourlyReading {
            temp: 20.0,
            rh: 0.5,
            precip: 0.0,
            ws: 10.0,
            gust: Some(35.0),
            wd: 0.0,
            dew: None,
        };
        assert!(d.set_hourly_weather(14, reading));
        assert_eq!(d.daily_max_gust(HourSpan::FULL), Some(35.0));
    }

    #[test]
    fn any_specified_sees_hourly_overrides() {
        let mut d = day();
        assert!(!d.fwi.any_specified());
        d.fwi.spec_hr[9].ffmc = Some(88.0);
        assert!(d.fwi.any_specified());
    }
}
