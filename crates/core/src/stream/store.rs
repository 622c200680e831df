//! The timeline store: contiguous day records anchored at a start instant,
//! with a single global dirty flag guarding all derived values.
//!
//! Days live in a `Vec`; "yesterday exists" is simply `index > 0`, which
//! keeps append and truncation O(1) and removes the pointer-chasing of a
//! linked day chain.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use tracing::{debug, warn};

use crate::core_types::{CurveParams, Location, StartingCodes, StreamOptions, HOURS_PER_DAY};
use crate::diurnal;
use crate::fwi::{chain, equations};
use crate::stream::day::{DailySummaryValues, DayMode, DayRecord, HourSpan, HourlyReading};

/// Warning bits for days whose solar events could not be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SunWarnings {
    pub no_sunrise: bool,
    pub no_sunset: bool,
}

/// A per-station weather timeline and its derived FWI values.
///
/// All raw mutation is immediate; every derived value is computed lazily by
/// [`WeatherStream::ensure_calculated`] behind one stream-wide valid flag.
/// Accessors that may trigger recomputation therefore take `&mut self`.
#[derive(Debug, Clone)]
pub struct WeatherStream {
    pub(crate) location: Location,
    /// Local midnight of the first day; `None` while the stream is empty.
    pub(crate) start: Option<NaiveDateTime>,
    pub(crate) days: Vec<DayRecord>,
    pub(crate) options: StreamOptions,
    pub(crate) starting: StartingCodes,
    pub(crate) curve: CurveParams,
    /// First populated hour of the first day (hourly streams).
    pub(crate) first_hour: usize,
    /// Last populated hour of the last day (hourly streams).
    pub(crate) last_hour: usize,
    pub(crate) calculated_valid: bool,
}

impl Default for WeatherStream {
    fn default() -> Self {
        Self::new(Location::default())
    }
}

impl WeatherStream {
    pub fn new(location: Location) -> Self {
        WeatherStream {
            location,
            start: None,
            days: Vec::new(),
            options: StreamOptions::default(),
            starting: StartingCodes::default(),
            curve: CurveParams::default(),
            first_hour: 0,
            last_hour: 23,
            calculated_valid: false,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Replace the location. Invalidates every cached index.
    pub fn set_location(&mut self, location: Location) {
        if self.location != location {
            self.location = location;
            self.invalidate();
        }
    }

    pub fn options(&self) -> StreamOptions {
        self.options
    }

    pub fn set_options(&mut self, options: StreamOptions) {
        if self.options != options {
            self.options = options;
            self.invalidate();
        }
    }

    pub fn starting_codes(&self) -> &StartingCodes {
        &self.starting
    }

    /// Replace the pre-stream seed values. Out-of-range index values are
    /// silently ignored field by field, leaving the previous value.
    pub fn set_starting_codes(&mut self, codes: StartingCodes) {
        let prev = self.starting.clone();
        let valid_or = |v: Option<f64>, max: f64, keep: Option<f64>| match v {
            Some(x) if (0.0..=max).contains(&x) => Some(x),
            None => None,
            _ => keep,
        };
        self.starting = StartingCodes {
            ffmc: valid_or(codes.ffmc, 101.0, prev.ffmc),
            dmc: valid_or(codes.dmc, 500.0, prev.dmc),
            dc: valid_or(codes.dc, 1500.0, prev.dc),
            bui: valid_or(codes.bui, f64::INFINITY, prev.bui),
            rain: if codes.rain >= 0.0 { codes.rain } else { prev.rain },
            hffmc: if (0.0..=101.0).contains(&codes.hffmc) {
                codes.hffmc
            } else {
                prev.hffmc
            },
            hffmc_time_secs: codes.hffmc_time_secs,
        };
        if self.starting != prev {
            self.invalidate();
        }
    }

    pub fn curve_params(&self) -> CurveParams {
        self.curve
    }

    pub fn set_curve_params(&mut self, curve: CurveParams) {
        if self.curve != curve {
            self.curve = curve;
            self.invalidate();
        }
    }

    pub fn num_days(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Local midnight of the first day.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start
    }

    /// Last second of the last day.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        let start = self.start?;
        if self.days.is_empty() {
            return None;
        }
        Some(start + Duration::days(self.days.len() as i64) - Duration::seconds(1))
    }

    /// Mark every derived value stale. O(1); the next read recomputes.
    pub fn invalidate(&mut self) {
        self.calculated_valid = false;
    }

    /// Remove all day records; seeds, options and location survive.
    pub fn clear(&mut self) {
        self.days.clear();
        self.start = None;
        self.first_hour = 0;
        self.last_hour = 23;
        self.invalidate();
    }

    pub(crate) fn midnight_of(time: NaiveDateTime) -> NaiveDateTime {
        time.date().and_time(NaiveTime::MIN)
    }

    /// Index of the day containing `time`, if it is inside the timeline.
    pub(crate) fn day_index(&self, time: NaiveDateTime) -> Option<usize> {
        let start = self.start?;
        let offset = (Self::midnight_of(time) - start).num_days();
        if offset < 0 {
            return None;
        }
        let idx = offset as usize;
        (idx < self.days.len()).then_some(idx)
    }

    /// Whether `time` falls before the timeline start.
    pub(crate) fn precedes_start(&self, time: NaiveDateTime) -> bool {
        match self.start {
            Some(start) => time < start,
            None => false,
        }
    }

    /// Index of the day containing `time`, creating it when permitted.
    ///
    /// A day is only ever created at the end of the timeline: exactly one
    /// day past the last existing day (which must be complete), or as the
    /// first day of an empty stream.
    pub(crate) fn day_index_or_create(
        &mut self,
        time: NaiveDateTime,
        allow_create: bool,
    ) -> Option<usize> {
        if self.days.is_empty() {
            if !allow_create {
                return None;
            }
            let midnight = Self::midnight_of(time);
            self.start = Some(midnight);
            self.days.push(DayRecord::new(midnight));
            self.invalidate();
            return Some(0);
        }
        let start = self.start?;
        let offset = (Self::midnight_of(time) - start).num_days();
        if offset < 0 {
            return None;
        }
        let idx = offset as usize;
        if idx < self.days.len() {
            return Some(idx);
        }
        if !allow_create || self.last_hour != 23 || idx != self.days.len() {
            return None;
        }
        let day_start = start + Duration::days(idx as i64);
        self.days.push(DayRecord::new(day_start));
        self.invalidate();
        Some(idx)
    }

    /// Populated hour range of the day at `idx`, given the working length
    /// of the day list (which may include the synthesis ghost day).
    pub(crate) fn hour_span_at(&self, idx: usize, len: usize) -> HourSpan {
        HourSpan {
            first: if idx == 0 { self.first_hour } else { 0 },
            last: if idx + 1 == len { self.last_hour } else { 23 },
        }
    }

    /// First populated hour of the day containing `time`; `None` before the
    /// timeline start.
    pub fn first_hour_of_day(&self, time: NaiveDateTime) -> Option<usize> {
        if self.precedes_start(time) {
            return None;
        }
        let start = self.start?;
        if Self::midnight_of(time) == start {
            Some(self.first_hour)
        } else {
            Some(0)
        }
    }

    /// Last populated hour of the day containing `time`; `None` past the
    /// timeline end.
    pub fn last_hour_of_day(&self, time: NaiveDateTime) -> Option<usize> {
        let end = self.end_time()?;
        let day = Self::midnight_of(time);
        if day > Self::midnight_of(end) {
            return None;
        }
        if day == Self::midnight_of(end) {
            Some(self.last_hour)
        } else {
            Some(23)
        }
    }

    /// Grow or shrink the timeline to end on the day containing `new_end`.
    /// Growth duplicates the last day's daily-summary values forward.
    pub fn set_end_time(&mut self, new_end: NaiveDateTime) {
        let Some(start) = self.start else { return };
        if self.days.is_empty() {
            return;
        }
        let target = (Self::midnight_of(new_end) - start).num_days();
        if target < 0 {
            return;
        }
        let target_days = target as usize + 1;
        let current = self.days.len();
        if target_days > current {
            let template = self.days[current - 1].summary;
            for i in current..target_days {
                let day_start = start + Duration::days(i as i64);
                let mut day = DayRecord::new(day_start);
                day.summary = template;
                self.days.push(day);
            }
            self.invalidate();
        } else if target_days < current {
            self.truncate_from_end(current - target_days);
        }
    }

    /// Remove the last `n` days.
    pub fn truncate_from_end(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let keep = self.days.len().saturating_sub(n);
        self.days.truncate(keep);
        if self.days.is_empty() {
            self.start = None;
            self.first_hour = 0;
        }
        self.last_hour = 23;
        self.invalidate();
    }

    /// Switch the day containing `time` to hourly observations (creating it
    /// when allowed).
    pub fn make_hourly_observations(&mut self, time: NaiveDateTime) -> bool {
        let Some(idx) = self.day_index_or_create(time, true) else {
            return false;
        };
        if self.days[idx].mode != DayMode::Hourly {
            self.days[idx].mode = DayMode::Hourly;
            self.invalidate();
        }
        true
    }

    /// Switch the day containing `time` to daily-summary observations.
    pub fn make_daily_observations(&mut self, time: NaiveDateTime) -> bool {
        let Some(idx) = self.day_index_or_create(time, true) else {
            return false;
        };
        if self.days[idx].mode != DayMode::DailySummary {
            self.days[idx].mode = DayMode::DailySummary;
            self.invalidate();
        }
        true
    }

    /// Whether the day containing `time` is hourly-specified.
    pub fn is_hourly_observations(&self, time: NaiveDateTime) -> Option<bool> {
        self.day_index(time).map(|i| self.days[i].mode == DayMode::Hourly)
    }

    /// Whether the day containing `time` came from an imported file.
    pub fn is_origin_file(&self, time: NaiveDateTime) -> Option<bool> {
        self.day_index(time).map(|i| self.days[i].origin_file)
    }

    /// Daily aggregate weather for the day containing `time`. Triggers
    /// calculation so hourly-specified days report derived aggregates.
    pub fn daily_weather(&mut self, time: NaiveDateTime) -> Option<DailySummaryValues> {
        let idx = self.day_index(time)?;
        self.ensure_calculated();
        let span = self.hour_span_at(idx, self.days.len());
        let d = &self.days[idx];
        Some(DailySummaryValues {
            min_temp: d.daily_min_temp(span),
            max_temp: d.daily_max_temp(span),
            min_ws: d.daily_min_ws(span),
            max_ws: d.daily_max_ws(span),
            min_gust: d.daily_min_gust(span),
            max_gust: d.daily_max_gust(span),
            mean_rh: d.daily_min_rh(span),
            precip: self.noon_window_precip(idx),
            mean_wd: self.days[idx].daily_wd(span),
        })
    }

    /// Store daily aggregates for the day containing `time`, creating the
    /// day when it extends the timeline. Fails on hourly-specified days.
    pub fn set_daily_weather(&mut self, time: NaiveDateTime, summary: DailySummaryValues) -> bool {
        let Some(idx) = self.day_index_or_create(time, true) else {
            return false;
        };
        let day = &mut self.days[idx];
        if day.mode != DayMode::DailySummary {
            return false;
        }
        if day.summary != summary {
            // A raw-weather edit retires any file-loaded FWI overrides.
            self.options.use_specified_fwi = false;
        }
        day.summary = summary;
        if idx + 1 == self.days.len() {
            // A daily-summary day is complete by definition.
            self.last_hour = 23;
        }
        self.invalidate();
        true
    }

    /// Weather for the hour containing `time`. Triggers calculation.
    pub fn hourly_weather(&mut self, time: NaiveDateTime) -> Option<HourlyReading> {
        let idx = self.day_index(time)?;
        self.ensure_calculated();
        Some(self.days[idx].hourly_weather(time.hour() as usize))
    }

    /// Store one hour of observed weather, creating the day when it extends
    /// the timeline. Fails on daily-summary days and for hours more than
    /// one past the current end.
    pub fn set_hourly_weather(&mut self, time: NaiveDateTime, reading: HourlyReading) -> bool {
        let Some(idx) = self.day_index_or_create(time, true) else {
            return false;
        };
        if self.days[idx].mode != DayMode::Hourly {
            return false;
        }
        let Some(start) = self.start else { return false };
        let end_instant = start
            + Duration::days(self.days.len() as i64 - 1)
            + Duration::hours(self.last_hour as i64);
        let diff_hours = (time - end_instant).num_hours();
        if diff_hours > 1 {
            return false;
        }
        if diff_hours == 1 {
            self.last_hour = (self.last_hour + 1) % HOURS_PER_DAY;
        }
        let hour = time.hour() as usize;
        let before = self.days[idx].hourly_weather(hour);
        if !self.days[idx].set_hourly_weather(hour, reading) {
            return false;
        }
        if before != self.days[idx].hourly_weather(hour) {
            self.options.use_specified_fwi = false;
        }
        self.days[idx].hflags[hour].interpolated = false;
        self.days[idx].hflags[hour].corrected = false;
        self.invalidate();
        true
    }

    /// Rain recorded for the hour containing `time`; 0 outside the stream.
    pub fn hourly_rain(&self, time: NaiveDateTime) -> f64 {
        match self.day_index(time) {
            Some(idx) => self.days[idx].hourly_precip[time.hour() as usize],
            None => 0.0,
        }
    }

    /// 24-hour precipitation total ending at solar-mean noon of day `idx`,
    /// the rain input of the daily FWI codes. The first day folds in the
    /// pre-stream rain accumulation.
    pub(crate) fn noon_window_precip(&self, idx: usize) -> f64 {
        let day = &self.days[idx];
        if day.mode == DayMode::DailySummary {
            return day.summary.precip;
        }
        let date = day.day_start.date();
        let mut noon = self.location.noon_local(date);
        if let Some(end) = self.end_time_of_hours() {
            if noon > end {
                noon = end;
            }
        }
        let begin = self.start_time_of_hours();

        if idx == 0 {
            let mut rain = self.starting.rain;
            let mut loop_t = day.day_start;
            if let Some(b) = begin {
                if loop_t < b {
                    loop_t = b;
                }
            }
            while loop_t <= noon {
                rain += self.hourly_rain(loop_t);
                loop_t += Duration::hours(1);
            }
            rain
        } else {
            let mut rain = 0.0;
            let mut loop_t = noon - Duration::hours(23);
            if let Some(b) = begin {
                if loop_t < b {
                    loop_t = b;
                }
            }
            while loop_t <= noon {
                rain += self.hourly_rain(loop_t);
                loop_t += Duration::hours(1);
            }
            rain
        }
    }

    /// First populated hour instant of the stream.
    pub(crate) fn start_time_of_hours(&self) -> Option<NaiveDateTime> {
        self.start
            .map(|s| s + Duration::hours(self.first_hour as i64))
    }

    /// Last populated hour instant of the stream.
    pub(crate) fn end_time_of_hours(&self) -> Option<NaiveDateTime> {
        let start = self.start?;
        if self.days.is_empty() {
            return None;
        }
        Some(
            start
                + Duration::days(self.days.len() as i64 - 1)
                + Duration::hours(self.last_hour as i64),
        )
    }

    /// Index of the "fire day" owning `time`: daily codes change at solar
    /// noon, so the day boundary for daily values sits twelve (standard
    /// time) hours back.
    pub(crate) fn fire_day_index(&self, time: NaiveDateTime) -> Option<usize> {
        let shifted =
            time - Duration::hours(12) - Duration::seconds(self.location.lst_shift_secs(time.date()));
        self.day_index(Self::midnight_of(shifted))
    }

    fn fire_day_precedes_start(&self, time: NaiveDateTime) -> bool {
        let shifted =
            time - Duration::hours(12) - Duration::seconds(self.location.lst_shift_secs(time.date()));
        self.precedes_start(shifted)
    }

    /// Daily FFMC in effect at `time`, with whether it was specified.
    /// Before the first fire day this is the starting code.
    pub fn daily_ffmc(&mut self, time: NaiveDateTime) -> Option<(f64, bool)> {
        if let Some(idx) = self.fire_day_index(time) {
            self.ensure_calculated();
            let d = &self.days[idx];
            return d.fwi.calc_day.ffmc.map(|v| (v, d.fwi.spec_day.ffmc.is_some()));
        }
        if self.fire_day_precedes_start(time) {
            return self.starting.ffmc.map(|v| (v, true));
        }
        None
    }

    /// DC in effect at `time`; see [`WeatherStream::daily_ffmc`].
    pub fn dc(&mut self, time: NaiveDateTime) -> Option<(f64, bool)> {
        if let Some(idx) = self.fire_day_index(time) {
            self.ensure_calculated();
            let d = &self.days[idx];
            return d.fwi.calc_day.dc.map(|v| (v, d.fwi.spec_day.dc.is_some()));
        }
        if self.fire_day_precedes_start(time) {
            return self.starting.dc.map(|v| (v, true));
        }
        None
    }

    /// DMC in effect at `time`; see [`WeatherStream::daily_ffmc`].
    pub fn dmc(&mut self, time: NaiveDateTime) -> Option<(f64, bool)> {
        if let Some(idx) = self.fire_day_index(time) {
            self.ensure_calculated();
            let d = &self.days[idx];
            return d.fwi.calc_day.dmc.map(|v| (v, d.fwi.spec_day.dmc.is_some()));
        }
        if self.fire_day_precedes_start(time) {
            return self.starting.dmc.map(|v| (v, true));
        }
        None
    }

    /// BUI in effect at `time`; derived from the seed DC/DMC before the
    /// first fire day when no override exists.
    pub fn bui(&mut self, time: NaiveDateTime) -> Option<(f64, bool)> {
        if let Some(idx) = self.fire_day_index(time) {
            self.ensure_calculated();
            let d = &self.days[idx];
            return d.fwi.calc_day.bui.map(|v| (v, d.fwi.spec_day.bui.is_some()));
        }
        if self.fire_day_precedes_start(time) {
            if let Some(bui) = self.starting.bui {
                return Some((bui, true));
            }
            if let (Some(dc), Some(dmc)) = (self.starting.dc, self.starting.dmc) {
                return Some((equations::buildup_index(dc, dmc), false));
            }
        }
        None
    }

    /// Daily ISI for the fire day owning `time`.
    pub fn daily_isi(&mut self, time: NaiveDateTime) -> Option<f64> {
        let idx = self.fire_day_index(time)?;
        self.ensure_calculated();
        self.days[idx].fwi.calc_day.isi
    }

    /// Daily FWI for the fire day owning `time`.
    pub fn daily_fwi(&mut self, time: NaiveDateTime) -> Option<f64> {
        let idx = self.fire_day_index(time)?;
        self.ensure_calculated();
        self.days[idx].fwi.calc_day.fwi
    }

    /// Hourly FFMC at `time`. Before the stream start this falls back to
    /// the seed hourly FFMC when no seed hour was pinned.
    pub fn hourly_ffmc(&mut self, time: NaiveDateTime) -> Option<f64> {
        if let Some(idx) = self.day_index(time) {
            self.ensure_calculated();
            return self.days[idx].fwi.calc_hr[time.hour() as usize].ffmc;
        }
        if self.precedes_start(time) && self.starting.hffmc_time_secs.is_none() {
            return Some(self.starting.hffmc);
        }
        None
    }

    /// Whether the hourly FFMC at `time` is a user override.
    pub fn is_hourly_ffmc_specified(&self, time: NaiveDateTime) -> bool {
        self.day_index(time)
            .is_some_and(|idx| self.days[idx].fwi.spec_hr[time.hour() as usize].ffmc.is_some())
    }

    pub fn hourly_isi(&mut self, time: NaiveDateTime) -> Option<f64> {
        let idx = self.day_index(time)?;
        self.ensure_calculated();
        self.days[idx].fwi.calc_hr[time.hour() as usize].isi
    }

    pub fn hourly_fwi(&mut self, time: NaiveDateTime) -> Option<f64> {
        let idx = self.day_index(time)?;
        self.ensure_calculated();
        self.days[idx].fwi.calc_hr[time.hour() as usize].fwi
    }

    fn set_spec_day_value(
        &mut self,
        time: NaiveDateTime,
        value: Option<f64>,
        max: f64,
        pick: fn(&mut DayRecord) -> &mut Option<f64>,
    ) {
        if let Some(v) = value {
            if !(0.0..=max).contains(&v) {
                // Out-of-range index writes are ignored, not errors.
                return;
            }
        }
        if let Some(idx) = self.day_index(time) {
            *pick(&mut self.days[idx]) = value;
            self.invalidate();
        }
    }

    /// Override the daily FFMC of the fire day owning `time`. Values
    /// outside `[0, 101]` are ignored.
    pub fn set_specified_daily_ffmc(&mut self, time: NaiveDateTime, value: Option<f64>) {
        self.set_spec_day_value(time, value, 101.0, |d| &mut d.fwi.spec_day.ffmc);
    }

    /// Override the DMC; values outside `[0, 500]` are ignored.
    pub fn set_specified_dmc(&mut self, time: NaiveDateTime, value: Option<f64>) {
        self.set_spec_day_value(time, value, 500.0, |d| &mut d.fwi.spec_day.dmc);
    }

    /// Override the DC; values outside `[0, 1500]` are ignored.
    pub fn set_specified_dc(&mut self, time: NaiveDateTime, value: Option<f64>) {
        self.set_spec_day_value(time, value, 1500.0, |d| &mut d.fwi.spec_day.dc);
    }

    /// Override the BUI; negative values are ignored.
    pub fn set_specified_bui(&mut self, time: NaiveDateTime, value: Option<f64>) {
        self.set_spec_day_value(time, value, f64::INFINITY, |d| &mut d.fwi.spec_day.bui);
    }

    /// Override the hourly FFMC for the hour containing `time`; values
    /// outside `[0, 101]` are ignored.
    pub fn set_specified_hourly_ffmc(&mut self, time: NaiveDateTime, value: Option<f64>) {
        if let Some(v) = value {
            if !(0.0..=101.0).contains(&v) {
                return;
            }
        }
        if let Some(idx) = self.day_index(time) {
            self.days[idx].fwi.spec_hr[time.hour() as usize].ffmc = value;
            self.invalidate();
        }
    }

    /// Override the hourly ISI; negative values are ignored.
    pub fn set_specified_hourly_isi(&mut self, time: NaiveDateTime, value: Option<f64>) {
        if matches!(value, Some(v) if v < 0.0) {
            return;
        }
        if let Some(idx) = self.day_index(time) {
            self.days[idx].fwi.spec_hr[time.hour() as usize].isi = value;
            self.invalidate();
        }
    }

    /// Override the hourly FWI; negative values are ignored.
    pub fn set_specified_hourly_fwi(&mut self, time: NaiveDateTime, value: Option<f64>) {
        if matches!(value, Some(v) if v < 0.0) {
            return;
        }
        if let Some(idx) = self.day_index(time) {
            self.days[idx].fwi.spec_hr[time.hour() as usize].fwi = value;
            self.invalidate();
        }
    }

    /// Any hour anywhere in the stream was corrected during import.
    pub fn has_any_corrected(&self) -> bool {
        self.days.iter().any(DayRecord::has_any_corrected)
    }

    /// Any FWI override is present anywhere in the stream.
    pub fn any_fwi_codes_specified(&self) -> bool {
        self.days.iter().any(|d| d.fwi.any_specified())
    }

    /// Days excluded from synthesis because a solar event is missing.
    pub fn warn_on_sun_rise_set(&self) -> SunWarnings {
        let mut w = SunWarnings::default();
        for day in &self.days {
            if day.mode == DayMode::DailySummary {
                w.no_sunrise |= day.sun.no_sunrise;
                w.no_sunset |= day.sun.no_sunset;
            }
        }
        w
    }

    /// Recompute every derived value if anything changed since the last
    /// pass. Idempotent: a second call without intervening mutation is a
    /// cache hit and does no work.
    pub fn ensure_calculated(&mut self) {
        if self.calculated_valid {
            return;
        }
        self.calculated_valid = true;
        if self.days.is_empty() {
            return;
        }
        debug!(days = self.days.len(), "recomputing synthesized weather and FWI chain");

        // A ghost copy of the last daily-summary day gives the real last
        // day a tomorrow, so its evening hours resolve like any other.
        let ghost_added = self
            .days
            .last()
            .is_some_and(|d| d.mode == DayMode::DailySummary);
        if ghost_added {
            if let Some(last) = self.days.last() {
                let mut ghost = DayRecord::new(last.day_start + Duration::days(1));
                ghost.summary = last.summary;
                self.days.push(ghost);
            }
        }

        for i in 0..self.days.len() {
            let date = self.days[i].day_start.date();
            self.days[i].sun = self.location.sun_times(date);
            if !self.days[i].sun.resolvable() && self.days[i].mode == DayMode::DailySummary {
                warn!(
                    day = %date,
                    "solar events unresolved; day excluded from diurnal synthesis"
                );
            }
        }

        let len = self.days.len();
        for i in 0..len {
            let span = self.hour_span_at(i, len);
            diurnal::synthesize_day(self, i, span);
        }
        for i in 0..len {
            let span = self.hour_span_at(i, len);
            diurnal::fill_dew_point(&mut self.days[i], span);
        }

        if ghost_added {
            self.days.pop();
        }

        for i in 0..self.days.len() {
            chain::calculate_day(self, i);
        }
    }

    /// Zero-based month of the day at `idx`, for the DMC/DC tables.
    pub(crate) fn month0_of(&self, idx: usize) -> usize {
        self.days[idx].day_start.date().month0() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn loc() -> Location {
        Location {
            latitude: 45.9,
            longitude: -77.3,
            timezone_offset_secs: -5 * 3600,
            ..Location::default()
        }
    }

    fn t(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn summary() -> DailySummaryValues {
        DailySummaryValues {
            min_temp: 10.0,
            max_temp: 20.0,
            min_ws: 5.0,
            max_ws: 15.0,
            min_gust: None,
            max_gust: None,
            mean_rh: 0.6,
            precip: 0.0,
            mean_wd: std::f64::consts::PI,
        }
    }

    #[test]
    fn first_write_anchors_the_timeline() {
        let mut s = WeatherStream::new(loc());
        assert!(s.set_daily_weather(t(5, 0), summary()));
        assert_eq!(s.start_time(), Some(t(5, 0)));
        assert_eq!(s.num_days(), 1);
    }

    #[test]
    fn append_requires_contiguity() {
        let mut s = WeatherStream::new(loc());
        assert!(s.set_daily_weather(t(5, 0), summary()));
        // Two days past the end leaves a gap.
        assert!(!s.set_daily_weather(t(7, 0), summary()));
        assert!(s.set_daily_weather(t(6, 0), summary()));
        assert_eq!(s.num_days(), 2);
    }

    #[test]
    fn writes_before_start_fail() {
        let mut s = WeatherStream::new(loc());
        assert!(s.set_daily_weather(t(5, 0), summary()));
        assert!(!s.set_daily_weather(t(4, 0), summary()));
        assert_eq!(s.num_days(), 1);
    }

    #[test]
    fn set_end_time_grows_by_duplication() {
        let mut s = WeatherStream::new(loc());
        assert!(s.set_daily_weather(t(5, 0), summary()));
        s.set_end_time(t(8, 0));
        assert_eq!(s.num_days(), 4);
        let copied = s.daily_weather(t(8, 12)).unwrap();
        assert_eq!(copied.min_temp, 10.0);
        assert_eq!(copied.max_temp, 20.0);
    }

    #[test]
    fn set_end_time_shrinks_by_truncation() {
        let mut s = WeatherStream::new(loc());
        for d in 5..=9 {
            assert!(s.set_daily_weather(t(d, 0), summary()));
        }
        s.set_end_time(t(6, 0));
        assert_eq!(s.num_days(), 2);
    }

    #[test]
    fn mode_switch_is_explicit() {
        let mut s = WeatherStream::new(loc());
        assert!(s.set_daily_weather(t(5, 0), summary()));
        let reading = HourlyReading {
            temp: 18.0,
            rh: 0.5,
            precip: 0.0,
            ws: 9.0,
            gust: None,
            wd: 0.0,
            dew: None,
        };
        assert!(!s.set_hourly_weather(t(5, 10), reading));
        assert!(s.make_hourly_observations(t(5, 0)));
        assert!(s.set_hourly_weather(t(5, 0), reading));
    }

    #[test]
    fn out_of_range_spec_codes_are_ignored() {
        let mut s = WeatherStream::new(loc());
        assert!(s.set_daily_weather(t(5, 0), summary()));
        s.ensure_calculated();
        s.set_specified_daily_ffmc(t(5, 14), Some(150.0));
        assert!(s.days[0].fwi.spec_day.ffmc.is_none());
        s.set_specified_daily_ffmc(t(5, 14), Some(90.0));
        assert_eq!(s.days[0].fwi.spec_day.ffmc, Some(90.0));
    }

    #[test]
    fn mutation_invalidates_cache() {
        let mut s = WeatherStream::new(loc());
        assert!(s.set_daily_weather(t(5, 0), summary()));
        s.ensure_calculated();
        assert!(s.calculated_valid);
        assert!(s.set_daily_weather(t(6, 0), summary()));
        assert!(!s.calculated_valid);
    }

    #[test]
    fn starting_code_ranges_enforced_silently() {
        let mut s = WeatherStream::new(loc());
        s.set_starting_codes(StartingCodes {
            ffmc: Some(85.0),
            dc: Some(2000.0),
            ..StartingCodes::default()
        });
        assert_eq!(s.starting_codes().ffmc, Some(85.0));
        assert_eq!(s.starting_codes().dc, None, "out-of-range DC keeps prior value");
    }
}
