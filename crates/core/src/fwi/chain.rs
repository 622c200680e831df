//! Per-day FWI derivation.
//!
//! Each day consumes the previous day's calculated codes (DC and DMC are a
//! strict chronological recurrence), today's noon weather, and the
//! noon-to-noon rain window. Specified overrides replace calculated values
//! only while the use-specified option is set; a specified hourly FFMC also
//! short-circuits the recurrence, feeding downstream hours as their
//! "previous hour".

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::core_types::{FfmcPolicy, HOURS_PER_DAY};
use crate::fwi::equations;
use crate::stream::store::WeatherStream;

/// Run the full chain for day `idx`. Must be called in chronological order.
pub(crate) fn calculate_day(stream: &mut WeatherStream, idx: usize) {
    calculate_dc(stream, idx);
    calculate_dmc(stream, idx);
    calculate_bui(stream, idx);
    calculate_daily_ffmc(stream, idx);
    calculate_hourly_ffmc(stream, idx);
    calculate_remaining(stream, idx);
}

fn hour_of(t: NaiveDateTime) -> usize {
    t.hour() as usize
}

/// DC of the previous fire day: the prior day's calculated value, or the
/// starting code ahead of the timeline.
fn prev_dc(stream: &WeatherStream, idx: usize) -> f64 {
    if idx == 0 {
        stream.starting.dc.unwrap_or(0.0)
    } else {
        stream.days[idx - 1].fwi.calc_day.dc.unwrap_or(0.0)
    }
}

fn prev_dmc(stream: &WeatherStream, idx: usize) -> f64 {
    if idx == 0 {
        stream.starting.dmc.unwrap_or(0.0)
    } else {
        stream.days[idx - 1].fwi.calc_day.dmc.unwrap_or(0.0)
    }
}

fn prev_daily_ffmc(stream: &WeatherStream, idx: usize) -> f64 {
    if idx == 0 {
        stream.starting.ffmc.unwrap_or(0.0)
    } else {
        stream.days[idx - 1].fwi.calc_day.ffmc.unwrap_or(0.0)
    }
}

/// Calculated hourly FFMC at an instant without triggering recalculation;
/// valid while walking the chain because earlier days are already done.
fn hourly_ffmc_so_far(stream: &WeatherStream, time: NaiveDateTime) -> Option<f64> {
    if let Some(idx) = stream.day_index(time) {
        return stream.days[idx].fwi.calc_hr[hour_of(time)].ffmc;
    }
    if stream.precedes_start(time) && stream.starting.hffmc_time_secs.is_none() {
        return Some(stream.starting.hffmc);
    }
    None
}

/// BUI applicable to an instant (daily codes change at solar noon, so early
/// hours read the previous fire day's value).
fn bui_at(stream: &WeatherStream, time: NaiveDateTime) -> f64 {
    if let Some(idx) = stream.fire_day_index(time) {
        return stream.days[idx].fwi.calc_day.bui.unwrap_or(0.0);
    }
    stream.starting.effective_bui().unwrap_or(0.0)
}

fn calculate_dc(stream: &mut WeatherStream, idx: usize) {
    if stream.options.use_specified_fwi {
        if let Some(spec) = stream.days[idx].fwi.spec_day.dc {
            stream.days[idx].fwi.calc_day.dc = Some(spec);
            return;
        }
    }
    let date = stream.days[idx].day_start.date();
    let noon_hour = stream.location.noon_hour(date).min(HOURS_PER_DAY - 1);
    let rain = stream.noon_window_precip(idx);
    let temp = stream.days[idx].hourly_temp[noon_hour];
    let dc = equations::drought_code(
        prev_dc(stream, idx),
        rain,
        temp,
        stream.location.latitude,
        stream.month0_of(idx),
    );
    stream.days[idx].fwi.calc_day.dc = Some(dc);
}

fn calculate_dmc(stream: &mut WeatherStream, idx: usize) {
    if stream.options.use_specified_fwi {
        if let Some(spec) = stream.days[idx].fwi.spec_day.dmc {
            stream.days[idx].fwi.calc_day.dmc = Some(spec);
            return;
        }
    }
    let date = stream.days[idx].day_start.date();
    let noon_hour = stream.location.noon_hour(date).min(HOURS_PER_DAY - 1);
    let rain = stream.noon_window_precip(idx);
    let temp = stream.days[idx].hourly_temp[noon_hour];
    let rh = stream.days[idx].hourly_rh[noon_hour];
    let dmc = equations::duff_moisture_code(
        prev_dmc(stream, idx),
        rain,
        temp,
        stream.location.latitude,
        stream.month0_of(idx),
        rh,
    );
    stream.days[idx].fwi.calc_day.dmc = Some(dmc);
}

fn calculate_bui(stream: &mut WeatherStream, idx: usize) {
    let day = &mut stream.days[idx];
    if stream.options.use_specified_fwi {
        if let Some(spec) = day.fwi.spec_day.bui {
            day.fwi.calc_day.bui = Some(spec);
            return;
        }
    }
    let dc = day.fwi.calc_day.dc.unwrap_or(0.0);
    let dmc = day.fwi.calc_day.dmc.unwrap_or(0.0);
    day.fwi.calc_day.bui = Some(equations::buildup_index(dc, dmc));
}

fn calculate_daily_ffmc(stream: &mut WeatherStream, idx: usize) {
    if stream.options.use_specified_fwi {
        if let Some(spec) = stream.days[idx].fwi.spec_day.ffmc {
            stream.days[idx].fwi.calc_day.ffmc = Some(spec);
            return;
        }
    }
    let date = stream.days[idx].day_start.date();
    let noon_hour = stream.location.noon_hour(date).min(HOURS_PER_DAY - 1);
    let rain = stream.noon_window_precip(idx);
    let temp = stream.days[idx].hourly_temp[noon_hour];
    let rh = stream.days[idx].hourly_rh[noon_hour];
    let ws = stream.days[idx].hourly_ws[noon_hour];
    let ffmc =
        equations::daily_ffmc_van_wagner(prev_daily_ffmc(stream, idx), rain, temp, rh, ws);
    stream.days[idx].fwi.calc_day.ffmc = Some(ffmc);
}

/// 48-hour trailing rain window ending at (and including) `time`'s hour.
fn rain_window(stream: &WeatherStream, time: NaiveDateTime, this_hour_precip: f64) -> [f64; 48] {
    let mut rain48 = [0.0; 48];
    rain48[0] = this_hour_precip;
    for (k, slot) in rain48.iter_mut().enumerate().skip(1) {
        *slot = stream.hourly_rain(time - Duration::hours(k as i64));
    }
    rain48
}

fn policy_value(
    stream: &WeatherStream,
    idx: usize,
    hour: usize,
    time: NaiveDateTime,
    seed_fallback: f64,
) -> f64 {
    let day = &stream.days[idx];
    let date = day.day_start.date();
    let wx = day.hourly_weather(hour);
    let today_daily = day.fwi.calc_day.ffmc.unwrap_or(0.0);
    match stream.options.ffmc_policy {
        FfmcPolicy::Hybrid => {
            let prev_hr = if hour == 0 {
                hourly_ffmc_so_far(stream, time - Duration::hours(1)).unwrap_or(seed_fallback)
            } else {
                day.fwi.calc_hr[hour - 1].ffmc.unwrap_or(seed_fallback)
            };
            let rain48 = rain_window(stream, time, wx.precip);
            let secs = (time - day.day_start).num_seconds() as f64;
            equations::hourly_ffmc_hybrid(
                prev_daily_ffmc(stream, idx),
                today_daily,
                prev_hr,
                &rain48,
                wx.temp,
                wx.rh,
                wx.ws,
                secs,
            )
        }
        FfmcPolicy::Lawson => {
            let lst_midnight =
                day.day_start + Duration::seconds(stream.location.lst_shift_secs(date));
            let secs = (time - lst_midnight).num_seconds() as f64;
            equations::hourly_ffmc_lawson_contiguous(
                prev_daily_ffmc(stream, idx),
                today_daily,
                secs,
            )
        }
        FfmcPolicy::VanWagner => {
            let prev = if hour == 0 {
                hourly_ffmc_so_far(stream, time - Duration::hours(1)).unwrap_or(seed_fallback)
            } else {
                day.fwi.calc_hr[hour - 1].ffmc.unwrap_or(seed_fallback)
            };
            equations::hourly_ffmc_van_wagner(prev, wx.precip, wx.temp, wx.rh, wx.ws, 3600.0)
        }
    }
}

fn calculate_hourly_ffmc(stream: &mut WeatherStream, idx: usize) {
    let day_start = stream.days[idx].day_start;
    let date = day_start.date();
    let use_specified = stream.options.use_specified_fwi;
    let stream_begin = stream.start_time_of_hours().unwrap_or(day_start);
    let stream_end = stream
        .end_time_of_hours()
        .unwrap_or(day_start + Duration::hours(23));

    let mut forward_from = day_start;

    if idx == 0 {
        // Seed selection: a pinned seed hour only applies under the
        // Van Wagner policy; everything else anchors on today's daily FFMC
        // at solar-mean noon.
        let pinned =
            stream.starting.hffmc_time_secs.is_some()
                && stream.options.ffmc_policy == FfmcPolicy::VanWagner;
        let (seed_time, in_ffmc) = if pinned {
            let mut secs = stream.starting.hffmc_time_secs.unwrap_or(0);
            let first = stream.first_hour as i64 * 3600;
            if secs < first {
                // A seed hour ahead of the first observation snaps to it.
                secs = first;
                stream.starting.hffmc_time_secs = Some(secs);
            }
            (day_start + Duration::seconds(secs), stream.starting.hffmc)
        } else {
            (
                stream.location.noon_local(date),
                stream.days[0].fwi.calc_day.ffmc.unwrap_or(0.0),
            )
        };

        let seed_hour = hour_of(seed_time).min(HOURS_PER_DAY - 1);
        let seeded = match (use_specified, stream.days[0].fwi.spec_hr[seed_hour].ffmc) {
            (true, Some(spec)) => spec,
            _ => in_ffmc,
        };
        stream.days[0].fwi.calc_hr[seed_hour].ffmc = Some(seeded);

        // Backward fill from the seed hour down to the first populated hour.
        let begin = if stream_begin < day_start {
            day_start
        } else {
            stream_begin
        };
        let mut t = seed_time - Duration::hours(1);
        let mut h = seed_hour as i64 - 1;
        while t >= begin && h >= 0 {
            let hour = h as usize;
            let spec = stream.days[0].fwi.spec_hr[hour].ffmc;
            if use_specified && spec.is_some() {
                stream.days[0].fwi.calc_hr[hour].ffmc = spec;
            } else {
                let val = match stream.options.ffmc_policy {
                    FfmcPolicy::Hybrid | FfmcPolicy::Lawson => {
                        let lst_midnight = day_start
                            + Duration::seconds(stream.location.lst_shift_secs(date));
                        equations::hourly_ffmc_lawson_contiguous(
                            prev_daily_ffmc(stream, 0),
                            stream.days[0].fwi.calc_day.ffmc.unwrap_or(0.0),
                            (t - lst_midnight).num_seconds() as f64,
                        )
                    }
                    FfmcPolicy::VanWagner => {
                        let next = stream.days[0].fwi.calc_hr[hour + 1].ffmc.unwrap_or(in_ffmc);
                        let wx = stream.days[0].hourly_weather(hour + 1);
                        equations::hourly_ffmc_van_wagner_previous(
                            next, wx.precip, wx.temp, wx.rh, wx.ws,
                        )
                    }
                };
                stream.days[0].fwi.calc_hr[hour].ffmc = Some(val);
            }
            t -= Duration::hours(1);
            h -= 1;
        }

        forward_from = if pinned {
            seed_time + Duration::hours(1)
        } else {
            seed_time
        };
    }

    // Forward fill to the end of the day (or of the stream).
    let day_end = day_start + Duration::hours(23);
    let end = if day_end > stream_end { stream_end } else { day_end };
    let seed_fallback = stream.starting.hffmc;
    let mut t = forward_from;
    let mut hour = hour_of(t);
    while t <= end && hour < HOURS_PER_DAY {
        let spec = stream.days[idx].fwi.spec_hr[hour].ffmc;
        if use_specified && spec.is_some() {
            stream.days[idx].fwi.calc_hr[hour].ffmc = spec;
        } else {
            let val = policy_value(stream, idx, hour, t, seed_fallback);
            stream.days[idx].fwi.calc_hr[hour].ffmc = Some(val);
        }
        hour += 1;
        t += Duration::hours(1);
    }
}

fn calculate_remaining(stream: &mut WeatherStream, idx: usize) {
    let date = stream.days[idx].day_start.date();
    let noon_hour = stream.location.noon_hour(date).min(HOURS_PER_DAY - 1);
    let use_specified = stream.options.use_specified_fwi;

    let noon_ws = stream.days[idx].hourly_ws[noon_hour];
    let day_ffmc = stream.days[idx].fwi.calc_day.ffmc.unwrap_or(0.0);
    let day_isi = equations::initial_spread_index(day_ffmc, noon_ws);
    let day_bui = stream.days[idx].fwi.calc_day.bui.unwrap_or(0.0);
    stream.days[idx].fwi.calc_day.isi = Some(day_isi);
    stream.days[idx].fwi.calc_day.fwi = Some(equations::fire_weather_index(day_isi, day_bui));

    let span = stream.hour_span_at(idx, stream.days.len());
    for hour in span.first..=span.last.min(HOURS_PER_DAY - 1) {
        let t = stream.days[idx].day_start + Duration::hours(hour as i64);

        let isi = match (use_specified, stream.days[idx].fwi.spec_hr[hour].isi) {
            (true, Some(spec)) => spec,
            _ => {
                let ffmc = stream.days[idx].fwi.calc_hr[hour].ffmc.unwrap_or(0.0);
                equations::initial_spread_index(ffmc, stream.days[idx].hourly_ws[hour])
            }
        };
        stream.days[idx].fwi.calc_hr[hour].isi = Some(isi);

        let fwi = match (use_specified, stream.days[idx].fwi.spec_hr[hour].fwi) {
            (true, Some(spec)) => spec,
            _ => equations::fire_weather_index(isi, bui_at(stream, t)),
        };
        stream.days[idx].fwi.calc_hr[hour].fwi = Some(fwi);
    }
}
