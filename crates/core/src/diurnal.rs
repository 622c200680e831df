//! Diurnal curve synthesis: expands a day's min/max aggregates into 24
//! hourly values anchored on sunrise, solar noon, and sunset.
//!
//! Temperature, wind, and gust share one curve family with channel-specific
//! (alpha, beta, gamma) parameters: an exponential overnight approach from
//! yesterday's anchor toward the daily minimum at `tn = sunrise + alpha`, a
//! quarter-sine rise to the maximum at `tx = solar noon + beta`, and (wind
//! only) a quarter-sine fall back toward the next morning's minimum.
//! Relative humidity follows the synthesized temperature through the
//! saturation-vapour-pressure relation; dew point is inverted from
//! temperature and RH afterwards.
//!
//! Days run in chronological order so that "yesterday" is always resolved;
//! each day's pass also writes yesterday's post-sunset hours, which is what
//! finally closes the previous day's curve. Hour indices are clamped to the
//! 24-hour window at every boundary.

use std::f64::consts::FRAC_PI_2;

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::core_types::{CurveParams, Location, HOURS_PER_DAY};
use crate::stream::day::{DayMode, DayRecord, HourSpan};
use crate::stream::store::WeatherStream;

/// Segment state for one channel of one day.
struct Curve {
    min: f64,
    max: f64,
    /// Value at the trailing anchor (yesterday's sunset or afternoon peak).
    anchor: f64,
    gamma: f64,
    /// Morning-minimum anchor instant.
    tn: NaiveDateTime,
    /// Afternoon-maximum anchor instant.
    tx: NaiveDateTime,
    /// Trailing anchor instant (yesterday side).
    ts: NaiveDateTime,
}

fn fraction(num: Duration, den: Duration) -> f64 {
    let d = den.num_seconds();
    if d == 0 {
        return 0.0;
    }
    num.num_seconds() as f64 / d as f64
}

impl Curve {
    /// Quarter-sine rise from `min` at `tn` to `max` at `tx`.
    fn sine(&self, t: NaiveDateTime) -> f64 {
        let f = fraction(t - self.tn, self.tx - self.tn);
        self.min + (self.max - self.min) * (f * FRAC_PI_2).sin()
    }

    /// Exponential overnight approach from the anchor value toward `min`.
    fn rising_exp(&self, t: NaiveDateTime) -> f64 {
        let f = fraction(t - self.ts, self.tn - self.ts);
        self.min + (self.anchor - self.min) * (f * self.gamma).exp()
    }

    /// Quarter-sine fall from the anchor value toward `min` (wind evening
    /// segment; fraction measured from `tx` toward `tn`).
    fn falling_sine(&self, t: NaiveDateTime) -> f64 {
        let f = fraction(t - self.tx, self.tn - self.tx);
        self.anchor - (self.anchor - self.min) * (f * FRAC_PI_2).sin()
    }
}

fn hour_of(t: NaiveDateTime) -> usize {
    t.hour() as usize
}

/// Round an instant up to the next whole hour.
fn next_whole_hour(t: NaiveDateTime) -> NaiveDateTime {
    t + Duration::hours(1)
        - Duration::minutes(i64::from(t.minute()))
        - Duration::seconds(i64::from(t.second()))
}

fn secs(hours: f64) -> Duration {
    Duration::seconds((hours * 3600.0) as i64)
}

/// Synthesize (or finish) the hourly channels of day `idx`. Hourly-specified
/// days only cache their aggregates; daily-summary days get the full curve
/// treatment. Days with unresolved solar events are skipped.
pub(crate) fn synthesize_day(stream: &mut WeatherStream, idx: usize, span: HourSpan) {
    if stream.days[idx].mode == DayMode::Hourly {
        stream.days[idx].cache_daily_from_hourly(span);
        return;
    }
    if !stream.days[idx].sun.resolvable() {
        return;
    }
    let curve = stream.curve;
    let location = stream.location;

    fill_wind_direction(&mut stream.days[idx]);
    fill_precip(&mut stream.days[idx], &location);

    let last_temp = fill_temperature(&mut stream.days, idx, &curve);
    let last_temp = if (1..=HOURS_PER_DAY).contains(&last_temp) {
        last_temp
    } else {
        1
    };
    fill_rh(&mut stream.days[idx]);
    let last_ws = fill_wind(&mut stream.days, idx, &curve, &location, Channel::Speed);
    let last_gust = fill_wind(&mut stream.days, idx, &curve, &location, Channel::Gust);
    let last_ws = match last_ws {
        Some(i) if (1..=HOURS_PER_DAY).contains(&i) => i,
        _ => 1,
    };

    // Clamp by repeating the final resolved value when a real tomorrow will
    // not overwrite the evening hours anyway; the next day's pass replaces
    // these where it can.
    if idx + 1 < stream.days.len() {
        let day = &mut stream.days[idx];
        for i in last_temp..HOURS_PER_DAY {
            day.hourly_temp[i] = day.hourly_temp[last_temp - 1];
            day.hourly_rh[i] = day.hourly_rh[last_temp - 1];
        }
        for i in last_ws..HOURS_PER_DAY {
            day.hourly_ws[i] = day.hourly_ws[last_ws - 1];
        }
        if let Some(lg) = last_gust {
            let lg = lg.clamp(1, HOURS_PER_DAY);
            for i in last_ws..HOURS_PER_DAY {
                day.hourly_gust[i] = day.hourly_gust[lg - 1];
            }
        }
    }
}

fn fill_wind_direction(day: &mut DayRecord) {
    let wd = day.summary.mean_wd;
    day.hourly_wd = [wd; HOURS_PER_DAY];
}

/// The whole daily total lands in the hour nearest solar-mean noon.
fn fill_precip(day: &mut DayRecord, location: &Location) {
    let hour = location.noon_hour(day.day_start.date());
    day.hourly_precip = [0.0; HOURS_PER_DAY];
    day.hourly_precip[hour.min(HOURS_PER_DAY - 1)] = day.summary.precip;
}

/// Saturation vapour pressure constant used by the RH reconstruction.
fn qt0(vpt0: f64, max_temp: f64) -> f64 {
    217.0 * vpt0 / (273.17 + max_temp)
}

/// Fill today's temperatures through sunset and yesterday's evening hours.
/// Returns the first unfilled hour index.
fn fill_temperature(days: &mut [DayRecord], idx: usize, curve: &CurveParams) -> usize {
    let (before, rest) = days.split_at_mut(idx);
    let day = &mut rest[0];

    let mut c = Curve {
        min: day.summary.min_temp,
        max: day.summary.max_temp,
        anchor: 0.0,
        gamma: curve.temp_gamma,
        tn: day.sun.sunrise + secs(curve.temp_alpha),
        tx: day.sun.solar_noon + secs(curve.temp_beta),
        ts: day.day_start,
    };
    day.synth_sunset_temp = c.sine(day.sun.sunset);

    if let Some(yesterday) = before.last_mut() {
        c.ts = yesterday.sun.sunset;
        let h = hour_of(c.ts).min(HOURS_PER_DAY - 1);
        let h2 = (h + 1).min(HOURS_PER_DAY - 1);
        if yesterday.mode == DayMode::Hourly {
            let minute_frac = f64::from(c.ts.minute()) / 60.0;
            c.anchor = yesterday.hourly_temp[h]
                + (yesterday.hourly_temp[h2] - yesterday.hourly_temp[h]) * minute_frac;
        } else {
            c.anchor = yesterday.synth_sunset_temp;

            // Close out yesterday's evening with this day's overnight
            // segment, reconstructing RH alongside.
            let y_max = yesterday.summary.max_temp;
            let svpt0 = 6.108 * (y_max * 17.27 / (y_max + 237.3)).exp();
            let vpt0 = svpt0 * yesterday.summary.mean_rh;
            let rh_const = 100.0 * qt0(vpt0, y_max) / (6.108 * 217.0);

            let mut t = next_whole_hour(c.ts);
            let mut i = hour_of(c.ts) + 1;
            while t < day.day_start && i < HOURS_PER_DAY {
                let temp = c.rising_exp(t);
                yesterday.hourly_temp[i] = temp;
                yesterday.hourly_rh[i] = (rh_const * (273.17 + temp)
                    / (17.27 * temp / (temp + 237.3)).exp()
                    * 0.01)
                    .clamp(0.0, 1.0);
                t += Duration::hours(1);
                i += 1;
            }
        }
    } else {
        c.ts = day.sun.sunset - Duration::days(1);
        c.anchor = day.synth_sunset_temp;
    }

    let mut i = 0;
    let mut t = day.day_start;
    while t < c.tn && i < HOURS_PER_DAY {
        day.hourly_temp[i] = c.rising_exp(t);
        i += 1;
        t += Duration::hours(1);
    }
    while t <= day.sun.sunset && i < HOURS_PER_DAY {
        day.hourly_temp[i] = c.sine(t);
        i += 1;
        t += Duration::hours(1);
    }
    i
}

/// Reconstruct RH from the synthesized temperatures, seeded by the daily
/// maximum temperature and mean RH.
fn fill_rh(day: &mut DayRecord) {
    let max_temp = day.summary.max_temp;
    let svpt0 = 6.108 * (max_temp * 17.27 / (max_temp + 237.3)).exp();
    let vpt0 = svpt0 * day.summary.mean_rh;
    let rh_const = 100.0 * qt0(vpt0, max_temp) / (6.108 * 217.0);

    let sunset_hour = hour_of(day.sun.sunset).min(HOURS_PER_DAY - 1);
    for i in 0..=sunset_hour {
        let temp = day.hourly_temp[i];
        day.hourly_rh[i] = (rh_const * (273.17 + temp) / (17.27 * temp / (temp + 237.3)).exp()
            * 0.01)
            .clamp(0.0, 1.0);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Channel {
    Speed,
    Gust,
}

/// Fill today's wind (or gust) curve and yesterday's evening hours.
/// Returns the first unfilled hour index, or `None` when the channel has no
/// aggregates to synthesize from.
fn fill_wind(
    days: &mut [DayRecord],
    idx: usize,
    curve: &CurveParams,
    location: &Location,
    channel: Channel,
) -> Option<usize> {
    let (before, rest) = days.split_at_mut(idx);
    let day = &mut rest[0];

    let (min, max) = match channel {
        Channel::Speed => (day.summary.min_ws, day.summary.max_ws),
        Channel::Gust => (day.summary.min_gust?, day.summary.max_gust?),
    };

    let mut c = Curve {
        min,
        max,
        anchor: 0.0,
        gamma: curve.wind_gamma,
        tn: day.sun.sunrise + secs(curve.wind_alpha),
        tx: day.sun.solar_noon + secs(curve.wind_beta),
        ts: day.day_start,
    };

    if let Some(yesterday) = before.last_mut() {
        c.ts = yesterday.sun.sunset;
        let tx_y = yesterday.sun.solar_noon + secs(curve.wind_beta);
        let h = hour_of(tx_y).min(HOURS_PER_DAY - 1);
        let values = |d: &DayRecord| match channel {
            Channel::Speed => d.hourly_ws,
            Channel::Gust => d.hourly_gust,
        };
        c.anchor = if yesterday.mode == DayMode::DailySummary {
            values(yesterday)[h]
        } else {
            match channel {
                Channel::Speed => yesterday.summary.max_ws,
                Channel::Gust => yesterday.summary.max_gust.unwrap_or(max),
            }
        };

        if yesterday.mode == DayMode::DailySummary {
            // The evening fall runs from yesterday's afternoon peak toward
            // this morning's minimum.
            c.tx = tx_y;
            let mut t = next_whole_hour(tx_y);
            let mut i = h + 1;
            while t < day.day_start && i < HOURS_PER_DAY {
                let v = c.falling_sine(t).max(0.0);
                match channel {
                    Channel::Speed => yesterday.hourly_ws[i] = v,
                    Channel::Gust => yesterday.hourly_gust[i] = v,
                }
                t += Duration::hours(1);
                i += 1;
            }
        } else {
            c.tx = tx_y;
        }
    } else {
        // No predecessor: anchor on the previous date's solar events so the
        // overnight fall still has a defined origin.
        let prev_sun = location.sun_times(day.day_start.date() - Duration::days(1));
        c.ts = if prev_sun.no_sunset {
            day.sun.sunset - Duration::days(1)
        } else {
            prev_sun.sunset
        };
        c.tx = prev_sun.solar_noon + secs(curve.wind_beta);
        c.anchor = max;
    }

    let mut i = 0;
    let mut t = day.day_start;
    while t < c.tn && i < HOURS_PER_DAY {
        let v = c.falling_sine(t).max(0.0);
        match channel {
            Channel::Speed => day.hourly_ws[i] = v,
            Channel::Gust => day.hourly_gust[i] = v,
        }
        i += 1;
        t += Duration::hours(1);
    }

    c.tx = day.sun.solar_noon + secs(curve.wind_beta);
    while t <= c.tx && i < HOURS_PER_DAY {
        let v = c.sine(t).max(0.0);
        match channel {
            Channel::Speed => day.hourly_ws[i] = v,
            Channel::Gust => day.hourly_gust[i] = v,
        }
        i += 1;
        t += Duration::hours(1);
    }
    Some(i)
}

/// Derive dew point from temperature and RH for every hour where it was not
/// observed directly (Magnus-form inversion).
pub(crate) fn fill_dew_point(day: &mut DayRecord, span: HourSpan) {
    let last = span.last.min(HOURS_PER_DAY - 1);
    for i in span.first.min(last)..=last {
        if day.hflags[i].dewpoint_specified {
            continue;
        }
        let temp = day.hourly_temp[i];
        let vps = 0.6112 * 10f64.powf(7.5 * temp / (237.7 + temp));
        let vp = day.hourly_rh[i] * vps;
        day.hourly_dewpt[i] = if vp > 0.0 {
            let r = (vp / 0.6112).log10();
            237.7 * r / (7.5 - r)
        } else {
            -273.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day_with_sun() -> DayRecord {
        let start = NaiveDate::from_ymd_opt(2023, 7, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut d = DayRecord::new(start);
        d.sun.sunrise = start + Duration::hours(5) + Duration::minutes(30);
        d.sun.solar_noon = start + Duration::hours(12);
        d.sun.sunset = start + Duration::hours(20) + Duration::minutes(45);
        d
    }

    #[test]
    fn sine_hits_min_at_tn_and_max_at_tx() {
        let d = day_with_sun();
        let c = Curve {
            min: 10.0,
            max: 20.0,
            anchor: 0.0,
            gamma: -2.2,
            tn: d.sun.sunrise,
            tx: d.sun.solar_noon,
            ts: d.day_start,
        };
        approx::assert_relative_eq!(c.sine(c.tn), 10.0, epsilon = 1e-12);
        approx::assert_relative_eq!(c.sine(c.tx), 20.0, epsilon = 1e-12);
    }

    #[test]
    fn rising_exp_starts_at_anchor() {
        let d = day_with_sun();
        let c = Curve {
            min: 10.0,
            max: 20.0,
            anchor: 14.0,
            gamma: -2.2,
            tn: d.sun.sunrise,
            tx: d.sun.solar_noon,
            ts: d.day_start - Duration::hours(4),
        };
        approx::assert_relative_eq!(c.rising_exp(c.ts), 14.0, epsilon = 1e-12);
        // Approaches the minimum as the fraction grows.
        let late = c.rising_exp(c.tn);
        assert!((late - c.min).abs() < (14.0 - c.min).abs());
    }

    #[test]
    fn falling_sine_descends_from_anchor() {
        let d = day_with_sun();
        let c = Curve {
            min: 5.0,
            max: 15.0,
            anchor: 15.0,
            gamma: -3.59,
            tn: d.sun.sunrise + Duration::days(1),
            tx: d.sun.solar_noon,
            ts: d.day_start,
        };
        approx::assert_relative_eq!(c.falling_sine(c.tx), 15.0, epsilon = 1e-12);
        let later = c.falling_sine(c.tx + Duration::hours(6));
        assert!(later < 15.0 && later > 5.0);
    }

    #[test]
    fn precip_lands_on_noon_hour() {
        let mut d = day_with_sun();
        d.summary.precip = 7.5;
        let loc = Location::default();
        fill_precip(&mut d, &loc);
        assert_eq!(d.hourly_precip[12], 7.5);
        let total: f64 = d.hourly_precip.iter().sum();
        approx::assert_relative_eq!(total, 7.5, epsilon = 1e-12);
    }

    #[test]
    fn dew_point_below_temperature() {
        let mut d = day_with_sun();
        d.hourly_temp = [20.0; HOURS_PER_DAY];
        d.hourly_rh = [0.6; HOURS_PER_DAY];
        fill_dew_point(&mut d, HourSpan::FULL);
        for h in 0..HOURS_PER_DAY {
            assert!(d.hourly_dewpt[h] < 20.0);
            assert!(d.hourly_dewpt[h] > 0.0);
        }
    }

    #[test]
    fn specified_dew_point_is_preserved() {
        let mut d = day_with_sun();
        d.hourly_temp = [20.0; HOURS_PER_DAY];
        d.hourly_rh = [0.6; HOURS_PER_DAY];
        d.hourly_dewpt[7] = 3.25;
        d.hflags[7].dewpoint_specified = true;
        fill_dew_point(&mut d, HourSpan::FULL);
        assert_eq!(d.hourly_dewpt[7], 3.25);
    }
}
