//! Instantaneous queries: weather and indices at an arbitrary instant,
//! linearly interpolated between the two bracketing hourly readings.
//!
//! Wind direction blends over the shortest angle; when the two readings are
//! nearly opposed (within a degree of 180°) there is no meaningful shortest
//! path, so the sample switches from the earlier to the later reading at
//! the interval midpoint, and wind speed switches with it.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

use crate::core_types::{normalize_angle, FfmcPolicy, SECS_PER_HOUR};
use crate::fwi::equations;
use crate::stream::day::HourlyReading;
use crate::stream::store::WeatherStream;

/// Options for an instantaneous sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleOptions {
    /// Interpolate between bracketing hours rather than reading the
    /// containing hour directly.
    pub temporal_interpolation: bool,
}

/// Weather at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstantWeather {
    pub temp: f64,
    pub dew: f64,
    /// Fraction in `[0, 1]`.
    pub rh: f64,
    pub ws: f64,
    pub gust: Option<f64>,
    /// Cartesian radians.
    pub wd: f64,
    pub precip: f64,
    pub interpolated: bool,
    pub corrected: bool,
}

/// Hourly-granularity indices at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstantFwi {
    pub ffmc: f64,
    pub isi: f64,
    pub fwi: f64,
    /// The FFMC came from a user override.
    pub specified: bool,
}

/// Daily-granularity indices in effect at an instant, each paired with
/// whether it was specified rather than calculated.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InstantDailyFwi {
    pub ffmc: Option<(f64, bool)>,
    pub dmc: Option<(f64, bool)>,
    pub dc: Option<(f64, bool)>,
    pub bui: Option<(f64, bool)>,
    pub isi: Option<f64>,
    pub fwi: Option<f64>,
}

/// A complete instantaneous sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstantValues {
    pub weather: InstantWeather,
    pub hourly: InstantFwi,
    pub daily: InstantDailyFwi,
}

fn purge_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date()
        .and_time(NaiveTime::MIN)
        + Duration::hours(i64::from(t.hour()))
}

const CALM: f64 = 1e-4;
const NEAR_OPPOSED_LOW: f64 = 179.0 * std::f64::consts::PI / 180.0;
const NEAR_OPPOSED_HIGH: f64 = 181.0 * std::f64::consts::PI / 180.0;

impl WeatherStream {
    /// Weather and indices at `time`. Returns `None` outside the timeline.
    pub fn instantaneous(&mut self, time: NaiveDateTime, options: SampleOptions) -> Option<InstantValues> {
        let nt1 = purge_to_hour(time);
        let nt2 = nt1 + Duration::hours(1);
        self.ensure_calculated();

        let d1 = self.day_index(nt1);
        let d2 = self.day_index(nt2);

        let exact = nt1 == time;
        if d1.is_none() {
            return None;
        }
        let blend = options.temporal_interpolation && d2.is_some() && !exact;

        let (weather, perc2) = if blend {
            self.blended_weather(nt1, nt2, time)
        } else {
            let idx = d1?;
            let hour = nt1.hour() as usize;
            let r = self.days[idx].hourly_weather(hour);
            let flags = self.days[idx].hour_flags(hour);
            let mut precip = r.precip;
            if options.temporal_interpolation && d2.is_none() && !exact {
                // Falling off the end of the stream: no rain attributable.
                precip = 0.0;
            }
            (
                InstantWeather {
                    temp: r.temp,
                    dew: r.dew.unwrap_or(0.0),
                    rh: r.rh,
                    ws: r.ws,
                    gust: r.gust,
                    wd: r.wd,
                    precip,
                    interpolated: flags.interpolated,
                    corrected: flags.corrected,
                },
                0.0,
            )
        };

        let daily = self.daily_sample(time, d1);
        let hourly = self.hourly_sample(nt1, nt2, time, perc2, &weather, &daily, blend);

        Some(InstantValues {
            weather,
            hourly,
            daily,
        })
    }

    fn blended_weather(
        &self,
        nt1: NaiveDateTime,
        nt2: NaiveDateTime,
        time: NaiveDateTime,
    ) -> (InstantWeather, f64) {
        let read = |t: NaiveDateTime| -> HourlyReading {
            match self.day_index(t) {
                Some(idx) => self.days[idx].hourly_weather(t.hour() as usize),
                None => HourlyReading {
                    temp: 0.0,
                    rh: 0.0,
                    precip: 0.0,
                    ws: 0.0,
                    gust: None,
                    wd: 0.0,
                    dew: None,
                },
            }
        };
        let r1 = read(nt1);
        let r2 = read(nt2);

        let perc2 = (time - nt1).num_seconds() as f64 / SECS_PER_HOUR as f64;
        let perc1 = 1.0 - perc2;

        let calm1 = r1.ws < CALM && r1.wd < CALM;
        let calm2 = r2.ws < CALM && r2.wd < CALM;
        let wd_diff = normalize_angle(r2.wd - r1.wd);
        let near_opposed = r1.ws >= CALM
            && r2.ws >= CALM
            && wd_diff > NEAR_OPPOSED_LOW
            && wd_diff < NEAR_OPPOSED_HIGH;
        let before_midpoint = time <= nt1 + Duration::minutes(30);

        let wd = if calm1 {
            r2.wd
        } else if calm2 {
            r1.wd
        } else if near_opposed {
            if before_midpoint {
                r1.wd
            } else {
                r2.wd
            }
        } else {
            let mut d = wd_diff;
            if d > std::f64::consts::PI {
                d -= std::f64::consts::TAU;
            }
            normalize_angle(r2.wd - perc1 * d)
        };

        let ws = if near_opposed {
            if before_midpoint {
                r1.ws
            } else {
                r2.ws
            }
        } else {
            r1.ws * perc1 + r2.ws * perc2
        };

        let interpolated = self
            .day_index(nt1)
            .is_some_and(|idx| self.days[idx].hour_flags(nt1.hour() as usize).interpolated);

        (
            InstantWeather {
                temp: r1.temp * perc1 + r2.temp * perc2,
                dew: r1.dew.unwrap_or(0.0) * perc1 + r2.dew.unwrap_or(0.0) * perc2,
                rh: r1.rh * perc1 + r2.rh * perc2,
                ws,
                gust: match (r1.gust, r2.gust) {
                    (Some(g1), Some(g2)) => Some(g1 * perc1 + g2 * perc2),
                    _ => None,
                },
                wd,
                // Rain is attributed to the hour it fell in.
                precip: r2.precip * perc2,
                interpolated,
                corrected: false,
            },
            perc2,
        )
    }

    fn daily_sample(&mut self, time: NaiveDateTime, d1: Option<usize>) -> InstantDailyFwi {
        let mut daily = InstantDailyFwi {
            ffmc: self.daily_ffmc(time),
            dmc: self.dmc(time),
            dc: self.dc(time),
            bui: self.bui(time),
            isi: self.daily_isi(time),
            fwi: self.daily_fwi(time),
        };
        // Ahead of the first computed fire day only the seed codes exist;
        // derive the daily spread indices they imply.
        if daily.isi.is_none() {
            if let (Some((ffmc, _)), Some(idx)) = (daily.ffmc, d1) {
                let date = self.days[idx].day_start.date();
                let noon_hour = self.location.noon_hour(date).min(23);
                let ws = self.days[idx].hourly_ws[noon_hour];
                let isi = equations::initial_spread_index(ffmc, ws);
                daily.isi = Some(isi);
                daily.fwi = Some(equations::fire_weather_index(
                    isi,
                    daily.bui.map_or(0.0, |(b, _)| b),
                ));
            }
        }
        daily
    }

    #[allow(clippy::too_many_arguments)]
    fn hourly_sample(
        &mut self,
        nt1: NaiveDateTime,
        nt2: NaiveDateTime,
        time: NaiveDateTime,
        perc2: f64,
        weather: &InstantWeather,
        daily: &InstantDailyFwi,
        blend: bool,
    ) -> InstantFwi {
        let ffmc1 = self.hourly_ffmc(nt1).unwrap_or(0.0);
        let specified1 = self.is_hourly_ffmc_specified(nt1);
        let bui = daily.bui.map_or(0.0, |(b, _)| b);

        if !blend {
            let isi = self.hourly_isi(nt1).unwrap_or_else(|| {
                equations::initial_spread_index(ffmc1, weather.ws)
            });
            let fwi = self
                .hourly_fwi(nt1)
                .unwrap_or_else(|| equations::fire_weather_index(isi, bui));
            return InstantFwi {
                ffmc: ffmc1,
                isi,
                fwi,
                specified: specified1,
            };
        }

        let ffmc2 = self.hourly_ffmc(nt2).unwrap_or(ffmc1);
        let specified2 = self.is_hourly_ffmc_specified(nt2);
        let perc1 = 1.0 - perc2;

        let (ffmc, specified) = if specified2 {
            (ffmc1 * perc1 + ffmc2 * perc2, true)
        } else {
            let day_start = WeatherStream::midnight_of(time);
            let date = day_start.date();
            let val = match self.options.ffmc_policy {
                FfmcPolicy::Hybrid => {
                    let prev_daily = self.daily_ffmc(day_start).map_or(0.0, |(v, _)| v);
                    let today_daily = self
                        .daily_ffmc(day_start + Duration::hours(18))
                        .map_or(0.0, |(v, _)| v);
                    let mut rain48 = [0.0; 48];
                    for (k, slot) in rain48.iter_mut().enumerate() {
                        *slot = self.hourly_rain(nt2 - Duration::hours(k as i64));
                    }
                    let secs = (time - day_start).num_seconds() as f64;
                    equations::hourly_ffmc_hybrid(
                        prev_daily,
                        today_daily,
                        ffmc1,
                        &rain48,
                        weather.temp,
                        weather.rh,
                        weather.ws,
                        secs,
                    )
                }
                FfmcPolicy::Lawson => {
                    let prev_daily = self.daily_ffmc(day_start).map_or(0.0, |(v, _)| v);
                    let today_daily = self
                        .daily_ffmc(day_start + Duration::hours(18))
                        .map_or(0.0, |(v, _)| v);
                    let lst_midnight =
                        day_start + Duration::seconds(self.location.lst_shift_secs(date));
                    equations::hourly_ffmc_lawson_contiguous(
                        prev_daily,
                        today_daily,
                        (time - lst_midnight).num_seconds() as f64,
                    )
                }
                FfmcPolicy::VanWagner => equations::hourly_ffmc_van_wagner(
                    ffmc1,
                    weather.precip,
                    weather.temp,
                    weather.rh,
                    weather.ws,
                    (time - nt1).num_seconds() as f64,
                ),
            };
            (val, false)
        };

        let isi = equations::initial_spread_index(ffmc, weather.ws);
        InstantFwi {
            ffmc,
            isi,
            fwi: equations::fire_weather_index(isi, bui),
            specified,
        }
    }
}
