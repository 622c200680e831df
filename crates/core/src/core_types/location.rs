//! Geographic context: latitude/longitude, timezone, DST, and solar events.
//!
//! Sunrise, solar noon, and sunset come from the `sunrise` crate; this module
//! only adapts them to the stream's local-clock representation and flags the
//! polar cases where one or both events do not occur.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use crate::core_types::SECS_PER_DAY;

/// Minimum daylight below which a day is treated as polar night, and the
/// complement above which it is treated as polar day.
const POLAR_MARGIN_SECS: i64 = 5 * 60;

/// A point on the globe together with its civil-time rules.
///
/// The timezone offset is the standard-time offset; daylight saving is
/// modeled as an extra shift active between two days of the year, which is
/// enough to reproduce the original stream semantics without a full tz
/// database. `dst_start_day == dst_end_day` disables DST.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, north positive.
    pub latitude: f64,
    /// Longitude in degrees, east positive.
    pub longitude: f64,
    /// Standard-time offset from UTC in seconds.
    pub timezone_offset_secs: i32,
    /// Shift added to the standard offset while DST is in effect, seconds.
    pub dst_amount_secs: i32,
    /// First day of year (1-based ordinal) on which DST is in effect.
    pub dst_start_day: u32,
    /// Day of year on which DST ends (exclusive).
    pub dst_end_day: u32,
}

impl Default for Location {
    fn default() -> Self {
        Location {
            latitude: 0.0,
            longitude: 0.0,
            timezone_offset_secs: 0,
            dst_amount_secs: 0,
            dst_start_day: 0,
            dst_end_day: 0,
        }
    }
}

/// Solar events for one local calendar day, expressed in the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: NaiveDateTime,
    pub solar_noon: NaiveDateTime,
    pub sunset: NaiveDateTime,
    /// The sun never rises on this day (polar night); `sunrise` is clamped
    /// to the start of the day.
    pub no_sunrise: bool,
    /// The sun never sets on this day (polar day); `sunset` is clamped to
    /// the last second of the day.
    pub no_sunset: bool,
}

impl SunTimes {
    /// Whether the day has a usable rise/set pair for diurnal synthesis.
    pub fn resolvable(&self) -> bool {
        !self.no_sunrise && !self.no_sunset
    }
}

impl Default for SunTimes {
    fn default() -> Self {
        let t = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap_or_default()
            .and_time(NaiveTime::MIN);
        SunTimes {
            sunrise: t,
            solar_noon: t,
            sunset: t,
            no_sunrise: false,
            no_sunset: false,
        }
    }
}

impl Location {
    /// Whether DST is in effect on the given local date.
    pub fn dst_active(&self, date: NaiveDate) -> bool {
        if self.dst_amount_secs == 0 || self.dst_start_day == self.dst_end_day {
            return false;
        }
        let d = date.ordinal();
        if self.dst_start_day <= self.dst_end_day {
            d >= self.dst_start_day && d < self.dst_end_day
        } else {
            // Southern-hemisphere style window wrapping the new year.
            d >= self.dst_start_day || d < self.dst_end_day
        }
    }

    /// Offset from UTC to the local clock on the given date, seconds.
    pub fn utc_offset_secs(&self, date: NaiveDate) -> i64 {
        i64::from(self.timezone_offset_secs)
            + if self.dst_active(date) {
                i64::from(self.dst_amount_secs)
            } else {
                0
            }
    }

    /// Shift between the local clock and local standard time on `date`,
    /// seconds (the DST amount while DST is in effect, else zero).
    pub fn lst_shift_secs(&self, date: NaiveDate) -> i64 {
        if self.dst_active(date) {
            i64::from(self.dst_amount_secs)
        } else {
            0
        }
    }

    /// Solar-mean noon (12:00 local standard time) expressed in the local
    /// clock: 13:00 while DST is in effect, 12:00 otherwise.
    pub fn noon_local(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN)
            + Duration::hours(12)
            + Duration::seconds(self.lst_shift_secs(date))
    }

    /// Hour-of-day index of solar-mean noon in the local clock.
    pub fn noon_hour(&self, date: NaiveDate) -> usize {
        self.noon_local(date).hour() as usize
    }

    /// Sunrise, solar noon, and sunset for a local calendar day.
    ///
    /// Polar day/night is detected from the computed day length; the
    /// affected events are clamped to the day window and flagged so callers
    /// can exclude the day from curve synthesis.
    pub fn sun_times(&self, date: NaiveDate) -> SunTimes {
        let day_start = date.and_time(NaiveTime::MIN);
        let day_end = day_start + Duration::seconds(SECS_PER_DAY - 1);

        let Some(coords) = Coordinates::new(self.latitude, self.longitude) else {
            // Out-of-range coordinates: fall back to a plain 06:00/18:00 day.
            return SunTimes {
                sunrise: day_start + Duration::hours(6),
                solar_noon: day_start + Duration::hours(12),
                sunset: day_start + Duration::hours(18),
                no_sunrise: false,
                no_sunset: false,
            };
        };

        let solar_day = SolarDay::new(coords, date);
        let offset = Duration::seconds(self.utc_offset_secs(date));
        let rise = solar_day.event_time(SolarEvent::Sunrise).naive_utc() + offset;
        let set = solar_day.event_time(SolarEvent::Sunset).naive_utc() + offset;

        let daylight = (set - rise).num_seconds();
        let mut sun = SunTimes {
            sunrise: rise,
            solar_noon: rise + Duration::seconds(daylight.max(0) / 2),
            sunset: set,
            no_sunrise: false,
            no_sunset: false,
        };

        if daylight <= POLAR_MARGIN_SECS {
            // Polar night: no usable rise or set.
            sun.no_sunrise = true;
            sun.no_sunset = true;
            sun.sunrise = day_start;
            sun.sunset = day_end;
            sun.solar_noon = day_start + Duration::hours(12);
        } else if daylight >= SECS_PER_DAY - POLAR_MARGIN_SECS {
            // Polar day: the sun stays up.
            sun.no_sunset = true;
            sun.sunrise = day_start;
            sun.sunset = day_end;
            sun.solar_noon = day_start + Duration::hours(12);
        } else {
            // Clamp events into this local day so hour indexing stays valid.
            if sun.sunrise < day_start {
                sun.sunrise = day_start;
            }
            if sun.sunset > day_end {
                sun.sunset = day_end;
            }
            if sun.solar_noon < sun.sunrise {
                sun.solar_noon = sun.sunrise;
            }
            if sun.solar_noon > sun.sunset {
                sun.solar_noon = sun.sunset;
            }
        }
        sun
    }
}
