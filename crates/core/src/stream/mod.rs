//! The weather stream: an ordered, contiguous run of day records with lazy
//! derived-value calculation.

pub mod day;
pub mod sample;
pub mod store;

pub use day::{
    DailyFwi, DailySummaryValues, DayMode, DayRecord, FwiRecord, HourFlags, HourSpan,
    HourlyFwi, HourlyReading,
};
pub use sample::{InstantDailyFwi, InstantFwi, InstantValues, InstantWeather, SampleOptions};
pub use store::{SunWarnings, WeatherStream};
