//! Fire Weather Stream Engine
//!
//! Maintains a per-location, per-day/per-hour weather record and derives
//! the Canadian Fire Weather Index family of codes (FFMC, DMC, DC, BUI,
//! ISI, FWI) from partial observations. Callers supply daily summaries or
//! complete hourly observations; the engine synthesizes whichever
//! representation is missing and keeps every derived value consistent
//! whenever raw inputs change.
//!
//! The moving parts:
//! - a contiguous per-day timeline store with one stream-wide dirty flag
//!   and lazy whole-timeline recomputation,
//! - diurnal curve fitting that expands daily min/max aggregates into 24
//!   hourly values anchored on sunrise, solar noon, and sunset,
//! - the FWI chain with three selectable hourly-FFMC policies and
//!   specified-value overrides,
//! - a weather-file import pipeline with column alias detection,
//!   validation/correction policies, and missing-hour spline interpolation.

// Core types and geographic context
pub mod core_types;

// Engine modules
pub mod diurnal;
pub mod error;
pub mod fwi;
pub mod import;
pub mod persist;
pub mod stream;

// Re-export the primary surface
pub use core_types::{CurveParams, FfmcPolicy, Location, StartingCodes, StreamOptions, SunTimes};
pub use error::{ImportReport, StreamError};
pub use import::{import_reader, import_text, ImportOptions, InvalidPolicy};
pub use persist::{StreamSnapshot, MIN_SUPPORTED_VERSION, SNAPSHOT_VERSION};
pub use stream::{
    DailySummaryValues, DayMode, HourlyReading, InstantValues, SampleOptions, SunWarnings,
    WeatherStream,
};
