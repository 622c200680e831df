//! The FWI computation chain: published equations plus the per-day
//! orchestration that walks the timeline in chronological order.

pub mod chain;
pub mod equations;
