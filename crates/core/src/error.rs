//! Error types for the weather stream engine.

/// Error type for all fallible operations on a weather stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The weather file could not be opened or read.
    #[error("weather file unreadable: {0}")]
    ReadFault(#[from] std::io::Error),

    /// A value fell outside its physical range (or a gap was too long to
    /// interpolate) and the active policy rejects the import.
    #[error("invalid data on line {line}: {reason}")]
    InvalidData {
        /// 1-based line number within the file, 0 when not line-specific.
        line: usize,
        /// What was out of range.
        reason: String,
    },

    /// Rows were out of order or left a gap other than one unit.
    #[error("invalid time sequence on line {line}: {reason}")]
    InvalidTime { line: usize, reason: String },

    /// A row fell before the start of the existing timeline.
    #[error("row on line {line} precedes the timeline start")]
    AttemptPrepend { line: usize },

    /// A row would replace existing data and overwriting is not enabled.
    #[error("row on line {line} would overwrite existing data")]
    AttemptOverwrite { line: usize },

    /// A row could not be appended (day-mode conflict or non-contiguous
    /// append position).
    #[error("row on line {line} cannot be appended to the timeline")]
    AttemptAppend { line: usize },

    /// The header line matched no recognized weather file format.
    #[error("unrecognized weather file format")]
    BadFileType,

    /// The first hourly row fell after local solar-mean noon of its day.
    #[error("hourly data must begin at or before solar noon of its first day")]
    StartAfterNoon,

    /// A persisted snapshot predates the supported baseline (or comes from
    /// a newer engine).
    #[error("unsupported snapshot version {version} (supported {min}..={max})")]
    UnsupportedVersion { version: u16, min: u16, max: u16 },
}

/// Outcome of a successful import: row counts plus data-quality diagnostics.
///
/// `interpolated` and `corrected` together correspond to the
/// interpolate-before-invalid-data condition: when both are set the caller
/// should warn that the file needed gap filling *and* value correction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Data rows committed to the stream.
    pub rows: usize,
    /// Missing hours were filled by spline interpolation.
    pub interpolated: bool,
    /// Out-of-range values were kept or clamped under Allow/Fix.
    pub corrected: bool,
    /// Human-readable warnings accumulated during the import.
    pub warnings: Vec<String>,
}

impl ImportReport {
    /// Both gap interpolation and invalid-value correction occurred; data
    /// quality is degraded on two fronts.
    pub fn interpolated_before_invalid_data(&self) -> bool {
        self.interpolated && self.corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_combines_diagnostics() {
        let report = ImportReport {
            rows: 10,
            interpolated: true,
            corrected: true,
            warnings: vec![],
        };
        assert!(report.interpolated_before_invalid_data());
    }

    #[test]
    fn display_names_the_line() {
        let err = StreamError::AttemptPrepend { line: 4 };
        assert!(err.to_string().contains("line 4"));
    }
}
