use std::fmt;

/// Errors reported by `Scanner::scan` before any rendering takes place.
///
/// Once a scan has started it always produces a `ScanResult`; degraded
/// outcomes are reported through `ScanResult::warnings` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A `ScanConfig` field is out of range.
    InvalidConfig { field: &'static str, reason: String },
    /// The emulator reported a sample rate of zero.
    EmulatorNotReady,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::InvalidConfig { field, reason } => {
                write!(f, "invalid scan config: {}: {}", field, reason)
            }
            ScanError::EmulatorNotReady => write!(f, "emulator reports a zero sample rate"),
        }
    }
}

impl std::error::Error for ScanError {}
