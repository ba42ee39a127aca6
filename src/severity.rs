use tracing::Level;

/// Numeric log severity.
///
/// The four well-known severities get preallocated counter tables. Any other
/// value is a custom severity whose table is allocated on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Severity(pub i32);

impl Severity {
    pub const DEBUG: Severity = Severity(-4);
    pub const INFO: Severity = Severity(0);
    pub const WARN: Severity = Severity(4);
    pub const ERROR: Severity = Severity(8);
    /// `tracing`'s TRACE level, which sits below [`Severity::DEBUG`].
    pub const TRACE: Severity = Severity(-8);
}

/// TRACE has no preallocated table, so TRACE events go through the locked
/// custom-severity lookup and pay for a read lock and an `Arc` clone.
impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE => Severity::TRACE,
            Level::DEBUG => Severity::DEBUG,
            Level::INFO => Severity::INFO,
            Level::WARN => Severity::WARN,
            _ => Severity::ERROR,
        }
    }
}

impl From<&Level> for Severity {
    fn from(level: &Level) -> Self {
        Severity::from(*level)
    }
}
