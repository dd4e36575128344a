//! Marker errors for the expected, non-fatal device conditions.

use std::fmt;

/// An asynchronous read has not completed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotReady;

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not ready")
    }
}

impl std::error::Error for NotReady {}

/// The sensor answered but flagged the sample as unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementInvalid;

impl fmt::Display for MeasurementInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("measurement invalid")
    }
}

impl std::error::Error for MeasurementInvalid {}

/// The vision service could not find the requested target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetNotFound;

impl fmt::Display for TargetNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("target not found")
    }
}

impl std::error::Error for TargetNotFound {}
