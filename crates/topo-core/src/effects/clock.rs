//! Device clock effect

use crate::errors::ClockError;
use crate::identifiers::DeviceId;
use crate::time::Timestamp;

/// Issues strictly increasing logical timestamps per device
///
/// Timestamps are only issued on the node currently holding a mastership term
/// for the device; other nodes receive [`ClockError::Unavailable`].
pub trait DeviceClockService: Send + Sync {
    /// Issue a fresh timestamp for `device`
    fn timestamp_for(&self, device: &DeviceId) -> Result<Timestamp, ClockError>;

    /// Whether [`Self::timestamp_for`] would currently succeed
    fn is_timestamp_available(&self, device: &DeviceId) -> bool;
}
