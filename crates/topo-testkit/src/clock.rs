//! Test device clock

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use topo_core::effects::DeviceClockService;
use topo_core::{ClockError, DeviceId, Timestamp};

/// Issues `(term, tick)` timestamps from one shared ticker.
///
/// Every device must be given a term first; unknown devices get
/// [`ClockError::Unavailable`], like a node that holds no mastership term.
#[derive(Debug, Default)]
pub struct TestDeviceClock {
    terms: Mutex<HashMap<DeviceId, u64>>,
    ticker: AtomicU64,
}

impl TestDeviceClock {
    /// Clock without any device terms
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::set_term`]
    pub fn with_term(self, device: DeviceId, term: u64) -> Self {
        self.set_term(device, term);
        self
    }

    /// Issue timestamps for `device` in `term`
    pub fn set_term(&self, device: DeviceId, term: u64) {
        self.terms.lock().insert(device, term);
    }

    /// Stop issuing timestamps for `device`
    pub fn forget(&self, device: &DeviceId) {
        self.terms.lock().remove(device);
    }

    /// Last tick handed out
    pub fn current_tick(&self) -> u64 {
        self.ticker.load(Ordering::SeqCst)
    }
}

impl DeviceClockService for TestDeviceClock {
    fn timestamp_for(&self, device: &DeviceId) -> Result<Timestamp, ClockError> {
        let term = self
            .terms
            .lock()
            .get(device)
            .copied()
            .ok_or_else(|| ClockError::unavailable(device.clone()))?;
        let tick = self.ticker.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Timestamp::new(term, tick))
    }

    fn is_timestamp_available(&self, device: &DeviceId) -> bool {
        self.terms.lock().contains_key(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_shared_across_devices() {
        let a = DeviceId::new("of:a");
        let b = DeviceId::new("of:b");
        let clock = TestDeviceClock::new()
            .with_term(a.clone(), 1)
            .with_term(b.clone(), 2);

        assert_eq!(clock.timestamp_for(&a), Ok(Timestamp::new(1, 1)));
        assert_eq!(clock.timestamp_for(&b), Ok(Timestamp::new(2, 2)));
        assert_eq!(clock.timestamp_for(&a), Ok(Timestamp::new(1, 3)));
    }

    #[test]
    fn unknown_device_has_no_timestamp() {
        let clock = TestDeviceClock::new();
        let device = DeviceId::new("of:none");
        assert!(!clock.is_timestamp_available(&device));
        assert_eq!(
            clock.timestamp_for(&device),
            Err(ClockError::unavailable(device))
        );
    }
}
