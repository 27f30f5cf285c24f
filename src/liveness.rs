//! Device liveness: online while advertisements keep arriving, offline once
//! none has been seen for longer than a timeout.
//!
//! Each address gets one [`DeviceLivenessTracker`]. The [`LivenessRegistry`]
//! owns all trackers and is itself owned by a single task, so `last_seen` and
//! the online flag of an address always change together in one `&mut` call.
//! Trackers of different devices share nothing.

use crate::mac_address::MacAddress;
use std::collections::HashMap;
use std::time::Duration;

/// Time without advertisements after which a device is considered offline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How often timeouts are checked.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Edge-triggered state change, reported once per actual transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CameOnline,
    WentOffline,
}

impl Transition {
    pub fn is_online(&self) -> bool {
        matches!(self, Transition::CameOnline)
    }
}

/// Online/offline state machine for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLivenessTracker {
    address: MacAddress,
    last_seen: Option<f64>,
    online: bool,
}

impl DeviceLivenessTracker {
    /// Starts offline and never seen.
    pub fn new(address: MacAddress) -> Self {
        Self {
            address,
            last_seen: None,
            online: false,
        }
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn last_seen(&self) -> Option<f64> {
        self.last_seen
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Record an advertisement seen at `timestamp` (monotonic seconds).
    ///
    /// Always leaves the device online with `last_seen = timestamp`; only the
    /// offline -> online edge is reported.
    pub fn observe(&mut self, timestamp: f64) -> Option<Transition> {
        let was_online = self.online;
        self.last_seen = Some(timestamp);
        self.online = true;
        (!was_online).then_some(Transition::CameOnline)
    }

    /// Go offline if more than `threshold` has passed since the last
    /// observation. Repeated calls after the transition are no-ops.
    pub fn check_timeout(&mut self, now: f64, threshold: Duration) -> Option<Transition> {
        let last_seen = self.last_seen?;
        if self.online && now - last_seen > threshold.as_secs_f64() {
            self.online = false;
            return Some(Transition::WentOffline);
        }
        None
    }
}

#[derive(Debug)]
struct Registration {
    tracker: DeviceLivenessTracker,
    observers: usize,
}

/// One tracker per address, shared by every observer of that address.
#[derive(Debug)]
pub struct LivenessRegistry {
    threshold: Duration,
    trackers: HashMap<MacAddress, Registration>,
}

impl LivenessRegistry {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            trackers: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Register an observer for `address`. Returns `true` when this created
    /// the tracker; later registrations reuse it.
    pub fn register(&mut self, address: MacAddress) -> bool {
        match self.trackers.get_mut(&address) {
            Some(registration) => {
                registration.observers += 1;
                false
            }
            None => {
                self.trackers.insert(
                    address,
                    Registration {
                        tracker: DeviceLivenessTracker::new(address),
                        observers: 1,
                    },
                );
                true
            }
        }
    }

    /// Drop one observer. Returns `true` when the tracker itself was removed.
    pub fn unregister(&mut self, address: MacAddress) -> bool {
        let Some(registration) = self.trackers.get_mut(&address) else {
            return false;
        };
        registration.observers -= 1;
        if registration.observers == 0 {
            self.trackers.remove(&address);
            return true;
        }
        false
    }

    pub fn get(&self, address: &MacAddress) -> Option<&DeviceLivenessTracker> {
        self.trackers.get(address).map(|r| &r.tracker)
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Feed an advertisement timestamp. Unregistered addresses are ignored.
    pub fn observe(&mut self, address: MacAddress, timestamp: f64) -> Option<Transition> {
        self.trackers
            .get_mut(&address)
            .and_then(|r| r.tracker.observe(timestamp))
    }

    /// Run the timeout check for every tracked device.
    pub fn check_timeouts(&mut self, now: f64) -> Vec<(MacAddress, Transition)> {
        let threshold = self.threshold;
        let mut changes: Vec<(MacAddress, Transition)> = self
            .trackers
            .iter_mut()
            .filter_map(|(address, r)| {
                r.tracker
                    .check_timeout(now, threshold)
                    .map(|change| (*address, change))
            })
            .collect();
        changes.sort_by_key(|(address, _)| *address);
        changes
    }
}

impl Default for LivenessRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}
