//! Per-device sessions: decode every rule on each advertisement, feed the
//! liveness trackers and turn timer ticks into offline transitions.
//!
//! The [`Orchestrator`] is owned by the run loop, so advertisements and ticks
//! for an address are always applied one after another.

use crate::config::{Config, DeviceConfig};
use crate::decode::decode;
use crate::event::{
    AdvertisementView, Event, LivenessView, RuleView, advertisement_unique_id,
    connectivity_unique_id, rule_unique_id,
};
use crate::extract::extract;
use crate::liveness::{LivenessRegistry, Transition};
use crate::mac_address::MacAddress;
use crate::rule::{DecodeRule, RuleId, RuleSpec};
use crate::rule_set::{CleanupError, ResourceCleanup, RuleSet, RuleSetError};
use crate::snapshot::AdvertisementSnapshot;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Bookkeeping of published unique ids, kept by whoever presents the events.
pub trait EntityRegistry {
    /// Returns `false` if the id was already registered.
    fn register(&mut self, unique_id: String) -> bool;
    /// Returns `false` if the id was not registered.
    fn unregister(&mut self, unique_id: &str) -> bool;
    fn contains(&self, unique_id: &str) -> bool;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryEntityRegistry {
    ids: BTreeSet<String>,
}

impl InMemoryEntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl EntityRegistry for InMemoryEntityRegistry {
    fn register(&mut self, unique_id: String) -> bool {
        self.ids.insert(unique_id)
    }

    fn unregister(&mut self, unique_id: &str) -> bool {
        self.ids.remove(unique_id)
    }

    fn contains(&self, unique_id: &str) -> bool {
        self.ids.contains(unique_id)
    }
}

/// Releases the rule entity of one device when its rule is removed.
struct RuleEntities<'a, E: EntityRegistry> {
    registry: &'a mut E,
    address: MacAddress,
}

impl<E: EntityRegistry> ResourceCleanup for RuleEntities<'_, E> {
    fn release(&mut self, id: &RuleId) -> Result<(), CleanupError> {
        if self.registry.unregister(&rule_unique_id(&self.address, id)) {
            Ok(())
        } else {
            Err(CleanupError {
                id: id.clone(),
                reason: "entity was not registered".to_string(),
            })
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("device {0} is not configured")]
    UnknownDevice(MacAddress),
    #[error("device {0} is already configured")]
    DuplicateDevice(MacAddress),
    #[error("device {address}: {source}")]
    Rules {
        address: MacAddress,
        #[source]
        source: RuleSetError,
    },
}

/// A configured device and its rules.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSession {
    pub address: MacAddress,
    /// Configured name, or the first advertised one.
    pub name: Option<String>,
    /// Name shown on every view; the address until a name is known.
    pub title: String,
    pub rules: RuleSet,
}

impl DeviceSession {
    /// Take the advertised local name as title when none is configured.
    /// The first one wins.
    fn adopt_name(&mut self, advertised: Option<&str>) {
        if self.name.is_some() {
            return;
        }
        if let Some(name) = advertised.filter(|name| !name.is_empty()) {
            info!(address = %self.address, advertised = name, "using advertised name as title");
            self.name = Some(name.to_string());
            self.title = name.to_string();
        }
    }
}

impl From<DeviceConfig> for DeviceSession {
    fn from(device: DeviceConfig) -> Self {
        Self {
            address: device.address,
            title: device.title(),
            name: device.name,
            rules: device.rules,
        }
    }
}

pub struct Orchestrator<E: EntityRegistry = InMemoryEntityRegistry> {
    sessions: BTreeMap<MacAddress, DeviceSession>,
    liveness: LivenessRegistry,
    entities: E,
}

impl Orchestrator<InMemoryEntityRegistry> {
    pub fn new(config: Config, threshold: Duration) -> Result<Self, SessionError> {
        Self::with_registry(config, threshold, InMemoryEntityRegistry::new())
    }
}

impl<E: EntityRegistry> Orchestrator<E> {
    pub fn with_registry(
        config: Config,
        threshold: Duration,
        entities: E,
    ) -> Result<Self, SessionError> {
        let mut orchestrator = Self {
            sessions: BTreeMap::new(),
            liveness: LivenessRegistry::new(threshold),
            entities,
        };
        for device in config.devices {
            orchestrator.add_device(device)?;
        }
        Ok(orchestrator)
    }

    /// Start a session: one liveness tracker plus the advertisement,
    /// connectivity and rule entities.
    pub fn add_device(&mut self, device: DeviceConfig) -> Result<(), SessionError> {
        let address = device.address;
        if self.sessions.contains_key(&address) {
            return Err(SessionError::DuplicateDevice(address));
        }
        let session = DeviceSession::from(device);

        self.liveness.register(address);
        self.entities.register(advertisement_unique_id(&address));
        self.entities.register(connectivity_unique_id(&address));
        for rule in &session.rules {
            self.entities.register(rule_unique_id(&address, rule.id()));
        }

        info!(%address, title = %session.title, rules = session.rules.len(), "device session started");
        self.sessions.insert(address, session);
        Ok(())
    }

    /// Tear a session down, releasing its tracker and every entity.
    pub fn remove_device(&mut self, address: MacAddress) -> Result<DeviceSession, SessionError> {
        let session = self
            .sessions
            .remove(&address)
            .ok_or(SessionError::UnknownDevice(address))?;

        for rule in &session.rules {
            self.entities.unregister(&rule_unique_id(&address, rule.id()));
        }
        self.entities.unregister(&connectivity_unique_id(&address));
        self.entities.unregister(&advertisement_unique_id(&address));
        self.liveness.unregister(address);

        info!(%address, "device session stopped");
        Ok(session)
    }

    pub fn session(&self, address: &MacAddress) -> Option<&DeviceSession> {
        self.sessions.get(address)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &DeviceSession> {
        self.sessions.values()
    }

    pub fn liveness(&self) -> &LivenessRegistry {
        &self.liveness
    }

    pub fn entities(&self) -> &E {
        &self.entities
    }

    /// Current configuration, including rule edits made since start.
    pub fn config(&self) -> Config {
        Config {
            devices: self
                .sessions
                .values()
                .map(|session| DeviceConfig {
                    address: session.address,
                    name: session.name.clone(),
                    rules: session.rules.clone(),
                })
                .collect(),
        }
    }

    /// Decode one advertisement. Advertisements from addresses without a
    /// session produce nothing.
    pub fn handle_advertisement(&mut self, snapshot: &AdvertisementSnapshot) -> Vec<Event> {
        let Some(session) = self.sessions.get_mut(&snapshot.address) else {
            debug!(address = %snapshot.address, "ignoring unconfigured device");
            return Vec::new();
        };
        session.adopt_name(snapshot.name.as_deref());
        let session = &*session;

        let mut events = Vec::with_capacity(session.rules.len() + 2);
        events.push(Event::Advertisement(AdvertisementView::new(
            &session.title,
            snapshot,
        )));

        for rule in &session.rules {
            let field = decode(extract(snapshot, rule), rule);
            if !field.available {
                debug!(address = %snapshot.address, rule = %rule.id(), "field unavailable");
            }
            events.push(Event::Rule(RuleView::new(
                &session.title,
                snapshot,
                rule,
                field,
            )));
        }

        if let Some(change) = self.liveness.observe(snapshot.address, snapshot.timestamp) {
            events.push(liveness_event(session, change));
        }

        events
    }

    /// Run the timeout check at `now` (monotonic seconds).
    pub fn handle_tick(&mut self, now: f64) -> Vec<Event> {
        self.liveness
            .check_timeouts(now)
            .into_iter()
            .filter_map(|(address, change)| {
                self.sessions
                    .get(&address)
                    .map(|session| liveness_event(session, change))
            })
            .collect()
    }

    /// Apply the latest already known advertisement of every configured
    /// device, so state is available before the next live one arrives.
    pub fn seed(&mut self, known: &[AdvertisementSnapshot]) -> Vec<Event> {
        let mut latest: BTreeMap<MacAddress, &AdvertisementSnapshot> = BTreeMap::new();
        for snapshot in known {
            if !self.sessions.contains_key(&snapshot.address) {
                continue;
            }
            latest
                .entry(snapshot.address)
                .and_modify(|current| {
                    if snapshot.timestamp >= current.timestamp {
                        *current = snapshot;
                    }
                })
                .or_insert(snapshot);
        }

        latest
            .into_values()
            .flat_map(|snapshot| self.handle_advertisement(snapshot))
            .collect()
    }

    fn session_mut(&mut self, address: &MacAddress) -> Result<&mut DeviceSession, SessionError> {
        self.sessions
            .get_mut(address)
            .ok_or(SessionError::UnknownDevice(*address))
    }

    pub fn add_rule(&mut self, address: MacAddress, spec: RuleSpec) -> Result<RuleId, SessionError> {
        let session = self.session_mut(&address)?;
        let id = session
            .rules
            .add(spec)
            .map_err(|source| SessionError::Rules { address, source })?;
        self.entities.register(rule_unique_id(&address, &id));
        Ok(id)
    }

    pub fn edit_rule(
        &mut self,
        address: MacAddress,
        id: &RuleId,
        spec: RuleSpec,
    ) -> Result<(), SessionError> {
        self.session_mut(&address)?
            .rules
            .edit(id, spec)
            .map_err(|source| SessionError::Rules { address, source })
    }

    /// Remove a rule and unregister its entity.
    pub fn remove_rule(
        &mut self,
        address: MacAddress,
        id: &RuleId,
    ) -> Result<DecodeRule, SessionError> {
        let session = self
            .sessions
            .get_mut(&address)
            .ok_or(SessionError::UnknownDevice(address))?;
        let mut cleanup = RuleEntities {
            registry: &mut self.entities,
            address,
        };
        session
            .rules
            .remove(id, &mut cleanup)
            .map_err(|source| SessionError::Rules { address, source })
    }
}

fn liveness_event(session: &DeviceSession, change: Transition) -> Event {
    match change {
        Transition::CameOnline => info!(address = %session.address, "device online"),
        Transition::WentOffline => info!(address = %session.address, "device offline"),
    }
    Event::Liveness(LivenessView::new(
        &session.title,
        session.address,
        change.is_online(),
    ))
}
