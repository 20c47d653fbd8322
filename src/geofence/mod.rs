//! Geofence monitoring engine.
//!
//! Tracks inside/outside membership for every user-defined zone against
//! the coordinate stream and emits transition events.
//!
//! Membership is baselined on the first check after construction or after
//! any zone-set mutation, without emitting events — this prevents false
//! "just entered" events for zones the user is already inside when the
//! app starts. Any add/update/delete invalidates the *entire* baseline,
//! not just the affected zone: cheap to reason about, at the cost of one
//! missed-transition cycle after an edit.

mod distance;

pub use distance::haversine_distance_m;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config;
use crate::directory::Directory;
use crate::escalation::message;
use crate::notify::AlertDispatcher;
use crate::signal::Signal;
use crate::storage::{self, keys, KeyValueStore};
use crate::types::{Coordinate, SafetyZone, ZoneEvent, ZoneId, ZoneTransition};

/// Zone fields supplied at creation; the id is assigned by the engine.
#[derive(Debug, Clone)]
pub struct ZoneDraft {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub notify_on_enter: bool,
    pub notify_on_leave: bool,
    pub notification_contact_ids: BTreeSet<u64>,
    pub notification_group_ids: BTreeSet<u64>,
}

// ============================================================================
// Engine core (deterministic, no timers)
// ============================================================================

/// Zone set plus transient per-zone membership state.
pub struct GeofenceEngine {
    zones: Vec<SafetyZone>,
    /// Inside/outside per zone id. Valid only while `baseline_ready`.
    membership: HashMap<ZoneId, bool>,
    baseline_ready: bool,
    next_id: u64,
    store: Arc<dyn KeyValueStore>,
}

impl GeofenceEngine {
    /// Load zones from the store. Malformed data starts the zone set empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let zones: Vec<SafetyZone> = storage::load_json(store.as_ref(), keys::SAFETY_ZONES);
        let next_id = zones.iter().map(|z| z.id).max().map_or(1, |id| id + 1);
        debug!(zones = zones.len(), "Safety zones loaded");
        Self {
            zones,
            membership: HashMap::new(),
            baseline_ready: false,
            next_id,
            store,
        }
    }

    pub fn zones(&self) -> &[SafetyZone] {
        &self.zones
    }

    fn save_zones(&self) {
        storage::save_json(self.store.as_ref(), keys::SAFETY_ZONES, &self.zones);
    }

    /// Drop all cached membership. The next `check_zones` call re-baselines
    /// every zone without emitting events.
    pub fn reset_monitoring(&mut self) {
        self.baseline_ready = false;
        self.membership.clear();
    }

    pub fn add_zone(&mut self, draft: ZoneDraft) -> ZoneId {
        let id = self.next_id;
        self.next_id += 1;
        self.zones.push(SafetyZone {
            id,
            name: draft.name,
            latitude: draft.latitude,
            longitude: draft.longitude,
            radius: draft.radius,
            notify_on_enter: draft.notify_on_enter,
            notify_on_leave: draft.notify_on_leave,
            notification_contact_ids: draft.notification_contact_ids,
            notification_group_ids: draft.notification_group_ids,
        });
        self.save_zones();
        self.reset_monitoring();
        id
    }

    /// Replace a zone by id. Unknown ids are ignored but still invalidate
    /// the baseline, matching the "any mutation" contract.
    pub fn update_zone(&mut self, updated: SafetyZone) {
        if let Some(zone) = self.zones.iter_mut().find(|z| z.id == updated.id) {
            *zone = updated;
            self.save_zones();
        }
        self.reset_monitoring();
    }

    pub fn delete_zone(&mut self, id: ZoneId) {
        self.zones.retain(|z| z.id != id);
        self.save_zones();
        self.reset_monitoring();
    }

    /// Establish baseline membership for every zone, emitting nothing.
    fn initialize_baseline(&mut self, coords: Coordinate) {
        for zone in &self.zones {
            let inside = haversine_distance_m(coords, zone.center()) <= zone.radius;
            self.membership.insert(zone.id, inside);
        }
        self.baseline_ready = true;
        debug!(zones = self.zones.len(), "Zone membership baseline established");
    }

    /// Check every zone against the given coordinate.
    ///
    /// The first call after construction or after any zone mutation only
    /// establishes the baseline and returns no transitions. On subsequent
    /// calls a transition is reported only when membership flips AND the
    /// zone has the corresponding notify flag set. Zones with unknown
    /// prior membership never fire.
    pub fn check_zones(&mut self, coords: Coordinate) -> Vec<(SafetyZone, ZoneTransition)> {
        if !self.baseline_ready {
            self.initialize_baseline(coords);
            return Vec::new();
        }

        let mut fired = Vec::new();
        for zone in &self.zones {
            let inside = haversine_distance_m(coords, zone.center()) <= zone.radius;
            let Some(&was_inside) = self.membership.get(&zone.id) else {
                continue;
            };

            if inside && !was_inside && zone.notify_on_enter {
                fired.push((zone.clone(), ZoneTransition::Enter));
            } else if !inside && was_inside && zone.notify_on_leave {
                fired.push((zone.clone(), ZoneTransition::Leave));
            }

            self.membership.insert(zone.id, inside);
        }
        fired
    }
}

// ============================================================================
// Monitor (events, recipients, auto-clear timer)
// ============================================================================

/// Wraps the engine with the notification side effects: recipient
/// resolution, outbound dispatch, and the short-lived event observable
/// that auto-clears after a few seconds for UI acknowledgment.
pub struct GeofenceMonitor {
    engine: GeofenceEngine,
    directory: Arc<RwLock<Directory>>,
    dispatcher: Arc<dyn AlertDispatcher>,
    /// Most recent fired event; `None` once acknowledged or auto-cleared.
    pub event: Signal<Option<ZoneEvent>>,
    clear_task: Option<(CancellationToken, JoinHandle<()>)>,
}

impl GeofenceMonitor {
    pub fn new(
        engine: GeofenceEngine,
        directory: Arc<RwLock<Directory>>,
        dispatcher: Arc<dyn AlertDispatcher>,
    ) -> Self {
        Self {
            engine,
            directory,
            dispatcher,
            event: Signal::new(None),
            clear_task: None,
        }
    }

    pub fn engine(&self) -> &GeofenceEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut GeofenceEngine {
        &mut self.engine
    }

    /// Process one coordinate update. Updates are handled strictly in
    /// arrival order by the single owning task.
    pub fn on_coordinate(&mut self, coords: Coordinate) {
        for (zone, transition) in self.engine.check_zones(coords) {
            self.fire(zone, transition);
        }
    }

    /// Resolve recipients and dispatch one transition event.
    ///
    /// Notification is fire-and-forget; the observable event is exposed
    /// regardless of whether the dispatch succeeds. With no resolvable
    /// recipients there is nothing to notify and no event is raised.
    fn fire(&mut self, zone: SafetyZone, transition: ZoneTransition) {
        let recipients = match self.directory.read() {
            Ok(dir) => dir.resolve_recipients(
                &zone.notification_contact_ids,
                &zone.notification_group_ids,
            ),
            Err(e) => {
                warn!(error = %e, "Directory lock poisoned — skipping zone notification");
                return;
            }
        };

        if recipients.is_empty() {
            debug!(zone = %zone.name, %transition, "Zone transition with no recipients");
            return;
        }

        info!(
            zone = %zone.name,
            %transition,
            recipients = recipients.len(),
            "Zone transition fired"
        );

        let subject = message::zone_subject(&zone, transition);
        let body = message::zone_body(&zone, transition);
        self.dispatcher.send(&recipients, &subject, &body);

        self.event.set(Some(ZoneEvent {
            zone,
            transition,
            timestamp: chrono::Utc::now(),
        }));
        self.arm_event_clear();
    }

    /// Arm the auto-clear timer, replacing any previous one. The previous
    /// timer is cancelled first so a stale timer can never clear a newer
    /// event early.
    fn arm_event_clear(&mut self) {
        self.disarm_event_clear();

        let token = CancellationToken::new();
        let child = token.clone();
        let event = self.event.clone();
        let delay = config::get().timers.zone_event_clear_secs;
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(std::time::Duration::from_secs(delay)) => {
                    event.set(None);
                }
            }
        });
        self.clear_task = Some((token, handle));
    }

    fn disarm_event_clear(&mut self) {
        if let Some((token, handle)) = self.clear_task.take() {
            token.cancel();
            handle.abort();
        }
    }

    /// Cancel the pending auto-clear timer. Required on teardown; a leaked
    /// armed timer is a defect.
    pub fn shutdown(&mut self) {
        self.disarm_event_clear();
        self.event.set(None);
    }
}

impl Drop for GeofenceMonitor {
    fn drop(&mut self) {
        self.disarm_event_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{RecordingDispatcher, SentAlert};
    use crate::storage::MemoryStore;

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    fn draft(name: &str, lat: f64, lon: f64, radius: f64) -> ZoneDraft {
        ZoneDraft {
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
            radius,
            notify_on_enter: true,
            notify_on_leave: false,
            notification_contact_ids: BTreeSet::new(),
            notification_group_ids: BTreeSet::new(),
        }
    }

    const HOME: Coordinate = Coordinate::new(40.0, -74.0);
    // ~555 m north of HOME; outside a 200 m zone centered on HOME.
    const AWAY: Coordinate = Coordinate::new(40.005, -74.0);

    #[test]
    fn test_first_check_is_baseline_only() {
        let mut engine = GeofenceEngine::load(store());
        engine.add_zone(draft("Home", HOME.latitude, HOME.longitude, 200.0));

        // First check: inside the zone, but only the baseline is taken.
        assert!(engine.check_zones(HOME).is_empty());
        // Still inside: no flip, no event.
        assert!(engine.check_zones(HOME).is_empty());
    }

    #[test]
    fn test_enter_fires_once() {
        let mut engine = GeofenceEngine::load(store());
        engine.add_zone(draft("Home", HOME.latitude, HOME.longitude, 200.0));

        assert!(engine.check_zones(AWAY).is_empty()); // baseline: outside
        let fired = engine.check_zones(HOME);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, ZoneTransition::Enter);

        // Leaving: notify_on_leave is false, so nothing fires.
        assert!(engine.check_zones(AWAY).is_empty());
    }

    #[test]
    fn test_leave_respects_flag() {
        let mut engine = GeofenceEngine::load(store());
        let mut d = draft("Home", HOME.latitude, HOME.longitude, 200.0);
        d.notify_on_enter = false;
        d.notify_on_leave = true;
        engine.add_zone(d);

        assert!(engine.check_zones(HOME).is_empty()); // baseline: inside
        assert!(engine.check_zones(HOME).is_empty());
        let fired = engine.check_zones(AWAY);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, ZoneTransition::Leave);
    }

    #[test]
    fn test_any_mutation_invalidates_all_baselines() {
        let mut engine = GeofenceEngine::load(store());
        engine.add_zone(draft("Home", HOME.latitude, HOME.longitude, 200.0));
        engine.add_zone(draft("Far", 10.0, 10.0, 100.0));

        assert!(engine.check_zones(AWAY).is_empty()); // baseline

        // Deleting the unrelated zone still invalidates everything.
        let far_id = engine.zones()[1].id;
        engine.delete_zone(far_id);

        // Would be an enter, but the cycle after a mutation is baseline-only.
        assert!(engine.check_zones(HOME).is_empty());
        // Flip now detectable again.
        assert_eq!(engine.check_zones(AWAY).len(), 0); // leave flag unset
    }

    #[test]
    fn test_zone_ids_are_stable_and_unique() {
        let mut engine = GeofenceEngine::load(store());
        let a = engine.add_zone(draft("A", 0.0, 0.0, 50.0));
        let b = engine.add_zone(draft("B", 1.0, 1.0, 50.0));
        assert_ne!(a, b);
        engine.delete_zone(a);
        let c = engine.add_zone(draft("C", 2.0, 2.0, 50.0));
        assert_ne!(b, c);
    }

    #[test]
    fn test_zones_persist_across_loads() {
        let st = store();
        {
            let mut engine = GeofenceEngine::load(st.clone());
            engine.add_zone(draft("Home", HOME.latitude, HOME.longitude, 200.0));
        }
        let engine = GeofenceEngine::load(st);
        assert_eq!(engine.zones().len(), 1);
        assert_eq!(engine.zones()[0].name, "Home");
    }

    #[tokio::test]
    async fn test_monitor_dispatches_to_zone_recipients() {
        let st = store();
        let mut dir = Directory::load(st.clone());
        let contact = dir.add_contact("A", "111").unwrap();
        let directory = Arc::new(RwLock::new(dir));
        let dispatcher = Arc::new(RecordingDispatcher::new());

        let mut engine = GeofenceEngine::load(st);
        let mut d = draft("Home", HOME.latitude, HOME.longitude, 200.0);
        d.notification_contact_ids = BTreeSet::from([contact]);
        engine.add_zone(d);

        let mut monitor =
            GeofenceMonitor::new(engine, directory, dispatcher.clone());
        monitor.on_coordinate(AWAY); // baseline
        monitor.on_coordinate(HOME); // enter

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            SentAlert::Message {
                recipients,
                subject,
                ..
            } => {
                assert_eq!(recipients.len(), 1);
                assert!(subject.contains("entered"));
            }
            other => panic!("unexpected outbound action: {other:?}"),
        }
        assert!(monitor.event.get().is_some());
        monitor.shutdown();
        assert!(monitor.event.get().is_none());
    }

    #[tokio::test]
    async fn test_monitor_without_recipients_raises_no_event() {
        let st = store();
        let directory = Arc::new(RwLock::new(Directory::load(st.clone())));
        let dispatcher = Arc::new(RecordingDispatcher::new());

        let mut engine = GeofenceEngine::load(st);
        engine.add_zone(draft("Home", HOME.latitude, HOME.longitude, 200.0));

        let mut monitor =
            GeofenceMonitor::new(engine, directory, dispatcher.clone());
        monitor.on_coordinate(AWAY);
        monitor.on_coordinate(HOME);

        assert!(dispatcher.sent().is_empty());
        assert!(monitor.event.get().is_none());
    }
}
