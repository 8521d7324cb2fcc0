//! Per-unit aura storage and interest lists.

use std::collections::HashMap;
use std::rc::Rc;

use super::{
    Aura, AuraConfig, AuraEvent, AuraId, ExclusiveEffect, ExclusiveRegistry, ObserverList,
};
use crate::combat::ActionId;
use crate::error::{SimError, SimResult};
use crate::metrics::AuraMetrics;
use crate::simulation::Simulation;
use crate::time::SimTime;
use crate::unit::UnitId;

/// Sanity cap on auras registered to one unit.
pub const MAX_AURAS_PER_UNIT: usize = 200;

/// Per-iteration reset work registered on a unit.
pub type ResetEffect = Rc<dyn Fn(&mut Simulation, UnitId) -> SimResult<()>>;

/// Which list a link operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKey {
    Expiring,
    Event(AuraEvent),
}

/// Every aura registered on one unit plus the lists that index the active ones.
pub struct AuraTracker {
    unit: UnitId,
    auras: Vec<Aura>,
    by_label: HashMap<String, u32>,
    by_tag: HashMap<String, Vec<u32>>,
    expiring: ObserverList,
    dispatch: [ObserverList; AuraEvent::COUNT],
    exclusive: ExclusiveRegistry,
    reset_effects: Vec<ResetEffect>,
    min_expires: SimTime,
}

impl AuraTracker {
    /// Creates an empty tracker owned by `unit`.
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            auras: Vec::new(),
            by_label: HashMap::new(),
            by_tag: HashMap::new(),
            expiring: ObserverList::default(),
            dispatch: Default::default(),
            exclusive: ExclusiveRegistry::default(),
            reset_effects: Vec::new(),
            min_expires: SimTime::NEVER,
        }
    }

    /// Validates and stores a new aura.
    ///
    /// # Errors
    /// - `SimError::EmptyAuraLabel` - Label is empty
    /// - `SimError::DuplicateAura` - Label already registered on this unit
    /// - `SimError::TooManyAuras` - Unit is at the sanity cap
    /// - `SimError::ZeroDuration` - Duration is zero
    pub(crate) fn register(&mut self, unit_label: &str, config: AuraConfig) -> SimResult<AuraId> {
        if config.label.is_empty() {
            return Err(SimError::EmptyAuraLabel {
                unit: unit_label.to_string(),
            });
        }
        if self.by_label.contains_key(&config.label) {
            return Err(SimError::DuplicateAura {
                unit: unit_label.to_string(),
                label: config.label,
            });
        }
        if self.auras.len() >= MAX_AURAS_PER_UNIT {
            return Err(SimError::TooManyAuras {
                unit: unit_label.to_string(),
                count: self.auras.len(),
                label: config.label,
            });
        }
        if config.duration == SimTime::ZERO {
            return Err(SimError::ZeroDuration {
                label: config.label,
            });
        }

        let index = self.auras.len() as u32;
        let id = AuraId::new(self.unit, index);
        let exclusive = config
            .exclusive
            .iter()
            .map(|(category, priority)| ExclusiveEffect {
                category: self.exclusive.category(category),
                priority: *priority,
            })
            .collect();

        self.by_label.insert(config.label.clone(), index);
        if let Some(tag) = &config.tag {
            self.by_tag.entry(tag.clone()).or_default().push(index);
        }

        self.auras.push(Aura {
            id,
            label: config.label,
            tag: config.tag,
            action_id: config.action_id,
            duration: config.duration,
            max_stacks: config.max_stacks,
            exclusive,
            hooks: config.hooks,
            handlers: config.handlers,
            active: false,
            stacks: 0,
            start_time: SimTime::ZERO,
            expires: SimTime::ZERO,
            fade_time: None,
            initialized: false,
            metrics: AuraMetrics::default(),
            expiring_slot: None,
            dispatch_slots: [None; AuraEvent::COUNT],
        });

        Ok(id)
    }

    /// Owning unit.
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Number of registered auras.
    pub fn len(&self) -> usize {
        self.auras.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.auras.is_empty()
    }

    /// All registered auras in registration order.
    pub fn auras(&self) -> &[Aura] {
        &self.auras
    }

    /// Aura at `index`.
    pub fn get(&self, index: u32) -> Option<&Aura> {
        self.auras.get(index as usize)
    }

    pub(crate) fn get_mut(&mut self, index: u32) -> Option<&mut Aura> {
        self.auras.get_mut(index as usize)
    }

    /// Aura registered under `label`.
    pub fn find(&self, label: &str) -> Option<AuraId> {
        self.by_label
            .get(label)
            .map(|index| AuraId::new(self.unit, *index))
    }

    /// True when an aura with `label` is registered and active.
    pub fn has_active(&self, label: &str) -> bool {
        self.by_label
            .get(label)
            .is_some_and(|index| self.auras[*index as usize].active)
    }

    /// First aura registered with `action_id`, in registration order.
    pub fn find_by_action_id(&self, action_id: ActionId) -> Option<AuraId> {
        self.auras
            .iter()
            .position(|aura| aura.action_id == Some(action_id))
            .map(|index| AuraId::new(self.unit, index as u32))
    }

    /// Every aura registered under `tag`.
    pub fn with_tag(&self, tag: &str) -> Vec<AuraId> {
        self.tagged(tag)
            .map(|index| AuraId::new(self.unit, index))
            .collect()
    }

    /// First active aura under `tag`, in registration order.
    pub fn active_with_tag(&self, tag: &str) -> Option<AuraId> {
        self.tagged(tag)
            .find(|index| self.auras[*index as usize].active)
            .map(|index| AuraId::new(self.unit, index))
    }

    /// First active aura under `tag` other than `excluded`.
    ///
    /// Lets an aura ask whether a sibling in its family is already up.
    pub fn active_with_tag_excluding(&self, tag: &str, excluded: AuraId) -> Option<AuraId> {
        self.tagged(tag)
            .map(|index| AuraId::new(self.unit, index))
            .find(|id| *id != excluded && self.auras[id.index as usize].active)
    }

    /// Number of active auras under `tag`.
    pub fn count_active_with_tag(&self, tag: &str) -> usize {
        self.tagged(tag)
            .filter(|index| self.auras[*index as usize].active)
            .count()
    }

    fn tagged(&self, tag: &str) -> impl Iterator<Item = u32> + '_ {
        self.by_tag.get(tag).into_iter().flatten().copied()
    }

    /// Active auras interested in `event`.
    pub fn dispatch_list(&self, event: AuraEvent) -> &ObserverList {
        &self.dispatch[event.index()]
    }

    /// Active auras with a finite expiry.
    pub fn expiring_list(&self) -> &ObserverList {
        &self.expiring
    }

    /// Exclusive categories of this unit.
    pub fn exclusive(&self) -> &ExclusiveRegistry {
        &self.exclusive
    }

    pub(crate) fn exclusive_mut(&mut self) -> &mut ExclusiveRegistry {
        &mut self.exclusive
    }

    /// Earliest expiry among active finite auras, as of the last scan.
    pub fn min_expires(&self) -> SimTime {
        self.min_expires
    }

    pub(crate) fn set_min_expires(&mut self, at: SimTime) {
        self.min_expires = at;
    }

    pub(crate) fn add_reset_effect(&mut self, effect: ResetEffect) {
        self.reset_effects.push(effect);
    }

    pub(crate) fn reset_effects(&self) -> Vec<ResetEffect> {
        self.reset_effects.clone()
    }

    /// Adds `aura` to a list and records its slot.
    pub(crate) fn link(&mut self, aura: u32, key: ListKey) {
        let list = match key {
            ListKey::Expiring => &mut self.expiring,
            ListKey::Event(event) => &mut self.dispatch[event.index()],
        };
        let slot = list.insert(aura);
        *slot_of(&mut self.auras[aura as usize], key) = Some(slot);
    }

    /// Removes `aura` from a list and repairs the slot of the member moved into its place.
    pub(crate) fn unlink(&mut self, aura: u32, key: ListKey) {
        let Some(slot) = slot_of(&mut self.auras[aura as usize], key).take() else {
            return;
        };
        let list = match key {
            ListKey::Expiring => &mut self.expiring,
            ListKey::Event(event) => &mut self.dispatch[event.index()],
        };
        if let Some(moved) = list.remove(slot) {
            *slot_of(&mut self.auras[moved as usize], key) = Some(slot);
        }
    }

    /// Clears per-iteration list state. Auras are expected to be inactive already.
    pub(crate) fn clear_lists(&mut self) {
        self.expiring.clear();
        for list in &mut self.dispatch {
            list.clear();
        }
        for aura in &mut self.auras {
            aura.expiring_slot = None;
            aura.dispatch_slots = [None; AuraEvent::COUNT];
        }
        self.exclusive.reset();
        self.min_expires = SimTime::NEVER;
    }

    /// Indices of active auras in registration order.
    pub(crate) fn active_indices(&self) -> Vec<u32> {
        self.auras
            .iter()
            .enumerate()
            .filter(|(_, aura)| aura.active)
            .map(|(index, _)| index as u32)
            .collect()
    }
}

fn slot_of(aura: &mut Aura, key: ListKey) -> &mut Option<u32> {
    match key {
        ListKey::Expiring => &mut aura.expiring_slot,
        ListKey::Event(event) => &mut aura.dispatch_slots[event.index()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(labels: &[&str]) -> AuraTracker {
        let mut tracker = AuraTracker::new(UnitId(0));
        for label in labels {
            tracker
                .register("player", AuraConfig::new(*label, SimTime::from_secs(10)))
                .unwrap();
        }
        tracker
    }

    #[test]
    fn test_registration_errors() {
        let mut tracker = tracker_with(&["a"]);
        assert!(matches!(
            tracker.register("player", AuraConfig::new("a", SimTime::from_secs(1))),
            Err(SimError::DuplicateAura { .. })
        ));
        assert!(matches!(
            tracker.register("player", AuraConfig::new("", SimTime::from_secs(1))),
            Err(SimError::EmptyAuraLabel { .. })
        ));
        assert!(matches!(
            tracker.register("player", AuraConfig::new("z", SimTime::ZERO)),
            Err(SimError::ZeroDuration { .. })
        ));
    }

    #[test]
    fn test_sanity_cap() {
        let mut tracker = AuraTracker::new(UnitId(0));
        for i in 0..MAX_AURAS_PER_UNIT {
            tracker
                .register("player", AuraConfig::new(format!("aura {i}"), SimTime::from_secs(1)))
                .unwrap();
        }
        assert!(matches!(
            tracker.register("player", AuraConfig::new("one too many", SimTime::from_secs(1))),
            Err(SimError::TooManyAuras { count: 200, .. })
        ));
    }

    #[test]
    fn test_link_unlink_fixes_moved_slot() {
        let mut tracker = tracker_with(&["a", "b", "c"]);
        let event = ListKey::Event(AuraEvent::SpellHitDealt);
        for index in 0..3 {
            tracker.link(index, event);
        }
        assert_eq!(tracker.dispatch_list(AuraEvent::SpellHitDealt).members(), &[0, 1, 2]);

        tracker.unlink(0, event);
        assert_eq!(tracker.dispatch_list(AuraEvent::SpellHitDealt).members(), &[2, 1]);
        assert_eq!(tracker.auras()[2].dispatch_slot(AuraEvent::SpellHitDealt), Some(0));
        assert_eq!(tracker.auras()[0].dispatch_slot(AuraEvent::SpellHitDealt), None);

        tracker.unlink(0, event);
        assert_eq!(tracker.dispatch_list(AuraEvent::SpellHitDealt).len(), 2);
    }

    #[test]
    fn test_tag_lookup() {
        let mut tracker = AuraTracker::new(UnitId(0));
        for label in ["x", "y"] {
            tracker
                .register(
                    "player",
                    AuraConfig::new(label, SimTime::from_secs(1)).with_tag("bleed"),
                )
                .unwrap();
        }
        assert_eq!(tracker.with_tag("bleed").len(), 2);
        assert_eq!(tracker.active_with_tag("bleed"), None);
        tracker.get_mut(1).unwrap().active = true;
        assert_eq!(tracker.active_with_tag("bleed"), Some(AuraId::new(UnitId(0), 1)));
        assert_eq!(tracker.count_active_with_tag("bleed"), 1);
        assert!(tracker.has_active("y"));
        assert!(!tracker.has_active("missing"));
        assert!(tracker.with_tag("poison").is_empty());
    }

    #[test]
    fn test_tag_lookup_excluding_self() {
        let mut tracker = AuraTracker::new(UnitId(0));
        for label in ["Frost Armor", "Ice Armor"] {
            tracker
                .register("player", AuraConfig::permanent(label).with_tag("armor"))
                .unwrap();
        }
        let frost = AuraId::new(UnitId(0), 0);
        let ice = AuraId::new(UnitId(0), 1);

        tracker.get_mut(0).unwrap().active = true;
        assert_eq!(tracker.active_with_tag_excluding("armor", frost), None);
        assert_eq!(tracker.active_with_tag_excluding("armor", ice), Some(frost));

        tracker.get_mut(1).unwrap().active = true;
        assert_eq!(tracker.active_with_tag_excluding("armor", frost), Some(ice));
        assert_eq!(tracker.active_with_tag_excluding("shield", frost), None);
    }

    #[test]
    fn test_find_by_action_id() {
        let mut tracker = tracker_with(&["untracked"]);
        tracker
            .register(
                "player",
                AuraConfig::new("Bloodlust", SimTime::from_secs(40))
                    .with_action_id(ActionId(2825)),
            )
            .unwrap();
        tracker
            .register(
                "player",
                AuraConfig::new("Bloodlust Echo", SimTime::from_secs(5))
                    .with_action_id(ActionId(2825)),
            )
            .unwrap();

        assert_eq!(
            tracker.find_by_action_id(ActionId(2825)),
            Some(AuraId::new(UnitId(0), 1))
        );
        assert_eq!(tracker.find_by_action_id(ActionId(1)), None);
    }
}
