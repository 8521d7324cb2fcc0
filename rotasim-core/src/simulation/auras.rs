//! Aura lifecycle transitions and event dispatch.

use smallvec::SmallVec;
use tracing::debug;

use super::Simulation;
use crate::aura::{AuraEvent, AuraId, AuraState, EventHandler, ExclusiveCategoryId, ListKey};
use crate::combat::{SpellId, SpellResult};
use crate::error::{SimError, SimResult};
use crate::time::SimTime;
use crate::unit::UnitId;

/// Dispatch snapshots up to this size stay on the stack.
type Snapshot = SmallVec<[u32; 16]>;

impl Simulation {
    /// Activates an aura, or refreshes it if already active.
    ///
    /// Activation is silently skipped when an exclusive category is held by
    /// a stronger aura. On success the gain hook runs last, after every list
    /// and category reflects the new state.
    ///
    /// # Errors
    /// - `SimError::UnknownAura` - No such aura
    /// - Any error returned by the gain hook
    pub fn activate_aura(&mut self, id: AuraId) -> SimResult<()> {
        let now = self.current_time;
        let aura = self.aura_mut(id)?;
        aura.metrics.procs += 1;

        if aura.active {
            self.refresh_aura(id)?;
            self.log_aura(id, "refreshed");
            return Ok(());
        }

        let effects = aura.exclusive.clone();
        if !effects.is_empty() {
            let registry = self.tracker_mut(id.unit)?.exclusive_mut();
            let mut acquired: SmallVec<[ExclusiveCategoryId; 4]> = SmallVec::new();
            let mut blocker = None;
            for effect in &effects {
                match registry.acquire(*effect, id.index) {
                    Ok(()) => acquired.push(effect.category),
                    Err(holder) => {
                        blocker = Some(holder);
                        break;
                    }
                }
            }
            if let Some(holder) = blocker {
                for category in acquired {
                    registry.release(category, id.index);
                }
                if self.log_enabled {
                    let blocked_by = self.aura(AuraId::new(id.unit, holder))?.label.clone();
                    self.log_aura(id, format_args!("blocked by {blocked_by}"));
                }
                return Ok(());
            }
        }

        let aura = self.aura_mut(id)?;
        aura.active = true;
        aura.start_time = now;
        aura.expires = now + aura.duration;
        let expires = aura.expires;
        let events: SmallVec<[AuraEvent; 4]> = AuraEvent::ALL
            .into_iter()
            .filter(|event| aura.handles(*event))
            .collect();

        let tracker = self.tracker_mut(id.unit)?;
        if !expires.is_never() {
            tracker.link(id.index, ListKey::Expiring);
        }
        for event in events {
            tracker.link(id.index, ListKey::Event(event));
        }
        self.note_expiry(id.unit, expires)?;
        self.log_aura(id, "gained");

        if let Some(on_gain) = self.aura(id)?.hooks.on_gain.clone() {
            on_gain(self, id)?;
        }
        Ok(())
    }

    /// Pushes an active aura's expiry to `now + duration`.
    ///
    /// # Errors
    /// - `SimError::UnknownAura` - No such aura
    pub fn refresh_aura(&mut self, id: AuraId) -> SimResult<()> {
        let now = self.current_time;
        let aura = self.aura_mut(id)?;
        if !aura.active {
            return Ok(());
        }
        let expires = now + aura.duration;
        self.update_expires(id, expires)
    }

    /// Sets an active aura's expiry directly.
    ///
    /// # Errors
    /// - `SimError::UnknownAura` - No such aura
    pub fn update_expires(&mut self, id: AuraId, expires: SimTime) -> SimResult<()> {
        let aura = self.aura_mut(id)?;
        if !aura.active {
            return Ok(());
        }
        aura.expires = expires;
        let linked = aura.expiring_slot.is_some();

        let tracker = self.tracker_mut(id.unit)?;
        match (expires.is_never(), linked) {
            (false, false) => tracker.link(id.index, ListKey::Expiring),
            (true, true) => tracker.unlink(id.index, ListKey::Expiring),
            _ => {}
        }
        self.note_expiry(id.unit, expires)
    }

    /// Changes the configured duration used by later activations and refreshes.
    ///
    /// # Errors
    /// - `SimError::ZeroDuration` - `duration` is zero
    /// - `SimError::UnknownAura` - No such aura
    pub fn set_aura_duration(&mut self, id: AuraId, duration: SimTime) -> SimResult<()> {
        let aura = self.aura_mut(id)?;
        if duration == SimTime::ZERO {
            return Err(SimError::ZeroDuration {
                label: aura.label.clone(),
            });
        }
        aura.duration = duration;
        Ok(())
    }

    /// Deactivates an aura. Inactive auras are left untouched.
    ///
    /// Records uptime, leaves every list and category, forces the stack
    /// count to zero (running the stacks hook), then runs the expire hook.
    ///
    /// # Errors
    /// - `SimError::UnknownAura` - No such aura
    /// - Any error returned by the stacks or expire hooks
    pub fn deactivate_aura(&mut self, id: AuraId) -> SimResult<()> {
        let now = self.current_time;
        let aura = self.aura_mut(id)?;
        if !aura.active {
            return Ok(());
        }

        let faded_at = now.min(aura.expires);
        aura.active = false;
        aura.metrics.uptime += faded_at - aura.start_time.max(SimTime::ZERO);
        aura.expires = SimTime::ZERO;
        aura.fade_time = Some(now);

        let old_stacks = aura.stacks;
        let effects = aura.exclusive.clone();
        let events: SmallVec<[AuraEvent; 4]> = AuraEvent::ALL
            .into_iter()
            .filter(|event| aura.dispatch_slots[event.index()].is_some())
            .collect();

        let tracker = self.tracker_mut(id.unit)?;
        tracker.unlink(id.index, ListKey::Expiring);
        for event in events {
            tracker.unlink(id.index, ListKey::Event(event));
        }

        if self.log_enabled {
            let label = self.aura(id)?.label.clone();
            let unit = self.env.unit(id.unit)?.label().to_string();
            debug!(time = %faded_at, unit = %unit, "Aura faded: {label}");
        }

        if old_stacks != 0 {
            self.aura_mut(id)?.stacks = 0;
            self.log_aura(id, format_args!("stacks {old_stacks} -> 0"));
            if let Some(on_stacks_change) = self.aura(id)?.hooks.on_stacks_change.clone() {
                on_stacks_change(self, id, old_stacks, 0)?;
            }
        }

        let tracker = self.tracker_mut(id.unit)?;
        for effect in &effects {
            tracker.exclusive_mut().release(effect.category, id.index);
        }

        if let Some(on_expire) = self.aura(id)?.hooks.on_expire.clone() {
            on_expire(self, id)?;
        }
        Ok(())
    }

    /// Sets the stack count, clamped to the cap. Reaching zero deactivates.
    ///
    /// # Errors
    /// - `SimError::StacksOnInactiveAura` - Non-zero count on an inactive
    ///   aura. Checked first, so a negative count on an inactive aura reports
    ///   this rather than `NegativeStacks`
    /// - `SimError::NegativeStacks` - Count below zero on an active aura
    /// - `SimError::StacksNotSupported` - Aura declared without a stack cap
    /// - Any error returned by the stacks or expire hooks
    pub fn set_stacks(&mut self, id: AuraId, stacks: i32) -> SimResult<()> {
        let aura = self.aura_mut(id)?;
        if !aura.active && stacks != 0 {
            return Err(SimError::StacksOnInactiveAura {
                label: aura.label.clone(),
                stacks,
            });
        }
        if stacks < 0 {
            return Err(SimError::NegativeStacks {
                label: aura.label.clone(),
                stacks,
            });
        }
        if aura.max_stacks == 0 {
            return Err(SimError::StacksNotSupported {
                label: aura.label.clone(),
            });
        }

        let new_stacks = stacks.min(aura.max_stacks);
        let old_stacks = aura.stacks;
        if old_stacks == new_stacks {
            return Ok(());
        }
        aura.stacks = new_stacks;
        self.log_aura(id, format_args!("stacks {old_stacks} -> {new_stacks}"));

        if let Some(on_stacks_change) = self.aura(id)?.hooks.on_stacks_change.clone() {
            on_stacks_change(self, id, old_stacks, new_stacks)?;
        }
        if self.aura(id)?.stacks == 0 {
            self.deactivate_aura(id)?;
        }
        Ok(())
    }

    /// Adds one stack.
    ///
    /// # Errors
    /// Same as [`Simulation::set_stacks`].
    pub fn add_stack(&mut self, id: AuraId) -> SimResult<()> {
        self.add_stacks(id, 1)
    }

    /// Adds `count` stacks.
    ///
    /// # Errors
    /// Same as [`Simulation::set_stacks`].
    pub fn add_stacks(&mut self, id: AuraId, count: i32) -> SimResult<()> {
        let stacks = self.aura(id)?.stacks;
        self.set_stacks(id, stacks.saturating_add(count))
    }

    /// Removes one stack.
    ///
    /// # Errors
    /// Same as [`Simulation::set_stacks`].
    pub fn remove_stack(&mut self, id: AuraId) -> SimResult<()> {
        self.remove_stacks(id, 1)
    }

    /// Removes `count` stacks.
    ///
    /// # Errors
    /// Same as [`Simulation::set_stacks`].
    pub fn remove_stacks(&mut self, id: AuraId, count: i32) -> SimResult<()> {
        let stacks = self.aura(id)?.stacks;
        self.set_stacks(id, stacks.saturating_sub(count))
    }

    /// Deactivates every active aura with a finite duration on `unit`.
    ///
    /// # Errors
    /// Propagates hook errors.
    pub fn expire_all_auras(&mut self, unit: UnitId) -> SimResult<()> {
        while let Some(&index) = self.auras(unit)?.expiring_list().members().first() {
            self.deactivate_aura(AuraId::new(unit, index))?;
        }
        self.tracker_mut(unit)?.set_min_expires(SimTime::NEVER);
        Ok(())
    }

    /// Captures activity, remaining time and stacks.
    ///
    /// # Errors
    /// - `SimError::UnknownAura` - No such aura
    pub fn save_aura_state(&self, id: AuraId) -> SimResult<AuraState> {
        let aura = self.aura(id)?;
        Ok(AuraState {
            active: aura.active,
            remaining_duration: aura.remaining_duration(self.current_time),
            stacks: aura.stacks,
        })
    }

    /// Re-applies a saved state at the current time.
    ///
    /// # Errors
    /// Propagates lifecycle errors and hook errors.
    pub fn restore_aura_state(&mut self, id: AuraId, state: AuraState) -> SimResult<()> {
        if !state.active {
            return self.deactivate_aura(id);
        }
        if !self.aura(id)?.active {
            self.activate_aura(id)?;
        }
        let expires = self.current_time + state.remaining_duration;
        self.update_expires(id, expires)?;
        if self.aura(id)?.max_stacks > 0 {
            self.set_stacks(id, state.stacks)?;
        }
        Ok(())
    }

    fn note_expiry(&mut self, unit: UnitId, expires: SimTime) -> SimResult<()> {
        let tracker = self.tracker_mut(unit)?;
        if expires < tracker.min_expires() {
            tracker.set_min_expires(expires);
            self.min_tracker_time = self.min_tracker_time.min(expires);
        }
        Ok(())
    }

    fn log_aura(&self, id: AuraId, what: impl std::fmt::Display) {
        if !self.log_enabled {
            return;
        }
        if let Ok(aura) = self.aura(id) {
            self.log(id.unit, format_args!("Aura {what}: {}", aura.label));
        }
    }

    // Dispatch

    pub(crate) fn dispatch_result(
        &mut self,
        unit: UnitId,
        event: AuraEvent,
        result: &SpellResult,
    ) -> SimResult<()> {
        for index in self.dispatch_snapshot(unit, event)? {
            let id = AuraId::new(unit, index);
            if let Some(EventHandler::Result(hook)) = self.active_handler(id, event)? {
                hook(self, id, result)?;
            }
        }
        Ok(())
    }

    pub(crate) fn dispatch_cast(
        &mut self,
        unit: UnitId,
        event: AuraEvent,
        target: UnitId,
        spell: SpellId,
    ) -> SimResult<()> {
        for index in self.dispatch_snapshot(unit, event)? {
            let id = AuraId::new(unit, index);
            if let Some(EventHandler::Cast(hook)) = self.active_handler(id, event)? {
                hook(self, id, target, spell)?;
            }
        }
        Ok(())
    }

    pub(crate) fn dispatch_encounter_start(&mut self, unit: UnitId) -> SimResult<()> {
        for index in self.dispatch_snapshot(unit, AuraEvent::EncounterStart)? {
            let id = AuraId::new(unit, index);
            if let Some(EventHandler::Plain(hook)) =
                self.active_handler(id, AuraEvent::EncounterStart)?
            {
                hook(self, id)?;
            }
        }
        Ok(())
    }

    fn dispatch_snapshot(&self, unit: UnitId, event: AuraEvent) -> SimResult<Snapshot> {
        Ok(Snapshot::from_slice(
            self.auras(unit)?.dispatch_list(event).members(),
        ))
    }

    fn active_handler(&self, id: AuraId, event: AuraEvent) -> SimResult<Option<EventHandler>> {
        let aura = self.aura(id)?;
        Ok(if aura.active { aura.handler(event) } else { None })
    }

    // Iteration boundaries

    /// Deactivates expired auras on `unit` and returns its next expiry.
    pub(crate) fn advance_unit_auras(&mut self, unit: UnitId) -> SimResult<SimTime> {
        let now = self.current_time;
        let tracker = self.auras(unit)?;
        if now < tracker.min_expires() {
            return Ok(tracker.min_expires());
        }

        loop {
            let tracker = self.auras(unit)?;
            let mut min_expires = SimTime::NEVER;
            let mut expired = None;
            for &index in tracker.expiring_list().members() {
                let expires = tracker.auras()[index as usize].expires;
                if expires <= now {
                    expired = Some(index);
                    break;
                }
                min_expires = min_expires.min(expires);
            }

            match expired {
                Some(index) => self.deactivate_aura(AuraId::new(unit, index))?,
                None => {
                    self.tracker_mut(unit)?.set_min_expires(min_expires);
                    return Ok(min_expires);
                }
            }
        }
    }

    /// Iteration-start reset of one unit's auras.
    pub(crate) fn reset_unit_auras(&mut self, unit: UnitId) -> SimResult<()> {
        self.tracker_mut(unit)?.clear_lists();
        for effect in self.auras(unit)?.reset_effects() {
            effect(self, unit)?;
        }

        let count = self.auras(unit)?.len() as u32;
        for index in 0..count {
            let id = AuraId::new(unit, index);

            let aura = self.aura_mut(id)?;
            if !aura.initialized {
                aura.initialized = true;
                if let Some(on_init) = aura.hooks.on_init.clone() {
                    on_init(self, id)?;
                }
            }

            self.check_not_leaked(id)?;
            let aura = self.aura_mut(id)?;
            aura.metrics.reset();
            aura.fade_time = None;
            if let Some(on_reset) = aura.hooks.on_reset.clone() {
                on_reset(self, id)?;
            }
        }
        Ok(())
    }

    /// Iteration-end teardown of one unit's auras, permanent ones included.
    pub(crate) fn done_iteration_unit_auras(&mut self, unit: UnitId) -> SimResult<()> {
        loop {
            let active = self.auras(unit)?.active_indices();
            let Some(&index) = active.first() else {
                break;
            };
            self.deactivate_aura(AuraId::new(unit, index))?;
        }

        let count = self.auras(unit)?.len() as u32;
        for index in 0..count {
            let id = AuraId::new(unit, index);
            self.check_not_leaked(id)?;
            let aura = self.aura_mut(id)?;
            aura.start_time = SimTime::ZERO;
            aura.expires = SimTime::ZERO;
            if let Some(on_done_iteration) = aura.hooks.on_done_iteration.clone() {
                on_done_iteration(self, id)?;
            }
        }

        for index in 0..count {
            let aura = self.aura_mut(AuraId::new(unit, index))?;
            if aura.tracks_metrics() {
                aura.metrics.done_iteration();
            }
        }
        Ok(())
    }

    fn check_not_leaked(&self, id: AuraId) -> SimResult<()> {
        let aura = self.aura(id)?;
        if aura.active || aura.stacks != 0 {
            return Err(SimError::AuraLeaked {
                unit: self.env.unit(id.unit)?.label().to_string(),
                label: aura.label.clone(),
                stacks: aura.stacks,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::aura::AuraConfig;
    use crate::combat::ActionId;
    use crate::config::{EncounterConfig, SimOptions};
    use crate::environment::Environment;
    use crate::unit::UnitKind;

    type Log = Rc<RefCell<Vec<String>>>;

    fn build(configure: impl FnOnce(&mut Environment, UnitId)) -> Simulation {
        let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(60))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        env.add_unit("target", UnitKind::Enemy);
        configure(&mut env, player);
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        sim.reset().unwrap();
        sim
    }

    fn player() -> UnitId {
        UnitId(0)
    }

    #[test]
    fn test_refresh_extends_expiry_without_relinking() {
        let mut sim = build(|env, unit| {
            env.register_aura(
                unit,
                AuraConfig::new("buff", SimTime::from_secs(5)).on_spell_hit_dealt(|_, _, _| Ok(())),
            )
            .unwrap();
        });
        let buff = sim.find_aura(player(), "buff").unwrap();

        sim.activate_aura(buff).unwrap();
        sim.advance(SimTime::from_secs(3)).unwrap();
        sim.activate_aura(buff).unwrap();

        let tracker = sim.auras(player()).unwrap();
        assert_eq!(tracker.dispatch_list(AuraEvent::SpellHitDealt).len(), 1);
        assert_eq!(tracker.expiring_list().len(), 1);
        assert_eq!(sim.aura(buff).unwrap().expires_at(), SimTime::from_secs(8));
        assert_eq!(sim.aura(buff).unwrap().metrics().procs, 2);

        sim.advance(SimTime::from_millis(7900)).unwrap();
        assert!(sim.aura(buff).unwrap().is_active());
        sim.advance(SimTime::from_secs(8)).unwrap();
        assert!(!sim.aura(buff).unwrap().is_active());
        assert!(sim.auras(player()).unwrap().dispatch_list(AuraEvent::SpellHitDealt).is_empty());
    }

    #[test]
    fn test_stacks_to_zero_fires_change_then_expire() {
        let log: Log = Rc::default();
        let (stacks_log, expire_log) = (Rc::clone(&log), Rc::clone(&log));
        let mut sim = build(move |env, unit| {
            env.register_aura(
                unit,
                AuraConfig::new("stacking", SimTime::from_secs(20))
                    .with_max_stacks(5)
                    .on_stacks_change(move |_, _, old, new| {
                        stacks_log.borrow_mut().push(format!("stacks {old}->{new}"));
                        Ok(())
                    })
                    .on_expire(move |_, _| {
                        expire_log.borrow_mut().push("expire".to_string());
                        Ok(())
                    }),
            )
            .unwrap();
        });
        let aura = sim.find_aura(player(), "stacking").unwrap();

        sim.activate_aura(aura).unwrap();
        sim.set_stacks(aura, 3).unwrap();
        log.borrow_mut().clear();

        sim.set_stacks(aura, 0).unwrap();
        assert_eq!(*log.borrow(), vec!["stacks 3->0", "expire"]);
        assert!(!sim.aura(aura).unwrap().is_active());
    }

    #[test]
    fn test_stack_validation() {
        let mut sim = build(|env, unit| {
            env.register_aura(
                unit,
                AuraConfig::new("stacking", SimTime::from_secs(20)).with_max_stacks(3),
            )
            .unwrap();
            env.register_aura(unit, AuraConfig::new("plain", SimTime::from_secs(20)))
                .unwrap();
        });
        let stacking = sim.find_aura(player(), "stacking").unwrap();
        let plain = sim.find_aura(player(), "plain").unwrap();

        assert!(matches!(
            sim.set_stacks(stacking, 2),
            Err(SimError::StacksOnInactiveAura { .. })
        ));
        assert!(matches!(
            sim.set_stacks(stacking, -1),
            Err(SimError::StacksOnInactiveAura { stacks: -1, .. })
        ));
        sim.activate_aura(stacking).unwrap();
        assert!(matches!(
            sim.set_stacks(stacking, -1),
            Err(SimError::NegativeStacks { stacks: -1, .. })
        ));
        sim.add_stacks(stacking, 10).unwrap();
        assert_eq!(sim.aura(stacking).unwrap().stacks(), 3);
        sim.remove_stack(stacking).unwrap();
        assert_eq!(sim.aura(stacking).unwrap().stacks(), 2);

        sim.activate_aura(plain).unwrap();
        assert!(matches!(
            sim.add_stack(plain),
            Err(SimError::StacksNotSupported { .. })
        ));
    }

    #[test]
    fn test_exclusive_category_blocks_weaker_member() {
        let mut sim = build(|env, unit| {
            env.register_aura(
                unit,
                AuraConfig::new("strong", SimTime::from_secs(10)).exclusive("armor", 2.0),
            )
            .unwrap();
            env.register_aura(
                unit,
                AuraConfig::new("weak", SimTime::from_secs(10))
                    .exclusive("speed", 1.0)
                    .exclusive("armor", 1.0),
            )
            .unwrap();
            env.register_aura(
                unit,
                AuraConfig::new("equal", SimTime::from_secs(10)).exclusive("armor", 2.0),
            )
            .unwrap();
        });
        let strong = sim.find_aura(player(), "strong").unwrap();
        let weak = sim.find_aura(player(), "weak").unwrap();
        let equal = sim.find_aura(player(), "equal").unwrap();

        sim.activate_aura(strong).unwrap();
        sim.activate_aura(weak).unwrap();
        assert!(!sim.aura(weak).unwrap().is_active());

        let registry = sim.auras(player()).unwrap().exclusive();
        let speed = registry.find("speed").unwrap();
        assert!(registry.holders(speed).is_empty());

        sim.activate_aura(equal).unwrap();
        assert!(sim.aura(equal).unwrap().is_active());

        sim.deactivate_aura(strong).unwrap();
        sim.deactivate_aura(equal).unwrap();
        sim.activate_aura(weak).unwrap();
        assert!(sim.aura(weak).unwrap().is_active());
    }

    #[test]
    fn test_dispatch_skips_auras_deactivated_mid_dispatch() {
        let log: Log = Rc::default();
        let (first_log, second_log) = (Rc::clone(&log), Rc::clone(&log));
        let mut sim = build(move |env, unit| {
            env.register_aura(
                unit,
                AuraConfig::new("first", SimTime::from_secs(10)).on_cast_complete(
                    move |sim, _, _, _| {
                        first_log.borrow_mut().push("first".to_string());
                        let second = AuraId::new(UnitId(0), 1);
                        sim.deactivate_aura(second)
                    },
                ),
            )
            .unwrap();
            env.register_aura(
                unit,
                AuraConfig::new("second", SimTime::from_secs(10)).on_cast_complete(
                    move |_, _, _, _| {
                        second_log.borrow_mut().push("second".to_string());
                        Ok(())
                    },
                ),
            )
            .unwrap();
        });

        sim.activate_aura(AuraId::new(player(), 0)).unwrap();
        sim.activate_aura(AuraId::new(player(), 1)).unwrap();
        sim.fire_cast_complete(player(), UnitId(1), ActionId(1)).unwrap();
        assert_eq!(*log.borrow(), vec!["first"]);
    }

    #[test]
    fn test_leaked_aura_detected_at_reset() {
        let mut sim = build(|env, unit| {
            env.register_aura(unit, AuraConfig::new("sticky", SimTime::from_secs(10)))
                .unwrap();
        });
        let sticky = sim.find_aura(player(), "sticky").unwrap();
        sim.activate_aura(sticky).unwrap();

        assert!(matches!(
            sim.reset(),
            Err(SimError::AuraLeaked { ref label, .. }) if label == "sticky"
        ));
    }

    #[test]
    fn test_uptime_and_state_restore() {
        let mut sim = build(|env, unit| {
            env.register_aura(
                unit,
                AuraConfig::new("tracked", SimTime::from_secs(10))
                    .with_action_id(ActionId(7))
                    .with_max_stacks(5),
            )
            .unwrap();
        });
        let tracked = sim.find_aura(player(), "tracked").unwrap();

        sim.advance(SimTime::from_secs(2)).unwrap();
        sim.activate_aura(tracked).unwrap();
        sim.set_stacks(tracked, 4).unwrap();
        sim.advance(SimTime::from_secs(5)).unwrap();
        let saved = sim.save_aura_state(tracked).unwrap();
        assert_eq!(saved.remaining_duration, SimTime::from_secs(7));

        sim.deactivate_aura(tracked).unwrap();
        assert_eq!(sim.aura(tracked).unwrap().metrics().uptime, SimTime::from_secs(3));
        assert_eq!(sim.aura(tracked).unwrap().time_inactive(SimTime::from_secs(6)), SimTime::from_secs(1));

        sim.restore_aura_state(tracked, saved).unwrap();
        let aura = sim.aura(tracked).unwrap();
        assert!(aura.is_active());
        assert_eq!(aura.stacks(), 4);
        assert_eq!(aura.expires_at(), SimTime::from_secs(12));
    }
}
