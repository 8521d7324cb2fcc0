//! Tick-based periodic damage.
//!
//! A dot lives on a never-expiring aura on its target. Each tick is a
//! pending action at `DOT` priority; the aura fades itself after the last
//! tick. Re-applying restarts the tick count and cancels the outstanding
//! tick, so exactly one tick is ever queued per dot.

use std::cell::RefCell;
use std::rc::Rc;

use rotasim_core::{
    ActionHandle, ActionId, ActionPriority, AuraConfig, AuraId, Environment, PendingAction,
    SimResult, SimTime, Simulation, SpellResult, UnitId,
};
use tracing::trace;

/// Static description of a dot.
#[derive(Debug, Clone, PartialEq)]
pub struct DotConfig {
    /// Aura label on the target
    pub label: String,
    /// Spell reported in results
    pub spell: ActionId,
    /// Time between ticks
    pub tick_length: SimTime,
    /// Ticks per application
    pub num_ticks: u32,
    /// Lowest damage per tick
    pub min_tick_damage: f64,
    /// Highest damage per tick
    pub max_tick_damage: f64,
}

impl DotConfig {
    /// Dot dealing a fixed amount per tick.
    pub fn fixed(
        label: impl Into<String>,
        spell: ActionId,
        tick_length: SimTime,
        num_ticks: u32,
        tick_damage: f64,
    ) -> Self {
        Self {
            label: label.into(),
            spell,
            tick_length,
            num_ticks,
            min_tick_damage: tick_damage,
            max_tick_damage: tick_damage,
        }
    }

    /// Full duration of one application.
    pub fn duration(&self) -> SimTime {
        SimTime::from_nanos(self.tick_length.as_nanos() * i64::from(self.num_ticks))
    }
}

#[derive(Debug, Default)]
struct DotState {
    ticks_remaining: u32,
    pending: Option<ActionHandle>,
}

/// Handle to a registered dot. Cheap to clone.
#[derive(Clone)]
pub struct Dot {
    config: Rc<DotConfig>,
    caster: UnitId,
    target: UnitId,
    aura: AuraId,
    state: Rc<RefCell<DotState>>,
}

impl Dot {
    /// Registers the dot's aura on `target`.
    ///
    /// # Errors
    /// Registration errors from the environment, such as a duplicate label.
    pub fn register(
        env: &mut Environment,
        caster: UnitId,
        target: UnitId,
        config: DotConfig,
    ) -> SimResult<Self> {
        let state = Rc::new(RefCell::new(DotState::default()));

        let reset_state = Rc::clone(&state);
        let expire_state = Rc::clone(&state);
        let aura = env.register_aura(
            target,
            AuraConfig::permanent(config.label.clone())
                .with_action_id(config.spell)
                .on_reset(move |_, _| {
                    *reset_state.borrow_mut() = DotState::default();
                    Ok(())
                })
                .on_expire(move |sim, _| {
                    let mut state = expire_state.borrow_mut();
                    state.ticks_remaining = 0;
                    if let Some(handle) = state.pending.take() {
                        sim.cancel_action(handle);
                    }
                    Ok(())
                }),
        )?;

        Ok(Self {
            config: Rc::new(config),
            caster,
            target,
            aura,
            state,
        })
    }

    /// Aura tracking this dot on its target.
    pub fn aura(&self) -> AuraId {
        self.aura
    }

    /// Unit the dot ticks on.
    pub fn target(&self) -> UnitId {
        self.target
    }

    /// Static configuration.
    pub fn config(&self) -> &DotConfig {
        &self.config
    }

    /// Ticks left in the current application.
    pub fn ticks_remaining(&self) -> u32 {
        self.state.borrow().ticks_remaining
    }

    /// True while the dot is ticking.
    pub fn is_active(&self, sim: &Simulation) -> bool {
        sim.aura(self.aura).is_ok_and(|aura| aura.is_active())
    }

    /// Applies or re-applies the dot at the current time.
    ///
    /// # Errors
    /// - `SimError::ScheduledInPast` - Never in practice; ticks are in the future
    /// - Errors raised by the aura's hooks
    pub fn apply(&self, sim: &mut Simulation) -> SimResult<()> {
        {
            let mut state = self.state.borrow_mut();
            if let Some(handle) = state.pending.take() {
                sim.cancel_action(handle);
            }
        }

        sim.activate_aura(self.aura)?;
        self.state.borrow_mut().ticks_remaining = self.config.num_ticks;
        trace!(dot = %self.config.label, ticks = self.config.num_ticks, "Dot applied");
        self.schedule_tick(sim)
    }

    /// Stops the dot early. The outstanding tick is cancelled.
    ///
    /// # Errors
    /// Errors raised by the aura's hooks.
    pub fn cancel(&self, sim: &mut Simulation) -> SimResult<()> {
        sim.deactivate_aura(self.aura)
    }

    fn schedule_tick(&self, sim: &mut Simulation) -> SimResult<()> {
        let at = sim.current_time() + self.config.tick_length;
        let dot = self.clone();
        let cleared = Rc::clone(&self.state);

        let handle = sim.add_pending_action(
            PendingAction::new(at, move |sim| dot.tick(sim))
                .with_priority(ActionPriority::DOT)
                .with_cleanup(move |sim| {
                    // A reapply may already have queued a newer tick.
                    let mut state = cleared.borrow_mut();
                    if state.pending.is_some_and(|handle| !sim.is_action_pending(handle)) {
                        state.pending = None;
                    }
                    Ok(())
                }),
        )?;
        self.state.borrow_mut().pending = Some(handle);
        Ok(())
    }

    fn tick(&self, sim: &mut Simulation) -> SimResult<()> {
        let remaining = {
            let mut state = self.state.borrow_mut();
            state.pending = None;
            state.ticks_remaining = state.ticks_remaining.saturating_sub(1);
            state.ticks_remaining
        };

        let damage = sim.roll_with_label(
            self.config.min_tick_damage,
            self.config.max_tick_damage,
            &self.config.label,
        );
        let result = SpellResult::hit(self.config.spell, self.caster, self.target, damage);
        sim.deal_periodic_damage(&result)?;

        if remaining > 0 && self.is_active(sim) {
            self.schedule_tick(sim)
        } else {
            sim.deactivate_aura(self.aura)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rotasim_core::{EncounterConfig, SimOptions, UnitKind};

    use super::*;

    fn setup(num_ticks: u32) -> (Simulation, Dot) {
        let mut env = Environment::new(EncounterConfig::fixed(Duration::from_secs(60))).unwrap();
        let player = env.add_unit("player", UnitKind::Player);
        let target = env.add_unit("target", UnitKind::Enemy);
        let dot = Dot::register(
            &mut env,
            player,
            target,
            DotConfig::fixed("Rend", ActionId(10), SimTime::from_secs(3), num_ticks, 100.0),
        )
        .unwrap();
        let mut sim = Simulation::new(env, SimOptions::deterministic_testing()).unwrap();
        sim.reset().unwrap();
        (sim, dot)
    }

    fn run_until(sim: &mut Simulation, at: SimTime) {
        sim.schedule(at, ActionPriority::LOW, |_| Ok(())).unwrap();
        while sim.current_time() < at {
            assert!(!sim.step().unwrap());
        }
    }

    #[test]
    fn test_dot_ticks_then_fades() {
        let (mut sim, dot) = setup(3);
        dot.apply(&mut sim).unwrap();
        assert!(dot.is_active(&sim));
        assert_eq!(dot.config().duration(), SimTime::from_secs(9));

        run_until(&mut sim, SimTime::from_secs(10));
        assert!(!dot.is_active(&sim));
        assert_eq!(dot.ticks_remaining(), 0);
        assert_eq!(sim.encounter().damage_taken(), 300.0);
        assert_eq!(sim.pending_action_count(), 0);
    }

    #[test]
    fn test_reapply_restarts_ticks() {
        let (mut sim, dot) = setup(2);
        dot.apply(&mut sim).unwrap();
        run_until(&mut sim, SimTime::from_secs(4));
        assert_eq!(dot.ticks_remaining(), 1);

        dot.apply(&mut sim).unwrap();
        assert_eq!(dot.ticks_remaining(), 2);
        assert_eq!(sim.pending_action_count(), 2);

        run_until(&mut sim, SimTime::from_secs(12));
        // One tick before the reapply, two after it.
        assert_eq!(sim.encounter().damage_taken(), 300.0);
    }

    #[test]
    fn test_cancel_stops_ticking() {
        let (mut sim, dot) = setup(5);
        dot.apply(&mut sim).unwrap();
        run_until(&mut sim, SimTime::from_secs(3));
        dot.cancel(&mut sim).unwrap();
        run_until(&mut sim, SimTime::from_secs(20));
        assert_eq!(sim.encounter().damage_taken(), 100.0);
    }
}
