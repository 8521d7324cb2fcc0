//! The simulation: clock, queue, schedules and the world they drive.
//!
//! One `Simulation` runs iterations sequentially and is single-threaded by
//! construction. Independent instances may run on separate threads; only
//! the abort signal is shared.

mod auras;
mod driver;

use std::fmt::Display;
use std::rc::Rc;

use tracing::debug;

use crate::aura::{Aura, AuraConfig, AuraEvent, AuraId, AuraTracker};
use crate::combat::{ActionId, SpellId, SpellResult};
use crate::config::SimOptions;
use crate::environment::{Encounter, Environment};
use crate::error::{SimError, SimResult};
use crate::lazy::{LazySchedule, Task, WeaponAttack};
use crate::metrics::MetricsSink;
use crate::phase::{PhaseCallback, PhaseController};
use crate::queue::{ActionHandle, ActionPool, ActionPriority, PendingAction, PendingActionQueue};
use crate::report::{AbortSignal, ProgressMetrics};
use crate::rng::RandomManager;
use crate::time::SimTime;
use crate::unit::{Unit, UnitId, UnitKind};

/// Progress observer invoked between iterations.
pub type ProgressReporter = Box<dyn FnMut(&ProgressMetrics)>;

/// Discrete-event combat simulation over one environment.
pub struct Simulation {
    pub(crate) env: Environment,
    pub(crate) options: SimOptions,
    pub(crate) rng: RandomManager,
    pub(crate) queue: PendingActionQueue,

    pub(crate) current_time: SimTime,
    pub(crate) duration: SimTime,
    pub(crate) base_duration: SimTime,
    pub(crate) duration_is_estimate: bool,
    pub(crate) iteration: u32,

    pub(crate) phases: PhaseController,
    pub(crate) end_of_combat_duration: SimTime,
    pub(crate) end_of_combat_damage: f64,

    pub(crate) aura_trackers: Vec<UnitId>,
    pub(crate) min_tracker_time: SimTime,
    pub(crate) weapon_attacks: LazySchedule<dyn WeaponAttack>,
    pub(crate) tasks: LazySchedule<dyn Task>,

    pub(crate) log_enabled: bool,
    pub(crate) metrics_sinks: Vec<Box<dyn MetricsSink>>,
    pub(crate) progress: Option<ProgressReporter>,
    pub(crate) abort: AbortSignal,
}

impl Simulation {
    /// Creates a simulation over `env`, finalizing it.
    ///
    /// # Errors
    /// - `SimError::InvalidConfiguration` - Zero iterations requested
    pub fn new(mut env: Environment, options: SimOptions) -> SimResult<Self> {
        if options.iterations == 0 {
            return Err(SimError::InvalidConfiguration {
                reason: "iterations must be at least 1".to_string(),
            });
        }

        env.finalize();
        let seed = options.random_seed.unwrap_or_else(rand::random);
        let encounter = env.encounter.config().clone();

        Ok(Self {
            rng: RandomManager::new(seed, options.labeled_rands),
            queue: PendingActionQueue::new(),
            current_time: SimTime::ZERO,
            duration: SimTime::from(encounter.duration),
            base_duration: SimTime::from(encounter.duration),
            duration_is_estimate: encounter.duration_is_estimate,
            iteration: 0,
            phases: PhaseController::new(encounter.phase_ladder),
            end_of_combat_duration: SimTime::NEVER,
            end_of_combat_damage: f64::INFINITY,
            aura_trackers: Vec::new(),
            min_tracker_time: SimTime::NEVER,
            weapon_attacks: LazySchedule::default(),
            tasks: LazySchedule::default(),
            log_enabled: options.debug || options.debug_first_iteration,
            metrics_sinks: Vec::new(),
            progress: None,
            abort: AbortSignal::new(),
            env,
            options,
        })
    }

    /// Current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Length of the current iteration's fight.
    pub fn duration(&self) -> SimTime {
        self.duration
    }

    /// Index of the current iteration.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Run settings.
    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    /// The finalized environment.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Encounter settings and damage counter.
    pub fn encounter(&self) -> &Encounter {
        &self.env.encounter
    }

    /// Unit by index.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - No such unit
    pub fn unit(&self, unit: UnitId) -> SimResult<&Unit> {
        self.env.unit(unit)
    }

    /// Aura tracker of a unit.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit` - No such unit
    pub fn auras(&self, unit: UnitId) -> SimResult<&AuraTracker> {
        Ok(&self.env.unit(unit)?.auras)
    }

    pub(crate) fn tracker_mut(&mut self, unit: UnitId) -> SimResult<&mut AuraTracker> {
        Ok(&mut self.env.unit_mut(unit)?.auras)
    }

    /// Aura by address.
    ///
    /// # Errors
    /// - `SimError::UnknownUnit`, `SimError::UnknownAura` - No such aura
    pub fn aura(&self, id: AuraId) -> SimResult<&Aura> {
        self.auras(id.unit)?.get(id.index).ok_or(SimError::UnknownAura {
            unit: id.unit.0,
            index: id.index,
        })
    }

    pub(crate) fn aura_mut(&mut self, id: AuraId) -> SimResult<&mut Aura> {
        self.tracker_mut(id.unit)?
            .get_mut(id.index)
            .ok_or(SimError::UnknownAura {
                unit: id.unit.0,
                index: id.index,
            })
    }

    /// Aura registered on `unit` under `label`.
    pub fn find_aura(&self, unit: UnitId, label: &str) -> Option<AuraId> {
        self.auras(unit).ok().and_then(|tracker| tracker.find(label))
    }

    /// True when `unit` has an active aura labelled `label`.
    pub fn has_active_aura(&self, unit: UnitId, label: &str) -> bool {
        self.auras(unit).is_ok_and(|tracker| tracker.has_active(label))
    }

    /// Aura registered on `unit` for `action_id`.
    pub fn find_aura_by_action_id(&self, unit: UnitId, action_id: ActionId) -> Option<AuraId> {
        self.auras(unit)
            .ok()
            .and_then(|tracker| tracker.find_by_action_id(action_id))
    }

    /// True when another aura than `excluded` under `tag` is active on `unit`.
    pub fn has_active_aura_with_tag_excluding(
        &self,
        unit: UnitId,
        tag: &str,
        excluded: AuraId,
    ) -> bool {
        self.auras(unit)
            .is_ok_and(|tracker| tracker.active_with_tag_excluding(tag, excluded).is_some())
    }

    /// Registration after construction always fails; the environment is finalized.
    ///
    /// # Errors
    /// - `SimError::EnvironmentFinalized` - Always
    pub fn register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        self.env.register_aura(unit, config)
    }

    // Randomness

    /// Uniform draw in `[0, 1)` from the stream for `label`.
    pub fn random_float(&mut self, label: &str) -> f64 {
        self.rng.random_float(label)
    }

    /// Uniform draw in `[min, max)` on the default damage-roll stream.
    pub fn roll(&mut self, min: f64, max: f64) -> f64 {
        self.rng.roll(min, max)
    }

    /// Uniform draw in `[min, max)` from the stream for `label`.
    pub fn roll_with_label(&mut self, min: f64, max: f64, label: &str) -> f64 {
        self.rng.roll_with_label(min, max, label)
    }

    /// Bernoulli trial with probability `probability`.
    pub fn proc(&mut self, probability: f64, label: &str) -> bool {
        self.rng.proc(probability, label)
    }

    /// Random streams and seeds.
    pub fn rng(&self) -> &RandomManager {
        &self.rng
    }

    // Pending actions

    /// Queues an action and returns a handle for cancellation.
    ///
    /// # Errors
    /// - `SimError::ScheduledInPast` - Due before the current time
    pub fn add_pending_action(&mut self, action: PendingAction) -> SimResult<ActionHandle> {
        if action.next_action_at < self.current_time {
            return Err(SimError::ScheduledInPast {
                at: action.next_action_at,
                now: self.current_time,
            });
        }
        Ok(self.queue.push(action))
    }

    /// Queues a callback without cleanup.
    ///
    /// # Errors
    /// - `SimError::ScheduledInPast` - Due before the current time
    pub fn schedule(
        &mut self,
        at: SimTime,
        priority: ActionPriority,
        on_action: impl FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    ) -> SimResult<ActionHandle> {
        self.add_pending_action(PendingAction::new(at, on_action).with_priority(priority))
    }

    /// Cancels a queued action. Stale or already-run handles are ignored.
    pub fn cancel_action(&mut self, handle: ActionHandle) -> bool {
        self.queue.cancel(handle)
    }

    /// True while the action is queued and not cancelled.
    pub fn is_action_pending(&self, handle: ActionHandle) -> bool {
        self.queue.is_pending(handle)
    }

    /// Number of queued actions, cancelled ones included.
    pub fn pending_action_count(&self) -> usize {
        self.queue.len()
    }

    /// Pool statistics.
    pub fn action_pool(&self) -> &ActionPool {
        self.queue.pool()
    }

    // Lazy schedules

    /// Subscribes a weapon attack.
    pub fn add_weapon_attack(&mut self, attack: Rc<dyn WeaponAttack>) {
        self.weapon_attacks.add(attack);
    }

    /// Unsubscribes a weapon attack.
    pub fn remove_weapon_attack(&mut self, attack: &Rc<dyn WeaponAttack>) -> bool {
        self.weapon_attacks.remove(attack)
    }

    /// Lowers the next weapon service time.
    pub fn reschedule_weapon_attack(&mut self, at: SimTime) {
        self.weapon_attacks.reschedule(at);
    }

    /// Subscribes a task.
    pub fn add_task(&mut self, task: Rc<dyn Task>) {
        self.tasks.add(task);
    }

    /// Unsubscribes a task.
    pub fn remove_task(&mut self, task: &Rc<dyn Task>) -> bool {
        self.tasks.remove(task)
    }

    /// Lowers the next task service time.
    pub fn reschedule_task(&mut self, at: SimTime) {
        self.tasks.reschedule(at);
    }

    /// Next time any weapon attack needs service.
    pub fn next_weapon_attack_time(&self) -> SimTime {
        self.weapon_attacks.min_time()
    }

    /// Next time any task needs service.
    pub fn next_task_time(&self) -> SimTime {
        self.tasks.min_time()
    }

    // Phases and encounter

    /// Current encounter phase.
    pub fn phase(&self) -> i32 {
        self.phases.phase()
    }

    /// True once the encounter is at or below `phase`.
    pub fn is_execute_phase(&self, phase: i32) -> bool {
        self.phases.is_at_or_below(phase)
    }

    /// Registers a phase observer for the current iteration.
    ///
    /// Observers are dropped at every reset; register them from a reset effect.
    pub fn register_phase_callback(
        &mut self,
        callback: impl Fn(&mut Simulation, i32) -> SimResult<()> + 'static,
    ) {
        let callback: PhaseCallback = Rc::new(callback);
        self.phases.register(callback);
    }

    /// Estimated time left in the fight.
    ///
    /// Health-based fights extrapolate from the damage rate so far.
    pub fn remaining_duration(&self) -> SimTime {
        match self.env.encounter.end_fight_at_health() {
            Some(health) if self.current_time > SimTime::ZERO => {
                let taken = self.env.encounter.damage_taken();
                if taken <= 0.0 {
                    return (self.duration - self.current_time).max(SimTime::ZERO);
                }
                let rate = taken / self.current_time.as_secs_f64();
                SimTime::from_secs_f64(((health - taken) / rate).max(0.0))
            }
            _ => (self.duration - self.current_time).max(SimTime::ZERO),
        }
    }

    /// Remaining share of the fight in `[0, 1]`.
    pub fn remaining_duration_percent(&self) -> f64 {
        match self.env.encounter.end_fight_at_health() {
            Some(health) => (1.0 - self.env.encounter.damage_taken() / health).clamp(0.0, 1.0),
            None => {
                let total = self.duration.as_secs_f64();
                if total <= 0.0 {
                    return 0.0;
                }
                (self.remaining_duration().as_secs_f64() / total).clamp(0.0, 1.0)
            }
        }
    }

    // Combat routing

    /// Records direct damage and notifies dealt/taken observers.
    ///
    /// # Errors
    /// Propagates errors from observer hooks.
    pub fn deal_damage(&mut self, result: &SpellResult) -> SimResult<()> {
        self.record_damage(result)?;
        self.dispatch_result(result.caster, AuraEvent::SpellHitDealt, result)?;
        self.dispatch_result(result.target, AuraEvent::SpellHitTaken, result)
    }

    /// Records periodic damage and notifies dealt/taken observers.
    ///
    /// # Errors
    /// Propagates errors from observer hooks.
    pub fn deal_periodic_damage(&mut self, result: &SpellResult) -> SimResult<()> {
        self.record_damage(result)?;
        self.dispatch_result(result.caster, AuraEvent::PeriodicDamageDealt, result)?;
        self.dispatch_result(result.target, AuraEvent::PeriodicDamageTaken, result)
    }

    /// Records direct healing and notifies dealt/taken observers.
    ///
    /// # Errors
    /// Propagates errors from observer hooks.
    pub fn deal_healing(&mut self, result: &SpellResult) -> SimResult<()> {
        self.record_healing(result)?;
        self.dispatch_result(result.caster, AuraEvent::HealDealt, result)?;
        self.dispatch_result(result.target, AuraEvent::HealTaken, result)
    }

    /// Records periodic healing and notifies dealt/taken observers.
    ///
    /// # Errors
    /// Propagates errors from observer hooks.
    pub fn deal_periodic_healing(&mut self, result: &SpellResult) -> SimResult<()> {
        self.record_healing(result)?;
        self.dispatch_result(result.caster, AuraEvent::PeriodicHealDealt, result)?;
        self.dispatch_result(result.target, AuraEvent::PeriodicHealTaken, result)
    }

    /// Notifies the caster's observers before a cast applies its effects.
    ///
    /// # Errors
    /// Propagates errors from observer hooks.
    pub fn fire_apply_effects(
        &mut self,
        caster: UnitId,
        target: UnitId,
        spell: SpellId,
    ) -> SimResult<()> {
        self.dispatch_cast(caster, AuraEvent::ApplyEffects, target, spell)
    }

    /// Notifies the caster's observers after a cast completes.
    ///
    /// # Errors
    /// Propagates errors from observer hooks.
    pub fn fire_cast_complete(
        &mut self,
        caster: UnitId,
        target: UnitId,
        spell: SpellId,
    ) -> SimResult<()> {
        self.dispatch_cast(caster, AuraEvent::CastComplete, target, spell)
    }

    fn record_damage(&mut self, result: &SpellResult) -> SimResult<()> {
        let amount = result.applied_amount();
        self.env.unit_mut(result.caster)?.metrics.add_damage(amount);
        if self.env.unit(result.target)?.kind() == UnitKind::Enemy {
            self.env.encounter.add_damage_taken(amount);
        }
        Ok(())
    }

    fn record_healing(&mut self, result: &SpellResult) -> SimResult<()> {
        let amount = result.applied_amount();
        self.env.unit_mut(result.caster)?.metrics.add_healing(amount);
        Ok(())
    }

    // Observability

    /// Adds a consumer of per-unit iteration results.
    pub fn add_metrics_sink(&mut self, sink: Box<dyn MetricsSink>) {
        self.metrics_sinks.push(sink);
    }

    /// Installs a progress observer, called at most once per progress interval.
    pub fn set_progress_reporter(&mut self, reporter: impl FnMut(&ProgressMetrics) + 'static) {
        self.progress = Some(Box::new(reporter));
    }

    /// Signal that stops the run before the next iteration.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// True when per-event debug logging is on for this iteration.
    pub fn is_logging(&self) -> bool {
        self.log_enabled
    }

    /// Emits a per-event debug line for `unit` when logging is on.
    pub fn log(&self, unit: UnitId, message: impl Display) {
        if !self.log_enabled {
            return;
        }
        let label = self.env.unit(unit).map(Unit::label).unwrap_or("?");
        debug!(time = %self.current_time, unit = label, "{message}");
    }
}
