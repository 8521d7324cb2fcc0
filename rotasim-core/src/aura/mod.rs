//! Auras: timed, optionally stacking effects attached to a unit.
//!
//! An aura is registered once per environment and then activated,
//! refreshed and deactivated many times across iterations. Lifecycle
//! transitions are driven through [`Simulation`] because hooks need the
//! whole world; this module holds the data and configuration.

mod array;
mod dispatch;
mod exclusive;
mod tracker;

use std::fmt;
use std::rc::Rc;

pub use array::AuraArray;
pub use dispatch::{AuraEvent, ObserverList};
pub use exclusive::{ExclusiveCategoryId, ExclusiveEffect, ExclusiveHolder, ExclusiveRegistry};
pub use tracker::{AuraTracker, ResetEffect};
pub(crate) use tracker::ListKey;

use crate::combat::{ActionId, SpellId, SpellResult};
use crate::error::SimResult;
use crate::metrics::AuraMetrics;
use crate::simulation::Simulation;
use crate::time::SimTime;
use crate::unit::UnitId;

/// Address of an aura: owning unit plus its index in that unit's tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuraId {
    /// Owning unit
    pub unit: UnitId,
    /// Index within the owner's tracker
    pub index: u32,
}

impl AuraId {
    /// Builds an address.
    pub const fn new(unit: UnitId, index: u32) -> Self {
        Self { unit, index }
    }
}

impl fmt::Display for AuraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.unit, self.index)
    }
}

/// Lifecycle hook receiving the aura it belongs to.
pub type AuraHook = Rc<dyn Fn(&mut Simulation, AuraId) -> SimResult<()>>;

/// Hook receiving the old and new stack counts.
pub type StacksHook = Rc<dyn Fn(&mut Simulation, AuraId, i32, i32) -> SimResult<()>>;

/// Hook for cast events: the cast target and the spell.
pub type CastHook = Rc<dyn Fn(&mut Simulation, AuraId, UnitId, SpellId) -> SimResult<()>>;

/// Hook for damage and healing events.
pub type ResultHook = Rc<dyn Fn(&mut Simulation, AuraId, &SpellResult) -> SimResult<()>>;

#[derive(Clone)]
pub(crate) enum EventHandler {
    Cast(CastHook),
    Result(ResultHook),
    Plain(AuraHook),
}

/// Lifecycle hooks. Each runs at most once per transition.
#[derive(Clone, Default)]
pub struct AuraHooks {
    pub(crate) on_init: Option<AuraHook>,
    pub(crate) on_reset: Option<AuraHook>,
    pub(crate) on_done_iteration: Option<AuraHook>,
    pub(crate) on_gain: Option<AuraHook>,
    pub(crate) on_expire: Option<AuraHook>,
    pub(crate) on_stacks_change: Option<StacksHook>,
}

/// Runs `first` then `second`, stopping at the first error.
pub(crate) fn chain_hook(first: Option<AuraHook>, second: AuraHook) -> AuraHook {
    let Some(first) = first else {
        return second;
    };
    Rc::new(move |sim: &mut Simulation, aura: AuraId| {
        first(sim, aura)?;
        second(sim, aura)
    })
}

pub(crate) fn chain_stacks_hook(first: Option<StacksHook>, second: StacksHook) -> StacksHook {
    let Some(first) = first else {
        return second;
    };
    Rc::new(move |sim: &mut Simulation, aura: AuraId, old: i32, new: i32| {
        first(sim, aura, old, new)?;
        second(sim, aura, old, new)
    })
}

/// Registration-time description of an aura.
#[derive(Clone)]
pub struct AuraConfig {
    pub(crate) label: String,
    pub(crate) tag: Option<String>,
    pub(crate) action_id: Option<ActionId>,
    pub(crate) duration: SimTime,
    pub(crate) max_stacks: i32,
    pub(crate) exclusive: Vec<(String, f64)>,
    pub(crate) hooks: AuraHooks,
    pub(crate) handlers: [Option<EventHandler>; AuraEvent::COUNT],
}

impl AuraConfig {
    /// Starts a configuration with a label and duration.
    pub fn new(label: impl Into<String>, duration: SimTime) -> Self {
        Self {
            label: label.into(),
            tag: None,
            action_id: None,
            duration,
            max_stacks: 0,
            exclusive: Vec::new(),
            hooks: AuraHooks::default(),
            handlers: Default::default(),
        }
    }

    /// An aura that stays active until explicitly deactivated.
    pub fn permanent(label: impl Into<String>) -> Self {
        Self::new(label, SimTime::NEVER)
    }

    /// Groups the aura under a tag for lookups.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Associates an action id, which enables proc and uptime metrics.
    pub fn with_action_id(mut self, action_id: ActionId) -> Self {
        self.action_id = Some(action_id);
        self
    }

    /// Allows up to `max_stacks` stacks.
    pub fn with_max_stacks(mut self, max_stacks: i32) -> Self {
        self.max_stacks = max_stacks.max(0);
        self
    }

    /// Claims membership of an exclusive category at `priority`.
    pub fn exclusive(mut self, category: impl Into<String>, priority: f64) -> Self {
        self.exclusive.push((category.into(), priority));
        self
    }

    /// One-time hook run before the aura's first reset.
    pub fn on_init(
        mut self,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.hooks.on_init = Some(chain_hook(self.hooks.on_init.take(), Rc::new(hook)));
        self
    }

    /// Hook run at every iteration reset.
    pub fn on_reset(
        mut self,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.hooks.on_reset = Some(chain_hook(self.hooks.on_reset.take(), Rc::new(hook)));
        self
    }

    /// Hook run at the end of every iteration.
    pub fn on_done_iteration(
        mut self,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.hooks.on_done_iteration =
            Some(chain_hook(self.hooks.on_done_iteration.take(), Rc::new(hook)));
        self
    }

    /// Hook run after the aura becomes active.
    pub fn on_gain(
        mut self,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.hooks.on_gain = Some(chain_hook(self.hooks.on_gain.take(), Rc::new(hook)));
        self
    }

    /// Hook run after the aura becomes inactive.
    pub fn on_expire(
        mut self,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.hooks.on_expire = Some(chain_hook(self.hooks.on_expire.take(), Rc::new(hook)));
        self
    }

    /// Hook run whenever the stack count changes.
    pub fn on_stacks_change(
        mut self,
        hook: impl Fn(&mut Simulation, AuraId, i32, i32) -> SimResult<()> + 'static,
    ) -> Self {
        self.hooks.on_stacks_change = Some(chain_stacks_hook(
            self.hooks.on_stacks_change.take(),
            Rc::new(hook),
        ));
        self
    }

    /// Observes casts before their effects apply.
    pub fn on_apply_effects(
        self,
        hook: impl Fn(&mut Simulation, AuraId, UnitId, SpellId) -> SimResult<()> + 'static,
    ) -> Self {
        self.with_handler(AuraEvent::ApplyEffects, EventHandler::Cast(Rc::new(hook)))
    }

    /// Observes completed casts.
    pub fn on_cast_complete(
        self,
        hook: impl Fn(&mut Simulation, AuraId, UnitId, SpellId) -> SimResult<()> + 'static,
    ) -> Self {
        self.with_handler(AuraEvent::CastComplete, EventHandler::Cast(Rc::new(hook)))
    }

    /// Observes the encounter start.
    pub fn on_encounter_start(
        self,
        hook: impl Fn(&mut Simulation, AuraId) -> SimResult<()> + 'static,
    ) -> Self {
        self.with_handler(AuraEvent::EncounterStart, EventHandler::Plain(Rc::new(hook)))
    }

    /// Observes one of the damage or healing categories.
    ///
    /// Categories that do not carry a result are ignored here; use the
    /// dedicated cast and encounter-start builders for those.
    pub fn on_result(
        self,
        event: AuraEvent,
        hook: impl Fn(&mut Simulation, AuraId, &SpellResult) -> SimResult<()> + 'static,
    ) -> Self {
        if !event.carries_result() {
            return self;
        }
        self.with_handler(event, EventHandler::Result(Rc::new(hook)))
    }

    /// Observes direct damage dealt by the owner.
    pub fn on_spell_hit_dealt(
        self,
        hook: impl Fn(&mut Simulation, AuraId, &SpellResult) -> SimResult<()> + 'static,
    ) -> Self {
        self.on_result(AuraEvent::SpellHitDealt, hook)
    }

    /// Observes direct damage taken by the owner.
    pub fn on_spell_hit_taken(
        self,
        hook: impl Fn(&mut Simulation, AuraId, &SpellResult) -> SimResult<()> + 'static,
    ) -> Self {
        self.on_result(AuraEvent::SpellHitTaken, hook)
    }

    /// Observes periodic damage dealt by the owner.
    pub fn on_periodic_damage_dealt(
        self,
        hook: impl Fn(&mut Simulation, AuraId, &SpellResult) -> SimResult<()> + 'static,
    ) -> Self {
        self.on_result(AuraEvent::PeriodicDamageDealt, hook)
    }

    fn with_handler(mut self, event: AuraEvent, handler: EventHandler) -> Self {
        self.handlers[event.index()] = Some(handler);
        self
    }
}

/// Snapshot of an aura's mutable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuraState {
    /// Whether the aura was active
    pub active: bool,
    /// Time left when saved
    pub remaining_duration: SimTime,
    /// Stack count when saved
    pub stacks: i32,
}

/// Registered aura and its per-iteration state.
pub struct Aura {
    pub(crate) id: AuraId,
    pub(crate) label: String,
    pub(crate) tag: Option<String>,
    pub(crate) action_id: Option<ActionId>,
    pub(crate) duration: SimTime,
    pub(crate) max_stacks: i32,
    pub(crate) exclusive: Vec<ExclusiveEffect>,
    pub(crate) hooks: AuraHooks,
    pub(crate) handlers: [Option<EventHandler>; AuraEvent::COUNT],

    pub(crate) active: bool,
    pub(crate) stacks: i32,
    pub(crate) start_time: SimTime,
    pub(crate) expires: SimTime,
    pub(crate) fade_time: Option<SimTime>,
    pub(crate) initialized: bool,
    pub(crate) metrics: AuraMetrics,

    pub(crate) expiring_slot: Option<u32>,
    pub(crate) dispatch_slots: [Option<u32>; AuraEvent::COUNT],
}

impl Aura {
    /// Address of this aura.
    pub fn id(&self) -> AuraId {
        self.id
    }

    /// Unique label on the owning unit.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Lookup tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Metrics action id, if any.
    pub fn action_id(&self) -> Option<ActionId> {
        self.action_id
    }

    /// Configured duration, `NEVER` for permanent auras.
    pub fn duration(&self) -> SimTime {
        self.duration
    }

    /// True while active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True for auras that never expire on their own.
    pub fn is_permanent(&self) -> bool {
        self.duration.is_never()
    }

    /// Current stack count.
    pub fn stacks(&self) -> i32 {
        self.stacks
    }

    /// Stack cap, zero for auras without stacks.
    pub fn max_stacks(&self) -> i32 {
        self.max_stacks
    }

    /// Time of the latest activation (refreshes excluded).
    pub fn start_time(&self) -> SimTime {
        self.start_time
    }

    /// Expiration time while active.
    pub fn expires_at(&self) -> SimTime {
        self.expires
    }

    /// Time of the latest deactivation in this iteration.
    pub fn fade_time(&self) -> Option<SimTime> {
        self.fade_time
    }

    /// Exclusive memberships claimed while active.
    pub fn exclusive_effects(&self) -> &[ExclusiveEffect] {
        &self.exclusive
    }

    /// Proc and uptime metrics.
    pub fn metrics(&self) -> &AuraMetrics {
        &self.metrics
    }

    /// Time left before expiry, zero when inactive.
    pub fn remaining_duration(&self, now: SimTime) -> SimTime {
        if !self.active {
            SimTime::ZERO
        } else if self.expires.is_never() {
            SimTime::NEVER
        } else {
            (self.expires - now).max(SimTime::ZERO)
        }
    }

    /// Time since activation, zero when inactive.
    pub fn time_active(&self, now: SimTime) -> SimTime {
        if self.active {
            now - self.start_time
        } else {
            SimTime::ZERO
        }
    }

    /// Time since the last fade, `NEVER` if it has not faded this iteration.
    pub fn time_inactive(&self, now: SimTime) -> SimTime {
        match (self.active, self.fade_time) {
            (true, _) => SimTime::ZERO,
            (false, Some(faded)) => now - faded,
            (false, None) => SimTime::NEVER,
        }
    }

    /// True when the aura reacts to `event`.
    pub fn handles(&self, event: AuraEvent) -> bool {
        self.handlers[event.index()].is_some()
    }

    /// Slot in the interest list for `event`, when linked.
    pub fn dispatch_slot(&self, event: AuraEvent) -> Option<u32> {
        self.dispatch_slots[event.index()]
    }

    /// Slot in the expiring list, when linked.
    pub fn expiring_slot(&self) -> Option<u32> {
        self.expiring_slot
    }

    pub(crate) fn handler(&self, event: AuraEvent) -> Option<EventHandler> {
        self.handlers[event.index()].clone()
    }

    pub(crate) fn tracks_metrics(&self) -> bool {
        self.action_id.is_some()
    }
}

impl fmt::Debug for Aura {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aura")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("active", &self.active)
            .field("stacks", &self.stacks)
            .field("expires", &self.expires)
            .finish()
    }
}
