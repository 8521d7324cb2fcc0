//! Pending-action queue and the slot pool backing it.
//!
//! The queue is a vector kept sorted so that the next action to run sits at
//! the end and a sentinel that never comes due sits at index zero. Actions
//! themselves live in pool slots addressed by generational handles, which
//! makes cancellation O(1) and keeps stale handles harmless after a slot is
//! recycled.

use std::fmt;

use crate::error::SimResult;
use crate::simulation::Simulation;
use crate::time::SimTime;

/// Callback run when an action comes due.
pub type ActionCallback = Box<dyn FnOnce(&mut Simulation) -> SimResult<()>>;

/// Callback run when an action is discarded without its callback running.
pub type CleanupCallback = Box<dyn FnOnce(&mut Simulation) -> SimResult<()>>;

/// Tie-break among actions due at the same instant. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ActionPriority(pub i32);

impl ActionPriority {
    /// Background work that yields to everything else
    pub const LOW: ActionPriority = ActionPriority(-1);
    /// Global-cooldown driven decisions
    pub const GCD: ActionPriority = ActionPriority(0);
    /// Resource regeneration
    pub const REGEN: ActionPriority = ActionPriority(1);
    /// Periodic effect ticks
    pub const DOT: ActionPriority = ActionPriority(2);
    /// Automatic attacks
    pub const AUTO: ActionPriority = ActionPriority(3);
    /// Base priority for pre-pull actions
    pub const PREPULL: ActionPriority = ActionPriority(4);

    /// Returns this priority raised by `offset`.
    pub const fn raised(self, offset: i32) -> ActionPriority {
        ActionPriority(self.0 + offset)
    }
}

/// Work scheduled for a future simulation time.
pub struct PendingAction {
    /// When the callback runs
    pub next_action_at: SimTime,
    /// Tie-break among actions due at the same time
    pub priority: ActionPriority,
    on_action: ActionCallback,
    clean_up: Option<CleanupCallback>,
}

impl PendingAction {
    /// Creates an action with default priority.
    pub fn new(
        next_action_at: SimTime,
        on_action: impl FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    ) -> Self {
        Self {
            next_action_at,
            priority: ActionPriority::default(),
            on_action: Box::new(on_action),
            clean_up: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Attaches a cleanup callback, run only if the action callback never runs.
    pub fn with_cleanup(
        mut self,
        clean_up: impl FnOnce(&mut Simulation) -> SimResult<()> + 'static,
    ) -> Self {
        self.clean_up = Some(Box::new(clean_up));
        self
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction")
            .field("next_action_at", &self.next_action_at)
            .field("priority", &self.priority)
            .field("has_clean_up", &self.clean_up.is_some())
            .finish()
    }
}

/// Generational key for a queued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle {
    index: u32,
    generation: u32,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    occupied: bool,
    cancelled: bool,
    consumed: bool,
    on_action: Option<ActionCallback>,
    clean_up: Option<CleanupCallback>,
}

/// Reusable storage for pending actions, owned by one simulation.
#[derive(Default)]
pub struct ActionPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    recycled: u64,
}

impl ActionPool {
    fn acquire(&mut self, on_action: ActionCallback, clean_up: Option<CleanupCallback>) -> ActionHandle {
        let index = match self.free.pop() {
            Some(index) => {
                self.recycled += 1;
                index
            }
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.occupied = true;
        slot.cancelled = false;
        slot.consumed = false;
        slot.on_action = Some(on_action);
        slot.clean_up = clean_up;

        ActionHandle {
            index,
            generation: slot.generation,
        }
    }

    fn release(&mut self, handle: ActionHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.occupied = false;
            slot.on_action = None;
            slot.clean_up = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index);
        }
    }

    fn slot(&self, handle: ActionHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.occupied && slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: ActionHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.occupied && slot.generation == handle.generation)
    }

    /// Number of slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of acquisitions served from a released slot.
    pub fn recycled(&self) -> u64 {
        self.recycled
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    at: SimTime,
    priority: ActionPriority,
    handle: Option<ActionHandle>,
}

impl QueueEntry {
    const SENTINEL: QueueEntry = QueueEntry {
        at: SimTime::NEVER,
        priority: ActionPriority(i32::MIN),
        handle: None,
    };
}

/// Time-ordered queue of pending actions.
pub struct PendingActionQueue {
    entries: Vec<QueueEntry>,
    pool: ActionPool,
}

impl Default for PendingActionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingActionQueue {
    /// Creates an empty queue holding only the sentinel.
    pub fn new() -> Self {
        Self {
            entries: vec![QueueEntry::SENTINEL],
            pool: ActionPool::default(),
        }
    }

    /// Inserts an action and returns its handle.
    ///
    /// Later actions sit closer to the front. Among equal times, higher
    /// priority sits closer to the end, and equal priority keeps insertion
    /// order so the earlier insert runs first.
    pub fn push(&mut self, action: PendingAction) -> ActionHandle {
        let PendingAction {
            next_action_at,
            priority,
            on_action,
            clean_up,
        } = action;

        let handle = self.pool.acquire(on_action, clean_up);
        let offset = self.entries[1..].partition_point(|entry| {
            !(entry.at < next_action_at || (entry.at == next_action_at && entry.priority >= priority))
        });
        self.entries.insert(
            offset + 1,
            QueueEntry {
                at: next_action_at,
                priority,
                handle: Some(handle),
            },
        );
        handle
    }

    /// Due time of the next action, or `NEVER` when only the sentinel remains.
    pub fn next_time(&self) -> SimTime {
        self.entries.last().map_or(SimTime::NEVER, |entry| entry.at)
    }

    /// Handle of the next action without removing it.
    pub fn peek(&self) -> Option<ActionHandle> {
        self.entries.last().and_then(|entry| entry.handle)
    }

    /// Removes the next action. The sentinel is never removed.
    pub fn pop(&mut self) -> Option<ActionHandle> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop().and_then(|entry| entry.handle)
    }

    /// Number of queued actions, excluding the sentinel.
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    /// True when only the sentinel remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks an action cancelled. Returns false for stale, consumed or already
    /// cancelled handles.
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        match self.pool.slot_mut(handle) {
            Some(slot) if !slot.consumed && !slot.cancelled => {
                slot.cancelled = true;
                true
            }
            _ => false,
        }
    }

    /// True when the action is queued and neither cancelled nor consumed.
    pub fn is_pending(&self, handle: ActionHandle) -> bool {
        self.pool
            .slot(handle)
            .is_some_and(|slot| !slot.consumed && !slot.cancelled)
    }

    pub(crate) fn is_cancelled(&self, handle: ActionHandle) -> bool {
        self.pool.slot(handle).is_some_and(|slot| slot.cancelled)
    }

    pub(crate) fn mark_consumed(&mut self, handle: ActionHandle) {
        if let Some(slot) = self.pool.slot_mut(handle) {
            slot.consumed = true;
        }
    }

    pub(crate) fn take_action(&mut self, handle: ActionHandle) -> Option<ActionCallback> {
        self.pool.slot_mut(handle).and_then(|slot| slot.on_action.take())
    }

    pub(crate) fn take_clean_up(&mut self, handle: ActionHandle) -> Option<CleanupCallback> {
        self.pool.slot_mut(handle).and_then(|slot| slot.clean_up.take())
    }

    /// Returns the slot to the pool.
    pub(crate) fn dispose(&mut self, handle: ActionHandle) {
        self.pool.release(handle);
    }

    /// Removes every queued action, next first, leaving the sentinel.
    pub(crate) fn drain(&mut self) -> Vec<ActionHandle> {
        self.entries
            .drain(1..)
            .rev()
            .filter_map(|entry| entry.handle)
            .collect()
    }

    /// Access to pool statistics.
    pub fn pool(&self) -> &ActionPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(at: SimTime, priority: ActionPriority) -> PendingAction {
        PendingAction::new(at, |_| Ok(())).with_priority(priority)
    }

    fn pop_all(queue: &mut PendingActionQueue) -> Vec<ActionHandle> {
        let mut order = Vec::new();
        while let Some(handle) = queue.pop() {
            order.push(handle);
            queue.dispose(handle);
        }
        order
    }

    #[test]
    fn test_time_then_priority_then_fifo() {
        let mut queue = PendingActionQueue::new();
        let t1 = SimTime::from_secs(1);
        let t2 = SimTime::from_secs(2);

        let late = queue.push(noop(t2, ActionPriority::AUTO));
        let low_a = queue.push(noop(t1, ActionPriority::GCD));
        let high = queue.push(noop(t1, ActionPriority::DOT));
        let low_b = queue.push(noop(t1, ActionPriority::GCD));

        assert_eq!(queue.next_time(), t1);
        assert_eq!(pop_all(&mut queue), vec![high, low_a, low_b, late]);
        assert_eq!(queue.next_time(), SimTime::NEVER);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_sentinel_never_pops() {
        let mut queue = PendingActionQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.peek().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_cancel_is_idempotent_and_stale_safe() {
        let mut queue = PendingActionQueue::new();
        let handle = queue.push(noop(SimTime::from_secs(1), ActionPriority::GCD));
        assert!(queue.is_pending(handle));
        assert!(queue.cancel(handle));
        assert!(!queue.cancel(handle));
        assert!(queue.is_cancelled(handle));

        let popped = queue.pop();
        assert_eq!(popped, Some(handle));
        queue.dispose(handle);

        let reused = queue.push(noop(SimTime::from_secs(2), ActionPriority::GCD));
        assert_eq!(queue.pool().recycled(), 1);
        assert!(!queue.cancel(handle));
        assert!(queue.is_pending(reused));
    }

    #[test]
    fn test_drain_returns_next_first() {
        let mut queue = PendingActionQueue::new();
        let b = queue.push(noop(SimTime::from_secs(2), ActionPriority::GCD));
        let a = queue.push(noop(SimTime::from_secs(1), ActionPriority::GCD));
        assert_eq!(queue.drain(), vec![a, b]);
        assert!(queue.is_empty());
        assert_eq!(queue.next_time(), SimTime::NEVER);
    }
}
