//! Lazily-serviced schedules for high-frequency work.
//!
//! Weapon swings and periodic tasks would flood the pending-action queue if
//! each occurrence were queued. Instead each schedule caches the earliest
//! time any subscriber needs service and the driver only visits subscribers
//! once the clock reaches it.
//!
//! Subscribers are serviced through a shared reference, so hooks fired
//! while a swing or task runs may still reach that subscriber. Mutable
//! subscriber state lives in cells.

use std::rc::Rc;

use crate::error::SimResult;
use crate::simulation::Simulation;
use crate::time::SimTime;

/// Automatic attack cadence owned by a unit.
pub trait WeaponAttack {
    /// Performs any swings due at the current time and returns the next time
    /// this attack needs service, or `SimTime::NEVER`.
    ///
    /// # Errors
    /// Propagates any structural error raised by the swing.
    fn try_swing(&self, sim: &mut Simulation) -> SimResult<SimTime>;
}

/// Periodic task such as resource regeneration.
pub trait Task {
    /// Runs any work due at the current time and returns the next due time,
    /// or `SimTime::NEVER`.
    ///
    /// # Errors
    /// Propagates any structural error raised by the task.
    fn run_task(&self, sim: &mut Simulation) -> SimResult<SimTime>;
}

/// Subscriber set with a cached minimum due time.
pub struct LazySchedule<T: ?Sized> {
    min_time: SimTime,
    subscribers: Vec<Rc<T>>,
}

impl<T: ?Sized> Default for LazySchedule<T> {
    fn default() -> Self {
        Self {
            min_time: SimTime::NEVER,
            subscribers: Vec::new(),
        }
    }
}

impl<T: ?Sized> LazySchedule<T> {
    /// Earliest time any subscriber needs service.
    pub fn min_time(&self) -> SimTime {
        self.min_time
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// True when nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Adds a subscriber. Adding the same subscriber twice is a no-op.
    pub fn add(&mut self, subscriber: Rc<T>) {
        if !self.contains(&subscriber) {
            self.subscribers.push(subscriber);
        }
    }

    /// Removes a subscriber. Returns false if it was not subscribed.
    pub fn remove(&mut self, subscriber: &Rc<T>) -> bool {
        match self.position(subscriber) {
            Some(index) => {
                self.subscribers.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Lowers the cached minimum to `at` if earlier.
    pub fn reschedule(&mut self, at: SimTime) {
        self.min_time = self.min_time.min(at);
    }

    pub(crate) fn set_min_time(&mut self, at: SimTime) {
        self.min_time = at;
    }

    /// Copy of the subscriber list, safe to iterate while subscribers mutate the schedule.
    pub(crate) fn snapshot(&self) -> Vec<Rc<T>> {
        self.subscribers.clone()
    }

    /// Drops every subscriber and resets the minimum.
    pub fn reset(&mut self) {
        self.subscribers.clear();
        self.min_time = SimTime::NEVER;
    }

    fn contains(&self, subscriber: &Rc<T>) -> bool {
        self.position(subscriber).is_some()
    }

    fn position(&self, subscriber: &Rc<T>) -> Option<usize> {
        let target = Rc::as_ptr(subscriber).cast::<()>();
        self.subscribers
            .iter()
            .position(|candidate| Rc::as_ptr(candidate).cast::<()>() == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(SimTime);

    impl Task for Fixed {
        fn run_task(&self, _sim: &mut Simulation) -> SimResult<SimTime> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_add_remove_by_identity() {
        let mut schedule: LazySchedule<dyn Task> = LazySchedule::default();
        let a: Rc<dyn Task> = Rc::new(Fixed(SimTime::from_secs(1)));
        let b: Rc<dyn Task> = Rc::new(Fixed(SimTime::from_secs(1)));

        schedule.add(a.clone());
        schedule.add(a.clone());
        schedule.add(b.clone());
        assert_eq!(schedule.len(), 2);

        assert!(schedule.remove(&a));
        assert!(!schedule.remove(&a));
        assert_eq!(schedule.len(), 1);
        assert!(schedule.remove(&b));
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_reschedule_keeps_minimum() {
        let mut schedule: LazySchedule<dyn Task> = LazySchedule::default();
        assert!(schedule.min_time().is_never());
        schedule.reschedule(SimTime::from_secs(5));
        schedule.reschedule(SimTime::from_secs(9));
        assert_eq!(schedule.min_time(), SimTime::from_secs(5));
        schedule.reset();
        assert!(schedule.min_time().is_never());
    }
}
