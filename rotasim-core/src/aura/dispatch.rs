//! Event categories and the interest lists that route them.

use std::fmt;

/// Event categories an aura can observe while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuraEvent {
    /// Before a cast applies its effects
    ApplyEffects,
    /// After a cast completes
    CastComplete,
    /// Direct damage dealt by the owner
    SpellHitDealt,
    /// Direct damage taken by the owner
    SpellHitTaken,
    /// Periodic damage dealt by the owner
    PeriodicDamageDealt,
    /// Periodic damage taken by the owner
    PeriodicDamageTaken,
    /// Direct healing done by the owner
    HealDealt,
    /// Direct healing received by the owner
    HealTaken,
    /// Periodic healing done by the owner
    PeriodicHealDealt,
    /// Periodic healing received by the owner
    PeriodicHealTaken,
    /// Encounter start at time zero
    EncounterStart,
}

impl AuraEvent {
    /// Number of categories.
    pub const COUNT: usize = 11;

    /// Every category in index order.
    pub const ALL: [AuraEvent; AuraEvent::COUNT] = [
        AuraEvent::ApplyEffects,
        AuraEvent::CastComplete,
        AuraEvent::SpellHitDealt,
        AuraEvent::SpellHitTaken,
        AuraEvent::PeriodicDamageDealt,
        AuraEvent::PeriodicDamageTaken,
        AuraEvent::HealDealt,
        AuraEvent::HealTaken,
        AuraEvent::PeriodicHealDealt,
        AuraEvent::PeriodicHealTaken,
        AuraEvent::EncounterStart,
    ];

    /// Stable index into per-category tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// True for categories whose handlers receive a `SpellResult`.
    pub const fn carries_result(self) -> bool {
        !matches!(
            self,
            AuraEvent::ApplyEffects | AuraEvent::CastComplete | AuraEvent::EncounterStart
        )
    }
}

impl fmt::Display for AuraEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Dense list of aura indices interested in one category.
///
/// Each member records its own slot so removal is a swap with the last
/// element. The caller fixes up the slot of the moved member.
#[derive(Debug, Clone, Default)]
pub struct ObserverList {
    members: Vec<u32>,
}

impl ObserverList {
    /// Aura indices currently in the list.
    pub fn members(&self) -> &[u32] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no aura is interested.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Appends a member and returns its slot.
    pub(crate) fn insert(&mut self, aura: u32) -> u32 {
        self.members.push(aura);
        (self.members.len() - 1) as u32
    }

    /// Swap-removes the member at `slot` and returns the aura that moved into it.
    pub(crate) fn remove(&mut self, slot: u32) -> Option<u32> {
        let slot = slot as usize;
        if slot >= self.members.len() {
            return None;
        }
        self.members.swap_remove(slot);
        self.members.get(slot).copied()
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_indices_are_dense() {
        for (position, event) in AuraEvent::ALL.iter().enumerate() {
            assert_eq!(event.index(), position);
        }
        assert!(AuraEvent::SpellHitTaken.carries_result());
        assert!(!AuraEvent::EncounterStart.carries_result());
    }

    #[test]
    fn test_swap_remove_reports_moved_member() {
        let mut list = ObserverList::default();
        assert_eq!(list.insert(10), 0);
        assert_eq!(list.insert(11), 1);
        assert_eq!(list.insert(12), 2);

        assert_eq!(list.remove(0), Some(12));
        assert_eq!(list.members(), &[12, 11]);
        assert_eq!(list.remove(1), None);
        assert_eq!(list.members(), &[12]);
    }
}
