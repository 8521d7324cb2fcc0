//! Mutual-exclusion categories among a unit's auras.

/// Index of a category within one unit's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExclusiveCategoryId(u32);

/// Membership an aura claims while active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusiveEffect {
    /// Category claimed
    pub category: ExclusiveCategoryId,
    /// Strength within the category
    pub priority: f64,
}

/// Active member of a category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExclusiveHolder {
    /// Aura index on the owning unit
    pub aura: u32,
    /// Strength within the category
    pub priority: f64,
}

#[derive(Debug, Clone)]
struct Category {
    name: String,
    holders: Vec<ExclusiveHolder>,
}

/// Per-unit set of exclusive categories.
#[derive(Debug, Clone, Default)]
pub struct ExclusiveRegistry {
    categories: Vec<Category>,
}

impl ExclusiveRegistry {
    /// Returns the category with `name`, creating it on first use.
    pub fn category(&mut self, name: &str) -> ExclusiveCategoryId {
        if let Some(id) = self.find(name) {
            return id;
        }
        self.categories.push(Category {
            name: name.to_string(),
            holders: Vec::new(),
        });
        ExclusiveCategoryId((self.categories.len() - 1) as u32)
    }

    /// Looks a category up by name.
    pub fn find(&self, name: &str) -> Option<ExclusiveCategoryId> {
        self.categories
            .iter()
            .position(|category| category.name == name)
            .map(|index| ExclusiveCategoryId(index as u32))
    }

    /// Name of a category, `None` for an id from another registry.
    pub fn name(&self, id: ExclusiveCategoryId) -> Option<&str> {
        self.categories
            .get(id.0 as usize)
            .map(|category| category.name.as_str())
    }

    /// Active members of a category. Empty for an id from another registry.
    pub fn holders(&self, id: ExclusiveCategoryId) -> &[ExclusiveHolder] {
        self.categories
            .get(id.0 as usize)
            .map(|category| category.holders.as_slice())
            .unwrap_or_default()
    }

    /// Strongest active member, earliest wins ties.
    pub fn strongest(&self, id: ExclusiveCategoryId) -> Option<ExclusiveHolder> {
        self.holders(id).iter().copied().fold(None, |best, holder| match best {
            Some(current) if current.priority >= holder.priority => Some(current),
            _ => Some(holder),
        })
    }

    /// Joins `aura` to the category unless a strictly stronger member is
    /// active, in which case that member's index is returned. Unknown
    /// categories have no members and never block.
    pub(crate) fn acquire(
        &mut self,
        effect: ExclusiveEffect,
        aura: u32,
    ) -> Result<(), u32> {
        let Some(category) = self.categories.get_mut(effect.category.0 as usize) else {
            return Ok(());
        };
        if let Some(blocker) = category
            .holders
            .iter()
            .find(|holder| holder.aura != aura && holder.priority > effect.priority)
        {
            return Err(blocker.aura);
        }
        if !category.holders.iter().any(|holder| holder.aura == aura) {
            category.holders.push(ExclusiveHolder {
                aura,
                priority: effect.priority,
            });
        }
        Ok(())
    }

    pub(crate) fn release(&mut self, category: ExclusiveCategoryId, aura: u32) {
        if let Some(category) = self.categories.get_mut(category.0 as usize) {
            category.holders.retain(|holder| holder.aura != aura);
        }
    }

    pub(crate) fn reset(&mut self) {
        for category in &mut self.categories {
            category.holders.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stronger_member_blocks() {
        let mut registry = ExclusiveRegistry::default();
        let id = registry.category("armor");
        assert_eq!(registry.category("armor"), id);

        let strong = ExclusiveEffect { category: id, priority: 10.0 };
        let weak = ExclusiveEffect { category: id, priority: 5.0 };
        assert_eq!(registry.acquire(strong, 0), Ok(()));
        assert_eq!(registry.acquire(weak, 1), Err(0));
        assert_eq!(registry.holders(id).len(), 1);

        registry.release(id, 0);
        assert_eq!(registry.acquire(weak, 1), Ok(()));
        assert_eq!(registry.acquire(strong, 0), Ok(()));
        assert_eq!(registry.strongest(id).map(|holder| holder.aura), Some(0));
    }

    #[test]
    fn test_equal_priority_does_not_block() {
        let mut registry = ExclusiveRegistry::default();
        let id = registry.category("haste");
        let effect = ExclusiveEffect { category: id, priority: 1.0 };
        assert_eq!(registry.acquire(effect, 3), Ok(()));
        assert_eq!(registry.acquire(effect, 4), Ok(()));
        assert_eq!(registry.strongest(id).map(|holder| holder.aura), Some(3));
        registry.reset();
        assert!(registry.holders(id).is_empty());
        assert_eq!(registry.name(id), Some("haste"));
    }

    #[test]
    fn test_foreign_category_id_is_harmless() {
        let mut wide = ExclusiveRegistry::default();
        wide.category("armor");
        let foreign = wide.category("haste");
        let effect = ExclusiveEffect { category: foreign, priority: 2.0 };
        assert_eq!(wide.acquire(effect, 0), Ok(()));

        let mut narrow = ExclusiveRegistry::default();
        narrow.category("armor");
        assert_eq!(narrow.name(foreign), None);
        assert!(narrow.holders(foreign).is_empty());
        assert_eq!(narrow.strongest(foreign), None);
        assert_eq!(narrow.acquire(effect, 1), Ok(()));
        narrow.release(foreign, 1);
        assert_eq!(wide.holders(foreign).len(), 1);
    }
}
