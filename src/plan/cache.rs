use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::core::Result;
use crate::entity::Entity;
use crate::plan::EntityPlan;

/// Type-keyed store of compiled entity plans.
///
/// The cache exclusively owns every plan; consumers only ever hold
/// `Arc<EntityPlan<T>>` read handles. Entries are never evicted: a plan lives
/// as long as the cache, which for the default instance is the process
/// lifetime. First registration wins; later builds for the same type are
/// silently ignored so repeated discovery stays idempotent.
pub struct PlanCache {
    plans: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// Insert the plan unless one is already registered for `T`.
    /// Returns whether this call inserted it.
    pub fn try_add<T: Entity>(&self, plan: EntityPlan<T>) -> Result<bool> {
        let mut plans = self.plans.write()?;
        match plans.entry(TypeId::of::<T>()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                debug!(
                    "plan for '{}' already registered; keeping the first one",
                    T::entity_name()
                );
                Ok(false)
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Arc::new(plan));
                Ok(true)
            }
        }
    }

    pub fn try_get<T: Entity>(&self) -> Result<Option<Arc<EntityPlan<T>>>> {
        let plans = self.plans.read()?;
        Ok(plans
            .get(&TypeId::of::<T>())
            .and_then(|plan| Arc::clone(plan).downcast::<EntityPlan<T>>().ok()))
    }

    /// Return the existing plan or build-and-insert one. The factory runs
    /// under the write lock, so concurrent first access builds exactly once.
    pub fn get_or_add<T: Entity>(
        &self,
        factory: impl FnOnce() -> Result<EntityPlan<T>>,
    ) -> Result<Arc<EntityPlan<T>>> {
        if let Some(existing) = self.try_get::<T>()? {
            return Ok(existing);
        }

        let mut plans = self.plans.write()?;
        if let Some(existing) = plans.get(&TypeId::of::<T>()) {
            if let Ok(plan) = Arc::clone(existing).downcast::<EntityPlan<T>>() {
                return Ok(plan);
            }
        }

        let plan: Arc<EntityPlan<T>> = Arc::new(factory()?);
        plans.insert(TypeId::of::<T>(), plan.clone());
        Ok(plan)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.plans.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}
