//! Relation steps: the compiled "load my children after me" part of a plan.
//!
//! A step flattens the owners' related records into one sequence, copies each
//! owner's primary key into its targets' foreign keys, and re-enters the
//! orchestrator for the target type. Foreign keys are assigned before the
//! recursive load begins, so the child plan serializes them populated.

use async_trait::async_trait;

use crate::core::{Result, Value};
use crate::entity::Entity;
use crate::loader::{load_slice, LoadContext};

/// One configured relation of an entity plan. Invoked by the orchestrator
/// after the owning type's rows are finalized, in declaration order.
#[async_trait]
pub(crate) trait RelationStep<T: Entity>: Send + Sync {
    async fn load(
        &self,
        owners: &mut [&mut T],
        ctx: &LoadContext<'_>,
        depth: usize,
    ) -> Result<u64>;
}

pub(crate) struct OneToManyStep<T, C> {
    children: for<'a> fn(&'a mut T) -> Option<&'a mut Vec<C>>,
    owner_key: fn(&T) -> Value,
    assign_key: fn(&mut C, &Value),
}

impl<T, C> OneToManyStep<T, C> {
    pub(crate) fn new(
        children: for<'a> fn(&'a mut T) -> Option<&'a mut Vec<C>>,
        owner_key: fn(&T) -> Value,
        assign_key: fn(&mut C, &Value),
    ) -> Self {
        Self {
            children,
            owner_key,
            assign_key,
        }
    }
}

#[async_trait]
impl<T: Entity, C: Entity> RelationStep<T> for OneToManyStep<T, C> {
    async fn load(
        &self,
        owners: &mut [&mut T],
        ctx: &LoadContext<'_>,
        depth: usize,
    ) -> Result<u64> {
        let mut flat: Vec<&mut C> = Vec::new();

        for owner in owners.iter_mut() {
            let owner: &mut T = &mut **owner;
            let key = (self.owner_key)(&*owner);

            if let Some(children) = (self.children)(owner) {
                for child in children.iter_mut() {
                    (self.assign_key)(child, &key);
                    flat.push(child);
                }
            }
        }

        // No related records means no load command. This is also what lets a
        // finite self-referential tree bottom out instead of opening empty
        // sessions all the way to the depth limit.
        if flat.is_empty() {
            return Ok(0);
        }

        load_slice::<C>(&mut flat, ctx, depth).await
    }
}

pub(crate) struct OneToOneStep<T, C> {
    child: for<'a> fn(&'a mut T) -> Option<&'a mut C>,
    owner_key: fn(&T) -> Value,
    assign_key: fn(&mut C, &Value),
}

impl<T, C> OneToOneStep<T, C> {
    pub(crate) fn new(
        child: for<'a> fn(&'a mut T) -> Option<&'a mut C>,
        owner_key: fn(&T) -> Value,
        assign_key: fn(&mut C, &Value),
    ) -> Self {
        Self {
            child,
            owner_key,
            assign_key,
        }
    }
}

#[async_trait]
impl<T: Entity, C: Entity> RelationStep<T> for OneToOneStep<T, C> {
    async fn load(
        &self,
        owners: &mut [&mut T],
        ctx: &LoadContext<'_>,
        depth: usize,
    ) -> Result<u64> {
        let mut flat: Vec<&mut C> = Vec::new();

        for owner in owners.iter_mut() {
            let owner: &mut T = &mut **owner;
            let key = (self.owner_key)(&*owner);

            if let Some(child) = (self.child)(owner) {
                (self.assign_key)(child, &key);
                flat.push(child);
            }
        }

        if flat.is_empty() {
            return Ok(0);
        }

        load_slice::<C>(&mut flat, ctx, depth).await
    }
}
