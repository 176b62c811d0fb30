pub mod cache;
pub(crate) mod relation;

pub use cache::PlanCache;

use crate::core::{Result, Value, WireType};
use crate::entity::Entity;
use relation::RelationStep;

/// One serialized cell: the value plus the wire type it must be written under,
/// if the mapping configured one explicitly.
pub struct Cell {
    pub value: Value,
    pub wire_type: Option<WireType>,
}

/// A compiled per-column write step. Created once by
/// [`EntityBuilder::build`](crate::EntityBuilder::build) and reused for every
/// row of every subsequent load.
pub struct ColumnWriter<T> {
    name: String,
    step: Box<dyn Fn(&mut T) -> Result<Cell> + Send + Sync>,
}

impl<T> ColumnWriter<T> {
    pub(crate) fn new(
        name: String,
        step: Box<dyn Fn(&mut T) -> Result<Cell> + Send + Sync>,
    ) -> Self {
        Self { name, step }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run default-value injection (if configured) and produce the cell.
    /// Takes the entity mutably: generated identifiers are written back in
    /// place, so the caller observes them after the load.
    pub(crate) fn write(&self, entity: &mut T) -> Result<Cell> {
        (self.step)(entity)
    }
}

/// The immutable, compiled mapping for one entity type: table name, scalar
/// column writers in serialization order, relation steps in declaration order.
///
/// Built exactly once per concrete type; the [`PlanCache`] keeps the first
/// registered plan for the process lifetime.
pub struct EntityPlan<T: Entity> {
    table: String,
    columns: Vec<ColumnWriter<T>>,
    relations: Vec<Box<dyn RelationStep<T>>>,
}

impl<T: Entity> EntityPlan<T> {
    pub(crate) fn new(
        table: String,
        columns: Vec<ColumnWriter<T>>,
        relations: Vec<Box<dyn RelationStep<T>>>,
    ) -> Self {
        Self {
            table,
            columns,
            relations,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnWriter<T>] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub(crate) fn relations(&self) -> &[Box<dyn RelationStep<T>>] {
        &self.relations
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}
