//! The per-type configuration builder.
//!
//! An [`EntityBuilder`] accumulates field mapping rules for one entity type
//! and compiles them into an [`EntityPlan`]: one specialized write step per
//! scalar column, one relation step per mapped relation. Compilation happens
//! exactly once, in [`build`](EntityBuilder::build); every later load reuses
//! the compiled steps for every row.

pub mod naming;

use std::mem;
use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::core::{BulkError, Result, Value, WireType};
use crate::entity::Entity;
use crate::plan::relation::{OneToManyStep, OneToOneStep, RelationStep};
use crate::plan::{Cell, ColumnWriter, EntityPlan, PlanCache};
use naming::NamingConvention;

type ValidatorFn<T> = Box<dyn Fn(&T, &Value) -> bool + Send + Sync>;
type FactoryFn<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

/// The accumulated policy for a single field. Exists only while configuring;
/// consumed by `build` and discarded.
struct FieldRule<T: Entity> {
    field: &'static str,
    column_name: Option<String>,
    wire_type: Option<WireType>,
    validator: Option<ValidatorFn<T>>,
    factory: Option<FactoryFn<T>>,
    relation: Option<Box<dyn RelationStep<T>>>,
}

impl<T: Entity> FieldRule<T> {
    fn new(field: &'static str) -> Self {
        Self {
            field,
            column_name: None,
            wire_type: None,
            validator: None,
            factory: None,
            relation: None,
        }
    }
}

/// Fluent configuration for one entity type.
///
/// # Examples
///
/// ```
/// use pgbulk::{Entity, EntityBuilder, FieldAccessor, PlanCache, Value};
/// use uuid::Uuid;
///
/// struct Tag {
///     id: Uuid,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn entity_name() -> &'static str {
///         "Tag"
///     }
///     fn fields() -> Vec<FieldAccessor<Self>> {
///         vec![
///             FieldAccessor::new(
///                 "id",
///                 |t: &Tag| Value::Uuid(t.id),
///                 |t: &mut Tag, v| {
///                     if let Value::Uuid(u) = v {
///                         t.id = u;
///                     }
///                 },
///             ),
///             FieldAccessor::new(
///                 "label",
///                 |t: &Tag| Value::from(t.label.as_str()),
///                 |t: &mut Tag, v| {
///                     if let Value::Text(s) = v {
///                         t.label = s;
///                     }
///                 },
///             ),
///         ]
///     }
/// }
///
/// let cache = PlanCache::new();
/// EntityBuilder::<Tag>::new()
///     .map_to_table("tags")
///     .map_uuid_generator("id")
///     .map_to_column("label", "tag_label")
///     .build(&cache)
///     .unwrap();
///
/// let plan = cache.try_get::<Tag>().unwrap().unwrap();
/// assert_eq!(plan.table(), "tags");
/// assert_eq!(plan.column_names(), vec!["id", "tag_label"]);
/// ```
pub struct EntityBuilder<T: Entity> {
    table_name: Option<String>,
    naming: Option<Arc<dyn NamingConvention>>,
    rules: Vec<FieldRule<T>>,
    ignored: Vec<&'static str>,
}

impl<T: Entity> EntityBuilder<T> {
    pub fn new() -> Self {
        Self {
            table_name: None,
            naming: None,
            rules: Vec::new(),
            ignored: Vec::new(),
        }
    }

    fn rule_mut(&mut self, field: &'static str) -> &mut FieldRule<T> {
        if let Some(idx) = self.rules.iter().position(|r| r.field == field) {
            return &mut self.rules[idx];
        }
        self.rules.push(FieldRule::new(field));
        self.rules.last_mut().unwrap()
    }

    /// Override the table name. Beats any naming convention.
    pub fn map_to_table(&mut self, table_name: impl Into<String>) -> &mut Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Rename one field's column. Beats any naming convention.
    pub fn map_to_column(&mut self, field: &'static str, column_name: impl Into<String>) -> &mut Self {
        self.rule_mut(field).column_name = Some(column_name.into());
        self
    }

    /// Serialize one field under an explicit wire type instead of the type
    /// inferred from its value.
    pub fn map_wire_type(&mut self, field: &'static str, wire_type: WireType) -> &mut Self {
        self.rule_mut(field).wire_type = Some(wire_type);
        self
    }

    /// Exclude a field (and any rules configured for it) from loading.
    pub fn map_ignore(&mut self, field: &'static str) -> &mut Self {
        if !self.ignored.contains(&field) {
            self.ignored.push(field);
        }
        self
    }

    /// Default-value injection: at row-write time, when `validator` returns
    /// false for (entity, current value), the field is overwritten with
    /// `factory`'s replacement before serialization. The assignment goes
    /// through the field setter and mutates the caller's entity in place.
    pub fn map_value_factory(
        &mut self,
        field: &'static str,
        validator: impl Fn(&T, &Value) -> bool + Send + Sync + 'static,
        factory: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        let rule = self.rule_mut(field);
        rule.validator = Some(Box::new(validator));
        rule.factory = Some(Box::new(factory));
        self
    }

    /// Identifier convenience: generate a fresh v4 UUID whenever the current
    /// value is the nil UUID or `Null`. Caller-supplied identifiers survive.
    pub fn map_uuid_generator(&mut self, field: &'static str) -> &mut Self {
        self.map_value_factory(
            field,
            |_, current| match current {
                Value::Uuid(u) => !u.is_nil(),
                Value::Null => false,
                _ => true,
            },
            |_| Value::Uuid(Uuid::new_v4()),
        )
    }

    /// Map a one-to-many relation. After the owning rows are finalized, every
    /// child gets the owner's key assigned through `assign_key`, and the
    /// flattened children are bulk-loaded recursively under `C`'s own plan.
    pub fn map_one_to_many<C: Entity>(
        &mut self,
        field: &'static str,
        children: for<'a> fn(&'a mut T) -> Option<&'a mut Vec<C>>,
        owner_key: fn(&T) -> Value,
        assign_key: fn(&mut C, &Value),
    ) -> &mut Self {
        self.rule_mut(field).relation =
            Some(Box::new(OneToManyStep::new(children, owner_key, assign_key)));
        self
    }

    /// Map a one-to-one relation. Owners with `None` contribute no row.
    pub fn map_one_to_one<C: Entity>(
        &mut self,
        field: &'static str,
        child: for<'a> fn(&'a mut T) -> Option<&'a mut C>,
        owner_key: fn(&T) -> Value,
        assign_key: fn(&mut C, &Value),
    ) -> &mut Self {
        self.rule_mut(field).relation =
            Some(Box::new(OneToOneStep::new(child, owner_key, assign_key)));
        self
    }

    /// Install a naming convention, consulted for any table or column without
    /// an explicit mapping.
    pub fn with_naming(&mut self, naming: Arc<dyn NamingConvention>) -> &mut Self {
        self.naming = Some(naming);
        self
    }

    /// Compile the accumulated rules into an [`EntityPlan`] and register it.
    ///
    /// A plan already registered for `T` makes this a silent no-op (first
    /// build wins), which keeps repeated discovery idempotent. Everything
    /// else that can go wrong (a rule naming a field `T` does not declare, a
    /// value factory on a read-only field, zero eligible fields) is a
    /// configuration error, and nothing is registered.
    pub fn build(&mut self, cache: &PlanCache) -> Result<()> {
        let plan = self.compile()?;
        cache.try_add(plan)?;
        Ok(())
    }

    /// Compile without registering. Useful with
    /// [`PlanCache::get_or_add`](crate::PlanCache::get_or_add).
    pub fn compile(&mut self) -> Result<EntityPlan<T>> {
        let fields = T::fields();
        let mut rules = mem::take(&mut self.rules);
        let ignored = mem::take(&mut self.ignored);
        let naming = self.naming.take();

        for rule in &rules {
            let accessor = fields.iter().find(|f| f.name == rule.field);
            match accessor {
                None if rule.relation.is_none() => {
                    return Err(BulkError::Configuration(format!(
                        "'{}' does not name a field of entity '{}'",
                        rule.field,
                        T::entity_name()
                    )));
                }
                Some(accessor) if rule.factory.is_some() && !accessor.is_writable() => {
                    return Err(BulkError::Configuration(format!(
                        "value factory for '{}.{}' targets a read-only field",
                        T::entity_name(),
                        rule.field
                    )));
                }
                _ => {}
            }
        }

        let mut columns: Vec<ColumnWriter<T>> = Vec::new();
        let mut relations: Vec<Box<dyn RelationStep<T>>> = Vec::new();

        for accessor in fields {
            if ignored.contains(&accessor.name) {
                continue;
            }

            let rule_idx = rules.iter().position(|r| r.field == accessor.name);

            if let Some(idx) = rule_idx {
                // A relation rule excludes the field from scalar output; the
                // step itself is collected with the others below.
                if rules[idx].relation.is_some() {
                    continue;
                }
            }

            let Some(set) = accessor.set else {
                continue;
            };

            let (rename, wire_type, validator, factory) = match rule_idx {
                Some(idx) => {
                    let rule = &mut rules[idx];
                    (
                        rule.column_name.take(),
                        rule.wire_type.take(),
                        rule.validator.take(),
                        rule.factory.take(),
                    )
                }
                None => (None, None, None, None),
            };

            let column_name = rename
                .or_else(|| {
                    naming
                        .as_ref()
                        .and_then(|n| n.column_name(T::entity_name(), accessor.name))
                })
                .unwrap_or_else(|| accessor.name.to_string());

            let get = accessor.get;
            let step: Box<dyn Fn(&mut T) -> Result<Cell> + Send + Sync> =
                Box::new(move |entity: &mut T| {
                    if let (Some(validator), Some(factory)) = (validator.as_ref(), factory.as_ref())
                    {
                        let current = get(entity);
                        if !validator(entity, &current) {
                            let replacement = factory(entity);
                            set(entity, replacement);
                        }
                    }
                    Ok(Cell {
                        value: get(entity),
                        wire_type,
                    })
                });

            columns.push(ColumnWriter::new(column_name, step));
        }

        // Every relation step, in rule declaration order, whether or not the
        // entity lists the navigation field.
        for rule in rules.iter_mut() {
            if ignored.contains(&rule.field) {
                continue;
            }
            if let Some(step) = rule.relation.take() {
                relations.push(step);
            }
        }

        if columns.is_empty() {
            return Err(BulkError::Configuration(format!(
                "entity '{}' has no eligible fields to serialize",
                T::entity_name()
            )));
        }

        let table = self
            .table_name
            .take()
            .or_else(|| naming.as_ref().and_then(|n| n.table_name(T::entity_name())))
            .unwrap_or_else(|| format!("{}s", T::entity_name()));

        debug!(
            "compiled plan for '{}': table \"{}\", {} column(s), {} relation(s)",
            T::entity_name(),
            table,
            columns.len(),
            relations.len()
        );

        Ok(EntityPlan::new(table, columns, relations))
    }
}

impl<T: Entity> Default for EntityBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
