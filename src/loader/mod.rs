//! The load orchestrator.
//!
//! Resolves the compiled plan for the element type, composes the load
//! command, streams every row through the binary protocol in the plan's
//! fixed column order, then walks the plan's relation steps, each of which
//! recursively re-enters the same loop for its flattened, foreign-key
//! populated target sequence.

use std::sync::Arc;

use lazy_static::lazy_static;
use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use crate::config::{Configurator, EntityConfiguration};
use crate::core::{BulkError, Result};
use crate::entity::Entity;
use crate::plan::{EntityPlan, PlanCache};
use crate::protocol::{BinaryCopyWriter, CopyConnection};

/// Default cap on relation recursion. Cyclic relation graphs have no
/// terminating condition, so the orchestrator refuses to go deeper than this
/// instead of recursing unboundedly.
pub const DEFAULT_MAX_DEPTH: usize = 32;

lazy_static! {
    static ref GLOBAL_LOADER: BulkLoader = BulkLoader::new();
}

/// Everything a (possibly recursive) load needs, threaded through relation
/// steps.
pub(crate) struct LoadContext<'a> {
    pub conn: &'a dyn CopyConnection,
    pub cache: &'a PlanCache,
    pub token: &'a CancellationToken,
    pub max_depth: usize,
}

/// The bulk-load entry point: a plan cache, a configurator, and a relation
/// depth limit.
///
/// Most applications use the process-wide instance through the free functions
/// [`bulk_insert`] and [`register_configuration`]; constructing a dedicated
/// loader with its own cache is useful for tests and for libraries that do
/// not want to share global state.
pub struct BulkLoader {
    cache: Arc<PlanCache>,
    configurator: Arc<Configurator>,
    max_depth: usize,
}

impl BulkLoader {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(PlanCache::new()),
            configurator: Arc::new(Configurator::new()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_cache(cache: Arc<PlanCache>) -> Self {
        Self {
            cache,
            configurator: Arc::new(Configurator::new()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Cap relation recursion at `depth` instead of [`DEFAULT_MAX_DEPTH`].
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn cache(&self) -> &PlanCache {
        &self.cache
    }

    pub fn configurator(&self) -> &Configurator {
        &self.configurator
    }

    /// Bulk insert `entities` and, recursively, their mapped relations.
    ///
    /// Returns the total number of rows written across the top-level load and
    /// every relation load. Entities are mutated in place where default-value
    /// injection applies, so generated identifiers are visible afterwards.
    ///
    /// The connection must be open and not already in a load session. If no
    /// plan exists for `T`, discovery runs once; a type still unknown after
    /// that is a configuration error. Any failure or cancellation releases
    /// the binary writer before propagating. Each relation runs as its own
    /// load command, so a failed call may still have committed earlier loads;
    /// retry policy is the caller's.
    pub async fn bulk_insert<T: Entity>(
        &self,
        conn: &dyn CopyConnection,
        entities: &mut [T],
        token: &CancellationToken,
    ) -> Result<u64> {
        if !self.configurator.is_built() {
            self.configurator.build_all(&self.cache)?;
        }

        if self.cache.try_get::<T>()?.is_none() {
            return Err(BulkError::MissingPlan(T::entity_name()));
        }

        let mut rows: Vec<&mut T> = entities.iter_mut().collect();
        let ctx = LoadContext {
            conn,
            cache: &self.cache,
            token,
            max_depth: self.max_depth,
        };

        load_slice::<T>(&mut rows, &ctx, 0).await
    }
}

impl Default for BulkLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide loader behind [`bulk_insert`] and
/// [`register_configuration`]. Its plan cache lives for the process lifetime.
pub fn loader() -> &'static BulkLoader {
    &GLOBAL_LOADER
}

/// Bulk insert through the process-wide loader.
pub async fn bulk_insert<T: Entity>(
    conn: &dyn CopyConnection,
    entities: &mut [T],
    token: &CancellationToken,
) -> Result<u64> {
    GLOBAL_LOADER.bulk_insert(conn, entities, token).await
}

/// Register an entity configuration with the process-wide loader.
pub fn register_configuration<T, C>()
where
    T: Entity,
    C: EntityConfiguration<T> + Default + 'static,
{
    GLOBAL_LOADER.configurator().register::<T, C>();
}

/// One (possibly recursive) load: resolve the plan, stream the rows, release
/// the writer on every exit path, then run the relation steps in declared
/// order.
pub(crate) async fn load_slice<T: Entity>(
    rows: &mut [&mut T],
    ctx: &LoadContext<'_>,
    depth: usize,
) -> Result<u64> {
    if depth > ctx.max_depth {
        return Err(BulkError::RelationDepthExceeded(ctx.max_depth));
    }

    let plan = ctx
        .cache
        .try_get::<T>()?
        .ok_or(BulkError::MissingPlan(T::entity_name()))?;

    let command = copy_statement(&plan);
    debug!(
        "bulk loading {} row(s) into \"{}\" (depth {})",
        rows.len(),
        plan.table(),
        depth
    );

    let mut writer = ctx.conn.begin_binary_copy(&command).await?;
    let driven = drive_rows(writer.as_mut(), &plan, rows, ctx.token).await;
    let released = writer.release().await;
    drop(writer);

    // A row-loop failure takes precedence over a release failure.
    let mut total = driven?;
    released?;

    for step in plan.relations() {
        total += step.load(rows, ctx, depth + 1).await?;
    }

    Ok(total)
}

/// Stream every row, then finalize for the primary row count. The caller
/// releases the writer whether or not this succeeds.
async fn drive_rows<'w, T: Entity>(
    writer: &mut (dyn BinaryCopyWriter + Send + 'w),
    plan: &EntityPlan<T>,
    rows: &mut [&mut T],
    token: &CancellationToken,
) -> Result<u64> {
    for row in rows.iter_mut() {
        if token.is_cancelled() {
            return Err(BulkError::Cancelled);
        }

        writer.begin_row().await?;

        // The iteration order here and the column list in the load command
        // both come from the same plan; the binary protocol is strictly
        // positional, so they must never diverge.
        for column in plan.columns() {
            let cell = column.write(&mut **row)?;
            writer.write_cell(cell.value, cell.wire_type).await?;
        }
    }

    let count = writer.finish().await?;
    trace!("finalized \"{}\": {} row(s)", plan.table(), count);
    Ok(count)
}

/// `COPY "<table>"("<col1>", "<col2>", ...) FROM STDIN BINARY;`
fn copy_statement<T: Entity>(plan: &EntityPlan<T>) -> String {
    let mut sql = String::with_capacity(48 + plan.table().len());

    sql.push_str("COPY \"");
    sql.push_str(plan.table());
    sql.push_str("\"(");

    for (i, column) in plan.columns().iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('"');
        sql.push_str(column.name());
        sql.push('"');
    }

    sql.push_str(") FROM STDIN BINARY;");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EntityBuilder;
    use crate::core::Value;
    use crate::entity::FieldAccessor;

    struct Widget {
        id: i64,
        label: String,
    }

    impl Entity for Widget {
        fn entity_name() -> &'static str {
            "Widget"
        }

        fn fields() -> Vec<FieldAccessor<Self>> {
            vec![
                FieldAccessor::new(
                    "id",
                    |w: &Widget| Value::Integer(w.id),
                    |w: &mut Widget, v| {
                        if let Value::Integer(i) = v {
                            w.id = i;
                        }
                    },
                ),
                FieldAccessor::new(
                    "label",
                    |w: &Widget| Value::from(w.label.as_str()),
                    |w: &mut Widget, v| {
                        if let Value::Text(s) = v {
                            w.label = s;
                        }
                    },
                ),
            ]
        }
    }

    #[test]
    fn copy_statement_is_format_exact() {
        let cache = PlanCache::new();
        EntityBuilder::<Widget>::new()
            .map_to_column("label", "display_label")
            .build(&cache)
            .unwrap();

        let plan = cache.try_get::<Widget>().unwrap().unwrap();
        assert_eq!(
            copy_statement(&plan),
            r#"COPY "Widgets"("id", "display_label") FROM STDIN BINARY;"#
        );
    }

    #[test]
    fn command_columns_match_plan_columns() {
        let cache = PlanCache::new();
        EntityBuilder::<Widget>::new().build(&cache).unwrap();

        let plan = cache.try_get::<Widget>().unwrap().unwrap();
        let command = copy_statement(&plan);
        let inner = command
            .strip_prefix(r#"COPY "Widgets"("#)
            .and_then(|s| s.strip_suffix(") FROM STDIN BINARY;"))
            .unwrap();
        let command_columns: Vec<&str> =
            inner.split(", ").map(|c| c.trim_matches('"')).collect();

        assert_eq!(command_columns, plan.column_names());
    }
}
