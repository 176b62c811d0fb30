pub mod memory;

use async_trait::async_trait;

use crate::core::{Result, Value, WireType};

pub use memory::{MemoryConnection, MemoryTable};

/// The binary load stream for one table, as handed out by
/// [`CopyConnection::begin_binary_copy`].
///
/// Cell writes are strictly positional: the cells of each row must arrive in
/// the exact order of the column list in the load command. The orchestrator
/// guarantees this by deriving both from the same compiled plan.
#[async_trait]
pub trait BinaryCopyWriter: Send {
    /// Start the next row.
    async fn begin_row(&mut self) -> Result<()>;

    /// Append the next cell to the current row. An explicit wire type, when
    /// present, overrides the type inferred from the value.
    async fn write_cell(&mut self, value: Value, wire_type: Option<WireType>) -> Result<()>;

    /// Finalize the stream and return the number of rows committed.
    async fn finish(&mut self) -> Result<u64>;

    /// Release the stream and its session slot on the connection. Called on
    /// every exit path, including after errors and cancellation; rows not
    /// finalized are discarded. Safe to call more than once.
    async fn release(&mut self) -> Result<()>;
}

/// A store connection able to open binary load sessions.
///
/// Implement this over a real driver to plug `pgbulk` into a live store; the
/// in-memory [`MemoryConnection`] is the reference implementation and test
/// harness. A connection must reject overlapping load sessions.
#[async_trait]
pub trait CopyConnection: Send + Sync {
    /// Open a binary load stream for the given `COPY ... FROM STDIN BINARY;`
    /// command text.
    async fn begin_binary_copy<'a>(
        &'a self,
        command: &str,
    ) -> Result<Box<dyn BinaryCopyWriter + Send + 'a>>;
}
