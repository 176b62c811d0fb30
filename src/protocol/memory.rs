//! Reference in-memory implementation of the load protocol.
//!
//! Behaves like a miniature store: it parses the generated `COPY` command,
//! enforces the one-session-per-connection rule, type-checks cells against
//! explicit wire types, and only commits buffered rows on `finish`. Used by
//! the test suites and handy for callers who want a dry-run harness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::core::{BulkError, Result, Value, WireType};
use crate::protocol::{BinaryCopyWriter, CopyConnection};

lazy_static! {
    static ref COPY_COMMAND: Regex =
        Regex::new(r#"^COPY "([^"]+)"\(("[^"]+"(?:, "[^"]+")*)\) FROM STDIN BINARY;$"#)
            .expect("copy command pattern is valid");
}

/// Parse the exact command shape produced by the orchestrator. Anything else
/// is rejected, which keeps the command format honest in tests.
fn parse_copy_command(command: &str) -> Result<(String, Vec<String>)> {
    let captures = COPY_COMMAND.captures(command).ok_or_else(|| {
        BulkError::Protocol(format!("malformed COPY command: {}", command))
    })?;

    let table = captures[1].to_string();
    let columns = captures[2]
        .split(", ")
        .map(|c| c.trim_matches('"').to_string())
        .collect();

    Ok((table, columns))
}

/// One loaded table: its column list (from the first load) and all rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// In-memory [`CopyConnection`].
pub struct MemoryConnection {
    tables: Mutex<HashMap<String, MemoryTable>>,
    commands: Mutex<Vec<String>>,
    copy_active: AtomicBool,
    fail_after_cells: Mutex<Option<usize>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            copy_active: AtomicBool::new(false),
            fail_after_cells: Mutex::new(None),
        }
    }

    /// Snapshot of one table, if any load has targeted it.
    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    pub fn row_count(&self, name: &str) -> u64 {
        self.table(name).map_or(0, |t| t.rows.len() as u64)
    }

    /// Every COPY command this connection has seen, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Whether a load session is currently open.
    pub fn in_copy(&self) -> bool {
        self.copy_active.load(Ordering::SeqCst)
    }

    /// Fault injection: the (n+1)-th cell write across this connection fails
    /// with a protocol error. Used to verify release-on-error behavior.
    pub fn fail_after_cells(&self, n: usize) {
        *self.fail_after_cells.lock().unwrap() = Some(n);
    }

    fn consume_fault_budget(&self) -> Result<()> {
        let mut budget = self.fail_after_cells.lock().unwrap();
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                *budget = None;
                return Err(BulkError::Protocol("injected cell write failure".into()));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CopyConnection for MemoryConnection {
    async fn begin_binary_copy<'a>(
        &'a self,
        command: &str,
    ) -> Result<Box<dyn BinaryCopyWriter + Send + 'a>> {
        let (table, columns) = parse_copy_command(command)?;

        if self.copy_active.swap(true, Ordering::SeqCst) {
            return Err(BulkError::Protocol(
                "connection is already in a binary load session".into(),
            ));
        }

        self.commands.lock().unwrap().push(command.to_string());

        Ok(Box::new(MemoryCopyWriter {
            conn: self,
            table,
            columns,
            rows: Vec::new(),
            current: None,
            finished: false,
            released: false,
        }))
    }
}

struct MemoryCopyWriter<'a> {
    conn: &'a MemoryConnection,
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    current: Option<Vec<Value>>,
    finished: bool,
    released: bool,
}

impl MemoryCopyWriter<'_> {
    fn flush_current(&mut self) -> Result<()> {
        if let Some(row) = self.current.take() {
            if row.len() != self.columns.len() {
                return Err(BulkError::Protocol(format!(
                    "row has {} cells, load command lists {} columns",
                    row.len(),
                    self.columns.len()
                )));
            }
            self.rows.push(row);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished || self.released {
            return Err(BulkError::Protocol(
                "binary load session is no longer open".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BinaryCopyWriter for MemoryCopyWriter<'_> {
    async fn begin_row(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_current()?;
        self.current = Some(Vec::with_capacity(self.columns.len()));
        Ok(())
    }

    async fn write_cell(&mut self, value: Value, wire_type: Option<WireType>) -> Result<()> {
        self.ensure_open()?;
        self.conn.consume_fault_budget()?;

        let row = self.current.as_mut().ok_or_else(|| {
            BulkError::Protocol("write_cell called before begin_row".into())
        })?;

        if row.len() >= self.columns.len() {
            return Err(BulkError::Protocol(format!(
                "too many cells for table '{}': command lists {} columns",
                self.table,
                self.columns.len()
            )));
        }

        if let Some(wire) = wire_type {
            if !wire.accepts(&value) {
                return Err(BulkError::Serialization(format!(
                    "value of type {} is not compatible with wire type {}",
                    value.type_name(),
                    wire
                )));
            }
        }

        row.push(value);
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        self.ensure_open()?;
        self.flush_current()?;

        let mut tables = self.conn.tables.lock().unwrap();
        let entry = tables.entry(self.table.clone()).or_insert_with(|| MemoryTable {
            columns: self.columns.clone(),
            rows: Vec::new(),
        });

        if entry.columns != self.columns {
            return Err(BulkError::Protocol(format!(
                "table '{}' was previously loaded with a different column list",
                self.table
            )));
        }

        let count = self.rows.len() as u64;
        entry.rows.append(&mut self.rows);
        self.finished = true;
        Ok(count)
    }

    async fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            // Rows never finalized are dropped with the writer.
            self.rows.clear();
            self.current = None;
            self.conn.copy_active.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MemoryCopyWriter<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.conn.copy_active.store(false, Ordering::SeqCst);
        }
    }
}
