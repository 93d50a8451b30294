//! Durable ledger of issued `(code, serial)` pairs on SQLite.
//!
//! Every batch insert runs inside a [`rusqlite::Transaction`], which rolls back
//! when dropped uncommitted. Any early return or `?` inside
//! [`SerialLedger::insert_batch`] therefore leaves the ledger exactly as it was.
//!
//! The ledger assumes a single writer process.

use std::path::Path;

use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    error::{Result, ToolError},
    io_utils,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS processed_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL,
    serial INTEGER NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (code, serial)
);
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialAssignment {
    pub code: String,
    pub serial: i64,
}

impl SerialAssignment {
    pub fn new(code: impl Into<String>, serial: i64) -> Self {
        Self {
            code: code.into(),
            serial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub id: i64,
    pub code: String,
    pub serial: i64,
    pub created_at: String,
}

#[derive(Debug)]
pub struct SerialLedger {
    conn: Connection,
}

impl SerialLedger {
    /// Opens (creating if needed) the ledger file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        io_utils::ensure_parent_dir(path).map_err(|err| ToolError::write(path, err))?;
        let conn = Connection::open(path)?;
        debug!("Opened serial ledger {:?}", path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Highest serial ever issued for `code`.
    pub fn max_serial(&self, code: &str) -> Result<Option<i64>> {
        max_serial(&self.conn, code)
    }

    pub fn contains(&self, code: &str, serial: i64) -> Result<bool> {
        contains(&self.conn, code, serial)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM processed_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Assigns one serial per code and records all of them atomically.
    ///
    /// With `begin_serial`, the code at position `i` receives `begin_serial + i`
    /// and every pair is checked before anything is written; a taken pair fails
    /// the whole batch with [`ToolError::Conflict`]. Without it, each code gets
    /// its current maximum plus one (starting at 1), so a code repeated within
    /// the batch receives consecutive serials.
    pub fn insert_batch(
        &mut self,
        codes: &[String],
        begin_serial: Option<i64>,
    ) -> Result<Vec<SerialAssignment>> {
        let tx = self.conn.transaction()?;

        if let Some(begin) = begin_serial {
            for (offset, code) in codes.iter().enumerate() {
                let serial = positional_serial(begin, offset)?;
                if contains(&tx, code, serial)? {
                    let max_serial = max_serial(&tx, code)?.unwrap_or(serial);
                    warn!(
                        "Serial {serial} for code '{code}' is taken (max {max_serial}); batch of {} rolled back",
                        codes.len()
                    );
                    return Err(ToolError::Conflict {
                        code: code.clone(),
                        serial,
                        max_serial,
                    });
                }
            }
        }

        let mut assignments = Vec::with_capacity(codes.len());
        {
            let mut insert =
                tx.prepare_cached("INSERT INTO processed_records (code, serial) VALUES (?1, ?2)")?;
            for (offset, code) in codes.iter().enumerate() {
                let serial = match begin_serial {
                    Some(begin) => positional_serial(begin, offset)?,
                    None => max_serial(&tx, code)?.map_or(1, |max| max + 1),
                };
                insert.execute(params![code, serial])?;
                assignments.push(SerialAssignment::new(code.clone(), serial));
            }
        }
        tx.commit()?;

        info!("Committed {} serial assignment(s)", assignments.len());
        Ok(assignments)
    }

    /// Most recent records first, optionally restricted to one code.
    pub fn records(&self, code: Option<&str>, limit: usize) -> Result<Vec<LedgerRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, code, serial, COALESCE(created_at, '') FROM processed_records
             WHERE (?1 IS NULL OR code = ?1)
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![code, limit], |row| {
            Ok(LedgerRecord {
                id: row.get(0)?,
                code: row.get(1)?,
                serial: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

/// Serial of the code at `offset` in a batch starting at `begin`.
fn positional_serial(begin: i64, offset: usize) -> Result<i64> {
    i64::try_from(offset)
        .ok()
        .and_then(|offset| begin.checked_add(offset))
        .ok_or_else(|| {
            ToolError::config(format!(
                "begin serial {begin} overflows at batch position {offset}"
            ))
        })
}

fn max_serial(conn: &Connection, code: &str) -> Result<Option<i64>> {
    let max = conn.query_row(
        "SELECT MAX(serial) FROM processed_records WHERE code = ?1",
        params![code],
        |row| row.get::<_, Option<i64>>(0),
    )?;
    Ok(max)
}

fn contains(conn: &Connection, code: &str, serial: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM processed_records WHERE code = ?1 AND serial = ?2",
            params![code, serial],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}
