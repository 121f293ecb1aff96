use anyhow::{Context, Result};
use duckdb::Connection;
use std::path::Path;
use tracing::debug;

/// Escape a value for use inside a single-quoted SQL string literal.
///
/// Only doubles quotes; paths are otherwise interpolated verbatim, so callers
/// must not pass untrusted paths.
pub fn quote_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// Thin wrapper around an in-memory DuckDB connection used to run whole
/// scan/filter/write statements over Parquet files.
pub struct Engine {
    conn: Connection,
}

impl Engine {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory DuckDB")?;
        Ok(Self { conn })
    }

    /// Run one statement to completion.
    pub fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql, "executing");
        self.conn
            .execute_batch(sql)
            .context("DuckDB statement failed")
    }

    /// Number of rows in a Parquet file.
    pub fn count_rows(&self, parquet: &Path) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM read_parquet('{}')",
            quote_literal(&parquet.to_string_lossy())
        );
        let n: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("counting rows of {}", parquet.display()))?;
        Ok(n as u64)
    }

    /// Row count per `source_file` value, ordered by source file.
    pub fn count_by_source(&self, parquet: &Path) -> Result<Vec<(String, u64)>> {
        let sql = format!(
            "SELECT source_file, COUNT(*) FROM read_parquet('{}') \
             GROUP BY source_file ORDER BY source_file",
            quote_literal(&parquet.to_string_lossy())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let n: i64 = row.get(1)?;
            Ok((name, n as u64))
        })?;
        rows.collect::<duckdb::Result<Vec<_>>>()
            .with_context(|| format!("grouping rows of {}", parquet.display()))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
