//! Bulk export and import of the tracked task tables.
//!
//! The three core tables are dumped column by column into `trackedtask.csv`,
//! `activity.csv` and `trackedtask_activity.csv`, each with a header row. A
//! NULL becomes an empty field and an empty field is read back as NULL.
//! Import merges rows by primary key in dependency order with foreign key
//! enforcement deferred, then checks integrity before the surrounding
//! transaction commits.
//!
//! Both directions run against a connection that already has a transaction
//! open; the service supplies it from a unit of work.

use super::error::{Error, Result};
use csv::{Reader, Writer};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Text }
}

const fn integer(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Integer }
}

/// Layout of one exported table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    pub file: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static [&'static str],
}

pub const TRACKED_TASK: TableSpec = TableSpec {
    table: "trackedtask",
    file: "trackedtask.csv",
    columns: &[
        text("repository_url"),
        text("task_id"),
        text("task_project"),
        text("task_url"),
        text("task_summary"),
        integer("current_activity_id"),
    ],
    primary_key: &["repository_url", "task_id"],
};

pub const ACTIVITY: TableSpec = TableSpec {
    table: "activity",
    file: "activity.csv",
    columns: &[
        integer("id"),
        text("repository_url"),
        text("task_id"),
        text("start_time"),
        text("end_time"),
        text("label"),
        text("comment"),
    ],
    primary_key: &["id"],
};

pub const TRACKED_TASK_ACTIVITY: TableSpec = TableSpec {
    table: "trackedtask_activity",
    file: "trackedtask_activity.csv",
    columns: &[text("task_repository_url"), text("task_task_id"), integer("activities_id")],
    primary_key: &["activities_id"],
};

/// Exported tables in the order they must be merged back.
pub const TABLES: [TableSpec; 3] = [TRACKED_TASK, ACTIVITY, TRACKED_TASK_ACTIVITY];

impl TableSpec {
    fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.column_names().join(", "),
            self.table,
            self.primary_key.join(", ")
        )
    }

    fn merge_sql(&self) -> String {
        let names = self.column_names();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        let updates: Vec<String> = names
            .iter()
            .filter(|name| !self.primary_key.contains(name))
            .map(|name| format!("{name} = excluded.{name}"))
            .collect();
        let action = if updates.is_empty() {
            "NOTHING".to_string()
        } else {
            format!("UPDATE SET {}", updates.join(", "))
        };
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO {}",
            self.table,
            names.join(", "),
            placeholders.join(", "),
            self.primary_key.join(", "),
            action
        )
    }
}

pub struct Exporter<'a> {
    conn: &'a Connection,
}

impl<'a> Exporter<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Writes all three tables into `dir` and returns the number of rows.
    ///
    /// Files are written under temporary names first and renamed only once
    /// every table has been dumped, so a failed export never replaces a
    /// previous good one.
    pub fn export(&self, dir: &Path) -> Result<usize> {
        fs::create_dir_all(dir)?;
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(TABLES.len());
        let mut total = 0;
        let result = (|| -> Result<()> {
            for spec in &TABLES {
                let target = dir.join(spec.file);
                let temp = dir.join(format!("{}.tmp", spec.file));
                staged.push((temp.clone(), target));
                total += self.dump(spec, &temp)?;
            }
            Ok(())
        })();
        if let Err(e) = result {
            for (temp, _) in &staged {
                let _ = fs::remove_file(temp);
            }
            return Err(e);
        }
        for (temp, target) in &staged {
            fs::rename(temp, target)?;
        }
        Ok(total)
    }

    fn dump(&self, spec: &TableSpec, path: &Path) -> Result<usize> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record(spec.column_names())?;

        let mut stmt = self.conn.prepare(&spec.select_sql())?;
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(spec.columns.len());
            for i in 0..spec.columns.len() {
                record.push(field(spec, row.get_ref(i)?)?);
            }
            writer.write_record(&record)?;
            count += 1;
        }
        writer.flush()?;
        debug!("Exported {} rows from {}", count, spec.table);
        Ok(count)
    }
}

fn field(spec: &TableSpec, value: ValueRef<'_>) -> Result<String> {
    match value {
        ValueRef::Null => Ok(String::new()),
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Real(f) => Ok(f.to_string()),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| Error::MalformedInput {
            file: spec.table.to_string(),
            reason: e.to_string(),
        }),
        ValueRef::Blob(_) => Err(Error::MalformedInput {
            file: spec.table.to_string(),
            reason: "binary values cannot be exported".to_string(),
        }),
    }
}

pub struct Importer<'a> {
    conn: &'a Connection,
}

impl<'a> Importer<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Fails with [`Error::MissingInputFile`] unless all three files exist.
    pub fn check_inputs(dir: &Path) -> Result<()> {
        for spec in &TABLES {
            if !dir.join(spec.file).is_file() {
                return Err(Error::MissingInputFile(spec.file.to_string()));
            }
        }
        Ok(())
    }

    /// Merges the three files from `dir` and returns the number of rows read.
    ///
    /// Must run inside a transaction: foreign key enforcement is deferred to
    /// commit, which SQLite resets on its own when the transaction ends.
    pub fn import(&self, dir: &Path) -> Result<usize> {
        Self::check_inputs(dir)?;
        self.conn.pragma_update(None, "defer_foreign_keys", true)?;
        let merged = self.merge_all(dir);
        self.conn.pragma_update(None, "defer_foreign_keys", false)?;
        let total = merged?;
        self.check_integrity()?;
        Ok(total)
    }

    fn merge_all(&self, dir: &Path) -> Result<usize> {
        let mut total = 0;
        for spec in &TABLES {
            total += self.merge(spec, &dir.join(spec.file))?;
        }
        Ok(total)
    }

    fn merge(&self, spec: &TableSpec, path: &Path) -> Result<usize> {
        let mut reader = Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let expected = spec.column_names();
        if headers.iter().ne(expected.iter().copied()) {
            return Err(Error::MalformedInput {
                file: spec.file.to_string(),
                reason: format!("expected columns {}", expected.join(",")),
            });
        }

        let mut stmt = self.conn.prepare(&spec.merge_sql())?;
        let mut count = 0;
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let values = spec
                .columns
                .iter()
                .zip(record.iter())
                .map(|(column, raw)| value(spec, column, raw, line))
                .collect::<Result<Vec<Value>>>()?;
            stmt.execute(params_from_iter(values))?;
            count += 1;
        }
        debug!("Merged {} rows into {}", count, spec.table);
        Ok(count)
    }

    fn check_integrity(&self) -> Result<()> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let violation: Option<(String, i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .next()
            .transpose()?;
        match violation {
            Some((table, rowid, parent)) => Err(Error::MalformedInput {
                file: format!("{table}.csv"),
                reason: format!("row {rowid} references a missing {parent} row"),
            }),
            None => Ok(()),
        }
    }
}

fn value(spec: &TableSpec, column: &Column, raw: &str, line: u64) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    match column.kind {
        ColumnKind::Text => Ok(Value::Text(raw.to_string())),
        ColumnKind::Integer => raw.parse().map(Value::Integer).map_err(|_| Error::MalformedInput {
            file: spec.file.to_string(),
            reason: format!("line {line}: '{raw}' is not a valid {}", column.name),
        }),
    }
}
