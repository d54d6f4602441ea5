//! Read-only integrity checks run after the load.
//!
//! Every check is derived from the table declarations: orphans from foreign
//! keys, ranges from column bounds, duplicates from natural keys, empty
//! documents from `non_empty` JSON columns. Nothing here corrects data or
//! creates tables; a declared table absent from the store is a failure.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::schema::{TableSchema, ALL_TABLES};
use crate::writer::row_count;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Orphans,
    OutOfRange,
    DuplicateKeys,
    EmptyJson,
    MissingTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub kind: CheckKind,
    pub table: &'static str,
    pub column: &'static str,
    /// What the column was checked against
    pub against: String,
    pub violations: u64,
}

impl Check {
    pub fn passed(&self) -> bool {
        self.violations == 0
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
    pub row_counts: BTreeMap<&'static str, u64>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(Check::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn find(&self, kind: CheckKind, table: &str, column: &str) -> Option<&Check> {
        self.checks
            .iter()
            .find(|c| c.kind == kind && c.table == table && c.column == column)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validation: {} checks, {} failed",
            self.checks.len(),
            self.failures().count()
        )?;
        for check in self.failures() {
            writeln!(
                f,
                "  {:?} {}.{} ({}): {} rows",
                check.kind, check.table, check.column, check.against, check.violations
            )?;
        }

        writeln!(f, "Row counts:")?;
        for (table, count) in &self.row_counts {
            writeln!(f, "  {:<28} {:>8}", table, count)?;
        }
        Ok(())
    }
}

pub fn validate(conn: &Connection) -> Result<ValidationReport, StoreError> {
    let mut report = ValidationReport::default();
    let present = existing_tables(conn)?;

    for schema in ALL_TABLES.iter().copied() {
        if !present.contains(schema.name) {
            report.checks.push(Check {
                kind: CheckKind::MissingTable,
                table: schema.name,
                column: "*",
                against: "declared schema".to_string(),
                violations: 1,
            });
            continue;
        }
        report.row_counts.insert(schema.name, row_count(conn, schema.name)?);
        check_orphans(conn, schema, &present, &mut report.checks)?;
        check_bounds(conn, schema, &mut report.checks)?;
        check_empty_json(conn, schema, &mut report.checks)?;
        check_duplicates(conn, schema, &mut report.checks)?;
    }

    for check in report.failures() {
        warn!(
            kind = ?check.kind,
            table = check.table,
            column = check.column,
            violations = check.violations,
            "validation check failed"
        );
    }
    info!(
        checks = report.checks.len(),
        passed = report.passed(),
        "validation finished"
    );

    Ok(report)
}

fn count(conn: &Connection, sql: &str) -> Result<u64, StoreError> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

fn existing_tables(conn: &Connection) -> Result<HashSet<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names: HashSet<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<_, _>>()?;
    Ok(names)
}

fn check_orphans(
    conn: &Connection,
    schema: &'static TableSchema,
    present: &HashSet<String>,
    checks: &mut Vec<Check>,
) -> Result<(), StoreError> {
    // A missing parent is already reported on its own
    for fk in schema
        .foreign_keys
        .iter()
        .filter(|fk| present.contains(fk.references_table))
    {
        let sql = format!(
            "SELECT COUNT(*) FROM {child} c WHERE c.{col} IS NOT NULL \
             AND NOT EXISTS (SELECT 1 FROM {parent} p WHERE p.{pcol} = c.{col})",
            child = schema.name,
            col = fk.column,
            parent = fk.references_table,
            pcol = fk.references_column,
        );
        checks.push(Check {
            kind: CheckKind::Orphans,
            table: schema.name,
            column: fk.column,
            against: format!("{}.{}", fk.references_table, fk.references_column),
            violations: count(conn, &sql)?,
        });
    }
    Ok(())
}

fn check_bounds(
    conn: &Connection,
    schema: &'static TableSchema,
    checks: &mut Vec<Check>,
) -> Result<(), StoreError> {
    for col in schema.columns {
        let Some(bounds) = col.bounds else {
            continue;
        };
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {col} IS NOT NULL AND ({col} < {} OR {col} > {})",
            schema.name,
            bounds.min,
            bounds.max,
            col = col.name,
        );
        checks.push(Check {
            kind: CheckKind::OutOfRange,
            table: schema.name,
            column: col.name,
            against: format!("[{}, {}]", bounds.min, bounds.max),
            violations: count(conn, &sql)?,
        });
    }
    Ok(())
}

fn check_empty_json(
    conn: &Connection,
    schema: &'static TableSchema,
    checks: &mut Vec<Check>,
) -> Result<(), StoreError> {
    for col in schema.columns.iter().filter(|c| c.non_empty) {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {col} IS NULL OR TRIM({col}) IN ('', '[]', '{{}}')",
            schema.name,
            col = col.name,
        );
        checks.push(Check {
            kind: CheckKind::EmptyJson,
            table: schema.name,
            column: col.name,
            against: "non-empty".to_string(),
            violations: count(conn, &sql)?,
        });
    }
    Ok(())
}

fn check_duplicates(
    conn: &Connection,
    schema: &'static TableSchema,
    checks: &mut Vec<Check>,
) -> Result<(), StoreError> {
    let Some(natural) = schema.natural_key else {
        return Ok(());
    };
    let sql = format!(
        "SELECT COUNT(*) FROM (SELECT {key} FROM {table} GROUP BY {key} HAVING COUNT(*) > 1)",
        key = natural,
        table = schema.name,
    );
    checks.push(Check {
        kind: CheckKind::DuplicateKeys,
        table: schema.name,
        column: natural,
        against: "unique".to_string(),
        violations: count(conn, &sql)?,
    });
    Ok(())
}
