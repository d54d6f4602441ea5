use rusqlite::Connection;
use tracing::trace;

use super::schema_gen::generate_upsert;
use crate::error::StoreError;
use crate::parser::Row;
use crate::schema::TableSchema;

/// Rows per statement
const BATCH_SIZE: usize = 1000;
/// SQLite's default SQLITE_MAX_VARIABLE_NUMBER since 3.32
const MAX_BIND_PARAMS: usize = 32_766;
/// Rows quoted in a rejected-batch error
const SAMPLE_ROWS: usize = 3;

/// Result of one upsert call
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    /// `(natural_key, surrogate_key)` for every entity row inserted or
    /// updated; empty for non-entity tables
    pub keys: Vec<(String, i64)>,
    /// Rows inserted or updated (conflicts resolved as DO NOTHING excluded)
    pub affected: usize,
}

/// Insert `rows` into `schema`, resolving collisions on the table's conflict
/// key with its declared policy. Each statement carries as many rows as the
/// bind-parameter limit allows.
pub fn upsert(
    conn: &Connection,
    schema: &'static TableSchema,
    rows: &[Row],
) -> Result<UpsertOutcome, StoreError> {
    let mut outcome = UpsertOutcome::default();
    if rows.is_empty() {
        return Ok(outcome);
    }

    let per_statement = (MAX_BIND_PARAMS / schema.columns.len().max(1)).clamp(1, BATCH_SIZE);

    for batch in rows.chunks(per_statement) {
        write_batch(conn, schema, batch, &mut outcome).map_err(|source| {
            StoreError::BatchRejected {
                table: schema.name,
                rows: batch.len(),
                sample: sample(schema, batch),
                source,
            }
        })?;
    }

    trace!(table = schema.name, affected = outcome.affected, "upserted");
    Ok(outcome)
}

fn write_batch(
    conn: &Connection,
    schema: &'static TableSchema,
    batch: &[Row],
    outcome: &mut UpsertOutcome,
) -> rusqlite::Result<()> {
    let sql = generate_upsert(schema, batch.len());
    let mut stmt = conn.prepare_cached(&sql)?;

    let mut idx = 1;
    for row in batch {
        for value in row.values_for(schema) {
            value.bind_to(idx, &mut stmt)?;
            idx += 1;
        }
    }

    if schema.is_entity() {
        let mut returned = stmt.raw_query();
        while let Some(row) = returned.next()? {
            outcome.keys.push((row.get(0)?, row.get(1)?));
            outcome.affected += 1;
        }
    } else {
        outcome.affected += stmt.raw_execute()?;
    }

    Ok(())
}

fn sample(schema: &TableSchema, batch: &[Row]) -> Vec<String> {
    batch
        .iter()
        .take(SAMPLE_ROWS)
        .map(|row| {
            schema
                .columns
                .iter()
                .map(|col| format!("{}={}", col.name, row.get(col.name)))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{CHARACTER_PROMOTION_COSTS, ITEMS, TAGS};
    use crate::writer::Store;

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    fn item(code: &str, name: &str, rarity: i64) -> Row {
        Row::new()
            .with("item_code", code)
            .with("name", name)
            .with("rarity", rarity)
    }

    #[test]
    fn test_insert_returns_surrogate_keys() {
        let store = store();
        let outcome = upsert(
            store.connection(),
            &ITEMS,
            &[item("30011", "Orirock", 1), item("30012", "Orirock Cube", 2)],
        )
        .unwrap();

        assert_eq!(outcome.affected, 2);
        let mut codes: Vec<_> = outcome.keys.iter().map(|(c, _)| c.as_str()).collect();
        codes.sort_unstable();
        assert_eq!(codes, ["30011", "30012"]);
    }

    #[test]
    fn test_conflict_updates_display_columns_only() {
        let store = store();
        let conn = store.connection();
        let first = upsert(conn, &ITEMS, &[item("30011", "Orirock", 1)]).unwrap();
        let second = upsert(conn, &ITEMS, &[item("30011", "Orirock (new)", 4)]).unwrap();

        assert_eq!(first.keys, second.keys);
        assert_eq!(store.row_count("items").unwrap(), 1);

        let (name, rarity): (String, i64) = conn
            .query_row("SELECT name, rarity FROM items", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!(name, "Orirock (new)");
        assert_eq!(rarity, 1);
    }

    #[test]
    fn test_ignore_policy_skips_existing_rows() {
        let store = store();
        let conn = store.connection();
        upsert(conn, &TAGS, &[Row::new().with("tag_name", "DPS")]).unwrap();
        let again = upsert(conn, &TAGS, &[Row::new().with("tag_name", "DPS")]).unwrap();

        assert!(again.keys.is_empty());
        assert_eq!(again.affected, 0);
        assert_eq!(store.row_count("tags").unwrap(), 1);
    }

    #[test]
    fn test_large_batches_are_split() {
        let store = store();
        let rows: Vec<Row> = (0..2500)
            .map(|i| Row::new().with("tag_name", format!("tag-{}", i)))
            .collect();
        let outcome = upsert(store.connection(), &TAGS, &rows).unwrap();

        assert_eq!(outcome.keys.len(), 2500);
        assert_eq!(store.row_count("tags").unwrap(), 2500);
    }

    #[test]
    fn test_constraint_violation_rejects_batch_with_sample() {
        let store = store();
        let row = Row::new()
            .with("character_id", 999)
            .with("target_phase", 1)
            .with("item_id", 123)
            .with("count", 5);

        let err = upsert(store.connection(), &CHARACTER_PROMOTION_COSTS, &[row]).unwrap_err();
        match err {
            StoreError::BatchRejected {
                table, rows, sample, ..
            } => {
                assert_eq!(table, "character_promotion_costs");
                assert_eq!(rows, 1);
                assert!(sample[0].contains("character_id=999"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
