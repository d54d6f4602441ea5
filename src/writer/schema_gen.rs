use crate::schema::{OnConflict, TableSchema};

/// Generate CREATE TABLE SQL for a table schema
pub fn generate_create_table(schema: &TableSchema) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", schema.name);
    let mut columns = Vec::new();

    if let Some(pk) = schema.primary_key {
        columns.push(format!("    {} INTEGER PRIMARY KEY AUTOINCREMENT", pk));
    }

    for col in schema.columns {
        let null_constraint = if !col.nullable { " NOT NULL" } else { "" };
        columns.push(format!(
            "    {} {}{}",
            col.name,
            col.col_type.sql_type(),
            null_constraint
        ));
    }

    // The conflict key doubles as the table's uniqueness constraint
    if !schema.conflict_key.is_empty() {
        columns.push(format!("    UNIQUE ({})", schema.conflict_key.join(", ")));
    }

    // Add foreign key constraints
    for fk in schema.foreign_keys {
        columns.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({})",
            fk.column, fk.references_table, fk.references_column
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate CREATE INDEX statements for foreign key columns
pub fn generate_indexes(schema: &TableSchema) -> Vec<String> {
    schema
        .foreign_keys
        .iter()
        .map(|fk| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
                schema.name, fk.column, schema.name, fk.column
            )
        })
        .collect()
}

/// Generate a multi-row upsert for `row_count` rows.
///
/// Entity tables return `(natural_key, surrogate_key)` for every row the
/// statement inserted or updated.
pub fn generate_upsert(schema: &TableSchema, row_count: usize) -> String {
    let columns = schema.column_names();
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![tuple.as_str(); row_count].join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        schema.name,
        columns.join(", "),
        values
    );

    if !schema.conflict_key.is_empty() {
        sql.push_str(&format!(" ON CONFLICT ({})", schema.conflict_key.join(", ")));
        match schema.on_conflict {
            OnConflict::Update(cols) if !cols.is_empty() => {
                let assignments: Vec<String> = cols
                    .iter()
                    .map(|c| format!("{} = excluded.{}", c, c))
                    .collect();
                sql.push_str(&format!(" DO UPDATE SET {}", assignments.join(", ")));
            }
            _ => sql.push_str(" DO NOTHING"),
        }
    }

    if let (Some(pk), Some(natural)) = (schema.primary_key, schema.natural_key) {
        sql.push_str(&format!(" RETURNING {}, {}", natural, pk));
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{CHARACTERS, CHARACTER_PROMOTION_COSTS, ITEMS, RANGES};

    #[test]
    fn test_generate_create_table() {
        let sql = generate_create_table(&CHARACTERS);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS characters"));
        assert!(sql.contains("character_id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("character_code TEXT NOT NULL"));
        assert!(sql.contains("UNIQUE (character_code)"));
        assert!(sql.contains("FOREIGN KEY (profession_id) REFERENCES professions(profession_id)"));
    }

    #[test]
    fn test_generate_indexes() {
        let indexes = generate_indexes(&CHARACTER_PROMOTION_COSTS);
        assert!(indexes
            .iter()
            .any(|i| i.contains("idx_character_promotion_costs_item_id")));
        assert_eq!(indexes.len(), 2);
    }

    #[test]
    fn test_upsert_updates_only_display_columns() {
        let sql = generate_upsert(&ITEMS, 2);
        assert!(sql.starts_with("INSERT INTO items (item_code, name, rarity"));
        assert_eq!(sql.matches("(?, ?, ?, ?, ?, ?, ?, ?, ?)").count(), 2);
        assert!(sql.contains(
            "ON CONFLICT (item_code) DO UPDATE SET name = excluded.name, description = excluded.description"
        ));
        assert!(sql.ends_with("RETURNING item_code, item_id"));
        assert!(!sql.contains("item_code = excluded"));
    }

    #[test]
    fn test_upsert_ignore_variants() {
        let sql = generate_upsert(&RANGES, 1);
        assert!(sql.contains("ON CONFLICT (range_code) DO NOTHING RETURNING range_code, range_id"));

        let sql = generate_upsert(&CHARACTER_PROMOTION_COSTS, 1);
        assert!(sql.ends_with("ON CONFLICT (character_id, target_phase, item_id) DO NOTHING"));
    }
}
