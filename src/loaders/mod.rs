//! Entity loaders, one per entity family.
//!
//! Each loader runs as one pipeline stage inside one transaction. Loaders turn
//! source records into [`Row`]s through a [`BatchBuilder`], which collects the
//! records that could not be turned into rows instead of failing the batch.

pub mod base;
pub mod character;
pub mod module;
pub mod skill;
pub mod skin;
pub mod stage;
pub mod taxonomy;

use rusqlite::Connection;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, trace, warn};

use crate::error::{RecordError, StoreError};
use crate::parser::record::{int_or, text};
use crate::parser::Row;
use crate::registry::{EntityKind, Registry};
use crate::report::StageReport;
use crate::schema::tables::*;
use crate::schema::TableSchema;
use crate::source::SourceDoc;
use crate::writer::{upsert, UpsertOutcome};

/// Keyed source records of one document
pub type Records = Map<String, Value>;

/// The closed set of loaders, in the order the pipeline runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Loader {
    Ranges,
    Items,
    Zones,
    Taxonomy,
    Characters,
    Skills,
    SkillCosts,
    Skins,
    Modules,
    Stages,
}

impl Loader {
    pub const ALL: [Loader; 10] = [
        Loader::Ranges,
        Loader::Items,
        Loader::Zones,
        Loader::Taxonomy,
        Loader::Characters,
        Loader::Skills,
        Loader::SkillCosts,
        Loader::Skins,
        Loader::Modules,
        Loader::Stages,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Loader::Ranges => "ranges",
            Loader::Items => "items",
            Loader::Zones => "zones",
            Loader::Taxonomy => "taxonomy",
            Loader::Characters => "characters",
            Loader::Skills => "skills",
            Loader::SkillCosts => "skill-costs",
            Loader::Skins => "skins",
            Loader::Modules => "modules",
            Loader::Stages => "stages",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.name() == name)
    }

    /// Dependency wave; a loader only reads entities written in earlier waves
    pub fn wave(self) -> u8 {
        match self {
            Loader::Ranges | Loader::Items | Loader::Zones => 1,
            Loader::Taxonomy => 2,
            Loader::Characters => 3,
            Loader::Skills | Loader::SkillCosts | Loader::Skins => 4,
            Loader::Modules => 5,
            Loader::Stages => 6,
        }
    }

    pub fn source(self) -> SourceDoc {
        match self {
            Loader::Ranges => SourceDoc::RangeTable,
            Loader::Items => SourceDoc::ItemTable,
            Loader::Zones => SourceDoc::ZoneTable,
            Loader::Taxonomy | Loader::Characters | Loader::SkillCosts => {
                SourceDoc::CharacterTable
            }
            Loader::Skills => SourceDoc::SkillTable,
            Loader::Skins => SourceDoc::SkinTable,
            Loader::Modules => SourceDoc::UniequipTable,
            Loader::Stages => SourceDoc::StageTable,
        }
    }

    /// Tables the loader writes
    pub fn tables(self) -> &'static [&'static TableSchema] {
        match self {
            Loader::Ranges => RANGE_TABLES,
            Loader::Items => ITEM_TABLES,
            Loader::Zones => ZONE_TABLES,
            Loader::Taxonomy => TAXONOMY_TABLES,
            Loader::Characters => CHARACTER_TABLES,
            Loader::Skills => SKILL_TABLES,
            Loader::SkillCosts => SKILL_COST_TABLES,
            Loader::Skins => SKIN_TABLES,
            Loader::Modules => MODULE_TABLES,
            Loader::Stages => STAGE_TABLES,
        }
    }

    /// Turn `records` into rows and write them through `ctx`
    pub fn load(self, records: &Records, ctx: &mut StageContext<'_>) -> Result<(), StoreError> {
        match self {
            Loader::Ranges => ctx.write(base::build_ranges(records)).map(drop),
            Loader::Items => ctx.write(base::build_items(records)).map(drop),
            Loader::Zones => ctx.write(base::build_zones(records)).map(drop),
            Loader::Taxonomy => taxonomy::load(records, ctx),
            Loader::Characters => character::load(records, ctx),
            Loader::Skills => skill::load(records, ctx),
            Loader::SkillCosts => skill::load_costs(records, ctx),
            Loader::Skins => skin::load(records, ctx),
            Loader::Modules => module::load(records, ctx),
            Loader::Stages => {
                let batch = stage::build_stages(records, ctx.registry);
                ctx.write(batch).map(drop)
            }
        }
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rows for one table plus the records that were skipped on the way.
///
/// Rows repeating a conflict key already in the batch are dropped; the store
/// would resolve them to the first one anyway.
#[derive(Debug)]
pub struct BatchBuilder {
    table: &'static TableSchema,
    rows: Vec<Row>,
    seen: HashSet<String>,
    skipped: Vec<(String, RecordError)>,
}

impl BatchBuilder {
    pub fn new(table: &'static TableSchema) -> Self {
        Self {
            table,
            rows: Vec::new(),
            seen: HashSet::new(),
            skipped: Vec::new(),
        }
    }

    pub fn table(&self) -> &'static TableSchema {
        self.table
    }

    pub fn push(&mut self, row: Row) {
        if self.seen.insert(row.key_for(self.table)) {
            self.rows.push(row);
        } else {
            trace!(table = self.table.name, key = %row.key_for(self.table), "duplicate row in batch");
        }
    }

    /// Push the row or record why there is none
    pub fn add(&mut self, key: &str, result: Result<Row, RecordError>) {
        match result {
            Ok(row) => self.push(row),
            Err(e) => self.skip(key, e),
        }
    }

    pub fn skip(&mut self, key: impl Into<String>, error: RecordError) {
        let key = key.into();
        if matches!(error, RecordError::Filtered(_)) {
            debug!(table = self.table.name, %key, reason = %error, "filtered record");
        } else {
            warn!(table = self.table.name, %key, reason = %error, "skipping record");
        }
        self.skipped.push((key, error));
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn skipped(&self) -> &[(String, RecordError)] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `key` was skipped with an error of `category`
    pub fn was_skipped(&self, key: &str, category: &str) -> bool {
        self.skipped
            .iter()
            .any(|(k, e)| k == key && e.category() == category)
    }
}

/// What one stage writes through: its transaction, the registry and the
/// report being built
pub struct StageContext<'a> {
    conn: &'a Connection,
    pub registry: &'a mut Registry,
    pub report: StageReport,
}

impl<'a> StageContext<'a> {
    pub fn new(conn: &'a Connection, registry: &'a mut Registry, stage: &'static str) -> Self {
        Self {
            conn,
            registry,
            report: StageReport::new(stage),
        }
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    /// Upsert a finished batch, fold its skips into the report and record the
    /// surrogate keys of entity rows
    pub fn write(&mut self, batch: BatchBuilder) -> Result<UpsertOutcome, StoreError> {
        let BatchBuilder {
            table,
            rows,
            skipped,
            ..
        } = batch;

        for (key, error) in skipped {
            self.report.record_skip(table.name, key, &error);
        }

        let outcome = upsert(self.conn, table, &rows)?;
        self.report.record_written(table.name, outcome.affected);

        if let Some(kind) = EntityKind::for_table(table.name) {
            self.registry.absorb(kind, outcome.keys.iter().cloned());
        }

        debug!(
            table = table.name,
            rows = rows.len(),
            affected = outcome.affected,
            "batch written"
        );
        Ok(outcome)
    }

    /// Resolve `key`, creating the entity from `constructor` when unknown
    pub fn ensure(
        &mut self,
        kind: EntityKind,
        key: &str,
        constructor: impl FnOnce(&str) -> Row,
    ) -> Result<i64, StoreError> {
        let resolved = self
            .registry
            .resolve_or_create(self.conn, kind, key, constructor)?;
        if resolved.inserted() {
            self.report.record_written(kind.table().name, 1);
        }
        Ok(resolved.id())
    }

    pub fn finish(self) -> StageReport {
        self.report
    }
}

/// Iterate records as `(natural_key, record)`
pub(crate) fn entries(records: &Records) -> impl Iterator<Item = (&str, &Value)> {
    records.iter().map(|(k, v)| (k.as_str(), v))
}

/// Build the cost rows of one `[{id, count}]` list. Each entry whose item does
/// not resolve is dropped and recorded against `owner_key/item`.
pub(crate) fn push_costs(
    batch: &mut BatchBuilder,
    registry: &Registry,
    owner_key: &str,
    costs: &[Value],
    base: impl Fn() -> Row,
) {
    for cost in costs {
        let Some(item_code) = text(cost, "id") else {
            batch.skip(owner_key, RecordError::MissingField("id"));
            continue;
        };

        match registry.resolve(EntityKind::Item, &item_code) {
            Ok(item_id) => batch.push(
                base()
                    .with("item_id", item_id)
                    .with("count", int_or(cost, "count", 0)),
            ),
            Err(e) => batch.skip(format!("{}/{}", owner_key, item_code), e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Store;
    use serde_json::json;

    #[test]
    fn test_loader_order_follows_waves() {
        let waves: Vec<u8> = Loader::ALL.iter().map(|l| l.wave()).collect();
        let mut sorted = waves.clone();
        sorted.sort_unstable();
        assert_eq!(waves, sorted);

        for loader in Loader::ALL {
            assert_eq!(Loader::from_name(loader.name()), Some(loader));
        }
    }

    #[test]
    fn test_loaders_only_reference_earlier_tables() {
        let mut written: Vec<&str> = Vec::new();
        for loader in Loader::ALL {
            for table in loader.tables() {
                for dep in table.dependencies() {
                    assert!(
                        written.contains(&dep) || loader.tables().iter().any(|t| t.name == dep),
                        "{} reads {} before it is written",
                        loader,
                        dep
                    );
                }
            }
            written.extend(loader.tables().iter().map(|t| t.name));
        }
    }

    #[test]
    fn test_batch_deduplicates_conflict_keys() {
        let mut batch = BatchBuilder::new(&TAGS);
        batch.push(Row::new().with("tag_name", "DPS"));
        batch.push(Row::new().with("tag_name", "DPS"));
        batch.add("x", Err(RecordError::NotAnObject));

        assert_eq!(batch.len(), 1);
        assert!(batch.was_skipped("x", "not_an_object"));
    }

    #[test]
    fn test_write_records_keys_and_skips() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        let mut registry = Registry::new();
        let mut ctx = StageContext::new(store.connection(), &mut registry, "items");

        let batch = base::build_items(&test_support::records(json!({
            "30011": {"name": "Orirock", "rarity": "TIER_1"},
            "bad": "not an object",
        })));
        ctx.write(batch).unwrap();
        let report = ctx.finish();

        assert_eq!(report.rows_written["items"], 1);
        assert_eq!(report.skipped["not_an_object"], 1);
        assert!(registry.lookup(EntityKind::Item, "30011").is_some());
    }

    #[test]
    fn test_ensure_counts_only_inserted_rows() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        let tag = |name: &str| Row::new().with("tag_name", name);

        let mut registry = Registry::new();
        let mut ctx = StageContext::new(store.connection(), &mut registry, "taxonomy");
        let first = ctx.ensure(EntityKind::Tag, "DPS", tag).unwrap();
        assert_eq!(ctx.ensure(EntityKind::Tag, "DPS", tag).unwrap(), first);
        assert_eq!(ctx.finish().rows_written["tags"], 1);

        // A registry that never saw the row still finds it in the store
        let mut unseeded = Registry::new();
        let mut ctx = StageContext::new(store.connection(), &mut unseeded, "taxonomy");
        assert_eq!(ctx.ensure(EntityKind::Tag, "DPS", tag).unwrap(), first);
        assert!(!ctx.finish().rows_written.contains_key("tags"));
        assert_eq!(store.row_count("tags").unwrap(), 1);
    }
}
