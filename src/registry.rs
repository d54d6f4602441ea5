//! Natural key to surrogate key resolution.
//!
//! Source documents reference each other by natural keys (`"30011"`,
//! `"char_002_amiya"`); the store relates rows by surrogate integer keys. The
//! registry is the single place that maps one onto the other during a run.

use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::error::{RecordError, StoreError};
use crate::parser::Row;
use crate::schema::tables::*;
use crate::schema::TableSchema;
use crate::writer::upsert;

/// Entity types that own a natural key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Range,
    Item,
    Zone,
    Profession,
    SubProfession,
    Tag,
    Character,
    Skill,
    SkinGroup,
    Skin,
    Module,
    Stage,
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Range,
        EntityKind::Item,
        EntityKind::Zone,
        EntityKind::Profession,
        EntityKind::SubProfession,
        EntityKind::Tag,
        EntityKind::Character,
        EntityKind::Skill,
        EntityKind::SkinGroup,
        EntityKind::Skin,
        EntityKind::Module,
        EntityKind::Stage,
    ];

    pub fn table(self) -> &'static TableSchema {
        match self {
            EntityKind::Range => &RANGES,
            EntityKind::Item => &ITEMS,
            EntityKind::Zone => &ZONES,
            EntityKind::Profession => &PROFESSIONS,
            EntityKind::SubProfession => &SUB_PROFESSIONS,
            EntityKind::Tag => &TAGS,
            EntityKind::Character => &CHARACTERS,
            EntityKind::Skill => &SKILLS,
            EntityKind::SkinGroup => &SKIN_GROUPS,
            EntityKind::Skin => &CHARACTER_SKINS,
            EntityKind::Module => &MODULES,
            EntityKind::Stage => &STAGES,
        }
    }

    /// The kind whose rows live in `table`, if it is an entity table
    pub fn for_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.table().name == table)
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Range => "range",
            EntityKind::Item => "item",
            EntityKind::Zone => "zone",
            EntityKind::Profession => "profession",
            EntityKind::SubProfession => "sub_profession",
            EntityKind::Tag => "tag",
            EntityKind::Character => "character",
            EntityKind::Skill => "skill",
            EntityKind::SkinGroup => "skin_group",
            EntityKind::Skin => "skin",
            EntityKind::Module => "module",
            EntityKind::Stage => "stage",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where [`Registry::resolve_or_create`] got its key from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// Already in the registry
    Known(i64),
    /// Read back from a row written by an earlier run
    Found(i64),
    /// Written just now
    Inserted(i64),
}

impl Resolved {
    pub fn id(self) -> i64 {
        match self {
            Resolved::Known(id) | Resolved::Found(id) | Resolved::Inserted(id) => id,
        }
    }

    pub fn inserted(self) -> bool {
        matches!(self, Resolved::Inserted(_))
    }
}

type KeyMap = HashMap<String, i64>;

/// Per-kind natural key -> surrogate key maps.
///
/// Keys recorded while a stage runs stay pending until [`Registry::commit`];
/// [`Registry::discard`] forgets them when the stage transaction rolls back.
#[derive(Debug, Default)]
pub struct Registry {
    committed: HashMap<EntityKind, KeyMap>,
    pending: HashMap<EntityKind, KeyMap>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every persisted mapping so runs that skip early stages can still
    /// resolve the entities those stages wrote previously
    pub fn seed(&mut self, conn: &Connection) -> Result<usize, StoreError> {
        let mut total = 0;

        for kind in EntityKind::ALL {
            let schema = kind.table();
            let (Some(pk), Some(natural)) = (schema.primary_key, schema.natural_key) else {
                continue;
            };

            let sql = format!("SELECT {}, {} FROM {}", natural, pk, schema.name);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?;

            let map = self.committed.entry(kind).or_default();
            for row in rows {
                let (key, id) = row?;
                map.insert(key, id);
            }

            debug!(%kind, keys = map.len(), "seeded registry");
            total += map.len();
        }

        Ok(total)
    }

    pub fn lookup(&self, kind: EntityKind, key: &str) -> Option<i64> {
        self.pending
            .get(&kind)
            .and_then(|m| m.get(key))
            .or_else(|| self.committed.get(&kind).and_then(|m| m.get(key)))
            .copied()
    }

    /// Like [`Registry::lookup`], but a miss becomes the record error that
    /// drops the referencing row
    pub fn resolve(&self, kind: EntityKind, key: &str) -> Result<i64, RecordError> {
        self.lookup(kind, key)
            .ok_or_else(|| RecordError::unresolved(kind, key))
    }

    /// Resolve an optional reference: absent stays `None`, present but unknown
    /// is an error
    pub fn resolve_optional(
        &self,
        kind: EntityKind,
        key: Option<&str>,
    ) -> Result<Option<i64>, RecordError> {
        key.map(|k| self.resolve(kind, k)).transpose()
    }

    pub fn record(&mut self, kind: EntityKind, key: impl Into<String>, id: i64) {
        self.pending.entry(kind).or_default().insert(key.into(), id);
    }

    pub fn absorb(&mut self, kind: EntityKind, keys: impl IntoIterator<Item = (String, i64)>) {
        self.pending.entry(kind).or_default().extend(keys);
    }

    /// Return the surrogate key for `key`, writing the row built by
    /// `constructor` first if the entity exists neither in the registry nor in
    /// the store. Never creates two rows for one natural key.
    pub fn resolve_or_create<F>(
        &mut self,
        conn: &Connection,
        kind: EntityKind,
        key: &str,
        constructor: F,
    ) -> Result<Resolved, StoreError>
    where
        F: FnOnce(&str) -> Row,
    {
        if let Some(id) = self.lookup(kind, key) {
            return Ok(Resolved::Known(id));
        }

        let schema = kind.table();
        if let Some(id) = find_surrogate(conn, schema, key)? {
            self.record(kind, key, id);
            return Ok(Resolved::Found(id));
        }

        let outcome = upsert(conn, schema, &[constructor(key)])?;
        let resolved = match outcome.keys.into_iter().find(|(k, _)| k == key) {
            Some((_, id)) => Resolved::Inserted(id),
            None => find_surrogate(conn, schema, key)?
                .map(Resolved::Found)
                .ok_or_else(|| {
                    StoreError::Schema(format!(
                        "{} `{}` was neither inserted nor found in {}",
                        kind, key, schema.name
                    ))
                })?,
        };

        self.record(kind, key, resolved.id());
        Ok(resolved)
    }

    /// Promote pending keys after the stage transaction committed
    pub fn commit(&mut self) {
        for (kind, keys) in self.pending.drain() {
            self.committed.entry(kind).or_default().extend(keys);
        }
    }

    /// Forget pending keys after the stage transaction rolled back
    pub fn discard(&mut self) {
        let dropped: usize = self.pending.values().map(HashMap::len).sum();
        if dropped > 0 {
            debug!(dropped, "discarding uncommitted registry keys");
        }
        self.pending.clear();
    }

    /// Known keys of one kind, pending included
    pub fn len(&self, kind: EntityKind) -> usize {
        let committed = self.committed.get(&kind);
        let pending = self.pending.get(&kind);
        match (committed, pending) {
            (Some(c), Some(p)) => c.len() + p.keys().filter(|k| !c.contains_key(*k)).count(),
            (Some(c), None) => c.len(),
            (None, Some(p)) => p.len(),
            (None, None) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL.iter().all(|k| self.len(*k) == 0)
    }
}

fn find_surrogate(
    conn: &Connection,
    schema: &TableSchema,
    key: &str,
) -> Result<Option<i64>, StoreError> {
    let (Some(pk), Some(natural)) = (schema.primary_key, schema.natural_key) else {
        return Ok(None);
    };

    let sql = format!("SELECT {} FROM {} WHERE {} = ?1", pk, schema.name, natural);
    Ok(conn.query_row(&sql, [key], |row| row.get(0)).optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Store;

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    fn tag(name: &str) -> Row {
        Row::new().with("tag_name", name)
    }

    #[test]
    fn test_entity_kinds_map_to_entity_tables() {
        for kind in EntityKind::ALL {
            assert!(kind.table().is_entity(), "{}", kind);
            assert_eq!(EntityKind::for_table(kind.table().name), Some(kind));
        }
        assert_eq!(EntityKind::for_table("character_stats"), None);
    }

    #[test]
    fn test_resolve_or_create_writes_once() {
        let store = store();
        let conn = store.connection();
        let mut registry = Registry::new();

        let first = registry
            .resolve_or_create(conn, EntityKind::Tag, "Healing", tag)
            .unwrap();
        let second = registry
            .resolve_or_create(conn, EntityKind::Tag, "Healing", |_| panic!("cache miss"))
            .unwrap();

        assert!(first.inserted());
        assert_eq!(second, Resolved::Known(first.id()));
        assert_eq!(store.row_count("tags").unwrap(), 1);
    }

    #[test]
    fn test_resolve_or_create_finds_existing_row() {
        let store = store();
        let conn = store.connection();
        conn.execute("INSERT INTO tags (tag_name) VALUES ('Support')", [])
            .unwrap();

        // Fresh registry, not seeded
        let mut registry = Registry::new();
        let resolved = registry
            .resolve_or_create(conn, EntityKind::Tag, "Support", |_| panic!("row exists"))
            .unwrap();

        assert_eq!(resolved, Resolved::Found(1));
        assert!(!resolved.inserted());
        assert_eq!(store.row_count("tags").unwrap(), 1);
    }

    #[test]
    fn test_seed_reads_every_kind() {
        let store = store();
        let conn = store.connection();
        conn.execute_batch(
            "INSERT INTO items (item_code, name, rarity) VALUES ('30011', 'Orirock', 1);
             INSERT INTO zones (zone_code, name) VALUES ('main_0', 'Prologue');",
        )
        .unwrap();

        let mut registry = Registry::new();
        assert_eq!(registry.seed(conn).unwrap(), 2);
        assert!(registry.lookup(EntityKind::Item, "30011").is_some());
        assert!(registry.lookup(EntityKind::Zone, "main_0").is_some());
        assert_eq!(registry.lookup(EntityKind::Item, "main_0"), None);
    }

    #[test]
    fn test_discard_forgets_pending_keys() {
        let mut registry = Registry::new();
        registry.record(EntityKind::Item, "30011", 1);
        registry.commit();
        registry.record(EntityKind::Item, "30012", 2);

        assert_eq!(registry.len(EntityKind::Item), 2);
        registry.discard();

        assert_eq!(registry.lookup(EntityKind::Item, "30011"), Some(1));
        assert_eq!(registry.lookup(EntityKind::Item, "30012"), None);
        assert_eq!(registry.len(EntityKind::Item), 1);
    }

    #[test]
    fn test_resolve_reports_kind_and_key() {
        let registry = Registry::new();
        assert_eq!(
            registry.resolve(EntityKind::Item, "99999"),
            Err(RecordError::unresolved(EntityKind::Item, "99999"))
        );
        assert_eq!(registry.resolve_optional(EntityKind::Range, None), Ok(None));
    }
}
