use std::collections::HashSet;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    /// JSON blob stored as text
    Json,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text | ColumnType::Json => "TEXT",
        }
    }
}

/// Inclusive value range a decoded column must stay within after a load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

/// Column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
    pub bounds: Option<Bounds>,
    /// JSON column that must hold a non-empty array or object
    pub non_empty: bool,
}

impl Column {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
            bounds: None,
            non_empty: false,
        }
    }

    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
            bounds: None,
            non_empty: false,
        }
    }

    /// Declare the range the post-load validator checks this column against
    pub const fn bounded(self, min: f64, max: f64) -> Self {
        Self {
            bounds: Some(Bounds { min, max }),
            ..self
        }
    }

    /// Declare that the post-load validator flags `[]`, `{}` and NULL here
    pub const fn non_empty(self) -> Self {
        Self {
            non_empty: true,
            ..self
        }
    }
}

/// Foreign key reference
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
}

impl ForeignKey {
    /// Reference a parent whose surrogate key column has the same name
    /// (`item_id` -> `items.item_id`)
    pub const fn new(column: &'static str, references_table: &'static str) -> Self {
        Self {
            column,
            references_table,
            references_column: column,
        }
    }
}

/// What an upsert does when a row collides with the conflict key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OnConflict {
    Ignore,
    /// Overwrite only these display columns; identity and relationship
    /// columns are never listed here
    Update(&'static [&'static str]),
}

/// Table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    /// Store-assigned surrogate key (`INTEGER PRIMARY KEY AUTOINCREMENT`)
    pub primary_key: Option<&'static str>,
    /// Source-assigned string code, unique per table
    pub natural_key: Option<&'static str>,
    /// Insertable columns (the surrogate key is not listed)
    pub columns: &'static [Column],
    pub foreign_keys: &'static [ForeignKey],
    /// Unique key targeted by `ON CONFLICT`
    pub conflict_key: &'static [&'static str],
    pub on_conflict: OnConflict,
}

impl TableSchema {
    /// Get all tables this table depends on (FK parents)
    pub fn dependencies(&self) -> HashSet<&'static str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.references_table)
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Entity tables carry both a surrogate and a natural key and hand
    /// their mappings to the registry
    pub fn is_entity(&self) -> bool {
        self.primary_key.is_some() && self.natural_key.is_some()
    }

    pub fn update_columns(&self) -> &'static [&'static str] {
        match self.on_conflict {
            OnConflict::Ignore => &[],
            OnConflict::Update(cols) => cols,
        }
    }
}
