//! Table schema definitions for the normalized gamedata store

use super::types::*;

// =============================================================================
// Independent Tables (no FK dependencies)
// =============================================================================

pub static RANGES: TableSchema = TableSchema {
    name: "ranges",
    primary_key: Some("range_id"),
    natural_key: Some("range_code"),
    columns: &[
        Column::required("range_code", ColumnType::Text),
        Column::new("direction", ColumnType::Integer),
        Column::required("grids", ColumnType::Json).non_empty(),
    ],
    foreign_keys: &[],
    conflict_key: &["range_code"],
    on_conflict: OnConflict::Ignore,
};

pub static ITEMS: TableSchema = TableSchema {
    name: "items",
    primary_key: Some("item_id"),
    natural_key: Some("item_code"),
    columns: &[
        Column::required("item_code", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("rarity", ColumnType::Integer).bounded(0.0, 5.0),
        Column::new("icon_id", ColumnType::Text),
        Column::new("item_type", ColumnType::Text),
        Column::new("classify_type", ColumnType::Text),
        Column::new("usage_text", ColumnType::Text),
        Column::new("description", ColumnType::Text),
        Column::new("obtain_approach", ColumnType::Text),
    ],
    foreign_keys: &[],
    conflict_key: &["item_code"],
    on_conflict: OnConflict::Update(&["name", "description"]),
};

pub static ZONES: TableSchema = TableSchema {
    name: "zones",
    primary_key: Some("zone_id"),
    natural_key: Some("zone_code"),
    columns: &[
        Column::required("zone_code", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::new("zone_type", ColumnType::Text),
        Column::new("zone_index", ColumnType::Integer),
    ],
    foreign_keys: &[],
    conflict_key: &["zone_code"],
    on_conflict: OnConflict::Update(&["name"]),
};

// =============================================================================
// Derived Taxonomy (scanned from the character table)
// =============================================================================

pub static PROFESSIONS: TableSchema = TableSchema {
    name: "professions",
    primary_key: Some("profession_id"),
    natural_key: Some("profession_code"),
    columns: &[
        Column::required("profession_code", ColumnType::Text),
        Column::required("name", ColumnType::Text),
    ],
    foreign_keys: &[],
    conflict_key: &["profession_code"],
    on_conflict: OnConflict::Ignore,
};

pub static SUB_PROFESSIONS: TableSchema = TableSchema {
    name: "sub_professions",
    primary_key: Some("sub_profession_id"),
    natural_key: Some("sub_profession_code"),
    columns: &[
        Column::required("sub_profession_code", ColumnType::Text),
        Column::required("name", ColumnType::Text),
    ],
    foreign_keys: &[],
    conflict_key: &["sub_profession_code"],
    on_conflict: OnConflict::Ignore,
};

pub static TAGS: TableSchema = TableSchema {
    name: "tags",
    primary_key: Some("tag_id"),
    natural_key: Some("tag_name"),
    columns: &[Column::required("tag_name", ColumnType::Text)],
    foreign_keys: &[],
    conflict_key: &["tag_name"],
    on_conflict: OnConflict::Ignore,
};

// =============================================================================
// Characters
// =============================================================================

pub static CHARACTERS: TableSchema = TableSchema {
    name: "characters",
    primary_key: Some("character_id"),
    natural_key: Some("character_code"),
    columns: &[
        Column::required("character_code", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("rarity", ColumnType::Integer).bounded(0.0, 5.0),
        Column::new("profession_id", ColumnType::Integer),
        Column::new("sub_profession_id", ColumnType::Integer),
        Column::new("position", ColumnType::Text),
        Column::new("description", ColumnType::Text),
        Column::new("item_usage", ColumnType::Text),
        Column::new("nation_id", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("profession_id", "professions"),
        ForeignKey::new("sub_profession_id", "sub_professions"),
    ],
    conflict_key: &["character_code"],
    on_conflict: OnConflict::Update(&["name", "description"]),
};

pub static CHARACTER_STATS: TableSchema = TableSchema {
    name: "character_stats",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::required("phase", ColumnType::Integer).bounded(0.0, 2.0),
        Column::required("max_level", ColumnType::Integer).bounded(1.0, 90.0),
        Column::new("range_id", ColumnType::Integer),
        Column::required("base_hp", ColumnType::Integer),
        Column::required("base_atk", ColumnType::Integer),
        Column::required("base_def", ColumnType::Integer),
        Column::required("max_hp", ColumnType::Integer),
        Column::required("max_atk", ColumnType::Integer),
        Column::required("max_def", ColumnType::Integer),
        Column::required("magic_resistance", ColumnType::Integer),
        Column::required("cost", ColumnType::Integer),
        Column::required("block_count", ColumnType::Integer),
        Column::required("attack_speed", ColumnType::Integer),
        Column::required("respawn_time", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("character_id", "characters"),
        ForeignKey::new("range_id", "ranges"),
    ],
    conflict_key: &["character_id", "phase"],
    on_conflict: OnConflict::Ignore,
};

pub static CHARACTER_TALENTS: TableSchema = TableSchema {
    name: "character_talents",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::required("talent_index", ColumnType::Integer),
        Column::required("candidate_index", ColumnType::Integer),
        Column::required("unlock_phase", ColumnType::Integer).bounded(0.0, 2.0),
        Column::required("unlock_level", ColumnType::Integer),
        Column::required("required_potential", ColumnType::Integer),
        Column::new("range_id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::new("description", ColumnType::Text),
        Column::required("blackboard", ColumnType::Json),
    ],
    foreign_keys: &[
        ForeignKey::new("character_id", "characters"),
        ForeignKey::new("range_id", "ranges"),
    ],
    conflict_key: &["character_id", "talent_index", "candidate_index"],
    on_conflict: OnConflict::Update(&["name", "description"]),
};

pub static CHARACTER_POTENTIALS: TableSchema = TableSchema {
    name: "character_potentials",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::required("potential_rank", ColumnType::Integer),
        Column::new("potential_type", ColumnType::Text),
        Column::new("description", ColumnType::Text),
    ],
    foreign_keys: &[ForeignKey::new("character_id", "characters")],
    conflict_key: &["character_id", "potential_rank"],
    on_conflict: OnConflict::Update(&["description"]),
};

pub static CHARACTER_TAGS: TableSchema = TableSchema {
    name: "character_tags",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::required("tag_id", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("character_id", "characters"),
        ForeignKey::new("tag_id", "tags"),
    ],
    conflict_key: &["character_id", "tag_id"],
    on_conflict: OnConflict::Ignore,
};

pub static CHARACTER_FAVOR_TEMPLATES: TableSchema = TableSchema {
    name: "character_favor_templates",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::required("max_favor_level", ColumnType::Integer),
        Column::required("bonus_hp", ColumnType::Integer),
        Column::required("bonus_atk", ColumnType::Integer),
        Column::required("bonus_def", ColumnType::Integer),
    ],
    foreign_keys: &[ForeignKey::new("character_id", "characters")],
    conflict_key: &["character_id"],
    on_conflict: OnConflict::Ignore,
};

/// Skill slots hold skill natural keys; skills load in a later wave
pub static CHARACTER_SKILL_SLOTS: TableSchema = TableSchema {
    name: "character_skill_slots",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::new("phase_0_code", ColumnType::Text),
        Column::new("phase_1_code", ColumnType::Text),
        Column::new("phase_2_code", ColumnType::Text),
    ],
    foreign_keys: &[ForeignKey::new("character_id", "characters")],
    conflict_key: &["character_id"],
    on_conflict: OnConflict::Ignore,
};

pub static CHARACTER_PROMOTION_COSTS: TableSchema = TableSchema {
    name: "character_promotion_costs",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::required("target_phase", ColumnType::Integer).bounded(0.0, 2.0),
        Column::required("item_id", ColumnType::Integer),
        Column::required("count", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("character_id", "characters"),
        ForeignKey::new("item_id", "items"),
    ],
    conflict_key: &["character_id", "target_phase", "item_id"],
    on_conflict: OnConflict::Ignore,
};

// =============================================================================
// Skills
// =============================================================================

pub static SKILLS: TableSchema = TableSchema {
    name: "skills",
    primary_key: Some("skill_id"),
    natural_key: Some("skill_code"),
    columns: &[
        Column::required("skill_code", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::new("icon_id", ColumnType::Text),
        Column::required("skill_type", ColumnType::Integer).bounded(0.0, 2.0),
        Column::required("sp_type", ColumnType::Integer),
        Column::new("duration_type", ColumnType::Text),
    ],
    foreign_keys: &[],
    conflict_key: &["skill_code"],
    on_conflict: OnConflict::Update(&["name"]),
};

pub static SKILL_LEVELS: TableSchema = TableSchema {
    name: "skill_levels",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("skill_id", ColumnType::Integer),
        Column::required("level", ColumnType::Integer).bounded(1.0, 10.0),
        Column::required("sp_cost", ColumnType::Integer),
        Column::required("initial_sp", ColumnType::Integer),
        // -1 marks an unlimited duration in the source
        Column::required("duration", ColumnType::Real).bounded(-1.0, 999.0),
        Column::new("range_id", ColumnType::Integer),
        Column::new("description", ColumnType::Text),
        Column::required("blackboard", ColumnType::Json),
    ],
    foreign_keys: &[
        ForeignKey::new("skill_id", "skills"),
        ForeignKey::new("range_id", "ranges"),
    ],
    conflict_key: &["skill_id", "level"],
    on_conflict: OnConflict::Update(&["description"]),
};

pub static CHARACTER_SKILL_COSTS: TableSchema = TableSchema {
    name: "character_skill_costs",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("character_id", ColumnType::Integer),
        Column::required("level", ColumnType::Integer).bounded(2.0, 7.0),
        Column::required("item_id", ColumnType::Integer),
        Column::required("count", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("character_id", "characters"),
        ForeignKey::new("item_id", "items"),
    ],
    conflict_key: &["character_id", "level", "item_id"],
    on_conflict: OnConflict::Ignore,
};

pub static SKILL_MASTERY_COSTS: TableSchema = TableSchema {
    name: "skill_mastery_costs",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("skill_id", ColumnType::Integer),
        Column::required("mastery_level", ColumnType::Integer).bounded(1.0, 3.0),
        Column::required("item_id", ColumnType::Integer),
        Column::required("count", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("skill_id", "skills"),
        ForeignKey::new("item_id", "items"),
    ],
    conflict_key: &["skill_id", "mastery_level", "item_id"],
    on_conflict: OnConflict::Ignore,
};

// =============================================================================
// Skins
// =============================================================================

pub static SKIN_GROUPS: TableSchema = TableSchema {
    name: "skin_groups",
    primary_key: Some("skin_group_id"),
    natural_key: Some("group_name"),
    columns: &[Column::required("group_name", ColumnType::Text)],
    foreign_keys: &[],
    conflict_key: &["group_name"],
    on_conflict: OnConflict::Ignore,
};

pub static CHARACTER_SKINS: TableSchema = TableSchema {
    name: "character_skins",
    primary_key: Some("skin_id"),
    natural_key: Some("skin_code"),
    columns: &[
        Column::required("skin_code", ColumnType::Text),
        Column::required("character_id", ColumnType::Integer),
        Column::new("name", ColumnType::Text),
        Column::new("series_name", ColumnType::Text),
        Column::new("illustrator", ColumnType::Text),
        Column::new("portrait_id", ColumnType::Text),
        Column::new("avatar_id", ColumnType::Text),
    ],
    foreign_keys: &[ForeignKey::new("character_id", "characters")],
    conflict_key: &["skin_code"],
    on_conflict: OnConflict::Update(&["name", "series_name", "illustrator"]),
};

pub static CHARACTER_SKIN_DETAILS: TableSchema = TableSchema {
    name: "character_skin_details",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("skin_id", ColumnType::Integer),
        Column::new("skin_group_id", ColumnType::Integer),
        Column::new("content", ColumnType::Text),
        Column::new("dialog", ColumnType::Text),
        Column::new("description", ColumnType::Text),
        Column::new("usage_text", ColumnType::Text),
    ],
    foreign_keys: &[
        ForeignKey::new("skin_id", "character_skins"),
        ForeignKey::new("skin_group_id", "skin_groups"),
    ],
    conflict_key: &["skin_id"],
    on_conflict: OnConflict::Update(&["content", "dialog", "description", "usage_text"]),
};

// =============================================================================
// Modules
// =============================================================================

pub static MODULES: TableSchema = TableSchema {
    name: "modules",
    primary_key: Some("module_id"),
    natural_key: Some("module_code"),
    columns: &[
        Column::required("module_code", ColumnType::Text),
        Column::required("character_id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::new("icon_id", ColumnType::Text),
        Column::new("type_name", ColumnType::Text),
        Column::new("description", ColumnType::Text),
    ],
    foreign_keys: &[ForeignKey::new("character_id", "characters")],
    conflict_key: &["module_code"],
    on_conflict: OnConflict::Update(&["name", "description"]),
};

pub static MODULE_COSTS: TableSchema = TableSchema {
    name: "module_costs",
    primary_key: None,
    natural_key: None,
    columns: &[
        Column::required("module_id", ColumnType::Integer),
        Column::required("level", ColumnType::Integer),
        Column::required("item_id", ColumnType::Integer),
        Column::required("count", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("module_id", "modules"),
        ForeignKey::new("item_id", "items"),
    ],
    conflict_key: &["module_id", "level", "item_id"],
    on_conflict: OnConflict::Ignore,
};

// =============================================================================
// Stages
// =============================================================================

pub static STAGES: TableSchema = TableSchema {
    name: "stages",
    primary_key: Some("stage_id"),
    natural_key: Some("stage_code"),
    columns: &[
        Column::required("stage_code", ColumnType::Text),
        Column::required("zone_id", ColumnType::Integer),
        Column::required("display_code", ColumnType::Text),
        Column::new("name", ColumnType::Text),
        Column::new("description", ColumnType::Text),
        Column::new("stage_type", ColumnType::Text),
        Column::required("ap_cost", ColumnType::Integer),
        Column::new("danger_level", ColumnType::Text),
    ],
    foreign_keys: &[ForeignKey::new("zone_id", "zones")],
    conflict_key: &["stage_code"],
    on_conflict: OnConflict::Update(&["name", "description"]),
};

// =============================================================================
// Schema Registry
// =============================================================================

/// All table schemas in dependency order
pub static ALL_TABLES: &[&TableSchema] = &[
    // Wave 1: No dependencies
    &RANGES,
    &ITEMS,
    &ZONES,
    // Wave 2: Derived taxonomy
    &PROFESSIONS,
    &SUB_PROFESSIONS,
    &TAGS,
    // Wave 3: Characters and their children
    &CHARACTERS,
    &CHARACTER_STATS,
    &CHARACTER_TALENTS,
    &CHARACTER_POTENTIALS,
    &CHARACTER_TAGS,
    &CHARACTER_FAVOR_TEMPLATES,
    &CHARACTER_SKILL_SLOTS,
    &CHARACTER_PROMOTION_COSTS,
    // Wave 4: Skills, skill costs and skins
    &SKILLS,
    &SKILL_LEVELS,
    &CHARACTER_SKILL_COSTS,
    &SKILL_MASTERY_COSTS,
    &SKIN_GROUPS,
    &CHARACTER_SKINS,
    &CHARACTER_SKIN_DETAILS,
    // Wave 5: Modules
    &MODULES,
    &MODULE_COSTS,
    // Wave 6: Stages
    &STAGES,
];

// =============================================================================
// Loader Tables
// =============================================================================

pub static RANGE_TABLES: &[&TableSchema] = &[&RANGES];
pub static ITEM_TABLES: &[&TableSchema] = &[&ITEMS];
pub static ZONE_TABLES: &[&TableSchema] = &[&ZONES];
pub static TAXONOMY_TABLES: &[&TableSchema] = &[&PROFESSIONS, &SUB_PROFESSIONS, &TAGS];
pub static CHARACTER_TABLES: &[&TableSchema] = &[
    &CHARACTERS,
    &CHARACTER_STATS,
    &CHARACTER_TALENTS,
    &CHARACTER_POTENTIALS,
    &CHARACTER_TAGS,
    &CHARACTER_FAVOR_TEMPLATES,
    &CHARACTER_SKILL_SLOTS,
    &CHARACTER_PROMOTION_COSTS,
];
pub static SKILL_TABLES: &[&TableSchema] = &[&SKILLS, &SKILL_LEVELS];
pub static SKILL_COST_TABLES: &[&TableSchema] = &[&CHARACTER_SKILL_COSTS, &SKILL_MASTERY_COSTS];
pub static SKIN_TABLES: &[&TableSchema] =
    &[&SKIN_GROUPS, &CHARACTER_SKINS, &CHARACTER_SKIN_DETAILS];
pub static MODULE_TABLES: &[&TableSchema] = &[&MODULES, &MODULE_COSTS];
pub static STAGE_TABLES: &[&TableSchema] = &[&STAGES];

/// Get table schema by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_keys_point_at_known_surrogate_keys() {
        for table in ALL_TABLES {
            for fk in table.foreign_keys {
                let parent = get_table(fk.references_table)
                    .unwrap_or_else(|| panic!("{} references unknown table", table.name));
                assert_eq!(parent.primary_key, Some(fk.references_column));
                assert!(table.column(fk.column).is_some());
            }
        }
    }

    #[test]
    fn test_update_columns_never_touch_keys() {
        for table in ALL_TABLES {
            for col in table.update_columns() {
                assert!(!table.conflict_key.contains(col), "{}.{}", table.name, col);
                assert!(
                    !table.foreign_keys.iter().any(|fk| fk.column == *col),
                    "{}.{}",
                    table.name,
                    col
                );
                assert!(table.column(col).is_some());
            }
        }
    }

    #[test]
    fn test_entity_tables_conflict_on_natural_key() {
        for table in ALL_TABLES.iter().filter(|t| t.is_entity()) {
            assert_eq!(table.conflict_key, &[table.natural_key.unwrap()]);
        }
    }
}
