//! Wave 4: skills, their levels, and the skill upgrade costs listed on
//! character records

use serde_json::Value;
use tracing::debug;

use super::{entries, push_costs, BatchBuilder, Records, StageContext};
use crate::error::{RecordError, StoreError};
use crate::parser::record::{array, as_object, flag, int_or, json, real, required_text, text};
use crate::parser::{clamp_duration, decode_skill_type, decode_sp_type, Row};
use crate::registry::{EntityKind, Registry};
use crate::schema::tables::*;

/// Highest skill level the store holds (7 regular levels + 3 masteries)
pub const MAX_SKILL_LEVEL: usize = 10;
/// `allSkillLvlup[0]` upgrades skills to level 2
const FIRST_UPGRADE_LEVEL: i64 = 2;

static NULL: Value = Value::Null;

pub fn load(records: &Records, ctx: &mut StageContext<'_>) -> Result<(), StoreError> {
    ctx.write(build_skills(records))?;
    let levels = build_skill_levels(records, ctx.registry);
    ctx.write(levels)?;
    Ok(())
}

/// Reads the character document
pub fn load_costs(records: &Records, ctx: &mut StageContext<'_>) -> Result<(), StoreError> {
    let (upgrades, masteries) = build_skill_costs(records, ctx.registry);
    ctx.write(upgrades)?;
    ctx.write(masteries)?;
    Ok(())
}

pub fn build_skills(records: &Records) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&SKILLS);
    for (code, record) in entries(records) {
        batch.add(code, skill_row(code, record));
    }
    batch
}

fn skill_row(code: &str, record: &Value) -> Result<Row, RecordError> {
    as_object(record)?;
    // Skill-wide fields live on the first level
    let first = array(record, "levels")
        .first()
        .ok_or(RecordError::MissingField("levels"))?;
    let sp_data = first.get("spData").unwrap_or(&NULL);

    Ok(Row::new()
        .with("skill_code", code)
        .with("name", required_text(first, "name")?)
        .with("icon_id", text(record, "iconId"))
        .with("skill_type", decode_skill_type(first.get("skillType")))
        .with("sp_type", decode_sp_type(sp_data.get("spType")))
        .with("duration_type", text(first, "durationType")))
}

pub fn build_skill_levels(records: &Records, registry: &Registry) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&SKILL_LEVELS);

    for (code, record) in entries(records) {
        let Some(skill_id) = registry.lookup(EntityKind::Skill, code) else {
            continue;
        };

        let levels = array(record, "levels");
        if levels.len() > MAX_SKILL_LEVEL {
            debug!(skill = code, levels = levels.len(), "ignoring levels past the cap");
        }

        for (idx, level) in levels.iter().take(MAX_SKILL_LEVEL).enumerate() {
            let level_no = idx as i64 + 1;
            let key = format!("{}/{}", code, level_no);
            batch.add(&key, level_row(registry, skill_id, level_no, level));
        }
    }

    batch
}

fn level_row(
    registry: &Registry,
    skill_id: i64,
    level_no: i64,
    level: &Value,
) -> Result<Row, RecordError> {
    as_object(level)?;
    let sp_data = level.get("spData").unwrap_or(&NULL);
    let range_id =
        registry.resolve_optional(EntityKind::Range, text(level, "rangeId").as_deref())?;

    Ok(Row::new()
        .with("skill_id", skill_id)
        .with("level", level_no)
        .with("sp_cost", int_or(sp_data, "spCost", 0))
        .with("initial_sp", int_or(sp_data, "initSp", 0))
        .with(
            "duration",
            clamp_duration(real(level, "duration").unwrap_or(0.0)),
        )
        .with("range_id", range_id)
        .with("description", text(level, "description"))
        .with("blackboard", json(level, "blackboard", "[]")))
}

/// Skill upgrade costs (shared by all of a character's skills) and mastery
/// costs (per skill), both listed on character records
pub fn build_skill_costs(records: &Records, registry: &Registry) -> (BatchBuilder, BatchBuilder) {
    let mut upgrades = BatchBuilder::new(&CHARACTER_SKILL_COSTS);
    let mut masteries = BatchBuilder::new(&SKILL_MASTERY_COSTS);

    for (code, record) in entries(records) {
        if !record.is_object() || flag(record, "isNotObtainable") {
            continue;
        }

        let character_id = match registry.resolve(EntityKind::Character, code) {
            Ok(id) => id,
            Err(e) => {
                upgrades.skip(code, e);
                continue;
            }
        };

        for (idx, step) in array(record, "allSkillLvlup").iter().enumerate() {
            let level = idx as i64 + FIRST_UPGRADE_LEVEL;
            push_costs(
                &mut upgrades,
                registry,
                &format!("{}/{}", code, level),
                array(step, "lvlUpCost"),
                || {
                    Row::new()
                        .with("character_id", character_id)
                        .with("level", level)
                },
            );
        }

        for entry in array(record, "skills") {
            let Some(skill_code) = text(entry, "skillId") else {
                continue;
            };
            let skill_id = match registry.resolve(EntityKind::Skill, &skill_code) {
                Ok(id) => id,
                Err(e) => {
                    masteries.skip(format!("{}/{}", code, skill_code), e);
                    continue;
                }
            };

            for (idx, cond) in array(entry, "levelUpCostCond").iter().enumerate() {
                let mastery = idx as i64 + 1;
                push_costs(
                    &mut masteries,
                    registry,
                    &format!("{}/{}", skill_code, mastery),
                    array(cond, "levelUpCost"),
                    || {
                        Row::new()
                            .with("skill_id", skill_id)
                            .with("mastery_level", mastery)
                    },
                );
            }
        }
    }

    (upgrades, masteries)
}
