//! Wave 3: characters and everything hanging off a character record

use serde_json::Value;

use super::{entries, push_costs, BatchBuilder, Records, StageContext};
use crate::error::{RecordError, StoreError};
use crate::parser::record::{array, as_object, flag, int, int_or, json, required_text, text};
use crate::parser::{decode_phase, decode_rarity, Row};
use crate::registry::{EntityKind, Registry};
use crate::schema::tables::*;

/// Favor bonuses in the source are the values at this trust level
pub const MAX_FAVOR_LEVEL: i64 = 100;
/// Skill slots per character: one unlocked per promotion phase
const SKILL_SLOTS: usize = 3;

static NULL: Value = Value::Null;

pub fn load(records: &Records, ctx: &mut StageContext<'_>) -> Result<(), StoreError> {
    let characters = build_characters(records, ctx.registry);
    ctx.write(characters)?;

    let children = build_children(records, ctx.registry);
    for batch in children.into_batches() {
        ctx.write(batch)?;
    }

    Ok(())
}

pub fn build_characters(records: &Records, registry: &Registry) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&CHARACTERS);
    for (code, record) in entries(records) {
        batch.add(code, character_row(code, record, registry));
    }
    batch
}

fn character_row(code: &str, record: &Value, registry: &Registry) -> Result<Row, RecordError> {
    as_object(record)?;
    if flag(record, "isNotObtainable") {
        return Err(RecordError::Filtered("isNotObtainable"));
    }

    let name = required_text(record, "name")?;
    let profession_id = registry.resolve_optional(
        EntityKind::Profession,
        text(record, "profession").as_deref(),
    )?;
    let sub_profession_id = registry.resolve_optional(
        EntityKind::SubProfession,
        text(record, "subProfessionId").as_deref(),
    )?;

    Ok(Row::new()
        .with("character_code", code)
        .with("name", name)
        .with("rarity", decode_rarity(record.get("rarity")))
        .with("profession_id", profession_id)
        .with("sub_profession_id", sub_profession_id)
        .with("position", text(record, "position"))
        .with("description", text(record, "itemDesc"))
        .with("item_usage", text(record, "itemUsage"))
        .with("nation_id", text(record, "nationId")))
}

/// Child-table batches built from the character document
pub struct CharacterChildren {
    pub stats: BatchBuilder,
    pub talents: BatchBuilder,
    pub potentials: BatchBuilder,
    pub tags: BatchBuilder,
    pub favor: BatchBuilder,
    pub slots: BatchBuilder,
    pub promotion_costs: BatchBuilder,
}

impl CharacterChildren {
    fn new() -> Self {
        Self {
            stats: BatchBuilder::new(&CHARACTER_STATS),
            talents: BatchBuilder::new(&CHARACTER_TALENTS),
            potentials: BatchBuilder::new(&CHARACTER_POTENTIALS),
            tags: BatchBuilder::new(&CHARACTER_TAGS),
            favor: BatchBuilder::new(&CHARACTER_FAVOR_TEMPLATES),
            slots: BatchBuilder::new(&CHARACTER_SKILL_SLOTS),
            promotion_costs: BatchBuilder::new(&CHARACTER_PROMOTION_COSTS),
        }
    }

    pub fn into_batches(self) -> [BatchBuilder; 7] {
        [
            self.stats,
            self.talents,
            self.potentials,
            self.tags,
            self.favor,
            self.slots,
            self.promotion_costs,
        ]
    }

    pub fn total_rows(&self) -> usize {
        [
            &self.stats,
            &self.talents,
            &self.potentials,
            &self.tags,
            &self.favor,
            &self.slots,
            &self.promotion_costs,
        ]
        .iter()
        .map(|b| b.len())
        .sum()
    }
}

/// Build child rows for every character the registry knows. Characters that
/// did not load were already reported by [`build_characters`].
pub fn build_children(records: &Records, registry: &Registry) -> CharacterChildren {
    let mut out = CharacterChildren::new();

    for (code, record) in entries(records) {
        if !record.is_object() || flag(record, "isNotObtainable") {
            continue;
        }
        let Some(character_id) = registry.lookup(EntityKind::Character, code) else {
            continue;
        };

        push_phases(&mut out, registry, code, character_id, record);
        push_talents(&mut out.talents, registry, code, character_id, record);
        push_potentials(&mut out.potentials, code, character_id, record);
        push_tags(&mut out.tags, registry, code, character_id, record);
        push_favor(&mut out.favor, character_id, record);
        out.slots.push(slot_row(character_id, record));
    }

    out
}

fn data(frame: &Value) -> &Value {
    frame.get("data").unwrap_or(&NULL)
}

/// Stats and promotion costs, one set per phase
fn push_phases(
    out: &mut CharacterChildren,
    registry: &Registry,
    code: &str,
    character_id: i64,
    record: &Value,
) {
    for (idx, phase) in array(record, "phases").iter().enumerate() {
        let phase_idx = idx as i64;
        let key = format!("{}/{}", code, phase_idx);

        if !phase.is_object() {
            out.stats.skip(key, RecordError::NotAnObject);
            continue;
        }

        match stats_row(registry, character_id, phase_idx, phase) {
            Ok(Some(row)) => out.stats.push(row),
            Ok(None) => {}
            Err(e) => out.stats.skip(key.as_str(), e),
        }

        push_costs(
            &mut out.promotion_costs,
            registry,
            &key,
            array(phase, "evolveCost"),
            || {
                Row::new()
                    .with("character_id", character_id)
                    .with("target_phase", phase_idx)
            },
        );
    }
}

/// Level-1 and max-level attributes of one phase; `None` without keyframes
fn stats_row(
    registry: &Registry,
    character_id: i64,
    phase_idx: i64,
    phase: &Value,
) -> Result<Option<Row>, RecordError> {
    let frames = array(phase, "attributesKeyFrames");
    let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
        return Ok(None);
    };
    let base = data(first);
    let max = data(last);

    let range_id =
        registry.resolve_optional(EntityKind::Range, text(phase, "rangeId").as_deref())?;

    Ok(Some(
        Row::new()
            .with("character_id", character_id)
            .with("phase", phase_idx)
            .with("max_level", int_or(phase, "maxLevel", 0))
            .with("range_id", range_id)
            .with("base_hp", int_or(base, "maxHp", 0))
            .with("base_atk", int_or(base, "atk", 0))
            .with("base_def", int_or(base, "def", 0))
            .with("max_hp", int_or(max, "maxHp", 0))
            .with("max_atk", int_or(max, "atk", 0))
            .with("max_def", int_or(max, "def", 0))
            .with("magic_resistance", int_or(max, "magicResistance", 0))
            .with("cost", int_or(max, "cost", 0))
            .with("block_count", int_or(max, "blockCnt", 0))
            .with("attack_speed", int_or(max, "attackSpeed", 0))
            .with("respawn_time", int_or(max, "respawnTime", 0)),
    ))
}

fn push_talents(
    batch: &mut BatchBuilder,
    registry: &Registry,
    code: &str,
    character_id: i64,
    record: &Value,
) {
    for (t, talent) in array(record, "talents").iter().enumerate() {
        for (c, candidate) in array(talent, "candidates").iter().enumerate() {
            let (talent_index, candidate_index) = (t as i64 + 1, c as i64 + 1);
            let key = format!("{}/{}/{}", code, talent_index, candidate_index);
            batch.add(
                &key,
                talent_row(registry, character_id, talent_index, candidate_index, candidate),
            );
        }
    }
}

fn talent_row(
    registry: &Registry,
    character_id: i64,
    talent_index: i64,
    candidate_index: i64,
    candidate: &Value,
) -> Result<Row, RecordError> {
    as_object(candidate)?;
    let condition = candidate.get("unlockCondition").unwrap_or(&NULL);
    let range_id =
        registry.resolve_optional(EntityKind::Range, text(candidate, "rangeId").as_deref())?;

    Ok(Row::new()
        .with("character_id", character_id)
        .with("talent_index", talent_index)
        .with("candidate_index", candidate_index)
        .with("unlock_phase", decode_phase(condition.get("phase")))
        .with("unlock_level", int(condition, "level").unwrap_or(1))
        .with("required_potential", int_or(candidate, "requiredPotentialRank", 0))
        .with("range_id", range_id)
        .with(
            "name",
            text(candidate, "name").unwrap_or_else(|| "Unknown Talent".to_string()),
        )
        .with("description", text(candidate, "description"))
        .with("blackboard", json(candidate, "blackboard", "[]")))
}

fn push_potentials(batch: &mut BatchBuilder, code: &str, character_id: i64, record: &Value) {
    for (rank, potential) in array(record, "potentialRanks").iter().enumerate() {
        if !potential.is_object() {
            batch.skip(format!("{}/{}", code, rank), RecordError::NotAnObject);
            continue;
        }
        batch.push(
            Row::new()
                .with("character_id", character_id)
                .with("potential_rank", rank as i64)
                .with("potential_type", text(potential, "type"))
                .with("description", text(potential, "description")),
        );
    }
}

fn push_tags(
    batch: &mut BatchBuilder,
    registry: &Registry,
    code: &str,
    character_id: i64,
    record: &Value,
) {
    let tags = array(record, "tagList")
        .iter()
        .filter_map(Value::as_str)
        .filter(|t| !t.is_empty());

    for tag in tags {
        match registry.resolve(EntityKind::Tag, tag) {
            Ok(tag_id) => batch.push(
                Row::new()
                    .with("character_id", character_id)
                    .with("tag_id", tag_id),
            ),
            Err(e) => batch.skip(format!("{}/{}", code, tag), e),
        }
    }
}

fn push_favor(batch: &mut BatchBuilder, character_id: i64, record: &Value) {
    let Some(last) = array(record, "favorKeyFrames").last() else {
        return;
    };
    let bonus = data(last);

    batch.push(
        Row::new()
            .with("character_id", character_id)
            .with("max_favor_level", MAX_FAVOR_LEVEL)
            .with("bonus_hp", int_or(bonus, "maxHp", 0))
            .with("bonus_atk", int_or(bonus, "atk", 0))
            .with("bonus_def", int_or(bonus, "def", 0)),
    );
}

/// Skill codes stay natural keys here; skills load in a later wave
fn slot_row(character_id: i64, record: &Value) -> Row {
    let mut codes = array(record, "skills")
        .iter()
        .filter(|s| s.is_object())
        .take(SKILL_SLOTS)
        .map(|s| text(s, "skillId"));

    Row::new()
        .with("character_id", character_id)
        .with("phase_0_code", codes.next().flatten())
        .with("phase_1_code", codes.next().flatten())
        .with("phase_2_code", codes.next().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::test_support::{records, registry_with};
    use crate::parser::SqlValue;
    use serde_json::json;

    fn document() -> Records {
        records(json!({
            "char_001": {
                "name": "Alpha",
                "rarity": "TIER_5",
                "profession": "WARRIOR",
                "position": "MELEE",
                "itemDesc": "A guard.",
                "tagList": ["DPS", "Unknown"],
                "phases": [
                    {
                        "maxLevel": 50,
                        "rangeId": "1-1",
                        "attributesKeyFrames": [
                            {"level": 1, "data": {"maxHp": 1000, "atk": 300, "def": 100}},
                            {"level": 50, "data": {"maxHp": 1500, "atk": 450, "def": 150,
                              "magicResistance": 0, "cost": 18, "blockCnt": 2,
                              "attackSpeed": 100, "respawnTime": 70}}
                        ],
                        "evolveCost": null
                    },
                    {
                        "maxLevel": 80,
                        "rangeId": "1-1",
                        "attributesKeyFrames": [],
                        "evolveCost": [{"id": "30011", "count": 5}, {"id": "99999", "count": 1}]
                    }
                ],
                "talents": [
                    {"candidates": [
                        {"unlockCondition": {"phase": "PHASE_1", "level": 1}, "name": "Sharp", "blackboard": [{"key": "atk", "value": 0.1}]},
                        {"unlockCondition": {"phase": 2}, "requiredPotentialRank": 4}
                    ]},
                    null
                ],
                "potentialRanks": [{"type": "BUFF", "description": "Cost -1"}, {"type": 0}],
                "favorKeyFrames": [{"level": 0, "data": {"atk": 0}}, {"level": 50, "data": {"maxHp": 200, "atk": 60}}],
                "skills": [{"skillId": "skchr_001_1"}, "junk", {"skillId": null}]
            },
            "char_002": {"name": "Beta", "rarity": 3, "profession": "GHOST"},
            "char_003": {"name": "Gamma", "isNotObtainable": true},
            "char_004": {"name": "Delta", "rarity": "TIER_2"}
        }))
    }

    fn registry() -> Registry {
        registry_with(&[
            (EntityKind::Profession, "WARRIOR", 1),
            (EntityKind::Range, "1-1", 1),
            (EntityKind::Item, "30011", 11),
            (EntityKind::Tag, "DPS", 1),
            (EntityKind::Character, "char_001", 100),
        ])
    }

    #[test]
    fn test_character_rows() {
        let batch = build_characters(&document(), &registry());

        assert_eq!(batch.len(), 2);
        let alpha = &batch.rows()[0];
        assert_eq!(alpha.get("rarity"), &SqlValue::Integer(4));
        assert_eq!(alpha.get("profession_id"), &SqlValue::Integer(1));
        assert_eq!(alpha.get("description").as_str(), Some("A guard."));

        // Absent profession is NULL, not a skip
        let delta = &batch.rows()[1];
        assert_eq!(delta.get("profession_id"), &SqlValue::Null);
        assert_eq!(delta.get("rarity"), &SqlValue::Integer(1));

        assert!(batch.was_skipped("char_002", "unresolved_reference"));
        assert!(batch.was_skipped("char_003", "filtered"));
    }

    #[test]
    fn test_promotion_costs_drop_unknown_items() {
        let children = build_children(&document(), &registry());
        let costs = children.promotion_costs.rows();

        assert_eq!(costs.len(), 1);
        assert_eq!(costs[0].get("target_phase"), &SqlValue::Integer(1));
        assert_eq!(costs[0].get("item_id"), &SqlValue::Integer(11));
        assert_eq!(costs[0].get("count"), &SqlValue::Integer(5));
        assert!(children
            .promotion_costs
            .was_skipped("char_001/1/99999", "unresolved_reference"));
    }

    #[test]
    fn test_stats_use_first_and_last_keyframe() {
        let children = build_children(&document(), &registry());
        let stats = children.stats.rows();

        // Phase 1 has no keyframes
        assert_eq!(stats.len(), 1);
        let row = &stats[0];
        assert_eq!(row.get("base_hp"), &SqlValue::Integer(1000));
        assert_eq!(row.get("max_hp"), &SqlValue::Integer(1500));
        assert_eq!(row.get("block_count"), &SqlValue::Integer(2));
        assert_eq!(row.get("respawn_time"), &SqlValue::Integer(70));
        assert_eq!(row.get("range_id"), &SqlValue::Integer(1));
    }

    #[test]
    fn test_talents_potentials_favor_and_slots() {
        let children = build_children(&document(), &registry());

        let talents = children.talents.rows();
        assert_eq!(talents.len(), 2);
        assert_eq!(talents[0].get("unlock_phase"), &SqlValue::Integer(1));
        assert_eq!(talents[0].get("name").as_str(), Some("Sharp"));
        assert_eq!(talents[1].get("candidate_index"), &SqlValue::Integer(2));
        assert_eq!(talents[1].get("unlock_level"), &SqlValue::Integer(1));
        assert_eq!(talents[1].get("required_potential"), &SqlValue::Integer(4));
        assert_eq!(talents[1].get("name").as_str(), Some("Unknown Talent"));

        let potentials = children.potentials.rows();
        assert_eq!(potentials.len(), 2);
        assert_eq!(potentials[1].get("potential_type").as_str(), Some("0"));

        let favor = &children.favor.rows()[0];
        assert_eq!(favor.get("max_favor_level"), &SqlValue::Integer(100));
        assert_eq!(favor.get("bonus_hp"), &SqlValue::Integer(200));
        assert_eq!(favor.get("bonus_def"), &SqlValue::Integer(0));

        let slots = &children.slots.rows()[0];
        assert_eq!(slots.get("phase_0_code").as_str(), Some("skchr_001_1"));
        assert_eq!(slots.get("phase_1_code"), &SqlValue::Null);
        assert_eq!(slots.get("phase_2_code"), &SqlValue::Null);

        assert_eq!(children.tags.len(), 1);
        assert!(children
            .tags
            .was_skipped("char_001/Unknown", "unresolved_reference"));
    }

    #[test]
    fn test_children_without_characters_produce_nothing() {
        let registry = registry_with(&[(EntityKind::Item, "30011", 11)]);
        let children = build_children(&document(), &registry);
        assert_eq!(children.total_rows(), 0);
    }
}
