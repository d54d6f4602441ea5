//! Wave 1: entities that reference nothing

use serde_json::Value;

use super::{entries, BatchBuilder, Records};
use crate::error::RecordError;
use crate::parser::record::{as_object, flag, int, json, required_text, text};
use crate::parser::{decode_rarity, Row};
use crate::schema::tables::{ITEMS, RANGES, ZONES};

pub fn build_ranges(records: &Records) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&RANGES);
    for (code, record) in entries(records) {
        batch.add(code, range_row(code, record));
    }
    batch
}

fn range_row(code: &str, record: &Value) -> Result<Row, RecordError> {
    as_object(record)?;
    Ok(Row::new()
        .with("range_code", code)
        .with("direction", int(record, "direction"))
        .with("grids", json(record, "grids", "[]")))
}

pub fn build_items(records: &Records) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&ITEMS);
    for (code, record) in entries(records) {
        batch.add(code, item_row(code, record));
    }
    batch
}

fn item_row(code: &str, record: &Value) -> Result<Row, RecordError> {
    as_object(record)?;
    if flag(record, "isDeleted") {
        return Err(RecordError::Filtered("isDeleted"));
    }

    Ok(Row::new()
        .with("item_code", code)
        .with("name", required_text(record, "name")?)
        .with("rarity", decode_rarity(record.get("rarity")))
        .with("icon_id", text(record, "iconId"))
        .with("item_type", text(record, "itemType"))
        .with("classify_type", text(record, "classifyType"))
        .with("usage_text", text(record, "usage"))
        .with("description", text(record, "description"))
        .with("obtain_approach", text(record, "obtainApproach")))
}

pub fn build_zones(records: &Records) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&ZONES);
    for (code, record) in entries(records) {
        batch.add(code, zone_row(code, record));
    }
    batch
}

fn zone_row(code: &str, record: &Value) -> Result<Row, RecordError> {
    as_object(record)?;

    // Second name is the descriptive one ("Evil Time Part 1")
    let name = text(record, "zoneNameSecond")
        .or_else(|| text(record, "zoneNameFirst"))
        .unwrap_or_else(|| code.to_string());

    Ok(Row::new()
        .with("zone_code", code)
        .with("name", name)
        .with("zone_type", text(record, "type"))
        .with("zone_index", int(record, "zoneIndex")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::test_support::records;
    use crate::parser::SqlValue;
    use serde_json::json;

    #[test]
    fn test_items_decode_rarity_and_filter_deleted() {
        let batch = build_items(&records(json!({
            "30011": {"name": "Orirock", "rarity": "TIER_3", "iconId": "MTL_SL_G1"},
            "30012": {"name": "Old", "rarity": 1, "isDeleted": true},
            "30013": {"rarity": 2},
        })));

        assert_eq!(batch.len(), 1);
        let row = &batch.rows()[0];
        assert_eq!(row.get("rarity"), &SqlValue::Integer(2));
        assert_eq!(row.get("icon_id"), &SqlValue::Text("MTL_SL_G1".into()));
        assert!(batch.was_skipped("30012", "filtered"));
        assert!(batch.was_skipped("30013", "missing_field"));
    }

    #[test]
    fn test_zone_name_fallbacks() {
        let batch = build_zones(&records(json!({
            "main_0": {"zoneNameFirst": "Prologue", "zoneNameSecond": "Evil Time", "type": "MAINLINE", "zoneIndex": 0},
            "main_1": {"zoneNameFirst": "Episode 1", "zoneNameSecond": null},
            "camp_1": {},
        })));

        let names: Vec<_> = batch
            .rows()
            .iter()
            .map(|r| r.get("name").as_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"Evil Time".to_string()));
        assert!(names.contains(&"Episode 1".to_string()));
        assert!(names.contains(&"camp_1".to_string()));
    }

    #[test]
    fn test_ranges_keep_grids_as_json() {
        let batch = build_ranges(&records(json!({
            "1-1": {"id": "1-1", "direction": 1, "grids": [{"row": 0, "col": 1}]},
            "0-1": {"direction": 1},
            "broken": 42,
        })));

        assert_eq!(batch.len(), 2);
        assert!(batch.was_skipped("broken", "not_an_object"));
        let empty = batch
            .rows()
            .iter()
            .find(|r| r.get("range_code").as_str() == Some("0-1"))
            .unwrap();
        assert_eq!(empty.get("grids").as_str(), Some("[]"));
    }
}
