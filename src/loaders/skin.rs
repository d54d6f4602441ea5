//! Wave 4: skins, their series and their display text

use serde_json::Value;
use std::collections::BTreeSet;

use super::{entries, BatchBuilder, Records, StageContext};
use crate::error::{RecordError, StoreError};
use crate::parser::record::{array, as_object, required_text, text};
use crate::parser::Row;
use crate::registry::{EntityKind, Registry};
use crate::schema::tables::{CHARACTER_SKINS, CHARACTER_SKIN_DETAILS};

static NULL: Value = Value::Null;

pub fn load(records: &Records, ctx: &mut StageContext<'_>) -> Result<(), StoreError> {
    for group in scan_groups(records) {
        ctx.ensure(EntityKind::SkinGroup, &group, |name| {
            Row::new().with("group_name", name)
        })?;
    }

    let skins = build_skins(records, ctx.registry);
    ctx.write(skins)?;
    let details = build_skin_details(records, ctx.registry);
    ctx.write(details)?;
    Ok(())
}

fn display(record: &Value) -> &Value {
    record.get("displaySkin").unwrap_or(&NULL)
}

/// Distinct `displaySkin.skinGroupName` values
pub fn scan_groups(records: &Records) -> BTreeSet<String> {
    entries(records)
        .filter_map(|(_, record)| text(display(record), "skinGroupName"))
        .collect()
}

pub fn build_skins(records: &Records, registry: &Registry) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&CHARACTER_SKINS);
    for (code, record) in entries(records) {
        batch.add(code, skin_row(code, record, registry));
    }
    batch
}

fn skin_row(code: &str, record: &Value, registry: &Registry) -> Result<Row, RecordError> {
    as_object(record)?;
    let owner = required_text(record, "charId")?;
    let character_id = registry.resolve(EntityKind::Character, &owner)?;
    let shown = display(record);

    Ok(Row::new()
        .with("skin_code", code)
        .with("character_id", character_id)
        .with("name", text(shown, "skinName"))
        .with("series_name", text(shown, "skinGroupName"))
        .with(
            "illustrator",
            array(shown, "drawerList").first().and_then(Value::as_str),
        )
        .with("portrait_id", text(record, "portraitId"))
        .with("avatar_id", text(record, "avatarId")))
}

/// One row per skin written in this stage or an earlier run
pub fn build_skin_details(records: &Records, registry: &Registry) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&CHARACTER_SKIN_DETAILS);

    for (code, record) in entries(records) {
        let Some(skin_id) = registry.lookup(EntityKind::Skin, code) else {
            continue;
        };
        let shown = display(record);
        let group_id = match registry
            .resolve_optional(EntityKind::SkinGroup, text(shown, "skinGroupName").as_deref())
        {
            Ok(id) => id,
            Err(e) => {
                batch.skip(code, e);
                continue;
            }
        };

        batch.push(
            Row::new()
                .with("skin_id", skin_id)
                .with("skin_group_id", group_id)
                .with("content", text(shown, "content"))
                .with("dialog", text(shown, "dialog"))
                .with("description", text(shown, "description"))
                .with("usage_text", text(shown, "usage")),
        );
    }

    batch
}
