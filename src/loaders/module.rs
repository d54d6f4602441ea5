//! Wave 5: modules and their unlock costs

use serde_json::Value;

use super::{entries, push_costs, BatchBuilder, Records, StageContext};
use crate::error::{RecordError, StoreError};
use crate::parser::record::{as_object, required_text, text};
use crate::parser::Row;
use crate::registry::{EntityKind, Registry};
use crate::schema::tables::{MODULES, MODULE_COSTS};

pub fn load(records: &Records, ctx: &mut StageContext<'_>) -> Result<(), StoreError> {
    let modules = build_modules(records, ctx.registry);
    ctx.write(modules)?;
    let costs = build_module_costs(records, ctx.registry);
    ctx.write(costs)?;
    Ok(())
}

pub fn build_modules(records: &Records, registry: &Registry) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&MODULES);
    for (code, record) in entries(records) {
        batch.add(code, module_row(code, record, registry));
    }
    batch
}

fn module_row(code: &str, record: &Value, registry: &Registry) -> Result<Row, RecordError> {
    as_object(record)?;
    let owner = required_text(record, "charId")?;
    let character_id = registry.resolve(EntityKind::Character, &owner)?;

    Ok(Row::new()
        .with("module_code", code)
        .with("character_id", character_id)
        .with("name", required_text(record, "uniEquipName")?)
        .with("icon_id", text(record, "uniEquipIcon"))
        .with("type_name", text(record, "typeName1"))
        .with("description", text(record, "uniEquipDesc")))
}

/// `itemCost` maps a module level ("1", "2", ...) to its cost list
pub fn build_module_costs(records: &Records, registry: &Registry) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&MODULE_COSTS);

    for (code, record) in entries(records) {
        let Some(module_id) = registry.lookup(EntityKind::Module, code) else {
            continue;
        };
        let Some(levels) = record.get("itemCost").and_then(Value::as_object) else {
            continue;
        };

        for (level_key, costs) in levels {
            let Ok(level) = level_key.trim().parse::<i64>() else {
                batch.skip(
                    format!("{}/{}", code, level_key),
                    RecordError::Malformed {
                        field: "itemCost",
                        detail: format!("level `{}` is not a number", level_key),
                    },
                );
                continue;
            };

            let costs = costs.as_array().map(Vec::as_slice).unwrap_or(&[]);
            push_costs(
                &mut batch,
                registry,
                &format!("{}/{}", code, level),
                costs,
                || {
                    Row::new()
                        .with("module_id", module_id)
                        .with("level", level)
                },
            );
        }
    }

    batch
}
