//! Wave 6: stages

use serde_json::Value;

use super::{entries, BatchBuilder, Records};
use crate::error::RecordError;
use crate::parser::record::{as_object, int_or, required_text, text};
use crate::parser::Row;
use crate::registry::{EntityKind, Registry};
use crate::schema::tables::STAGES;

pub fn build_stages(records: &Records, registry: &Registry) -> BatchBuilder {
    let mut batch = BatchBuilder::new(&STAGES);
    for (code, record) in entries(records) {
        batch.add(code, stage_row(code, record, registry));
    }
    batch
}

fn stage_row(code: &str, record: &Value, registry: &Registry) -> Result<Row, RecordError> {
    as_object(record)?;
    let zone = required_text(record, "zoneId")?;
    let zone_id = registry.resolve(EntityKind::Zone, &zone)?;

    Ok(Row::new()
        .with("stage_code", code)
        .with("zone_id", zone_id)
        .with("display_code", required_text(record, "code")?)
        .with("name", text(record, "name"))
        .with("description", text(record, "description"))
        .with("stage_type", text(record, "stageType"))
        .with("ap_cost", int_or(record, "apCost", 0))
        .with("danger_level", text(record, "dangerLevel")))
}
