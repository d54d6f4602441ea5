//! Runs the loaders against a store, one transaction per stage.
//!
//! Order of operations: schema, registry seed, every selected loader in
//! dependency order, then validation. A stage whose document is unavailable is
//! skipped; a store failure rolls the stage back and stops the run.

use std::collections::BTreeSet;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::StoreError;
use crate::loaders::{Loader, Records, StageContext};
use crate::registry::Registry;
use crate::report::{RunStatus, RunSummary, StageReport, StageStatus};
use crate::source::{SourceDoc, SourceProvider, SourceSet};
use crate::ui::{Phase, Ui};
use crate::validate::validate;
use crate::writer::Store;

/// Documents the given loaders read, each once
pub fn required_sources(loaders: &[Loader]) -> Vec<SourceDoc> {
    loaders
        .iter()
        .map(|l| l.source())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fetch what `config` needs from `provider`, then [`run`]
pub fn sync(
    store: &mut Store,
    provider: &dyn SourceProvider,
    config: &PipelineConfig,
    ui: &mut impl Ui,
) -> RunSummary {
    ui.set_phase(Phase::Fetching);
    let docs = required_sources(&config.loaders);
    ui.set_progress(0, docs.len() as u64, "documents");
    let sources = SourceSet::collect(&provider, &docs);
    ui.set_progress(docs.len() as u64, docs.len() as u64, "documents");
    ui.log(format!(
        "{} of {} source documents available",
        sources.available(),
        docs.len()
    ));

    run(store, &sources, config, ui)
}

pub fn run(
    store: &mut Store,
    sources: &SourceSet,
    config: &PipelineConfig,
    ui: &mut impl Ui,
) -> RunSummary {
    let mut summary = RunSummary {
        status: RunStatus::Success,
        stages: Vec::new(),
        validation: None,
        error: None,
    };

    let mut registry = Registry::new();
    if let Err(e) = prepare(store, &mut registry) {
        error!(error = %e, "could not prepare the store");
        summary.status = RunStatus::Aborted;
        summary.error = Some(e.to_string());
        return summary;
    }

    ui.set_phase(Phase::Loading);
    let loaders: Vec<Loader> = Loader::ALL
        .into_iter()
        .filter(|l| config.loaders.contains(l))
        .collect();
    let total = loaders.len() as u64;

    for (i, loader) in loaders.into_iter().enumerate() {
        ui.set_progress(i as u64, total, loader.name());

        let Some(records) = sources.get(loader.source()) else {
            let why = sources.unavailable(loader.source()).unwrap_or("not fetched");
            warn!(stage = %loader, source = %loader.source(), reason = why, "skipping stage");
            summary
                .stages
                .push(StageReport::skipped(loader.name(), "source unavailable"));
            continue;
        };

        match run_stage(store, &mut registry, loader, records) {
            Ok(report) => {
                registry.commit();
                info!(
                    stage = %loader,
                    written = report.total_written(),
                    skipped = report.total_skipped(),
                    "stage committed"
                );
                ui.log(format!(
                    "{}: {} rows written, {} skipped",
                    loader,
                    report.total_written(),
                    report.total_skipped()
                ));
                summary.stages.push(report);
            }
            Err(e) => {
                registry.discard();
                error!(stage = %loader, error = %e, "stage rolled back, aborting run");

                let mut report = StageReport::new(loader.name());
                report.status = StageStatus::Failed(e.to_string());
                summary.stages.push(report);
                summary.status = RunStatus::Aborted;
                summary.error = Some(format!("stage `{}` failed: {}", loader, e));
                break;
            }
        }
    }
    ui.clear_progress();

    if summary.status != RunStatus::Aborted && config.validate {
        ui.set_phase(Phase::Validating);
        match validate(store.connection()) {
            Ok(report) => {
                if !report.passed() {
                    summary.status = RunStatus::ValidationFailed;
                }
                summary.validation = Some(report);
            }
            Err(e) => {
                error!(error = %e, "validation could not run");
                summary.status = RunStatus::Aborted;
                summary.error = Some(e.to_string());
            }
        }
    }

    ui.set_phase(Phase::Complete);
    summary
}

fn prepare(store: &Store, registry: &mut Registry) -> Result<(), StoreError> {
    store.ensure_schema()?;
    let seeded = registry.seed(store.connection())?;
    info!(keys = seeded, "registry seeded from store");
    Ok(())
}

/// One loader inside one transaction. Returning early drops the transaction,
/// which rolls it back.
fn run_stage(
    store: &mut Store,
    registry: &mut Registry,
    loader: Loader,
    records: &Records,
) -> Result<StageReport, StoreError> {
    let tx = store.transaction()?;
    let mut ctx = StageContext::new(&tx, registry, loader.name());
    loader.load(records, &mut ctx)?;
    let report = ctx.finish();
    tx.commit()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;
    use crate::ui::SilentUi;
    use serde_json::json;

    #[test]
    fn test_required_sources_are_unique() {
        let docs = required_sources(&[Loader::Taxonomy, Loader::Characters, Loader::Items]);
        assert_eq!(docs, [SourceDoc::ItemTable, SourceDoc::CharacterTable]);
    }

    #[test]
    fn test_missing_sources_skip_stages() {
        let mut store = Store::open_in_memory().unwrap();
        let source = StaticSource::new().with(
            SourceDoc::ItemTable,
            json!({"items": {"30011": {"name": "Orirock", "rarity": "TIER_1"}}}),
        );

        let summary = sync(&mut store, &source, &PipelineConfig::default(), &mut SilentUi);

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.stage("items").unwrap().status, StageStatus::Committed);
        assert!(matches!(
            summary.stage("characters").unwrap().status,
            StageStatus::Skipped(_)
        ));
        assert_eq!(store.row_count("items").unwrap(), 1);
    }

    #[test]
    fn test_store_failure_aborts_and_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        // A trigger that rejects one zone makes the zones stage fail mid-way
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_zone BEFORE INSERT ON zones
                 WHEN NEW.zone_code = 'bad' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let source = StaticSource::new()
            .with(
                SourceDoc::ZoneTable,
                json!({"zones": {"bad": {}, "main_0": {"zoneNameFirst": "Prologue"}}}),
            )
            .with(
                SourceDoc::StageTable,
                json!({"stages": {"main_00-01": {"zoneId": "main_0", "code": "0-1"}}}),
            );

        let summary = sync(&mut store, &source, &PipelineConfig::default(), &mut SilentUi);

        assert_eq!(summary.status, RunStatus::Aborted);
        assert!(matches!(
            summary.stage("zones").unwrap().status,
            StageStatus::Failed(_)
        ));
        assert!(summary.stage("stages").is_none());
        assert!(summary.validation.is_none());
        assert_eq!(store.row_count("zones").unwrap(), 0);
    }
}
