//! What a run did, in a form both humans and scripts can read

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::RecordError;
use crate::validate::ValidationReport;

/// Skipped-record samples kept per stage; the counts stay exact
const MAX_SAMPLES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum StageStatus {
    Committed,
    /// The documents the stage reads were unavailable or empty
    Skipped(String),
    /// The stage transaction was rolled back
    Failed(String),
}

/// One record (or nested entry) that did not make it into the store
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub table: &'static str,
    pub key: String,
    pub category: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub status: StageStatus,
    /// Rows inserted or updated, per table
    pub rows_written: BTreeMap<&'static str, usize>,
    /// Skip counts per category
    pub skipped: BTreeMap<&'static str, usize>,
    pub samples: Vec<SkippedRecord>,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            status: StageStatus::Committed,
            rows_written: BTreeMap::new(),
            skipped: BTreeMap::new(),
            samples: Vec::new(),
        }
    }

    pub fn skipped(stage: &'static str, reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped(reason.into()),
            ..Self::new(stage)
        }
    }

    pub fn record_skip(&mut self, table: &'static str, key: String, error: &RecordError) {
        *self.skipped.entry(error.category()).or_insert(0) += 1;

        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(SkippedRecord {
                table,
                key,
                category: error.category(),
                reason: error.to_string(),
            });
        }
    }

    pub fn record_written(&mut self, table: &'static str, rows: usize) {
        *self.rows_written.entry(table).or_insert(0) += rows;
    }

    pub fn total_written(&self) -> usize {
        self.rows_written.values().sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Whether any sample for `key` was skipped with `category`
    pub fn has_skip(&self, key: &str, category: &str) -> bool {
        self.samples
            .iter()
            .any(|s| s.key == key && s.category == category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    ValidationFailed,
    Aborted,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Aborted => 1,
            RunStatus::ValidationFailed => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub stages: Vec<StageReport>,
    /// Absent when the run aborted before validation
    pub validation: Option<ValidationReport>,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn rows_written(&self) -> usize {
        self.stages.iter().map(StageReport::total_written).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stages:")?;
        for stage in &self.stages {
            let state = match &stage.status {
                StageStatus::Committed => "committed".to_string(),
                StageStatus::Skipped(why) => format!("skipped ({})", why),
                StageStatus::Failed(why) => format!("FAILED ({})", why),
            };
            writeln!(
                f,
                "  {:<12} {:<24} {:>7} written {:>5} skipped",
                stage.stage,
                state,
                stage.total_written(),
                stage.total_skipped()
            )?;

            for (category, count) in &stage.skipped {
                writeln!(f, "      {:<22} {}", category, count)?;
            }
        }

        if let Some(validation) = &self.validation {
            write!(f, "{}", validation)?;
        }

        if let Some(error) = &self.error {
            writeln!(f, "Error: {}", error)?;
        }

        write!(f, "Status: {:?}", self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EntityKind;

    #[test]
    fn test_skips_are_counted_past_the_sample_cap() {
        let mut report = StageReport::new("items");
        for i in 0..(MAX_SAMPLES + 5) {
            report.record_skip("items", i.to_string(), &RecordError::MissingField("name"));
        }
        report.record_skip(
            "character_promotion_costs",
            "char_001/99999".into(),
            &RecordError::unresolved(EntityKind::Item, "99999"),
        );

        assert_eq!(report.total_skipped(), MAX_SAMPLES + 6);
        assert_eq!(report.skipped["missing_field"], MAX_SAMPLES + 5);
        assert_eq!(report.samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::Aborted.exit_code(), 1);
        assert_eq!(RunStatus::ValidationFailed.exit_code(), 2);
    }

    #[test]
    fn test_summary_serializes_stage_status() {
        let summary = RunSummary {
            status: RunStatus::Success,
            stages: vec![StageReport::skipped("stages", "source unavailable")],
            validation: None,
            error: None,
        };
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["stages"][0]["status"]["state"], "skipped");
        assert_eq!(json["stages"][0]["status"]["detail"], "source unavailable");
    }
}
