//! Progress reporting for the terminal
//!
//! Provides a simple API for displaying run state:
//! - Current phase (Fetching, Loading, Validating)
//! - Progress (current/total with a label)
//! - One-line log messages printed above the bar

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;

/// Run phases shown as the progress bar prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Loading,
    Validating,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Fetching => write!(f, "Fetching sources"),
            Phase::Loading => write!(f, "Loading"),
            Phase::Validating => write!(f, "Validating"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Trait for UI implementations - allows both a progress bar and silent/test modes
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);
}

/// Single progress bar on stderr
pub struct ProgressUi {
    bar: ProgressBar,
}

impl ProgressUi {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.set_style(Self::style());
        Self { bar }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:18} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    pub fn finish(self, summary: &str) {
        self.bar.set_prefix(Phase::Complete.to_string());
        self.bar.finish_and_clear();
        if !summary.is_empty() {
            eprintln!("{}", summary);
        }
    }
}

impl Default for ProgressUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui for ProgressUi {
    fn set_phase(&mut self, phase: Phase) {
        self.bar.set_prefix(phase.to_string());
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        self.bar.set_length(total);
        self.bar.set_position(current);
        self.bar.set_message(label.into());
    }

    fn clear_progress(&mut self) {
        self.bar.set_position(0);
        self.bar.set_length(0);
        self.bar.set_message("");
    }

    fn log(&mut self, message: impl Into<String>) {
        self.bar.println(message.into());
    }
}

/// Silent UI implementation for testing and non-interactive use
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}
}
