//! Progress reporting for consensus runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use verity_application::{ProgressNotifier, Stage};
use verity_domain::ProviderId;

/// Reports progress with an `indicatif` bar per stage
pub struct ProgressReporter {
    stage_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            stage_bar: Mutex::new(None),
        }
    }

    fn stage_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn stage_display_name(stage: Stage) -> &'static str {
        match stage {
            Stage::Dispatch => "Querying providers",
            Stage::Extraction => "Extracting facts",
            Stage::Validation => "Checking web evidence",
            Stage::Integration => "Building consensus",
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_stage_start(&self, stage: Stage, total_tasks: usize) {
        let pb = ProgressBar::new(total_tasks as u64);
        pb.set_style(Self::stage_style());
        pb.set_prefix(Self::stage_display_name(stage));
        pb.set_message("Starting...");

        if let Some(previous) = self.stage_bar.lock().replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn on_provider_complete(&self, provider: &ProviderId, success: bool) {
        if let Some(pb) = self.stage_bar.lock().as_ref() {
            let status = if success {
                format!("{} {}", "v".green(), provider)
            } else {
                format!("{} {}", "x".red(), provider)
            };
            pb.set_message(status);
            pb.inc(1);
        }
    }

    fn on_stage_complete(&self, stage: Stage) {
        if let Some(pb) = self.stage_bar.lock().take() {
            pb.set_position(pb.length().unwrap_or(0));
            pb.finish_with_message(format!("{} done", stage.as_str().green()));
        }
    }
}

/// Plain text progress on stderr (no bars)
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_stage_start(&self, stage: Stage, total_tasks: usize) {
        eprintln!(
            "{} {} ({} tasks)",
            "->".cyan(),
            ProgressReporter::stage_display_name(stage).bold(),
            total_tasks
        );
    }

    fn on_provider_complete(&self, provider: &ProviderId, success: bool) {
        if success {
            eprintln!("  {} {}", "v".green(), provider);
        } else {
            eprintln!("  {} {} (failed)", "x".red(), provider);
        }
    }

    fn on_stage_complete(&self, _stage: Stage) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_tracks_one_bar_per_stage() {
        let reporter = ProgressReporter::new();
        let alpha: ProviderId = "alpha".parse().unwrap();

        reporter.on_stage_start(Stage::Dispatch, 2);
        reporter.on_provider_complete(&alpha, true);
        assert_eq!(
            reporter.stage_bar.lock().as_ref().map(|pb| pb.position()),
            Some(1)
        );

        reporter.on_stage_complete(Stage::Dispatch);
        assert!(reporter.stage_bar.lock().is_none());

        // completion outside a stage is ignored
        reporter.on_provider_complete(&alpha, false);
    }
}
