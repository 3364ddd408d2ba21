//! Progress reporting with indicatif progress bars

use eternity_flash::{Phase, Progress};
use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar style for a phase
fn create_progress_bar_style(phase: Phase) -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    let unit = match phase {
        Phase::Erase => "sectors",
        Phase::Write | Phase::Read => "pages",
    };
    Ok(ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {} {{msg}}",
            unit, phase
        ))?
        .progress_chars("#>-"))
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { current_bar: None }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for IndicatifProgress {
    fn begin(&mut self, phase: Phase, units_total: usize) {
        let pb = ProgressBar::new(units_total as u64);
        pb.set_style(
            create_progress_bar_style(phase).unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        if let Some(old) = self.current_bar.replace(pb) {
            old.abandon();
        }
    }

    fn on_progress(
        &mut self,
        _phase: Phase,
        units_done: usize,
        _units_total: usize,
        throughput: f64,
    ) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(units_done as u64);
            pb.set_message(format!("Speed: {:.2} KB/s", throughput / 1024.0));
        }
    }

    fn finish(&mut self, _phase: Phase) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish();
        }
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        // Leave a failed phase's bar where it stopped
        if let Some(pb) = self.current_bar.take() {
            pb.abandon();
        }
    }
}
