use crate::error::{TrainingError, TrainingResult};
use crate::trainer::{Extension, PRIORITY_READER, TrainContext, Trigger};
use indicatif::ProgressStyle;

/// Terminal progress bar over the total number of training iterations.
pub struct ProgressBar {
    update_interval: u64,
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    #[must_use]
    pub fn new(update_interval: u64) -> Self {
        Self { update_interval: update_interval.max(1), bar: None }
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Extension for ProgressBar {
    fn name(&self) -> &str {
        "ProgressBar"
    }

    fn trigger(&self) -> Trigger {
        Trigger::iterations(self.update_interval)
    }

    fn priority(&self) -> i32 {
        PRIORITY_READER - 1
    }

    fn initialize(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        let total = ctx.max_epochs.saturating_mul(ctx.updater.iterations_per_epoch());
        let bar = indicatif::ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} iter {msg} ({per_sec})")
                .map_err(|e| TrainingError::extension("ProgressBar", e))?
                .progress_chars("#>-"),
        );
        bar.set_position(ctx.state.iteration);
        bar.set_message(format!("epoch {:.2}", ctx.state.epoch_detail));
        self.bar = Some(bar);
        Ok(())
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        if let Some(bar) = &self.bar {
            bar.set_position(ctx.state.iteration);
            bar.set_message(format!("epoch {:.2}", ctx.state.epoch_detail));
        }
        Ok(())
    }

    fn finalize(&mut self, _ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
        Ok(())
    }
}
