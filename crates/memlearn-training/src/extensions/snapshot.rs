use crate::error::TrainingResult;
use crate::trainer::{Extension, PRIORITY_SNAPSHOT, TrainContext, Trigger};

/// Requests a `snapshot_iter_<iteration>` directory on every trigger.
pub struct Snapshot {
    trigger: Trigger,
}

impl Snapshot {
    #[must_use]
    pub fn new(trigger: Trigger) -> Self {
        Self { trigger }
    }

    /// Every `frequency` epochs, or every epoch when `frequency` is not positive.
    #[must_use]
    pub fn every(frequency: i64) -> Self {
        let period = u64::try_from(frequency).ok().filter(|&f| f > 0).unwrap_or(1);
        Self::new(Trigger::epochs(period))
    }
}

impl Extension for Snapshot {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn trigger(&self) -> Trigger {
        self.trigger
    }

    fn priority(&self) -> i32 {
        PRIORITY_SNAPSHOT
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        tracing::info!(epoch = ctx.state.epoch, iteration = ctx.state.iteration, "taking snapshot");
        ctx.request_snapshot();
        Ok(())
    }
}
