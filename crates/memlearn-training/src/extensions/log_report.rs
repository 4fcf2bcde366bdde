use crate::error::TrainingResult;
use crate::trainer::{Extension, LogEntry, TrainContext, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Summary {
    sum: f64,
    count: u64,
}

/// Averages observations over each interval and appends them to the trainer log.
///
/// Runs every iteration to accumulate; emits an entry when its interval
/// trigger fires and rewrites `<out>/log` as a JSON array.
pub struct LogReport {
    interval: Trigger,
    summaries: BTreeMap<String, Summary>,
}

impl LogReport {
    #[must_use]
    pub fn new(interval: Trigger) -> Self {
        Self { interval, summaries: BTreeMap::new() }
    }

    fn accumulate(&mut self, observation: &BTreeMap<String, f64>) {
        for (key, &value) in observation {
            let summary = self.summaries.entry(key.clone()).or_default();
            summary.sum += value;
            summary.count += 1;
        }
    }

    fn take_means(&mut self) -> BTreeMap<String, f64> {
        std::mem::take(&mut self.summaries)
            .into_iter()
            .filter(|(_, s)| s.count > 0)
            .map(|(k, s)| (k, s.sum / s.count as f64))
            .collect()
    }
}

impl Default for LogReport {
    fn default() -> Self {
        Self::new(Trigger::epochs(1))
    }
}

impl Extension for LogReport {
    fn name(&self) -> &str {
        "LogReport"
    }

    fn trigger(&self) -> Trigger {
        Trigger::iterations(1)
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        self.accumulate(&ctx.state.observation);
        if !self.interval.fires(ctx.state) {
            return Ok(());
        }

        let entry = LogEntry {
            epoch: ctx.state.epoch,
            iteration: ctx.state.iteration,
            elapsed_time: ctx.state.elapsed_time,
            values: self.take_means(),
        };
        ctx.state.log.push(entry);
        std::fs::write(ctx.layout.log_path(), serde_json::to_string_pretty(&ctx.state.log)?)?;
        Ok(())
    }

    fn state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.summaries).ok()
    }

    fn restore(&mut self, state: serde_json::Value) -> TrainingResult<()> {
        self.summaries = serde_json::from_value(state)?;
        Ok(())
    }
}
