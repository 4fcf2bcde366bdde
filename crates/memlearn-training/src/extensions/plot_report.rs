use crate::error::TrainingResult;
use crate::trainer::{Extension, LogEntry, TrainContext, Trigger};
use std::path::Path;

/// Plots log columns against epoch into a PNG under the output directory.
///
/// Drawing needs the `plot` feature; without it the extension only logs that
/// it is inactive, and drivers should check [`PlotReport::available`] first.
pub struct PlotReport {
    name: String,
    keys: Vec<String>,
    file_name: String,
}

impl PlotReport {
    #[must_use]
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            name: format!("PlotReport({file_name})"),
            keys: keys.into_iter().map(Into::into).collect(),
            file_name,
        }
    }

    /// Whether plotting support is compiled in.
    #[must_use]
    pub const fn available() -> bool {
        cfg!(feature = "plot")
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Points `(epoch, value)` for every log entry that has `key`.
    #[cfg_attr(not(feature = "plot"), allow(dead_code))]
    fn series(log: &[LogEntry], key: &str) -> Vec<(f64, f64)> {
        log.iter().filter_map(|e| e.get(key).map(|v| (e.epoch as f64, v))).collect()
    }
}

#[cfg(feature = "plot")]
fn draw(path: &Path, keys: &[String], log: &[LogEntry]) -> TrainingResult<()> {
    use crate::error::TrainingError;
    use plotters::prelude::*;

    let err = |e: &dyn std::fmt::Display| TrainingError::extension("PlotReport", e);

    let series: Vec<(&String, Vec<(f64, f64)>)> =
        keys.iter().map(|k| (k, PlotReport::series(log, k))).filter(|(_, s)| !s.is_empty()).collect();
    if series.is_empty() {
        return Ok(());
    }

    let x_max = series.iter().flat_map(|(_, s)| s.iter().map(|p| p.0)).fold(1.0_f64, f64::max);
    let (mut y_min, mut y_max) = series
        .iter()
        .flat_map(|(_, s)| s.iter().map(|p| p.1))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((y_max - y_min) * 0.05).max(1e-3);
    y_min -= pad;
    y_max += pad;

    let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(&e))?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)
        .map_err(|e| err(&e))?;
    chart.configure_mesh().x_desc("epoch").draw().map_err(|e| err(&e))?;

    for (i, (key, points)) in series.into_iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(|e| err(&e))?
            .label(key.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| err(&e))?;
    root.present().map_err(|e| err(&e))?;
    Ok(())
}

#[cfg(not(feature = "plot"))]
fn draw(path: &Path, _keys: &[String], _log: &[LogEntry]) -> TrainingResult<()> {
    tracing::debug!(path = %path.display(), "plot support not compiled in, skipping");
    Ok(())
}

impl Extension for PlotReport {
    fn name(&self) -> &str {
        &self.name
    }

    fn trigger(&self) -> Trigger {
        Trigger::epochs(1)
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        draw(&ctx.layout.plot_path(&self.file_name), &self.keys, &ctx.state.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entry(epoch: u64, loss: Option<f64>) -> LogEntry {
        let mut values = BTreeMap::new();
        if let Some(loss) = loss {
            values.insert("main/loss".to_string(), loss);
        }
        LogEntry { epoch, iteration: epoch * 4, elapsed_time: 0.0, values }
    }

    #[test]
    fn test_series_skips_missing_values() {
        let log = vec![entry(1, Some(0.9)), entry(2, None), entry(3, Some(0.4))];
        assert_eq!(PlotReport::series(&log, "main/loss"), vec![(1.0, 0.9), (3.0, 0.4)]);
    }

    #[test]
    fn test_name_includes_file() {
        let report = PlotReport::new(["main/loss", "validation/main/loss"], "loss.png");
        assert_eq!(report.name(), "PlotReport(loss.png)");
        assert_eq!(report.keys().len(), 2);
        assert_eq!(PlotReport::available(), cfg!(feature = "plot"));
    }
}
