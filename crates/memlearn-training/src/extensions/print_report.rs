use crate::error::{TrainingError, TrainingResult};
use crate::trainer::{Extension, LogEntry, TrainContext, Trigger};
use std::io::Write;

/// Format like C's `%g`: six significant digits, trailing zeros removed.
#[must_use]
pub fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&exponent) {
        let formatted = format!("{value:.5e}");
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_zeros(mantissa), exp.abs());
    }
    let decimals = (5 - exponent).max(0) as usize;
    trim_zeros(&format!("{value:.decimals$}")).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') { s.trim_end_matches('0').trim_end_matches('.') } else { s }
}

/// Prints selected log columns, one row per new log entry.
pub struct PrintReport {
    columns: Vec<String>,
    widths: Vec<usize>,
    header_printed: bool,
    printed: usize,
}

impl PrintReport {
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let widths = columns.iter().map(|c| c.len().max(10)).collect();
        Self { columns, widths, header_printed: false, printed: 0 }
    }

    #[must_use]
    pub fn header(&self) -> String {
        let cells: Vec<String> = self.columns.iter().zip(&self.widths).map(|(c, &w)| format!("{c:<w$}")).collect();
        cells.join("  ").trim_end().to_string()
    }

    /// One row; missing columns are left blank.
    #[must_use]
    pub fn row(&self, entry: &LogEntry) -> String {
        let mut line = String::new();
        for (column, &width) in self.columns.iter().zip(&self.widths) {
            match entry.get(column) {
                Some(value) => line.push_str(&format!("{:<width$}  ", format_value(value))),
                None => line.push_str(&" ".repeat(width + 2)),
            }
        }
        line.trim_end().to_string()
    }
}

impl Extension for PrintReport {
    fn name(&self) -> &str {
        "PrintReport"
    }

    fn trigger(&self) -> Trigger {
        Trigger::epochs(1)
    }

    fn initialize(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        self.printed = ctx.state.log.len();
        Ok(())
    }

    fn on_trigger(&mut self, ctx: &mut TrainContext<'_>) -> TrainingResult<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let write_err = |e: std::io::Error| TrainingError::extension("PrintReport", e);

        if !self.header_printed {
            writeln!(out, "{}", self.header()).map_err(write_err)?;
            self.header_printed = true;
        }
        for entry in &ctx.state.log[self.printed.min(ctx.state.log.len())..] {
            writeln!(out, "{}", self.row(entry)).map_err(write_err)?;
        }
        self.printed = ctx.state.log.len();
        out.flush().map_err(write_err)
    }
}
