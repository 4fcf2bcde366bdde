//! Reporting, evaluation and snapshot extensions for the [`Trainer`](crate::trainer::Trainer).

mod confusion_matrix;
mod dump_graph;
mod log_report;
mod plot_report;
mod print_report;
mod progress_bar;
mod snapshot;

pub use confusion_matrix::{ConfusionMatrix, ConfusionMatrixEvaluator, EpochConfusion};
pub use dump_graph::{DumpGraph, render_dot};
pub use log_report::LogReport;
pub use plot_report::PlotReport;
pub use print_report::{PrintReport, format_value};
pub use progress_bar::ProgressBar;
pub use snapshot::Snapshot;
