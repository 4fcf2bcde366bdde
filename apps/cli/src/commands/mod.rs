pub mod datasets;
pub mod train;
