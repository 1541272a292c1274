//! Screening: threshold rules, the run engine, and the CSV report.

pub mod engine;
pub mod report;
pub mod rules;

pub use engine::{ScreenEngine, ScreenRun, ScreenSide, ScreeningResult};
pub use report::{Column, ReportWriter};
pub use rules::{Dimension, DimensionVerdicts, Verdict};
