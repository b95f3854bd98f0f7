pub mod accumulator;
pub mod controller;

pub use accumulator::ResponseAccumulator;
pub use controller::{AnalysisController, RunHandle, RunOutcome, StartOutcome};
