// Per-provider state machine
//
// Providers move through the fixed step order and end each pass either
// approved or stuck. Guards live on the step handlers (see `orchestration::StepHandler`).

pub mod states;

pub use states::{PipelineStep, ProviderState};
