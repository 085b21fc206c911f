pub mod registry;

pub use registry::{PipelineWorkerRegistry, TickEvent};
