pub mod canary;
pub mod config;
pub mod correlation;
pub mod error;
pub mod execution_router;
pub mod model;
pub mod pipeline;
pub mod position_sizer;
pub mod regime;
pub mod runtime;
pub mod strategy;
pub mod strategy_router;
