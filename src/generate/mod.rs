pub mod orchestrator;

pub use orchestrator::ClipOrchestrator;
