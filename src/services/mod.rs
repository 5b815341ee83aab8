//! Service layer: the three engines, composed from domain ports.

pub mod adaptive_loop;
pub mod evolution_engine;
pub mod redo_loop;

pub use adaptive_loop::{AdaptiveRedoLoop, AdaptiveRedoResult};
pub use evolution_engine::{EvolutionEngine, EvolutionSummary, GenerationRecord};
pub use redo_loop::RedoLoop;
