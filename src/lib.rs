//! This crate provides the core logic for a shared-tape Turing simulator: several machines
//! with read-only, write-only or read-write heads advance in lockstep over tapes with
//! configurable boundaries. It includes modules for parsing designs, analyzing them, running
//! them tick by tick and managing a collection of built-in designs.

pub mod analyzer;
pub mod designs;
pub mod head;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod signal;
pub mod simulation;
pub mod table;
pub mod tape;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` function and `AnalysisError` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisError};
/// Re-exports `DesignCatalog`, `DesignInfo`, and `DESIGNS` from the designs module.
pub use designs::{DesignCatalog, DesignInfo, DESIGNS};
pub use head::Head;
/// Re-exports the `DesignLoader` struct from the loader module.
pub use loader::DesignLoader;
pub use machine::{Machine, Status};
/// Re-exports the `parse` function from the parser module.
pub use parser::parse;
pub use signal::ControlSignal;
pub use simulation::{RunOutcome, Segment, Simulation, Snapshot, Tick};
pub use table::{TransitionKey, TransitionTable, TransitionValue};
pub use tape::{Tape, TapeArena};
/// Re-exports the design, outcome and error types from the types module.
pub use types::{
    Access, Boundary, ControlCell, Design, Halt, HeadAction, HeadSpec, MachineSpec,
    SimulationError, Step, Symbol, TapeSpec, TransitionStatement, WriteConflict, BLANK,
    DEFAULT_STEP_LIMIT, END, MAX_DESIGN_SIZE, NONE, START,
};
