//! This module defines the core data structures and types shared across the simulator:
//! reserved symbols, design descriptions, boundary policies, head capabilities,
//! per-tick outcomes and the error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Rule;

/// A single tape symbol.
pub type Symbol = char;
/// A cell address on a tape. Negative addresses are valid on some boundary policies.
pub type Position = i64;
/// Index of a tape inside the simulation's tape arena.
pub type TapeId = usize;
/// Index of a machine inside a simulation run.
pub type MachineId = usize;
/// Index of a head inside its machine.
pub type HeadId = usize;

/// The blank symbol. Blank cells are never physically stored.
pub const BLANK: Symbol = '_';
/// Left boundary marker, readable at the cell just left of a left-limited tape's content.
pub const START: Symbol = '>';
/// Right boundary marker, readable at the cell just right of a right-limited tape's content.
pub const END: Symbol = '<';
/// Placeholder meaning "no read" (write-only heads) or "no write" (in write strings).
pub const NONE: Symbol = '/';
/// The maximum allowed size for a design source in bytes.
pub const MAX_DESIGN_SIZE: usize = 65536; // 64KB
/// The default number of ticks a run may take before giving up.
pub const DEFAULT_STEP_LIMIT: usize = 10000;
/// Number of cells shown on each side of a head in a snapshot window.
pub const SNAPSHOT_RADIUS: i64 = 8;
/// Longest run of blank cells `Tape::content` renders before eliding it.
pub const MAX_CONTENT_GAP: i64 = 64;

/// Describes how positions behave at a tape's edges.
///
/// Limited variants place their markers just outside the content cells: `START` at
/// `-1` and `END` at `length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// Grows in both directions.
    Infinite,
    /// Content starts at 0 and grows to the right.
    LeftLimited,
    /// Content ends at `length - 1` and grows to the left.
    RightLimited { length: usize },
    /// Content is exactly `[0, length)`.
    LeftRightLimited { length: usize },
    /// Content is `[0, length)` and movement wraps around.
    Circular { length: usize },
}

impl Boundary {
    /// Returns the fixed length of the tape, if the policy has one.
    pub fn length(&self) -> Option<usize> {
        match self {
            Boundary::Infinite | Boundary::LeftLimited => None,
            Boundary::RightLimited { length }
            | Boundary::LeftRightLimited { length }
            | Boundary::Circular { length } => Some(*length),
        }
    }

    pub fn has_left_marker(&self) -> bool {
        matches!(self, Boundary::LeftLimited | Boundary::LeftRightLimited { .. })
    }

    pub fn has_right_marker(&self) -> bool {
        matches!(
            self,
            Boundary::RightLimited { .. } | Boundary::LeftRightLimited { .. }
        )
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Infinite => write!(f, "infinite"),
            Boundary::LeftLimited => write!(f, "left"),
            Boundary::RightLimited { length } => write!(f, "right({length})"),
            Boundary::LeftRightLimited { length } => write!(f, "bounded({length})"),
            Boundary::Circular { length } => write!(f, "circular({length})"),
        }
    }
}

/// The capability a head has on its tape.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::ReadOnly => write!(f, "ro"),
            Access::WriteOnly => write!(f, "wo"),
            Access::ReadWrite => write!(f, "rw"),
        }
    }
}

/// A complete, shareable description of a simulation: tapes, machines and the transition
/// statements every machine looks up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    /// The name of the design.
    pub name: String,
    /// Tapes in arena order; a head's `tape` is an index into this list.
    pub tapes: Vec<TapeSpec>,
    /// Machines in run order.
    pub machines: Vec<MachineSpec>,
    /// Transition statements, in registration order.
    pub transitions: Vec<TransitionStatement>,
}

impl Design {
    /// Finds the arena index of a tape by name.
    pub fn tape_index(&self, name: &str) -> Option<TapeId> {
        self.tapes.iter().position(|tape| tape.name == name)
    }

    /// Returns the distinct source states, in first-seen order.
    pub fn states(&self) -> Vec<String> {
        let mut states: Vec<String> = Vec::new();
        for statement in &self.transitions {
            if !states.contains(&statement.source) {
                states.push(statement.source.clone());
            }
        }
        states
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

/// Initial description of one tape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeSpec {
    pub name: String,
    pub boundary: Boundary,
    /// Initial content laid out from position 0. `BLANK` characters leave the cell unset.
    pub content: String,
}

/// Initial description of one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    pub initial_state: String,
    pub heads: Vec<HeadSpec>,
    /// The cell this machine watches for control signals, if any.
    pub control: Option<ControlCell>,
}

/// Initial description of one head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadSpec {
    pub tape: TapeId,
    pub access: Access,
    pub position: Position,
}

/// A tape cell designated to carry in-band control signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCell {
    pub tape: TapeId,
    pub position: Position,
}

/// One authored transition: from `source`, when every head reads its `read` symbol,
/// write, move and go to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionStatement {
    pub source: String,
    pub target: String,
    /// One action per head, in head order.
    pub actions: Vec<HeadAction>,
}

/// The read/write/move triple of a single head within a transition statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadAction {
    pub read: Symbol,
    pub write: Symbol,
    pub movement: i64,
}

/// Outcome of one tick for one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// The machine performed a transition and keeps running.
    Continue,
    /// The machine observed a pause signal and sat this tick out.
    Paused,
    /// The machine is halted.
    Halted(Halt),
}

/// Why a machine stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Halt {
    /// No transition exists for the current state and read string.
    NoTransition { state: String, read: String },
    /// The machine contributed to one or more contested cells.
    WriteConflict(Vec<WriteConflict>),
    /// A halt signal was read on the machine's control cell.
    Signal,
}

/// Two or more heads scheduled differing content for the same cell in one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConflict {
    pub tape: TapeId,
    pub position: Position,
    /// Every (machine, head) pair that wrote to the cell this tick.
    pub contenders: Vec<(MachineId, HeadId)>,
}

impl WriteConflict {
    pub fn involves(&self, machine: MachineId) -> bool {
        self.contenders.iter().any(|(m, _)| *m == machine)
    }
}

/// A write a head attempted but that was never scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedWrite {
    pub machine: MachineId,
    pub head: HeadId,
    pub content: Symbol,
    pub error: SimulationError,
}

/// Represents the errors that can occur while building, loading or running a design.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// A write targeted a cell outside the tape's content range.
    #[error("Position {position} is out of range on tape {tape}")]
    OutOfRange { tape: TapeId, position: Position },
    /// A write targeted a boundary marker cell.
    #[error("Position {position} on tape {tape} holds a boundary marker")]
    BoundaryViolation { tape: TapeId, position: Position },
    /// A head attempted an operation its capability forbids.
    #[error("Head {head} with access {access} cannot perform this operation")]
    CapabilityViolation { head: HeadId, access: Access },
    /// Differing writes to the same cell in one tick.
    #[error("Write conflict on tape {} at position {}", .0.tape, .0.position)]
    WriteConflict(WriteConflict),
    /// No transition for the given state and read string.
    #[error("No transition defined for state {state} and symbols {read:?}")]
    NoTransition { state: String, read: String },
    /// A run reached its step limit before every machine halted.
    #[error("Step limit of {0} ticks exceeded")]
    StepLimitExceeded(usize),
    /// A head or control cell refers to a tape that does not exist.
    #[error("Unknown tape: {0}")]
    UnknownTape(TapeId),
    /// Indicates an error during the parsing of a design source.
    #[error("Design parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates a structural problem with a design.
    #[error("Design validation error: {0}")]
    ValidationError(String),
    /// Indicates an error related to reading design files.
    #[error("File error: {0}")]
    FileError(String),
}
