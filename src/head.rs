//! This module defines the `Head`, a position-tracking accessor bound to one tape of the
//! arena. What a head may do with its tape is decided by its `Access` variant.

use crate::tape::TapeArena;
use crate::types::{
    Access, HeadId, HeadSpec, MachineId, Position, SimulationError, Symbol, TapeId, NONE,
};

/// A read/write head.
///
/// The tape binding is fixed at construction; only the position changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    id: HeadId,
    access: Access,
    tape: TapeId,
    position: Position,
}

impl Head {
    pub fn new(id: HeadId, access: Access, tape: TapeId, position: Position) -> Self {
        Self {
            id,
            access,
            tape,
            position,
        }
    }

    /// Creates a head from its design description.
    pub fn from_spec(id: HeadId, spec: &HeadSpec) -> Self {
        Self::new(id, spec.access, spec.tape, spec.position)
    }

    pub fn id(&self) -> HeadId {
        self.id
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn tape(&self) -> TapeId {
        self.tape
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Returns the symbol under the head.
    ///
    /// Write-only heads never read and always report `NONE`. `None` means the head stands
    /// outside its tape's addressable cells.
    pub fn current_content(&self, tapes: &TapeArena) -> Option<Symbol> {
        match self.access {
            Access::WriteOnly => Some(NONE),
            Access::ReadOnly | Access::ReadWrite => tapes.get(self.tape)?.try_read(self.position),
        }
    }

    /// Schedules `content` for the cell under the head.
    ///
    /// Writing `NONE` is a no-op for every variant; any other write from a read-only head
    /// is a capability violation.
    pub fn try_write(
        &self,
        tapes: &mut TapeArena,
        content: Symbol,
        machine: MachineId,
    ) -> Result<(), SimulationError> {
        if content == NONE {
            return Ok(());
        }

        match self.access {
            Access::ReadOnly => Err(SimulationError::CapabilityViolation {
                head: self.id,
                access: self.access,
            }),
            Access::WriteOnly | Access::ReadWrite => tapes
                .get_mut(self.tape)
                .ok_or(SimulationError::UnknownTape(self.tape))?
                .schedule_write(self.position, content, machine, self.id),
        }
    }

    /// Moves the head by `steps` cells under its tape's boundary policy.
    pub fn move_by(&mut self, tapes: &TapeArena, steps: i64) {
        if let Some(tape) = tapes.get(self.tape) {
            self.position = tape.moved_position(self.position, steps);
        }
    }

    pub fn uses_tape(&self, tape: TapeId) -> bool {
        self.tape == tape
    }
}
