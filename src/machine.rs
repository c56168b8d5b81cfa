//! This module defines the `Machine`, an ordered set of heads plus a current state. A machine
//! never touches tapes on its own schedule: the simulation asks it to read, to schedule its
//! writes and, once every write of the tick has been committed, to advance.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::head::Head;
use crate::signal::ControlSignal;
use crate::table::{TransitionKey, TransitionValue};
use crate::tape::TapeArena;
use crate::types::{
    ControlCell, Halt, MachineId, MachineSpec, RejectedWrite, TapeId, BLANK, NONE,
};

/// Where a machine stands in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Running,
    /// Waiting for a running signal on the control cell.
    Paused,
    Halted(Halt),
}

/// One finite-state machine driving its heads over the shared tapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    id: MachineId,
    name: String,
    state: String,
    heads: Vec<Head>,
    control: Option<ControlCell>,
    status: Status,
    step_count: usize,
}

impl Machine {
    /// Creates a machine from its design description.
    ///
    /// Heads are numbered in the order they are listed.
    pub fn new(id: MachineId, spec: &MachineSpec) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            state: spec.initial_state.clone(),
            heads: spec
                .heads
                .iter()
                .enumerate()
                .map(|(head_id, head)| Head::from_spec(head_id, head))
                .collect(),
            control: spec.control,
            status: Status::Running,
            step_count: 0,
        }
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state of the machine.
    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn heads(&self) -> &[Head] {
        &self.heads
    }

    pub fn control(&self) -> Option<ControlCell> {
        self.control
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Returns the number of transitions this machine has applied.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.status, Status::Halted(_))
    }

    pub fn is_paused(&self) -> bool {
        self.status == Status::Paused
    }

    /// Checks whether any head of this machine is bound to `tape`.
    pub fn uses_tape(&self, tape: TapeId) -> bool {
        self.heads.iter().any(|head| head.uses_tape(tape))
    }

    /// Returns the symbols currently under each head, concatenated in head order.
    ///
    /// A head standing outside its tape contributes `BLANK`.
    ///
    /// | > | 1 | 1 |   tape 0 (read-write head at 1)
    /// | a | b |       tape 1 (write-only head)
    ///
    /// reads as "1/"
    pub fn symbols(&self, tapes: &TapeArena) -> String {
        self.heads
            .iter()
            .map(|head| head.current_content(tapes).unwrap_or(BLANK))
            .collect()
    }

    /// Builds the lookup key for the current state and the symbols under the heads.
    pub fn read_all(&self, tapes: &TapeArena) -> TransitionKey {
        TransitionKey::new(self.state.clone(), self.symbols(tapes))
    }

    /// Decodes the signal on the machine's control cell. Machines without one never
    /// observe a signal.
    pub fn control_signal(&self, tapes: &TapeArena) -> ControlSignal {
        self.control
            .and_then(|cell| tapes.get(cell.tape)?.try_read(cell.position))
            .map_or(ControlSignal::None, ControlSignal::from_symbol)
    }

    /// Schedules the write half of a transition on every head.
    ///
    /// `NONE` entries are skipped. A head whose write cannot be scheduled loses only that
    /// write; the failures are returned so the tick can report them.
    pub fn schedule_writes(
        &self,
        value: &TransitionValue,
        tapes: &mut TapeArena,
    ) -> Vec<RejectedWrite> {
        let mut rejected = Vec::new();

        for (head, content) in self.heads.iter().zip(value.write.chars()) {
            if content == NONE {
                continue;
            }

            if let Err(error) = head.try_write(tapes, content, self.id) {
                warn!(
                    machine = self.id,
                    head = head.id(),
                    %content,
                    %error,
                    "write rejected"
                );
                rejected.push(RejectedWrite {
                    machine: self.id,
                    head: head.id(),
                    content,
                    error,
                });
            }
        }

        rejected
    }

    /// Applies the move half of a transition and enters its target state.
    pub fn advance(&mut self, value: &TransitionValue, tapes: &TapeArena) {
        for (head, &steps) in self.heads.iter_mut().zip(&value.moves) {
            head.move_by(tapes, steps);
        }

        self.state = value.target.clone();
        self.step_count += 1;
    }

    pub(crate) fn halt(&mut self, halt: Halt) {
        self.status = Status::Halted(halt);
    }

    pub(crate) fn pause(&mut self) {
        self.status = Status::Paused;
    }

    pub(crate) fn resume(&mut self) {
        self.status = Status::Running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::PAUSED_SYMBOL;
    use crate::types::{Access, Boundary, HeadSpec, SimulationError, START};

    fn machine(heads: Vec<HeadSpec>, control: Option<ControlCell>) -> Machine {
        Machine::new(
            3,
            &MachineSpec {
                name: "m".to_string(),
                initial_state: "q0".to_string(),
                heads,
                control,
            },
        )
    }

    fn head(tape: TapeId, access: Access, position: i64) -> HeadSpec {
        HeadSpec {
            tape,
            access,
            position,
        }
    }

    fn value(target: &str, write: &str, moves: Vec<i64>) -> TransitionValue {
        TransitionValue {
            target: target.to_string(),
            write: write.to_string(),
            moves,
        }
    }

    #[test]
    fn test_machine_creation() {
        let machine = machine(vec![head(0, Access::ReadWrite, 2)], None);

        assert_eq!(machine.id(), 3);
        assert_eq!(machine.state(), "q0");
        assert_eq!(machine.heads().len(), 1);
        assert_eq!(machine.heads()[0].position(), 2);
        assert_eq!(machine.status(), &Status::Running);
        assert_eq!(machine.step_count(), 0);
    }

    #[test]
    fn test_read_all_follows_head_order() {
        let mut tapes = TapeArena::default();
        tapes.push(Boundary::LeftLimited, "11");
        tapes.push(Boundary::Infinite, "ab");

        let machine = machine(
            vec![
                head(1, Access::ReadOnly, 1),
                head(0, Access::ReadWrite, -1),
                head(1, Access::WriteOnly, 0),
                head(0, Access::ReadWrite, 5),
            ],
            None,
        );

        let key = machine.read_all(&tapes);
        assert_eq!(key, TransitionKey::new("q0", format!("b{START}/_")));
    }

    #[test]
    fn test_writes_are_scheduled_not_applied() {
        let mut tapes = TapeArena::default();
        tapes.push(Boundary::Infinite, "a");
        let machine = machine(vec![head(0, Access::ReadWrite, 0)], None);

        let rejected = machine.schedule_writes(&value("q1", "b", vec![1]), &mut tapes);

        assert!(rejected.is_empty());
        assert_eq!(machine.symbols(&tapes), "a");
        tapes.commit_pending_writes();
        assert_eq!(machine.symbols(&tapes), "b");
    }

    #[test]
    fn test_none_writes_are_skipped() {
        let mut tapes = TapeArena::default();
        tapes.push(Boundary::Infinite, "a");
        let machine = machine(
            vec![head(0, Access::ReadOnly, 0), head(0, Access::ReadWrite, 0)],
            None,
        );

        let rejected = machine.schedule_writes(&value("q1", "//", vec![0, 0]), &mut tapes);

        assert!(rejected.is_empty());
        assert!(!tapes.get(0).unwrap().has_pending_writes());
    }

    #[test]
    fn test_rejected_writes_are_reported_per_head() {
        let mut tapes = TapeArena::default();
        tapes.push(Boundary::LeftLimited, "");
        let machine = machine(
            vec![
                head(0, Access::ReadOnly, 0),
                head(0, Access::ReadWrite, -1),
                head(0, Access::ReadWrite, 1),
            ],
            None,
        );

        let rejected = machine.schedule_writes(&value("q1", "xyz", vec![0, 0, 0]), &mut tapes);

        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].head, 0);
        assert_eq!(
            rejected[0].error,
            SimulationError::CapabilityViolation {
                head: 0,
                access: Access::ReadOnly
            }
        );
        assert_eq!(rejected[1].head, 1);
        assert_eq!(
            rejected[1].error,
            SimulationError::BoundaryViolation {
                tape: 0,
                position: -1
            }
        );

        tapes.commit_pending_writes();
        assert_eq!(tapes.get(0).unwrap().try_read(1), Some('z'));
    }

    #[test]
    fn test_advance_moves_heads_and_changes_state() {
        let mut tapes = TapeArena::default();
        tapes.push(Boundary::Circular { length: 3 }, "abc");
        let mut machine = machine(
            vec![head(0, Access::ReadWrite, 0), head(0, Access::ReadOnly, 2)],
            None,
        );

        machine.advance(&value("q7", "//", vec![-1, 1]), &tapes);

        assert_eq!(machine.state(), "q7");
        assert_eq!(machine.heads()[0].position(), 2);
        assert_eq!(machine.heads()[1].position(), 0);
        assert_eq!(machine.step_count(), 1);
    }

    #[test]
    fn test_control_signal_reads_the_control_cell() {
        let mut tapes = TapeArena::default();
        tapes.push(Boundary::Infinite, "");
        tapes.push(Boundary::Circular { length: 2 }, &format!("_{PAUSED_SYMBOL}"));

        let watching = machine(
            vec![head(0, Access::ReadWrite, 0)],
            Some(ControlCell {
                tape: 1,
                position: 1,
            }),
        );
        let unwatched = machine(vec![head(0, Access::ReadWrite, 0)], None);

        assert_eq!(watching.control_signal(&tapes), ControlSignal::Paused);
        assert_eq!(unwatched.control_signal(&tapes), ControlSignal::None);
        assert!(watching.uses_tape(0));
        assert!(!watching.uses_tape(1));
    }

    #[test]
    fn test_status_transitions() {
        let mut machine = machine(vec![head(0, Access::ReadWrite, 0)], None);

        machine.pause();
        assert!(machine.is_paused());
        machine.resume();
        assert!(!machine.is_paused());
        machine.halt(Halt::Signal);
        assert!(machine.is_halted());
    }
}
