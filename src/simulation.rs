//! This module defines the `Simulation`, which advances every machine of a design in lockstep
//! over the shared tapes.
//!
//! A tick runs in four phases:
//!
//! 1. read: every active machine reads its control cell and heads and looks up its transition,
//! 2. schedule: machines with a transition register their writes on the tapes,
//! 3. commit: every touched tape applies its uncontested writes and reports the contested ones,
//! 4. advance: machines untouched by a conflict move their heads and change state.
//!
//! Because nothing is written before every machine has read, step order inside a tick is
//! never observable.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::check_bindings;
use crate::machine::{Machine, Status};
use crate::signal::ControlSignal;
use crate::table::{TransitionTable, TransitionValue};
use crate::tape::{Tape, TapeArena};
use crate::types::{
    Access, Boundary, Design, Halt, HeadId, MachineId, Position, RejectedWrite, SimulationError,
    Step, Symbol, TapeId, WriteConflict, SNAPSHOT_RADIUS,
};

/// Everything that happened in one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Number of ticks run so far, this one included.
    pub number: usize,
    /// Outcome per machine, in machine order.
    pub steps: Vec<Step>,
    /// Cells that received differing writes this tick.
    pub conflicts: Vec<WriteConflict>,
    /// Writes that could not be scheduled this tick.
    pub rejected: Vec<RejectedWrite>,
}

impl Tick {
    pub fn all_halted(&self) -> bool {
        self.steps.iter().all(|step| matches!(step, Step::Halted(_)))
    }
}

/// How a call to [`Simulation::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every machine halted after `ticks` ticks of this run.
    Halted { ticks: usize },
    /// `limit` ticks ran and at least one machine is still active.
    StepLimitExceeded { limit: usize },
}

impl RunOutcome {
    /// Converts the outcome into the number of ticks run, or a `StepLimitExceeded` error.
    pub fn into_result(self) -> Result<usize, SimulationError> {
        match self {
            RunOutcome::Halted { ticks } => Ok(ticks),
            RunOutcome::StepLimitExceeded { limit } => {
                Err(SimulationError::StepLimitExceeded(limit))
            }
        }
    }
}

/// A read-only view of a simulation, for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: usize,
    pub tapes: Vec<TapeSnapshot>,
    pub machines: Vec<MachineSnapshot>,
}

/// The visible cells of a tape near its heads and near both ends of its written content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeSnapshot {
    pub id: TapeId,
    pub name: String,
    pub boundary: Boundary,
    /// Disjoint windows in position order.
    pub segments: Vec<Segment>,
}

/// A contiguous run of rendered cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position of the first character of `cells`.
    pub start: Position,
    pub cells: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub name: String,
    pub state: String,
    pub status: Status,
    pub heads: Vec<HeadSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadSnapshot {
    pub id: HeadId,
    pub tape: TapeId,
    pub access: Access,
    pub position: Position,
    /// What the head would read right now.
    pub symbol: Option<Symbol>,
}

/// A run of a design: its tapes, its transition table and its machines.
#[derive(Debug, Clone)]
pub struct Simulation {
    design: Design,
    tapes: TapeArena,
    table: TransitionTable,
    machines: Vec<Machine>,
    tick_count: usize,
}

impl Simulation {
    /// Builds a simulation from a design.
    ///
    /// Only the bindings are checked here (tape references and head counts); run
    /// [`crate::analyze`] first for a full structural validation.
    pub fn new(design: Design) -> Result<Self, SimulationError> {
        check_bindings(&design)?;

        Ok(Self {
            tapes: TapeArena::from_specs(&design.tapes),
            table: TransitionTable::from_statements(&design.transitions),
            machines: build_machines(&design),
            design,
            tick_count: 0,
        })
    }

    /// Advances every active machine by one tick.
    ///
    /// Once every machine has halted this does nothing and the tick counter stays put.
    pub fn step(&mut self) -> Tick {
        if self.is_halted() {
            return Tick {
                number: self.tick_count,
                steps: self.steps(),
                conflicts: Vec::new(),
                rejected: Vec::new(),
            };
        }

        self.tick_count += 1;

        let planned = self.read_phase();
        let rejected = self.schedule_phase(&planned);
        let conflicts = self.tapes.commit_pending_writes();
        self.advance_phase(planned, &conflicts);

        debug!(
            tick = self.tick_count,
            conflicts = conflicts.len(),
            rejected = rejected.len(),
            "tick committed"
        );

        Tick {
            number: self.tick_count,
            steps: self.steps(),
            conflicts,
            rejected,
        }
    }

    /// Runs ticks until every machine halts or `step_limit` ticks have run.
    pub fn run(&mut self, step_limit: usize) -> RunOutcome {
        let mut ticks = 0;

        while !self.is_halted() {
            if ticks == step_limit {
                warn!(limit = step_limit, "step limit exceeded");
                return RunOutcome::StepLimitExceeded { limit: step_limit };
            }

            self.step();
            ticks += 1;
        }

        RunOutcome::Halted { ticks }
    }

    /// Rebuilds tapes and machines from the design and clears the tick counter.
    pub fn reset(&mut self) {
        self.tapes = TapeArena::from_specs(&self.design.tapes);
        self.table = TransitionTable::from_statements(&self.design.transitions);
        self.machines = build_machines(&self.design);
        self.tick_count = 0;
    }

    /// Replaces the initial content of a tape and resets the simulation.
    pub fn set_tape_content(&mut self, tape: TapeId, content: &str) -> Result<(), SimulationError> {
        let spec = self
            .design
            .tapes
            .get_mut(tape)
            .ok_or(SimulationError::UnknownTape(tape))?;
        spec.content = content.to_string();
        self.reset();
        Ok(())
    }

    /// Captures the tapes around every head, every head position and every machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick_count,
            tapes: self
                .tapes
                .iter()
                .map(|tape| self.tape_snapshot(tape))
                .collect(),
            machines: self
                .machines
                .iter()
                .map(|machine| MachineSnapshot {
                    id: machine.id(),
                    name: machine.name().to_string(),
                    state: machine.state().to_string(),
                    status: machine.status().clone(),
                    heads: machine
                        .heads()
                        .iter()
                        .map(|head| HeadSnapshot {
                            id: head.id(),
                            tape: head.tape(),
                            access: head.access(),
                            position: head.position(),
                            symbol: head.current_content(&self.tapes),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn tapes(&self) -> &TapeArena {
        &self.tapes
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(id)
    }

    /// Returns the number of ticks run since construction or the last reset.
    pub fn tick_count(&self) -> usize {
        self.tick_count
    }

    /// Checks if every machine has halted.
    pub fn is_halted(&self) -> bool {
        self.machines.iter().all(Machine::is_halted)
    }

    /// Reads control signals and looks up transitions. Returns the machines that will act
    /// this tick along with their transition.
    fn read_phase(&mut self) -> Vec<(MachineId, TransitionValue)> {
        let mut planned = Vec::new();

        for machine in self.machines.iter_mut().filter(|m| !m.is_halted()) {
            let signal = machine.control_signal(&self.tapes);
            let key = machine.read_all(&self.tapes);

            match signal {
                ControlSignal::Halted => {
                    info!(machine = machine.id(), "halted by signal");
                    machine.halt(Halt::Signal);
                    continue;
                }
                ControlSignal::Paused => machine.pause(),
                ControlSignal::Running => machine.resume(),
                ControlSignal::None | ControlSignal::Ready => {}
            }

            if machine.is_paused() {
                debug!(machine = machine.id(), "paused");
                continue;
            }

            match self.table.get(&key) {
                Some(value) => planned.push((machine.id(), value.clone())),
                None => {
                    info!(
                        machine = machine.id(),
                        state = %key.state,
                        read = %key.read,
                        "no transition, halting"
                    );
                    machine.halt(Halt::NoTransition {
                        state: key.state,
                        read: key.read,
                    });
                }
            }
        }

        planned
    }

    fn schedule_phase(&mut self, planned: &[(MachineId, TransitionValue)]) -> Vec<RejectedWrite> {
        let mut rejected = Vec::new();

        for (id, value) in planned {
            if let Some(machine) = self.machines.get(*id) {
                rejected.extend(machine.schedule_writes(value, &mut self.tapes));
            }
        }

        rejected
    }

    fn advance_phase(
        &mut self,
        planned: Vec<(MachineId, TransitionValue)>,
        conflicts: &[WriteConflict],
    ) {
        for (id, value) in planned {
            let Some(machine) = self.machines.get_mut(id) else {
                continue;
            };

            let involved: Vec<WriteConflict> = conflicts
                .iter()
                .filter(|conflict| conflict.involves(id))
                .cloned()
                .collect();

            if involved.is_empty() {
                machine.advance(&value, &self.tapes);
            } else {
                warn!(machine = id, conflicts = involved.len(), "write conflict, halting");
                machine.halt(Halt::WriteConflict(involved));
            }
        }
    }

    fn steps(&self) -> Vec<Step> {
        self.machines
            .iter()
            .map(|machine| match machine.status() {
                Status::Running => Step::Continue,
                Status::Paused => Step::Paused,
                Status::Halted(halt) => Step::Halted(halt.clone()),
            })
            .collect()
    }

    fn tape_snapshot(&self, tape: &Tape) -> TapeSnapshot {
        let mut anchors: Vec<Position> = self
            .machines
            .iter()
            .flat_map(|machine| machine.heads())
            .filter(|head| head.uses_tape(tape.id()))
            .map(|head| head.position())
            .collect();

        if let Some((first, last)) = tape.written_extent() {
            anchors.extend([first, last]);
        }

        TapeSnapshot {
            id: tape.id(),
            name: self
                .design
                .tapes
                .get(tape.id())
                .map(|spec| spec.name.clone())
                .unwrap_or_default(),
            boundary: tape.boundary(),
            segments: tape
                .windows(&anchors, SNAPSHOT_RADIUS)
                .into_iter()
                .map(|(start, cells)| Segment { start, cells })
                .collect(),
        }
    }
}

fn build_machines(design: &Design) -> Vec<Machine> {
    design
        .machines
        .iter()
        .enumerate()
        .map(|(id, spec)| Machine::new(id, spec))
        .collect()
}
