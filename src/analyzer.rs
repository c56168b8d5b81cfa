//! This module provides functions for analyzing designs to detect structural errors before a
//! simulation is built: dangling tape references, head counts that no machine can satisfy,
//! impossible head positions, malformed tapes and unreachable states.

use crate::tape::Tape;
use crate::types::{Design, HeadId, Position, SimulationError, TapeId, END, NONE, START};
use std::collections::HashSet;

/// Represents the errors that can be found during the analysis of a design.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// The design is missing tapes, machines or heads.
    StructuralError(String),
    /// A head or control cell refers to a tape that does not exist.
    UnknownTape { machine: String, tape: TapeId },
    /// A transition statement has a head count no machine has.
    HeadCountMismatch { state: String, heads: usize },
    /// A tape has an unusable length or initial content.
    InvalidTape { tape: String, reason: String },
    /// A head starts on a cell its tape cannot address.
    InvalidHead {
        machine: String,
        head: HeadId,
        position: Position,
    },
    /// A control cell is not addressable on its tape.
    InvalidControlCell { machine: String, position: Position },
    /// A machine starts in a state that has no outgoing transitions.
    InvalidStartState(String),
    /// States with transitions that no machine can ever reach.
    UnreachableStates(Vec<String>),
}

impl From<AnalysisError> for SimulationError {
    /// Converts an `AnalysisError` into a `SimulationError::ValidationError`.
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::StructuralError(msg) => SimulationError::ValidationError(msg),
            AnalysisError::UnknownTape { machine, tape } => SimulationError::ValidationError(
                format!("Machine '{}' refers to unknown tape {}", machine, tape),
            ),
            AnalysisError::HeadCountMismatch { state, heads } => {
                SimulationError::ValidationError(format!(
                    "Transition from state '{}' drives {} heads but no machine has that many",
                    state, heads
                ))
            }
            AnalysisError::InvalidTape { tape, reason } => {
                SimulationError::ValidationError(format!("Invalid tape '{}': {}", tape, reason))
            }
            AnalysisError::InvalidHead {
                machine,
                head,
                position,
            } => SimulationError::ValidationError(format!(
                "Invalid position {} for head {} of machine '{}'",
                position, head, machine
            )),
            AnalysisError::InvalidControlCell { machine, position } => {
                SimulationError::ValidationError(format!(
                    "Invalid control cell position {} for machine '{}'",
                    position, machine
                ))
            }
            AnalysisError::InvalidStartState(state) => {
                SimulationError::ValidationError(format!("Invalid start state: {}", state))
            }
            AnalysisError::UnreachableStates(states) => SimulationError::ValidationError(
                format!("Unreachable states detected: {:?}", states),
            ),
        }
    }
}

/// Analyzes a design for structural and logical errors.
///
/// Every check runs; the first failure is reported.
///
/// # Returns
///
/// * `Ok(())` if no errors are found.
/// * `Err(SimulationError::ValidationError)` if any rule is violated.
pub fn analyze(design: &Design) -> Result<(), SimulationError> {
    let errors = [
        check_structure,
        check_bindings,
        check_tapes,
        check_positions,
        check_start_states,
        check_unreachable_states,
    ]
    .iter()
    .filter_map(|f| f(design).err())
    .collect::<Vec<_>>();

    match errors.into_iter().next() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Checks that the design has tapes, machines, and that every machine has a head.
fn check_structure(design: &Design) -> Result<(), AnalysisError> {
    if design.tapes.is_empty() {
        return Err(AnalysisError::StructuralError(
            "No tapes defined".to_string(),
        ));
    }

    if design.machines.is_empty() {
        return Err(AnalysisError::StructuralError(
            "No machines defined".to_string(),
        ));
    }

    if let Some(machine) = design.machines.iter().find(|m| m.heads.is_empty()) {
        return Err(AnalysisError::StructuralError(format!(
            "Machine '{}' has no heads",
            machine.name
        )));
    }

    Ok(())
}

/// Checks that every tape reference resolves and that every transition statement can be
/// looked up by at least one machine.
///
/// These are the checks a simulation cannot run without, so `Simulation::new` runs them too.
pub fn check_bindings(design: &Design) -> Result<(), AnalysisError> {
    for machine in &design.machines {
        let references = machine
            .heads
            .iter()
            .map(|head| head.tape)
            .chain(machine.control.map(|cell| cell.tape));

        for tape in references {
            if tape >= design.tapes.len() {
                return Err(AnalysisError::UnknownTape {
                    machine: machine.name.clone(),
                    tape,
                });
            }
        }
    }

    let head_counts: HashSet<usize> = design.machines.iter().map(|m| m.heads.len()).collect();

    design
        .transitions
        .iter()
        .find(|statement| !head_counts.contains(&statement.actions.len()))
        .map_or(Ok(()), |statement| {
            Err(AnalysisError::HeadCountMismatch {
                state: statement.source.clone(),
                heads: statement.actions.len(),
            })
        })
}

/// Checks tape lengths and initial content.
///
/// Fixed-length tapes need a positive length and content that fits; content may not hold
/// boundary markers or the no-op placeholder.
fn check_tapes(design: &Design) -> Result<(), AnalysisError> {
    for tape in &design.tapes {
        let invalid = |reason: String| AnalysisError::InvalidTape {
            tape: tape.name.clone(),
            reason,
        };

        if let Some(length) = tape.boundary.length() {
            if length == 0 {
                return Err(invalid("length must be greater than zero".to_string()));
            }

            let content_length = tape.content.chars().count();
            if content_length > length {
                return Err(invalid(format!(
                    "content has {} symbols but the tape holds {}",
                    content_length, length
                )));
            }
        }

        if let Some(symbol) = tape.content.chars().find(|c| [START, END, NONE].contains(c)) {
            return Err(invalid(format!("content contains reserved symbol '{}'", symbol)));
        }
    }

    Ok(())
}

/// Checks that every head and control cell starts on an addressable cell of its tape.
fn check_positions(design: &Design) -> Result<(), AnalysisError> {
    let tapes: Vec<Tape> = design
        .tapes
        .iter()
        .enumerate()
        .map(|(id, spec)| Tape::new(id, spec.boundary))
        .collect();

    for machine in &design.machines {
        for (head, spec) in machine.heads.iter().enumerate() {
            let addressable = tapes
                .get(spec.tape)
                .is_some_and(|tape| tape.is_addressable(spec.position));
            if !addressable {
                return Err(AnalysisError::InvalidHead {
                    machine: machine.name.clone(),
                    head,
                    position: spec.position,
                });
            }
        }

        if let Some(cell) = machine.control {
            let addressable = tapes
                .get(cell.tape)
                .is_some_and(|tape| tape.is_addressable(cell.position));
            if !addressable {
                return Err(AnalysisError::InvalidControlCell {
                    machine: machine.name.clone(),
                    position: cell.position,
                });
            }
        }
    }

    Ok(())
}

/// Checks that every machine's start state has at least one outgoing transition.
fn check_start_states(design: &Design) -> Result<(), AnalysisError> {
    let sources: HashSet<&str> = design
        .transitions
        .iter()
        .map(|statement| statement.source.as_str())
        .collect();

    design
        .machines
        .iter()
        .find(|machine| !sources.contains(machine.initial_state.as_str()))
        .map_or(Ok(()), |machine| {
            Err(AnalysisError::InvalidStartState(
                machine.initial_state.clone(),
            ))
        })
}

/// Checks for states that no machine can reach, walking the transitions from every start
/// state.
fn check_unreachable_states(design: &Design) -> Result<(), AnalysisError> {
    let mut visited = HashSet::new();
    let mut queue: Vec<&str> = design
        .machines
        .iter()
        .map(|machine| machine.initial_state.as_str())
        .collect();

    while let Some(state) = queue.pop() {
        if !visited.insert(state) {
            continue;
        }

        for statement in design.transitions.iter().filter(|s| s.source == state) {
            if !visited.contains(statement.target.as_str()) {
                queue.push(statement.target.as_str());
            }
        }
    }

    let mut unreachable: Vec<String> = design
        .states()
        .into_iter()
        .filter(|state| !visited.contains(state.as_str()))
        .collect();

    if !unreachable.is_empty() {
        unreachable.sort(); // Sort for deterministic output
        return Err(AnalysisError::UnreachableStates(unreachable));
    }

    Ok(())
}
