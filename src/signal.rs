//! In-band control signals.
//!
//! Machines coordinate by writing reserved symbols onto ordinary tape cells. This module is
//! the only place that knows which symbol means what; tapes and heads treat them as plain
//! symbols.

use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// Symbol written to announce that a machine is ready.
pub const READY_SYMBOL: Symbol = '?';
/// Symbol written to resume machines watching the cell.
pub const RUNNING_SYMBOL: Symbol = '!';
/// Symbol written to pause machines watching the cell.
pub const PAUSED_SYMBOL: Symbol = '~';
/// Symbol written to halt machines watching the cell.
pub const HALTED_SYMBOL: Symbol = '^';

/// The control state a machine can observe on its control cell.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlSignal {
    #[default]
    None,
    Ready,
    Running,
    Paused,
    Halted,
}

impl ControlSignal {
    /// Decodes a tape symbol. Symbols outside the reserved set carry no signal.
    pub fn from_symbol(symbol: Symbol) -> Self {
        match symbol {
            READY_SYMBOL => ControlSignal::Ready,
            RUNNING_SYMBOL => ControlSignal::Running,
            PAUSED_SYMBOL => ControlSignal::Paused,
            HALTED_SYMBOL => ControlSignal::Halted,
            _ => ControlSignal::None,
        }
    }

    /// Encodes the signal as the symbol to write, or `None` for `ControlSignal::None`.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            ControlSignal::None => None,
            ControlSignal::Ready => Some(READY_SYMBOL),
            ControlSignal::Running => Some(RUNNING_SYMBOL),
            ControlSignal::Paused => Some(PAUSED_SYMBOL),
            ControlSignal::Halted => Some(HALTED_SYMBOL),
        }
    }
}
