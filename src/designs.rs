//! This module provides the catalog of built-in designs embedded in the binary.

use crate::types::{Design, SimulationError};

use std::sync::RwLock;
use tracing::warn;

// Default embedded designs
const DESIGN_TEXTS: [&str; 6] = [
    include_str!("../designs/unary-increment.weave"),
    include_str!("../designs/binary-increment.weave"),
    include_str!("../designs/tape-copy.weave"),
    include_str!("../designs/handshake.weave"),
    include_str!("../designs/circular-sweep.weave"),
    include_str!("../designs/collision.weave"),
];

lazy_static::lazy_static! {
    pub static ref DESIGNS: RwLock<Vec<Design>> = RwLock::new(Vec::new());
}

pub struct DesignCatalog;

impl DesignCatalog {
    /// Parses the embedded designs into the catalog. Designs that fail to parse are logged
    /// and left out.
    pub fn load() -> Result<(), SimulationError> {
        let mut designs = Vec::new();

        for (index, text) in DESIGN_TEXTS.iter().enumerate() {
            match crate::parser::parse(text) {
                Ok(design) => designs.push(design),
                Err(error) => warn!(index, %error, "failed to parse built-in design"),
            }
        }

        let mut write_guard = DESIGNS.write().map_err(|_| {
            SimulationError::FileError("Failed to acquire write lock".to_string())
        })?;
        *write_guard = designs;

        Ok(())
    }

    /// Loads the catalog unless it already holds designs.
    fn ensure_loaded() {
        let loaded = DESIGNS.read().is_ok_and(|designs| !designs.is_empty());
        if !loaded {
            let _ = Self::load();
        }
    }

    /// Get the number of available designs
    pub fn count() -> usize {
        Self::ensure_loaded();

        DESIGNS.read().map(|designs| designs.len()).unwrap_or(0)
    }

    /// Get a design by its index
    pub fn by_index(index: usize) -> Result<Design, SimulationError> {
        Self::ensure_loaded();

        DESIGNS
            .read()
            .map_err(|_| SimulationError::FileError("Failed to acquire read lock".to_string()))?
            .get(index)
            .cloned()
            .ok_or_else(|| {
                SimulationError::ValidationError(format!("Design index {} out of range", index))
            })
    }

    /// Get a design by its name, ignoring case
    pub fn by_name(name: &str) -> Result<Design, SimulationError> {
        Self::ensure_loaded();

        DESIGNS
            .read()
            .map_err(|_| SimulationError::FileError("Failed to acquire read lock".to_string()))?
            .iter()
            .find(|design| design.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SimulationError::ValidationError(format!("Design '{}' not found", name)))
    }

    /// List all design names
    pub fn names() -> Vec<String> {
        Self::ensure_loaded();

        DESIGNS
            .read()
            .map(|designs| designs.iter().map(|design| design.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Get a summary of a design by its index
    pub fn info(index: usize) -> Result<DesignInfo, SimulationError> {
        let design = Self::by_index(index)?;

        Ok(DesignInfo {
            index,
            name: design.name.clone(),
            tape_count: design.tapes.len(),
            machine_count: design.machines.len(),
            state_count: design.states().len(),
            transition_count: design.transition_count(),
        })
    }

    /// Search for designs by name
    pub fn search(query: &str) -> Vec<usize> {
        Self::ensure_loaded();

        let query = query.to_lowercase();
        DESIGNS
            .read()
            .map(|designs| {
                designs
                    .iter()
                    .enumerate()
                    .filter(|(_, design)| design.name.to_lowercase().contains(&query))
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the original text of a design by its index
    pub fn text_by_index(index: usize) -> Result<&'static str, SimulationError> {
        DESIGN_TEXTS.get(index).copied().ok_or_else(|| {
            SimulationError::ValidationError(format!("Design text index {} out of range", index))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignInfo {
    pub index: usize,
    pub name: String,
    pub tape_count: usize,
    pub machine_count: usize,
    pub state_count: usize,
    pub transition_count: usize,
}
