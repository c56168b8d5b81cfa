//! This module provides the `DesignLoader` struct, responsible for loading designs from files,
//! strings and directories of `.weave` files.

use crate::parser::parse;
use crate::types::{Design, SimulationError, MAX_DESIGN_SIZE};
use std::fs;
use std::path::{Path, PathBuf};

/// `DesignLoader` is a utility struct for loading designs.
pub struct DesignLoader;

impl DesignLoader {
    /// Loads a single design from the specified file path.
    ///
    /// # Returns
    ///
    /// * `Ok(Design)` if the file is successfully read and parsed.
    /// * `Err(SimulationError::FileError)` if the file cannot be read or is too large.
    /// * `Err(SimulationError::ParseError)` if the file content is not a valid design.
    pub fn load_design(path: &Path) -> Result<Design, SimulationError> {
        let metadata = fs::metadata(path).map_err(|e| {
            SimulationError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        if metadata.len() > MAX_DESIGN_SIZE as u64 {
            return Err(SimulationError::FileError(format!(
                "File {} is {} bytes, the limit is {}",
                path.display(),
                metadata.len(),
                MAX_DESIGN_SIZE
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SimulationError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        parse(&content)
    }

    /// Loads a single design from the provided string content, e.g. from standard input.
    pub fn load_design_from_string(content: &str) -> Result<Design, SimulationError> {
        parse(content)
    }

    /// Loads every `.weave` file in a directory.
    ///
    /// Directories and other extensions are skipped. Each element of the result is either the
    /// path and its design, or the error that file produced. Results are sorted by path.
    pub fn load_designs(directory: &Path) -> Vec<Result<(PathBuf, Design), SimulationError>> {
        if !directory.exists() {
            return vec![Err(SimulationError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(SimulationError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();

        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(SimulationError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }

        paths.sort();

        // Skip directories and non-.weave files
        paths.retain(|path| !path.is_dir() && path.extension().is_some_and(|ext| ext == "weave"));

        results.extend(paths.into_iter().map(|path| match Self::load_design(&path) {
            Ok(design) => Ok((path, design)),
            Err(e) => Err(SimulationError::FileError(format!(
                "Failed to load design from {}: {}",
                path.display(),
                e
            ))),
        }));

        results
    }
}
