//! This module defines the `Tape`, a sparse symbol store with a boundary policy and a
//! buffer of writes scheduled during the current tick, and the `TapeArena` that owns
//! every tape of a simulation so heads can refer to them by index.

use crate::types::{
    Boundary, HeadId, MachineId, Position, SimulationError, Symbol, TapeId, TapeSpec,
    WriteConflict, BLANK, END, MAX_CONTENT_GAP, START,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Stands in for a long run of blank cells in rendered content.
pub const ELISION: &str = "...";

/// A write registered since the last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingWrite {
    content: Symbol,
    machine: MachineId,
    head: HeadId,
}

/// A one-dimensional symbol store.
///
/// Cells that were never written (or were written with `BLANK`) are not stored. Writes
/// go through [`Tape::schedule_write`] and only become visible after
/// [`Tape::commit_pending_writes`], so every reader within a tick sees the same tape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tape {
    id: TapeId,
    boundary: Boundary,
    cells: BTreeMap<Position, Symbol>,
    pending: BTreeMap<Position, Vec<PendingWrite>>,
}

impl Tape {
    /// Creates an empty tape.
    pub fn new(id: TapeId, boundary: Boundary) -> Self {
        Self {
            id,
            boundary,
            cells: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Creates a tape whose content is laid out from position 0.
    ///
    /// `BLANK` characters leave their cell unset and characters that fall outside the
    /// content range are dropped.
    pub fn with_content(id: TapeId, boundary: Boundary, content: &str) -> Self {
        let mut tape = Self::new(id, boundary);
        for (position, symbol) in (0..).zip(content.chars()) {
            if tape.contains(position) {
                tape.set(position, symbol);
            }
        }
        tape
    }

    pub fn id(&self) -> TapeId {
        self.id
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Returns the symbol visible at `position`.
    ///
    /// Marker cells read as `START`/`END`, unset content cells read as `BLANK`, and
    /// positions outside a bounded tape read as `None`.
    pub fn try_read(&self, position: Position) -> Option<Symbol> {
        self.marker_at(position).or_else(|| {
            self.contains(position)
                .then(|| self.cells.get(&position).copied().unwrap_or(BLANK))
        })
    }

    /// Computes where a head at `position` ends up after moving `steps` cells.
    pub fn moved_position(&self, position: Position, steps: i64) -> Position {
        let target = position.saturating_add(steps);
        match self.boundary {
            Boundary::Infinite => target,
            Boundary::LeftLimited => target.max(-1),
            Boundary::RightLimited { length } => target.min(span(length)),
            Boundary::LeftRightLimited { length } => target.clamp(-1, span(length)),
            Boundary::Circular { length } => {
                if length == 0 {
                    position
                } else {
                    target.rem_euclid(span(length))
                }
            }
        }
    }

    /// Registers an intended write without touching the visible cell.
    pub fn schedule_write(
        &mut self,
        position: Position,
        content: Symbol,
        machine: MachineId,
        head: HeadId,
    ) -> Result<(), SimulationError> {
        if self.marker_at(position).is_some() {
            return Err(SimulationError::BoundaryViolation {
                tape: self.id,
                position,
            });
        }

        if !self.contains(position) {
            return Err(SimulationError::OutOfRange {
                tape: self.id,
                position,
            });
        }

        self.pending.entry(position).or_default().push(PendingWrite {
            content,
            machine,
            head,
        });

        Ok(())
    }

    /// Applies every uncontested pending write and clears the buffer.
    ///
    /// A cell is contested when the writes registered for it disagree on the content.
    /// Contested cells keep their previous symbol and are reported back; writes that agree
    /// are applied once no matter how many heads registered them.
    pub fn commit_pending_writes(&mut self) -> Vec<WriteConflict> {
        let pending = std::mem::take(&mut self.pending);
        let mut conflicts = Vec::new();

        for (position, writes) in pending {
            let Some(first) = writes.first() else {
                continue;
            };

            if writes.iter().all(|write| write.content == first.content) {
                self.set(position, first.content);
            } else {
                debug!(tape = self.id, position, writes = writes.len(), "contested cell");
                conflicts.push(WriteConflict {
                    tape: self.id,
                    position,
                    contenders: writes.iter().map(|w| (w.machine, w.head)).collect(),
                });
            }
        }

        conflicts
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Checks whether a head may stand on `position`: a content cell or a marker cell.
    pub fn is_addressable(&self, position: Position) -> bool {
        self.try_read(position).is_some()
    }

    /// Returns the lowest and highest written positions, if any cell is set.
    pub fn written_extent(&self) -> Option<(Position, Position)> {
        let first = self.cells.keys().next()?;
        let last = self.cells.keys().next_back()?;
        Some((*first, *last))
    }

    /// Renders the visible symbols of `[from, to]`, clipped to addressable cells.
    ///
    /// Returns the position of the first rendered cell along with the rendered symbols.
    pub fn window(&self, from: Position, to: Position) -> (Position, String) {
        let (low, high) = self.addressable_range();
        let from = low.map_or(from, |low| from.max(low));
        let to = high.map_or(to, |high| to.min(high));

        let cells = (from..=to).filter_map(|p| self.try_read(p)).collect();
        (from, cells)
    }

    /// Renders a window of `radius` cells around every anchor.
    ///
    /// Windows that overlap or touch are merged, so the result is a list of disjoint
    /// `(start, cells)` segments in position order. The rendered size depends only on the
    /// number of anchors, never on how far apart they are.
    pub fn windows(&self, anchors: &[Position], radius: i64) -> Vec<(Position, String)> {
        let mut spans: Vec<(Position, Position)> = anchors
            .iter()
            .map(|&anchor| (anchor.saturating_sub(radius), anchor.saturating_add(radius)))
            .collect();
        spans.sort_unstable();

        let mut merged: Vec<(Position, Position)> = Vec::new();
        for (low, high) in spans {
            match merged.last_mut() {
                Some((_, last)) if low <= last.saturating_add(1) => *last = (*last).max(high),
                _ => merged.push((low, high)),
            }
        }

        merged
            .into_iter()
            .map(|(low, high)| self.window(low, high))
            .filter(|(_, cells)| !cells.is_empty())
            .collect()
    }

    /// Renders the tape's content cells from the leftmost written or position-0 cell to
    /// the rightmost written cell.
    ///
    /// Runs of more than `MAX_CONTENT_GAP` blank cells are collapsed to `ELISION`, so the
    /// result grows with the number of written cells rather than with their spread.
    pub fn content(&self) -> String {
        let Some((first, _)) = self.written_extent() else {
            return String::new();
        };

        let mut rendered = String::new();
        let mut next = first.min(0);

        for (&position, &symbol) in &self.cells {
            let gap = position.saturating_sub(next);
            if gap > MAX_CONTENT_GAP {
                rendered.push_str(ELISION);
            } else {
                rendered.extend(std::iter::repeat(BLANK).take(gap as usize));
            }
            rendered.push(symbol);
            next = position.saturating_add(1);
        }

        rendered
    }

    fn addressable_range(&self) -> (Option<Position>, Option<Position>) {
        match self.boundary {
            Boundary::Infinite => (None, None),
            Boundary::LeftLimited => (Some(-1), None),
            Boundary::RightLimited { length } => (None, Some(span(length))),
            Boundary::LeftRightLimited { length } => (Some(-1), Some(span(length))),
            Boundary::Circular { length } => (Some(0), Some(span(length) - 1)),
        }
    }

    /// Checks whether `position` is a content cell.
    fn contains(&self, position: Position) -> bool {
        match self.boundary {
            Boundary::Infinite => true,
            Boundary::LeftLimited => position >= 0,
            Boundary::RightLimited { length } => position < span(length),
            Boundary::LeftRightLimited { length } | Boundary::Circular { length } => {
                (0..span(length)).contains(&position)
            }
        }
    }

    fn marker_at(&self, position: Position) -> Option<Symbol> {
        if self.boundary.has_left_marker() && position == -1 {
            return Some(START);
        }

        match self.boundary.length() {
            Some(length) if self.boundary.has_right_marker() && position == span(length) => {
                Some(END)
            }
            _ => None,
        }
    }

    fn set(&mut self, position: Position, symbol: Symbol) {
        if symbol == BLANK {
            self.cells.remove(&position);
        } else {
            self.cells.insert(position, symbol);
        }
    }
}

fn span(length: usize) -> Position {
    Position::try_from(length).unwrap_or(Position::MAX)
}

/// Owns every tape of a simulation. Heads hold a `TapeId` into the arena instead of a
/// reference, so many heads across many machines can share one tape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TapeArena {
    tapes: Vec<Tape>,
}

impl TapeArena {
    /// Builds an arena from tape specifications, assigning ids in order.
    pub fn from_specs(specs: &[TapeSpec]) -> Self {
        Self {
            tapes: specs
                .iter()
                .enumerate()
                .map(|(id, spec)| Tape::with_content(id, spec.boundary, &spec.content))
                .collect(),
        }
    }

    /// Adds a tape and returns its id.
    pub fn push(&mut self, boundary: Boundary, content: &str) -> TapeId {
        let id = self.tapes.len();
        self.tapes.push(Tape::with_content(id, boundary, content));
        id
    }

    pub fn get(&self, id: TapeId) -> Option<&Tape> {
        self.tapes.get(id)
    }

    pub fn get_mut(&mut self, id: TapeId) -> Option<&mut Tape> {
        self.tapes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.tapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tapes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tape> {
        self.tapes.iter()
    }

    /// Commits the pending writes of every tape touched this tick.
    pub fn commit_pending_writes(&mut self) -> Vec<WriteConflict> {
        self.tapes
            .iter_mut()
            .filter(|tape| tape.has_pending_writes())
            .flat_map(|tape| tape.commit_pending_writes())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_tape_reads_blank_everywhere() {
        let tape = Tape::with_content(0, Boundary::Infinite, "ab");

        assert_eq!(tape.try_read(0), Some('a'));
        assert_eq!(tape.try_read(1), Some('b'));
        assert_eq!(tape.try_read(2), Some(BLANK));
        assert_eq!(tape.try_read(-50), Some(BLANK));
    }

    #[test]
    fn test_left_limited_markers_and_bounds() {
        let tape = Tape::with_content(0, Boundary::LeftLimited, "111");

        assert_eq!(tape.try_read(-1), Some(START));
        assert_eq!(tape.try_read(-2), None);
        assert_eq!(tape.try_read(3), Some(BLANK));
        assert_eq!(tape.moved_position(0, -5), -1);
        assert_eq!(tape.moved_position(2, 10), 12);
    }

    #[test]
    fn test_right_limited_markers_and_bounds() {
        let tape = Tape::with_content(0, Boundary::RightLimited { length: 2 }, "xy");

        assert_eq!(tape.try_read(2), Some(END));
        assert_eq!(tape.try_read(3), None);
        assert_eq!(tape.try_read(-7), Some(BLANK));
        assert_eq!(tape.moved_position(1, 4), 2);
        assert_eq!(tape.moved_position(1, -4), -3);
    }

    #[test]
    fn test_left_right_limited_clamps_both_ends() {
        let tape = Tape::with_content(0, Boundary::LeftRightLimited { length: 3 }, "abc");

        assert_eq!(tape.try_read(-1), Some(START));
        assert_eq!(tape.try_read(3), Some(END));
        assert_eq!(tape.try_read(4), None);
        assert_eq!(tape.try_read(-2), None);
        assert_eq!(tape.moved_position(1, 100), 3);
        assert_eq!(tape.moved_position(1, -100), -1);
    }

    #[test]
    fn test_circular_wraps_both_directions() {
        let tape = Tape::new(0, Boundary::Circular { length: 4 });

        assert_eq!(tape.moved_position(3, 1), 0);
        assert_eq!(tape.moved_position(0, -1), 3);
        assert_eq!(tape.moved_position(1, -9), 0);
        assert_eq!(tape.try_read(4), None);
        assert_eq!(tape.try_read(-1), None);
    }

    #[test]
    fn test_content_outside_fixed_length_is_dropped() {
        let tape = Tape::with_content(0, Boundary::LeftRightLimited { length: 2 }, "abcd");

        assert_eq!(tape.try_read(1), Some('b'));
        assert_eq!(tape.try_read(2), Some(END));
        assert_eq!(tape.content(), "ab");
    }

    #[test]
    fn test_scheduled_write_is_invisible_until_commit() {
        let mut tape = Tape::with_content(0, Boundary::Infinite, "a");

        tape.schedule_write(0, 'b', 0, 0).unwrap();
        assert_eq!(tape.try_read(0), Some('a'));
        assert!(tape.has_pending_writes());

        let conflicts = tape.commit_pending_writes();
        assert!(conflicts.is_empty());
        assert_eq!(tape.try_read(0), Some('b'));
        assert!(!tape.has_pending_writes());
    }

    #[test]
    fn test_schedule_write_rejects_markers_and_out_of_range() {
        let mut tape = Tape::new(3, Boundary::LeftRightLimited { length: 2 });

        assert_eq!(
            tape.schedule_write(-1, 'x', 0, 0),
            Err(SimulationError::BoundaryViolation {
                tape: 3,
                position: -1
            })
        );
        assert_eq!(
            tape.schedule_write(2, 'x', 0, 0),
            Err(SimulationError::BoundaryViolation {
                tape: 3,
                position: 2
            })
        );
        assert_eq!(
            tape.schedule_write(5, 'x', 0, 0),
            Err(SimulationError::OutOfRange {
                tape: 3,
                position: 5
            })
        );
        assert!(!tape.has_pending_writes());
    }

    #[test]
    fn test_conflicting_writes_are_not_applied() {
        let mut tape = Tape::with_content(0, Boundary::Infinite, "_");

        tape.schedule_write(0, '1', 0, 0).unwrap();
        tape.schedule_write(0, '0', 1, 0).unwrap();
        tape.schedule_write(1, 'z', 1, 1).unwrap();

        let conflicts = tape.commit_pending_writes();

        assert_eq!(
            conflicts,
            vec![WriteConflict {
                tape: 0,
                position: 0,
                contenders: vec![(0, 0), (1, 0)],
            }]
        );
        assert_eq!(tape.try_read(0), Some(BLANK));
        assert_eq!(tape.try_read(1), Some('z'));
        assert!(!tape.has_pending_writes());
    }

    #[test]
    fn test_agreeing_writes_from_many_heads_are_applied() {
        let mut tape = Tape::new(0, Boundary::Infinite);

        tape.schedule_write(4, 'q', 0, 0).unwrap();
        tape.schedule_write(4, 'q', 1, 2).unwrap();

        assert!(tape.commit_pending_writes().is_empty());
        assert_eq!(tape.try_read(4), Some('q'));
    }

    #[test]
    fn test_blank_write_clears_cell() {
        let mut tape = Tape::with_content(0, Boundary::Infinite, "ab");

        tape.schedule_write(1, BLANK, 0, 0).unwrap();
        tape.commit_pending_writes();

        assert_eq!(tape.written_extent(), Some((0, 0)));
        assert_eq!(tape.content(), "a");
    }

    #[test]
    fn test_window_is_clipped_to_addressable_cells() {
        let tape = Tape::with_content(0, Boundary::LeftRightLimited { length: 3 }, "abc");

        assert_eq!(tape.window(-5, 10), (-1, ">abc<".to_string()));
        assert_eq!(tape.window(1, 2), (1, "bc".to_string()));

        let infinite = Tape::with_content(0, Boundary::Infinite, "ab");
        assert_eq!(infinite.window(-2, 3), (-2, "__ab__".to_string()));
    }

    #[test]
    fn test_windows_merge_only_when_they_meet() {
        let tape = Tape::with_content(0, Boundary::Infinite, "abc");

        assert_eq!(tape.windows(&[0, 2], 1), vec![(-1, "_abc_".to_string())]);
        assert_eq!(tape.windows(&[0, 3], 1), vec![(-1, "_abc__".to_string())]);
        assert_eq!(
            tape.windows(&[0, 5], 1),
            vec![(-1, "_ab".to_string()), (4, "___".to_string())]
        );
        assert!(tape.windows(&[], 8).is_empty());
    }

    #[test]
    fn test_windows_stay_small_for_distant_anchors() {
        let tape = Tape::with_content(0, Boundary::Infinite, "a");

        let segments = tape.windows(&[20_000_000, 0, 0], 8);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].0, -8);
        assert_eq!(segments[1].0, 20_000_000 - 8);
        assert!(segments.iter().all(|(_, cells)| cells.len() == 17));
    }

    #[test]
    fn test_windows_are_clipped_to_the_tape() {
        let tape = Tape::with_content(0, Boundary::LeftLimited, "ab");
        assert_eq!(tape.windows(&[0], 3), vec![(-1, ">ab__".to_string())]);

        let ring = Tape::with_content(0, Boundary::Circular { length: 2 }, "xy");
        assert_eq!(ring.windows(&[0, 1], 8), vec![(0, "xy".to_string())]);
    }

    #[test]
    fn test_content_elides_long_blank_runs() {
        let mut tape = Tape::with_content(0, Boundary::Infinite, "a");
        tape.schedule_write(30_000_000, 'x', 0, 0).unwrap();
        tape.commit_pending_writes();

        assert_eq!(tape.content(), format!("a{ELISION}x"));

        let far_left = Tape::with_content(0, Boundary::Infinite, "");
        assert_eq!(far_left.content(), "");

        let mut short_gap = Tape::new(0, Boundary::Infinite);
        short_gap.schedule_write(3, 'z', 0, 0).unwrap();
        short_gap.commit_pending_writes();
        assert_eq!(short_gap.content(), "___z");
    }

    #[test]
    fn test_arena_commits_every_touched_tape() {
        let mut arena = TapeArena::default();
        let first = arena.push(Boundary::Infinite, "");
        let second = arena.push(Boundary::Circular { length: 2 }, "");

        arena.get_mut(first).unwrap().schedule_write(0, 'a', 0, 0).unwrap();
        arena.get_mut(second).unwrap().schedule_write(1, 'b', 0, 1).unwrap();
        arena.get_mut(second).unwrap().schedule_write(1, 'c', 1, 0).unwrap();

        let conflicts = arena.commit_pending_writes();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].tape, second);
        assert_eq!(arena.get(first).unwrap().try_read(0), Some('a'));
        assert_eq!(arena.get(second).unwrap().try_read(1), Some(BLANK));
        assert_eq!(arena.len(), 2);
    }
}
