//! The sparse sheet: cell storage, mutation routing, printable-area
//! tracking, cycle probing, and transitive cache invalidation.
//!
//! Storage is row-major: an outer vector of rows, each row a vector of
//! optional cell slots. Gaps stay `None`. The printable area is the smallest
//! rectangle anchored at the origin that contains every occupied slot; a
//! cell holding empty content still counts as occupied.

use std::io::{self, Write};

use rustc_hash::FxHashSet;

use crate::cell::{Cell, Content, ContentType, Value};
use crate::dep_graph::DepGraph;
use crate::error::{CycleReport, FormulaError, SheetError};
use crate::formula::CellLookup;
use crate::position::{Position, Size};

#[derive(Debug)]
pub struct Sheet {
    rows: Vec<Vec<Option<Cell>>>,
    deps: DepGraph,
    max_row: usize,
    max_col: usize,
    area_valid: bool,
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Sheet {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            deps: DepGraph::new(),
            max_row: 0,
            max_col: 0,
            area_valid: true,
        }
    }

    /// Install `text` at `pos`.
    ///
    /// Side effects on an occupied slot are ordered: snapshot, downstream
    /// cache invalidation, teardown of the old content's reference
    /// registrations, content install, cycle probe, then either edge
    /// registration plus a printable-area refresh, or a full rollback. A
    /// failed call leaves the sheet observably identical to its pre-call
    /// state.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        // Classify (and parse) before touching anything: a syntax error must
        // leave the sheet untouched.
        let content = Content::classify(text)?;
        self.reserve(pos);

        let existed = self.slot(pos).is_some();

        // Empty input on an occupied slot drops it, like a clear, but still
        // notifies dependents that their input changed.
        if existed && matches!(content, Content::Empty) {
            self.invalidate_downstream(pos);
            let old_refs: Vec<Position> = self
                .slot(pos)
                .map(|c| c.referenced_cells().to_vec())
                .unwrap_or_default();
            for p in &old_refs {
                self.deps.remove_edge(*p, pos);
            }
            self.rows[pos.row][pos.col] = None;
            if pos.row + 1 == self.max_row || pos.col + 1 == self.max_col {
                self.area_valid = false;
                self.update_printable_size();
            }
            return Ok(());
        }

        let mut snapshot: Option<Content> = None;
        let mut old_refs: Vec<Position> = Vec::new();

        if existed {
            self.invalidate_downstream(pos);
            old_refs = self
                .slot(pos)
                .map(|c| c.referenced_cells().to_vec())
                .unwrap_or_default();
            for p in &old_refs {
                self.deps.remove_edge(*p, pos);
            }
            if let Some(cell) = self.slot_mut(pos) {
                snapshot = Some(cell.replace_content(content));
            }
        } else {
            self.rows[pos.row][pos.col] = Some(Cell::with_content(content));
        }

        let new_refs: Vec<Position> = self
            .slot(pos)
            .map(|c| c.referenced_cells().to_vec())
            .unwrap_or_default();

        let mut materialised: Vec<Position> = Vec::new();
        if self.probe_cycle(pos, &new_refs, &mut materialised) {
            // Roll back: placeholders out, snapshot and edges back in. The
            // printable area was not touched since entry, so it needs no
            // refresh here.
            for p in materialised {
                self.rows[p.row][p.col] = None;
            }
            if existed {
                if let Some(old) = snapshot {
                    if let Some(cell) = self.slot_mut(pos) {
                        cell.replace_content(old);
                    }
                }
                for p in &old_refs {
                    self.deps.add_edge(*p, pos);
                }
            } else {
                self.rows[pos.row][pos.col] = None;
            }
            let report = if new_refs.contains(&pos) {
                CycleReport::self_reference(pos)
            } else {
                CycleReport::cycle(vec![pos])
            };
            return Err(SheetError::CircularDependency(report));
        }

        for p in &new_refs {
            self.deps.add_edge(*p, pos);
        }
        if !existed || !materialised.is_empty() {
            self.update_printable_size();
        }
        Ok(())
    }

    /// The cell at `pos`, if one is materialised. Placeholders created to
    /// resolve forward references are returned as empty-content cells.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        Ok(self.slot(pos))
    }

    /// Drop the cell at `pos`, if any.
    ///
    /// Downstream caches are deliberately left alone: the next read of a
    /// dependent recomputes against the now-missing input, which reads as
    /// zero.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        if self.slot(pos).is_some() {
            self.rows[pos.row][pos.col] = None;
            // Only a frontier clear can shrink the printable area.
            if pos.row + 1 == self.max_row || pos.col + 1 == self.max_col {
                self.area_valid = false;
                self.update_printable_size();
            }
        }
        Ok(())
    }

    /// Current printable area.
    pub fn printable_size(&self) -> Result<Size, SheetError> {
        if self.area_valid {
            Ok(Size {
                rows: self.max_row,
                cols: self.max_col,
            })
        } else {
            Err(SheetError::NoValidPrintableArea)
        }
    }

    /// Write tab-separated cell values, one line per printable row.
    ///
    /// Cells holding empty content produce empty fields even though their
    /// value accessor reports numeric zero.
    pub fn print_values<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for row in 0..self.max_row {
            for col in 0..self.max_col {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.slot(Position::new(row, col)) {
                    if cell.content_type() != ContentType::Empty {
                        write!(out, "{}", cell.value(self))?;
                    }
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write tab-separated stored texts, one line per printable row.
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for row in 0..self.max_row {
            for col in 0..self.max_col {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.slot(Position::new(row, col)) {
                    out.write_all(cell.text().as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Current consumers of `pos` in the dependency graph.
    pub fn dependents_of(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        self.deps.edges_of(pos)
    }

    fn slot(&self, pos: Position) -> Option<&Cell> {
        self.rows.get(pos.row)?.get(pos.col)?.as_ref()
    }

    fn slot_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.rows.get_mut(pos.row)?.get_mut(pos.col)?.as_mut()
    }

    /// Grow storage so `pos` is addressable. Existing contents are kept and
    /// gaps stay `None`.
    fn reserve(&mut self, pos: Position) {
        if self.rows.len() < pos.row + 1 {
            self.rows.resize_with(pos.row + 1, Vec::new);
        }
        let row = &mut self.rows[pos.row];
        if row.len() < pos.col + 1 {
            row.resize_with(pos.col + 1, || None);
        }
    }

    /// Full rescan of the occupied bounding box.
    fn update_printable_size(&mut self) {
        self.max_row = 0;
        self.max_col = 0;
        for (r, row) in self.rows.iter().enumerate() {
            for (c, slot) in row.iter().enumerate() {
                if slot.is_some() {
                    self.max_row = self.max_row.max(r + 1);
                    self.max_col = self.max_col.max(c + 1);
                }
            }
        }
        self.area_valid = true;
    }

    /// Depth-first walk of the consumer graph from `pos`, dropping memoised
    /// values along the way. Visited tracking bounds the work on diamonds.
    fn invalidate_downstream(&self, pos: Position) {
        let mut visited: FxHashSet<Position> = FxHashSet::default();
        let mut stack: Vec<Position> = self.deps.edges_of(pos).collect();
        while let Some(p) = stack.pop() {
            if !visited.insert(p) {
                continue;
            }
            if let Some(cell) = self.slot(p) {
                cell.invalidate_cache();
            }
            stack.extend(self.deps.edges_of(p));
        }
    }

    /// Start-rooted probe over the would-be reference graph of `start`.
    ///
    /// `frontier` is the freshly installed content's reference list. The
    /// existing graph is acyclic, so the only possible cycle is a path that
    /// closes back on `start`; reaching `start` proves one. A referenced
    /// slot that does not exist yet is materialised as an empty cell
    /// (forward references are legal and read as zero); every such position
    /// is recorded in `materialised` so a failed probe can undo it.
    fn probe_cycle(
        &mut self,
        start: Position,
        frontier: &[Position],
        materialised: &mut Vec<Position>,
    ) -> bool {
        let mut visited: FxHashSet<Position> = FxHashSet::default();
        let mut stack: Vec<Position> = frontier.to_vec();
        while let Some(p) = stack.pop() {
            if p == start {
                return true;
            }
            if !visited.insert(p) {
                continue;
            }
            if let Some(cell) = self.slot(p) {
                stack.extend(cell.referenced_cells().iter().copied());
            } else {
                // A fresh empty cell references nothing, so no recursion.
                self.reserve(p);
                self.rows[p.row][p.col] = Some(Cell::new());
                materialised.push(p);
            }
        }
        false
    }
}

/// Resolution of referenced positions during formula evaluation. Missing
/// cells read as zero, text must convert to a number, stored errors
/// propagate unchanged.
impl CellLookup for Sheet {
    fn value_at(&self, pos: Position) -> Result<f64, FormulaError> {
        if !pos.is_valid() {
            return Err(FormulaError::Ref);
        }
        match self.slot(pos) {
            None => Ok(0.0),
            Some(cell) => match cell.value(self) {
                Value::Number(n) => Ok(n),
                Value::Text(s) => s.parse().map_err(|_| FormulaError::Value),
                Value::Error(e) => Err(e),
            },
        }
    }
}
