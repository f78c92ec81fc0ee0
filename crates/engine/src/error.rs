//! The two error planes.
//!
//! Structural errors (`SheetError`) abort the calling operation and leave the
//! sheet unchanged. Formula errors (`FormulaError`) are ordinary values: they
//! are stored, memoised, printed, and propagate through dependent formulas
//! like any other result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::Position;

/// Evaluation-plane error carried in the value channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaError {
    /// Reference that cannot be resolved to an addressable cell.
    Ref,
    /// A referenced value could not be converted to a number.
    Value,
    /// Arithmetic fault.
    Arithm,
    /// Division by zero. Any non-finite evaluation result collapses to this.
    Div0,
}

impl FormulaError {
    /// The stable token printed for this error.
    pub fn as_token(&self) -> &'static str {
        match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Arithm => "#ARITHM!",
            FormulaError::Div0 => "#DIV/0!",
        }
    }
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Formula text that could not be parsed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(pub String);

/// Diagnostic attached to a rejected circular dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    /// Cells known to participate in the cycle.
    pub cells: Vec<Position>,
    /// Human-readable description.
    pub message: String,
}

impl CycleReport {
    /// Report for a cell that references itself directly.
    pub fn self_reference(cell: Position) -> Self {
        Self {
            cells: vec![cell],
            message: format!("Cell {} references itself", cell),
        }
    }

    /// Report for a cycle closing back through `cells`.
    pub fn cycle(cells: Vec<Position>) -> Self {
        let list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = format!("Circular reference through {}", list.join(" -> "));
        Self { cells, message }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Structural failure raised at the public sheet boundary.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SheetError {
    #[error("invalid position {0:?}")]
    InvalidPosition(Position),

    #[error("formula syntax error: {0}")]
    FormulaSyntax(#[from] ParseError),

    #[error("circular dependency: {0}")]
    CircularDependency(CycleReport),

    #[error("printable area is out of date")]
    NoValidPrintableArea,
}
