//! Expression evaluation against a cell-value source.

use crate::error::FormulaError;
use crate::position::Position;

use super::parser::{BinOp, Expr, UnaryOp};

/// Value source for evaluation: resolves a referenced position to a number
/// or a formula error. Implemented by the sheet.
pub trait CellLookup {
    fn value_at(&self, pos: Position) -> Result<f64, FormulaError>;
}

/// Evaluate an expression tree.
///
/// Division by zero is not special-cased here: the non-finite result is
/// mapped to an error at the cell boundary, where memoisation happens.
pub fn evaluate<L: CellLookup>(expr: &Expr, lookup: &L) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => lookup.value_at(*pos),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, lookup)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, lookup)?;
            let r = evaluate(right, lookup)?;
            Ok(match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
            })
        }
    }
}
