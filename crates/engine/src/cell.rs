//! Cell content variants and the per-cell memo state.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::{FormulaError, ParseError};
use crate::formula::{CellLookup, Formula};
use crate::position::Position;

/// Marks formula input.
pub const FORMULA_SIGN: char = '=';
/// Escapes text input; stripped when producing the displayed value.
pub const ESCAPE_SIGN: char = '\'';

/// Which content variant a cell currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Empty,
    Text,
    Formula,
}

/// A computed cell value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Error(FormulaError),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Tagged content of one cell.
///
/// The memo slot exists only in the formula case and is interior-mutable:
/// the first value read fills it behind a shared reference, which is also
/// why the sheet is not safe for concurrent readers.
#[derive(Debug, Default)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Formula {
        formula: Formula,
        cache: RefCell<Option<Value>>,
    },
}

impl Content {
    /// Classify raw input text. Order matters: empty input first, then
    /// anything that is not formula-shaped (including the bare `=`), then a
    /// parse attempt on the rest.
    pub fn classify(text: &str) -> Result<Content, ParseError> {
        if text.is_empty() {
            return Ok(Content::Empty);
        }
        if !text.starts_with(FORMULA_SIGN) || text.len() == 1 {
            return Ok(Content::Text(text.to_string()));
        }
        let formula = Formula::parse(&text[1..])?;
        Ok(Content::Formula {
            formula,
            cache: RefCell::new(None),
        })
    }
}

/// One cell: exactly one content variant.
#[derive(Debug, Default)]
pub struct Cell {
    content: Content,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_content(content: Content) -> Self {
        Self { content }
    }

    /// Swap in new content, returning the old. The sheet uses this for both
    /// install and rollback.
    pub(crate) fn replace_content(&mut self, content: Content) -> Content {
        std::mem::replace(&mut self.content, content)
    }

    pub fn content_type(&self) -> ContentType {
        match &self.content {
            Content::Empty => ContentType::Empty,
            Content::Text(_) => ContentType::Text,
            Content::Formula { .. } => ContentType::Formula,
        }
    }

    /// The cell's computed value.
    ///
    /// Empty cells are numeric zero, so formulas referencing them see 0.
    /// Formula results are memoised on first read; a non-finite number
    /// surfaces as the division-by-zero error.
    pub fn value<L: CellLookup>(&self, lookup: &L) -> Value {
        match &self.content {
            Content::Empty => Value::Number(0.0),
            Content::Text(raw) => {
                let shown = raw.strip_prefix(ESCAPE_SIGN).unwrap_or(raw);
                Value::Text(shown.to_string())
            }
            Content::Formula { formula, cache } => {
                if let Some(v) = cache.borrow().as_ref() {
                    return v.clone();
                }
                let v = match formula.evaluate(lookup) {
                    Ok(n) if n.is_finite() => Value::Number(n),
                    Ok(_) => Value::Error(FormulaError::Div0),
                    Err(e) => Value::Error(e),
                };
                *cache.borrow_mut() = Some(v.clone());
                v
            }
        }
    }

    /// The cell's stored text: raw for text cells (escape preserved), `=`
    /// plus the canonical expression for formulas.
    pub fn text(&self) -> String {
        match &self.content {
            Content::Empty => String::new(),
            Content::Text(raw) => raw.clone(),
            Content::Formula { formula, .. } => {
                format!("{}{}", FORMULA_SIGN, formula.expression())
            }
        }
    }

    /// Positions this cell's formula reads. Empty for non-formulas.
    pub fn referenced_cells(&self) -> &[Position] {
        match &self.content {
            Content::Formula { formula, .. } => formula.referenced_cells(),
            _ => &[],
        }
    }

    /// Drop the memoised value. No-op for non-formula content.
    pub fn invalidate_cache(&self) {
        if let Content::Formula { cache, .. } = &self.content {
            cache.borrow_mut().take();
        }
    }

    /// True when a value read would not recompute.
    pub fn is_cache_valid(&self) -> bool {
        match &self.content {
            Content::Formula { cache, .. } => cache.borrow().is_some(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every referenced position reads as zero.
    struct Zeros;

    impl CellLookup for Zeros {
        fn value_at(&self, _pos: Position) -> Result<f64, FormulaError> {
            Ok(0.0)
        }
    }

    fn cell_from(text: &str) -> Cell {
        Cell::with_content(Content::classify(text).unwrap())
    }

    #[test]
    fn test_classify_empty() {
        let cell = cell_from("");
        assert_eq!(cell.content_type(), ContentType::Empty);
        assert_eq!(cell.text(), "");
        assert_eq!(cell.value(&Zeros), Value::Number(0.0));
        assert!(cell.referenced_cells().is_empty());
    }

    #[test]
    fn test_classify_text() {
        let cell = cell_from("hello");
        assert_eq!(cell.content_type(), ContentType::Text);
        assert_eq!(cell.text(), "hello");
        assert_eq!(cell.value(&Zeros), Value::Text("hello".to_string()));
    }

    #[test]
    fn test_bare_sigil_is_text() {
        let cell = cell_from("=");
        assert_eq!(cell.content_type(), ContentType::Text);
        assert_eq!(cell.text(), "=");
        assert_eq!(cell.value(&Zeros), Value::Text("=".to_string()));
    }

    #[test]
    fn test_escaped_text_strips_one_quote() {
        let cell = cell_from("'hello");
        assert_eq!(cell.text(), "'hello");
        assert_eq!(cell.value(&Zeros), Value::Text("hello".to_string()));

        // only one escape is stripped
        let cell = cell_from("''x");
        assert_eq!(cell.value(&Zeros), Value::Text("'x".to_string()));

        // a lone escape displays as the empty string
        let cell = cell_from("'");
        assert_eq!(cell.text(), "'");
        assert_eq!(cell.value(&Zeros), Value::Text(String::new()));

        // escape sigil only matters at the start
        let cell = cell_from("it's");
        assert_eq!(cell.value(&Zeros), Value::Text("it's".to_string()));
    }

    #[test]
    fn test_classify_formula() {
        let cell = cell_from("=1+2");
        assert_eq!(cell.content_type(), ContentType::Formula);
        assert_eq!(cell.text(), "=1+2");
        assert_eq!(cell.value(&Zeros), Value::Number(3.0));
    }

    #[test]
    fn test_classify_formula_canonicalises_text() {
        let cell = cell_from("=  1 +  2 ");
        assert_eq!(cell.text(), "=1+2");
    }

    #[test]
    fn test_classify_rejects_bad_formula() {
        assert!(Content::classify("=(").is_err());
        assert!(Content::classify("=SUM(A1)").is_err());
    }

    #[test]
    fn test_cache_state_machine() {
        let cell = cell_from("=1+1");
        assert!(!cell.is_cache_valid());

        assert_eq!(cell.value(&Zeros), Value::Number(2.0));
        assert!(cell.is_cache_valid());

        cell.invalidate_cache();
        assert!(!cell.is_cache_valid());

        assert_eq!(cell.value(&Zeros), Value::Number(2.0));
        assert!(cell.is_cache_valid());
    }

    #[test]
    fn test_non_formula_cache_trivially_valid() {
        let cell = cell_from("hi");
        assert!(cell.is_cache_valid());
        cell.invalidate_cache();
        assert!(cell.is_cache_valid());

        let cell = cell_from("");
        assert!(cell.is_cache_valid());
    }

    #[test]
    fn test_non_finite_maps_to_div0() {
        let cell = cell_from("=1/0");
        assert_eq!(cell.value(&Zeros), Value::Error(FormulaError::Div0));
        // the error itself is memoised
        assert!(cell.is_cache_valid());

        let cell = cell_from("=0/0");
        assert_eq!(cell.value(&Zeros), Value::Error(FormulaError::Div0));
    }

    #[test]
    fn test_referenced_cells_from_formula() {
        let cell = cell_from("=B1+A2");
        assert_eq!(
            cell.referenced_cells(),
            &[Position::new(0, 1), Position::new(1, 0)]
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Text("abc".to_string()).to_string(), "abc");
        assert_eq!(Value::Error(FormulaError::Div0).to_string(), "#DIV/0!");
    }
}
