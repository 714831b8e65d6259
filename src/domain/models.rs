//! Cell contents and cached values.

use std::fmt;

use super::errors::FormulaError;
use super::parser::Expression;

/// What a cell holds: a number, plain text, or a parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContents {
    Number(f64),
    Text(String),
    Formula(Expression),
}

impl CellContents {
    /// Empty text contents mean "no cell"; the spreadsheet removes the
    /// entry instead of storing it.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellContents::Text(text) if text.is_empty())
    }

    /// The editable input form: formulas get their `=` prefix back.
    pub fn to_input_string(&self) -> String {
        match self {
            CellContents::Number(n) => n.to_string(),
            CellContents::Text(text) => text.clone(),
            CellContents::Formula(expr) => format!("={expr}"),
        }
    }
}

/// The computed value of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Error(FormulaError),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Error(_) => write!(f, "#ERROR"),
        }
    }
}

/// One spreadsheet slot: contents plus the cached computed value.
#[derive(Debug, Clone)]
pub struct Cell {
    contents: CellContents,
    value: CellValue,
}

impl Cell {
    /// Creates a cell and computes its value through `lookup`.
    pub fn new<L>(contents: CellContents, lookup: L) -> Self
    where
        L: Fn(&str) -> Option<f64>,
    {
        let value = compute(&contents, lookup);
        Self { contents, value }
    }

    pub fn contents(&self) -> &CellContents {
        &self.contents
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    /// Recomputes the cached value after a dependee changed.
    pub fn recompute<L>(&mut self, lookup: L)
    where
        L: Fn(&str) -> Option<f64>,
    {
        self.value = compute(&self.contents, lookup);
    }

    pub(crate) fn set_value(&mut self, value: CellValue) {
        self.value = value;
    }
}

pub(crate) fn compute<L>(contents: &CellContents, lookup: L) -> CellValue
where
    L: Fn(&str) -> Option<f64>,
{
    match contents {
        CellContents::Number(n) => CellValue::Number(*n),
        CellContents::Text(text) => CellValue::Text(text.clone()),
        CellContents::Formula(expr) => match expr.evaluate(lookup) {
            Ok(n) => CellValue::Number(n),
            Err(err) => CellValue::Error(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_contents() {
        assert!(CellContents::Text(String::new()).is_empty());
        assert!(!CellContents::Text("x".to_string()).is_empty());
        assert!(!CellContents::Number(0.0).is_empty());
    }

    #[test]
    fn test_input_string_restores_formula_prefix() {
        let expr = Expression::new("A1 + 3").unwrap();
        assert_eq!(CellContents::Formula(expr).to_input_string(), "=A1+3");
        assert_eq!(CellContents::Number(2.5).to_input_string(), "2.5");
        assert_eq!(CellContents::Text("hi".to_string()).to_input_string(), "hi");
    }

    #[test]
    fn test_number_and_text_cells_value_equals_contents() {
        let cell = Cell::new(CellContents::Number(42.0), |_| None);
        assert_eq!(cell.value(), &CellValue::Number(42.0));

        let cell = Cell::new(CellContents::Text("note".to_string()), |_| None);
        assert_eq!(cell.value(), &CellValue::Text("note".to_string()));
    }

    #[test]
    fn test_formula_cell_recomputes_through_lookup() {
        let expr = Expression::new("A1 * 2").unwrap();
        let mut cell = Cell::new(CellContents::Formula(expr), |_| Some(10.0));
        assert_eq!(cell.value(), &CellValue::Number(20.0));

        cell.recompute(|_| Some(7.0));
        assert_eq!(cell.value(), &CellValue::Number(14.0));

        cell.recompute(|_| None);
        assert!(matches!(cell.value(), CellValue::Error(_)));
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Text("hi".to_string()).to_string(), "hi");
        let err = Expression::new("1/0").unwrap().evaluate(|_| None).unwrap_err();
        assert_eq!(CellValue::Error(err).to_string(), "#ERROR");
    }
}
