//! GRIDCALC - Reactive Spreadsheet Formula Engine
//!
//! A formula-evaluation engine for spreadsheets: named cells holding
//! numbers, text, or arithmetic expressions over other cells. The engine
//! parses and validates expressions at construction time, evaluates them
//! with an operator-precedence walk, tracks cell-to-cell references in a
//! bidirectional dependency graph, rejects circular references before any
//! state changes, and reports the exact order in which dependents must be
//! recomputed after an edit.

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
