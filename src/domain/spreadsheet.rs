//! Spreadsheet orchestration: the cell store, dependency bookkeeping, and
//! the transactional recalculation protocol.
//!
//! Every mutation is compute-then-commit. The new dependency edges and the
//! full recalculation order are derived against a proposed copy of the
//! graph first; only if no circular reference turns up is any shared state
//! touched. A rejected mutation leaves cells and edges exactly as they
//! were.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use super::errors::{SheetError, SheetResult};
use super::graph::DependencyGraph;
use super::models::{self, Cell, CellContents, CellValue};
use super::parser::{Expression, is_identifier};

/// A spreadsheet of named cells with reactive recalculation.
///
/// Cell names are validated and normalized by caller-supplied functions,
/// so the naming policy (case folding, `A1`-style restrictions) lives with
/// the caller, not here. Edge `(A, B)` in the dependency graph means "B's
/// formula references A".
///
/// # Examples
///
/// ```
/// use gridcalc::domain::{CellValue, Spreadsheet};
///
/// let mut sheet = Spreadsheet::new("1.0");
/// sheet.set_cell_contents("A1", "43").unwrap();
/// sheet.set_cell_contents("B2", "=A1+3").unwrap();
///
/// let order = sheet.set_cell_contents("A1", "49").unwrap();
/// assert_eq!(order, vec!["A1".to_string(), "B2".to_string()]);
/// assert_eq!(sheet.cell_value("B2").unwrap(), CellValue::Number(52.0));
/// ```
pub struct Spreadsheet {
    cells: HashMap<String, Cell>,
    graph: DependencyGraph,
    is_valid: Box<dyn Fn(&str) -> bool>,
    normalize: Box<dyn Fn(&str) -> String>,
    version: String,
    changed: bool,
}

impl Spreadsheet {
    /// Creates an empty spreadsheet accepting any identifier as a cell
    /// name, unnormalized.
    pub fn new(version: &str) -> Self {
        Self::with_rules(is_identifier, |name| name.to_string(), version)
    }

    /// Creates an empty spreadsheet with a caller-supplied name validator
    /// and normalizer. The same pair is applied to variables inside
    /// formulas, so a formula can only reference cells this spreadsheet
    /// could hold.
    pub fn with_rules<V, N>(is_valid: V, normalize: N, version: &str) -> Self
    where
        V: Fn(&str) -> bool + 'static,
        N: Fn(&str) -> String + 'static,
    {
        Self {
            cells: HashMap::new(),
            graph: DependencyGraph::new(),
            is_valid: Box::new(is_valid),
            normalize: Box::new(normalize),
            version: version.to_string(),
            changed: false,
        }
    }

    /// Opaque version tag carried through save and load.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub(crate) fn set_version(&mut self, version: String) {
        self.version = version;
    }

    /// True when the spreadsheet was modified since the last save or load.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    pub(crate) fn clear(&mut self) {
        self.cells.clear();
        self.graph = DependencyGraph::new();
    }

    /// Names of every cell currently holding contents.
    pub fn nonempty_cell_names(&self) -> Vec<String> {
        self.cells.keys().cloned().collect()
    }

    /// The contents of `name`; empty text for a cell never set.
    pub fn cell_contents(&self, name: &str) -> SheetResult<CellContents> {
        let name = self.check_name(name)?;
        Ok(self
            .cells
            .get(&name)
            .map(|cell| cell.contents().clone())
            .unwrap_or_else(|| CellContents::Text(String::new())))
    }

    /// The cached value of `name`; empty text for a cell never set.
    pub fn cell_value(&self, name: &str) -> SheetResult<CellValue> {
        let name = self.check_name(name)?;
        Ok(self
            .cells
            .get(&name)
            .map(|cell| cell.value().clone())
            .unwrap_or_else(|| CellValue::Text(String::new())))
    }

    /// Sets the contents of `name` from raw input text and returns the
    /// recalculation order.
    ///
    /// Classification: empty text removes the cell, a leading `=` parses
    /// the rest as a formula, text that reads as a number becomes a
    /// number, anything else is plain text. The returned order is a valid
    /// topological order (every dependee before its dependents) starting
    /// at `name` and covering its transitive dependents; callers re-render
    /// in exactly that order.
    ///
    /// A mutation that would introduce a circular reference is rejected
    /// wholesale: no cell and no dependency edge changes.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridcalc::domain::Spreadsheet;
    ///
    /// let mut sheet = Spreadsheet::new("1.0");
    /// sheet.set_cell_contents("A1", "=B2+3").unwrap();
    /// assert!(sheet.set_cell_contents("B2", "=A1").is_err());
    /// assert_eq!(sheet.nonempty_cell_names(), vec!["A1".to_string()]);
    /// ```
    pub fn set_cell_contents(&mut self, name: &str, raw: &str) -> SheetResult<Vec<String>> {
        let name = self.check_name(name)?;

        let contents = if raw.is_empty() {
            CellContents::Text(String::new())
        } else if let Some(formula_src) = raw.strip_prefix('=') {
            let expr = Expression::with_rules(formula_src, &*self.normalize, &*self.is_valid)?;
            CellContents::Formula(expr)
        } else if let Ok(n) = raw.parse::<f64>() {
            CellContents::Number(n)
        } else {
            CellContents::Text(raw.to_string())
        };

        self.apply(name, contents)
    }

    /// Validates and normalizes a cell name.
    fn check_name(&self, name: &str) -> SheetResult<String> {
        let normalized = (self.normalize)(name);
        if !is_identifier(&normalized) || !(self.is_valid)(&normalized) {
            return Err(SheetError::InvalidName(name.to_string()));
        }
        Ok(normalized)
    }

    /// Commits new contents for a validated name, or rejects the whole
    /// mutation on a circular reference.
    fn apply(&mut self, name: String, contents: CellContents) -> SheetResult<Vec<String>> {
        let new_dependees = match &contents {
            CellContents::Formula(expr) => expr.variables().clone(),
            _ => HashSet::new(),
        };

        // Proposed edges and recalculation order come first; shared state
        // is only touched once the traversal proves the graph acyclic.
        let mut proposed = self.graph.clone();
        proposed.replace_dependees(&name, &new_dependees);
        let order = match recalculation_order(&proposed, &name) {
            Ok(order) => order,
            Err(err) => {
                log::warn!("rejected contents for {name}: {err}");
                return Err(err);
            }
        };

        self.graph = proposed;
        if contents.is_empty() {
            self.cells.remove(&name);
        } else {
            let cell = Cell::new(contents, |var| self.lookup(var));
            self.cells.insert(name.clone(), cell);
        }

        for cell_name in &order {
            let value = match self.cells.get(cell_name) {
                Some(cell) => models::compute(cell.contents(), |var| self.lookup(var)),
                None => continue,
            };
            if let Some(cell) = self.cells.get_mut(cell_name) {
                cell.set_value(value);
            }
        }

        self.changed = true;
        log::debug!("{} recalculated {} cell(s)", name, order.len());
        Ok(order)
    }

    /// Resolves a variable to a numeric cell value, if it has one.
    fn lookup(&self, name: &str) -> Option<f64> {
        match self.cells.get(name).map(Cell::value) {
            Some(CellValue::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spreadsheet")
            .field("cells", &self.cells)
            .field("graph", &self.graph)
            .field("version", &self.version)
            .field("changed", &self.changed)
            .finish_non_exhaustive()
    }
}

/// Depth-first order of `start` and its transitive dependents in `graph`:
/// every dependee before its dependents, `start` first.
///
/// Revisiting a key still on the recursion path means the proposed edges
/// contain a cycle; the error names the revisited key.
fn recalculation_order(graph: &DependencyGraph, start: &str) -> SheetResult<Vec<String>> {
    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();
    let mut ordered = VecDeque::new();
    visit(graph, start, &mut visited, &mut on_path, &mut ordered)?;
    Ok(ordered.into())
}

fn visit(
    graph: &DependencyGraph,
    name: &str,
    visited: &mut HashSet<String>,
    on_path: &mut HashSet<String>,
    ordered: &mut VecDeque<String>,
) -> SheetResult<()> {
    visited.insert(name.to_string());
    on_path.insert(name.to_string());
    for dependent in graph.dependents(name) {
        if on_path.contains(&dependent) {
            return Err(SheetError::CircularReference(dependent));
        }
        if !visited.contains(&dependent) {
            visit(graph, &dependent, visited, on_path, ordered)?;
        }
    }
    on_path.remove(name);
    ordered.push_front(name.to_string());
    Ok(())
}
