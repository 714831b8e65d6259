//! File persistence for spreadsheets.
//!
//! The on-disk form is a JSON document with a root `version` attribute and
//! an ordered list of cell records. Each record stores the cell's input
//! text: formula contents are written with a leading `=`, which the loader
//! strips again by replaying records through the normal cell-mutation
//! path.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{SheetResult, Spreadsheet};

#[derive(Debug, Serialize, Deserialize)]
struct SheetDocument {
    version: String,
    cells: Vec<CellRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellRecord {
    name: String,
    contents: String,
}

/// Reads the version attribute without touching the cell records.
#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: String,
}

pub struct FileRepository;

impl FileRepository {
    /// Writes `spreadsheet` to `path` and clears its dirty flag.
    ///
    /// Records are sorted by cell name so repeated saves of the same
    /// sheet produce identical files.
    pub fn save(spreadsheet: &mut Spreadsheet, path: impl AsRef<Path>) -> SheetResult<()> {
        let mut names = spreadsheet.nonempty_cell_names();
        names.sort();

        let mut cells = Vec::with_capacity(names.len());
        for name in names {
            let contents = spreadsheet.cell_contents(&name)?.to_input_string();
            cells.push(CellRecord { name, contents });
        }

        let document = SheetDocument {
            version: spreadsheet.version().to_string(),
            cells,
        };
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(path.as_ref(), json)?;

        spreadsheet.set_changed(false);
        log::debug!("saved {} cell(s)", document.cells.len());
        Ok(())
    }

    /// Replaces `spreadsheet`'s cells with the contents of `path`,
    /// adopting the file's version and clearing the dirty flag.
    ///
    /// Records replay through the normal mutation path, so a file holding
    /// an invalid name, a malformed formula, or a circular reference
    /// fails with the corresponding error.
    pub fn load(spreadsheet: &mut Spreadsheet, path: impl AsRef<Path>) -> SheetResult<()> {
        let json = fs::read_to_string(path.as_ref())?;
        let document: SheetDocument = serde_json::from_str(&json)?;

        spreadsheet.clear();
        for record in &document.cells {
            spreadsheet.set_cell_contents(&record.name, &record.contents)?;
        }
        spreadsheet.set_version(document.version);
        spreadsheet.set_changed(false);
        log::debug!("loaded {} cell(s)", document.cells.len());
        Ok(())
    }

    /// Reads only the version attribute of a saved spreadsheet.
    pub fn get_version(path: impl AsRef<Path>) -> SheetResult<String> {
        let json = fs::read_to_string(path.as_ref())?;
        let probe: VersionProbe = serde_json::from_str(&json)?;
        Ok(probe.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellValue, SheetError};

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");

        let mut sheet = Spreadsheet::new("1.2");
        sheet.set_cell_contents("A1", "43").unwrap();
        sheet.set_cell_contents("B2", "=A1+3").unwrap();
        sheet.set_cell_contents("C3", "note").unwrap();
        FileRepository::save(&mut sheet, &path).unwrap();
        assert!(!sheet.changed());

        let mut loaded = Spreadsheet::new("default");
        FileRepository::load(&mut loaded, &path).unwrap();
        assert_eq!(loaded.version(), "1.2");
        assert!(!loaded.changed());
        assert_eq!(loaded.cell_value("A1").unwrap(), CellValue::Number(43.0));
        assert_eq!(loaded.cell_value("B2").unwrap(), CellValue::Number(46.0));
        assert_eq!(
            loaded.cell_value("C3").unwrap(),
            CellValue::Text("note".to_string())
        );
        assert_eq!(
            loaded.cell_contents("B2").unwrap().to_input_string(),
            "=A1+3"
        );
    }

    #[test]
    fn test_saved_formula_carries_equals_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");

        let mut sheet = Spreadsheet::new("1.0");
        sheet.set_cell_contents("B2", "= A1 + 3").unwrap();
        FileRepository::save(&mut sheet, &path).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("=A1+3"));
    }

    #[test]
    fn test_load_is_order_independent() {
        // A dependent listed before its dependee settles once the
        // dependee's record replays.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        let json = r#"{
            "version": "1.0",
            "cells": [
                {"name": "B2", "contents": "=A1*2"},
                {"name": "A1", "contents": "21"}
            ]
        }"#;
        fs::write(&path, json).unwrap();

        let mut sheet = Spreadsheet::new("default");
        FileRepository::load(&mut sheet, &path).unwrap();
        assert_eq!(sheet.cell_value("B2").unwrap(), CellValue::Number(42.0));
    }

    #[test]
    fn test_load_replaces_existing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");

        let mut source = Spreadsheet::new("1.0");
        source.set_cell_contents("A1", "1").unwrap();
        FileRepository::save(&mut source, &path).unwrap();

        let mut sheet = Spreadsheet::new("default");
        sheet.set_cell_contents("Z9", "stale").unwrap();
        FileRepository::load(&mut sheet, &path).unwrap();
        assert_eq!(sheet.nonempty_cell_names(), vec!["A1".to_string()]);
    }

    #[test]
    fn test_get_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");

        let mut sheet = Spreadsheet::new("2.7");
        sheet.set_cell_contents("A1", "1").unwrap();
        FileRepository::save(&mut sheet, &path).unwrap();

        assert_eq!(FileRepository::get_version(&path).unwrap(), "2.7");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("sheet.json");

        let mut sheet = Spreadsheet::new("default");
        assert!(matches!(
            FileRepository::load(&mut sheet, &path).unwrap_err(),
            SheetError::Io(_)
        ));
        assert!(matches!(
            FileRepository::get_version(&path).unwrap_err(),
            SheetError::Io(_)
        ));
        assert!(matches!(
            FileRepository::save(&mut sheet, &path).unwrap_err(),
            SheetError::Io(_)
        ));
    }

    #[test]
    fn test_malformed_document_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        fs::write(&path, "{ not json").unwrap();

        let mut sheet = Spreadsheet::new("default");
        assert!(matches!(
            FileRepository::load(&mut sheet, &path).unwrap_err(),
            SheetError::Json(_)
        ));
    }

    #[test]
    fn test_cyclic_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        let json = r#"{
            "version": "1.0",
            "cells": [
                {"name": "A1", "contents": "=B1"},
                {"name": "B1", "contents": "=A1"}
            ]
        }"#;
        fs::write(&path, json).unwrap();

        let mut sheet = Spreadsheet::new("default");
        assert!(matches!(
            FileRepository::load(&mut sheet, &path).unwrap_err(),
            SheetError::CircularReference(_)
        ));
    }
}
