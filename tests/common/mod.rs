#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use erp_sheet_tools::data::CellValue;
use erp_sheet_tools::workbook::Workbook;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Saves an `.xlsx` with one sheet per entry; rows start at row 1, column A.
    pub fn write_workbook(&self, name: &str, sheets: &[(&str, Vec<Vec<CellValue>>)]) -> PathBuf {
        let path = self.join(name);
        let mut workbook = Workbook::new();
        for (sheet_name, rows) in sheets {
            let sheet = workbook.add_sheet(*sheet_name);
            for (r, row) in rows.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    if !value.is_empty() {
                        sheet.set_value(r as u32 + 1, c as u32 + 1, value.clone());
                    }
                }
            }
        }
        workbook.save_as(&path).expect("save test workbook");
        path
    }
}

/// Shorthand for a text cell.
pub fn s(value: &str) -> CellValue {
    CellValue::from(value)
}

/// Shorthand for a numeric cell.
pub fn n(value: f64) -> CellValue {
    CellValue::Number(value)
}

pub fn empty() -> CellValue {
    CellValue::Empty
}

/// Column values below `header_row` for the column headed `field`.
pub fn column_values(path: &Path, sheet: &str, header_row: u32, field: &str) -> Vec<CellValue> {
    let workbook = Workbook::open(path).expect("open workbook");
    let sheet = workbook.sheet(sheet).expect("sheet exists");
    let col = sheet
        .find_header(header_row, field)
        .expect("header present");
    ((header_row + 1)..=sheet.max_row())
        .map(|row| sheet.value(row, col).clone())
        .collect()
}
