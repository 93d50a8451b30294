//! A1-notation cell references and rectangular ranges.
//!
//! Rows and columns are 1-based throughout the crate, matching what users type
//! in configuration files (`A2:B2853`).

use std::{fmt, str::FromStr};

use crate::error::{Result, ToolError};

/// Largest column index Excel accepts (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;
/// Largest row index Excel accepts.
pub const MAX_ROW: u32 = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl FromStr for CellRef {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (letters, digits) = trimmed.split_at(split);
        if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ToolError::config(format!(
                "'{value}' is not a cell reference like 'B12'"
            )));
        }
        let col = column_index(letters)
            .ok_or_else(|| ToolError::config(format!("column '{letters}' is out of range")))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| ToolError::config(format!("row '{digits}' is out of range")))?;
        if row == 0 || row > MAX_ROW {
            return Err(ToolError::config(format!("row '{digits}' is out of range")));
        }
        Ok(CellRef { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> Result<Self> {
        if start.row > end.row || start.col > end.col {
            return Err(ToolError::config(format!(
                "range {start}:{end} must run from its top-left to its bottom-right cell"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(spec: &str) -> Result<Self> {
        let (start, end) = spec
            .split_once(':')
            .ok_or_else(|| ToolError::config(format!("'{spec}' is not a range like 'A2:B30'")))?;
        CellRange::new(start.parse()?, end.parse()?)
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn rows(&self) -> std::ops::RangeInclusive<u32> {
        self.start.row..=self.end.row
    }

    pub fn columns(&self) -> std::ops::RangeInclusive<u32> {
        self.start.col..=self.end.col
    }
}

impl FromStr for CellRange {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        CellRange::parse(value)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Converts column letters (`A`, `AB`, case-insensitive) to a 1-based index.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut index: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COLUMN {
            return None;
        }
    }
    Some(index)
}

pub fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}
