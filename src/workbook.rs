//! In-memory workbook model backed by `calamine` for reading and
//! `rust_xlsxwriter` for writing.
//!
//! A [`Workbook`] is loaded completely on [`Workbook::open`]; the underlying
//! reader is released before `open` returns, so callers only ever hold plain
//! data. Cells live in a sparse grid keyed by 1-based `(row, col)`.
//!
//! Formula cells keep their formula text next to the cached value and are
//! written back as formulas, so columns a job never touches come out as they
//! went in.
//!
//! Saving renders the whole file in memory and hands the bytes to
//! [`io_utils::replace_file`], so a failed save never leaves a partial file
//! behind. Values, formulas and solid fills are written back; other styling
//! from the source file is not preserved.

use std::{collections::BTreeMap, path::Path};

use calamine::{Data, Reader, open_workbook_auto};
use log::debug;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, FormatPattern, Formula, Worksheet};

use crate::{
    data::{CellValue, datetime_to_excel_serial, excel_serial_to_datetime, parse_iso_datetime},
    error::{Result, ToolError},
    io_utils,
    range::{CellRange, MAX_COLUMN, MAX_ROW},
};

const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    /// Cached result when `formula` is set.
    pub value: CellValue,
    /// Formula text without the leading `=`.
    pub formula: Option<String>,
    /// Solid background colour as `#RRGGBB`.
    pub fill: Option<String>,
}

impl Cell {
    fn is_blank(&self) -> bool {
        self.value.is_empty() && self.formula.is_none() && self.fill.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
}

static EMPTY_VALUE: CellValue = CellValue::Empty;

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        self.cells
            .get(&(row, col))
            .map(|cell| &cell.value)
            .unwrap_or(&EMPTY_VALUE)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn cell_mut(&mut self, row: u32, col: u32) -> &mut Cell {
        self.cells.entry((row, col)).or_default()
    }

    /// Stores a plain value, replacing any formula in the cell.
    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        let cell = self.cell_mut(row, col);
        cell.value = value.into();
        cell.formula = None;
    }

    pub fn set_formula(&mut self, row: u32, col: u32, formula: &str) {
        let formula = formula.trim();
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        self.cell_mut(row, col).formula = Some(formula.to_string());
    }

    /// Last row holding any cell, or 0 for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    pub fn max_col(&self) -> u32 {
        self.cells.keys().map(|(_, col)| *col).max().unwrap_or(0)
    }

    /// Column whose cell in `header_row` is the text `name`.
    pub fn find_header(&self, header_row: u32, name: &str) -> Option<u32> {
        self.cells
            .range((header_row, 0)..=(header_row, u32::MAX))
            .find(|(_, cell)| cell.value.as_str() == Some(name))
            .map(|((_, col), _)| *col)
    }

    /// Values of `range`, one vector per row in ascending row order.
    pub fn range_values(&self, range: &CellRange) -> Vec<Vec<&CellValue>> {
        range
            .rows()
            .map(|row| range.columns().map(|col| self.value(row, col)).collect())
            .collect()
    }

    fn write_into(&self, worksheet: &mut Worksheet) -> std::result::Result<(), rust_xlsxwriter::XlsxError> {
        worksheet.set_name(&self.name)?;
        let datetime_format = Format::new().set_num_format(DATETIME_NUM_FORMAT);
        for (&(row, col), cell) in &self.cells {
            if cell.is_blank() {
                continue;
            }
            if row == 0 || col == 0 {
                return Err(rust_xlsxwriter::XlsxError::RowColumnLimitError);
            }
            let (row, col) = (row - 1, (col - 1) as u16);
            let mut format = match cell.value {
                CellValue::DateTime(_) => datetime_format.clone(),
                _ => Format::new(),
            };
            if let Some(color) = &cell.fill {
                format = format
                    .set_pattern(FormatPattern::Solid)
                    .set_background_color(color.as_str());
            }
            if let Some(text) = &cell.formula {
                let formula = Formula::new(text).set_result(cell.value.as_display());
                worksheet.write_formula_with_format(row, col, formula, &format)?;
                continue;
            }
            match &cell.value {
                CellValue::Empty => worksheet.write_blank(row, col, &format)?,
                CellValue::String(s) if s.is_empty() => worksheet.write_blank(row, col, &format)?,
                CellValue::String(s) => worksheet.write_string_with_format(row, col, s, &format)?,
                CellValue::Number(n) => worksheet.write_number_with_format(row, col, *n, &format)?,
                CellValue::Boolean(b) => worksheet.write_boolean_with_format(row, col, *b, &format)?,
                CellValue::DateTime(dt) => worksheet.write_number_with_format(
                    row,
                    col,
                    datetime_to_excel_serial(dt),
                    &format,
                )?,
            };
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every sheet of `path` into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = open_workbook_auto(path).map_err(|err| ToolError::read(path, err))?;
        let names = reader.sheet_names().to_owned();
        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let range = reader
                .worksheet_range(&name)
                .map_err(|err| ToolError::read(path, format!("sheet '{name}': {err}")))?;
            let (start_row, start_col) = range.start().unwrap_or((0, 0));
            let mut sheet = Sheet::new(name.clone());
            for (row, col, data) in range.used_cells() {
                let value = convert_data(data);
                if value.is_empty() {
                    continue;
                }
                let row = start_row + row as u32 + 1;
                let col = start_col + col as u32 + 1;
                sheet.set_value(row, col, value);
            }
            let formulas = reader
                .worksheet_formula(&name)
                .map_err(|err| ToolError::read(path, format!("sheet '{name}' formulas: {err}")))?;
            let (formula_row, formula_col) = formulas.start().unwrap_or((0, 0));
            for (row, col, text) in formulas.used_cells() {
                if text.trim().is_empty() {
                    continue;
                }
                let row = formula_row + row as u32 + 1;
                let col = formula_col + col as u32 + 1;
                sheet.set_formula(row, col, text);
            }
            debug!(
                "Loaded sheet '{}' from {:?} ({} rows)",
                sheet.name,
                path,
                sheet.max_row()
            );
            sheets.push(sheet);
        }
        Ok(Self { sheets })
    }

    pub fn add_sheet(&mut self, name: impl Into<String>) -> &mut Sheet {
        self.sheets.push(Sheet::new(name));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    /// The sheet a bare range refers to: the first one in workbook order.
    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    /// Named sheet, or the first sheet when `name` is `None`.
    pub fn resolve_sheet(&self, name: Option<&str>, path: &Path) -> Result<&Sheet> {
        match name {
            Some(name) => self
                .sheet(name)
                .ok_or_else(|| ToolError::read(path, format!("sheet '{name}' does not exist"))),
            None => self
                .first_sheet()
                .ok_or_else(|| ToolError::read(path, "workbook has no sheets")),
        }
    }

    /// Renders the workbook to `.xlsx` bytes. Creation time is pinned so the
    /// same content always produces the same bytes.
    pub fn to_xlsx_bytes(&self) -> std::result::Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
        let mut out = rust_xlsxwriter::Workbook::new();
        let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
        out.set_properties(&DocProperties::new().set_creation_datetime(&created));
        for sheet in &self.sheets {
            if sheet.max_row() > MAX_ROW || sheet.max_col() > MAX_COLUMN {
                return Err(rust_xlsxwriter::XlsxError::RowColumnLimitError);
            }
            let worksheet = out.add_worksheet();
            sheet.write_into(worksheet)?;
        }
        out.save_to_buffer()
    }

    pub fn save_as(&self, path: &Path) -> Result<()> {
        let bytes = self
            .to_xlsx_bytes()
            .map_err(|err| ToolError::write(path, err))?;
        io_utils::replace_file(path, &bytes).map_err(|err| ToolError::write(path, err))
    }
}

fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Bool(v) => CellValue::Boolean(*v),
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::String(v) => CellValue::String(v.clone()),
        Data::DateTime(v) => excel_serial_to_datetime(v.as_f64())
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(v.as_f64())),
        Data::DateTimeIso(v) => parse_iso_datetime(v)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::String(v.clone())),
        Data::DurationIso(v) => CellValue::String(v.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}
