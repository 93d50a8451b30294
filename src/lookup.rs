//! Cross-workbook lookup replacement (`smap`).
//!
//! A [`LookupTable`] is built once from two-column regions of a reference
//! workbook (key column, value column). [`apply`] then walks every configured
//! field's column in a target workbook, located by its header text, and hands
//! each cell to a [`MatchPolicy`] together with the lookup result.
//!
//! Matching is exact and type-sensitive (see [`CellValue`]). The first
//! occurrence of a duplicate key wins. Empty cells never match, and a key whose
//! lookup value is empty counts as a miss.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    data::CellValue,
    error::{Result, ToolError},
    io_utils,
    range::CellRange,
    workbook::{Cell, Sheet, Workbook},
};

/// A configured field: the header text to look for and the lookup region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRange {
    pub field: String,
    pub range: CellRange,
}

impl FieldRange {
    pub fn parse(field: &str, range: &str) -> Result<Self> {
        let field = field.trim();
        if field.is_empty() {
            return Err(ToolError::config("field name must not be empty"));
        }
        let range = CellRange::parse(range)
            .map_err(|err| ToolError::config(format!("field '{field}': {err}")))?;
        if range.width() < 2 {
            return Err(ToolError::config(format!(
                "field '{field}': lookup range {range} needs a key column and a value column"
            )));
        }
        Ok(Self {
            field: field.to_string(),
            range,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    fields: Vec<(String, HashMap<CellValue, CellValue>)>,
}

impl LookupTable {
    /// Loads every field's region from `sheet` of the workbook at `path`
    /// (first sheet when `sheet` is `None`).
    pub fn load(path: &Path, fields: &[FieldRange], sheet: Option<&str>) -> Result<Self> {
        let workbook = Workbook::open(path)?;
        let source = workbook.resolve_sheet(sheet, path)?;
        let table = LookupTable::from_sheet(source, fields);
        info!(
            "Loaded {} lookup field(s) from {:?} sheet '{}'",
            table.fields.len(),
            path,
            source.name()
        );
        Ok(table)
    }

    pub fn from_sheet(sheet: &Sheet, fields: &[FieldRange]) -> Self {
        let fields = fields
            .iter()
            .map(|spec| {
                let mut entries = HashMap::new();
                for row in spec.range.rows() {
                    let key = sheet.value(row, spec.range.start.col);
                    if key.is_empty() || entries.contains_key(key) {
                        continue;
                    }
                    let value = sheet.value(row, spec.range.start.col + 1);
                    entries.insert(key.clone(), value.clone());
                }
                debug!(
                    "Field '{}': {} distinct key(s) in {}",
                    spec.field,
                    entries.len(),
                    spec.range
                );
                (spec.field.clone(), entries)
            })
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(field, _)| field.as_str())
    }

    pub fn key_count(&self, field: &str) -> usize {
        self.entries(field).map(HashMap::len).unwrap_or(0)
    }

    /// Lookup value for `key` under `field`; `None` when there is no usable match.
    pub fn get(&self, field: &str, key: &CellValue) -> Option<&CellValue> {
        if key.is_empty() {
            return None;
        }
        self.entries(field)?
            .get(key)
            .filter(|value| !value.is_empty())
    }

    fn entries(&self, field: &str) -> Option<&HashMap<CellValue, CellValue>> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, entries)| entries)
    }
}

/// Per-cell behaviour for matched and unmatched target cells.
///
/// A policy only sees the cell it is given and its lookup value; any state it
/// keeps (for reporting) is its own.
pub trait MatchPolicy {
    fn on_match(&mut self, cell: &mut Cell, lookup_value: &CellValue) {
        cell.value = lookup_value.clone();
    }

    fn on_no_match(&mut self, _cell: &mut Cell) {}
}

/// Overwrites matched cells, leaves the rest alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceWithLookup;

impl MatchPolicy for ReplaceWithLookup {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum NoMatchAction {
    #[default]
    Empty,
    Keep,
}

/// Overwrites matched cells; unmatched cells are cleared or kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyOrKeep {
    pub action: NoMatchAction,
}

impl EmptyOrKeep {
    pub fn new(action: NoMatchAction) -> Self {
        Self { action }
    }
}

impl MatchPolicy for EmptyOrKeep {
    fn on_no_match(&mut self, cell: &mut Cell) {
        if self.action == NoMatchAction::Empty {
            cell.value = CellValue::Empty;
        }
    }
}

/// Marks matched cells with a fill colour instead of rewriting them.
#[derive(Debug, Clone)]
pub struct Highlight {
    pub color: String,
    pub matched: Vec<CellValue>,
    pub unmatched: Vec<CellValue>,
}

impl Highlight {
    pub const DEFAULT_COLOR: &'static str = "#FFFF00";

    pub fn new(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            matched: Vec::new(),
            unmatched: Vec::new(),
        }
    }
}

impl Default for Highlight {
    fn default() -> Self {
        Highlight::new(Highlight::DEFAULT_COLOR)
    }
}

impl MatchPolicy for Highlight {
    fn on_match(&mut self, cell: &mut Cell, _lookup_value: &CellValue) {
        self.matched.push(cell.value.clone());
        cell.fill = Some(self.color.clone());
    }

    fn on_no_match(&mut self, cell: &mut Cell) {
        if !cell.value.is_empty() {
            self.unmatched.push(cell.value.clone());
        }
    }
}

/// A policy assembled from two closures.
pub struct PolicyFns<M, N> {
    pub on_match: M,
    pub on_no_match: N,
}

impl<M, N> MatchPolicy for PolicyFns<M, N>
where
    M: FnMut(&mut Cell, &CellValue),
    N: FnMut(&mut Cell),
{
    fn on_match(&mut self, cell: &mut Cell, lookup_value: &CellValue) {
        (self.on_match)(cell, lookup_value)
    }

    fn on_no_match(&mut self, cell: &mut Cell) {
        (self.on_no_match)(cell)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// 1-based row holding the field names.
    pub header_row: u32,
    /// Rows to skip between the header and the first data row.
    pub skip_rows: u32,
    /// Sheets to process; all sheets when empty. Unknown names are skipped.
    pub sheets: Vec<String>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            header_row: 1,
            skip_rows: 0,
            sheets: Vec::new(),
        }
    }
}

impl ApplyOptions {
    pub fn first_data_row(&self) -> u32 {
        self.header_row + self.skip_rows + 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub sheets: usize,
    pub columns: usize,
    pub matched: usize,
    pub unmatched: usize,
}

/// Runs `policy` over every configured column of the selected sheets.
pub fn apply(
    workbook: &mut Workbook,
    table: &LookupTable,
    options: &ApplyOptions,
    policy: &mut dyn MatchPolicy,
) -> Result<ApplySummary> {
    if options.header_row == 0 {
        return Err(ToolError::config("header row is 1-based and must be at least 1"));
    }
    let sheet_names: Vec<String> = if options.sheets.is_empty() {
        workbook
            .sheet_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        options.sheets.clone()
    };

    let mut summary = ApplySummary::default();
    for sheet_name in &sheet_names {
        let Some(sheet) = workbook.sheet_mut(sheet_name) else {
            debug!("Sheet '{sheet_name}' not found; skipping");
            continue;
        };
        summary.sheets += 1;
        for field in table.fields() {
            let Some(col) = sheet.find_header(options.header_row, field) else {
                debug!(
                    "Field '{field}' not found in header row {} of '{sheet_name}'",
                    options.header_row
                );
                continue;
            };
            summary.columns += 1;
            for row in options.first_data_row()..=sheet.max_row() {
                let cell = sheet.cell_mut(row, col);
                let cached = cell.formula.as_ref().map(|_| cell.value.clone());
                match table.get(field, &cell.value) {
                    Some(value) => {
                        policy.on_match(cell, value);
                        summary.matched += 1;
                    }
                    None => {
                        policy.on_no_match(cell);
                        summary.unmatched += 1;
                    }
                }
                // a rewritten value replaces the formula that produced the old one
                if cached.is_some_and(|old| old != cell.value) {
                    cell.formula = None;
                }
            }
        }
    }
    Ok(summary)
}

const OUTPUT_EXTENSION: &str = "xlsx";

/// One complete lookup-replacement run: load, apply, save under a new name.
#[derive(Debug, Clone)]
pub struct SmapJob {
    pub target: PathBuf,
    pub lookup: PathBuf,
    pub lookup_sheet: Option<String>,
    pub fields: Vec<FieldRange>,
    pub options: ApplyOptions,
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmapOutcome {
    pub output: PathBuf,
    pub summary: ApplySummary,
}

impl SmapJob {
    /// `<stem><suffix>.xlsx` next to the target; the output is always written
    /// as `.xlsx` whatever format the target was read from.
    pub fn output_path(&self) -> Result<PathBuf> {
        let output =
            io_utils::derive_output_path(&self.target, &self.suffix, Some(OUTPUT_EXTENSION))?;
        if output == self.target {
            return Err(ToolError::config(format!(
                "output path {output:?} would overwrite the target workbook"
            )));
        }
        Ok(output)
    }

    pub fn run(&self, policy: &mut dyn MatchPolicy) -> Result<SmapOutcome> {
        if self.fields.is_empty() {
            return Err(ToolError::config("at least one field and lookup range is required"));
        }
        let output = self.output_path()?;
        let table = LookupTable::load(&self.lookup, &self.fields, self.lookup_sheet.as_deref())?;
        let mut workbook = Workbook::open(&self.target)?;
        let summary = apply(&mut workbook, &table, &self.options, policy)?;
        workbook.save_as(&output)?;
        info!(
            "Processed {} column(s) across {} sheet(s): {} matched, {} unmatched -> {:?}",
            summary.columns, summary.sheets, summary.matched, summary.unmatched, output
        );
        Ok(SmapOutcome { output, summary })
    }
}
