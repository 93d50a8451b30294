//! Serial code generation.
//!
//! Each row of a range becomes one code: the first N cells are passed through
//! the configured transforms (N = number of transform indices) and the
//! fragments are joined with the configured separators. Codes are buffered
//! until [`SerialCodeGenerator::commit`] hands them to the [`SerialLedger`],
//! which attaches a unique serial to each.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use itertools::Itertools;
use log::{debug, info};

use crate::{
    data::{CellValue, legacy_serial_date, parse_date_text},
    error::{Result, ToolError, TransformError},
    ledger::{SerialAssignment, SerialLedger},
    range::CellRange,
    workbook::{Sheet, Workbook},
};

pub const IDENTITY: usize = 0;
pub const DATE_COMPACT: usize = 1;

pub type Transform = Box<dyn Fn(&CellValue) -> std::result::Result<String, TransformError>>;

/// Index-addressed cell transforms, owned by one generator.
pub struct TransformRegistry {
    transforms: BTreeMap<usize, Transform>,
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            transforms: BTreeMap::new(),
        }
    }

    /// Registry holding [`identity`] at 0 and [`date_compact`] at 1.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(IDENTITY, identity);
        registry.register(DATE_COMPACT, date_compact);
        registry
    }

    pub fn register<F>(&mut self, index: usize, transform: F)
    where
        F: Fn(&CellValue) -> std::result::Result<String, TransformError> + 'static,
    {
        self.transforms.insert(index, Box::new(transform));
    }

    pub fn contains(&self, index: usize) -> bool {
        self.transforms.contains_key(&index)
    }

    /// Runs transform `index` on `value`, rendering failures inline.
    pub fn apply(&self, index: usize, value: &CellValue) -> String {
        match self.transforms.get(&index) {
            Some(transform) => transform(value).unwrap_or_else(|err| err.marker()),
            None => TransformError::new(format!("no transform registered at index {index}")).marker(),
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.transforms.keys()).finish()
    }
}

/// Raw value as text; empty cells become an empty string.
pub fn identity(value: &CellValue) -> std::result::Result<String, TransformError> {
    Ok(value.as_display())
}

/// Date-like value as `yymmdd`.
///
/// Values that are not dates (free text, booleans, empty cells, serials
/// outside the calendar) pass through as their display text.
pub fn date_compact(value: &CellValue) -> std::result::Result<String, TransformError> {
    let date = match value {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::String(text) => parse_date_text(text),
        CellValue::Number(serial) => legacy_serial_date(*serial),
        CellValue::Empty | CellValue::Boolean(_) => None,
    };
    Ok(match date {
        Some(date) => date.format("%y%m%d").to_string(),
        None => value.as_display(),
    })
}

/// Interleaves separators between fragments: separator `i - 1` goes between
/// fragments `i - 1` and `i`. Missing separators are omitted, extras unused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeJoiner {
    separators: Vec<String>,
}

impl CodeJoiner {
    pub fn new(separators: Vec<String>) -> Self {
        Self { separators }
    }

    pub fn join(&self, fragments: &[String]) -> String {
        let mut code = String::new();
        for (idx, fragment) in fragments.iter().enumerate() {
            if idx > 0
                && let Some(separator) = self.separators.get(idx - 1)
            {
                code.push_str(separator);
            }
            code.push_str(fragment);
        }
        code
    }
}

#[derive(Debug)]
pub struct SerialCodeGenerator {
    registry: TransformRegistry,
    transform_indices: Vec<usize>,
    joiner: CodeJoiner,
    pending: Vec<String>,
}

impl SerialCodeGenerator {
    pub fn new(transform_indices: Vec<usize>, separators: Vec<String>) -> Result<Self> {
        Self::with_registry(TransformRegistry::with_builtins(), transform_indices, separators)
    }

    pub fn with_registry(
        registry: TransformRegistry,
        transform_indices: Vec<usize>,
        separators: Vec<String>,
    ) -> Result<Self> {
        if transform_indices.is_empty() {
            return Err(ToolError::config("at least one transform index is required"));
        }
        if separators.len() != transform_indices.len() {
            return Err(ToolError::config(format!(
                "{} separator(s) given for {} transform(s); the counts must match",
                separators.len(),
                transform_indices.len()
            )));
        }
        if let Some(missing) = transform_indices.iter().find(|idx| !registry.contains(**idx)) {
            return Err(ToolError::config(format!(
                "no transform registered at index {missing}"
            )));
        }
        Ok(Self {
            registry,
            transform_indices,
            joiner: CodeJoiner::new(separators),
            pending: Vec::new(),
        })
    }

    /// Builds the code for one row and queues it for commit.
    pub fn process_row(&mut self, row: &[&CellValue]) -> String {
        let fragments = row
            .iter()
            .zip(&self.transform_indices)
            .map(|(value, index)| self.registry.apply(*index, value))
            .collect::<Vec<_>>();
        let code = self.joiner.join(&fragments);
        self.pending.push(code.clone());
        code
    }

    /// One code per row of `range`, in row order.
    pub fn process_range(&mut self, sheet: &Sheet, range: &CellRange) -> Vec<String> {
        let codes = sheet
            .range_values(range)
            .iter()
            .map(|row| self.process_row(row))
            .collect::<Vec<_>>();
        debug!(
            "Generated {} code(s) from {} on sheet '{}'",
            codes.len(),
            range,
            sheet.name()
        );
        codes
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Records every pending code in the ledger as one batch.
    ///
    /// The pending buffer is emptied either way: on success its codes are
    /// committed, on failure they are discarded along with the rolled-back batch.
    pub fn commit(
        &mut self,
        ledger: &mut SerialLedger,
        begin_serial: Option<i64>,
    ) -> Result<Vec<SerialAssignment>> {
        let codes = std::mem::take(&mut self.pending);
        ledger.insert_batch(&codes, begin_serial)
    }
}

/// `"{code}{serial}"` per assignment with the serial zero-padded to `pad_width`.
pub fn format_results(assignments: &[SerialAssignment], pad_width: usize) -> String {
    assignments
        .iter()
        .map(|a| format!("{}{:0width$}", a.code, a.serial, width = pad_width))
        .join("\n")
}

/// A complete encode run: read a range, commit serials, render the result.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub sheet: Option<String>,
    pub range: CellRange,
    pub transform_indices: Vec<usize>,
    pub separators: Vec<String>,
    pub database: PathBuf,
    pub begin_serial: Option<i64>,
    pub pad_width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutcome {
    pub assignments: Vec<SerialAssignment>,
    pub rendered: String,
}

impl EncodeJob {
    pub fn run(&self) -> Result<EncodeOutcome> {
        let mut generator =
            SerialCodeGenerator::new(self.transform_indices.clone(), self.separators.clone())?;
        let workbook = Workbook::open(&self.input)?;
        let sheet = workbook.resolve_sheet(self.sheet.as_deref(), &self.input)?;
        generator.process_range(sheet, &self.range);
        let mut ledger = SerialLedger::open(&self.database)?;
        let assignments = generator.commit(&mut ledger, self.begin_serial)?;
        info!(
            "Encoded {} row(s) from {:?} sheet '{}' into {:?}",
            assignments.len(),
            self.input,
            sheet.name(),
            self.database
        );
        let rendered = format_results(&assignments, self.pad_width);
        Ok(EncodeOutcome {
            assignments,
            rendered,
        })
    }
}
