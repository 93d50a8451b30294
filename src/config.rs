//! Job configuration for the `smap` and `encode` commands.
//!
//! Both jobs can be described in a YAML (or JSON) document and loaded with
//! `load`, or assembled from command-line flags. Either way `validate` runs
//! before any workbook or ledger is touched, so malformed ranges and
//! mismatched list lengths surface as [`ToolError::Config`] up front.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    encoder::EncodeJob,
    error::{Result, ToolError},
    io_utils::DEFAULT_SUFFIX,
    lookup::{ApplyOptions, EmptyOrKeep, FieldRange, Highlight, MatchPolicy, NoMatchAction, SmapJob},
    range::CellRange,
};

const DEFAULT_HEADER_ROW: u32 = 2;
const DEFAULT_PAD_WIDTH: usize = 3;

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z]+\d+:[A-Za-z]+\d+$").expect("range pattern compiles")
    })
}

fn check_range(label: &str, spec: &str) -> Result<CellRange> {
    if !range_pattern().is_match(spec) {
        return Err(ToolError::config(format!(
            "{label}: '{spec}' is not a range like 'A2:B30'"
        )));
    }
    CellRange::parse(spec).map_err(|err| ToolError::config(format!("{label}: {err}")))
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| ToolError::read(path, err))?;
    serde_yaml::from_reader(BufReader::new(file))
        .map_err(|err| ToolError::config(format!("{path:?}: {err}")))
}

/// Parses a `{"field": "A2:B30"}` JSON object.
pub fn parse_fields_json(text: &str) -> Result<BTreeMap<String, String>> {
    serde_json::from_str(text)
        .map_err(|err| ToolError::config(format!("field map is not a JSON object of strings: {err}")))
}

/// Parses `FIELD=RANGE`.
pub fn parse_field_assignment(spec: &str) -> Result<(String, String)> {
    let (field, range) = spec
        .rsplit_once('=')
        .ok_or_else(|| ToolError::config(format!("'{spec}' must look like FIELD=A2:B30")))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(ToolError::config(format!("'{spec}' is missing a field name")));
    }
    Ok((field.to_string(), range.trim().to_string()))
}

fn default_header_row() -> u32 {
    DEFAULT_HEADER_ROW
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

fn default_pad_width() -> usize {
    DEFAULT_PAD_WIDTH
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SmapConfig {
    pub target: PathBuf,
    pub lookup: PathBuf,
    #[serde(default)]
    pub lookup_sheet: Option<String>,
    /// Header text of each target column mapped to its lookup range.
    pub fields: BTreeMap<String, String>,
    #[serde(default = "default_header_row")]
    pub header_row: u32,
    #[serde(default)]
    pub skip_rows: u32,
    #[serde(default)]
    pub sheets: Vec<String>,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default)]
    pub no_match: NoMatchAction,
    /// Fill colour for matched cells; switches from replacing to highlighting.
    #[serde(default)]
    pub highlight: Option<String>,
}

impl SmapConfig {
    pub fn new(target: PathBuf, lookup: PathBuf, fields: BTreeMap<String, String>) -> Self {
        Self {
            target,
            lookup,
            lookup_sheet: None,
            fields,
            header_row: DEFAULT_HEADER_ROW,
            skip_rows: 0,
            sheets: Vec::new(),
            suffix: default_suffix(),
            no_match: NoMatchAction::default(),
            highlight: None,
        }
    }

    /// Reads a job file; validation happens in [`SmapConfig::to_job`] so flags
    /// can still fill in missing values.
    pub fn load(path: &Path) -> Result<Self> {
        load_document(path)
    }

    pub fn validate(&self) -> Result<()> {
        self.field_ranges()?;
        if self.header_row == 0 {
            return Err(ToolError::config("header_row is 1-based and must be at least 1"));
        }
        if self.suffix.is_empty() {
            return Err(ToolError::config("suffix must not be empty"));
        }
        if matches!(&self.highlight, Some(color) if color.trim().is_empty()) {
            return Err(ToolError::config("highlight colour must not be empty"));
        }
        Ok(())
    }

    fn field_ranges(&self) -> Result<Vec<FieldRange>> {
        if self.fields.is_empty() {
            return Err(ToolError::config("at least one field and lookup range is required"));
        }
        self.fields
            .iter()
            .map(|(field, spec)| {
                check_range(&format!("field '{field}'"), spec)?;
                FieldRange::parse(field, spec)
            })
            .collect()
    }

    pub fn to_job(&self) -> Result<SmapJob> {
        self.validate()?;
        Ok(SmapJob {
            target: self.target.clone(),
            lookup: self.lookup.clone(),
            lookup_sheet: self.lookup_sheet.clone(),
            fields: self.field_ranges()?,
            options: ApplyOptions {
                header_row: self.header_row,
                skip_rows: self.skip_rows,
                sheets: self.sheets.clone(),
            },
            suffix: self.suffix.clone(),
        })
    }

    pub fn policy(&self) -> Box<dyn MatchPolicy> {
        match &self.highlight {
            Some(color) => Box::new(Highlight::new(color.trim())),
            None => Box::new(EmptyOrKeep::new(self.no_match)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EncoderConfig {
    pub excel_file: PathBuf,
    pub range: String,
    pub function_indices: Vec<usize>,
    pub separators: Vec<String>,
    pub database_path: PathBuf,
    #[serde(default)]
    pub begin_serial: Option<i64>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default = "default_pad_width", alias = "num_zill")]
    pub pad_width: usize,
}

impl EncoderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_document(path)
    }

    pub fn validate(&self) -> Result<()> {
        check_range("range", &self.range)?;
        if self.function_indices.is_empty() {
            return Err(ToolError::config("function_indices must list at least one transform"));
        }
        if self.separators.len() != self.function_indices.len() {
            return Err(ToolError::config(format!(
                "separators has {} entries but function_indices has {}; the counts must match",
                self.separators.len(),
                self.function_indices.len()
            )));
        }
        if let Some(begin) = self.begin_serial
            && begin < 0
        {
            return Err(ToolError::config(format!(
                "begin_serial must be zero or positive, got {begin}"
            )));
        }
        Ok(())
    }

    pub fn to_job(&self) -> Result<EncodeJob> {
        self.validate()?;
        Ok(EncodeJob {
            input: self.excel_file.clone(),
            sheet: self.sheet_name.clone(),
            range: check_range("range", &self.range)?,
            transform_indices: self.function_indices.clone(),
            separators: self.separators.clone(),
            database: self.database_path.clone(),
            begin_serial: self.begin_serial,
            pad_width: self.pad_width,
        })
    }
}
