use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::lookup::NoMatchAction;

#[derive(Debug, Parser)]
#[command(author, version, about = "Spreadsheet lookup and serial code tools for ERP imports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace column values in a workbook using lookup ranges from another workbook
    Smap(SmapArgs),
    /// Generate codes from a range and assign unique serial numbers
    Encode(EncodeArgs),
    /// Inspect the serial ledger
    Ledger(LedgerArgs),
}

#[derive(Debug, Args)]
pub struct SmapArgs {
    /// YAML/JSON job file; explicit flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Workbook whose columns are rewritten (saved under a new name)
    #[arg(short, long)]
    pub target: Option<PathBuf>,
    /// Workbook holding the lookup ranges
    #[arg(short, long)]
    pub lookup: Option<PathBuf>,
    /// Sheet of the lookup workbook to read (defaults to the first sheet)
    #[arg(long = "lookup-sheet")]
    pub lookup_sheet: Option<String>,
    /// Field and lookup range as `FIELD=A2:B30` (repeatable)
    #[arg(short = 'f', long = "field", action = clap::ArgAction::Append)]
    pub fields: Vec<String>,
    /// Field map as a JSON object such as `{"FIELD": "A2:B30"}`
    #[arg(long = "fields-json")]
    pub fields_json: Option<String>,
    /// 1-based row holding the field names (default 2)
    #[arg(long = "header-row")]
    pub header_row: Option<u32>,
    /// Rows to skip after the header row before processing
    #[arg(long = "skip-rows")]
    pub skip_rows: Option<u32>,
    /// Sheets of the target to process (repeatable; all sheets if omitted)
    #[arg(short = 's', long = "sheet", action = clap::ArgAction::Append)]
    pub sheets: Vec<String>,
    /// Suffix inserted before the extension of the output file (default `_processed`)
    #[arg(long)]
    pub suffix: Option<String>,
    /// What to do with cells that have no lookup match
    #[arg(long = "no-match", value_enum)]
    pub no_match: Option<NoMatchAction>,
    /// Highlight matched cells with this fill colour instead of replacing them
    #[arg(long, num_args = 0..=1, default_missing_value = "#FFFF00")]
    pub highlight: Option<String>,
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    /// YAML/JSON job file; explicit flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Workbook to read codes from
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// Rectangular range such as `A2:B880`
    #[arg(short, long)]
    pub range: Option<String>,
    /// Sheet holding the range (defaults to the first sheet)
    #[arg(short, long)]
    pub sheet: Option<String>,
    /// Comma-separated transform indices, one per leading cell (0 = identity, 1 = yymmdd date)
    #[arg(short = 't', long = "transform", value_delimiter = ',')]
    pub transforms: Vec<usize>,
    /// Separator placed after each transformed cell (repeatable; may be empty)
    #[arg(long = "separator", action = clap::ArgAction::Append, allow_hyphen_values = true)]
    pub separators: Vec<String>,
    /// Serial ledger database file (created if missing)
    #[arg(long = "db")]
    pub database: Option<PathBuf>,
    /// First serial of the batch; every serial in the block must be unused
    #[arg(long = "begin-serial")]
    pub begin_serial: Option<i64>,
    /// Zero-padding width of the serial in the output (default 3)
    #[arg(long = "pad-width")]
    pub pad_width: Option<usize>,
    /// Output file for the generated codes (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct LedgerArgs {
    /// Serial ledger database file
    #[arg(long = "db")]
    pub database: PathBuf,
    /// Only show records for this code and report its current max serial
    #[arg(long)]
    pub code: Option<String>,
    /// Maximum number of records to list
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}
