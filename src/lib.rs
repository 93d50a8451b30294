pub mod cli;
pub mod config;
pub mod data;
pub mod encoder;
pub mod error;
pub mod io_utils;
pub mod ledger;
pub mod lookup;
pub mod range;
pub mod table;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::{EncoderConfig, SmapConfig},
    ledger::SerialLedger,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("erp_sheet_tools", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Smap(args) => handle_smap(&args),
        Commands::Encode(args) => handle_encode(&args),
        Commands::Ledger(args) => handle_ledger(&args),
    }
}

fn smap_config_from_args(args: &cli::SmapArgs) -> Result<SmapConfig> {
    let mut config = match &args.config {
        Some(path) => {
            SmapConfig::load(path).with_context(|| format!("Loading smap job from {path:?}"))?
        }
        None => {
            let (Some(target), Some(lookup)) = (&args.target, &args.lookup) else {
                return Err(anyhow!("smap requires --target and --lookup (or --config)"));
            };
            SmapConfig::new(target.clone(), lookup.clone(), Default::default())
        }
    };
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    if let Some(lookup) = &args.lookup {
        config.lookup = lookup.clone();
    }
    if let Some(sheet) = &args.lookup_sheet {
        config.lookup_sheet = Some(sheet.clone());
    }
    if let Some(json) = &args.fields_json {
        config.fields.extend(config::parse_fields_json(json)?);
    }
    for spec in &args.fields {
        let (field, range) = config::parse_field_assignment(spec)?;
        config.fields.insert(field, range);
    }
    if let Some(header_row) = args.header_row {
        config.header_row = header_row;
    }
    if let Some(skip_rows) = args.skip_rows {
        config.skip_rows = skip_rows;
    }
    if !args.sheets.is_empty() {
        config.sheets = args.sheets.clone();
    }
    if let Some(suffix) = &args.suffix {
        config.suffix = suffix.clone();
    }
    if let Some(no_match) = args.no_match {
        config.no_match = no_match;
    }
    if let Some(color) = &args.highlight {
        config.highlight = Some(color.clone());
    }
    Ok(config)
}

fn handle_smap(args: &cli::SmapArgs) -> Result<()> {
    let config = smap_config_from_args(args)?;
    let job = config.to_job()?;
    debug!("Smap fields: {:?}", config.fields);
    info!(
        "Replacing {} field(s) in {:?} using {:?}",
        job.fields.len(),
        job.target,
        job.lookup
    );
    let mut policy = config.policy();
    let outcome = job
        .run(policy.as_mut())
        .with_context(|| format!("Processing {:?}", job.target))?;
    println!(
        "{} matched, {} unmatched in {} column(s); saved to {}",
        outcome.summary.matched,
        outcome.summary.unmatched,
        outcome.summary.columns,
        outcome.output.display()
    );
    Ok(())
}

fn encoder_config_from_args(args: &cli::EncodeArgs) -> Result<EncoderConfig> {
    let mut config = match &args.config {
        Some(path) => {
            EncoderConfig::load(path).with_context(|| format!("Loading encode job from {path:?}"))?
        }
        None => {
            let (Some(input), Some(range), Some(database)) =
                (&args.input, &args.range, &args.database)
            else {
                return Err(anyhow!(
                    "encode requires --input, --range and --db (or --config)"
                ));
            };
            EncoderConfig {
                excel_file: input.clone(),
                range: range.clone(),
                function_indices: Vec::new(),
                separators: Vec::new(),
                database_path: database.clone(),
                begin_serial: None,
                sheet_name: None,
                pad_width: 3,
            }
        }
    };
    if let Some(input) = &args.input {
        config.excel_file = input.clone();
    }
    if let Some(range) = &args.range {
        config.range = range.clone();
    }
    if let Some(sheet) = &args.sheet {
        config.sheet_name = Some(sheet.clone());
    }
    if !args.transforms.is_empty() {
        config.function_indices = args.transforms.clone();
    }
    if !args.separators.is_empty() {
        config.separators = args.separators.clone();
    }
    if let Some(database) = &args.database {
        config.database_path = database.clone();
    }
    if args.begin_serial.is_some() {
        config.begin_serial = args.begin_serial;
    }
    if let Some(pad_width) = args.pad_width {
        config.pad_width = pad_width;
    }
    Ok(config)
}

fn handle_encode(args: &cli::EncodeArgs) -> Result<()> {
    let config = encoder_config_from_args(args)?;
    let job = config.to_job()?;
    info!(
        "Encoding {} of {:?} with transforms {:?}",
        job.range, job.input, job.transform_indices
    );
    let outcome = job
        .run()
        .with_context(|| format!("Encoding {:?}", job.input))?;
    io_utils::write_text_output(args.output.as_deref(), &outcome.rendered)?;
    if let Some(output) = &args.output {
        info!(
            "Wrote {} code(s) to {:?}",
            outcome.assignments.len(),
            output
        );
    }
    Ok(())
}

fn handle_ledger(args: &cli::LedgerArgs) -> Result<()> {
    let ledger = SerialLedger::open(&args.database)
        .with_context(|| format!("Opening serial ledger {:?}", args.database))?;
    if let Some(code) = &args.code {
        match ledger.max_serial(code)? {
            Some(max) => println!("{code}: max serial {max}"),
            None => println!("{code}: max serial none"),
        }
    }
    let records = ledger.records(args.code.as_deref(), args.limit)?;
    if records.is_empty() {
        info!("No ledger records in {:?}", args.database);
        return Ok(());
    }
    let rows = records
        .iter()
        .map(|record| {
            vec![
                record.id.to_string(),
                record.code.clone(),
                record.serial.to_string(),
                record.created_at.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&["id", "code", "serial", "created_at"], &rows);
    info!(
        "Listed {} of {} record(s) from {:?}",
        records.len(),
        ledger.len()?,
        args.database
    );
    Ok(())
}
