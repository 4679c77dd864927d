//! CLI front end: flag parsing, rewriter wiring, and the two run modes
//! (filter a dump to stdout, or print a table of contents).

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use crate::compression::Compression;
use crate::dispatch::{Action, Dispatcher, TableDmlDecision};
use crate::node::{MaterializedNode, NodeEvent, NodeStream, NodeType};
use crate::progress::ProgressReader;
use crate::rewriters;
use crate::scanner::{Scanner, SharedPosition};
use crate::tokenizer::Tokenizer;

const FILTERING: &str = "Filtering";
const BEHAVIOR: &str = "Behavior";
const OUTPUT: &str = "Output";

const AFTER_HELP: &str = "\x1b[1mExamples:\x1b[0m
  mysqldump-filter dump.sql > filtered.sql
  mysqldump-filter --database shop --exclude-table shop.sessions dump.sql.gz
  mysqldump-filter --no-data --skip-triggers dump.sql
  mysqldump-filter --toc dump.sql";

#[derive(Parser)]
#[command(name = "mysqldump-filter")]
#[command(version)]
#[command(about = "Streaming filter for MySQL logical dump files")]
#[command(after_help = AFTER_HELP)]
#[command(max_term_width = 100)]
pub struct Cli {
    /// Input file(s); '-' or omitted means standard input
    #[arg(value_hint = clap::ValueHint::FilePath)]
    files: Vec<PathBuf>,

    /// Only include tables matching db.tbl (repeatable)
    #[arg(short = 't', long = "table", value_name = "db.tbl", help_heading = FILTERING)]
    tables: Vec<String>,

    /// Exclude tables matching db.tbl (repeatable)
    #[arg(short = 'T', long = "exclude-table", value_name = "db.tbl", help_heading = FILTERING)]
    exclude_tables: Vec<String>,

    /// Only include the named database (repeatable)
    #[arg(short = 'd', long = "database", value_name = "name", help_heading = FILTERING)]
    databases: Vec<String>,

    /// Exclude the named database (repeatable)
    #[arg(short = 'D', long = "exclude-database", value_name = "name", help_heading = FILTERING)]
    exclude_databases: Vec<String>,

    /// Only include tables using the named storage engine (repeatable)
    #[arg(short = 'e', long = "engine", value_name = "name", help_heading = FILTERING)]
    engines: Vec<String>,

    /// Exclude tables using the named storage engine (repeatable)
    #[arg(short = 'E', long = "exclude-engine", value_name = "name", help_heading = FILTERING)]
    exclude_engines: Vec<String>,

    /// Only output schema, dropping all row data
    #[arg(long, help_heading = BEHAVIOR)]
    no_data: bool,

    /// Prepend SET SQL_LOG_BIN = 0 to suppress binlog writes on restore
    #[arg(long, help_heading = BEHAVIOR)]
    skip_binlog: bool,

    /// Drop CREATE TRIGGER blocks from table data sections
    #[arg(long, help_heading = BEHAVIOR)]
    skip_triggers: bool,

    /// Drop stored functions and procedures
    #[arg(long, help_heading = BEHAVIOR)]
    skip_routines: bool,

    /// Print a table of contents instead of filtering
    #[arg(long, help_heading = OUTPUT)]
    toc: bool,

    /// Show a byte-position progress bar on stderr
    #[arg(long, help_heading = OUTPUT)]
    progress: bool,

    /// Print per-node-type kept/skipped counts to stderr when done
    #[arg(short, long, help_heading = OUTPUT)]
    verbose: bool,
}

#[derive(Default)]
struct Stats {
    kept: std::collections::HashMap<&'static str, u64>,
    skipped: std::collections::HashMap<&'static str, u64>,
}

impl Stats {
    fn record(&mut self, node_type: NodeType, kept: bool) {
        let bucket = if kept { &mut self.kept } else { &mut self.skipped };
        *bucket.entry(node_type.as_str()).or_insert(0) += 1;
    }

    fn report(&self) {
        eprintln!("node counts (kept / skipped):");
        let mut types: Vec<&&str> = self.kept.keys().chain(self.skipped.keys()).collect();
        types.sort();
        types.dedup();
        for t in types {
            eprintln!(
                "  {:<20} {:>6} / {:<6}",
                t,
                self.kept.get(t).copied().unwrap_or(0),
                self.skipped.get(t).copied().unwrap_or(0)
            );
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let files = if cli.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        cli.files.clone()
    };

    if cli.toc {
        for path in &files {
            print_toc(path)?;
        }
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(256 * 1024, stdout.lock());
    let mut stats = Stats::default();

    for path in &files {
        run_one(&cli, path, &mut out, &mut stats)?;
    }
    out.flush()?;

    if cli.verbose {
        stats.report();
    }
    Ok(())
}

fn open_input(path: &PathBuf) -> Result<Box<dyn Read>> {
    if path == &PathBuf::from("-") {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let compression = Compression::from_path(path);
    let reader = compression
        .wrap_reader(Box::new(file))
        .with_context(|| format!("decompressing {}", path.display()))?;
    Ok(reader)
}

fn run_one(
    cli: &Cli,
    path: &PathBuf,
    out: &mut impl Write,
    stats: &mut Stats,
) -> Result<()> {
    let raw = open_input(path)?;

    let shared_position = SharedPosition::new();
    let bar = if cli.progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Some(Arc::new(bar))
    } else {
        None
    };

    let bar_for_callback = bar.clone();
    let position_for_callback = shared_position.clone();
    let reader: Box<dyn Read> = if bar.is_some() {
        Box::new(ProgressReader::new(raw, move |bytes| {
            let (lineno, _) = position_for_callback.get();
            if let Some(bar) = &bar_for_callback {
                bar.set_message(format!("{} lines, {} bytes", lineno, bytes));
                bar.tick();
            }
        }))
    } else {
        raw
    };

    let buffered = BufReader::with_capacity(256 * 1024, reader);
    let scanner = Scanner::new(buffered).with_shared_position(shared_position);
    let tokenizer = Tokenizer::new(scanner);
    let mut node_stream = NodeStream::new(tokenizer);
    let mut dispatcher = build_dispatcher(cli)?;

    loop {
        match node_stream.next_event()? {
            None => break,
            Some(NodeEvent::Block(mut node)) => {
                let node_type = node.node_type;
                let action = dispatcher.dispatch_block(&mut node)?;
                let kept = matches!(action, Action::Keep);
                if kept {
                    out.write_all(&node.render())?;
                }
                stats.record(node_type, kept);
            }
            Some(NodeEvent::TableDml(mut cursor)) => {
                let decision = dispatcher.dispatch_dml()?;
                match decision {
                    TableDmlDecision::Skip => {
                        cursor.drain()?;
                        stats.record(NodeType::TableDml, false);
                    }
                    TableDmlDecision::FilterTriggers => {
                        cursor.set_filter_triggers(true);
                        while let Some(tok) = cursor.next_token()? {
                            out.write_all(&tok.text)?;
                        }
                        stats.record(NodeType::TableDml, true);
                    }
                    TableDmlDecision::Continue => {
                        while let Some(tok) = cursor.next_token()? {
                            out.write_all(&tok.text)?;
                        }
                        stats.record(NodeType::TableDml, true);
                    }
                }
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    Ok(())
}

fn build_dispatcher(cli: &Cli) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();

    if cli.no_data {
        dispatcher.register_dml(rewriters::skip_node_dml());
    }
    if cli.skip_binlog {
        dispatcher.register_node(NodeType::SetupSession, rewriters::skip_binlog_node());
    }
    if cli.skip_routines {
        dispatcher.register_node(NodeType::DatabaseRoutines, rewriters::skip_node_node());
    }
    if cli.skip_triggers {
        dispatcher.register_dml(rewriters::skip_triggers_dml());
    }

    let mut databases = cli.databases.clone();
    let mut exclude_databases = cli.exclude_databases.clone();
    for tbl in &cli.tables {
        if let Some((db, _)) = tbl.split_once('.') {
            if !databases.iter().any(|d| d == db) {
                eprintln!("note: adding implicit database inclusion '{db}' from --table {tbl}");
                databases.push(db.to_string());
            }
        }
    }
    for tbl in &cli.exclude_tables {
        if let Some((db, _)) = tbl.split_once('.') {
            if !exclude_databases.iter().any(|d| d == db) {
                eprintln!("note: adding implicit database exclusion '{db}' from --exclude-table {tbl}");
                exclude_databases.push(db.to_string());
            }
        }
    }

    if !databases.is_empty() || !exclude_databases.is_empty() {
        for node_type in [
            NodeType::DatabaseDdl,
            NodeType::ViewFinalizeDb,
            NodeType::TableDdl,
            NodeType::ViewTempDdl,
            NodeType::ViewDdl,
            NodeType::DatabaseRoutines,
            NodeType::DatabaseEvents,
        ] {
            dispatcher.register_node(
                node_type,
                rewriters::skip_databases_node(&databases, &exclude_databases)?,
            );
        }
        dispatcher.register_dml(rewriters::skip_databases_dml(&databases, &exclude_databases)?);
    }

    if !cli.tables.is_empty() || !cli.exclude_tables.is_empty() {
        for node_type in [NodeType::TableDdl, NodeType::ViewTempDdl, NodeType::ViewDdl] {
            dispatcher.register_node(
                node_type,
                rewriters::skip_tables_node(&cli.tables, &cli.exclude_tables)?,
            );
        }
        dispatcher.register_dml(rewriters::skip_tables_dml(&cli.tables, &cli.exclude_tables)?);
    }

    if !cli.engines.is_empty() || !cli.exclude_engines.is_empty() {
        for node_type in [NodeType::TableDdl, NodeType::ViewTempDdl] {
            dispatcher.register_node(
                node_type,
                rewriters::skip_engines(&cli.engines, &cli.exclude_engines)?,
            );
        }
    }

    Ok(dispatcher)
}

fn print_toc(path: &PathBuf) -> Result<()> {
    let reader = open_input(path)?;
    let buffered = BufReader::with_capacity(256 * 1024, reader);
    let scanner = Scanner::new(buffered);
    let tokenizer = Tokenizer::new(scanner);
    let mut node_stream = NodeStream::new(tokenizer);

    println!("{}", path.display());
    println!("{}", "=".repeat(path.display().to_string().len()));

    loop {
        match node_stream.next_event()? {
            None => break,
            Some(NodeEvent::Block(node)) => print_toc_row(&node),
            Some(NodeEvent::TableDml(mut cursor)) => {
                let database = cursor.database().unwrap_or("").to_string();
                while cursor.next_token()?.is_some() {}
                println!(
                    "{:<20} {:<40}",
                    NodeType::TableDml.as_str(),
                    format!("`{database}` (data)")
                );
            }
        }
    }
    Ok(())
}

fn print_toc_row(node: &MaterializedNode) {
    let label = format_node(node);
    let (start_byte, end_byte) = node.byte_range();
    let (start_line, end_line) = node.line_range();
    println!(
        "{:<20} {:<40} bytes:{:<20} lines:{:<10}",
        node.node_type.as_str(),
        label,
        format!("{start_byte}-{end_byte}"),
        format!("{start_line}-{end_line}"),
    );
}

fn format_node(node: &MaterializedNode) -> String {
    let db = node.database.as_deref().unwrap_or("");
    match node.node_type {
        NodeType::DatabaseDdl => format!("`{db}` (database)"),
        NodeType::TableDdl => format!("`{db}`.`{}` (ddl)", node.table().unwrap_or_default()),
        NodeType::ViewTempDdl => format!("`{db}`.`{}` (view [temp])", node.table().unwrap_or_default()),
        NodeType::ViewDdl => format!("`{db}`.`{}` (view)", node.table().unwrap_or_default()),
        NodeType::DatabaseRoutines => format!("`{db}` (routines)"),
        NodeType::ViewFinalizeDb => format!("`{db}` (use database)"),
        other => other.as_str().to_string(),
    }
}
