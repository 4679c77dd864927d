// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod cmd;
mod compression;
mod dispatch;
mod error;
mod glob_filter;
mod node;
mod progress;
mod rewriters;
mod scanner;
mod token;
mod tokenizer;

use clap::Parser;
use cmd::Cli;
use error::PipelineError;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli) {
        eprintln!("{e}");
        let code = e.downcast_ref::<PipelineError>().map(|pe| pe.exit_code()).unwrap_or(1);
        std::process::exit(code);
    }
}
