//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::Context;
use clap::{crate_version, Arg, ArgAction, Command};
use log::info;
use rat25s::{lex, parse, report};

use std::fs::{self, File};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("Rat25S compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("FILE")
                .help("Rat25S source file"),
        )
        .arg(
            Arg::new("output")
                .value_name("FILE")
                .default_value("parser_output.txt")
                .help("Report destination"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable progress output"),
        )
        .get_matches();

    let level = if args.get_flag("verbose") {
        log::Level::Info
    } else {
        log::Level::Warn
    };
    simple_logger::init_with_level(level)?;

    // Se extraen argumentos necesarios
    let input = args
        .get_one::<String>("input")
        .expect("main.rs allowed a missing input");
    let output = args
        .get_one::<String>("output")
        .expect("main.rs dropped the output default");

    info!("Parsing {}...", input);
    let source = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input))?;

    let tokens = lex::tokenize(&source);
    info!("Found {} tokens, parsing...", tokens.len());

    let compilation = parse::parse(tokens);

    let mut file = File::create(output)
        .with_context(|| format!("Failed to open for writing: {}", output))?;
    report::write(&compilation, &mut file)
        .with_context(|| format!("Failed to write report to: {}", output))?;

    if compilation.diagnostics.is_empty() {
        info!("Parsing completed successfully. Output written to {}", output);
    } else {
        info!(
            "Parsing completed with {} errors. See {} for details.",
            compilation.error_count(),
            output
        );
    }

    Ok(())
}
