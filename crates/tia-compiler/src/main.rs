//! compiler binary

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)]

use clap::{Args, Parser, Subcommand};

use compiler::{
    data::{load_export_config, load_project_file, ExportConfig, ProjectFile},
    export::{export_project, ExportOutput, TiaExportType},
};

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

macro_rules! error {
    ($($arg:tt)*) => {{
        eprintln!($($arg)*);
        std::process::exit(1);
    }};
}

#[derive(Parser)]
#[command(author, version)]
#[command(about = "TIA audio export compiler")]
#[command(arg_required_else_help = true)]
struct ArgParser {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a register-dump project into track data files
    Export(ExportArgs),

    /// Compile and validate without writing any output
    Check(CheckArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(short = 'c', long = "config", value_name = "FILE", help = "export config file")]
    config: Option<PathBuf>,

    #[arg(
        short = 't',
        long = "export-type",
        value_name = "TYPE",
        help = "override tiaExportType (RAW, BASIC, BASIC_RLE, TIACOMP, FSEQ, TIAZIP)"
    )]
    export_type: Option<String>,

    #[arg(long = "debug-output", help = "also write debug report files")]
    debug_output: bool,

    #[arg(value_name = "PROJECT_FILE", help = "register-dump project file")]
    project_file: PathBuf,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "DIR",
        default_value = ".",
        help = "directory the track data files are written to"
    )]
    output_dir: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

fn load_inputs(args: &ConfigArgs) -> (ProjectFile, ExportConfig) {
    let mut config = match &args.config {
        Some(path) => match load_export_config(path.clone()) {
            Ok(c) => c,
            Err(e) => error!("{}", e),
        },
        None => ExportConfig::default(),
    };
    if let Some(t) = &args.export_type {
        config.tia_export_type = t.clone();
    }
    if args.debug_output {
        config.debug_output = true;
    }

    // fail on a bad export type before doing any work
    if let Err(e) = TiaExportType::from_config_name(&config.tia_export_type) {
        error!("{}", e);
    }

    let pf = match load_project_file(args.project_file.clone()) {
        Ok(pf) => pf,
        Err(e) => error!("{}", e),
    };

    (pf, config)
}

fn run_export(args: &ConfigArgs) -> Vec<ExportOutput> {
    let (pf, config) = load_inputs(args);

    let abort = AtomicBool::new(false);
    match export_project(&pf.project, &config, &abort) {
        Ok(outputs) => outputs,
        Err(e) => error!("{}: {}", pf.file_name, e),
    }
}

fn export(args: ExportArgs) {
    let outputs = run_export(&args.config);

    if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
        error!("Unable to create {}: {}", args.output_dir.display(), e);
    }
    for output in &outputs {
        let path = args.output_dir.join(&output.filename);
        if let Err(e) = std::fs::write(&path, &output.data) {
            error!("Unable to write {}: {}", path.display(), e);
        }
        println!("wrote {} ({} bytes)", path.display(), output.data.len());
    }
}

fn check(args: CheckArgs) {
    let outputs = run_export(&args.config);
    for output in &outputs {
        println!("{}: {} bytes", output.filename, output.data.len());
    }
    println!("OK");
}

fn main() {
    env_logger::init();

    let args = ArgParser::parse();

    match args.command {
        Command::Export(args) => export(args),
        Command::Check(args) => check(args),
    }
}
