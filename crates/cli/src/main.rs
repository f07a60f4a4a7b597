mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use trigscript_core::{compile_script, compile_trigger, parse_trigger, Trigger};

use report::{report_error, report_parse_error};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Achievement trigger script compiler.
#[derive(Parser)]
#[command(
    name = "trigscript",
    version,
    about = "Achievement trigger script compiler"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and print the achievements it declares
    Compile {
        /// Path to the script file
        file: PathBuf,
    },

    /// Normalize a single trigger expression and print its requirements
    Trigger {
        /// Trigger expression, e.g. "byte(0x10) == 3"
        expression: String,
        /// Script to run first, for variables and functions the expression uses
        #[arg(long)]
        script: Option<PathBuf>,
    },

    /// Decode a serialized trigger into its requirements
    Decode {
        /// Serialized trigger string
        wire: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile { file } => {
            cmd_compile(&file, cli.output, cli.quiet);
        }
        Commands::Trigger { expression, script } => {
            cmd_trigger(&expression, script.as_deref(), cli.output, cli.quiet);
        }
        Commands::Decode { wire } => {
            cmd_decode(&wire, cli.output, cli.quiet);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn read_source(path: &Path, output: OutputFormat, quiet: bool) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            report_error(
                &format!("failed to read {}: {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

fn print_json(value: &serde_json::Value) {
    let pretty =
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

// ──────────────────────────────────────────────
// Subcommands
// ──────────────────────────────────────────────

/// JSON shape of one compiled achievement.
#[derive(Serialize)]
struct CompiledAchievement<'a> {
    title: &'a str,
    description: &'a str,
    points: i64,
    trigger: String,
    requirements: &'a Trigger,
}

fn cmd_compile(file: &Path, output: OutputFormat, quiet: bool) {
    let source = read_source(file, output, quiet);
    log::info!("compiling {}", file.display());

    let achievements = match compile_script(&source) {
        Ok(a) => a,
        Err(e) => {
            report_parse_error(&e, output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => {
            let entries: Vec<CompiledAchievement> = achievements
                .iter()
                .map(|a| CompiledAchievement {
                    title: &a.title,
                    description: &a.description,
                    points: a.points,
                    trigger: trigscript_core::serialize_trigger(&a.trigger),
                    requirements: &a.trigger,
                })
                .collect();
            match serde_json::to_value(&entries) {
                Ok(v) => print_json(&v),
                Err(e) => {
                    report_error(&format!("serialization error: {}", e), output, quiet);
                    process::exit(1);
                }
            }
        }
        OutputFormat::Text => {
            for a in &achievements {
                println!("{} ({} points)", a.title, a.points);
                if !quiet {
                    println!("  {}", a.description);
                }
                println!("  {}", trigscript_core::serialize_trigger(&a.trigger));
            }
        }
    }
}

fn cmd_trigger(expression: &str, script: Option<&Path>, output: OutputFormat, quiet: bool) {
    let prelude = script.map(|p| read_source(p, output, quiet));

    let (normalized, trigger) = match compile_trigger(prelude.as_deref(), expression) {
        Ok(r) => r,
        Err(e) => {
            report_parse_error(&e, output, quiet);
            process::exit(1);
        }
    };
    let wire = trigscript_core::serialize_trigger(&trigger);

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "expression": normalized.to_string(),
            "trigger": wire,
            "requirements": trigger,
        })),
        OutputFormat::Text => {
            if !quiet {
                println!("{}", normalized);
            }
            println!("{}", wire);
        }
    }
}

fn cmd_decode(wire: &str, output: OutputFormat, quiet: bool) {
    let trigger = match parse_trigger(wire) {
        Ok(t) => t,
        Err(e) => {
            report_parse_error(&e, output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => match serde_json::to_value(&trigger) {
            Ok(v) => print_json(&v),
            Err(e) => {
                report_error(&format!("serialization error: {}", e), output, quiet);
                process::exit(1);
            }
        },
        OutputFormat::Text => {
            let groups = std::iter::once(("core".to_owned(), &trigger.core)).chain(
                trigger
                    .alts
                    .iter()
                    .enumerate()
                    .map(|(i, g)| (format!("alt {}", i + 1), g)),
            );
            for (label, group) in groups {
                println!("{}:", label);
                for req in &group.requirements {
                    println!("  {}", trigscript_core::serialize::serialize_requirement(req));
                }
            }
        }
    }
}
