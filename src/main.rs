use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::{Value, json};
use skipmark::config::{TargetTable, builtin_table, load_table_file};
use skipmark::driver::{RunOptions, RunSummary, run_table};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "skipmark")]
#[command(about = "Insert skip markers into superseded Go test functions")]
struct Cli {
    /// YAML target table; the built-in migration table is used when absent.
    #[arg(long)]
    table: Option<PathBuf>,
    /// Directory relative table paths are resolved against.
    #[arg(long)]
    root: Option<PathBuf>,
    #[arg(long)]
    dry_run: bool,
    /// Leave tests that already carry the same marker untouched.
    #[arg(long)]
    skip_marked: bool,
    #[arg(long)]
    json: bool,
    #[arg(long, conflicts_with_all = ["dry_run", "skip_marked", "json"])]
    print_table: bool,
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            let payload = json!({
                "error": {
                    "code": err.code,
                    "message": err.message,
                }
            });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<bool, CliError> {
    let cli = Cli::parse();
    let table = load_table(&cli)?;

    if cli.print_table {
        let rendered = table
            .to_yaml()
            .map_err(|err| CliError::new("table_render_error", err.to_string()))?;
        print!("{rendered}");
        return Ok(true);
    }

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().map_err(|err| CliError::io("cwd_error", err))?,
    };
    if !root.is_dir() {
        return Err(CliError::new(
            "root_error",
            format!("root `{}` is not a directory", root.display()),
        ));
    }

    let options = RunOptions {
        root,
        dry_run: cli.dry_run,
        skip_marked: cli.skip_marked,
    };

    let summary = if cli.json {
        let summary = run_table(&table, &options, &mut io::sink())
            .map_err(|err| CliError::io("output_error", err))?;
        print_json(&summary_json(&summary)?)?;
        summary
    } else {
        println!("Adding skip markers to converted Go integration tests...\n");
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let summary =
            run_table(&table, &options, &mut out).map_err(|err| CliError::io("output_error", err))?;
        out.flush().map_err(|err| CliError::io("output_error", err))?;
        summary
    };

    Ok(summary.all_succeeded())
}

fn load_table(cli: &Cli) -> Result<TargetTable, CliError> {
    match &cli.table {
        Some(path) => load_table_file(path).map_err(|err| {
            CliError::new(
                "table_error",
                format!("failed to load `{}`: {err}", path.display()),
            )
        }),
        None => Ok(builtin_table()),
    }
}

fn summary_json(summary: &RunSummary) -> Result<Value, CliError> {
    let mut payload = serde_json::to_value(summary)?;
    if let Value::Object(map) = &mut payload {
        map.insert(
            "status".to_string(),
            json!(if summary.all_succeeded() { "ok" } else { "partial" }),
        );
    }
    Ok(payload)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}
