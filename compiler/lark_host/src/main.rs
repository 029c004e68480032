//! Lark host CLI
//!
//! Loads a sandbox policy and runtime configuration, then runs the
//! built-in counter demonstration across several evaluator threads.

use std::process::ExitCode;
use std::sync::Once;

use lark_eval::{Context, ContextError, RuntimeConfig, SandboxPolicy, Value};

mod demo;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber when `RUST_LOG` is set.
///
/// ```bash
/// RUST_LOG=lark_eval=debug lark --policy policy.json
/// ```
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

#[derive(Debug)]
struct Options {
    policy: Option<String>,
    config: Option<String>,
    workers: u32,
    iterations: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            policy: None,
            config: None,
            workers: 4,
            iterations: 1000,
        }
    }
}

fn print_usage() {
    eprintln!("Usage: lark [options]");
    eprintln!();
    eprintln!("Runs the concurrent counter demo under a sandbox policy.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --policy <file>       Policy descriptor (JSON); default denies everything");
    eprintln!("  --config <file>       Runtime configuration (JSON)");
    eprintln!("  --workers=<n>         Evaluator threads to spawn (default: 4)");
    eprintln!("  --iterations=<n>      Increments per worker (default: 1000)");
    eprintln!("  -h, --help            Show this message");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--policy" || arg == "--config" {
            let Some(path) = args.get(i + 1) else {
                return Err(format!("{arg} needs a file path"));
            };
            if arg == "--policy" {
                options.policy = Some(path.clone());
            } else {
                options.config = Some(path.clone());
            }
            i += 2;
            continue;
        }
        if let Some(n) = arg.strip_prefix("--workers=") {
            options.workers = n
                .parse()
                .map_err(|_| format!("invalid worker count `{n}`"))?;
        } else if let Some(n) = arg.strip_prefix("--iterations=") {
            options.iterations = n
                .parse()
                .map_err(|_| format!("invalid iteration count `{n}`"))?;
        } else {
            return Err(format!("unknown option `{arg}`"));
        }
        i += 1;
    }
    Ok(options)
}

fn read(path: &str) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {path}: {e}"))
}

fn load_policy(path: Option<&str>) -> Result<SandboxPolicy, String> {
    let Some(path) = path else {
        return Ok(SandboxPolicy::deny_all());
    };
    SandboxPolicy::from_json(&read(path)?).map_err(|e| format!("{path}: {e}"))
}

fn load_config(path: Option<&str>) -> Result<RuntimeConfig, String> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    RuntimeConfig::from_json(&read(path)?).map_err(|e| format!("{path}: {e}"))
}

fn run(options: &Options) -> Result<Value, String> {
    let policy = load_policy(options.policy.as_deref())?;
    let config = load_config(options.config.as_deref())?;
    tracing::debug!(capabilities = ?policy.capabilities(), "policy loaded");

    let ctx = Context::builder(demo::counter_program())
        .policy(policy)
        .config(config)
        .native(demo::print_native())
        .build()
        .map_err(|e| match e {
            ContextError::Config(e) => format!("configuration: {e}"),
            e @ (ContextError::Program(_) | ContextError::Capability { .. }) => e.to_string(),
        })?;

    let args = vec![
        Value::Number(f64::from(options.workers)),
        Value::Number(f64::from(options.iterations)),
    ];
    ctx.run(args).map_err(|e| {
        let mut message = format!("{}: {}", e.kind_name(), e.message());
        for note in &e.notes {
            message.push_str(&format!("\n  note: {}", note.message));
        }
        if let Some(backtrace) = &e.backtrace {
            for name in backtrace.names() {
                message.push_str(&format!("\n  in {name}"));
            }
        }
        message
    })
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(&options) {
        Ok(value) => {
            println!("{}", value.to_display_string());
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;
