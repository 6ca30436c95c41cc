use std::env;
use std::io;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

mod script;

use script::load_config;
use script::load_script;
use script::CliConfig;
use script::Replay;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("formsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "replay" => {
            let args = parse_replay_args(args.collect::<Vec<_>>())?;
            init_tracing();
            replay(args)
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, PartialEq)]
struct ReplayArgs {
    script: PathBuf,
    config: Option<PathBuf>,
}

fn parse_replay_args(args: Vec<String>) -> Result<ReplayArgs, Box<dyn std::error::Error>> {
    let mut script = None;
    let mut config = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--config requires a path".into());
                };
                config = Some(PathBuf::from(value));
                i += 2;
            }
            other if other.starts_with("--") => {
                return Err(format!("unsupported argument: {other}").into());
            }
            other => {
                if script.is_some() {
                    return Err(format!("unexpected argument: {other}").into());
                }
                script = Some(PathBuf::from(other));
                i += 1;
            }
        }
    }
    let Some(script) = script else {
        return Err("replay requires a script path".into());
    };
    Ok(ReplayArgs { script, config })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn replay(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => CliConfig::default(),
    };
    let script = load_script(&args.script)?;

    let mut replay = Replay::new(&script, &config)?;
    replay.run(&script, &mut io::stdout().lock())?;

    println!("{}", serde_json::to_string_pretty(replay.state())?);
    Ok(())
}

fn print_help() {
    println!("formsync - replay form/store command scripts");
    println!();
    println!("usage:");
    println!("  formsync replay <script.json|script.yaml> [--config <formsync.toml>]");
    println!("  formsync help");
    println!("  formsync version");
    println!();
    println!("set RUST_LOG=formsync_core=debug to trace applied commands and diffs");
}
