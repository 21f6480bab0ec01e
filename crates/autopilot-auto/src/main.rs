mod error;
mod runner;
mod script;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use autopilot_core::config::{autopilot_dir, AutopilotConfig};
use autopilot_core::engine::Engine;
use autopilot_core::scene::Scene;
use autopilot_core::scheduler::TickOutcome;
use autopilot_core::session::Session;
use autopilot_core::store::{MemoryStore, RedbStore, SharedStore, StoreError, NOT_FOUND};
use autopilot_core::sync::SyncClient;

use crate::error::AutoError;
use crate::runner::FrameClock;

const STORE_FILENAME: &str = "store.redb";

#[derive(Parser)]
#[command(name = "autopilot", version, about = "Frame-driven UI test automation runner")]
struct Cli {
    /// Config file (defaults to ~/.autopilot/config.json)
    #[arg(long, global = true, env = "AUTOPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a YAML script against a scene
    Run(RunArgs),

    /// Read or write raw shared-store keys
    Store {
        #[command(flatten)]
        target: StoreArgs,

        #[command(subcommand)]
        action: StoreAction,
    },

    /// Print the state a device announced in a run
    State {
        /// Device id
        device: String,

        #[command(flatten)]
        target: StoreArgs,

        /// Run whose keys to read
        #[arg(long, env = "AUTOPILOT_RUN_ID")]
        run_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Print the value of a key, or `not_found`
    Get { key: String },
    /// Set a key
    Set { key: String, value: String },
}

#[derive(Args)]
struct StoreArgs {
    /// Store file (defaults to the configured store, then ~/.autopilot/store.redb)
    #[arg(long, env = "AUTOPILOT_STORE")]
    store: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// Path to the YAML script
    script: PathBuf,

    /// Scene description (JSON) the script drives
    #[arg(long)]
    scene: PathBuf,

    /// This device's id
    #[arg(long, env = "AUTOPILOT_DEVICE")]
    device: Option<String>,

    /// Run id shared by every device in the run
    #[arg(long, env = "AUTOPILOT_RUN_ID")]
    run_id: Option<String>,

    /// Shared store file; an in-memory store is used when unset
    #[arg(long, env = "AUTOPILOT_STORE")]
    store: Option<PathBuf>,

    /// Frames per second
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Tick back to back instead of in real time
    #[arg(long)]
    fast: bool,

    /// Abort the run after this many seconds of run time
    #[arg(long, default_value_t = 600.0)]
    max_seconds: f64,

    /// End the run on the first timeout
    #[arg(long)]
    fatal_timeouts: bool,

    /// End the run on the first failed assertion
    #[arg(long)]
    stop_on_failure: bool,

    /// Directory for the JSON Lines report
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or(OsStr::new("autopilot.log"));
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

async fn run(cli: Cli) -> Result<(), AutoError> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Run(args) => run_script(args, config).await,
        Command::Store { target, action } => {
            let store = open_file_store(target.store, &config)?;
            match action {
                StoreAction::Get { key } => {
                    let value = store.read(&key).map_err(store_error)?;
                    println!("{}", value.as_deref().unwrap_or(NOT_FOUND));
                }
                StoreAction::Set { key, value } => {
                    store.write(&key, &value).map_err(store_error)?;
                }
            }
            Ok(())
        }
        Command::State {
            device,
            target,
            run_id,
        } => {
            let run_id = run_id.or_else(|| config.run_id.clone()).ok_or_else(|| {
                AutoError::Runtime("no run id; pass --run-id or set run_id in the config".into())
            })?;
            let store = open_file_store(target.store, &config)?;
            let sync = SyncClient::new(Arc::new(store), run_id, config.device.clone());
            println!("{}", sync.read_state(&device));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AutopilotConfig, AutoError> {
    match path {
        Some(path) => AutopilotConfig::load_from(path).map_err(|e| {
            AutoError::Runtime(format!("cannot load config {}: {}", path.display(), e))
        }),
        None => Ok(AutopilotConfig::load()),
    }
}

fn store_error(e: StoreError) -> AutoError {
    AutoError::Runtime(format!("store error: {}", e))
}

/// Store for the inspection commands: flag, then config, then the default file.
fn open_file_store(flag: Option<PathBuf>, config: &AutopilotConfig) -> Result<RedbStore, AutoError> {
    let path = flag
        .or_else(|| config.store_path.clone())
        .unwrap_or_else(|| autopilot_dir().join(STORE_FILENAME));
    RedbStore::open(&path).map_err(store_error)
}

async fn run_script(args: RunArgs, mut config: AutopilotConfig) -> Result<(), AutoError> {
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(run_id) = args.run_id {
        config.run_id = Some(run_id);
    }
    if let Some(store) = args.store {
        config.store_path = Some(store);
    }
    if let Some(dir) = args.report_dir {
        config.report_dir = Some(dir);
    }
    config.fatal_on_timeout |= args.fatal_timeouts;
    config.stop_on_failed_step |= args.stop_on_failure;

    let loaded = script::load_file(&args.script, &config)?;
    let scene = Scene::load(&args.scene).map_err(|e| {
        AutoError::Runtime(format!("cannot load scene {}: {}", args.scene.display(), e))
    })?;
    let test_name = loaded.test_name.unwrap_or_else(|| {
        args.script
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("autopilot")
            .to_string()
    });

    let run_id = config.resolve_run_id();
    let store: Arc<dyn SharedStore> = match &config.store_path {
        Some(path) => Arc::new(RedbStore::open(path).map_err(store_error)?),
        None => Arc::new(MemoryStore::new()),
    };
    let sync = SyncClient::new(store, run_id.clone(), config.device.clone());

    let mut session = Session::new(&test_name, &config.device);
    if config.store_path.is_some() {
        session = session.with_mirror(sync.clone());
    }
    if let Some(dir) = &config.report_dir {
        session = session.with_report_dir(dir)?;
    }

    info!(test = %test_name, device = %config.device, run_id = %run_id, "starting run");
    let clock = FrameClock {
        fps: args.fps,
        fast: args.fast,
        max_seconds: args.max_seconds,
    };
    let mut engine = Engine::new(test_name, scene, session, sync, config);
    engine.load(loaded.script);
    let outcome = runner::run(&mut engine, clock).await;

    let session = engine.session();
    let summary = session.summary();
    if args.json {
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| AutoError::Runtime(e.to_string()))?;
        println!("{}", json);
    } else {
        println!(
            "{} {}: {} passed, {} failed, {} error(s)",
            if summary.passed() { "PASS" } else { "FAIL" },
            summary.test_name,
            summary.steps_passed,
            summary.steps_failed,
            summary.errors
        );
    }
    if let Some(path) = session.report_path() {
        eprintln!("Report: {}", path.display());
    }

    if summary.passed() {
        Ok(())
    } else {
        Err(AutoError::TestFailed {
            failed: summary.steps_failed,
            errors: summary.errors,
            aborted: match outcome {
                TickOutcome::Aborted(reason) => Some(reason),
                _ => None,
            },
        })
    }
}
