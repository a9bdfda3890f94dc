//! resin-sync - Entry Point
//!
//! Syncs a local source tree into the application container of a device and
//! offers a few direct container engine commands.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error};

use resin_sync::device::directory::ensure_device_is_online;
use resin_sync::docker::client::{EngineClient, RemoteHost};
use resin_sync::errors::SyncError;
use resin_sync::http::client::HttpClient;
use resin_sync::http::devices::HttpDeviceDirectory;
use resin_sync::logs::{init_logging, LogOptions};
use resin_sync::remote::rsync::RsyncCommand;
use resin_sync::remote::shell::ShellRunner;
use resin_sync::remote::ssh::SshShell;
use resin_sync::storage::layout::StorageLayout;
use resin_sync::storage::settings::Settings;
use resin_sync::sync::orchestrator::{Orchestrator, OrchestratorOptions, FAILURE_MESSAGE};
use resin_sync::sync::reporter::{Reporter, TerminalReporter};
use resin_sync::sync::request::{SyncFlags, SyncRequest};
use resin_sync::utils::version_info;

const USAGE: &str = "usage:
  resin-sync sync <uuid> --destination=<path> [--source=<dir>] [--before=<cmd>] [--after=<cmd>]
                  [--ignore=a,b] [--port=N] [--skip-gitignore] [--skip-restart] [--progress] [--verbose]
  resin-sync logs <app> --host=<engine host>
  resin-sync build <dir> <name> --host=<engine host>
  resin-sync rootfs <container> --host=<engine host> [--ssh-port=N]
  resin-sync init [--force]
  resin-sync --version";

/// Parsed command line
struct Cli {
    positional: Vec<String>,
    options: HashMap<String, String>,
}

impl Cli {
    fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut positional = Vec::new();
        let mut options = HashMap::new();

        for arg in args {
            if let Some(flag) = arg.strip_prefix("--") {
                // Handle --key=value and standalone --flag
                match flag.split_once('=') {
                    Some((key, value)) => options.insert(key.to_string(), value.to_string()),
                    None => options.insert(flag.to_string(), "true".to_string()),
                };
            } else {
                positional.push(arg);
            }
        }
        Self { positional, options }
    }

    fn arg(&self, index: usize, name: &'static str) -> Result<&str, SyncError> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or(SyncError::MissingOption(name))
    }

    fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    fn flag(&self, key: &str) -> bool {
        self.option(key).is_some_and(|v| v != "false")
    }

    fn port(&self, key: &str) -> Result<Option<u16>, SyncError> {
        self.option(key)
            .map(|v| {
                v.parse::<u16>()
                    .map_err(|e| SyncError::ConfigError(format!("--{}={}: {}", key, v, e)))
            })
            .transpose()
    }

    fn engine(&self, settings: &Settings) -> Result<EngineClient, SyncError> {
        let host = self
            .option("host")
            .ok_or(SyncError::MissingOption("host"))?;
        let port = self.port("engine-port")?.unwrap_or(settings.engine_port);
        Ok(EngineClient::connect(host, port)?
            .with_remote_shell(Arc::new(SshShell::new((&settings.ssh).into()))))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse(env::args().skip(1));

    if cli.flag("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("{}", e),
        }
        return;
    }

    let layout = StorageLayout::default();
    let settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            std::process::exit(2);
        }
    };

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: cli
            .option("log-dir")
            .map(PathBuf::from)
            .or_else(|| settings.log_dir(&layout)),
        json_format: cli.flag("log-json"),
        ..Default::default()
    };
    let _guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let reporter = Arc::new(TerminalReporter::stderr());
    let result = match cli.positional.first().map(String::as_str) {
        Some("sync") => run_sync(&cli, &settings, reporter.clone()).await,
        Some("logs") => run_logs(&cli, &settings).await,
        Some("build") => run_build(&cli, &settings).await,
        Some("rootfs") => run_rootfs(&cli, &settings).await,
        Some("init") => run_init(&cli, &layout, &settings).await,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        if !matches!(cli.positional.first().map(String::as_str), Some("sync")) {
            reporter.failure("resin-sync command failed.", &e.to_string());
        }
        std::process::exit(1);
    }
}

async fn run_sync(cli: &Cli, settings: &Settings, reporter: Arc<TerminalReporter<std::io::Stderr>>) -> Result<(), SyncError> {
    // Failures before the orchestrator takes over are reported here
    let (directory, request) = match prepare_sync(cli, settings).await {
        Ok(prepared) => prepared,
        Err(e) => {
            reporter.failure(FAILURE_MESSAGE, &e.to_string());
            return Err(e);
        }
    };

    let orchestrator = Orchestrator::new(
        directory,
        Arc::new(RsyncCommand),
        Arc::new(ShellRunner),
        reporter,
        OrchestratorOptions::for_proxy(&settings.proxy),
    );
    orchestrator.sync(&request).await
}

async fn prepare_sync(cli: &Cli, settings: &Settings) -> Result<(Arc<HttpDeviceDirectory>, SyncRequest), SyncError> {
    let uuid = cli.arg(1, "uuid")?;
    let token = settings
        .api_token()
        .ok_or_else(|| SyncError::ConfigError("no API token configured; set RESIN_TOKEN".to_string()))?;
    let directory = Arc::new(HttpDeviceDirectory::new(HttpClient::new(&settings.api.base_url, token)?));

    let full_id = ensure_device_is_online(directory.as_ref(), uuid).await?;
    debug!("Resolved {} to {}", uuid, full_id);

    let mut builder = SyncRequest::builder(uuid)
        .source_dir(cli.option("source").unwrap_or("."))
        .destination(cli.option("destination").unwrap_or_default())
        .flags(SyncFlags {
            skip_gitignore: cli.flag("skip-gitignore"),
            skip_restart: cli.flag("skip-restart"),
            show_progress: cli.flag("progress"),
            verbose: cli.flag("verbose"),
        });
    if let Some(before) = cli.option("before") {
        builder = builder.before_hook(before);
    }
    if let Some(after) = cli.option("after") {
        builder = builder.after_hook(after);
    }
    if let Some(ignore) = cli.option("ignore") {
        builder = builder.ignore(ignore.split(',').map(str::trim));
    }
    if let Some(port) = cli.port("port")? {
        builder = builder.port(port);
    }

    Ok((directory, builder.build()?))
}

async fn run_logs(cli: &Cli, settings: &Settings) -> Result<(), SyncError> {
    let app = cli.arg(1, "app")?;
    cli.engine(settings)?
        .follow_container_logs(app, std::io::stdout())
        .await
}

async fn run_build(cli: &Cli, settings: &Settings) -> Result<(), SyncError> {
    let dir = cli.arg(1, "dir")?;
    let name = cli.arg(2, "name")?;
    let context_dir = std::fs::canonicalize(dir).with_context(|| format!("build context {}", dir))?;
    cli.engine(settings)?
        .build_image(&context_dir, name, std::io::stdout())
        .await
}

async fn run_init(cli: &Cli, layout: &StorageLayout, settings: &Settings) -> Result<(), SyncError> {
    let file = layout.settings_file();
    if file.exists().await && !cli.flag("force") {
        return Err(SyncError::ConfigError(format!(
            "{} already exists; pass --force to rewrite it",
            file.path().display()
        )));
    }
    settings.save(&file).await?;
    println!("Wrote {}", file.path().display());
    Ok(())
}

async fn run_rootfs(cli: &Cli, settings: &Settings) -> Result<(), SyncError> {
    let container = cli.arg(1, "container")?;
    let remote = match (cli.option("host"), cli.port("ssh-port")?) {
        (Some(host), Some(port)) => Some(RemoteHost {
            host: host.to_string(),
            port,
        }),
        _ => None,
    };

    let path = cli
        .engine(settings)?
        .container_root_dir(container, remote.as_ref())
        .await?;
    println!("{}", path.display());
    Ok(())
}
