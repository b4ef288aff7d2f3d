mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::EXIT_FAILURE;
use skiff_core::{Settings, Syncer};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "skiff",
    version,
    about = "Move container images between Docker and a plain blob store, no registry required"
)]
struct Cli {
    /// Settings file (default: ~/.config/skiff/config.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Docker daemon address, e.g. unix:///var/run/docker.sock or tcp://host:2375.
    #[arg(long, env = "DOCKER_HOST", global = true)]
    docker_host: Option<String>,

    /// Directory for staging trees and pull locks.
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Keep staging trees on disk after the command finishes.
    #[arg(long, default_value_t = false, global = true)]
    keep_staging: bool,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pull an image from a remote into the local engine.
    Pull {
        /// Remote location: a directory, file:// URL or http(s):// URL.
        remote: String,
        /// Image reference (IMAGE[:TAG]) or image id prefix.
        image: String,
    },
    /// Push a local image to a remote.
    Push {
        /// Remote location: a directory, file:// URL or http(s):// URL.
        remote: String,
        /// Image reference (IMAGE[:TAG]).
        image: String,
    },
    /// List the tagged images on a remote.
    List {
        /// Remote location.
        remote: String,
    },
    /// Check that a remote is reachable and usable.
    Check {
        /// Remote location.
        remote: String,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Cli {
    fn settings(&self) -> Result<Settings, String> {
        let mut settings = Settings::resolve(self.config.as_deref()).map_err(|e| e.to_string())?;
        if let Some(host) = &self.docker_host {
            settings.engine.host = Some(host.clone());
        }
        if let Some(dir) = &self.work_dir {
            settings.work_dir.clone_from(dir);
        }
        if self.keep_staging {
            settings.keep_staging = true;
        }
        tracing::debug!(
            "work dir {}, docker host {:?}",
            settings.work_dir.display(),
            settings.engine.host
        );
        Ok(settings)
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SKIFF_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = if let Commands::Completions { shell } = cli.command {
        commands::completions::run::<Cli>(shell)
    } else {
        cli.settings()
            .and_then(|settings| dispatch(&cli.command, &Syncer::new(settings), cli.json))
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn dispatch(command: &Commands, syncer: &Syncer, json: bool) -> Result<u8, String> {
    match command {
        Commands::Pull { remote, image } => commands::pull::run(syncer, remote, image, json),
        Commands::Push { remote, image } => commands::push::run(syncer, remote, image, json),
        Commands::List { remote } => commands::list::run(syncer, remote, json),
        Commands::Check { remote } => commands::check::run(syncer, remote, json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
    }
}
