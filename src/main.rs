use clap::{Parser, Subcommand};
use embedlib::error::{ErrorKind, Result};
use embedlib::{Bundle, Config, DirectorySource, Effort, Platform};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Inspect and exercise bundled native libraries.
#[derive(Parser)]
#[command(name = "embedlib", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (TOML, YAML or JSON). Defaults to the platform config
    /// directory.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Pretend to be another platform, e.g. `linux-aarch64`.
    #[arg(long, global = true, value_name = "OS-ARCH")]
    platform: Option<String>,

    /// More logging (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the platform token libraries are resolved for.
    Platform,
    /// Print where a library lives inside the bundle.
    Locate { name: String },
    /// Extract a library into the cache and print its path.
    Extract {
        name: String,
        /// Bundle root directory (containing the namespace directory).
        #[arg(long, value_name = "DIR")]
        from: PathBuf,
    },
    /// List what the bundle ships for the platform.
    List {
        /// Bundle root directory (containing the namespace directory).
        #[arg(long, value_name = "DIR")]
        from: PathBuf,
    },
    /// Extract and load a library, then clean up.
    Load {
        #[arg(required_unless_present = "all")]
        name: Option<String>,
        /// Load every library in the bundle manifest, dependencies first.
        #[arg(long, conflicts_with = "name")]
        all: bool,
        /// Bundle root directory (containing the namespace directory).
        #[arg(long, value_name = "DIR")]
        from: PathBuf,
    },
    /// Print the cache directory.
    CacheDir,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info,embedlib=info",
        (false, 2) => "info,embedlib=debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .map_err(|err| err.raise(ErrorKind::Config))?;
    let platform = || -> Result<Platform> {
        match &cli.platform {
            Some(token) => token.parse::<Platform>().map_err(|err| {
                let (os, arch) = token.split_once('-').unwrap_or((token.as_str(), ""));
                err.raise(ErrorKind::UnsupportedPlatform { os: os.to_string(), arch: arch.to_string() })
            }),
            None => Platform::current().map_err(|err| {
                let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
                err.raise(ErrorKind::UnsupportedPlatform { os: os.to_string(), arch: arch.to_string() })
            }),
        }
    };
    let bundle = |from: &PathBuf| -> Result<Bundle> {
        let source = DirectorySource::new("cli", from)
            .map_err(|err| err.raise(ErrorKind::Config))?;
        let mut builder = Bundle::builder(Arc::new(source)).config(&config)?;
        if cli.platform.is_some() {
            let platform = platform()?;
            builder = builder.raw_platform(platform.os.as_str(), platform.arch.as_str());
        }
        Ok(builder.build())
    };

    match &cli.command {
        Command::Platform => println!("{}", platform()?),
        Command::Locate { name } => {
            let locator = config.locator().map_err(|err| err.raise(ErrorKind::Config))?;
            let path = locator.locate(name, &platform()?).map_err(|err| err.raise(ErrorKind::InvalidName(name.clone())))?;
            println!("{path}");
        },
        Command::Extract { name, from } => {
            let materialized = bundle(from)?.extract(name)?;
            let effort = match materialized.effort {
                Effort::Reused => "reused",
                Effort::Extracted => "extracted",
                Effort::Repaired => "repaired",
            };
            println!("{} ({effort})", materialized.path.display());
        },
        Command::List { from } => {
            for resource in bundle(from)?.resources()? {
                println!("{resource}");
            }
        },
        Command::Load { name, all, from } => {
            let bundle = bundle(from)?;
            let loaded = match name {
                Some(name) if !*all => vec![(name.clone(), bundle.request_library(name)?)],
                _ => bundle.request_all()?,
            };
            for (name, handle) in &loaded {
                println!("{name}\t{}", handle.path().display());
            }
            for (name, _) in &loaded {
                bundle.release_library(name);
            }
            let sweep = bundle.shutdown();
            tracing::info!(removed = sweep.removed.len(), "Done");
        },
        Command::CacheDir => println!("{}", config.cache_root().display()),
    }
    Ok(())
}
