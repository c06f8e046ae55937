use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use kvfs_config::StoreKind;
use kvfs_core::KvFs;
use kvfs_fuse::{block_on, init_runtime, KvFuse, UnixFuse};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod settings;

use settings::Overrides;

#[derive(Parser)]
#[command(name = "kvfs", version, about = "Mount a key-value store as a filesystem")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mount point
    #[arg(long)]
    to: Option<PathBuf>,

    /// Backend store: memory, sqlite or etcd
    #[arg(long)]
    store: Option<StoreKind>,

    /// Store address; repeat for multiple endpoints
    #[arg(long = "addr")]
    addrs: Vec<String>,

    /// Key prefix to expose as the filesystem root
    #[arg(long)]
    root: Option<String>,

    /// Log every filesystem request
    #[arg(long)]
    debug: bool,

    /// Allow other users to access the mount
    #[arg(long)]
    allow_other: bool,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config.clone().or_else(settings::find_config);
    let flags = Overrides {
        mountpoint: cli.to,
        store: cli.store,
        addrs: cli.addrs,
        root: cli.root,
        debug: cli.debug,
        allow_other: cli.allow_other,
    };
    let config = settings::resolve(config_path.as_deref(), &flags)?;

    init_logging(config.debug);
    if let Some(path) = &config_path {
        info!("using configuration from {}", path.display());
    }

    config.validate_or_err()?;
    let mountpoint = config
        .mountpoint
        .clone()
        .ok_or("must set the `--to` flag or `mountpoint`")?;

    init_runtime()?;
    let fs = block_on(async {
        let store = kvfs_store::open_store(&config).await?;
        let fs = KvFs::from_config(store, &config).await?;
        Ok::<_, Box<dyn std::error::Error>>(fs)
    })??;

    let session = kvfs_fuse::mount(
        UnixFuse::new(KvFuse::new(Arc::new(fs))),
        &mountpoint,
        &config,
    )?;
    info!("mounted at {}; press Ctrl-C to unmount", mountpoint.display());

    block_on(tokio::signal::ctrl_c())??;

    info!("unmounting {}", mountpoint.display());
    drop(session);
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(err.exit_code().clamp(0, 255) as u8);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
