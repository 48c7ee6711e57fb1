use dockpanel::cli::{Args, ConfigDiscovery, ExecutionMode, PanelConfig, ServeConfig};
use dockpanel::container::DockerRuntime;
use dockpanel::web::{self, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "dockpanel=debug,tower_http=debug"
    } else {
        "dockpanel=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = ConfigDiscovery::discover_config(args.config.as_deref())?;
    args.apply_overrides(&mut config);

    match args.mode() {
        ExecutionMode::Serve(serve) => run_server(config, serve).await,
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info(&config);
            Ok(())
        }
    }
}

async fn run_server(config: PanelConfig, serve: ServeConfig) -> anyhow::Result<()> {
    info!("Starting dockpanel {}", env!("CARGO_PKG_VERSION"));
    info!("Data root: {}", config.data_root.display());

    let runtime = Arc::new(DockerRuntime::connect(config.runtime_config()).await?);
    let state = Arc::new(AppState::new(runtime, config.lifecycle_config()));

    if serve.autostart {
        let started = state.auxiliary.autostart().await;
        info!("Autostarted {} database containers", started.len());
    } else {
        warn!("Database autostart disabled");
    }

    web::serve(config.listen, state).await
}
