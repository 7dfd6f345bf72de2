// # srvsync - SRV record reconciler
//
// This binary is a THIN integration layer over srvsync-core:
//
// 1. Reading configuration from flags and environment variables
// 2. Initializing logging and the runtime
// 3. Registering stores and building the reconciler
// 4. Running one lifecycle operation for one resource address
//
// Reconciliation logic lives in srvsync-core. The state file holds the
// previous declaration of every address between runs.
//
// ## Configuration
//
// Every global flag can also be set through the environment:
//
// ### Object Store
// - `SRVSYNC_STORE_TYPE`: Store type (wapi, memory)
// - `SRVSYNC_WAPI_URL`: Grid master URL
// - `SRVSYNC_WAPI_USERNAME` / `SRVSYNC_WAPI_PASSWORD`: Credentials
// - `SRVSYNC_WAPI_VERSION`: WAPI version (default 2.7)
// - `SRVSYNC_WAPI_INSECURE`: Skip TLS verification
// - `SRVSYNC_WAPI_TIMEOUT_SECS`: HTTP timeout (default 30)
//
// ### State Store
// - `SRVSYNC_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `SRVSYNC_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Reconciler
// - `SRVSYNC_DEFAULT_VIEW`: DNS view for declarations without one
// - `SRVSYNC_INTERNAL_ID_KEY`: Attribute key carrying the identity
// - `SRVSYNC_HIDDEN_ATTRS`: Comma-separated attribute keys never reported
//
// ## Example
//
// ```bash
// export SRVSYNC_WAPI_URL=https://gm.example.com
// export SRVSYNC_WAPI_USERNAME=admin
// export SRVSYNC_WAPI_PASSWORD=secret
// export SRVSYNC_STATE_STORE_PATH=/var/lib/srvsync/state.json
//
// srvsync apply --address sip --name _sip._udp.example.com \
//     --priority 10 --weight 20 --port 5060 --target sip.example.com \
//     --attr Site=ams1
// srvsync refresh --address sip
// srvsync destroy --address sip
// ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use srvsync_core::config::{ObjectStoreConfig, ReconcilerConfig, SrvsyncConfig, StateStoreConfig};
use srvsync_core::lifecycle::{ReadOutcome, ReconcileEvent, Reconciler};
use srvsync_core::record::{DeclaredResource, Ttl};
use srvsync_core::registry::StoreRegistry;
use srvsync_core::traits::StateStore;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum SrvsyncExitCode {
    /// Operation completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The operation failed
    RuntimeError = 2,
}

impl From<SrvsyncExitCode> for ExitCode {
    fn from(code: SrvsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "srvsync", version, about = "Reconcile DNS SRV records against an Infoblox grid")]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// Object store type
    #[arg(long, env = "SRVSYNC_STORE_TYPE", default_value = "wapi", global = true)]
    store: String,

    /// Grid master URL
    #[arg(long, env = "SRVSYNC_WAPI_URL", global = true)]
    wapi_url: Option<String>,

    /// WAPI user
    #[arg(long, env = "SRVSYNC_WAPI_USERNAME", global = true)]
    wapi_username: Option<String>,

    /// WAPI password
    #[arg(long, env = "SRVSYNC_WAPI_PASSWORD", hide_env_values = true, global = true)]
    wapi_password: Option<String>,

    /// WAPI version
    #[arg(long, env = "SRVSYNC_WAPI_VERSION", default_value = "2.7", global = true)]
    wapi_version: String,

    /// Skip TLS certificate verification
    #[arg(long, env = "SRVSYNC_WAPI_INSECURE", global = true)]
    insecure: bool,

    /// HTTP timeout in seconds
    #[arg(long, env = "SRVSYNC_WAPI_TIMEOUT_SECS", default_value_t = 30, global = true)]
    timeout_secs: u64,

    /// State store type
    #[arg(long, env = "SRVSYNC_STATE_STORE_TYPE", default_value = "file", global = true)]
    state_store: String,

    /// Path to the state file
    #[arg(long, env = "SRVSYNC_STATE_STORE_PATH", default_value = "srvsync-state.json", global = true)]
    state_path: String,

    /// DNS view for declarations without one
    #[arg(long, env = "SRVSYNC_DEFAULT_VIEW", default_value = "default", global = true)]
    default_view: String,

    /// Attribute key carrying the internal identity
    #[arg(long, env = "SRVSYNC_INTERNAL_ID_KEY", default_value = "Terraform Internal ID", global = true)]
    internal_id_key: String,

    /// Attribute keys never reported back
    #[arg(long, env = "SRVSYNC_HIDDEN_ATTRS", value_delimiter = ',', global = true)]
    hidden_attr: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SRVSYNC_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or update the record for an address
    Apply(ApplyArgs),

    /// Refresh the stored state of an address from the grid
    Refresh {
        /// Resource address in the state store
        #[arg(long)]
        address: String,
    },

    /// Delete the record for an address
    Destroy {
        /// Resource address in the state store
        #[arg(long)]
        address: String,
    },

    /// Adopt an existing record under an address
    Import {
        /// Resource address in the state store
        #[arg(long)]
        address: String,

        /// WAPI reference of the record
        #[arg(long)]
        reference: String,
    },
}

#[derive(Debug, Args)]
struct ApplyArgs {
    /// Resource address in the state store
    #[arg(long)]
    address: String,

    /// Record name, e.g. _sip._udp.example.com
    #[arg(long)]
    name: String,

    #[arg(long)]
    priority: u32,

    #[arg(long)]
    weight: u32,

    #[arg(long)]
    port: u32,

    /// Target host
    #[arg(long)]
    target: String,

    /// TTL in seconds; -1 leaves it unset
    #[arg(long, allow_negative_numbers = true)]
    ttl: Option<i64>,

    #[arg(long)]
    comment: Option<String>,

    /// DNS view; creation-time only
    #[arg(long)]
    dns_view: Option<String>,

    /// Extensible attribute as KEY=VALUE (repeatable)
    #[arg(long = "attr", value_parser = parse_attr)]
    attrs: Vec<(String, String)>,
}

fn parse_attr(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

impl GlobalOpts {
    /// Build and validate the library configuration
    fn to_config(&self) -> Result<SrvsyncConfig> {
        let object_store = match self.store.as_str() {
            "wapi" => ObjectStoreConfig::Wapi {
                url: self
                    .wapi_url
                    .clone()
                    .context("SRVSYNC_WAPI_URL is required when SRVSYNC_STORE_TYPE=wapi")?,
                username: self
                    .wapi_username
                    .clone()
                    .context("SRVSYNC_WAPI_USERNAME is required when SRVSYNC_STORE_TYPE=wapi")?,
                password: self
                    .wapi_password
                    .clone()
                    .context("SRVSYNC_WAPI_PASSWORD is required when SRVSYNC_STORE_TYPE=wapi")?,
                wapi_version: self.wapi_version.clone(),
                verify_tls: !self.insecure,
                timeout_secs: self.timeout_secs,
            },
            "memory" => ObjectStoreConfig::Memory,
            other => anyhow::bail!(
                "SRVSYNC_STORE_TYPE '{}' is not supported. Supported types: wapi, memory",
                other
            ),
        };

        let state_store = match self.state_store.as_str() {
            "file" => StateStoreConfig::File {
                path: self.state_path.clone(),
            },
            "memory" => StateStoreConfig::Memory,
            other => anyhow::bail!(
                "SRVSYNC_STATE_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        let reconciler = ReconcilerConfig {
            hidden_attribute_keys: self.hidden_attr.clone(),
            ..ReconcilerConfig::default()
                .with_default_dns_view(self.default_view.clone())
                .with_internal_id_key(self.internal_id_key.clone())
        };

        let config = SrvsyncConfig {
            object_store,
            state_store,
            reconciler,
        };
        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => anyhow::bail!(
                "SRVSYNC_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            ),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                SrvsyncExitCode::ConfigError.into()
            } else {
                SrvsyncExitCode::Success.into()
            };
        }
    };

    let log_level = match cli.global.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SrvsyncExitCode::ConfigError.into();
        }
    };

    // stdout carries the resulting state; logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SrvsyncExitCode::ConfigError.into();
    }

    let config = match cli.global.to_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return SrvsyncExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SrvsyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        let (reconciler, state, event_logger) = match setup(config).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return SrvsyncExitCode::ConfigError;
            }
        };

        let result = run_command(cli.command, &reconciler, state.as_ref()).await;

        // Closing the channel lets the logger drain what is still queued
        drop(reconciler);
        if let Err(e) = event_logger.await {
            warn!("Event logger task failed: {}", e);
        }

        match result {
            Ok(()) => SrvsyncExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                SrvsyncExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Create stores from configuration and start the event logger
async fn setup(
    config: SrvsyncConfig,
) -> Result<(Reconciler, Box<dyn StateStore>, JoinHandle<usize>)> {
    let registry = StoreRegistry::with_builtin();

    #[cfg(feature = "wapi")]
    {
        debug!("Registering WAPI object store");
        srvsync_store_wapi::register(&registry);
    }

    let store = registry.create_object_store(&config.object_store)?;
    info!("Object store: {}", store.store_name());

    let state = registry
        .create_state_store(&config.state_store)
        .await
        .context("failed to open state store")?;
    info!("State store: {}", config.state_store.type_name());

    let (reconciler, events) = Reconciler::new(store, config.reconciler)?;
    let event_logger = spawn_event_logger(events);

    Ok((reconciler, state, event_logger))
}

/// Log events until every sender is dropped; yields the number logged
fn spawn_event_logger(mut events: mpsc::Receiver<ReconcileEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut logged = 0;
        while let Some(event) = events.recv().await {
            log_event(&event);
            logged += 1;
        }
        logged
    })
}

fn log_event(event: &ReconcileEvent) {
    match event {
        ReconcileEvent::RolledBack { name, error } => {
            warn!("Rolled back {}: {}", name, error)
        }
        ReconcileEvent::Absent { name } => warn!("{} is absent remotely", name),
        other => debug!("Event: {:?}", other),
    }
}

/// Run one lifecycle operation
async fn run_command(
    command: Command,
    reconciler: &Reconciler,
    state: &dyn StateStore,
) -> Result<()> {
    match command {
        Command::Apply(args) => apply(args, reconciler, state).await,
        Command::Refresh { address } => refresh(&address, reconciler, state).await,
        Command::Destroy { address } => destroy(&address, reconciler, state).await,
        Command::Import { address, reference } => {
            import(&address, &reference, reconciler, state).await
        }
    }
}

fn declared_from(
    args: &ApplyArgs,
    dns_view: String,
    sentinel: i64,
) -> Result<DeclaredResource> {
    let ttl = match args.ttl {
        Some(raw) => Ttl::from_raw(raw, sentinel)?,
        None => Ttl::Unset,
    };

    let mut resource = DeclaredResource::new(
        args.name.clone(),
        args.priority,
        args.weight,
        args.port,
        args.target.clone(),
    )
    .with_dns_view(dns_view)
    .with_ttl(ttl)
    .with_comment(args.comment.clone().unwrap_or_default());

    for (key, value) in &args.attrs {
        resource = resource.with_attribute(key.clone(), serde_json::Value::String(value.clone()));
    }
    Ok(resource)
}

async fn apply(args: ApplyArgs, reconciler: &Reconciler, state: &dyn StateStore) -> Result<()> {
    let sentinel = reconciler.config().ttl_unset_sentinel;
    let previous = state.get_resource(&args.address).await?;

    let resource = match previous {
        None => {
            info!("No state for '{}', creating", args.address);
            let mut resource =
                declared_from(&args, args.dns_view.clone().unwrap_or_default(), sentinel)?;
            reconciler.create(&mut resource).await?;
            resource
        }
        Some(previous) => {
            let view = args
                .dns_view
                .clone()
                .unwrap_or_else(|| previous.dns_view.clone());
            let declared = declared_from(&args, view, sentinel)?;

            let mut resource = declared.clone();
            match reconciler.update(&mut resource, &previous).await {
                Ok(()) => resource,
                Err(e) if e.is_not_found() => {
                    warn!("Record for '{}' is gone, recreating: {}", args.address, e);
                    let mut resource = declared;
                    reconciler.create(&mut resource).await?;
                    resource
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    state.put_resource(&args.address, &resource).await?;
    print_resource(&resource)
}

async fn refresh(address: &str, reconciler: &Reconciler, state: &dyn StateStore) -> Result<()> {
    let mut resource = state
        .get_resource(address)
        .await?
        .with_context(|| format!("no state stored for '{}'", address))?;

    match reconciler.read(&mut resource).await? {
        ReadOutcome::Present => {
            state.put_resource(address, &resource).await?;
            print_resource(&resource)
        }
        ReadOutcome::Absent => {
            state.delete_record(address).await?;
            info!("'{}' removed from state; the next apply recreates it", address);
            Ok(())
        }
    }
}

async fn destroy(address: &str, reconciler: &Reconciler, state: &dyn StateStore) -> Result<()> {
    let Some(mut resource) = state.get_resource(address).await? else {
        info!("No state for '{}', nothing to destroy", address);
        return Ok(());
    };

    reconciler.delete(&mut resource).await?;
    state.delete_record(address).await?;
    info!("Destroyed '{}'", address);
    Ok(())
}

async fn import(
    address: &str,
    reference: &str,
    reconciler: &Reconciler,
    state: &dyn StateStore,
) -> Result<()> {
    if state.get_resource(address).await?.is_some() {
        anyhow::bail!("'{}' already has state; destroy or pick another address", address);
    }

    let resource = reconciler.import(reference).await?;
    state.put_resource(address, &resource).await?;
    print_resource(&resource)
}

fn print_resource(resource: &DeclaredResource) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(resource)?);
    Ok(())
}
