use clap::{Parser, Subcommand};
use noble::auth::{CredentialCheck, SqliteCredentials, StoreError};
use noble::config::{ConfigError, ServerConfig, ServiceKind, TransportMode};
use noble::http::StaticFiles;
use noble::net::tls::TlsError;
use noble::net::{self, Acceptor, PlainListener, TlsListener};
use noble::{Server, Service};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "noble")]
#[command(version, about = "Static-file and credential server over plain TCP or TLS", long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Port to listen on
    #[arg(required = true)]
    port: Option<u16>,

    /// Transport: HTTP or HTTPS
    #[arg(value_enum, ignore_case = true, required = true)]
    mode: Option<TransportMode>,

    /// Protocol to serve
    #[arg(long, value_enum, default_value_t = ServiceKind::Static)]
    service: ServiceKind,

    /// Directory static files are served from
    #[arg(long, default_value = "www")]
    root: PathBuf,

    /// PEM certificate for HTTPS
    #[arg(long, default_value = "cert.pem")]
    cert: PathBuf,

    /// PEM private key for HTTPS
    #[arg(long, default_value = "key.pem")]
    key: PathBuf,

    /// Use the built-in development certificate for HTTPS
    #[arg(long)]
    self_signed: bool,

    /// Credential database for the auth service
    #[arg(long, default_value = "auth.db")]
    db: PathBuf,

    /// Maximum request size in bytes
    #[arg(long, default_value_t = net::DEFAULT_RECEIVE_SIZE)]
    receive_size: usize,

    /// Drop connections that stall the TLS handshake or send nothing for
    /// this many seconds
    #[arg(long)]
    receive_timeout: Option<u64>,

    /// Serve each connection on its own thread
    #[arg(long)]
    threaded: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Add or update a user in the credential database
    Useradd {
        #[arg(long, default_value = "auth.db")]
        db: PathBuf,
        username: String,
        password_hash: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Net(#[from] net::Error),

    #[error("Credential database: {0}")]
    Store(#[from] StoreError),
}

impl Cli {
    fn into_config(self) -> Option<ServerConfig> {
        let mut config = ServerConfig::new(self.port?, self.mode?);
        config.service = self.service;
        config.content_root = self.root;
        config.cert_file = self.cert;
        config.key_file = self.key;
        config.self_signed = self.self_signed;
        config.database = self.db;
        config.receive_size = self.receive_size;
        config.receive_timeout = self.receive_timeout.map(Duration::from_secs);
        config.threaded = self.threaded;
        Some(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut cli = Cli::parse();

    let result = match cli.command.take() {
        Some(Command::Useradd {
            db,
            username,
            password_hash,
        }) => useradd(db, &username, &password_hash),
        None => match cli.into_config() {
            Some(config) => run(&config),
            // clap enforces port and mode without a subcommand
            None => Ok(()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn useradd(db: PathBuf, username: &str, password_hash: &str) -> Result<(), StartupError> {
    let store = SqliteCredentials::open(&db)?;
    store.insert(username, password_hash)?;
    info!(username, db = %db.display(), "User stored");
    Ok(())
}

/// Start serving; only returns on a startup failure
fn run(config: &ServerConfig) -> Result<(), StartupError> {
    info!("NOBLE SERVER {}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    match config.service {
        ServiceKind::Static => serve(config, StaticFiles::new(&config.content_root)),
        ServiceKind::Auth => {
            let store = SqliteCredentials::open(&config.database)?;
            serve(config, CredentialCheck::new(store))
        }
    }
}

fn serve<S: Service>(config: &ServerConfig, service: S) -> Result<(), StartupError> {
    let server = Server::new(service)
        .receive_size(config.receive_size)
        .receive_timeout(config.receive_timeout)
        .threaded(config.threaded);

    // The only place that knows which transport is in use
    match config.tls_context()? {
        None => listen(&server, PlainListener::bind(config.port)?, config),
        Some(ctx) => {
            let listener =
                TlsListener::bind(config.port, ctx)?.handshake_timeout(config.receive_timeout);
            listen(&server, listener, config)
        }
    }
}

fn listen<S: Service, A: Acceptor>(server: &Server<S>, listener: A, config: &ServerConfig) -> ! {
    info!(port = config.port, mode = ?config.mode, service = ?config.service, "Listening");
    server.serve(&listener)
}
