//! sesskit server — entry point.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use sesskit::{FileBackend, SessReader};
use sesskit_server::config::SessionConfig;
use sesskit_server::types::format_time;

#[cfg(feature = "http")]
const DEFAULT_ADDR: &str = "127.0.0.1:3200";

#[cfg(feature = "http")]
const DEFAULT_GC_INTERVAL_SECS: u64 = 300;

#[derive(Parser)]
#[command(
    name = "sesskit-server",
    about = "Prefixed per-visitor sessions with one-time flash messages",
    version
)]
struct Cli {
    /// Key prefix applied to every session key.
    /// Also reads from SESSKIT_PREFIX env var.
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Directory holding session files.
    /// Also reads from SESSKIT_SAVE_PATH env var.
    #[arg(long, global = true)]
    save_path: Option<String>,

    /// Seconds a session may sit idle before it expires.
    /// Also reads from SESSKIT_MAX_LIFETIME env var.
    #[arg(long, global = true)]
    max_lifetime: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default).
    #[cfg(feature = "http")]
    Serve {
        /// Listen address (host:port).
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,

        /// Session cookie name.
        /// Also reads from SESSKIT_COOKIE env var.
        #[arg(long)]
        cookie: Option<String>,

        /// Allow cross-origin requests from any origin.
        #[arg(long)]
        cors: bool,

        /// Seconds between expired-session sweeps (0 disables).
        #[arg(long, default_value_t = DEFAULT_GC_INTERVAL_SECS)]
        gc_interval: u64,
    },

    /// Print a stored session as JSON.
    Inspect {
        /// Session id.
        id: String,
    },

    /// List stored session ids.
    List,

    /// Delete session files idle longer than the max lifetime.
    Gc,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   sesskit-server completions bash > ~/.local/share/bash-completion/completions/sesskit-server
    ///   sesskit-server completions zsh > ~/.zfunc/_sesskit-server
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

#[cfg(feature = "http")]
fn default_command() -> Commands {
    Commands::Serve {
        addr: DEFAULT_ADDR.to_string(),
        cookie: None,
        cors: false,
        gc_interval: DEFAULT_GC_INTERVAL_SECS,
    }
}

#[cfg(not(feature = "http"))]
fn default_command() -> Commands {
    Commands::Repl
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let prefix = cli.prefix.as_deref();
    let save_path = cli.save_path.as_deref();
    let max_lifetime = cli.max_lifetime;

    match cli.command.unwrap_or_else(default_command) {
        #[cfg(feature = "http")]
        Commands::Serve {
            addr,
            cookie,
            cors,
            gc_interval,
        } => {
            use sesskit_server::http::HttpServer;

            let config = SessionConfig::resolve(prefix, save_path, cookie.as_deref())
                .with_max_lifetime(max_lifetime);
            tracing::info!("sesskit server");
            tracing::info!("Save path: {}", config.save_path.display());
            tracing::info!("Prefix: '{}', cookie: {}", config.prefix, config.cookie_name);

            HttpServer::new(config)
                .with_cors(cors)
                .with_gc_interval(Some(std::time::Duration::from_secs(gc_interval)))
                .run(&addr)
                .await?;
        }

        Commands::Inspect { id } => {
            let config = SessionConfig::resolve(prefix, save_path, None);
            let backend = FileBackend::new(&config.save_path);
            let path = backend.session_path(&id);
            match SessReader::read_from_file(&path) {
                Ok(file) => {
                    let info = serde_json::json!({
                        "id": id,
                        "path": path.display().to_string(),
                        "created_at": format_time(file.created_at),
                        "updated_at": format_time(file.updated_at),
                        "data": file.data,
                    });
                    println!("{}", serde_json::to_string_pretty(&info)?);
                }
                Err(e) => {
                    eprintln!("Cannot read session {id}: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::List => {
            let config = SessionConfig::resolve(prefix, save_path, None);
            for id in FileBackend::new(&config.save_path).stored_ids()? {
                println!("{id}");
            }
        }

        Commands::Gc => {
            let config = SessionConfig::resolve(prefix, save_path, None).with_max_lifetime(max_lifetime);
            let removed = sesskit_server::maintenance::sweep(&config)?;
            println!(
                "Removed {removed} session(s) idle longer than {}s",
                config.max_lifetime.as_secs()
            );
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "sesskit-server", &mut std::io::stdout());
        }

        Commands::Repl => {
            let config = SessionConfig::resolve(prefix, save_path, None).with_max_lifetime(max_lifetime);
            sesskit_server::repl::run(config)?;
        }
    }

    Ok(())
}
