//! VU Server Browser - Main entry point

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use clap::{Parser, Subcommand, ValueEnum};
use server_browser::app::{GateOutcome, ServerBrowser, Session, UiEvent};
use server_browser::backend::{Backend, FileBackend};
use server_browser::compat::ClientCapabilities;
use server_browser::constants::*;
use server_browser::db::Database;
use server_browser::favorites::FavoritesStore;
use server_browser::settings::Settings;
use server_browser::types::*;
use server_browser::utils::{fit_column, format_ping, format_players, get_data_dir};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Settings-table key for the last server list file
const SERVERS_PATH_KEY: &str = "last_servers_path";

/// Initialize file logging. Returns a guard that must be held for the app lifetime.
fn init_logging(data_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

    let logs_dir = data_dir.join("logs");
    std::fs::create_dir_all(&logs_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "server-browser.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,server_browser=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(LevelFilter::WARN),
        )
        .init();

    guard
}

#[derive(Parser)]
#[command(name = "server-browser", version = APP_VERSION, about = "Browse and check VU game servers")]
struct Cli {
    /// Client capabilities JSON (installed xpacks, builds, mod runtime)
    #[arg(long, global = true)]
    capabilities: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the filtered, sorted server list
    List {
        /// Server list JSON; defaults to the last one used
        servers: Option<PathBuf>,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        favorites_only: bool,
        #[arg(long)]
        hide_passworded: bool,
        #[arg(long)]
        max_ping: Option<u32>,
        #[arg(long)]
        min_players: Option<u32>,
        #[arg(long)]
        map: Option<String>,
        #[arg(long)]
        gamemode: Option<String>,
        /// Case-insensitive part of the server name
        #[arg(long)]
        name: Option<String>,
        /// Keep these sort and filter options for later runs
        #[arg(long)]
        remember: bool,
    },
    /// Run the join gates for one server and print the outcome
    Check {
        guid: String,
        /// Server list JSON; defaults to the last one used
        servers: Option<PathBuf>,
        #[arg(long)]
        spectate: bool,
        /// Answer a password prompt with this value
        #[arg(long)]
        password: Option<String>,
        /// Accept a performance warning
        #[arg(long)]
        accept_lag: bool,
    },
    /// Add or remove a server from favorites
    Favorite { guid: String },
    /// Print favorite servers with the date they were added
    Favorites,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Map,
    Gamemode,
    Players,
    Ping,
}

impl From<SortArg> for SortColumn {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Map => SortColumn::Map,
            SortArg::Gamemode => SortColumn::Gamemode,
            SortArg::Players => SortColumn::Players,
            SortArg::Ping => SortColumn::Ping,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir).ok();

    // Initialize logging - guard must live for entire app lifetime
    let _log_guard = init_logging(&data_dir);

    info!(version = APP_VERSION, "{} starting", APP_NAME);

    let settings = Settings::load(&data_dir);
    let capabilities = match load_capabilities(cli.capabilities.as_deref()) {
        Ok(caps) => caps,
        Err(e) => {
            error!(error = %e, "Failed to read capabilities");
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let db_path = data_dir.join("favorites.db");
    let db = match Database::open(&db_path) {
        Ok(db) => {
            info!(path = %db_path.display(), "Database opened");
            db
        }
        Err(e) => {
            error!(error = %e, path = %db_path.display(), "Failed to open database");
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::List {
            servers,
            sort,
            desc,
            favorites_only,
            hide_passworded,
            max_ping,
            min_players,
            map,
            gamemode,
            name,
            remember,
        } => {
            let mut settings = settings;
            if let Some(column) = sort {
                settings.sort.sort_by = column.into();
            }
            if desc {
                settings.sort.direction = SortDirection::Descending;
            }
            let filters = &mut settings.filters;
            filters.favorites_only |= favorites_only;
            filters.show_passworded &= !hide_passworded;
            filters.max_ping = max_ping.or(filters.max_ping);
            filters.min_players = min_players.or(filters.min_players);
            filters.map = map.or(filters.map.take());
            filters.gamemode = gamemode.or(filters.gamemode.take());
            filters.name_query = name.or(filters.name_query.take());

            let servers = match resolve_servers_path(&db, servers) {
                Ok(path) => path,
                Err(e) => return fail(e),
            };
            let backend = Arc::new(FileBackend::new(servers, capabilities.clone()));
            let browser = ServerBrowser::new(capabilities, &settings, Box::new(db));
            runtime.block_on(list(browser, backend)).map(|browser| {
                if remember {
                    browser.settings(&settings).save(&data_dir);
                }
            })
        }
        Command::Check { guid, servers, spectate, password, accept_lag } => {
            let servers = match resolve_servers_path(&db, servers) {
                Ok(path) => path,
                Err(e) => return fail(e),
            };
            let backend = FileBackend::new(servers, capabilities.clone());
            let browser = ServerBrowser::new(capabilities, &settings, Box::new(db));
            let mode = if spectate { ConnectMode::Spectate } else { ConnectMode::Join };
            runtime.block_on(check(browser, backend, &guid, mode, password, accept_lag))
        }
        Command::Favorite { guid } => toggle_favorite(db, &guid),
        Command::Favorites => print_favorites(&db),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(e: server_browser::Error) -> ExitCode {
    error!(error = %e, "Command failed");
    eprintln!("error: {}", e);
    ExitCode::FAILURE
}

/// Use the given server list path and remember it, or fall back to the last one.
fn resolve_servers_path(db: &Database, given: Option<PathBuf>) -> server_browser::Result<PathBuf> {
    if let Some(path) = given {
        db.set_setting(SERVERS_PATH_KEY, &path.to_string_lossy())?;
        return Ok(path);
    }
    match db.get_setting(SERVERS_PATH_KEY)? {
        Some(path) => Ok(PathBuf::from(path)),
        None => Err(server_browser::Error::Backend(
            "no server list given and none used before".into(),
        )),
    }
}

fn load_capabilities(path: Option<&Path>) -> server_browser::Result<ClientCapabilities> {
    let Some(path) = path else {
        return Ok(ClientCapabilities::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| server_browser::Error::FileRead(path.to_path_buf(), e))?;
    Ok(serde_json::from_str(&json)?)
}

/// Print the list and hand the store back so its settings can be kept.
async fn list(
    browser: ServerBrowser,
    backend: Arc<FileBackend>,
) -> server_browser::Result<ServerBrowser> {
    let (session, mut handle) = Session::new(browser, backend);
    let task = tokio::spawn(session.run());

    let snapshot = handle
        .wait_for(|s| s.refresh_generation > 0 && s.fetch_status == FetchStatus::Idle)
        .await;
    handle.send(UiEvent::Shutdown);
    let browser = task
        .await
        .map_err(|e| server_browser::Error::Backend(e.to_string()))?;

    let Some(snapshot) = snapshot else {
        return Ok(browser);
    };
    if let Some(reason) = snapshot.refresh_error {
        return Err(server_browser::Error::Backend(reason));
    }

    println!("{}", snapshot.count_text);
    if snapshot.rows.is_empty() {
        println!("{}", EMPTY_LIST_NOTICE);
        return Ok(browser);
    }

    for row in &snapshot.rows {
        let server = &row.server;
        let badge = server.frequency.badge().unwrap_or("");
        println!(
            "{} {} {} {} {} {} {}",
            if row.is_favorite { "*" } else { " " },
            if server.passworded { "P" } else { " " },
            fit_column(&row.display_name, 52),
            fit_column(&row.map_name, 24),
            fit_column(&row.gamemode_name, 20),
            fit_column(&format_players(server), 14),
            fit_column(&format!("{} {}", format_ping(server.ping), badge), 14),
        );
        if let Some(notice) = row.notice(&snapshot.capabilities) {
            println!("    ! {}", notice);
        }
    }
    Ok(browser)
}

async fn check(
    mut browser: ServerBrowser,
    backend: FileBackend,
    guid: &str,
    mode: ConnectMode,
    password: Option<String>,
    accept_lag: bool,
) -> server_browser::Result<()> {
    let capabilities = backend.client_capabilities().await?;
    browser.set_capabilities(capabilities);
    if let Some(generation) = browser.begin_refresh() {
        let servers = backend.request_server_list().await?;
        browser.apply_server_list(generation, servers);
    }

    let mut outcome = browser.on_row_activate(guid, mode);
    loop {
        outcome = match outcome {
            GateOutcome::PerformanceWarning(message) => {
                println!("Performance warning: {}", message);
                if !accept_lag {
                    browser.decline_gate();
                    println!("Not joining (pass --accept-lag to continue)");
                    return Ok(());
                }
                browser.accept_performance()
            }
            GateOutcome::PasswordRequired => {
                let Some(password) = password.as_deref() else {
                    browser.decline_gate();
                    println!("Password required (pass --password)");
                    return Ok(());
                };
                browser.submit_password(password)
            }
            GateOutcome::Blocked(reason) => {
                println!("Blocked: {}", reason);
                return Ok(());
            }
            GateOutcome::Ignored => {
                println!("Nothing to do for {} ({})", guid, mode);
                return Ok(());
            }
            GateOutcome::Declined => return Ok(()),
            GateOutcome::Connect(attempt) => {
                println!("Connecting to {} ({})...", attempt.guid, attempt.mode);
                tokio::time::sleep(CONNECT_DELAY).await;
                let id = attempt.id;
                let result = backend.connect(attempt).await;
                if let Err(reason) = &result {
                    println!("Connection failed: {}", reason);
                } else {
                    println!("Connected");
                }
                browser.connect_result(id, result);
                return Ok(());
            }
        };
    }
}

fn toggle_favorite(db: Database, guid: &str) -> server_browser::Result<()> {
    let favorites = db.load_favorites()?;
    if favorites.contains(guid) {
        db.remove_favorite(guid)?;
        println!("Removed {} from favorites", guid);
    } else {
        db.add_favorite(guid)?;
        println!("Added {} to favorites", guid);
    }
    Ok(())
}

fn print_favorites(db: &Database) -> server_browser::Result<()> {
    let favorites = db.load_favorites()?;
    if favorites.is_empty() {
        println!("No favorites");
        return Ok(());
    }
    let mut guids: Vec<&str> = favorites.iter().collect();
    guids.sort_unstable();
    for guid in guids {
        match db.favorite_added_at(guid)? {
            Some(at) => println!("{}  added {}", guid, at.format("%Y-%m-%d %H:%M")),
            None => println!("{}", guid),
        }
    }
    Ok(())
}
