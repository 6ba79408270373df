//! Snapish CLI - tide tables, weather, catch log and community from the
//! terminal.

mod command;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use snapish_core::api::ImageUpload;
use snapish_core::config::ENV_PASSWORD;
use snapish_core::models::{CatchUpdate, Coordinates, NewCatch};
use snapish_core::utils::{format_date, format_measure, format_optional, truncate_string};
use snapish_core::{
    ApiClient, ApiError, CacheManager, Config, Coordinator, FixedLocation, LocalStorage,
    Navigation, NavigationGuard, Route, SocketLogger,
};

use command::{Command, USAGE};

// ============================================================================
// Constants
// ============================================================================

/// Daily log files are named `snapish.log.YYYY-MM-DD`
const LOG_FILE_PREFIX: &str = "snapish.log";

/// Width of the memo column in catch listings
const MEMO_WIDTH: usize = 40;

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=snapish_core=debug).
/// The returned guard flushes the log file when dropped.
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config: {:#}", e);
        Config::default()
    });
    config.apply_env();

    let _log_guard = init_tracing(&config.log_dir());
    info!(base_url = %config.base_url, "snapish starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if matches!(command, Command::Help) {
        print!("{}", USAGE);
        return Ok(());
    }

    let app = App::new(config)?;
    app.run(command).await
}

// ============================================================================
// Application
// ============================================================================

struct App {
    config: Config,
    coordinator: Coordinator,
    guard: NavigationGuard,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let client = ApiClient::with_timeout(&config.base_url, config.request_timeout())?;
        let storage = LocalStorage::open(config.storage_dir())
            .context("Failed to open local storage")?;
        let location = FixedLocation::new(config.home_location());

        let coordinator = Coordinator::new(
            Arc::new(client),
            CacheManager::new(storage),
            Arc::new(location),
        );
        let guard = NavigationGuard::new(coordinator.clone());

        Ok(Self {
            config,
            coordinator,
            guard,
        })
    }

    /// Pass the navigation guard for `route`, or stop with a login hint
    async fn enter(&self, route: Route) -> Result<()> {
        match self.guard.before_each(route).await {
            Navigation::Allow(_) => Ok(()),
            Navigation::Redirect(to) => bail!("Please sign in first (redirected to {})", to),
        }
    }

    /// Turn a refused token into a login hint; other errors pass through
    fn signed_out_hint(err: anyhow::Error) -> anyhow::Error {
        if ApiError::is_auth_error(&err) {
            anyhow::anyhow!("Your session has expired. Sign in again with: snapish login")
        } else {
            err
        }
    }

    async fn run(mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username } => self.login(username).await,
            Command::Logout => {
                self.coordinator.logout();
                println!("Signed out.");
                Ok(())
            }
            Command::Signup { username, email } => {
                let password = read_password()?;
                self.coordinator.signup(&username, &email, &password).await?;
                println!("Account created. Sign in with: snapish login {}", username);
                Ok(())
            }
            Command::Profile { update } => {
                self.enter(Route::Profile).await?;
                let user = match update {
                    Some(update) => self.coordinator.update_profile(&update).await?,
                    None => self.coordinator.fetch_user_profile().await?,
                };
                print_json(&serde_json::to_value(&user)?)
            }
            Command::Status => self.status(),
            Command::Home => {
                if self.coordinator.has_stored_token() {
                    if let Err(e) = self.coordinator.hydrate_session().await {
                        warn!(error = %e, "Refreshing without a session");
                    }
                }
                self.coordinator.set_global_loading(true);
                self.coordinator.fetch_initial_data().await;
                self.coordinator.set_global_loading(false);
                self.status()
            }
            Command::Tide => {
                let payload = self.coordinator.fetch_tide().await?;
                print_json(&payload)
            }
            Command::Weather { at } => {
                let at = self.position(at).await?;
                let weather = self.coordinator.fetch_weather(at).await?;
                print_json(&weather)
            }
            Command::Station { at } => {
                let at = self.position(at).await?;
                let station = self.coordinator.fetch_closest_location(at).await?;
                print_json(&station)
            }
            Command::Catches => {
                self.enter(Route::Catches).await?;
                if let Err(e) = self.coordinator.fetch_catches().await {
                    if ApiError::is_auth_error(&e) {
                        return Err(Self::signed_out_hint(e));
                    }
                    warn!(error = %format!("{:#}", e), "Showing cached catch log");
                    eprintln!("Could not refresh catch log: {:#}", e);
                }
                self.print_catches();
                Ok(())
            }
            Command::CatchAdd { date, memo } => {
                self.enter(Route::Catches).await?;
                let record = self
                    .coordinator
                    .create_catch(&NewCatch {
                        catch_date: date,
                        ..Default::default()
                    })
                    .await?;
                if let Some(memo) = memo {
                    let update = CatchUpdate {
                        id: Some(record.id.clone()),
                        memo: Some(memo),
                        ..Default::default()
                    };
                    self.coordinator.update_catch(&update).await?;
                }
                println!("Logged catch {}.", record.id);
                Ok(())
            }
            Command::CatchUpdate { update } => {
                self.enter(Route::Catches).await?;
                let record = self.coordinator.update_catch(&update).await?;
                println!("Updated catch {}.", record.id);
                Ok(())
            }
            Command::CatchDelete { id } => {
                self.enter(Route::Catches).await?;
                self.coordinator.delete_catch(&id).await?;
                println!("Deleted catch {}.", id);
                Ok(())
            }
            Command::Predict { image } => {
                if self.coordinator.has_stored_token() {
                    if let Err(e) = self.coordinator.hydrate_session().await {
                        warn!(error = %e, "Predicting without a session");
                    }
                }
                let photo = ImageUpload::from_path(&image)?;
                let result = self.coordinator.predict_catch(photo).await?;
                print_json(&result)
            }
            Command::Consent { set } => {
                self.enter(Route::Profile).await?;
                if let Some(consent) = set {
                    self.coordinator.update_consent(consent).await?;
                }
                let record = self.coordinator.check_consent().await?;
                let since = record
                    .last_consent_date
                    .map(|d| format_date(&d.to_rfc3339()))
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "Photo analysis consent: {} (last changed: {})",
                    if record.has_consent { "yes" } else { "no" },
                    since
                );
                Ok(())
            }
            Command::Posts => {
                self.enter(Route::Community).await?;
                self.coordinator
                    .fetch_posts()
                    .await
                    .map_err(Self::signed_out_hint)?;
                for post in self.coordinator.posts() {
                    println!(
                        "{:>6}  {}",
                        post.post_id,
                        truncate_string(post.title().unwrap_or("(untitled)"), 60)
                    );
                }
                Ok(())
            }
            Command::Services => {
                for service in self.coordinator.fetch_services().await {
                    println!("{:<12} {}", service.name, service.route);
                }
                Ok(())
            }
            Command::HotIssues => {
                for issue in self.coordinator.fetch_hot_issues().await {
                    let when = issue
                        .timestamp
                        .map(|t| format_date(&t.to_rfc3339()))
                        .unwrap_or_default();
                    println!(
                        "{:<14} {}  ({})",
                        when,
                        truncate_string(&issue.title, 60),
                        format_optional(&issue.author, "anonymous")
                    );
                }
                Ok(())
            }
            Command::Open { route } => {
                match self.guard.before_each(route).await {
                    Navigation::Allow(to) => println!("Allowed: {}", to),
                    Navigation::Redirect(to) => println!("Redirected to {}", to),
                }
                Ok(())
            }
            Command::Socket => {
                let logger = SocketLogger::new(self.config.socket_url.clone());
                println!("Listening on {} (Ctrl-C to stop)", logger.url());
                let received = logger.run().await?;
                println!("Socket closed after {} message(s).", received);
                Ok(())
            }
            Command::Help => {
                print!("{}", USAGE);
                Ok(())
            }
        }
    }

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(name) => name,
            None => prompt("Username: ")?,
        };
        let password = read_password()?;

        self.coordinator.login(&username, &password).await?;
        println!("Signed in as {}.", self.coordinator.user().display_name());

        // Remember who signed in last for the next login
        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        Ok(())
    }

    async fn position(&self, given: Option<Coordinates>) -> Result<Coordinates> {
        match given {
            Some(at) => Ok(at),
            None => self
                .coordinator
                .fetch_location()
                .await
                .context("Pass <lat> <lon> or set home_latitude/home_longitude in the config"),
        }
    }

    fn status(&self) -> Result<()> {
        let state = self.coordinator.snapshot();
        let user = &state.session.user;

        println!("Backend:        {}", self.config.base_url);
        println!("Signed in:      {}", state.session.is_authenticated);
        println!("Stored token:   {}", self.coordinator.has_stored_token());
        println!("User:           {}", user.display_name());
        println!("Tide table:     {:?}", self.coordinator.tide_status());
        println!("Cached catches: {}", state.catches.len());
        println!("Hot issues:     {}", state.hot_issues.len());
        if let Some(at) = self.config.home_location() {
            println!("Home:           {}", at);
        }
        Ok(())
    }

    fn print_catches(&self) {
        let catches = self.coordinator.catches();
        if catches.is_empty() {
            println!("No catches logged yet.");
            return;
        }
        for record in catches {
            println!(
                "{:>6}  {}  {:>10}  {:>10}  {}",
                record.id,
                record.catch_date,
                format_measure(record.weight_kg, "kg"),
                format_measure(record.length_cm, "cm"),
                truncate_string(&record.memo, MEMO_WIDTH)
            );
        }
    }
}

// ============================================================================
// Terminal helpers
// ============================================================================

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("{} is required", label.trim_end_matches(": "));
    }
    Ok(value)
}

/// Password from the environment, or asked for without echo
fn read_password() -> Result<String> {
    if let Some(password) = std::env::var(ENV_PASSWORD).ok().filter(|p| !p.is_empty()) {
        return Ok(password);
    }
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
