use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::Log as _;

use timeport::config::{self, Browser, Config, ConfigError};
use timeport::core::entry::load_entries;
use timeport::report;
use timeport::sync::{CaptureOptions, Cancellation, Controller, WebDriverPage, auth};

/// Import local time-tracking records into AutoTask.
#[derive(Debug, Parser)]
#[command(name = "timeport", version)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output from timeport.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log to the systemd journal (`journalctl --user -t timeport -f`) instead of stderr.
    #[arg(long, global = true)]
    journal: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a file of time entries into AutoTask.
    Import {
        /// JSON file with the entries to import.
        #[arg(short = 'f', long = "filename", default_value = "/tmp/time.json")]
        file: PathBuf,

        /// Print the summary without opening a browser.
        #[arg(short, long)]
        report_only: bool,

        /// Sign in and check which entries exist, but capture nothing.
        #[arg(long)]
        dry_run: bool,

        /// Run the browser without a window.
        #[arg(long)]
        headless: bool,
    },

    /// Create or update the config file interactively.
    Init,

    /// Show the effective settings.
    Settings,

    /// Print the version.
    Version,
}

/// Journal sink that passes timeport records at info (debug when enabled)
/// and everything else at warn.
struct FilteredJournal {
    inner: systemd_journal_logger::JournalLog,
}

impl log::Log for FilteredJournal {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if metadata.target().starts_with("timeport") {
            let max = if timeport::debug_logging() {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Info
            };
            metadata.level() <= max
        } else {
            metadata.level() <= log::LevelFilter::Warn
        }
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn init_logging(journal: bool, debug: bool) {
    timeport::set_debug_logging(debug);

    if journal {
        match systemd_journal_logger::JournalLog::new() {
            Ok(inner) => {
                let inner = inner.with_syslog_identifier("timeport".to_string());
                if log::set_boxed_logger(Box::new(FilteredJournal { inner })).is_ok() {
                    // Global max must be Debug so timeport debug logs can pass when toggled
                    log::set_max_level(log::LevelFilter::Debug);
                    return;
                }
            }
            Err(e) => eprintln!("Journal unavailable, logging to stderr: {e}"),
        }
    }

    let filter = if debug {
        "timeport=debug,warn"
    } else {
        "timeport=info,warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn config_path(cli: &Cli) -> Result<PathBuf, ConfigError> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_path().ok_or(ConfigError::NoConfigDir),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let path = match config_path(&cli) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let debug = cli.verbose
        || Config::load_or_default(&path)
            .map(|c| c.debug_logging)
            .unwrap_or(false);
    init_logging(cli.journal, debug);

    let outcome = match cli.command {
        Command::Import {
            file,
            report_only,
            dry_run,
            headless,
        } => import(&path, &file, report_only, dry_run, headless).await,
        Command::Init => init(&path).map(|()| true),
        Command::Settings => settings(&path).map(|()| true),
        Command::Version => {
            println!("timeport {}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Returns whether every entry ended without an error.
async fn import(
    config_path: &Path,
    file: &Path,
    report_only: bool,
    dry_run: bool,
    headless: bool,
) -> Result<bool, Box<dyn Error>> {
    let config = Config::load(config_path)?;

    log::info!("Loading {}", file.display());
    let mut entries = load_entries(file, &config.date_format)?;
    print!("{}", report::render(&entries));

    if report_only {
        return Ok(true);
    }

    let username = config.effective_username();
    if username.trim().is_empty() {
        return Err(format!(
            "no username configured, run `timeport init` or set {}",
            config::USERNAME_ENV
        )
        .into());
    }
    let password = std::env::var(config::PASSWORD_ENV).ok();

    let page = WebDriverPage::connect(
        &config.webdriver_url,
        config.browser,
        headless || config.headless,
    )
    .await?;

    let cancel = Cancellation::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, stopping after the current item");
                cancel.cancel();
            }
        });
    }

    let session = match auth::login(&page, &username, password.as_deref(), &config.timeouts).await
    {
        Ok(s) => s,
        Err(e) => {
            if let Err(close) = page.close().await {
                log::warn!("Could not close the browser: {close}");
            }
            return Err(format!("sign-in failed: {e}").into());
        }
    };

    let options = CaptureOptions::from_config(&config, dry_run);
    let result = Controller::new(&page, session.clone(), options, cancel)
        .run(&mut entries)
        .await;

    auth::logout(&page, &session, &config.timeouts).await;
    if let Err(e) = page.close().await {
        log::warn!("Could not close the browser: {e}");
    }

    println!();
    print!("{}", report::render(&entries));
    if result.cancelled > 0 {
        println!("\n{} items skipped after interrupt", result.cancelled);
    }

    Ok(!report::has_errors(&entries))
}

fn prompt(input: &mut impl BufRead, label: &str, current: &str) -> io::Result<String> {
    print!("{label} [{current}]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok(if answer.is_empty() {
        current.to_string()
    } else {
        answer.to_string()
    })
}

fn init(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load_or_default(path)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();

    println!("Configuring {}", path.display());
    config.display_name = prompt(&mut input, "Display name in AutoTask", &config.display_name)?;
    config.username = prompt(&mut input, "Sign-in username", &config.username)?;
    config.date_format = prompt(&mut input, "Date format", &config.date_format)?;
    config.day_format = prompt(&mut input, "Timesheet day format", &config.day_format)?;
    config.webdriver_url = prompt(&mut input, "WebDriver URL", &config.webdriver_url)?;

    let browser = prompt(&mut input, "Browser (chrome, firefox)", config.browser.as_str())?;
    config.browser =
        Browser::parse(&browser).ok_or_else(|| format!("unsupported browser: {browser}"))?;

    let headless = prompt(&mut input, "Headless (true, false)", &config.headless.to_string())?;
    config.headless = headless
        .parse()
        .map_err(|_| format!("expected true or false, got {headless}"))?;

    config.version = config::CONFIG_VERSION;
    config.save(path)?;
    println!("Saved {}", path.display());
    println!(
        "Set {} to sign in without typing the password.",
        config::PASSWORD_ENV
    );
    Ok(())
}

fn settings(path: &Path) -> Result<(), Box<dyn Error>> {
    let config = Config::load_or_default(path)?;
    println!("config-file: {}", path.display());
    for (key, value) in config.settings() {
        println!("{key}: {value}");
    }
    let password = if std::env::var_os(config::PASSWORD_ENV).is_some() {
        "set"
    } else {
        "not set"
    };
    println!("{}: {}", config::PASSWORD_ENV, password);
    Ok(())
}
