use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use onboard::api::{HttpGateway, OnboardingApi};
use onboard::config::Config;
use onboard::draft::{DraftStore, FileKvStore};
use onboard::history::{CachePolicy, HistoryPaginator, NavAction, SessionCache};
use onboard::logging;
use onboard::types::{DraftField, PageKey, ScoreBand, Session};
use onboard::wizard::{ValidationErrors, WizardController, WizardError, WizardStep, STEP_COUNT};

#[derive(Parser)]
#[command(name = "onboard")]
#[command(about = "Investment-readiness onboarding and session history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current step and draft
    Status,

    /// Set a draft field (e.g. `set age 35`, `set goals retirement,income`)
    Set {
        field: DraftField,
        value: String,
    },

    /// Clear a draft field
    Unset { field: DraftField },

    /// Validate the current step and move to the next one
    Next,

    /// Move back one step
    Back,

    /// Submit the completed draft for scoring
    Submit,

    /// Discard the draft and start over
    Reset,

    /// List past submissions, newest first
    History {
        /// Page to show (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Sessions per page (defaults to history.page_size)
        #[arg(long)]
        page_size: Option<u32>,

        /// Only sessions created at or before this RFC 3339 time
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        /// Page through the history with n/p/f/l, q to quit
        #[arg(short, long)]
        interactive: bool,
    },

    /// Show one session in full
    Show { id: Uuid },

    /// Delete one session
    Delete { id: Uuid },

    /// Write the effective configuration to .onboard/config.toml
    Init {
        /// Overwrite an existing project config
        #[arg(short, long)]
        force: bool,

        /// Print the configuration instead of writing it
        #[arg(long)]
        print: bool,
    },
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

/// Shared handles for one CLI invocation
struct App {
    config: Config,
    api: Arc<dyn OnboardingApi>,
    cache: Arc<SessionCache>,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let gateway = HttpGateway::from_config(&config.api)
            .context("Failed to create onboarding API client")?;
        let api: Arc<dyn OnboardingApi> = Arc::new(gateway);
        let cache = Arc::new(SessionCache::new(
            Arc::clone(&api),
            CachePolicy::from_config(&config.history),
        ));
        Ok(Self { config, api, cache })
    }

    fn wizard(&self) -> WizardController<FileKvStore> {
        let store = DraftStore::new(FileKvStore::in_dir(&self.config.state_path()));
        WizardController::open(store, Arc::clone(&self.api)).with_cache(Arc::clone(&self.cache))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let app = App::new(config)?;

    let result = match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => cmd_status(&app),
        Commands::Set { field, value } => cmd_set(&app, field, &value),
        Commands::Unset { field } => cmd_unset(&app, field),
        Commands::Next => cmd_next(&app),
        Commands::Back => cmd_back(&app),
        Commands::Submit => cmd_submit(&app).await,
        Commands::Reset => cmd_reset(&app),
        Commands::History {
            page,
            page_size,
            since,
            interactive,
        } => {
            let page_size = page_size.unwrap_or(app.config.history.page_size);
            let key = PageKey::new(since, page, page_size);
            if interactive {
                cmd_history_interactive(&app, key).await
            } else {
                cmd_history(&app, key).await
            }
        }
        Commands::Show { id } => cmd_show(&app, id).await,
        Commands::Delete { id } => cmd_delete(&app, id).await,
        Commands::Init { force, print } => cmd_init(&app.config, force, print),
    };

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    result
}

fn print_step_header(step: WizardStep) {
    println!(
        "Step {}/{}: {} - {}",
        step.index() + 1,
        STEP_COUNT,
        step.title(),
        step.description()
    );
    println!("{}", "─".repeat(60));
}

fn print_validation(errors: &ValidationErrors) {
    for error in errors.iter() {
        eprintln!("  ✗ {}", error);
    }
}

/// Turn a wizard error into a CLI failure, listing field errors one per line
fn wizard_failure(err: WizardError) -> anyhow::Error {
    if let WizardError::Validation(errors) = &err {
        eprintln!("Please fix the following:");
        print_validation(errors);
    }
    anyhow::Error::new(err)
}

fn cmd_status(app: &App) -> Result<()> {
    let wizard = app.wizard();
    let current = wizard.current_step();
    print_step_header(current);

    if current == WizardStep::Review {
        for step in &WizardStep::all()[..STEP_COUNT - 1] {
            println!("{}", step.title());
            print_fields(&wizard, step.fields());
        }
        print_fields(&wizard, &[DraftField::RiskFlags, DraftField::UserId]);
    } else {
        print_fields(&wizard, current.fields());
    }

    match wizard.validate_step(current) {
        Ok(()) if current.is_last() => match onboard::wizard::validate_all(wizard.draft()) {
            Ok(()) => println!("\nReady to submit (`onboard submit`)"),
            Err(errors) => {
                println!("\nNot ready to submit:");
                print_validation(&errors);
            }
        },
        Ok(()) => println!("\nStep complete (`onboard next` to continue)"),
        Err(errors) => {
            println!("\nStill needed:");
            print_validation(&errors);
        }
    }
    Ok(())
}

fn print_fields(wizard: &WizardController<FileKvStore>, fields: &[DraftField]) {
    for field in fields {
        let value = wizard
            .draft()
            .display_value(*field)
            .unwrap_or_else(|| "(not set)".to_string());
        println!("  {:<18} {}", field.label(), value);
        if !wizard.draft().has(*field) && !field.suggestions().is_empty() {
            let values: Vec<&str> = field.suggestions().iter().map(|(v, _)| *v).collect();
            println!("  {:<18} options: {}", "", values.join(", "));
        }
    }
}

fn cmd_set(app: &App, field: DraftField, value: &str) -> Result<()> {
    let mut wizard = app.wizard();
    wizard.set_field(field, value).map_err(wizard_failure)?;
    let shown = wizard
        .draft()
        .display_value(field)
        .unwrap_or_else(|| "(empty)".to_string());
    println!("{} = {}", field.label(), shown);
    Ok(())
}

fn cmd_unset(app: &App, field: DraftField) -> Result<()> {
    let mut wizard = app.wizard();
    wizard.clear_field(field).map_err(wizard_failure)?;
    println!("Cleared {}", field.label());
    Ok(())
}

fn cmd_next(app: &App) -> Result<()> {
    let mut wizard = app.wizard();
    let step = wizard.advance().map_err(wizard_failure)?;
    print_step_header(step);
    Ok(())
}

fn cmd_back(app: &App) -> Result<()> {
    let mut wizard = app.wizard();
    let step = wizard.retreat().map_err(wizard_failure)?;
    print_step_header(step);
    Ok(())
}

async fn cmd_submit(app: &App) -> Result<()> {
    let mut wizard = app.wizard();
    let outcome = wizard.submit().await.map_err(wizard_failure)?;

    println!("Submitted");
    println!("  Session: {}", outcome.session_id);
    println!("  User:    {}", outcome.user_id);
    match outcome.score {
        Some(score) => {
            let band = ScoreBand::from_score(score);
            println!("  Score:   {}/100 ({})", score, band.label());
            println!("  {}", band.description());
        }
        None => println!("  Score:   pending"),
    }
    Ok(())
}

fn cmd_reset(app: &App) -> Result<()> {
    let mut wizard = app.wizard();
    wizard.reset();
    println!("Draft discarded");
    Ok(())
}

fn print_page(paginator: &HistoryPaginator) {
    println!("Session History");
    println!("{}", "─".repeat(60));

    if paginator.is_empty() {
        println!("{}", paginator.window_text());
        return;
    }

    for row in paginator.rows() {
        println!(
            "#{:<4} {}  {}  {:>3}  {}",
            row.ordinal,
            row.created_at.format("%Y-%m-%d %H:%M"),
            row.id,
            row.score,
            row.band.label()
        );
    }
    println!();
    println!("{}", paginator.window_text());
    println!("{}", paginator.footer());
}

async fn cmd_history(app: &App, key: PageKey) -> Result<()> {
    let page = app
        .cache
        .fetch_page(key)
        .await
        .context("Failed to load session history")?;
    print_page(&HistoryPaginator::new(page));
    Ok(())
}

async fn cmd_history_interactive(app: &App, mut key: PageKey) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let paginator = match app.cache.fetch_page(key).await {
            Ok(page) => HistoryPaginator::new(page),
            Err(e) if e.is_not_found() => bail!("Page {} does not exist", key.page),
            Err(e) => {
                eprintln!("Failed to load page {}: {}", key.page, e);
                eprintln!("[r] retry  [q] quit");
                match lines.next_line().await? {
                    Some(line) if line.trim().eq_ignore_ascii_case("r") => continue,
                    _ => return Ok(()),
                }
            }
        };
        print_page(&paginator);

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            return Ok(());
        }

        let action = input.chars().next().and_then(NavAction::from_key);
        match action.and_then(|a| paginator.target(a)) {
            Some(page) => key = key.with_page(page),
            None => eprintln!("Nothing to do for '{}'", input),
        }
    }
}

fn print_session(session: &Session) -> Result<()> {
    println!("Session {}", session.id);
    println!("{}", "─".repeat(60));
    println!("  User:     {}", session.user_id);
    println!("  Created:  {}", session.created_at.to_rfc3339());
    match session.score {
        Some(score) => println!(
            "  Score:    {}/100 ({})",
            score,
            ScoreBand::from_score(score).label()
        ),
        None => println!("  Score:    pending"),
    }
    if let Some(explanation) = &session.score_explanation {
        println!("  Why:      {}", explanation);
    }
    if !session.raw_input.is_null() {
        println!();
        println!(
            "{}",
            serde_json::to_string_pretty(&session.raw_input)
                .context("Failed to render session input")?
        );
    }
    Ok(())
}

async fn cmd_show(app: &App, id: Uuid) -> Result<()> {
    let session = app
        .cache
        .session(id)
        .await
        .with_context(|| format!("Failed to load session {}", id))?;
    print_session(&session)
}

fn cmd_init(config: &Config, force: bool, print: bool) -> Result<()> {
    if print {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    let path = Config::project_config_path();
    config.write_to(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn cmd_delete(app: &App, id: Uuid) -> Result<()> {
    app.cache
        .delete_session(id)
        .await
        .with_context(|| format!("Failed to delete session {}", id))?;
    println!("Deleted session {}", id);
    Ok(())
}
