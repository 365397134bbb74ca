//! tanalyze - Twitter account analyzer CLI
//!
//! Main entry point for the tanalyze command-line tool.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info};

use tanalyzer::client::RestClient;
use tanalyzer::oauth::CREDENTIAL_SETTINGS;
use tanalyzer::*;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_cli_logging(cli.quiet, cli.verbose);

    let config = Config::load();
    if !config.output.colors {
        colored::control::set_override(false);
    }

    let result = match &cli.command {
        Commands::Init(args) => cmd_init(&cli, &config, args),
        Commands::Update => cmd_update(&cli, &config),
        Commands::Search(args) => cmd_search(&cli, &config, args),
        Commands::FindTrolls(args) => cmd_find_trolls(&cli, &config, args),
        Commands::Stats => cmd_stats(&cli, &config),
        Commands::Config(args) => cmd_config(&cli, &config, args),
        Commands::Completions(args) => cmd_completions(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn render_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TanalyzerError>() {
        Some(e) => format_error(&e.to_string(), "", e.suggestion().as_slice()),
        None => format_error("Error", &format!("{err:#}"), &[]),
    }
}

fn get_db_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.db.clone().unwrap_or_else(|| config.db_path())
}

fn output_format(cli: &Cli, config: &Config) -> OutputFormat {
    cli.format
        .unwrap_or_else(|| config.output.format.parse().unwrap_or_default())
}

/// Print `value` as JSON if a JSON format was requested. Returns whether it did.
fn print_json<T: Serialize>(format: OutputFormat, value: &T) -> Result<bool> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => return Ok(false),
    }
    Ok(true)
}

fn cmd_init(cli: &Cli, config: &Config, args: &cli::InitArgs) -> Result<()> {
    let db_path = get_db_path(cli, config);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let storage = Storage::open(&db_path)?;

    let given = [
        &args.consumer_key,
        &args.consumer_secret,
        &args.access_token,
        &args.access_secret,
    ];
    let term = Term::stderr();
    for (name, value) in CREDENTIAL_SETTINGS.iter().zip(given) {
        let value = match value {
            Some(v) => v.trim().to_string(),
            None => prompt(&term, name)?,
        };
        if value.is_empty() {
            anyhow::bail!("No value given for '{name}'");
        }
        storage.set_setting(name, &value)?;
        debug!(setting = name, "Stored credential");
    }

    if !cli.quiet {
        println!(
            "{} Credentials stored in {}",
            "✓".green(),
            db_path.display().to_string().cyan()
        );
        println!("Run {} to fetch your data.", "tanalyze update".bold());
    }
    Ok(())
}

fn prompt(term: &Term, name: &str) -> Result<String> {
    term.write_str(&format!("{}: ", name.bold()))?;
    let value = if name.ends_with("secret") {
        term.read_secure_line()?
    } else {
        term.read_line()?
    };
    Ok(value.trim().to_string())
}

fn cmd_update(cli: &Cli, config: &Config) -> Result<()> {
    let format = output_format(cli, config);
    let storage = Storage::open_existing(get_db_path(cli, config))?;
    let client = RestClient::from_storage(&storage, &config.api)?;
    let scorer = LexiconScorer::new();

    let spinner = if cli.quiet || format != OutputFormat::Text {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("Connecting...");
    let progress = |label: &str, count: usize| {
        spinner.set_message(format!("Analyzed {} {label}", count.to_string().cyan()));
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let runner = SyncRunner::new(&client, &storage)
        .page_size(config.api.page_size)
        .cache_capacity(config.cache.user_capacity)
        .progress(&progress);

    let outcome = runtime.block_on(async {
        tokio::select! {
            result = runner.run(&scorer) => result.map_err(anyhow::Error::from),
            _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!(
                "Interrupted; feeds finished before the interrupt keep their progress"
            )),
        }
    });
    spinner.finish_and_clear();
    let report = outcome?;
    info!(?report, "Update complete");

    if print_json(format, &report)? || cli.quiet {
        return Ok(());
    }
    println!("{}", "Update complete".bold().green());
    println!("{}", "─".repeat(40));
    println!("  {:<20} {:>10}", "Users:", format_count(report.users));
    println!("  {:<20} {:>10}", "Tweets:", format_count(report.tweets));
    println!("  {:<20} {:>10}", "New tweets:", format_count(report.new_tweets));
    println!("  {:<20} {:>10}", "Profiles fetched:", format_count(report.backfilled));
    println!("  {:<20} {:>10}", "Suspended:", format_count(report.suspended));
    Ok(())
}

fn format_count(n: usize) -> String {
    format_number(i64::try_from(n).unwrap_or(i64::MAX))
}

fn cmd_search(cli: &Cli, config: &Config, args: &cli::SearchArgs) -> Result<()> {
    let format = output_format(cli, config);
    let storage = Storage::open_existing(get_db_path(cli, config))?;

    let shown = match args.target() {
        SearchTarget::Tweets => {
            let hits = report::search_tweets(&storage, &args.query)?;
            if !print_json(format, &hits)? {
                for hit in &hits {
                    print_tweet_match(hit);
                }
            }
            hits.len()
        }
        SearchTarget::Urls => {
            let hits = report::search_urls(&storage, &args.query)?;
            if !print_json(format, &hits)? {
                for hit in &hits {
                    println!("|----- {}", hit.url.cyan());
                    println!("| {} {}  {} {}", "domain".dimmed(), hit.domain, "tweet".dimmed(), hit.tweet_id);
                }
            }
            hits.len()
        }
        SearchTarget::Users => {
            let hits = report::search_users(&storage, &args.query)?;
            if !print_json(format, &hits)? {
                for hit in &hits {
                    print_user(hit);
                }
            }
            hits.len()
        }
    };

    if format == OutputFormat::Text && !cli.quiet {
        if shown == 0 {
            println!("{}", "No results found.".yellow());
        } else {
            println!("{} results for \"{}\"", shown.to_string().cyan(), args.query.bold());
        }
    }
    Ok(())
}

fn print_tweet_match(hit: &TweetMatch) {
    let tweet = &hit.tweet;
    println!(
        "|----- @{} {} {}",
        hit.screen_name.green(),
        tweet.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        tweet.id.dimmed()
    );
    for line in textwrap::wrap(&tweet.text, CONTENT_DIVIDER_WIDTH + 18) {
        println!("| {line}");
    }
    println!(
        "| {} {}  {} {}",
        "polarity".dimmed(),
        format_score(tweet.polarity),
        "subjectivity".dimmed(),
        format_score(tweet.subjectivity)
    );
}

fn print_user(user: &User) {
    let mut flags = Vec::new();
    if user.me {
        flags.push("me");
    }
    if user.verified {
        flags.push("verified");
    }
    if user.friend {
        flags.push("friend");
    }
    if user.follower {
        flags.push("follower");
    }
    if user.blocking {
        flags.push("blocked");
    }
    if user.muting {
        flags.push("muted");
    }
    if user.suspended {
        flags.push("suspended");
    }

    println!("|----- @{} ({})", user.screen_name.green(), user.name);
    println!(
        "| {} followers  {} friends  {} tweets  {} likes {}",
        format_number(user.followers_count).cyan(),
        format_number(user.friends_count).cyan(),
        format_number(user.statuses_count).cyan(),
        format_number(user.favourites_count).cyan(),
        flags.join(", ").yellow()
    );
    if !user.description.is_empty() {
        for line in textwrap::wrap(&user.description, CONTENT_DIVIDER_WIDTH + 18) {
            println!("| {}", line.dimmed());
        }
    }
}

fn cmd_find_trolls(cli: &Cli, config: &Config, args: &cli::FindTrollsArgs) -> Result<()> {
    let format = output_format(cli, config);
    let storage = Storage::open_existing(get_db_path(cli, config))?;
    let me = storage.get_me()?.ok_or(TanalyzerError::NotInitialized)?;

    let defaults = config.trolls.thresholds();
    let thresholds = TrollThresholds {
        polarity: args.polarity.unwrap_or(defaults.polarity),
        subjectivity: args.subjectivity.unwrap_or(defaults.subjectivity),
    };
    let trolls = report::find_trolls(&storage, &me, thresholds)?;

    if print_json(format, &trolls)? {
        return Ok(());
    }
    if trolls.is_empty() {
        println!("{}", "No trolls found.".yellow());
        return Ok(());
    }
    for troll in &trolls {
        println!("|----- @{}", troll.screen_name.red().bold());
        println!(
            "| {} {}  {} {}",
            "polarity".dimmed(),
            format_score(troll.polarity),
            "subjectivity".dimmed(),
            format_score(troll.subjectivity)
        );
    }
    Ok(())
}

fn cmd_stats(cli: &Cli, config: &Config) -> Result<()> {
    let format = output_format(cli, config);
    let storage = Storage::open_existing(get_db_path(cli, config))?;
    let stats = storage.get_stats()?;

    if print_json(format, &stats)? {
        return Ok(());
    }

    println!("{}", "Database Statistics".bold().cyan());
    println!("{}", "─".repeat(40));
    println!("  {:<20} {:>10}", "Users:", format_number(stats.users_count));
    println!("  {:<20} {:>10}", "Analyzed users:", format_number(stats.analyzed_users_count));
    println!("  {:<20} {:>10}", "Suspended users:", format_number(stats.suspended_users_count));
    println!("  {:<20} {:>10}", "Tweets:", format_number(stats.tweets_count));
    println!("  {:<20} {:>10}", "URLs:", format_number(stats.urls_count));
    println!("  {:<20} {:>10}", "Mentions:", format_number(stats.mentions_count));
    println!("{}", "─".repeat(40));

    if let (Some(first), Some(last)) = (stats.first_tweet_date, stats.last_tweet_date) {
        println!("  First tweet: {}", first.format("%Y-%m-%d").to_string().green());
        println!("  Last tweet:  {}", last.format("%Y-%m-%d").to_string().green());
    }
    for (name, value) in &stats.watermarks {
        println!("  {:<24} {}", format!("{name}:"), value.dimmed());
    }
    Ok(())
}

fn cmd_config(cli: &Cli, config: &Config, args: &cli::ConfigArgs) -> Result<()> {
    if args.init {
        let path = Config::default().save().context("Failed to write config file")?;
        println!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
        return Ok(());
    }

    let format = output_format(cli, config);
    if args.show && print_json(format, config)? {
        return Ok(());
    }

    println!("{}", "Current Configuration".bold().cyan());
    println!("  Database: {}", get_db_path(cli, config).display());
    match Config::user_config_path() {
        Some(path) => println!("  Config file: {}", path.display()),
        None => println!("  Config file: {}", "unavailable".dimmed()),
    }
    if args.show {
        println!();
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

fn cmd_completions(args: &cli::CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "tanalyze", &mut io::stdout());
    Ok(())
}
