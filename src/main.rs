//! Binary entrypoint for the questkeeper CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and create the data directory
//! - `register <user>` - create an account (password prompted)
//! - `status <user>` - level, EXP, stats, streaks and today's quests
//! - `add <user> <name>` / `remove <user> <n>` - manage quests
//! - `toggle <user> <n>` - complete or un-complete quest `n` for today
//! - `reset-hour <user> <hour>` - set the hour the day rolls over
//!
//! Quest numbers are 1-based as printed by `status`.
use anyhow::{anyhow, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use log::info;

use questkeeper::config::Config;
use questkeeper::oracle::StatAllocator;
use questkeeper::quest::{SharedAccount, ToggleOutcome, EXP_PER_QUEST};
use questkeeper::storage::AccountStore;

#[derive(Parser)]
#[command(name = "questkeeper")]
#[command(about = "A gamified daily quest tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    #[command(flatten)]
    Account(AccountCommand),
}

/// Commands that run against the configured account store.
#[derive(Subcommand)]
enum AccountCommand {
    /// Register a new account
    Register { username: String },
    /// Show progress for an account
    Status { username: String },
    /// Add a daily quest
    Add { username: String, name: String },
    /// Remove a quest by its number
    Remove { username: String, number: usize },
    /// Complete or un-complete a quest for today
    Toggle { username: String, number: usize },
    /// Set the hour (0-23) at which the day resets
    ResetHour {
        username: String,
        #[arg(allow_negative_numbers = true)]
        hour: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            let cfg = Config::load(&cli.config).await?;
            AccountStore::new(&cfg.storage.data_dir).await?;
            info!("Configuration file created at {}", cli.config);
            return Ok(());
        }
        Commands::Account(command) => command,
    };

    let config = match Config::load(&cli.config).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e} (using defaults; run `questkeeper init` to create one)");
            Config::default()
        }
    };
    init_logging(&Some(config.clone()), cli.verbose);
    let store = AccountStore::new_with_params(&config.storage.data_dir, config.argon2_params()?).await?;

    match command {
        AccountCommand::Register { username } => {
            let pass1 = rpassword::prompt_password("Password: ")?;
            let pass2 = rpassword::prompt_password("Confirm password: ")?;
            if pass1 != pass2 {
                return Err(anyhow!("passwords do not match"));
            }
            let account = store.register(&username, &pass1).await?;
            println!("Welcome, hunter {}. Your journey begins at level 1.", account.username);
        }
        AccountCommand::Status { username } => {
            let account = login(&store, &username).await?;
            print_status(&account);
        }
        AccountCommand::Add { username, name } => {
            let account = login(&store, &username).await?;
            let quest = account.add_quest(&name)?;
            store.save_shared(&account).await?;
            println!("Quest added: {}", quest.name);
        }
        AccountCommand::Remove { username, number } => {
            let account = login(&store, &username).await?;
            let quest = account.remove_quest(index_from_number(number)?)?;
            store.save_shared(&account).await?;
            println!("Quest removed: {}", quest.name);
        }
        AccountCommand::Toggle { username, number } => {
            let account = login(&store, &username).await?;
            let quest = account
                .quest_by_index(index_from_number(number)?)
                .ok_or_else(|| anyhow!("no quest number {}", number))?;
            let allocator = StatAllocator::from_config(&config.oracle);
            let outcome = account.toggle_with_rewards(&quest.id, &allocator).await?;
            store.save_shared(&account).await?;
            print_toggle(&quest.name, &outcome);
        }
        AccountCommand::ResetHour { username, hour } => {
            let account = login(&store, &username).await?;
            account.set_reset_hour(hour)?;
            store.save_shared(&account).await?;
            println!("Daily quests now reset at {:02}:00.", hour);
        }
    }

    Ok(())
}

async fn login(store: &AccountStore, username: &str) -> Result<SharedAccount> {
    let password = rpassword::prompt_password("Password: ")?;
    let account = store.authenticate(username, &password).await?;
    Ok(SharedAccount::new(account))
}

fn index_from_number(number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .ok_or_else(|| anyhow!("quest numbers start at 1"))
}

fn print_status(account: &SharedAccount) {
    let summary = account.summary();
    let (quests, done): (Vec<String>, Vec<bool>) = account.read(|a| {
        a.quests
            .iter()
            .map(|q| (q.name.clone(), a.completed_today(&q.id)))
            .unzip()
    });
    println!("◆ {}  Lv.{}", account.username(), summary.level);
    println!(
        "  EXP   {}/{}  (total {})",
        summary.exp_within_level,
        questkeeper::quest::EXP_PER_LEVEL,
        summary.experience
    );
    println!(
        "  STR {}  VIT {}  AGI {}  INT {}",
        summary.stats.strength, summary.stats.vitality, summary.stats.agility, summary.stats.intelligence
    );
    println!(
        "  Streak {} day(s), best {}",
        summary.current_streak, summary.longest_streak
    );
    println!("  {}", format_remaining(summary.time_until_reset));
    println!();
    println!("  Daily Quests  {}/{} completed today", summary.completed_today, summary.total_quests);
    for (i, (name, done)) in quests.iter().zip(done).enumerate() {
        let check = if done { "[✓]" } else { "[ ]" };
        println!("  {:>2}. {} {}  → +{} EXP", i + 1, check, name, EXP_PER_QUEST);
    }
}

fn print_toggle(name: &str, outcome: &ToggleOutcome) {
    if !outcome.gained_exp {
        println!("Quest reopened: {} (-{} EXP)", name, EXP_PER_QUEST);
        return;
    }
    println!("The conditions have been met. +{} EXP", EXP_PER_QUEST);
    for reward in &outcome.rewards {
        let g = reward.gain;
        println!(
            "DING! Level {}. STR +{}  VIT +{}  AGI +{}  INT +{}",
            reward.level, g.strength, g.vitality, g.agility, g.intelligence
        );
    }
}

fn format_remaining(remaining: Duration) -> String {
    format!(
        "{}h {}m until reset",
        remaining.num_hours(),
        remaining.num_minutes() % 60
    )
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let file = std::sync::Mutex::new(f);
        // Echo to the console only when someone is watching it
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
