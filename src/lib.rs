//! # Questkeeper - Gamified Daily Quest Tracker
//!
//! Questkeeper turns daily habits into RPG quests. Each account keeps a list of
//! recurring quests that can be completed once per logical day; completions
//! earn experience, levels, stat points and consecutive-day streaks.
//!
//! ## Features
//!
//! - **Virtual Calendar**: per-account reset hour, so "today" can end at 4 AM instead of midnight.
//! - **Leveling**: 10 EXP per quest, 100 EXP per level, fully reversible when a quest is unchecked.
//! - **Stat Allocation**: level-ups spend 4 stat points, split by an optional Gemini oracle with a random fallback.
//! - **Streaks**: current and longest runs of fully completed days.
//! - **Safe Persistence**: Argon2id credentials, atomic locked writes, forward-compatible records.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use questkeeper::config::Config;
//! use questkeeper::oracle::StatAllocator;
//! use questkeeper::quest::SharedAccount;
//! use questkeeper::storage::AccountStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = AccountStore::new(&config.storage.data_dir).await?;
//!     let allocator = StatAllocator::from_config(&config.oracle);
//!
//!     let account = SharedAccount::new(store.authenticate("alice", "hunter2").await?);
//!     let quest = account.add_quest("Read 20 pages")?;
//!     store.save_shared(&account).await?;
//!
//!     let outcome = account.toggle_with_rewards(&quest.id, &allocator).await?;
//!     store.save_shared(&account).await?;
//!     println!("gained exp: {}, leveled up: {}", outcome.gained_exp, outcome.leveled_up);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`calendar`] - logical day keys and reset instants
//! - [`quest`] - account model, progression, streaks and the per-account lock
//! - [`oracle`] - level-up stat allocation and its fallback
//! - [`storage`] - account registration, authentication and persistence
//! - [`config`] - TOML configuration
//! - [`validation`] - input validation
//! - [`errors`] - error types
//!
//! Callers persist after every mutation; nothing in the library saves on its own.

pub mod calendar;
pub mod config;
pub mod errors;
pub mod logutil;
pub mod oracle;
pub mod quest;
pub mod storage;
pub mod validation;
