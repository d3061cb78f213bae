//! Start Bot Example
//!
//! A Telegram bot that asks new users for their birth date, then shows a
//! main menu with a profile screen.
//!
//! # Flow
//!
//! - A new user writes anything in a private chat: the bot asks for a birth
//!   date and remembers that it is waiting for one
//! - The user replies with `DD.MM.YYYY`: the profile is saved and the reply is
//!   redirected to the start screen
//! - `/start` (or `/start@bot_name` in groups) shows the start screen
//!
//! # Usage
//!
//! ```bash
//! TALLY_TELEGRAM__TOKEN=123:abc cargo run --package start-bot -- --profile dev
//! ```

mod screens;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tally::prelude::*;
use tally::runtime::ConfigLoader;

use screens::{InitProfile, StartScreen, back_to_menu, profile_screen, set_birth_date};

#[derive(Debug, Parser)]
#[command(name = "start-bot", about = "Telegram start-screen demo bot")]
struct Args {
    /// Configuration file; `tally.toml` in the working directory by default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (`dev`, `prod`, ...).
    #[arg(short, long, env = "TALLY_PROFILE")]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded up front: the start screen needs the bot name for group commands.
    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let config = loader.load()?;
    let bot_name = config.bot.name.clone();

    let users = Arc::new(MemoryUserService::with_default_language(
        config.bot.default_language.clone(),
    ));
    let sessions = Arc::new(MemorySessionStore::new());
    let buttons = Arc::new(MemoryButtonStore::new());

    let runtime = TallyRuntime::builder()
        .config(config)
        .user_service(users.clone())
        .session_store(sessions.clone())
        .button_store(buttons.clone())
        .handler(StartScreen {
            bot_name,
            sessions: sessions.clone(),
            buttons: buttons.clone(),
        })
        .handler(InitProfile {
            sessions: sessions.clone(),
        })
        .handler(set_birth_date(users))
        .handler(profile_screen(buttons))
        .handler(back_to_menu())
        .build()?;

    info!(handlers = ?runtime.registry().names(), "Starting start-bot");
    runtime.run().await?;

    Ok(())
}
