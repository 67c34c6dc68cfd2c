//! Operator CLI for the songbook revision store.
//!
//! ```bash
//! songbook-admin migrate
//! songbook-admin history 12
//! songbook-admin pending 12
//! songbook-admin compare 12 3 4
//! songbook-admin approve 40 --moderator 9
//! songbook-admin reject 41 --moderator 9 --reason "wrong chords"
//! songbook-admin compile 5 --json
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use songbook_core::types::{DbId, Revision};
use songbook_db::repositories::{
    MembershipRepo, SongEditRepo, SongRepo, SongVersionRepo, SongbookRepo,
};
use songbook_db::{DbConfig, DbPool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Songbook revision store administration
#[derive(Parser, Debug)]
#[command(name = "songbook-admin", version)]
#[command(about = "Inspect song history and moderate pending edits")]
struct Args {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,

    /// List every revision of a song
    History { song_id: DbId },

    /// List pending edits of a song, oldest first
    Pending { song_id: DbId },

    /// Show a line diff between two revisions
    Compare {
        song_id: DbId,
        from: Revision,
        to: Revision,
    },

    /// Approve a pending edit
    Approve {
        edit_id: DbId,
        #[arg(long)]
        moderator: DbId,
    },

    /// Reject a pending edit
    Reject {
        edit_id: DbId,
        #[arg(long)]
        moderator: DbId,
        #[arg(long)]
        reason: String,
    },

    /// Print a songbook with the current text of every song
    Compile {
        songbook_id: DbId,
        /// Emit JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "songbook_admin=info,songbook_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = DbConfig::new(args.database_url).with_env_overrides()?;
    let pool = songbook_db::create_pool(&config)
        .await
        .context("Failed to connect to database")?;
    songbook_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::debug!(max_connections = config.max_connections, "Database pool ready");

    run(&pool, args.command).await
}

async fn run(pool: &DbPool, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Migrate => {
            songbook_db::run_migrations(pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
        }
        Command::History { song_id } => {
            let song = SongRepo::get(pool, song_id).await?;
            println!("{} [{}] (song {})", song.title, song.arrangement, song.id);
            for version in SongVersionRepo::history(pool, song_id).await? {
                let marker = if version.id == song.current_version_id { "*" } else { " " };
                println!(
                    "{marker} r{:<4} {}  author {:<6} {}",
                    version.revision,
                    version.created_at.format("%Y-%m-%d %H:%M"),
                    version.author_id,
                    version.body_hash.get(..12).unwrap_or(&version.body_hash),
                );
            }
        }
        Command::Pending { song_id } => {
            let pending = SongEditRepo::list_pending(pool, song_id).await?;
            if pending.is_empty() {
                println!("No pending edits");
            }
            for edit in pending {
                let summary = edit.diff.summary();
                println!(
                    "edit {:<6} base {:<6} by {:<6} +{} -{}  {}",
                    edit.id,
                    edit.base_version_id,
                    edit.proposer_id,
                    summary.lines_added,
                    summary.lines_removed,
                    edit.submitted_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        Command::Compare { song_id, from, to } => {
            for line in SongVersionRepo::compare_revisions(pool, song_id, from, to).await? {
                println!("{}{}", line.line_type.marker(), line.content);
            }
        }
        Command::Approve { edit_id, moderator } => {
            authorize(pool, edit_id, moderator).await?;
            let version = SongEditRepo::approve(pool, edit_id, moderator).await?;
            println!(
                "Approved edit {edit_id}: song {} is now at r{}",
                version.song_id, version.revision
            );
        }
        Command::Reject { edit_id, moderator, reason } => {
            authorize(pool, edit_id, moderator).await?;
            SongEditRepo::reject(pool, edit_id, moderator, &reason).await?;
            println!("Rejected edit {edit_id}");
        }
        Command::Compile { songbook_id, json } => {
            let compiled = SongbookRepo::compile(pool, songbook_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&compiled)?);
            } else {
                println!("# {} (r{})", compiled.songbook.name, compiled.songbook.revision);
                for song in &compiled.songs {
                    println!();
                    let number = song.position + 1;
                    match &song.artist {
                        Some(artist) => println!("## {number}. {} - {artist}", song.title),
                        None => println!("## {number}. {}", song.title),
                    }
                    print!("{}", song.body);
                    if !song.body.ends_with('\n') {
                        println!();
                    }
                }
            }
        }
    }
    Ok(())
}

/// Check that `moderator` may resolve edits in the group owning the edit's song.
async fn authorize(pool: &DbPool, edit_id: DbId, moderator: DbId) -> anyhow::Result<()> {
    let edit = SongEditRepo::get(pool, edit_id).await?;
    let song = SongRepo::get(pool, edit.song_id).await?;
    MembershipRepo::require_moderator(pool, moderator, song.group_id).await?;
    Ok(())
}
