//! spritectl - user directory with cached profile sprites

mod directory;
mod users;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spritecache::{FsFetcher, SpriteCache};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::directory::UserDirectory;
use crate::users::UsersData;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the sprite files
    #[arg(short, long, default_value = "./assets")]
    assets: PathBuf,

    /// User list payload (JSON)
    #[arg(short, long, default_value = "./users.json")]
    users: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every user with its thumbnail
    List {
        /// Number of times the list is loaded
        #[arg(short, long, default_value_t = 1)]
        passes: usize,
    },

    /// Show one user with its profile picture
    Show {
        /// Email of the user
        email: String,

        /// Print the user record as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting spritectl v{}", env!("CARGO_PKG_VERSION"));
    info!("Asset directory: {}", args.assets.display());
    info!("User list: {}", args.users.display());

    let payload = UsersData::load(&args.users)?;
    let directory = UserDirectory::from_payload(&payload);
    if directory.is_empty() {
        warn!("User list {} contains no users", args.users.display());
    } else {
        info!(
            "Loaded {} users (page {}, api version {})",
            directory.len(),
            payload.info.page,
            payload.info.version
        );
    }

    // One cache for the whole process, handed to every consumer
    let cache = SpriteCache::try_current(FsFetcher::new(&args.assets))
        .context("Failed to create sprite cache")?;

    match args.command {
        Command::List { passes } => list(&directory, &cache, passes).await,
        Command::Show { email, json } => show(&directory, &cache, &email, json).await,
    }
}

async fn list(directory: &UserDirectory, cache: &SpriteCache, passes: usize) -> Result<()> {
    for pass in 1..=passes.max(1) {
        let rows = directory.load_thumbnails(cache).await;
        if pass > 1 {
            continue;
        }

        for (row, user) in rows.iter().zip(directory.iter()) {
            match &row.image {
                Ok(sprite) => println!(
                    "{:>4}  {:<28} {:<32} {}x{} {}",
                    row.row,
                    user.full_name(),
                    row.email,
                    sprite.width(),
                    sprite.height(),
                    sprite.format().mime_type(),
                ),
                Err(e) => println!(
                    "{:>4}  {:<28} {:<32} <{}>",
                    row.row,
                    user.full_name(),
                    row.email,
                    e
                ),
            }
        }
    }

    let stats = cache.stats();
    println!();
    println!("cache_entries:   {}", cache.len());
    println!("cache_hits:      {}", stats.hits());
    println!("cache_joins:     {}", stats.joins());
    println!("cache_misses:    {}", stats.misses());
    println!("cache_failures:  {}", stats.failures());
    println!("cache_hit_ratio: {:.2}", stats.hit_ratio());

    Ok(())
}

async fn show(
    directory: &UserDirectory,
    cache: &SpriteCache,
    email: &str,
    json: bool,
) -> Result<()> {
    let user = directory
        .get(email)
        .with_context(|| format!("Unknown user: {}", email))?;

    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
    } else {
        println!("Name:   {}", user.full_name());
        println!("Email:  {}", user.email);
        println!("Gender: {}", user.gender);
        println!("Phone:  {}", user.phone);
        println!("Age:    {}", user.age);
    }

    let sprite = directory.profile_picture(cache, email).await?;
    println!(
        "Image:  {} ({}x{} {}, {} bytes)",
        user.image_url,
        sprite.width(),
        sprite.height(),
        sprite.format().mime_type(),
        sprite.len()
    );

    Ok(())
}
