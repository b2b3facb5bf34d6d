// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchbridge_core::api::credentials::{credential_channel, Credentials, MessageCredentialSource};
use watchbridge_core::api::{BrowseOptions, HomeOptions, RatedContent, SearchOptions, WatchlistOptions};
use watchbridge_core::storage::{CredentialStore, Database, MemoryStore, SqliteStore};
use watchbridge_core::{ClientConfig, StreamClient};

#[derive(Parser)]
#[command(name = "watchbridge-cli")]
#[command(about = "WatchBridge CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// JSON file with the `{tokenData, profileData}` payload the content
    /// script would deliver
    #[arg(short, long, env = "WATCHBRIDGE_CREDENTIALS")]
    credentials: PathBuf,

    /// SQLite file for persisted credentials (in memory when omitted)
    #[arg(short, long, env = "WATCHBRIDGE_STATE")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the catalog
    Browse {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
        /// `series` or `movie_listing`
        #[arg(short = 't', long = "type")]
        content_type: Option<String>,
        #[arg(long)]
        seasonal_tag: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
        /// Comma separated
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
    },
    /// Search
    Search {
        query: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
        #[arg(short = 't', long = "type")]
        content_type: Option<String>,
    },
    /// Series detail with seasons and watchlist membership
    Series { series_id: String },
    /// Episodes of a season
    Episodes { season_id: String },
    /// Continue watching
    Continue {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
    /// Recommendations, optionally seeded
    Recommend {
        #[arg(long)]
        seed: Option<String>,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
    /// Home screen data
    Home {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
        #[arg(long)]
        seasonal_tag: Option<String>,
    },
    /// List the watchlist
    Watchlist {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
    /// Add to the watchlist
    Add { content_id: String },
    /// Remove from the watchlist
    Remove { content_id: String },
    /// Show the user's rating
    Rating {
        /// series, episode or movie_listing
        content_type: RatedContent,
        content_id: String,
    },
    /// Rate content
    Rate {
        content_type: RatedContent,
        content_id: String,
        rating: String,
    },
    /// Playback stream for an episode
    Stream { content_id: String },
    /// Active profile
    Profile,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr, stdout carries the JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchbridge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.credentials)
        .with_context(|| format!("reading {}", cli.credentials.display()))?;
    let credentials: Credentials =
        serde_json::from_str(&raw).context("credentials file is not a {tokenData, profileData} payload")?;

    let config = ClientConfig::from_env();

    // Stand-in for the content script: answer every request from the file
    let (channel, host) = credential_channel(8);
    let _host = host.serve(move || Some(credentials.clone()));
    let source = MessageCredentialSource::new(channel, config.credential_timeout, config.credential_backoff);

    let store = match cli.state {
        Some(ref path) => {
            let db = Database::new(path).await?;
            CredentialStore::new(Arc::new(MemoryStore::new()), Arc::new(SqliteStore::new(db, "extension")))
        }
        None => CredentialStore::in_memory(),
    };

    let client = StreamClient::builder(config)
        .credential_source(Arc::new(source))
        .credential_store(store)
        .build()?;

    match cli.command {
        Commands::Browse {
            limit,
            content_type,
            seasonal_tag,
            sort_by,
            categories,
        } => {
            let options = BrowseOptions {
                limit: Some(limit),
                content_type,
                seasonal_tag,
                sort_by,
                categories,
                ..Default::default()
            };
            print_json(&client.browse(&options).await?)?;
        }
        Commands::Search {
            query,
            limit,
            content_type,
        } => {
            let options = SearchOptions {
                limit: Some(limit),
                content_type,
                ..Default::default()
            };
            print_json(&client.search(&query, &options).await?)?;
        }
        Commands::Series { series_id } => {
            print_json(&client.get_series_with_seasons(&series_id).await)?;
        }
        Commands::Episodes { season_id } => {
            print_json(&client.get_episodes(&season_id).await?)?;
        }
        Commands::Continue { limit } => {
            print_json(&client.get_continue_watching(limit).await?)?;
        }
        Commands::Recommend { seed, limit } => {
            print_json(&client.get_recommendations(seed.as_deref(), limit).await?)?;
        }
        Commands::Home { limit, seasonal_tag } => {
            let options = HomeOptions { limit, seasonal_tag };
            print_json(&client.get_home_data(&options).await)?;
        }
        Commands::Watchlist { limit } => {
            let options = WatchlistOptions {
                limit,
                ..Default::default()
            };
            print_json(&client.get_watchlist(&options).await?)?;
        }
        Commands::Add { content_id } => {
            print_json(&client.add_to_watchlist(&content_id).await)?;
        }
        Commands::Remove { content_id } => {
            print_json(&client.remove_from_watchlist(&content_id).await)?;
        }
        Commands::Rating {
            content_type,
            content_id,
        } => {
            print_json(&client.get_user_rating(content_type, &content_id).await?)?;
        }
        Commands::Rate {
            content_type,
            content_id,
            rating,
        } => {
            print_json(&client.update_user_rating(content_type, &content_id, &rating).await)?;
        }
        Commands::Stream { content_id } => {
            print_json(&client.get_playback_stream(&content_id).await?)?;
        }
        Commands::Profile => {
            print_json(&client.get_profile().await?)?;
        }
    }

    Ok(())
}
