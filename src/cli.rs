//! Command-line surface over the commands module.

use crate::commands::{self, AppState, ReviewerUpdate};
use crate::database::{NewReviewer, Review, ReviewField};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "foodie-map")]
#[command(about = "Curate reviewers, their videos and the restaurants they review")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to config.yaml in the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file
    #[arg(long, global = true, env = "FOODIE_MAP_DB")]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage reviewers
    Reviewers {
        #[command(subcommand)]
        command: ReviewerCommands,
    },

    /// Manage videos and their reviews
    Videos {
        #[command(subcommand)]
        command: VideoCommands,
    },

    /// Manage restaurants
    Restaurants {
        #[command(subcommand)]
        command: RestaurantCommands,
    },

    /// Show database, API key and error status
    Diagnostics {
        /// Clear the error log afterwards
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
pub enum ReviewerCommands {
    /// List reviewers
    List {
        /// Channel-name prefix
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Add a reviewer
    Add {
        /// Channel display name
        name: String,
        /// Channel URL
        url: String,
        /// Canonical channel id, if already known
        #[arg(long)]
        channel_id: Option<String>,
        #[arg(long, default_value = "")]
        avatar: String,
    },
    /// Update reviewer fields
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Delete a reviewer (videos are kept)
    Delete { id: String },
    /// Resolve a reviewer's channel id, or a bare URL with --url
    Resolve {
        /// Reviewer id
        #[arg(required_unless_present = "url")]
        id: Option<String>,
        /// Resolve this URL without a stored reviewer
        #[arg(long, conflicts_with = "id")]
        url: Option<String>,
    },
    /// Fetch the reviewer's latest video
    Fetch { id: String },
    /// Fetch the latest video of a channel URL before adding its reviewer
    Preview { url: String },
}

#[derive(Subcommand)]
pub enum VideoCommands {
    /// List videos, newest first
    List {
        /// Title substring
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show a video with its reviews
    Show { id: String },
    /// Add a review to a video and publish it to restaurants
    AddReview {
        video_id: String,
        /// Restaurant name
        #[arg(long)]
        name: String,
        #[arg(long)]
        place_id: Option<String>,
        /// Timestamp in the video where the restaurant appears
        #[arg(long)]
        second: Option<String>,
        /// Extra fields as field=value (e.g. tripAdvisorLink=https://...)
        #[arg(long = "set", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
        /// Fill restaurant details from the places API
        #[arg(long)]
        enrich: bool,
    },
    /// Remove a video
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum RestaurantCommands {
    /// List restaurants
    List {
        /// Name substring
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Update restaurant fields; an empty value clears a field
    Update {
        id: String,
        #[arg(long = "set", value_parser = parse_key_val, required = true)]
        fields: Vec<(String, String)>,
    },
    /// Delete a restaurant
    Delete { id: String },
    /// Re-fetch details from the places API
    Refresh { id: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn dispatch(state: &AppState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Reviewers { command } => reviewers(state, command).await,
        Commands::Videos { command } => videos(state, command).await,
        Commands::Restaurants { command } => restaurants(state, command).await,
        Commands::Diagnostics { clear } => {
            print_json(&commands::get_diagnostics(state).await?)?;
            if clear {
                commands::clear_errors(state).await?;
            }
            Ok(())
        }
    }
}

async fn reviewers(state: &AppState, command: ReviewerCommands) -> anyhow::Result<()> {
    match command {
        ReviewerCommands::List { search } => {
            print_json(&commands::get_reviewers(state, search).await?)?;
        }
        ReviewerCommands::Add {
            name,
            url,
            channel_id,
            avatar,
        } => {
            let reviewer = commands::create_reviewer(
                state,
                NewReviewer {
                    channel_name: name,
                    web_url: url,
                    channel_id,
                    avatar_url: avatar,
                    last_video_checked: String::new(),
                },
            )
            .await?;
            println!("Created reviewer {} ({})", reviewer.id, reviewer.channel_name);
        }
        ReviewerCommands::Update { id, name, url, avatar } => {
            let update = ReviewerUpdate {
                channel_name: name,
                web_url: url,
                avatar_url: avatar,
            };
            let reviewer = commands::update_reviewer(state, &id, update).await?;
            println!("Updated reviewer {} ({})", reviewer.id, reviewer.channel_name);
        }
        ReviewerCommands::Delete { id } => {
            commands::delete_reviewer(state, &id).await?;
            println!("Deleted reviewer {}", id);
        }
        ReviewerCommands::Resolve { id, url } => match (id, url) {
            (_, Some(url)) => {
                let channel = commands::resolve_channel_for_url(state, &url).await?;
                println!("{} -> {} ({})", url, channel.channel_id, channel.title);
            }
            (Some(id), None) => {
                let reviewer = commands::extract_channel_id(state, &id).await?;
                println!(
                    "Reviewer {} -> channel {}",
                    reviewer.id,
                    reviewer.channel_id.unwrap_or_default()
                );
            }
            (None, None) => anyhow::bail!("either a reviewer id or --url is required"),
        },
        ReviewerCommands::Fetch { id } => match commands::fetch_videos(state, &id).await? {
            Some(outcome) if outcome.created => {
                println!("New video {}: {}", outcome.video.id, outcome.video.title);
            }
            Some(outcome) => {
                println!("Latest video {} already stored", outcome.video.id);
            }
            None => println!("No videos found for reviewer {}", id),
        },
        ReviewerCommands::Preview { url } => match commands::fetch_videos_for_url(state, &url).await? {
            Some(outcome) => print_json(&outcome.video)?,
            None => println!("No videos found for {}", url),
        },
    }
    Ok(())
}

async fn videos(state: &AppState, command: VideoCommands) -> anyhow::Result<()> {
    match command {
        VideoCommands::List { search } => {
            print_json(&commands::get_videos(state, search).await?)?;
        }
        VideoCommands::Show { id } => {
            print_json(&commands::get_video(state, &id).await?)?;
        }
        VideoCommands::AddReview {
            video_id,
            name,
            place_id,
            second,
            fields,
            enrich,
        } => {
            let mut review = Review::named(&name);
            if let Some(place_id) = &place_id {
                review.set_field(ReviewField::GooglePlaceId, place_id.clone());
            }
            if let Some(second) = second {
                review.set_field(ReviewField::SecondOfReview, second);
            }
            for (key, value) in fields {
                let field: ReviewField = key.parse().map_err(anyhow::Error::msg)?;
                review.set_field(field, value);
            }

            if enrich {
                review = match place_id {
                    Some(place_id) => commands::enrich_review(state, review, Some(place_id)).await?,
                    None => commands::find_place_for_review(state, review).await?,
                };
            }

            let report = commands::save_video_reviews(state, &video_id, vec![review]).await?;
            println!(
                "Saved to video {} ({} review(s)); restaurants: {} upserted, {} new, {} skipped",
                report.video_id,
                report.review_count,
                report.publish.upserted,
                report.publish.created,
                report.publish.skipped
            );
        }
        VideoCommands::Remove { id } => {
            let report = commands::remove_video(state, &id).await?;
            if report.stale_backlinks.is_empty() {
                println!("Removed video {} ({} backlink(s) removed)", id, report.backlinks_removed);
            } else {
                println!(
                    "Removed video {}; still linked from: {}",
                    id,
                    report.stale_backlinks.join(", ")
                );
            }
        }
    }
    Ok(())
}

async fn restaurants(state: &AppState, command: RestaurantCommands) -> anyhow::Result<()> {
    match command {
        RestaurantCommands::List { search } => {
            print_json(&commands::get_restaurants(state, search).await?)?;
        }
        RestaurantCommands::Update { id, fields } => {
            let restaurant = commands::update_restaurant(state, &id, fields).await?;
            println!("Updated restaurant {} ({})", restaurant.id, restaurant.info.restaurant_name);
        }
        RestaurantCommands::Delete { id } => {
            commands::delete_restaurant(state, &id).await?;
            println!("Deleted restaurant {}", id);
        }
        RestaurantCommands::Refresh { id } => {
            let restaurant = commands::refresh_restaurant_from_places(state, &id).await?;
            println!(
                "Refreshed restaurant {} ({}): {}",
                restaurant.id, restaurant.info.restaurant_name, restaurant.info.address
            );
        }
    }
    Ok(())
}
