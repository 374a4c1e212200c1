mod catalog;
mod config;
mod error;
mod favorites;
mod messages;
mod models;
mod moderation;
mod rentals;
mod store;
mod submission;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use catalog::{format_distance, CatalogEntry, CatalogService, CategoryFilter, ModeFilter, QueryParams, SortBy, Viewer};
use config::Config;
use favorites::{FavoriteSet, FavoritesBackend};
use messages::MessagingService;
use models::{format_condition, format_size, Category, Condition, Coordinates, ListingMode, Size, TrustLevel};
use moderation::GeminiClassifier;
use rentals::{RentalPeriod, RentalPricing, RentalRequest};
use store::RestStore;
use submission::{ImageFile, ImageStatus, ListingDraft, SubmissionSession};

#[derive(Parser)]
#[command(name = "kloset")]
#[command(about = "Modest fashion marketplace: browse, post and save listings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search and sort the public catalog
    Browse {
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value = "all")]
        category: CategoryFilter,
        #[arg(long, default_value = "all")]
        mode: ModeFilter,
        #[arg(long)]
        condition: Option<Condition>,
        #[arg(long)]
        size: Option<Size>,
        /// Lowest daily rate
        #[arg(long)]
        min_price: Option<f64>,
        /// Highest daily rate
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long, default_value = "newest")]
        sort: SortBy,
        #[arg(long, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lng: Option<f64>,
        /// Only listings within this many km of --lat/--lng
        #[arg(long, requires = "lat")]
        radius: Option<f64>,
        /// Signed-in user, for saved state
        #[arg(long)]
        user_id: Option<String>,
        /// Also write the results as JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show one listing with its photos and seller
    Show { listing_id: String },

    /// Price a rental of a listing
    Quote {
        listing_id: String,
        #[arg(long)]
        renter_id: String,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: NaiveDate,
        /// Last day, inclusive
        #[arg(long)]
        to: NaiveDate,
        /// Add the cleaning service
        #[arg(long)]
        cleaning: bool,
    },

    /// Moderate photos and publish a new listing
    Post {
        #[arg(long)]
        owner_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Left empty, the first approved photo suggests one
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        condition: Condition,
        #[arg(long)]
        size: Option<Size>,
        #[arg(long, default_value = "rent")]
        mode: ListingMode,
        /// Daily rate, sale price or deposit depending on mode
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        #[arg(long)]
        location: String,
        #[arg(long, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lng: Option<f64>,
        #[arg(long)]
        no_shipping: bool,
        /// Drop photos that fail moderation instead of aborting
        #[arg(long)]
        drop_rejected: bool,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Save or unsave a listing
    Favorite {
        listing_id: String,
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Show saved listings
    Saved {
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Show conversations and their messages
    Inbox {
        #[arg(long)]
        user_id: String,
    },

    /// Contact a seller or reply in a conversation
    #[command(subcommand)]
    Message(MessageCommand),
}

#[derive(Subcommand)]
enum MessageCommand {
    /// Open (or reuse) a conversation with a listing's seller
    Start {
        listing_id: String,
        #[arg(long)]
        buyer_id: String,
        /// First message to send
        text: Option<String>,
    },

    /// Send a message in an existing conversation
    Send {
        #[arg(long)]
        conversation_id: String,
        #[arg(long)]
        sender_id: String,
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    info!("🧕 Kloset - modest fashion marketplace");
    info!("======================================");

    let config = Config::from_env()?;
    let store = Arc::new(RestStore::from_config(&config).context("Failed to create store client")?);

    match cli.command {
        Commands::Browse {
            query,
            category,
            mode,
            condition,
            size,
            min_price,
            max_price,
            sort,
            lat,
            lng,
            radius,
            user_id,
            out,
        } => {
            let location = lat.zip(lng).map(|(lat, lng)| Coordinates::new(lat, lng));
            if sort == SortBy::Distance && location.is_none() {
                warn!("Sorting by distance without --lat/--lng, order is unchanged");
            }

            let saved = match &user_id {
                Some(_) => None,
                None => Some(
                    FavoriteSet::local(&config.guest_favorites_path)
                        .await?
                        .ids()
                        .clone(),
                ),
            };
            let viewer = Viewer {
                user_id,
                location,
                saved,
            };
            let params = QueryParams {
                query,
                category,
                mode,
                condition,
                size,
                min_price,
                max_price,
                sort_by: sort,
                max_distance_km: radius,
            };

            let entries = CatalogService::new(store)
                .browse(&params, &viewer)
                .await
                .context("Failed to load catalog")?;

            info!("\n✅ Found {} listings\n", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                print_entry(i + 1, entry);
            }

            if let Some(out) = out {
                let json = serde_json::to_string_pretty(&entries)?;
                tokio::fs::write(&out, json).await?;
                info!("💾 Saved results to {}", out.display());
            }
        }

        Commands::Show { listing_id } => {
            let catalog = CatalogService::new(store);
            let Some(listing) = catalog.listing(&listing_id).await? else {
                bail!("Listing {} not found", listing_id);
            };
            let seller = catalog.seller(&listing.owner_id).await?;

            let entry = CatalogEntry {
                mode: listing.mode(),
                listing,
                seller,
                distance_km: None,
                is_saved: false,
            };
            print_entry(1, &entry);
            if let Some(description) = &entry.listing.description {
                println!("   {}", description);
            }
            for (i, url) in entry.listing.photos().iter().enumerate() {
                println!("   📷 {}. {}", i + 1, url);
            }
        }

        Commands::Quote {
            listing_id,
            renter_id,
            from,
            to,
            cleaning,
        } => {
            let Some(listing) = CatalogService::new(store).listing(&listing_id).await? else {
                bail!("Listing {} not found", listing_id);
            };
            let request = RentalRequest {
                renter_id,
                period: RentalPeriod::new(from, to)?,
                add_cleaning: cleaning,
            };
            let pricing = RentalPricing::new(config.cleaning_fee)?;
            let cost = pricing
                .quote(&listing, &request, Utc::now().date_naive())?;

            println!(
                "{}: {} to {} ({} days)",
                listing.title,
                request.period.start(),
                request.period.end(),
                cost.total_days
            );
            println!("   ${} × {} days = ${}", cost.daily_rate, cost.total_days, cost.subtotal);
            println!("   Deposit        ${}", cost.deposit_amount);
            println!("   Cleaning       ${}", cost.cleaning_fee);
            println!("   Service fee    ${}", cost.service_fee);
            println!("   Total          ${}", cost.total_amount);
        }

        Commands::Post {
            owner_id,
            title,
            description,
            category,
            condition,
            size,
            mode,
            price,
            location,
            lat,
            lng,
            no_shipping,
            drop_rejected,
            images,
        } => {
            let mut draft = ListingDraft::new(owner_id);
            draft.title = title;
            draft.description = description;
            draft.category = category;
            draft.condition = Some(condition);
            draft.size = size;
            draft.mode = mode;
            match mode {
                ListingMode::Rent => draft.price_per_day = price,
                ListingMode::Buy => draft.sell_price = Some(price),
                ListingMode::Borrow => draft.deposit_amount = Some(price),
            }
            draft.location = location;
            draft.coordinates = lat.zip(lng).map(|(lat, lng)| Coordinates::new(lat, lng));
            draft.shipping_available = !no_shipping;
            draft.check_price()?;

            let mut files = Vec::with_capacity(images.len());
            for path in &images {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read image {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                files.push(ImageFile::new(name, bytes));
            }

            let classifier = Arc::new(GeminiClassifier::from_config(&config)?);
            let mut session = SubmissionSession::new(draft, classifier, store.clone(), store)
                .with_bucket(config.images_bucket.clone());

            info!("🔍 Analyzing {} images...", files.len());
            session.attach_and_analyze(files).await?;
            for image in session.images() {
                match &image.status {
                    ImageStatus::Approved(a) => println!("   ✅ {} - {}", image.file.file_name, a.reason),
                    ImageStatus::Rejected(a) => println!("   ❌ {} - {}", image.file.file_name, a.reason),
                    ImageStatus::Pending => println!("   ⏳ {}", image.file.file_name),
                }
            }
            if drop_rejected {
                let rejected: Vec<_> = session
                    .images()
                    .iter()
                    .filter(|img| matches!(img.status, ImageStatus::Rejected(_)))
                    .map(|img| img.id)
                    .collect();
                for id in rejected {
                    session.remove_image(id);
                }
            }

            match session.submit().await {
                Ok(submitted) => {
                    info!(
                        "🎉 Listed \"{}\" ({}) with {} photos",
                        submitted.listing.title,
                        submitted.listing.id,
                        submitted.images.len()
                    );
                    if !submitted.skipped.is_empty() {
                        warn!("{} photos could not be uploaded", submitted.skipped.len());
                    }
                }
                Err(e) => bail!(e.user_message()),
            }
        }

        Commands::Favorite {
            listing_id,
            user_id,
        } => {
            let mut favorites = FavoriteSet::load(favorites_backend(&config, store, user_id)).await?;
            if favorites.toggle(&listing_id).await? {
                println!("❤️  Saved {}", listing_id);
            } else {
                println!("Removed {} from saved", listing_id);
            }
        }

        Commands::Saved { user_id } => {
            let favorites = FavoriteSet::load(favorites_backend(&config, store.clone(), user_id)).await?;
            let listings = CatalogService::new(store)
                .saved_listings(&favorites.sorted_ids())
                .await
                .context("Failed to load saved listings")?;

            info!("\n❤️  {} saved listings\n", listings.len());
            for (i, listing) in listings.into_iter().enumerate() {
                let entry = CatalogEntry {
                    mode: listing.mode(),
                    listing,
                    seller: None,
                    distance_km: None,
                    is_saved: true,
                };
                print_entry(i + 1, &entry);
            }
        }

        Commands::Inbox { user_id } => {
            let messaging = MessagingService::new(store);
            let conversations = messaging.conversations_for(&user_id).await?;

            info!("\n✉️  {} conversations\n", conversations.len());
            for conversation in &conversations {
                println!(
                    "With {} (listing {})",
                    conversation.other_participant(&user_id),
                    conversation.listing_id.as_deref().unwrap_or("-")
                );
                for message in messaging.messages(&conversation.id).await? {
                    let who = if message.sender_id == user_id { "you" } else { "them" };
                    println!(
                        "   [{}] {}: {}",
                        message.created_at.format("%Y-%m-%d %H:%M"),
                        who,
                        message.content
                    );
                }
                println!();
            }
        }

        Commands::Message(MessageCommand::Start {
            listing_id,
            buyer_id,
            text,
        }) => {
            let Some(listing) = CatalogService::new(store.clone()).listing(&listing_id).await? else {
                bail!("Listing {} not found", listing_id);
            };
            if listing.owner_id == buyer_id {
                bail!("You cannot message yourself about your own listing");
            }

            let messaging = MessagingService::new(store);
            let conversation = messaging
                .start_conversation(Some(listing.id.as_str()), &buyer_id, &listing.owner_id)
                .await?;
            println!("Conversation {} about \"{}\"", conversation.id, listing.title);
            if let Some(text) = text {
                messaging
                    .send(&conversation.id, &buyer_id, &text)
                    .await?;
                println!("   ✉️  Sent");
            }
        }

        Commands::Message(MessageCommand::Send {
            conversation_id,
            sender_id,
            text,
        }) => {
            let message = MessagingService::new(store)
                .send(&conversation_id, &sender_id, &text)
                .await?;
            println!("✉️  Sent at {}", message.created_at.format("%Y-%m-%d %H:%M"));
        }
    }

    Ok(())
}

fn favorites_backend(config: &Config, store: Arc<RestStore>, user_id: Option<String>) -> FavoritesBackend {
    match user_id {
        Some(user_id) => FavoritesBackend::Remote { store, user_id },
        None => FavoritesBackend::Local {
            path: config.guest_favorites_path.clone(),
        },
    }
}

fn print_entry(position: usize, entry: &CatalogEntry) {
    let listing = &entry.listing;
    let category = listing
        .category
        .parse::<Category>()
        .map(|c| c.display_name().to_string())
        .unwrap_or_else(|_| listing.category.clone());
    let saved = if entry.is_saved { " ❤️" } else { "" };

    println!(
        "{}. {} ({} ${:.2}){}",
        position,
        listing.title,
        entry.mode,
        listing.effective_price(),
        saved
    );
    print!("   {} · {}", category, format_condition(&listing.condition));
    if let Some(size) = &listing.size {
        print!(" · {}", format_size(size));
    }
    println!();
    if let Some(location) = &listing.location {
        match entry.distance_km {
            Some(km) => println!("   {} ({} away)", location, format_distance(km)),
            None => println!("   {}", location),
        }
    }
    if let Some(seller) = &entry.seller {
        match seller.trust_level() {
            TrustLevel::Unverified => println!("   Seller: {}", seller.display_name()),
            level => println!("   Seller: {} ✔ {}", seller.display_name(), level.label()),
        }
    }
    println!("   ID: {}", listing.id);
    println!();
}
