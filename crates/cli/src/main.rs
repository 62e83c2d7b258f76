//! Basket Sync CLI - sign in, inspect badge counts and issue cart/wishlist actions.
//!
//! # Usage
//!
//! ```bash
//! # Store a session obtained from the storefront's auth flow
//! bsync login --token "$TOKEN" --user-id 64f0c2
//!
//! # Refresh once and print both counts
//! bsync counts
//!
//! # Keep counts in sync and log every change until Ctrl-C
//! bsync watch
//!
//! # Cart and wishlist actions
//! bsync cart add -p 64f0c2a1 -v 64f0c2a1-red -s M -q 2
//! bsync wishlist move -p 64f0c2a1
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` - Manage the persisted session
//! - `counts` - Refresh and print cart and wishlist counts
//! - `watch` - Run the synchronizer and log count changes
//! - `cart` - List, add, update, remove or clear cart lines
//! - `wishlist` - List, add, remove or move wishlist entries

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use basket_sync::SyncConfig;

mod commands;

use commands::LineArgs;

#[derive(Parser)]
#[command(name = "bsync")]
#[command(author, version, about = "Basket Sync CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a signed-in session
    Login {
        /// Bearer token issued by the auth service
        #[arg(short, long)]
        token: String,

        /// Signed-in user's ID
        #[arg(short, long)]
        user_id: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Refresh and print badge counts
    Counts,
    /// Keep counts in sync and log every change
    Watch,
    /// Cart actions
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Wishlist actions
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines
    List,
    /// Add a line, merging with an existing line of the same key
    Add {
        #[command(flatten)]
        line: LineArgs,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity
    Update {
        #[command(flatten)]
        line: LineArgs,

        /// New quantity
        #[arg(short, long)]
        quantity: u32,
    },
    /// Remove a line
    Remove {
        #[command(flatten)]
        line: LineArgs,
    },
    /// Remove every line
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List wishlist entries
    List,
    /// Add a product
    Add {
        #[command(flatten)]
        line: LineArgs,
    },
    /// Remove a product
    Remove {
        /// Product ID
        #[arg(short, long)]
        product: String,
    },
    /// Move one entry into the cart
    Move {
        #[command(flatten)]
        line: LineArgs,
    },
    /// Move several entries into the cart
    BulkMove {
        /// Product IDs
        #[arg(required = true)]
        products: Vec<String>,
    },
}

/// Log filter used when `RUST_LOG` is not set.
const LOG_FILTER: &str = "basket_sync=info,bsync=info";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            basket_sync::telemetry::init_tracing(LOG_FILTER);
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    let sentry = basket_sync::telemetry::init(&config, LOG_FILTER);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        // Flush Sentry before exiting
        drop(sentry);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let context = commands::Context::load(config)?;

    match cli.command {
        Commands::Login {
            token,
            user_id,
            name,
            phone,
        } => commands::session::login(&context, token, user_id, name, phone)?,
        Commands::Logout => commands::session::logout(&context)?,
        Commands::Counts => commands::counts::show(&context).await?,
        Commands::Watch => commands::counts::watch(&context).await?,
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(&context).await?,
            CartAction::Add { line, quantity } => {
                commands::cart::add(&context, &line, quantity).await?;
            }
            CartAction::Update { line, quantity } => {
                commands::cart::update(&context, &line, quantity).await?;
            }
            CartAction::Remove { line } => commands::cart::remove(&context, &line).await?,
            CartAction::Clear => commands::cart::clear(&context).await?,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(&context).await?,
            WishlistAction::Add { line } => commands::wishlist::add(&context, &line).await?,
            WishlistAction::Remove { product } => {
                commands::wishlist::remove(&context, product).await?;
            }
            WishlistAction::Move { line } => commands::wishlist::move_to_cart(&context, &line).await?,
            WishlistAction::BulkMove { products } => {
                commands::wishlist::bulk_move(&context, products).await?;
            }
        },
    }
    Ok(())
}
