//! Tienda CLI - a terminal storefront.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! tienda products list --search taza
//! tienda products show 12
//!
//! # Fill a cart without an account; it is kept in $TIENDA_DATA_DIR
//! tienda cart add 12 -q 2
//! tienda cart show
//!
//! # Sign in: the local cart is merged into your account's cart
//! tienda login -e ana@example.com
//!
//! # Check out and review orders
//! tienda checkout --address "Av. Siempre Viva 742" --payment paypal
//! tienda orders
//! ```
//!
//! Results go to stdout, notifications and logs to stderr. Any failure exits
//! with status 1.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tienda_core::{CategoryId, PaymentMethod, ProductId};
use tienda_storefront::config::SentryConfig;
use tienda_storefront::{NoticeLog, StorefrontConfig};

mod commands;
mod output;

use commands::CliError;

#[derive(Parser)]
#[command(name = "tienda")]
#[command(author, version, about = "Tienda storefront in your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and merge the local cart into your account
    Login {
        #[arg(short, long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,
    },
    /// View or edit your profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Browse products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// List product categories
    Categories,
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the cart
    Checkout {
        /// Shipping address
        #[arg(short, long)]
        address: String,

        /// Payment method (card, paypal, cash)
        #[arg(short, long, default_value = "card")]
        payment: PaymentMethod,
    },
    /// List your orders
    Orders,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show your profile
    Show,
    /// Update name, phone and address
    Update {
        #[arg(short, long)]
        name: String,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,
    },
    /// Change your password (prompts on stdin)
    Password,
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products, optionally filtered
    List {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long)]
        category: Option<CategoryId>,
    },
    /// Show one product
    Show { id: ProductId },
    /// List featured products
    Featured,
    /// Products related to a product
    Related { id: ProductId },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        product_id: ProductId,

        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Set the quantity of a line
    Update {
        product_id: ProductId,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a product
    Remove { product_id: ProductId },
    /// Empty the cart
    Clear,
    /// Re-read the cart from your account
    Sync,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.environment.clone().map(std::borrow::Cow::Owned),
            sample_rate: config.sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tienda_storefront=info,tienda_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            output::error(&e);
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config.sentry);
    init_tracing();

    let notices = NoticeLog::new();
    let result = run(cli, config, &notices).await;
    output::notices(&notices.drain());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            output::error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: StorefrontConfig, notices: &NoticeLog) -> Result<(), CliError> {
    let mut storefront = commands::open(config, notices)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::account::login(&mut storefront, &email, password).await?;
        }
        Commands::Logout => commands::account::logout(&mut storefront)?,
        Commands::Whoami => commands::account::whoami(&mut storefront).await?,
        Commands::Register {
            name,
            email,
            password,
            phone,
            address,
        } => {
            commands::account::register(
                &mut storefront,
                &name,
                &email,
                password,
                phone.as_deref(),
                address.as_deref(),
            )
            .await?;
        }
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::account::show_profile(&mut storefront).await?,
            ProfileAction::Update {
                name,
                phone,
                address,
            } => {
                commands::account::update_profile(
                    &mut storefront,
                    &name,
                    phone.as_deref(),
                    address.as_deref(),
                )
                .await?;
            }
            ProfileAction::Password => commands::account::change_password(&mut storefront).await?,
        },
        Commands::Products { action } => match action {
            ProductsAction::List { search, category } => {
                commands::catalog::list(&storefront, search.as_deref(), category).await?;
            }
            ProductsAction::Show { id } => commands::catalog::show(&storefront, id).await?,
            ProductsAction::Featured => commands::catalog::featured(&storefront).await?,
            ProductsAction::Related { id } => commands::catalog::related(&storefront, id).await?,
        },
        Commands::Categories => commands::catalog::categories(&storefront).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&mut storefront).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&mut storefront, product_id, quantity).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&mut storefront, product_id, quantity).await?,
            CartAction::Remove { product_id } => {
                commands::cart::remove(&mut storefront, product_id).await?;
            }
            CartAction::Clear => commands::cart::clear(&mut storefront).await?,
            CartAction::Sync => commands::cart::sync(&mut storefront).await?,
        },
        Commands::Checkout { address, payment } => {
            commands::orders::checkout(&mut storefront, &address, payment).await?;
        }
        Commands::Orders => commands::orders::list(&mut storefront).await?,
    }

    Ok(())
}
