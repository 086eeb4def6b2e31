//! Shopfront CLI - database migrations and cart tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! sf-cli migrate
//!
//! # Add an item to the local cart and sync it
//! sf-cli cart add -p 12 --price 19.99 -v 1:3
//!
//! # Show the cart for customer 42
//! sf-cli cart --customer 42 show
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart` - Inspect and change a shopper cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use shopfront_core::{CurrencyCode, CustomerId, ProductId, VariantChoice};

mod commands;

use commands::cart::{CartCommand, NewLine, parse_variant_choice};

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Inspect and change the shopper cart
    Cart {
        /// Act as this signed-in customer
        #[arg(short, long, global = true)]
        customer: Option<CustomerId>,

        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add an item
    Add {
        /// Product ID
        #[arg(short, long)]
        product: ProductId,

        /// Unit price, e.g. 19.99
        #[arg(long)]
        price: Decimal,

        /// ISO 4217 currency code
        #[arg(long, default_value = "USD")]
        currency: CurrencyCode,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Variant choice as VARIANT:OPTION, repeatable
        #[arg(short, long = "variant", value_parser = parse_variant_choice)]
        variants: Vec<VariantChoice>,
    },
    /// Remove every line for a product and variant set
    Remove {
        /// Product ID
        #[arg(short, long)]
        product: ProductId,

        /// Variant choice as VARIANT:OPTION, repeatable
        #[arg(short, long = "variant", value_parser = parse_variant_choice)]
        variants: Vec<VariantChoice>,
    },
    /// Set a line's quantity (0 removes it)
    Update {
        /// Product ID
        #[arg(short, long)]
        product: ProductId,

        /// Variant choice as VARIANT:OPTION, repeatable
        #[arg(short, long = "variant", value_parser = parse_variant_choice)]
        variants: Vec<VariantChoice>,

        /// New quantity
        #[arg(short, long)]
        quantity: u32,
    },
    /// Empty the cart
    Clear,
    /// Reload the cart from the storefront
    Refresh,
    /// Switch to a customer's cart
    Login {
        /// Customer ID
        id: CustomerId,
    },
    /// Switch back to the guest cart
    Logout,
    /// List remote writes not yet delivered
    Pending,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Cart { customer, action } => {
            let command = match action {
                CartAction::Show => CartCommand::Show,
                CartAction::Add {
                    product,
                    price,
                    currency,
                    quantity,
                    variants,
                } => CartCommand::Add(NewLine {
                    product,
                    price,
                    currency,
                    quantity,
                    variants,
                }),
                CartAction::Remove { product, variants } => {
                    CartCommand::Remove { product, variants }
                }
                CartAction::Update {
                    product,
                    variants,
                    quantity,
                } => CartCommand::Update {
                    product,
                    variants,
                    quantity,
                },
                CartAction::Clear => CartCommand::Clear,
                CartAction::Refresh => CartCommand::Refresh,
                CartAction::Login { id } => CartCommand::Login(id),
                CartAction::Logout => {
                    if customer.is_none() {
                        return Err("logout requires --customer".into());
                    }
                    CartCommand::Logout
                }
                CartAction::Pending => CartCommand::Pending,
            };
            commands::cart::run(customer, command).await?;
        }
    }
    Ok(())
}
