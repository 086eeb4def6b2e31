//! Cart commands: drive a shopper cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of product 12, variant 1 option 3, at $19.99
//! sf-cli cart add -p 12 --price 19.99 -q 2 -v 1:3
//!
//! # Show the cart as customer 42
//! sf-cli cart --customer 42 show
//!
//! # Log in as customer 42 and adopt their remote cart
//! sf-cli cart login 42
//! ```
//!
//! Each invocation mounts the cart from `SHOPFRONT_CART_DIR`, runs one
//! operation and then tries to deliver queued remote writes. Writes that
//! cannot be delivered stay in the outbox for the next invocation.
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_API_URL` - Base URL of the storefront cart API
//! - `SHOPFRONT_CART_DIR` - Local cart directory (default: .shopfront)

use std::sync::Arc;

use rust_decimal::Decimal;

use shopfront_cart::{
    CartSync, CartSyncConfig, FileCartStore, HttpCartClient, LocalCartStore, RefreshOutcome,
    RemoteCartStore, Result,
};
use shopfront_core::{
    CartItem, CurrencyCode, CustomerId, OptionId, Price, ProductId, QuantityChange, VariantChoice,
    VariantId, VariantSelection,
};

/// A line to add, as given on the command line.
pub struct NewLine {
    pub product: ProductId,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub quantity: u32,
    pub variants: Vec<VariantChoice>,
}

/// One cart operation.
pub enum CartCommand {
    /// Show the cart.
    Show,
    /// Add a line, merging it into a matching one.
    Add(NewLine),
    /// Remove every line for a product and variant set.
    Remove {
        product: ProductId,
        variants: Vec<VariantChoice>,
    },
    /// Set the quantity of a line; zero removes it.
    Update {
        product: ProductId,
        variants: Vec<VariantChoice>,
        quantity: u32,
    },
    /// Empty the cart.
    Clear,
    /// Re-read the remote cart.
    Refresh,
    /// Switch from the guest cart to a customer's cart.
    Login(CustomerId),
    /// Switch from the customer's cart back to the guest cart.
    Logout,
    /// List remote writes that have not been delivered.
    Pending,
}

impl CartCommand {
    /// Identity to mount before running: login always starts from the guest session.
    const fn mount_as(&self, customer: Option<CustomerId>) -> Option<CustomerId> {
        match self {
            Self::Login(_) => None,
            _ => customer,
        }
    }
}

/// Parse a `variant:option` pair such as `1:3`.
///
/// # Errors
///
/// Returns a message if the value is not two integers separated by `:`.
pub fn parse_variant_choice(value: &str) -> std::result::Result<VariantChoice, String> {
    let (variant, option) = value
        .split_once(':')
        .ok_or_else(|| format!("expected VARIANT:OPTION, got '{value}'"))?;
    let variant = variant
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid variant id '{variant}': {e}"))?;
    let option = option
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid option id '{option}': {e}"))?;
    Ok(VariantChoice::new(VariantId::new(variant), OptionId::new(option)))
}

/// Run `command` against the cart in `SHOPFRONT_CART_DIR`, synced with `SHOPFRONT_API_URL`.
///
/// # Errors
///
/// Returns `SyncError` if the configuration is invalid, the cart cannot be
/// mounted or the command is rejected.
pub async fn run(customer: Option<CustomerId>, command: CartCommand) -> Result<()> {
    let config = CartSyncConfig::from_env()?;
    let local = Arc::new(FileCartStore::open(&config.cart_dir)?);
    let remote = Arc::new(HttpCartClient::from_config(&config)?);
    execute(local, remote, customer, command).await?;
    Ok(())
}

/// Mount the cart, apply `command`, deliver queued writes and print the result.
///
/// Returns the cart as it stands afterwards.
///
/// # Errors
///
/// Returns `SyncError` if the cart cannot be mounted, a new line has a zero
/// quantity or an update names a line the cart does not have.
pub async fn execute<L, R>(
    local: Arc<L>,
    remote: Arc<R>,
    customer: Option<CustomerId>,
    command: CartCommand,
) -> Result<CartSync<L, R>>
where
    L: LocalCartStore,
    R: RemoteCartStore,
{
    let mut cart = CartSync::mount(local, remote, command.mount_as(customer)).await?;

    match command {
        CartCommand::Show => {}
        CartCommand::Add(line) => {
            let item = CartItem::new(
                line.product,
                VariantSelection::new(line.variants),
                Price::new(line.price, line.currency),
                line.quantity,
            )?;
            let added = cart.add_item(item);
            tracing::info!(line_key = %added.line_key, quantity = added.quantity, "Line added");
        }
        CartCommand::Remove { product, variants } => {
            let removed = cart.remove_item(product, &VariantSelection::new(variants));
            if removed.is_empty() {
                tracing::warn!(product_id = %product, "No matching line");
            }
        }
        CartCommand::Update {
            product,
            variants,
            quantity,
        } => match cart.update_quantity(product, &VariantSelection::new(variants), quantity)? {
            QuantityChange::Updated(line) => {
                tracing::info!(quantity = line.quantity, "Quantity updated");
            }
            QuantityChange::Removed(_) => tracing::info!("Line removed"),
        },
        CartCommand::Clear => cart.clear_cart(),
        CartCommand::Refresh => print_outcome(cart.refresh_cart().await),
        CartCommand::Login(id) => print_outcome(cart.login(id).await),
        CartCommand::Logout => print_outcome(cart.logout().await),
        CartCommand::Pending => {
            cart.flush().await;
            print_pending(&cart);
            return Ok(cart);
        }
    }

    let report = cart.flush().await;
    if let Some(error) = &report.failure {
        tracing::warn!(
            remaining = report.remaining,
            "Remote writes not delivered: {error}"
        );
    }
    print_cart(&cart);
    Ok(cart)
}

fn print_pending<L: LocalCartStore, R: RemoteCartStore>(cart: &CartSync<L, R>) {
    let intents = cart.outbox().snapshot();

    #[allow(clippy::print_stdout)]
    {
        if intents.is_empty() {
            println!("No pending remote writes");
        }
        for intent in intents {
            println!(
                "{}  {}  {:?}  attempts={}{}",
                intent.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
                intent.identity,
                intent.op,
                intent.attempts,
                intent
                    .last_error
                    .map(|e| format!("  last_error={e}"))
                    .unwrap_or_default()
            );
        }
    }
}

fn print_outcome(outcome: RefreshOutcome) {
    let message = match outcome {
        RefreshOutcome::Replaced => "Loaded remote cart",
        RefreshOutcome::RemoteEmpty => "Remote cart empty, kept local cart",
        RefreshOutcome::PendingWrites => "Writes still pending, kept local cart",
        RefreshOutcome::RemoteUnavailable => "Remote cart unavailable, kept local cart",
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{message}");
    }
}

fn print_cart<L: LocalCartStore, R: RemoteCartStore>(cart: &CartSync<L, R>) {
    #[allow(clippy::print_stdout)]
    {
        println!("Cart {} ({} items)", cart.identity(), cart.cart_count());
        for item in cart.items() {
            let variants = item
                .variant_selection
                .choices()
                .iter()
                .map(|c| format!("{}:{}", c.variant_id, c.option_id))
                .collect::<Vec<_>>()
                .join(",");
            println!(
                "  product {} [{}]  {} x {} = {}",
                item.product_id,
                variants,
                item.quantity,
                item.unit_price,
                item.line_total()
            );
        }
        if let Some(subtotal) = cart.subtotal() {
            println!("Subtotal: {subtotal}");
        }
        let pending = cart.pending_writes();
        if pending > 0 {
            println!("Pending remote writes: {pending}");
        }
    }
}
