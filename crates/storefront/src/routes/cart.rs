//! Cart route handlers.
//!
//! The cart page requires a signed-in shopper. Checkout is a POST that
//! drives the checkout service with the cart rows currently on file and
//! the idempotency token held in the session; the token is only discarded
//! once an order has actually been placed, so resubmitting after a failure
//! or a lost response converges on the same order.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bramble_core::{CartItemId, CheckoutToken, Price, ProductId};

use crate::db::RepositoryError;
use crate::db::cart::CartRepository;
use crate::db::orders::OrderRepository;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{CartItem, session_keys};
use crate::services::checkout::{CheckoutError, CheckoutService, cart_total};
use crate::state::AppState;

// =============================================================================
// Form and Query Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<i32>,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: i32,
}

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub items: Vec<CartItem>,
    pub total: Price,
    pub error: Option<String>,
}

/// Cart count badge fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: i64,
}

/// Map the short error codes carried in the query string to copy.
fn error_message(code: &str) -> String {
    match code {
        "empty" => "Your cart is empty.".to_string(),
        "checkout" => "We could not place your order. Please try again.".to_string(),
        _ => "Something went wrong.".to_string(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<CartShowTemplate> {
    let items = CartRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    let total = cart_total(&items);

    // Mint the idempotency token for the upcoming checkout attempt.
    ensure_checkout_token(&session).await;

    Ok(CartShowTemplate {
        items,
        total,
        error: query.error.as_deref().map(error_message),
    })
}

/// Add a product to the cart (or bump its quantity).
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect> {
    let quantity = form.quantity.unwrap_or(1).max(1);
    CartRepository::new(state.pool())
        .add(user.id, ProductId::new(form.product_id), quantity)
        .await?;

    Ok(Redirect::to("/cart"))
}

/// Remove one row from the cart.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Redirect> {
    match CartRepository::new(state.pool())
        .remove(user.id, CartItemId::new(form.item_id))
        .await
    {
        // Already gone (double click, second tab): nothing to do.
        Ok(()) | Err(RepositoryError::NotFound) => Ok(Redirect::to("/cart")),
        Err(e) => Err(e.into()),
    }
}

/// Get the cart count badge fragment.
#[instrument(skip(state))]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> CartCountTemplate {
    let count = match user {
        Some(user) => CartRepository::new(state.pool())
            .count_for_user(user.id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to count cart items");
                0
            }),
        None => 0,
    };

    CartCountTemplate { count }
}

/// Place the order for the current cart.
#[instrument(skip(state, session))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let items = CartRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    let token = ensure_checkout_token(&session).await;

    let service = CheckoutService::new(OrderRepository::new(state.pool()));
    match service.place_order(user.id, &items, token).await {
        Ok(order) => {
            // The attempt is complete; the next checkout gets a fresh token.
            if let Err(e) = session
                .remove::<CheckoutToken>(session_keys::CHECKOUT_TOKEN)
                .await
            {
                tracing::warn!(error = %e, "failed to drop checkout token from session");
            }
            let order_id = order.id.to_string();
            add_breadcrumb("checkout", "Order placed", Some(&[("order_id", &order_id)]));
            Ok(Redirect::to("/orders").into_response())
        }
        Err(CheckoutError::EmptyCart) => Ok(Redirect::to("/cart?error=empty").into_response()),
        Err(e) => {
            sentry::capture_error(&e);
            tracing::error!(error = %e, "checkout failed");
            // Keep the token: a retry must converge on the same order.
            Ok(Redirect::to("/cart?error=checkout").into_response())
        }
    }
}

/// Return the session's checkout token, minting and storing one if absent.
async fn ensure_checkout_token(session: &Session) -> CheckoutToken {
    if let Ok(Some(token)) = session
        .get::<CheckoutToken>(session_keys::CHECKOUT_TOKEN)
        .await
    {
        return token;
    }

    let token = CheckoutToken::generate();
    if let Err(e) = session.insert(session_keys::CHECKOUT_TOKEN, token).await {
        tracing::warn!(error = %e, "failed to store checkout token in session");
    }
    token
}
