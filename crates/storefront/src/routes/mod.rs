//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (product grid)
//! GET  /health                 - Health check (wired in main)
//!
//! # Products
//! GET  /products/{id}          - Product detail with add-to-cart form
//!
//! # Cart
//! GET  /cart                   - Cart page (requires auth)
//! POST /cart/add               - Add product / bump quantity
//! POST /cart/remove            - Remove one row
//! GET  /cart/count             - Cart count badge (fragment)
//! POST /cart/checkout          - Place the order, then redirect to /orders
//!
//! # Orders (requires auth)
//! GET  /orders                 - Order history
//! GET  /orders/{id}            - Order detail with its lines
//!
//! # Auth (anonymous-gated pages)
//! GET  /login                  - Login page
//! POST /login                  - Login action
//! GET  /register               - Register page
//! POST /register               - Register action
//! POST /logout                 - Logout action
//!
//! # Admin (role-gated)
//! GET  /admin                  - Dashboard with store counts
//!
//! # Errors
//! GET  /403                    - Forbidden page (admin guard redirects here)
//! *                            - 404 fallback
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod errors;
pub mod home;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
///
/// These live at the top level (`/login`, not `/auth/login`) because the
/// guards redirect there.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .route("/checkout", post(cart::checkout))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/", get(admin::dashboard))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Product routes
        .nest("/products", product_routes())
        // Cart routes
        .nest("/cart", cart_routes())
        // Order routes
        .nest("/orders", order_routes())
        // Admin routes
        .nest("/admin", admin_routes())
        // Auth routes
        .merge(auth_routes())
        // Error pages
        .route("/403", get(errors::forbidden))
        .fallback(errors::not_found)
}
