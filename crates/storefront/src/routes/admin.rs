//! Admin dashboard route handler.
//!
//! The whole router is behind [`RequireAdmin`]; nothing here renders for a
//! shopper whose profile does not resolve to a privileged role.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use bramble_core::OrderStatus;

use crate::db::orders::OrderRepository;
use crate::db::products::ProductRepository;
use crate::db::profiles::ProfileRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Store-wide counts shown on the dashboard.
pub struct DashboardStats {
    pub orders: i64,
    pub pending_orders: i64,
    pub products: i64,
    pub shoppers: i64,
}

/// Admin dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub admin: CurrentUser,
    pub stats: DashboardStats,
}

/// Display the admin dashboard.
#[instrument(skip(state, gate))]
pub async fn dashboard(
    State(state): State<AppState>,
    gate: RequireAdmin,
) -> Result<DashboardTemplate> {
    let orders = OrderRepository::new(state.pool());

    let stats = DashboardStats {
        orders: orders.count_all().await?,
        pending_orders: orders.count_with_status(OrderStatus::Pending).await?,
        products: ProductRepository::new(state.pool()).count_all().await?,
        shoppers: ProfileRepository::new(state.pool()).count_all().await?,
    };

    Ok(DashboardTemplate {
        admin: gate.user,
        stats,
    })
}
