//! Checkout, order history, payment confirmation, and order admin.

use axum::{body::Bytes, extract::State};
use serde::Deserialize;

use oxytoxin_core::{OrderId, OrderStatus, ProductId, UserId};

use crate::db::orders::{NewOrder, Transition};
use crate::db::{DeliveryRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{DeliverySnapshot, Order};
use crate::response::{ApiJson, ApiPath, ApiResponse};
use crate::services::checkout::{self, CheckoutError, CheckoutLine};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrder {
    /// Lines to buy; the cart is used when absent.
    pub items: Option<Vec<CheckoutLine>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPayment {
    pub order_id: OrderId,
    #[serde(default = "successful")]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_ref: String,
}

const fn successful() -> OrderStatus {
    OrderStatus::Successful
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrder {
    pub status: OrderStatus,
    pub payment_ref: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("Order not found".to_string())
}

fn order_error(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => not_found(),
        other => other.into(),
    }
}

/// Place an order from the given lines or from the cart.
///
/// POST /api/public/orders
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    body: Bytes,
) -> Result<ApiResponse<Order>> {
    // An empty body checks out the cart
    let form: PlaceOrder = if body.iter().all(u8::is_ascii_whitespace) {
        PlaceOrder::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid order body: {e}")))?
    };
    let requested = form.items;
    let from_cart = requested.is_none();
    let lines = requested.unwrap_or_else(|| user.cart.iter().map(CheckoutLine::from).collect());
    if lines.is_empty() {
        return Err(if from_cart {
            AppError::BadRequest("Cart is empty".to_string())
        } else {
            CheckoutError::Empty.into()
        });
    }

    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let catalog = ProductRepository::new(state.pool()).get_many(&ids).await?;
    let (items, total_amount) = checkout::price_order(&lines, &catalog)?;

    let delivery = DeliveryRepository::new(state.pool())
        .get_for_user(user.id)
        .await?
        .as_ref()
        .map(DeliverySnapshot::from);

    let order = OrderRepository::new(state.pool())
        .create(
            &NewOrder {
                user_id: user.id,
                user_email: user.email.clone(),
                items,
                total_amount,
                delivery,
            },
            from_cart,
        )
        .await?;

    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
    tracing::info!(
        order_id = %order.id,
        user_id = %user.id,
        total = %order.total_amount,
        from_cart,
        "Order placed"
    );

    Ok(ApiResponse::created(order).with_message("Order created successfully"))
}

/// The caller's orders, newest first.
///
/// GET /api/public/orders
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// GET /api/public/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = OrderRepository::new(state.pool())
        .get(id, Some(user.id))
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(order))
}

/// Confirm payment for one of the caller's orders.
///
/// POST /api/public/verify-payment
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(form): ApiJson<VerifyPayment>,
) -> Result<ApiResponse<Order>> {
    if form.status != OrderStatus::Successful {
        return Err(AppError::BadRequest(
            "Payment can only be verified as successful".to_string(),
        ));
    }
    let payment_ref = form.payment_ref.trim();
    if payment_ref.is_empty() {
        return Err(AppError::BadRequest("Payment reference is required".to_string()));
    }

    let order = apply_transition(
        &state,
        form.order_id,
        Some(user.id),
        form.status,
        Some(payment_ref),
    )
    .await?;

    Ok(ApiResponse::ok(order).with_message("Payment verified successfully"))
}

// =============================================================================
// Admin
// =============================================================================

/// All orders, newest first.
///
/// GET /api/admin/orders
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool()).list_all().await?;
    Ok(ApiResponse::ok(orders))
}

/// Change an order's status.
///
/// PATCH /api/admin/orders/{id}
pub async fn admin_update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(form): ApiJson<UpdateOrder>,
) -> Result<ApiResponse<Order>> {
    let payment_ref = form
        .payment_ref
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let order = apply_transition(&state, id, None, form.status, payment_ref).await?;
    tracing::info!(order_id = %id, admin_id = %admin.id, status = %order.status, "Order updated");

    Ok(ApiResponse::ok(order).with_message("Order updated successfully"))
}

/// DELETE /api/admin/orders/{id}
pub async fn admin_delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<()>> {
    if !OrderRepository::new(state.pool()).delete(id).await? {
        return Err(not_found());
    }
    tracing::info!(order_id = %id, admin_id = %admin.id, "Order deleted");
    Ok(ApiResponse::message("Order deleted successfully"))
}

// =============================================================================
// Status changes
// =============================================================================

/// Apply a status change and, when it confirms payment, send the emails.
async fn apply_transition(
    state: &AppState,
    id: OrderId,
    owner: Option<UserId>,
    next: OrderStatus,
    payment_ref: Option<&str>,
) -> Result<Order> {
    let transition = OrderRepository::new(state.pool())
        .transition(id, owner, next, payment_ref)
        .await
        .map_err(order_error)?;

    match transition {
        Transition::Applied { order, previous } => {
            if previous.confirms_payment(next) {
                tracing::info!(order_id = %order.id, total = %order.total_amount, "Payment confirmed");
                send_payment_emails(state, &order).await;
            }
            Ok(order)
        }
        Transition::Rejected { current } => Err(AppError::BadRequest(format!(
            "Cannot change order status from {current} to {next}"
        ))),
    }
}

/// Email the customer and the store owner. Failures are logged only.
async fn send_payment_emails(state: &AppState, order: &Order) {
    let customer = match order.user_id {
        Some(user_id) => UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await
            .ok()
            .flatten(),
        None => None,
    };
    let name = customer.as_ref().map_or("Customer", |u| u.name.as_str());

    if let Err(e) = state.email().send_order_confirmation(order, name).await {
        tracing::error!(error = %e, order_id = %order.id, "Failed to send order confirmation");
    }
    if let Err(e) = state.email().send_order_notification(order, name).await {
        tracing::error!(error = %e, order_id = %order.id, "Failed to send owner notification");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_payment_defaults_to_successful() {
        let form: VerifyPayment = serde_json::from_value(serde_json::json!({
            "orderId": 12,
            "paymentRef": "pay_123"
        }))
        .unwrap();
        assert_eq!(form.order_id, OrderId::new(12));
        assert_eq!(form.status, OrderStatus::Successful);
        assert_eq!(form.payment_ref, "pay_123");
    }

    #[test]
    fn test_place_order_items_are_optional() {
        let form: PlaceOrder = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(form.items.is_none());

        let form: PlaceOrder = serde_json::from_value(serde_json::json!({
            "items": [{ "productId": 3, "quantity": 2, "color": "black" }]
        }))
        .unwrap();
        assert_eq!(form.items.unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: std::result::Result<UpdateOrder, _> =
            serde_json::from_value(serde_json::json!({ "status": "refunded" }));
        assert!(result.is_err());
    }
}
