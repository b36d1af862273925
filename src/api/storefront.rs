//! Public catalog and checkout routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::error::{ApiError, Result};
use super::AppState;
use crate::domain::aggregates::{build_view, compose_order, group_by_category, Catalog, OrderRequest};
use crate::domain::value_objects::{format_money, WhatsappNumber};
use crate::storage::store_whatsapp;

#[derive(Debug, Serialize)]
pub struct CatalogPage {
    pub store_name: String,
    pub catalog: Catalog,
}

#[derive(Debug, Serialize)]
pub struct CheckoutInfo {
    pub store_name: String,
    pub store_whatsapp: String,
}

#[derive(Debug, Serialize)]
pub struct WhatsappLink {
    pub link: String,
    pub message: String,
    pub total_cents: i64,
    pub total: String,
}

/// Active products grouped by display category.
pub async fn catalog(State(s): State<AppState>) -> Result<Json<CatalogPage>> {
    let rows = s.store.list_products(true).await?;
    let catalog = group_by_category(rows.iter().map(build_view));
    Ok(Json(CatalogPage { store_name: s.config.store_name.clone(), catalog }))
}

pub async fn checkout(State(s): State<AppState>) -> Result<Json<CheckoutInfo>> {
    let store_whatsapp = store_whatsapp(s.store.as_ref(), &s.config.default_whatsapp).await?;
    Ok(Json(CheckoutInfo { store_name: s.config.store_name.clone(), store_whatsapp }))
}

/// Compose the order message and wrap it in a wa.me link for the store number.
pub async fn whatsapp_link(
    State(s): State<AppState>,
    payload: std::result::Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<WhatsappLink>> {
    let Json(order) = payload?;
    let summary = compose_order(&s.config.store_name, &order)?;
    // A stored number without digits is an operator error, not a customer one.
    let stored = store_whatsapp(s.store.as_ref(), &s.config.default_whatsapp).await?;
    let number = WhatsappNumber::parse(&stored)
        .map_err(|_| ApiError::Internal(format!("store WhatsApp number {stored:?} has no digits")))?;
    tracing::info!(items = order.items.len(), total_cents = summary.total_cents, "Built WhatsApp order link");
    Ok(Json(WhatsappLink {
        link: summary.whatsapp_link(&number),
        total: format_money(summary.total_cents),
        total_cents: summary.total_cents,
        message: summary.message,
    }))
}
