//! Admin routes: products, categories and the store contact number.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, Result};
use super::AppState;
use crate::domain::aggregates::{build_view, Category, CategoryForm, NewProduct, ProductForm, ProductView};
use crate::domain::value_objects::WhatsappNumber;
use crate::imaging::{remove_upload, save_upload};
use crate::storage::{store_whatsapp, StoreError, WHATSAPP_SETTING};

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub products: Vec<ProductView>,
    pub categories: Vec<Category>,
    pub store_whatsapp: String,
}

#[derive(Debug, Deserialize)]
pub struct WhatsappForm {
    #[serde(default)]
    pub store_whatsapp: String,
}

/// Uploaded product image.
struct Upload {
    filename: String,
    data: Vec<u8>,
}

/// All products (inactive last), active categories and the store number.
pub async fn dashboard(State(s): State<AppState>) -> Result<Json<Dashboard>> {
    let products = s.store.list_products(false).await?.iter().map(build_view).collect();
    let categories = s.store.list_categories(true).await?;
    let store_whatsapp = store_whatsapp(s.store.as_ref(), &s.config.default_whatsapp).await?;
    Ok(Json(Dashboard { products, categories, store_whatsapp }))
}

pub async fn update_whatsapp(State(s): State<AppState>, Json(form): Json<WhatsappForm>) -> Result<Json<serde_json::Value>> {
    let number = WhatsappNumber::parse(&form.store_whatsapp)?;
    s.store.set_setting(WHATSAPP_SETTING, number.as_str()).await?;
    tracing::info!(number = %number, "Updated store WhatsApp number");
    Ok(Json(serde_json::json!({ "store_whatsapp": number })))
}

// =============================================================================
// Categories
// =============================================================================

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(s.store.list_categories(false).await?))
}

pub async fn create_category(State(s): State<AppState>, Json(form): Json<CategoryForm>) -> Result<(StatusCode, Json<Category>)> {
    let (name, is_active) = form.validate()?;
    let category = s.store.create_category(&name, is_active).await?;
    tracing::info!(category_id = category.id, name = %category.name, "Created category");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn toggle_category(State(s): State<AppState>, Path(id): Path<i64>) -> Result<Json<Category>> {
    let category = s.store.toggle_category(id).await?;
    tracing::info!(category_id = id, is_active = category.is_active, "Toggled category");
    Ok(Json(category))
}

pub async fn delete_category(State(s): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    s.store.delete_category(id).await?;
    tracing::info!(category_id = id, "Deleted category");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

async fn read_product_form(mut multipart: Multipart) -> Result<(ProductForm, Option<Upload>)> {
    let mut fields = HashMap::new();
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image_file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            if !filename.is_empty() && !data.is_empty() {
                upload = Some(Upload { filename, data: data.to_vec() });
            }
        } else {
            let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            fields.insert(name, text);
        }
    }
    let form = ProductForm {
        name: fields.remove("name"),
        description: fields.remove("description"),
        price: fields.remove("price"),
        is_active: fields.remove("is_active"),
        is_promo: fields.remove("is_promo"),
        promo_price: fields.remove("promo_price"),
        category_id: fields.remove("category_id"),
        stock: fields.remove("stock"),
    };
    Ok((form, upload))
}

/// Validate the form and, when an image came along, normalize and store it.
async fn prepare_product(s: &AppState, multipart: Multipart) -> Result<NewProduct> {
    let (form, upload) = read_product_form(multipart).await?;
    let mut product = form.validate()?;
    if let Some(Upload { filename, data }) = upload {
        let dir = s.config.upload_dir.clone();
        let side = s.config.thumbnail_size;
        let url = tokio::task::spawn_blocking(move || save_upload(&dir, &filename, &data, side))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;
        product.image_url = Some(url);
    }
    Ok(product)
}

/// Removes the image stored for this submission when the database write fails.
async fn discard_on_error<T>(s: &AppState, product: &NewProduct, result: std::result::Result<T, StoreError>) -> Result<T> {
    if result.is_err() {
        if let Some(url) = &product.image_url {
            remove_upload(&s.config.upload_dir, url).await;
        }
    }
    Ok(result?)
}

pub async fn create_product(State(s): State<AppState>, multipart: Multipart) -> Result<(StatusCode, Json<ProductView>)> {
    let product = prepare_product(&s, multipart).await?;
    let id = discard_on_error(&s, &product, s.store.create_product(&product).await).await?;
    tracing::info!(product_id = id, name = %product.name, "Created product");
    let row = s.store.get_product(id).await?;
    Ok((StatusCode::CREATED, Json(build_view(&row))))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<i64>) -> Result<Json<ProductView>> {
    Ok(Json(build_view(&s.store.get_product(id).await?)))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<i64>, multipart: Multipart) -> Result<Json<ProductView>> {
    let product = prepare_product(&s, multipart).await?;
    let previous = discard_on_error(&s, &product, s.store.get_product(id).await).await?;
    discard_on_error(&s, &product, s.store.update_product(id, &product).await).await?;
    tracing::info!(product_id = id, image_replaced = product.image_url.is_some(), "Updated product");

    if let (Some(new), Some(old)) = (&product.image_url, &previous.image_url) {
        if new != old {
            remove_upload(&s.config.upload_dir, old).await;
        }
    }
    Ok(Json(build_view(&s.store.get_product(id).await?)))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    let row = s.store.get_product(id).await?;
    s.store.delete_product(id).await?;
    if let Some(url) = &row.image_url {
        remove_upload(&s.config.upload_dir, url).await;
    }
    tracing::info!(product_id = id, "Deleted product");
    Ok(StatusCode::NO_CONTENT)
}
