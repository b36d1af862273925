//! HTTP surface: public storefront, checkout and the admin panel.

pub mod admin;
pub mod auth;
pub mod error;
pub mod storefront;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use tower_http::services::ServeDir;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::imaging::PUBLIC_PREFIX;
use crate::storage::CatalogStore;
use crate::Config;

pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>, config: Config) -> Self {
        Self { store, config: Arc::new(config) }
    }
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/", get(admin::dashboard))
        .route("/settings/whatsapp", put(admin::update_whatsapp))
        .route("/categories", get(admin::list_categories).post(admin::create_category))
        .route("/categories/:id/toggle", post(admin::toggle_category))
        .route("/categories/:id", axum::routing::delete(admin::delete_category))
        .route("/products", post(admin::create_product))
        .route("/products/:id", get(admin::get_product).put(admin::update_product).delete(admin::delete_product))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/catalog", get(storefront::catalog))
        .route("/api/checkout", get(storefront::checkout))
        .route("/api/whatsapp_link", post(storefront::whatsapp_link))
        .nest("/admin", admin)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&state.config.upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const AUTH: &str = "Basic YWRtaW46YWRtaW4="; // admin:admin
    const BOUNDARY: &str = "storefront-test-boundary";

    async fn store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store.seed(Config::DEFAULT_WHATSAPP).await.unwrap();
        store
    }

    async fn app() -> Router {
        router(AppState::new(Arc::new(store().await), Config::default()))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn json_req(method: &str, uri: &str, body: Value, auth: bool) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
        if auth {
            builder = builder.header(header::AUTHORIZATION, AUTH);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_req(uri: &str, auth: bool) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if auth {
            builder = builder.header(header::AUTHORIZATION, AUTH);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn multipart_req(method: &str, uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, AUTH)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn image_req(method: &str, uri: &str, fields: &[(&str, &str)], filename: &str) -> Request<Body> {
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(12, 8, image::Rgb([10, 120, 200])))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes());
        }
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image_file\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(&png);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, AUTH)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn stored_files(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<_> = match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    fn order(items: Value) -> Value {
        json!({
            "customer_name": "Maria", "address": "Rua A, 10", "phone": "31988887777",
            "payment_method": "Dinheiro", "change_for": "50", "items": items
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app().await, get_req("/health", false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_whatsapp_link() {
        let app = app().await;
        let (status, body) = send(&app, json_req("POST", "/api/whatsapp_link", order(json!([{"qty": 2, "price_cents": 350, "name": "Beer"}])), false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_cents"], 700);
        assert_eq!(body["total"], "R$ 7,00");
        assert!(body["link"].as_str().unwrap().starts_with("https://wa.me/5531999999999?text="));
        assert!(body["message"].as_str().unwrap().contains("Dinheiro (troco para 50)"));
    }

    #[tokio::test]
    async fn test_whatsapp_link_rejections() {
        let app = app().await;
        let (status, body) = send(&app, json_req("POST", "/api/whatsapp_link", order(json!([])), false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Incomplete order data");

        let (status, body) = send(&app, json_req("POST", "/api/whatsapp_link", order(json!([{"qty": 0, "price_cents": 350, "name": "Beer"}])), false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Empty cart");
    }

    #[tokio::test]
    async fn test_whatsapp_link_loose_payload() {
        let app = app().await;
        let mut body = order(json!([{"qty": "2", "price_cents": 350, "name": "Beer"}, {"qty": 1, "price_cents": null, "name": null}]));
        body["change_for"] = Value::Null;
        let (status, resp) = send(&app, json_req("POST", "/api/whatsapp_link", body.clone(), false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["total_cents"], 700);
        assert!(resp["message"].as_str().unwrap().contains("1x Item — R$ 0,00"));

        body["customer_name"] = Value::Null;
        let (status, resp) = send(&app, json_req("POST", "/api/whatsapp_link", body, false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Incomplete order data");

        let mut null_items = order(Value::Null);
        null_items["phone"] = json!(31988887777_i64);
        let (status, resp) = send(&app, json_req("POST", "/api/whatsapp_link", null_items, false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Incomplete order data");

        let (status, resp) = send(&app, json_req("POST", "/api/whatsapp_link", order(json!([{"qty": "two"}])), false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_store_number_without_digits_is_server_error() {
        let store = store().await;
        store.set_setting(crate::storage::WHATSAPP_SETTING, "a definir").await.unwrap();
        let app = router(AppState::new(Arc::new(store), Config::default()));
        let (status, resp) = send(&app, json_req("POST", "/api/whatsapp_link", order(json!([{"qty": 1, "price_cents": 350, "name": "Beer"}])), false)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp["error"].as_str().unwrap().contains("has no digits"));
    }

    #[tokio::test]
    async fn test_product_images_follow_product() {
        let dir = std::env::temp_dir().join(format!("storefront-api-images-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let config = Config { upload_dir: dir.clone(), thumbnail_size: 16, ..Config::default() };
        let app = router(AppState::new(Arc::new(store().await), config));

        let (status, created) = send(&app, image_req("POST", "/admin/products", &[("name", "Skol"), ("price", "4,50"), ("is_active", "on")], "skol.png")).await;
        assert_eq!(status, StatusCode::CREATED);
        let first = created["image_url"].as_str().unwrap().to_string();
        assert!(first.starts_with("/static/uploads/skol_"));
        assert_eq!(stored_files(&dir).len(), 1);

        // Failed writes leave no file behind.
        let (status, _) = send(&app, image_req("PUT", "/admin/products/9999", &[("name", "X"), ("price", "1")], "x.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, image_req("POST", "/admin/products", &[("name", "X"), ("price", "1"), ("category_id", "4242")], "x.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(stored_files(&dir).len(), 1);

        let uri = format!("/admin/products/{}", created["id"]);
        let (status, updated) = send(&app, image_req("PUT", &uri, &[("name", "Skol"), ("price", "4,50")], "skol.png")).await;
        assert_eq!(status, StatusCode::OK);
        let second = updated["image_url"].as_str().unwrap().to_string();
        assert_ne!(second, first);
        assert_eq!(stored_files(&dir), [second.rsplit('/').next().unwrap()]);

        let del = Request::builder().method("DELETE").uri(&uri).header(header::AUTHORIZATION, AUTH).body(Body::empty()).unwrap();
        assert_eq!(send(&app, del).await.0, StatusCode::NO_CONTENT);
        assert!(stored_files(&dir).is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_admin_requires_credentials() {
        let app = app().await;
        let resp = app.clone().oneshot(get_req("/admin", false)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

        let wrong = Request::builder().uri("/admin").header(header::AUTHORIZATION, "Basic YWRtaW46d3Jvbmc=").body(Body::empty()).unwrap();
        assert_eq!(send(&app, wrong).await.0, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, get_req("/admin", true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store_whatsapp"], "5531999999999");
        assert_eq!(body["categories"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_update_store_number() {
        let app = app().await;
        let (status, _) = send(&app, json_req("PUT", "/admin/settings/whatsapp", json!({"store_whatsapp": "abc"}), true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, json_req("PUT", "/admin/settings/whatsapp", json!({"store_whatsapp": "(11) 98888-7777"}), true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store_whatsapp"], "5511988887777");

        let (_, body) = send(&app, get_req("/api/checkout", false)).await;
        assert_eq!(body["store_whatsapp"], "5511988887777");
    }

    #[tokio::test]
    async fn test_product_lifecycle() {
        let app = app().await;
        let (_, cat) = send(&app, json_req("POST", "/admin/categories", json!({"name": "Vinhos", "is_active": true}), true)).await;
        let cat_id = cat["id"].as_i64().unwrap().to_string();

        let (status, created) = send(&app, multipart_req("POST", "/admin/products", &[
            ("name", "Tinto Seco"), ("price", "R$ 49,90"), ("is_active", "on"),
            ("is_promo", "on"), ("promo_price", "39,90"), ("category_id", cat_id.as_str()),
        ])).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["effective_price"], "R$ 39,90");
        assert_eq!(created["category"], "Vinhos");
        let uri = format!("/admin/products/{}", created["id"]);

        let (_, page) = send(&app, get_req("/api/catalog", false)).await;
        assert_eq!(page["catalog"]["Vinhos"][0]["name"], "Tinto Seco");

        let (status, updated) = send(&app, multipart_req("PUT", &uri, &[("name", "Tinto Seco"), ("price", "45"), ("is_active", "on")])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["is_promo"], false);
        assert_eq!(updated["effective_price_cents"], 4500);
        assert_eq!(updated["category"], "Outros");

        let (status, _) = send(&app, multipart_req("PUT", &uri, &[("name", "Tinto"), ("price", "abc")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let del = Request::builder().method("DELETE").uri(&uri).header(header::AUTHORIZATION, AUTH).body(Body::empty()).unwrap();
        assert_eq!(send(&app, del).await.0, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, get_req(&uri, true)).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inactive_products_hidden_from_catalog() {
        let app = app().await;
        send(&app, multipart_req("POST", "/admin/products", &[("name", "Oculto"), ("price", "10")])).await;
        send(&app, multipart_req("POST", "/admin/products", &[("name", "Visivel"), ("price", "10"), ("is_active", "on")])).await;

        let (_, page) = send(&app, get_req("/api/catalog", false)).await;
        let outros = page["catalog"]["Outros"].as_array().unwrap();
        assert_eq!(outros.len(), 1);
        assert_eq!(outros[0]["name"], "Visivel");

        let (_, dash) = send(&app, get_req("/admin", true)).await;
        let names: Vec<_> = dash["products"].as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap().to_string()).collect();
        assert_eq!(names, ["Visivel", "Oculto"]);
    }

    #[tokio::test]
    async fn test_category_admin() {
        let app = app().await;
        let (status, _) = send(&app, json_req("POST", "/admin/categories", json!({"name": "Cervejas", "is_active": true}), true)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, json_req("POST", "/admin/categories", json!({"name": " "}), true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, cats) = send(&app, get_req("/admin/categories", true)).await;
        let id = cats[0]["id"].as_i64().unwrap();
        let toggle = Request::builder().method("POST").uri(format!("/admin/categories/{id}/toggle")).header(header::AUTHORIZATION, AUTH).body(Body::empty()).unwrap();
        let (status, toggled) = send(&app, toggle).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["is_active"], false);

        let del = Request::builder().method("DELETE").uri("/admin/categories/9999").header(header::AUTHORIZATION, AUTH).body(Body::empty()).unwrap();
        assert_eq!(send(&app, del).await.0, StatusCode::NOT_FOUND);
    }
}
