#![allow(
    clippy::missing_errors_doc,
    dead_code,
    missing_docs,
    clippy::expect_used
)]
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Context;
use axum::extract::{Form, Multipart, Path, Query};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use reqdoc_core::TestClient;

/// Host shown in generated `curl` commands, independent of the random test port.
pub const CURL_HOST: &str = "http://api.example.com";

const WIDGETS: [(&str, &str); 3] = [("gear", "red"), ("bolt", "blue"), ("spring", "red")];

async fn list_widgets(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let widgets = WIDGETS
        .iter()
        .filter(|(_, color)| query.get("color").is_none_or(|wanted| wanted == color))
        .map(|(name, color)| json!({ "name": name, "color": color }))
        .collect::<Vec<_>>();
    Json(Value::Array(widgets))
}

async fn create_widget(Form(form): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!(form)))
}

async fn delete_widget(Path(_id): Path<u32>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn upload_photo(mut multipart: Multipart) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut fields = serde_json::Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let value = if is_file {
            json!({ "size": data.len() })
        } else {
            json!(String::from_utf8_lossy(&data))
        };
        fields.insert(name, value);
    }
    Ok((StatusCode::CREATED, Json(Value::Object(fields))))
}

fn router() -> Router {
    Router::new()
        .route("/api/widgets", get(list_widgets).post(create_widget))
        .route("/api/widgets/{id}", delete(delete_widget))
        .route("/api/photos", post(upload_photo))
}

#[derive(Debug, derive_more::Deref, derive_more::DerefMut)]
pub struct TestApp {
    #[deref]
    #[deref_mut]
    client: TestClient,
    server: JoinHandle<()>,
}

impl TestApp {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .context("bind test listener")?;
        let addr = listener.local_addr().context("local address")?;
        info!(%addr, "launching server");

        let server = tokio::spawn(async move {
            axum::serve(listener, router())
                .await
                .expect("server launched");
        });

        let client = TestClient::builder()
            .with_port(addr.port())
            .with_base_path("/api")?
            .with_curl_host(CURL_HOST)
            .with_curl_headers_to_filter(["Host"])
            .build()?;

        Ok(Self { client, server })
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}
