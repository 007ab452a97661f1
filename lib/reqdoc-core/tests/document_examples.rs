#![allow(missing_docs, clippy::expect_used, clippy::indexing_slicing)]

use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use reqdoc_core::{
    DocumentationMetadata, Headers, MultipartForm, RequestParams, TestClient, TestClientError,
    TransportError, UPLOADED_DATA_PLACEHOLDER,
};
use rstest::rstest;
use serde_json::{Value, json};
use tracing::info;

mod common;
pub use self::common::*;

#[rstest]
#[tokio::test]
async fn should_document_get_with_query(#[future] app: TestApp) -> anyhow::Result<()> {
    let mut app = app.await;
    let mut metadata = DocumentationMetadata::documented();

    let response = app
        .get(
            &mut metadata,
            "/widgets",
            RequestParams::form_pairs([("color", "red")]),
            Headers::new(),
        )
        .await?;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(app.query_string()?, "color=red");
    assert_eq!(app.response_content_type()?, Some("application/json"));

    let [example] = metadata.requests.as_slice() else {
        anyhow::bail!("one example expected, got {:?}", metadata.requests);
    };
    info!(?example, "documented");
    assert_eq!(example.request_method, "GET");
    assert_eq!(example.request_path, "/widgets");
    assert_eq!(example.request_body, None);
    assert_eq!(
        example.request_query_parameters.get("color").map(String::as_str),
        Some("red")
    );
    assert_eq!(example.response_status, 200);
    assert_eq!(example.response_status_text.as_deref(), Some("OK"));
    insta::assert_snapshot!(
        example.curl,
        @r#"curl -g "http://api.example.com/api/widgets?color=red" -X GET"#
    );

    let body = serde_json::from_str::<Value>(example.response_body.as_deref().unwrap_or("null"))?;
    assert_eq!(
        body,
        json!([
            { "name": "gear", "color": "red" },
            { "name": "spring", "color": "red" },
        ])
    );

    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_document_form_post(#[future] app: TestApp) -> anyhow::Result<()> {
    let mut app = app.await;
    let mut metadata = DocumentationMetadata::documented();

    app.post(
        &mut metadata,
        "/widgets",
        RequestParams::form_pairs([("name", "cog"), ("color", "green")]),
        Headers::new(),
    )
    .await?;

    assert_eq!(app.status()?.as_u16(), 201);
    let example = &metadata.requests[0];
    assert_eq!(example.request_body.as_deref(), Some("name=cog&color=green"));
    assert_eq!(
        example.request_content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(example.response_status_text.as_deref(), Some("Created"));
    assert_eq!(
        example.curl,
        concat!(
            r#"curl "http://api.example.com/api/widgets" -d 'name=cog&color=green' -X POST "#,
            "\\\n\t-H \"Content-Type: application/x-www-form-urlencoded\"",
        )
    );

    let body = serde_json::from_str::<Value>(example.response_body.as_deref().unwrap_or("null"))?;
    assert_eq!(body, json!({ "name": "cog", "color": "green" }));

    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_redact_uploaded_file(#[future] app: TestApp) -> anyhow::Result<()> {
    let mut app = app.await;
    let mut metadata = DocumentationMetadata::documented();
    let photo = b"\x89PNG\r\n\x1a\n very secret pixels".to_vec();
    let form = MultipartForm::new()
        .text("title", "Holiday")
        .file("photo", "beach.png", "image/png", photo.clone());

    app.post(&mut metadata, "/photos", form.into(), Headers::new())
        .await?;

    // the server received the unredacted bytes
    let received = serde_json::from_str::<Value>(&app.response_body()?)?;
    assert_eq!(
        received,
        json!({ "title": "Holiday", "photo": { "size": photo.len() } })
    );
    let sent = app.last_request().map(|request| request.body().len());
    assert!(sent.is_some_and(|len| len > photo.len()));

    let example = &metadata.requests[0];
    let body = example.request_body.as_deref().unwrap_or_default();
    assert!(body.contains(UPLOADED_DATA_PLACEHOLDER));
    assert!(!body.contains("very secret pixels"));
    assert!(body.contains("filename=\"beach.png\""));
    assert!(body.contains("Holiday"));

    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_document_delete_without_bodies(#[future] app: TestApp) -> anyhow::Result<()> {
    let mut app = app.await;
    let mut metadata = DocumentationMetadata::documented();

    app.delete(&mut metadata, "/widgets/1", RequestParams::None, Headers::new())
        .await?;

    let example = &metadata.requests[0];
    assert_eq!(example.request_method, "DELETE");
    assert_eq!(example.request_body, None);
    assert_eq!(example.response_body, None);
    assert_eq!(example.response_status, 204);
    assert_eq!(example.response_status_text.as_deref(), Some("No Content"));
    insta::assert_snapshot!(
        example.curl,
        @r#"curl "http://api.example.com/api/widgets/1" -X DELETE"#
    );

    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_skip_documentation_without_flag(#[future] app: TestApp) -> anyhow::Result<()> {
    let mut app = app.await;
    let mut metadata = DocumentationMetadata::default();

    app.get(&mut metadata, "/widgets", RequestParams::None, Headers::new())
        .await?;

    assert_eq!(app.status()?.as_u16(), 200);
    assert!(metadata.requests.is_empty());

    Ok(())
}

#[rstest]
#[tokio::test]
async fn should_overwrite_captures_between_calls(#[future] app: TestApp) -> anyhow::Result<()> {
    let mut app = app.await;
    let mut metadata = DocumentationMetadata::documented();

    app.get(
        &mut metadata,
        "/widgets",
        RequestParams::form_pairs([("color", "blue")]),
        Headers::new(),
    )
    .await?;
    app.delete(&mut metadata, "/widgets/2", RequestParams::None, Headers::new())
        .await?;

    assert_eq!(app.status()?.as_u16(), 204);
    assert_eq!(app.query_string()?, "");
    let documented = metadata
        .requests
        .iter()
        .map(|example| format!("{} {}", example.request_method, example.response_status))
        .collect::<Vec<_>>();
    assert_eq!(documented, vec!["GET 200", "DELETE 204"]);

    Ok(())
}

#[tokio::test]
async fn should_surface_connection_failure() -> anyhow::Result<()> {
    init_tracing();
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let mut client = TestClient::builder().with_port(port).build()?;
    let error = client
        .request(
            http::Method::GET,
            "/widgets",
            RequestParams::None,
            Headers::new(),
        )
        .await
        .expect_err("nobody listens on that port");

    assert!(matches!(
        error,
        TestClientError::Transport(TransportError::Reqwest(_))
    ));
    assert!(client.last_request().is_some());
    assert!(matches!(client.status(), Err(TestClientError::NoCapture)));

    Ok(())
}
