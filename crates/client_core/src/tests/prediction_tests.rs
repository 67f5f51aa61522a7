use super::*;
use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone)]
struct ReceivedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    len: usize,
}

#[derive(Clone)]
enum Reply {
    Json(StatusCode, Value),
    Text(StatusCode, &'static str),
    Delayed(Duration, Value),
}

#[derive(Clone)]
struct ServerState {
    reply: Reply,
    received: Arc<Mutex<Vec<ReceivedPart>>>,
}

async fn handle_predict(State(state): State<ServerState>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let len = field.bytes().await.map(|bytes| bytes.len()).unwrap_or_default();
        state.received.lock().await.push(ReceivedPart {
            name,
            file_name,
            content_type,
            len,
        });
    }

    match state.reply {
        Reply::Json(status, body) => (status, Json(body)).into_response(),
        Reply::Text(status, body) => (status, body).into_response(),
        Reply::Delayed(delay, body) => {
            tokio::time::sleep(delay).await;
            Json(body).into_response()
        }
    }
}

async fn spawn_predict_server(
    route_prefix: &str,
    reply: Reply,
) -> Result<(String, Arc<Mutex<Vec<ReceivedPart>>>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = ServerState {
        reply,
        received: received.clone(),
    };
    let app = Router::new()
        .route(&format!("{route_prefix}/predict"), post(handle_predict))
        .layer(DefaultBodyLimit::disable())
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}{route_prefix}"), received))
}

fn sample_upload(len: usize) -> ImageUpload {
    ImageUpload {
        asset_id: AssetId::new(),
        file_name: "beans.jpg".to_string(),
        media_type: "image/jpeg".to_string(),
        bytes: Arc::from(vec![0xAB; len]),
    }
}

#[tokio::test]
async fn posts_image_as_multipart_file_field() {
    let (base_url, received) =
        spawn_predict_server("", Reply::Json(StatusCode::OK, json!({ "class": 3 })))
            .await
            .expect("spawn server");
    let client = PredictionClient::new(&base_url).expect("client");
    assert_eq!(client.endpoint().path(), "/predict");

    let upload = sample_upload(2 * 1024 * 1024);
    let code = client.submit(&upload).await.expect("prediction");
    assert_eq!(code, 3);

    let parts = received.lock().await.clone();
    assert_eq!(parts.len(), 1, "exactly one multipart part: {parts:?}");
    let part = &parts[0];
    assert_eq!(part.name, "file");
    assert_eq!(part.file_name.as_deref(), Some("beans.jpg"));
    assert_eq!(part.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(part.len, 2 * 1024 * 1024);
}

#[tokio::test]
async fn returns_out_of_range_class_without_validating() {
    let (base_url, _) =
        spawn_predict_server("", Reply::Json(StatusCode::OK, json!({ "class": 9 })))
            .await
            .expect("spawn server");
    let client = PredictionClient::new(&base_url).expect("client");

    let code = client.submit(&sample_upload(64)).await.expect("prediction");
    assert_eq!(code, 9);
}

#[tokio::test]
async fn honours_path_prefix_on_base_url() {
    let (base_url, received) =
        spawn_predict_server("/api", Reply::Json(StatusCode::OK, json!({ "class": 0 })))
            .await
            .expect("spawn server");
    let client = PredictionClient::new(&base_url).expect("client");
    assert_eq!(client.endpoint().path(), "/api/predict");

    let code = client.submit(&sample_upload(16)).await.expect("prediction");
    assert_eq!(code, 0);
    assert_eq!(received.lock().await.len(), 1);
}

#[tokio::test]
async fn non_success_status_is_request_rejected() {
    for status in [
        StatusCode::UNPROCESSABLE_ENTITY,
        StatusCode::INTERNAL_SERVER_ERROR,
    ] {
        let (base_url, _) =
            spawn_predict_server("", Reply::Json(status, json!({ "detail": "boom" })))
                .await
                .expect("spawn server");
        let client = PredictionClient::new(&base_url).expect("client");

        let err = client
            .submit(&sample_upload(16))
            .await
            .expect_err("rejected");
        assert_eq!(
            err,
            PredictionError::RequestRejected {
                status: status.as_u16()
            }
        );
        assert_eq!(err.kind(), shared::error::ErrorKind::RequestRejected);
    }
}

#[tokio::test]
async fn malformed_bodies_are_reported_as_such() {
    let replies = [
        Reply::Text(StatusCode::OK, "not json"),
        Reply::Json(StatusCode::OK, json!({ "label": 2 })),
        Reply::Json(StatusCode::OK, json!({ "class": "2" })),
        Reply::Json(StatusCode::OK, json!({ "class": 2.5 })),
    ];
    for reply in replies {
        let (base_url, _) = spawn_predict_server("", reply).await.expect("spawn server");
        let client = PredictionClient::new(&base_url).expect("client");

        let err = client
            .submit(&sample_upload(16))
            .await
            .expect_err("malformed");
        assert!(
            matches!(err, PredictionError::MalformedResponse { .. }),
            "unexpected error: {err:?}"
        );
    }
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = PredictionClient::new(&format!("http://{addr}")).expect("client");
    let err = client
        .submit(&sample_upload(16))
        .await
        .expect_err("nothing listening");
    assert!(
        matches!(err, PredictionError::Unreachable { .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(
        err.user_message(),
        "Could not connect to the analysis engine. Is the server running?"
    );
}

#[tokio::test]
async fn timeout_is_unreachable() {
    let (base_url, _) = spawn_predict_server(
        "",
        Reply::Delayed(Duration::from_secs(5), json!({ "class": 1 })),
    )
    .await
    .expect("spawn server");
    let client =
        PredictionClient::with_timeout(&base_url, Duration::from_millis(200)).expect("client");

    let err = client
        .submit(&sample_upload(16))
        .await
        .expect_err("timed out");
    assert!(
        matches!(err, PredictionError::Unreachable { .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn predictor_trait_delegates_to_submit() {
    let (base_url, _) =
        spawn_predict_server("", Reply::Json(StatusCode::OK, json!({ "class": 2 })))
            .await
            .expect("spawn server");
    let predictor: Arc<dyn RoastPredictor> =
        Arc::new(PredictionClient::new(&base_url).expect("client"));

    let code = predictor
        .predict(sample_upload(16))
        .await
        .expect("prediction");
    assert_eq!(code, 2);
}

#[test]
fn from_settings_requires_base_url() {
    let err = PredictionClient::from_settings(&ClientSettings::default())
        .err()
        .expect("missing base url");
    assert!(matches!(err, SettingsError::MissingBaseUrl));
}

#[test]
fn zero_timeout_is_rejected_before_any_request() {
    let settings = crate::config::resolve_settings(None, |key| match key {
        "ROASTCHECK_API_BASE_URL" => Some("http://127.0.0.1:8000".to_string()),
        "ROASTCHECK_REQUEST_TIMEOUT_SECS" => Some("0".to_string()),
        _ => None,
    })
    .expect("settings");

    let err = PredictionClient::from_settings(&settings)
        .err()
        .expect("zero timeout");
    assert!(matches!(err, SettingsError::ZeroTimeout));

    let err = PredictionClient::with_timeout("http://127.0.0.1:8000", Duration::ZERO)
        .err()
        .expect("zero timeout");
    assert!(matches!(err, SettingsError::ZeroTimeout));
}

#[tokio::test]
async fn class_beyond_i64_still_reaches_the_catalog() {
    let (base_url, _) = spawn_predict_server(
        "",
        Reply::Text(StatusCode::OK, r#"{"class": 18446744073709551615}"#),
    )
    .await
    .expect("spawn server");
    let client = PredictionClient::new(&base_url).expect("client");

    let code = client
        .submit(&sample_upload(16))
        .await
        .expect("integer class");
    assert_eq!(code, i64::MAX);
    assert!(shared::domain::RoastCatalog::lookup(code).is_err());
}
