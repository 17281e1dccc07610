//! HTTPクライアントテスト
//!
//! ボディ種別・クエリ・タイムアウト・進捗通知をモックサーバーで検証

use axum::extract::{Multipart, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use layout_validator::api::{ApiClient, Method, MultipartForm, ProgressFn, RequestBody, RequestOptions};
use layout_validator::error::{ValidatorError, MSG_INVALID_DATA};
use layout_validator::upload::UploadFile;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server() -> String {
    let app = Router::new()
        .route("/api/eco", post(|Json(body): Json<Value>| async move { Json(json!({ "eco": body })) }))
        .route(
            "/api/consulta",
            get(|Query(q): Query<HashMap<String, String>>| async move { Json(json!(q)) }),
        )
        .route(
            "/api/lento",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "tarde"
            }),
        )
        .route(
            "/api/invalido",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": [{ "msg": "x" }] }))) }),
        )
        .route(
            "/api/upload",
            post(|mut multipart: Multipart| async move {
                let mut total = 0usize;
                while let Some(field) = multipart.next_field().await.unwrap() {
                    total += field.bytes().await.unwrap().len();
                }
                Json(json!({ "recebido": total }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://127.0.0.1:{}/api", port)
}

/// JSONボディ
#[tokio::test]
async fn test_json_body() {
    let client = ApiClient::new(spawn_server().await, Duration::from_secs(5)).unwrap();
    let response = client
        .request(Method::POST, "/eco", RequestBody::Json(json!({ "a": 1 })), RequestOptions::default())
        .await
        .expect("リクエスト失敗");

    assert_eq!(response.status, 200);
    let body: Value = response.json().expect("JSON解析失敗");
    assert_eq!(body, json!({ "eco": { "a": 1 } }));
}

/// クエリパラメータ
#[tokio::test]
async fn test_query_parameters() {
    let client = ApiClient::new(spawn_server().await, Duration::from_secs(5)).unwrap();
    let options = RequestOptions::default().query("formato", "csv");
    let bytes = client.get_bytes("/consulta", options).await.expect("リクエスト失敗");

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["formato"], "csv");
}

/// リクエスト単位のタイムアウト
#[tokio::test]
async fn test_per_request_timeout() {
    let client = ApiClient::new(spawn_server().await, Duration::from_secs(30)).unwrap();
    let options = RequestOptions {
        timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let err = client.get_bytes("/lento", options).await.unwrap_err();
    assert!(matches!(err, ValidatorError::Transport(_)));
}

/// 422 は書き換え、detail は保持
#[tokio::test]
async fn test_unprocessable_entity() {
    let client = ApiClient::new(spawn_server().await, Duration::from_secs(5)).unwrap();
    let err = client
        .request(Method::POST, "/invalido", RequestBody::Empty, RequestOptions::default())
        .await
        .unwrap_err();

    match err {
        ValidatorError::Server { status, message, detail } => {
            assert_eq!(status, 422);
            assert_eq!(message, MSG_INVALID_DATA);
            assert!(detail.is_some_and(|d| d.contains("msg")));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// アップロード進捗は合計サイズまで届く
#[tokio::test]
async fn test_upload_progress_reaches_total() {
    let client = ApiClient::new(spawn_server().await, Duration::from_secs(5)).unwrap();
    let file = UploadFile::new("dados.txt", vec![b'x'; 200 * 1024]);
    let form = MultipartForm::new().file("data_file", &file).text("max_erros", "100");

    let last = Arc::new(AtomicU64::new(0));
    let seen = last.clone();
    let on_progress: ProgressFn = Arc::new(move |sent, total| {
        assert!(sent <= total);
        seen.store(sent, Ordering::SeqCst);
    });

    let body: Value = client
        .post_multipart("/upload", form, RequestOptions::default().with_progress(Some(on_progress)))
        .await
        .expect("アップロード失敗");

    assert_eq!(last.load(Ordering::SeqCst), 200 * 1024);
    assert_eq!(body["recebido"], json!(200 * 1024 + 3));
}
