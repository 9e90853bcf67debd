//! Integration tests for HttpBlobUploader against a mock image host

use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use lendr_core::ports::IBlobStore;
use lendr_outbound::OutboundError;

use crate::common::{self, UPLOAD_PATH};

#[tokio::test]
async fn test_upload_returns_secure_url() {
    let (server, uploader) = common::setup_image_host().await;
    common::mount_upload_ok(
        &server,
        serde_json::json!({
            "secure_url": "https://img.example.com/demo/drill.jpg",
            "url": "http://img.example.com/demo/drill.jpg"
        }),
    )
    .await;

    let url = uploader.upload(&common::sample_photo()).await.unwrap();
    assert_eq!(url, "https://img.example.com/demo/drill.jpg");
}

#[tokio::test]
async fn test_upload_falls_back_to_plain_url() {
    let (server, uploader) = common::setup_image_host().await;
    common::mount_upload_ok(
        &server,
        serde_json::json!({ "url": "http://img.example.com/demo/drill.jpg" }),
    )
    .await;

    let url = uploader.upload_photo(&common::sample_photo()).await.unwrap();
    assert_eq!(url, "http://img.example.com/demo/drill.jpg");
}

#[tokio::test]
async fn test_upload_sends_file_and_preset() {
    let (server, uploader) = common::setup_image_host().await;
    let uploader = uploader.with_upload_preset("lendr_unsigned");

    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("name=\"upload_preset\""))
        .and(body_string_contains("lendr_unsigned"))
        .and(body_string_contains("name=\"file\"; filename=\"drill.jpg\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secure_url": "https://img.example.com/demo/drill.jpg"
        })))
        .expect(1)
        .mount(&server)
        .await;

    uploader.upload_photo(&common::sample_photo()).await.unwrap();
}

#[tokio::test]
async fn test_rejected_upload_reports_status() {
    let (server, uploader) = common::setup_image_host().await;

    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Upload preset not found"))
        .mount(&server)
        .await;

    let err = uploader
        .upload_photo(&common::sample_photo())
        .await
        .unwrap_err();
    match err {
        OutboundError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Upload preset not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_response_without_url_is_invalid() {
    let (server, uploader) = common::setup_image_host().await;
    common::mount_upload_ok(&server, serde_json::json!({ "public_id": "demo/drill" })).await;

    let err = uploader
        .upload_photo(&common::sample_photo())
        .await
        .unwrap_err();
    assert!(matches!(err, OutboundError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_host_times_out() {
    let (server, uploader) = common::setup_image_host().await;
    let uploader = uploader.with_timeout(Duration::from_millis(100));

    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(serde_json::json!({ "secure_url": "https://late" })),
        )
        .mount(&server)
        .await;

    let err = uploader
        .upload_photo(&common::sample_photo())
        .await
        .unwrap_err();
    assert!(matches!(err, OutboundError::NetworkError(_)));
}
