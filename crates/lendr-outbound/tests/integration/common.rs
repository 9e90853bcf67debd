//! Shared test helpers for the upload adapters
//!
//! Provides a wiremock-based image host. Each helper mounts the endpoints
//! it needs and returns an uploader pointing at the mock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lendr_core::ports::PhotoUpload;
use lendr_outbound::HttpBlobUploader;

/// Path the mock image host accepts uploads on
pub const UPLOAD_PATH: &str = "/v1_1/demo/image/upload";

/// Starts a mock host and returns an uploader aimed at it
pub async fn setup_image_host() -> (MockServer, HttpBlobUploader) {
    let server = MockServer::start().await;
    let uploader = HttpBlobUploader::new(format!("{}{}", server.uri(), UPLOAD_PATH));
    (server, uploader)
}

/// Mounts a successful upload answering with `body`
pub async fn mount_upload_ok(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A small JPEG-looking payload
pub fn sample_photo() -> PhotoUpload {
    PhotoUpload::new(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
        .with_file_name("drill.jpg")
        .with_content_type("image/jpeg")
}
