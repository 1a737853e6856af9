//! Wiremock helpers for the releases API and artifact downloads

use keel_matrix::upstream::UpstreamRelease;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the releases listing for the `acme/db` fixture repository
pub const RELEASES_PATH: &str = "/repos/acme/db/releases";

/// Serve one page of the releases listing
pub async fn mock_releases_page(server: &MockServer, page: u32, releases: &[UpstreamRelease]) {
    Mock::given(method("GET"))
        .and(path(RELEASES_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(releases))
        .mount(server)
        .await;
}

/// Answer every listing request with `status`
pub async fn mock_releases_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(RELEASES_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Serve an artifact body at `file_path`, expecting exactly `hits` requests
pub async fn mock_artifact(server: &MockServer, file_path: &str, body: &[u8], hits: u64) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(hits)
        .mount(server)
        .await;
}
