//! HTTP client for the gallery API and presigned storage urls

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use url::Url;

use super::backend::GalleryBackend;
use crate::capture::CapturedImage;
use crate::domain::{DisplayRecord, ProgressReporter, ResolvedImage, UploadTicket};
use crate::error::FlowError;

/// Bytes handed to the transport per progress update
const UPLOAD_CHUNK: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(endpoint.trim())
            .with_context(|| format!("Invalid API endpoint: {}", endpoint))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("API endpoint cannot be used as a base url: {}", endpoint);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snapbooth/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, base })
    }

    /// `{base}/apis/images/{segments...}`, keeping any path prefix of the base
    fn api_url(&self, segments: &[&str]) -> Result<Url, FlowError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| FlowError::Protocol(format!("bad API base: {}", self.base)))?;
            path.pop_if_empty().extend(["apis", "images"]).extend(segments);
        }
        Ok(url)
    }
}

impl GalleryBackend for ApiClient {
    async fn request_ticket(&self) -> Result<UploadTicket, FlowError> {
        let url = self.api_url(&["upload"])?;
        log::debug!("Requesting upload ticket from {}", url);
        let ticket: UploadTicket = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if ticket.upload_url.trim().is_empty() {
            return Err(FlowError::Protocol("presigned url not available".to_string()));
        }
        if ticket.uuid.trim().is_empty() {
            return Err(FlowError::Protocol("upload ticket without uuid".to_string()));
        }
        log::info!("Fetched upload ticket {}", ticket.uuid);
        Ok(ticket)
    }

    async fn put_image(
        &self,
        ticket: &UploadTicket,
        image: &CapturedImage,
        progress: &ProgressReporter,
    ) -> Result<(), FlowError> {
        let total = image.byte_len() as u64;
        let chunks: Vec<Vec<u8>> = image
            .bytes()
            .chunks(UPLOAD_CHUNK)
            .map(<[u8]>::to_vec)
            .collect();

        let reporter = progress.clone();
        let mut sent = 0u64;
        let body = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            reporter.advance(sent, total);
            Ok::<_, std::io::Error>(chunk)
        });

        log::info!("Uploading {} bytes for {}", total, ticket.uuid);
        let response = self
            .http
            .put(ticket.upload_url.as_str())
            .header(CONTENT_TYPE, image.content_type())
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FlowError::Protocol(format!("upload returned {}", status)));
        }
        log::info!("Image uploaded successfully");
        Ok(())
    }

    async fn fetch_record(&self, uuid: &str) -> Result<DisplayRecord, FlowError> {
        let url = self.api_url(&[uuid])?;
        let record = self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(record)
    }

    async fn preload(&self, url: &str) -> Result<ResolvedImage, FlowError> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec();

        let (bytes, (width, height)) = tokio::task::spawn_blocking(move || {
            let decoded = image::load_from_memory(&bytes)
                .map_err(|e| FlowError::Protocol(format!("result is not an image: {}", e)))?;
            let dimensions = (decoded.width(), decoded.height());
            Ok::<_, FlowError>((bytes, dimensions))
        })
        .await
        .map_err(|e| FlowError::Protocol(format!("decode task failed: {}", e)))??;

        Ok(ResolvedImage {
            url: url.to_string(),
            bytes,
            width,
            height,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::{Path as UrlPath, State};
    use axum::http::HeaderMap;
    use axum::routing::{get, put};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub(crate) struct StoredObject {
        pub content_type: String,
        pub body: Vec<u8>,
    }

    /// In-process stand-in for the gallery API plus its storage bucket.
    /// Uploaded objects are served back as the processed result.
    #[derive(Clone)]
    pub(crate) struct TestServer {
        pub base: String,
        pub put_status: axum::http::StatusCode,
        pub objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    }

    async fn ticket(State(s): State<TestServer>) -> axum::Json<Value> {
        axum::Json(json!({
            "uploadUrl": format!("{}/bucket/abc.png?X-Amz-Expires=300", s.base),
            "uuid": "abc",
        }))
    }

    async fn put_object(
        State(s): State<TestServer>,
        UrlPath(key): UrlPath<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> axum::http::StatusCode {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        s.objects.lock().unwrap().insert(
            key,
            StoredObject {
                content_type,
                body: body.to_vec(),
            },
        );
        s.put_status
    }

    async fn record(State(s): State<TestServer>, UrlPath(uuid): UrlPath<String>) -> axum::Json<Value> {
        let key = format!("{}.png", uuid);
        let ready = s.objects.lock().unwrap().contains_key(&key);
        // Not-ready records carry a null url
        let download_url = if ready {
            Value::String(format!("{}/result/{}", s.base, key))
        } else {
            Value::Null
        };
        axum::Json(json!({ "uuid": uuid, "downloadUrl": download_url }))
    }

    async fn result(
        State(s): State<TestServer>,
        UrlPath(key): UrlPath<String>,
    ) -> Result<Vec<u8>, axum::http::StatusCode> {
        s.objects
            .lock()
            .unwrap()
            .get(&key)
            .map(|o| o.body.clone())
            .ok_or(axum::http::StatusCode::NOT_FOUND)
    }

    async fn broken() -> &'static str {
        "<html>gateway timeout</html>"
    }

    pub(crate) async fn spawn_server(put_status: axum::http::StatusCode) -> TestServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = TestServer {
            base: format!("http://{}", listener.local_addr().unwrap()),
            put_status,
            objects: Arc::default(),
        };
        let app = Router::new()
            .route("/apis/images/upload", get(ticket))
            .route("/apis/images/{uuid}", get(record))
            .route("/bucket/{key}", put(put_object))
            .route("/result/{key}", get(result))
            .route("/broken/apis/images/upload", get(broken))
            .with_state(server.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        server
    }

    pub(crate) fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    pub(crate) fn sample_image() -> CapturedImage {
        // Large enough to span several upload chunks
        let rgba = image::RgbaImage::from_fn(160, 120, |x, y| {
            image::Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8, 255])
        });
        CapturedImage::from_rgba(&rgba).unwrap()
    }

    #[test]
    fn test_api_url_keeps_stage_prefix() {
        let api = client("https://abc.execute-api.us-west-2.amazonaws.com/prod");
        assert_eq!(
            api.api_url(&["upload"]).unwrap().as_str(),
            "https://abc.execute-api.us-west-2.amazonaws.com/prod/apis/images/upload"
        );
        let api = client("https://abc.execute-api.us-west-2.amazonaws.com/prod/");
        assert_eq!(
            api.api_url(&["2024061512-1a2b3c4d"]).unwrap().as_str(),
            "https://abc.execute-api.us-west-2.amazonaws.com/prod/apis/images/2024061512-1a2b3c4d"
        );
    }

    #[test]
    fn test_api_url_escapes_identifier() {
        let api = client("http://localhost:3000");
        assert_eq!(
            api.api_url(&["a b/c"]).unwrap().as_str(),
            "http://localhost:3000/apis/images/a%20b%2Fc"
        );
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(ApiClient::new("mailto:booth@example.com", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_request_ticket() {
        let server = spawn_server(axum::http::StatusCode::OK).await;
        let ticket = client(&server.base).request_ticket().await.unwrap();
        assert_eq!(ticket.uuid, "abc");
        assert!(ticket.upload_url.starts_with(&format!("{}/bucket/", server.base)));
    }

    #[tokio::test]
    async fn test_malformed_ticket_is_protocol_failure() {
        let server = spawn_server(axum::http::StatusCode::OK).await;
        let api = client(&format!("{}/broken", server.base));
        assert!(matches!(
            api.request_ticket().await,
            Err(FlowError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_put_image_sends_png_and_reports_progress() {
        let server = spawn_server(axum::http::StatusCode::OK).await;
        let api = client(&server.base);
        let image = sample_image();
        let progress = ProgressReporter::new();

        let ticket = api.request_ticket().await.unwrap();
        api.put_image(&ticket, &image, &progress).await.unwrap();

        assert!(progress.current().is_complete());
        let objects = server.objects.lock().unwrap();
        let stored = objects.get("abc.png").unwrap();
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.body, image.bytes());
    }

    #[tokio::test]
    async fn test_put_image_non_200_is_protocol_failure() {
        let server = spawn_server(axum::http::StatusCode::FORBIDDEN).await;
        let api = client(&server.base);
        let ticket = api.request_ticket().await.unwrap();
        let err = api
            .put_image(&ticket, &sample_image(), &ProgressReporter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_record_and_preload() {
        let server = spawn_server(axum::http::StatusCode::OK).await;
        let api = client(&server.base);

        let record = api.fetch_record("abc").await.unwrap();
        assert_eq!(record.uuid, "abc");
        assert!(!record.has_download_url());

        let image = sample_image();
        let ticket = api.request_ticket().await.unwrap();
        api.put_image(&ticket, &image, &ProgressReporter::new())
            .await
            .unwrap();

        let record = api.fetch_record("abc").await.unwrap();
        assert!(record.has_download_url());
        let resolved = api.preload(&record.download_url).await.unwrap();
        assert_eq!((resolved.width, resolved.height), (160, 120));
        assert_eq!(resolved.bytes, image.bytes());
    }

    #[tokio::test]
    async fn test_preload_missing_object_is_protocol_failure() {
        let server = spawn_server(axum::http::StatusCode::OK).await;
        let api = client(&server.base);
        let url = format!("{}/result/missing.png", server.base);
        assert!(matches!(api.preload(&url).await, Err(FlowError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(&format!("http://{}", addr));
        let err = api.request_ticket().await.unwrap_err();
        assert!(err.is_transient(), "unexpected {:?}", err);
    }
}
