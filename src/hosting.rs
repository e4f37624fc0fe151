//! Upload of exported banners to an unsigned-preset image host.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tokio::runtime::Runtime;
use url::Url;

use crate::config::UploadConfig;
use crate::error::BannerError;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    secure_url: Option<String>,
}

pub struct HostingClient {
    http: Client,
    runtime: Runtime,
    config: UploadConfig,
}

impl HostingClient {
    pub fn new(config: UploadConfig) -> Result<Self, BannerError> {
        let http = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|error| BannerError::Upload(format!("failed to build http client: {error}")))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| BannerError::Upload(format!("failed to start upload runtime: {error}")))?;
        Ok(Self {
            http,
            runtime,
            config,
        })
    }

    /// Blocks until the host answers with the public URL of the image.
    pub fn upload(&self, bytes: &[u8], file_name: &str) -> Result<Url, BannerError> {
        log::info!(
            "uploading {file_name} ({} bytes) to {}",
            bytes.len(),
            self.config.endpoint
        );
        let url = self.runtime.block_on(self.send(bytes.to_vec(), file_name))?;
        log::info!("uploaded {file_name} to {url}");
        Ok(url)
    }

    async fn send(&self, bytes: Vec<u8>, file_name: &str) -> Result<Url, BannerError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str("image/png")
            .map_err(|error| BannerError::Upload(error.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.preset.clone());

        let response = self
            .http
            .post(self.config.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|error| BannerError::Upload(format!("request failed: {error}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| BannerError::Upload(format!("failed to read response: {error}")))?;
        if !status.is_success() {
            return Err(BannerError::Upload(format!(
                "host returned {status}: {}",
                body.trim()
            )));
        }
        parse_upload_response(&body)
    }
}

pub fn parse_upload_response(body: &str) -> Result<Url, BannerError> {
    let response: UploadResponse = serde_json::from_str(body)
        .map_err(|error| BannerError::Upload(format!("unreadable response: {error}")))?;
    let secure_url = response
        .secure_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| BannerError::Upload("response has no secure_url".to_owned()))?;
    Url::parse(&secure_url)
        .map_err(|error| BannerError::Upload(format!("invalid secure_url '{secure_url}': {error}")))
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{parse_upload_response, HostingClient};
    use crate::config::UploadConfig;
    use crate::error::BannerError;

    #[test]
    fn secure_url_is_extracted() {
        let url = parse_upload_response(
            r#"{"public_id":"x","secure_url":"https://res.example.com/ada.png","width":1500}"#,
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://res.example.com/ada.png");
    }

    #[test]
    fn missing_or_bad_secure_url_is_an_upload_error() {
        for body in [r#"{"url":"http://x"}"#, r#"{"secure_url":""}"#, "<html>", r#"{"secure_url":"nope"}"#] {
            let error = parse_upload_response(body).unwrap_err();
            assert!(matches!(error, BannerError::Upload(_)), "{body}: {error}");
        }
    }

    #[test]
    fn unreachable_host_is_an_upload_error() {
        let client = HostingClient::new(UploadConfig {
            endpoint: Url::parse("http://127.0.0.1:9/upload").unwrap(),
            preset: "test".to_owned(),
        })
        .unwrap();
        let error = client.upload(b"png", "a.png").unwrap_err();
        assert_eq!(error.code(), "UPLOAD_FAILED");
    }
}
