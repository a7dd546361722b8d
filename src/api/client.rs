use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{ApiError, Chapter, Novel, NovelId, NovelSource, UserNovelStatus};
use crate::settings;

pub struct NoveraClient {
    http: Client,
    base_url: String,
}

impl NoveraClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("novera/", env!("CARGO_PKG_VERSION")));
        if base_url.starts_with("http://127.0.0.1") || base_url.starts_with("http://localhost") {
            builder = builder.no_proxy();
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings() -> Result<Self, ApiError> {
        Self::new(&settings::get_api_url(), settings::get_request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<T, ApiError> {
        debug!("GET {url}");
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            warn!("GET {url} -> {status}");
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        self.fetch(self.http.get(&url), &url)
    }
}

impl NovelSource for NoveraClient {
    fn list_novels(&self) -> Result<Vec<Novel>, ApiError> {
        self.get_json("/novels/")
    }

    fn get_novel(&self, novel_id: NovelId) -> Result<Novel, ApiError> {
        self.get_json(&format!("/novels/{novel_id}"))
    }

    fn list_chapters(&self, novel_id: NovelId) -> Result<Vec<Chapter>, ApiError> {
        self.get_json(&format!("/novels/{novel_id}/chapters/"))
    }

    fn user_statuses(&self, token: &str) -> Result<Vec<UserNovelStatus>, ApiError> {
        let url = self.url("/user/novels/status/");
        self.fetch(self.http.get(&url).bearer_auth(token), &url)
    }
}
