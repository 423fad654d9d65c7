//! 测试用的内存站点。

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::HeaderMap;

use super::network::{ApiReply, MediaStream, SiteClient, TextReply};
use crate::download::models::{DownloadError, EpisodeResult};

#[derive(Default)]
pub(crate) struct FakeSite {
    pages: HashMap<String, String>,
    api: HashMap<String, ApiReply>,
    texts: HashMap<String, TextReply>,
    blobs: HashMap<String, (u16, Option<u64>, Vec<u8>)>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeSite {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub(crate) fn api(mut self, token: &str, body: &str, set_cookies: &[&str]) -> Self {
        self.api.insert(
            token.to_string(),
            ApiReply {
                body: body.to_string(),
                set_cookies: set_cookies.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    pub(crate) fn text(mut self, url: &str, status: u16, body: &str) -> Self {
        self.texts.insert(
            url.to_string(),
            TextReply {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    pub(crate) fn blob(mut self, url: &str, bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        self.blobs.insert(url.to_string(), (200, Some(len), bytes));
        self
    }

    pub(crate) fn raw_blob(
        mut self,
        url: &str,
        status: u16,
        content_length: Option<u64>,
        bytes: Vec<u8>,
    ) -> Self {
        self.blobs
            .insert(url.to_string(), (status, content_length, bytes));
        self
    }

    pub(crate) fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SiteClient for FakeSite {
    fn post_page(&self, url: &str) -> EpisodeResult<String> {
        self.record(format!("POST {url}"));
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::Transfer(format!("页面请求失败，状态码：404 ({url})")))
    }

    fn post_api(&self, token: &str) -> EpisodeResult<ApiReply> {
        self.record(format!("API {token}"));
        Ok(self.api.get(token).cloned().unwrap_or_default())
    }

    fn get_text(&self, url: &str, _headers: &HeaderMap) -> EpisodeResult<TextReply> {
        self.record(format!("GET {url}"));
        Ok(self.texts.get(url).cloned().unwrap_or(TextReply {
            status: 404,
            body: String::new(),
        }))
    }

    fn open_stream(&self, url: &str, _headers: &HeaderMap) -> EpisodeResult<MediaStream> {
        self.record(format!("GET {url}"));
        if let Some(delay) = self.delays.get(url) {
            std::thread::sleep(*delay);
        }
        let (status, content_length, bytes) = self
            .blobs
            .get(url)
            .cloned()
            .unwrap_or((404, None, Vec::new()));
        Ok(MediaStream {
            status,
            content_length,
            body: Box::new(Cursor::new(bytes)),
        })
    }
}
