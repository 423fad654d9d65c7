//! anime1.me 站点访问层。
//!
//! `SiteClient` 是下载流程与 HTTP 之间的唯一接缝：正式运行用 `Anime1Network`
//!（reqwest blocking），测试中替换为内存实现。

use std::io::Read;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, DNT, HeaderMap, HeaderName,
    HeaderValue, SET_COOKIE, USER_AGENT,
};
use tracing::{debug, warn};

use crate::base_system::context::Config;
use crate::download::models::{DownloadError, EpisodeResult};

pub const API_ENDPOINT: &str = "https://v.anime1.me/api";

#[derive(Debug, Clone, Default)]
pub struct ApiReply {
    pub body: String,
    /// 每个 `Set-Cookie` 响应头一项
    pub set_cookies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TextReply {
    pub status: u16,
    pub body: String,
}

impl TextReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct MediaStream {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl MediaStream {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait SiteClient: Send + Sync {
    /// POST 取得页面 HTML（站点对 POST 与 GET 返回相同内容）。
    fn post_page(&self, url: &str) -> EpisodeResult<String>;

    /// 以 `d=<token>` 调用媒体 API。
    fn post_api(&self, token: &str) -> EpisodeResult<ApiReply>;

    fn get_text(&self, url: &str, headers: &HeaderMap) -> EpisodeResult<TextReply>;

    fn open_stream(&self, url: &str, headers: &HeaderMap) -> EpisodeResult<MediaStream>;
}

pub struct Anime1Network {
    client: Client,
}

impl Anime1Network {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .default_headers(default_headers(config))
            .timeout(config.client_timeout())
            .build()?;
        Ok(Self { client })
    }
}

fn default_headers(config: &Config) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let parsed = (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        );
        match parsed {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => warn!("忽略无效的请求头配置: {}", name),
        }
    }
    headers
}

impl SiteClient for Anime1Network {
    fn post_page(&self, url: &str) -> EpisodeResult<String> {
        debug!("POST {}", url);
        let resp = self.client.post(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Transfer(format!(
                "页面请求失败，状态码：{} ({})",
                status.as_u16(),
                url
            )));
        }
        Ok(resp.text()?)
    }

    fn post_api(&self, token: &str) -> EpisodeResult<ApiReply> {
        debug!("POST {}", API_ENDPOINT);
        let resp = self
            .client
            .post(API_ENDPOINT)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(format!("d={token}"))
            .send()?;
        let set_cookies = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = resp.text()?;
        Ok(ApiReply { body, set_cookies })
    }

    fn get_text(&self, url: &str, headers: &HeaderMap) -> EpisodeResult<TextReply> {
        debug!("GET {}", url);
        let resp = self.client.get(url).headers(headers.clone()).send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(TextReply { status, body })
    }

    fn open_stream(&self, url: &str, headers: &HeaderMap) -> EpisodeResult<MediaStream> {
        debug!("GET (stream) {}", url);
        let resp = self.client.get(url).headers(headers.clone()).send()?;
        Ok(MediaStream {
            status: resp.status().as_u16(),
            content_length: resp.content_length(),
            body: Box::new(resp),
        })
    }
}

// ── Cookie 与下载请求头 ────────────────────────────────────────

fn re_cookie_pair() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z0-9_\-]+)=([^;]*)").expect("compile re_cookie_pair")
    })
}

/// 从 `Set-Cookie` 头中取出 e / p / h 三项，拼成 `e=..;p=..;h=..;`。
pub fn parse_session_cookies(set_cookies: &[String]) -> EpisodeResult<String> {
    let mut e = None;
    let mut p = None;
    let mut h = None;
    for raw in set_cookies {
        let Some(caps) = re_cookie_pair().captures(raw) else {
            continue;
        };
        let value = caps[2].trim().to_string();
        match caps[1].to_ascii_lowercase().as_str() {
            "e" => e = e.or(Some(value)),
            "p" => p = p.or(Some(value)),
            "h" => h = h.or(Some(value)),
            _ => {}
        }
    }
    match (e, p, h) {
        (Some(e), Some(p), Some(h)) => Ok(format!("e={e};p={p};h={h};")),
        (e, p, h) => {
            let missing: Vec<&str> = [("e", e.is_none()), ("p", p.is_none()), ("h", h.is_none())]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
            Err(DownloadError::CookieParse(format!(
                "缺少 {}",
                missing.join(", ")
            )))
        }
    }
}

/// 下载媒体时使用的请求级头部；不会写回共享 client。
pub fn download_headers(config: &Config, cookie: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_ENCODING,
        HeaderValue::from_static("identity;q=1, *;q=0"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(DNT, HeaderValue::from_static("1"));
    if let Ok(v) = HeaderValue::from_str(cookie) {
        headers.insert(COOKIE, v);
    }
    if let Ok(v) = HeaderValue::from_str(config.user_agent()) {
        headers.insert(USER_AGENT, v);
    }
    headers
}
