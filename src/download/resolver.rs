//! 单集页 → 可下载的媒体地址与会话 Cookie。

use serde_json::Value;
use tracing::debug;

use super::models::{DownloadError, EpisodeResult, MediaKind, ResolvedMedia};
use crate::anime_parser::naming::process_video_name;
use crate::anime_parser::page::parse_episode_page;
use crate::base_system::context::Config;
use crate::network_parser::network::{SiteClient, parse_session_cookies};

/// 取 API 响应中的 `s[0].src`，协议相对地址补上 `https:`。
pub fn extract_media_src(body: &str) -> EpisodeResult<String> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| DownloadError::Resolution(format!("API 响应不是有效 JSON：{e}")))?;
    let src = json
        .get("s")
        .and_then(|s| s.get(0))
        .and_then(|first| first.get("src"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DownloadError::Resolution("响应中没有 s[0].src".to_string()))?;

    if src.starts_with("//") {
        Ok(format!("https:{src}"))
    } else {
        Ok(src.to_string())
    }
}

/// 页面解析 → 目标路径检查 → API 交换 → 媒体类型判断。
///
/// 目标文件已存在时在调用 API 之前就失败，不会产生任何媒体传输。
pub fn resolve_episode(
    site: &dyn SiteClient,
    config: &Config,
    episode_url: &str,
) -> EpisodeResult<ResolvedMedia> {
    let html = site.post_page(episode_url)?;
    let page = parse_episode_page(&html)?;
    let path = process_video_name(config, &page.title)?;

    let reply = site.post_api(&page.api_token)?;
    let url = extract_media_src(&reply.body)?;
    let cookie = parse_session_cookies(&reply.set_cookies)?;
    let kind = MediaKind::from_url(&url)?;
    debug!("{} → {} ({:?})", page.title, url, kind);

    Ok(ResolvedMedia {
        title: page.title,
        url,
        cookie,
        path,
        kind,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::anime_parser::page::fixtures::episode_html;
    use crate::base_system::context::SeasonTable;
    use crate::network_parser::fake::FakeSite;
    use std::fs;
    use tempfile::TempDir;

    const EP: &str = "https://anime1.me/21000";

    fn config_in(dir: &TempDir) -> Config {
        Config {
            root_download_path: dir.path().to_string_lossy().to_string(),
            seasons: SeasonTable::new([("第四季", "4")]),
            ..Config::default()
        }
    }

    #[test]
    fn protocol_relative_src_gets_https() {
        assert_eq!(
            extract_media_src(&api_body("//shiro.v.anime1.me/1/1.mp4")).unwrap(),
            "https://shiro.v.anime1.me/1/1.mp4"
        );
        assert_eq!(
            extract_media_src(&api_body("https://x/1.m3u8")).unwrap(),
            "https://x/1.m3u8"
        );
    }

    #[test]
    fn missing_src_is_resolution_error() {
        for body in [r#"{"s":[]}"#, r#"{"s":[{"type":"video/mp4"}]}"#, "not json"] {
            let err = extract_media_src(body).unwrap_err();
            assert!(matches!(err, DownloadError::Resolution(_)), "{body}");
        }
    }

    #[test]
    fn resolves_progressive_episode() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new()
            .page(EP, episode_html("進擊的巨人 第四季 [12]", Some("tok")))
            .api("tok", &api_body("//shiro.v.anime1.me/21000/12.mp4"), &COOKIES);

        let media = resolve_episode(&site, &config_in(&dir), EP).unwrap();
        assert_eq!(media.kind, MediaKind::Progressive);
        assert_eq!(media.url, "https://shiro.v.anime1.me/21000/12.mp4");
        assert_eq!(media.cookie, "e=1700000000;p=eyJpc3MiOiJ4In0;h=abcDEF123;");
        assert_eq!(
            media.path,
            dir.path().join("進擊的巨人/Season 4/進擊的巨人 - S4E12.mp4")
        );
    }

    #[test]
    fn playlist_url_is_segmented() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new()
            .page(EP, episode_html("A [1]", Some("tok")))
            .api("tok", &api_body("//shiro.v.anime1.me/1/playlist.m3u8"), &COOKIES);
        let media = resolve_episode(&site, &config_in(&dir), EP).unwrap();
        assert_eq!(media.kind, MediaKind::Segmented);
    }

    #[test]
    fn missing_cookie_is_cookie_error() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new()
            .page(EP, episode_html("A [1]", Some("tok")))
            .api("tok", &api_body("//x/1.mp4"), &COOKIES[..2]);
        let err = resolve_episode(&site, &config_in(&dir), EP).unwrap_err();
        assert!(matches!(err, DownloadError::CookieParse(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let site = FakeSite::new()
            .page(EP, episode_html("A [1]", Some("tok")))
            .api("tok", &api_body("//x/1.flv"), &COOKIES);
        let err = resolve_episode(&site, &config_in(&dir), EP).unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedFormat(ext) if ext == "flv"));
    }

    #[test]
    fn existing_destination_stops_before_api_call() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("A/Season 1/A - 01.mp4");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, b"done").unwrap();

        let site = FakeSite::new()
            .page(EP, episode_html("A [1]", Some("tok")))
            .api("tok", &api_body("//x/1.mp4"), &COOKIES);
        let err = resolve_episode(&site, &config_in(&dir), EP).unwrap_err();

        assert!(matches!(err, DownloadError::AlreadyExists(p) if p == existing));
        assert_eq!(site.calls(), vec![format!("POST {EP}")]);
        assert_eq!(fs::read(&existing).unwrap(), b"done");
    }
}
