//! 下载计划：收集输入链接、分类、把分类页展开为单集链接。

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use super::models::{EpisodeResult, UrlKind};
use crate::anime_parser::page::parse_listing;
use crate::network_parser::network::SiteClient;

fn re_listing() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)anime1\.me/category/.*").expect("compile re_listing"))
}

fn re_episode() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)anime1\.me/\d+").expect("compile re_episode"))
}

/// 读取链接文件中所有以 http 开头的行；文件不存在时返回空列表。
pub fn read_urls_from_file(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http"))
            .map(str::to_string)
            .collect(),
        Err(err) => {
            if path.exists() {
                warn!("读取链接文件失败 {}: {}", path.display(), err);
            }
            Vec::new()
        }
    }
}

/// 逗号分隔的交互输入。
pub fn split_user_input(input: &str) -> Vec<String> {
    input
        .split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 去重，保留首次出现的位置。
pub fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

pub fn classify_url(url: &str) -> UrlKind {
    let url = url.trim();
    if re_listing().is_match(url) {
        UrlKind::Listing
    } else if re_episode().is_match(url) {
        UrlKind::Episode
    } else {
        UrlKind::Unsupported
    }
}

/// 从分类页开始沿「上一页」一路向前，收集全部单集链接。
pub fn get_season_episodes(site: &dyn SiteClient, url: &str) -> EpisodeResult<Vec<String>> {
    let mut episodes = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(url.to_string());

    while let Some(page_url) = current.take() {
        if !visited.insert(page_url.clone()) {
            warn!("分页链接出现循环，停止于 {}", page_url);
            break;
        }
        let html = site.post_page(&page_url)?;
        let page = parse_listing(&html, &page_url);
        episodes.extend(page.episodes);
        current = page.previous;
    }
    Ok(episodes)
}

/// 分类页展开为单集，单集链接原样保留，其它链接丢弃并提示。
pub fn classify_urls(site: &dyn SiteClient, urls: &[String]) -> Vec<String> {
    let mut url_list = Vec::new();
    for url in urls {
        let url = url.trim();
        match classify_url(url) {
            UrlKind::Listing => match get_season_episodes(site, url) {
                Ok(eps) if !eps.is_empty() => {
                    info!("已加入 {} 部影片：{}", eps.len(), url);
                    url_list.extend(eps);
                }
                Ok(_) => warn!("找不到任何影片：{}", url),
                Err(err) => warn!("展开分类页失败 {}: {}", url, err),
            },
            UrlKind::Episode => {
                info!("已加入单集影片：{}", url);
                url_list.push(url.to_string());
            }
            UrlKind::Unsupported => warn!("无法支持的链接：{}", url),
        }
    }
    url_list
}
