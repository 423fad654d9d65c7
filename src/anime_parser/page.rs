//! 站点页面解析：分类列表页与单集页。

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::download::models::{DownloadError, EpisodeResult};

fn sel(cell: &'static OnceLock<Selector>, css: &'static str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("static selector"))
}

fn sel_entry_title() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    sel(&S, "h2.entry-title")
}

fn sel_bookmark() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    sel(&S, r#"a[rel="bookmark"]"#)
}

fn sel_nav_previous() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    sel(&S, "div.nav-previous a")
}

fn sel_video() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    sel(&S, "video.video-js")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub episodes: Vec<String>,
    pub previous: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodePage {
    pub api_token: String,
    pub title: String,
}

fn absolutize(page_url: &str, href: &str) -> String {
    let href = href.trim();
    match Url::parse(page_url).and_then(|base| base.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => href.to_string(),
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// 按页面渲染顺序取出所有单集链接，以及「上一页」链接（若有）。
pub fn parse_listing(html: &str, page_url: &str) -> ListingPage {
    let doc = Html::parse_document(html);

    let episodes = doc
        .select(sel_entry_title())
        .filter_map(|h2| h2.select(sel_bookmark()).next())
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| absolutize(page_url, href))
        .collect();

    let previous = doc
        .select(sel_nav_previous())
        .next()
        .and_then(|a| a.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| absolutize(page_url, href));

    ListingPage { episodes, previous }
}

/// 单集页：取 `video.video-js` 的 `data-apireq` 与 `h2.entry-title` 标题。
pub fn parse_episode_page(html: &str) -> EpisodeResult<EpisodePage> {
    let doc = Html::parse_document(html);

    let video = doc
        .select(sel_video())
        .next()
        .ok_or_else(|| DownloadError::Parse("找不到影片标签".to_string()))?;
    let api_token = video
        .value()
        .attr("data-apireq")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DownloadError::Parse("找不到 data-apireq 资料".to_string()))?
        .to_string();

    let title = doc
        .select(sel_entry_title())
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DownloadError::Parse("找不到影片标题".to_string()))?;

    Ok(EpisodePage { api_token, title })
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub fn listing_html(links: &[&str], previous: Option<&str>) -> String {
        let mut html = String::from("<html><body><main>");
        for link in links {
            html.push_str(&format!(
                r#"<article><header><h2 class="entry-title"><a href="{link}" rel="bookmark">t</a></h2></header></article>"#
            ));
        }
        if let Some(prev) = previous {
            html.push_str(&format!(
                r#"<nav><div class="nav-previous"><a href="{prev}">較舊的文章</a></div></nav>"#
            ));
        }
        html.push_str("</main></body></html>");
        html
    }

    pub fn episode_html(title: &str, token: Option<&str>) -> String {
        let video = match token {
            Some(t) => format!(r#"<video class="video-js vjs-big-play-centered" data-apireq="{t}"></video>"#),
            None => String::new(),
        };
        format!(
            r#"<html><body><article><h2 class="entry-title">{title}</h2><div class="vjscontainer">{video}</div></article></body></html>"#
        )
    }
}
