use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::base_system::context::Config;
use crate::base_system::file_cleaner::prune_scratch_root;
use crate::download::downloader::download_all;
use crate::download::models::RunSummary;
use crate::download::plan::{classify_urls, dedup_urls, read_urls_from_file, split_user_input};
use crate::download::progress::ProgressBoard;
use crate::network_parser::network::SiteClient;

/// 收集 → 展开 → 下载 → 汇总，一轮结束即返回。
pub fn run(config: &Config, site: &dyn SiteClient) -> Result<()> {
    let board = ProgressBoard::new();
    let summary = run_with_board(config, site, &board);
    board.close();

    if let Some(summary) = summary? {
        println!("{}", format_report(&summary));
    }
    Ok(())
}

fn run_with_board(
    config: &Config,
    site: &dyn SiteClient,
    board: &ProgressBoard,
) -> Result<Option<RunSummary>> {
    let urls = collect_urls(config)?;
    if urls.is_empty() {
        println!("没有输入任何链接。");
        return Ok(None);
    }

    let episodes = dedup_urls(classify_urls(site, &urls));
    if episodes.is_empty() {
        println!("没有可下载的影片。");
        return Ok(None);
    }

    let summary = download_all(site, config, &episodes, board);
    // 各集的分片目录已各自删除，全部结束后再收掉共用的根目录
    prune_scratch_root(config.scratch_root());
    Ok(Some(summary))
}

/// 优先读取链接文件，文件为空或不存在时改为交互输入。
fn collect_urls(config: &Config) -> Result<Vec<String>> {
    let path = Path::new(config.urls_path.trim());
    let from_file = read_urls_from_file(path);
    let urls = if from_file.is_empty() {
        let line = read_line("请输入 Anime1 URL（多个链接以逗号分隔）：")?;
        split_user_input(&line)
    } else {
        info!("从 {} 读取到 {} 个链接", path.display(), from_file.len());
        from_file
    };
    Ok(dedup_urls(urls))
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{} 分 {} 秒", secs / 60, secs % 60)
}

pub(crate) fn format_report(summary: &RunSummary) -> String {
    let mut out = String::new();
    if summary.failed.is_empty() {
        out.push_str("\n所有影片下载完成！\n");
    } else {
        out.push_str("\n===== 下载失败清单 =====\n");
        for f in &summary.failed {
            out.push_str(&format!("- {}\n  {}\n", f.url, f.reason));
        }
    }
    out.push_str(&format!(
        "共耗时：{}（尝试：{}，成功：{}，失败：{}）",
        format_elapsed(summary.elapsed),
        summary.attempted,
        summary.succeeded.len(),
        summary.failed.len()
    ));
    out
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anime_parser::page::fixtures::{episode_html, listing_html};
    use crate::download::models::{EpisodeOutcome, FailedEpisode};
    use crate::download::resolver::fixtures::{COOKIES, api_body};
    use crate::network_parser::fake::FakeSite;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const CAT: &str = "https://anime1.me/category/2024年春季/某動畫";
    const BAD: &str = "https://anime1.me/1";
    const GOOD: &str = "https://anime1.me/2";
    const MEDIA: &str = "https://shiro.v.anime1.me/2/2.mp4";

    fn site() -> FakeSite {
        FakeSite::new()
            .page(CAT, listing_html(&[GOOD], None))
            .page(
                BAD,
                r#"<html><body><h2 class="entry-title">某動畫 [1]</h2></body></html>"#,
            )
            .page(GOOD, episode_html("某動畫 [2]", Some("tok")))
            .api("tok", &api_body(MEDIA), &COOKIES)
            .blob(MEDIA, vec![2; 4096])
    }

    fn config_with_urls(dir: &TempDir, lines: &str) -> Config {
        let urls = dir.path().join("urls.txt");
        fs::write(&urls, lines).unwrap();
        Config {
            root_download_path: dir.path().join("lib").to_string_lossy().to_string(),
            scratch_dir: dir.path().join(".ts").to_string_lossy().to_string(),
            urls_path: urls.to_string_lossy().to_string(),
            min_file_size: 0,
            ..Config::default()
        }
    }

    #[test]
    fn url_file_run_records_failure_and_keeps_going() {
        let dir = TempDir::new().unwrap();
        let config = config_with_urls(&dir, &format!("{BAD}\n{CAT}\n{GOOD}\nnot a url\n"));

        let summary = run_with_board(&config, &site(), &ProgressBoard::hidden())
            .unwrap()
            .unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(
            summary.succeeded,
            vec![dir.path().join("lib/某動畫/Season 1/某動畫 - 02.mp4")]
        );
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].url, BAD);
        assert!(summary.failed[0].reason.starts_with("页面解析失败"));

        let report = format_report(&summary);
        assert!(report.contains("下载失败清单"));
        assert!(report.contains(BAD));
        assert!(report.contains("成功：1，失败：1"));
    }

    #[test]
    fn run_returns_ok_even_when_episodes_fail() {
        let dir = TempDir::new().unwrap();
        let config = config_with_urls(&dir, &format!("{BAD}\n"));
        assert!(run(&config, &site()).is_ok());
        assert!(!config.scratch_root().exists());
    }

    #[test]
    fn elapsed_is_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0 分 0 秒");
        assert_eq!(format_elapsed(Duration::from_millis(125_900)), "2 分 5 秒");
    }

    #[test]
    fn report_lists_failures_with_reasons() {
        let mut summary = RunSummary {
            attempted: 2,
            elapsed: Duration::from_secs(61),
            ..RunSummary::default()
        };
        summary.record(EpisodeOutcome::Done(PathBuf::from("a.mp4")));
        summary.record(EpisodeOutcome::Failed(FailedEpisode {
            url: "https://anime1.me/2".to_string(),
            reason: "下载失败：状态码：404".to_string(),
        }));

        let report = format_report(&summary);
        assert!(report.contains("下载失败清单"));
        assert!(report.contains("https://anime1.me/2"));
        assert!(report.contains("状态码：404"));
        assert!(!report.contains("所有影片下载完成"));
        assert!(report.ends_with("共耗时：1 分 1 秒（尝试：2，成功：1，失败：1）"));
    }

    #[test]
    fn clean_run_report() {
        let summary = RunSummary {
            attempted: 1,
            succeeded: vec![PathBuf::from("a.mp4")],
            ..RunSummary::default()
        };
        let report = format_report(&summary);
        assert!(report.contains("所有影片下载完成！"));
        assert!(!report.contains("下载失败清单"));
    }
}
