//! 进度显示：所有分集共用一个 MultiProgress，每集一条进度条。
//!
//! indicatif 的 MultiProgress / ProgressBar 内部自带同步，可在多个下载线程间直接克隆共享。

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::base_system::logging;

#[derive(Clone)]
pub struct ProgressBoard {
    mp: MultiProgress,
    attached: bool,
}

impl ProgressBoard {
    /// 绘制到 stderr，并让控制台日志在输出时避让进度条。
    pub fn new() -> Self {
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        logging::attach_progress(&mp);
        Self { mp, attached: true }
    }

    pub fn hidden() -> Self {
        Self {
            mp: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            attached: false,
        }
    }

    /// 按字节计的进度条（mp4 单文件）。
    pub fn bytes_bar(&self, name: &str, total: u64) -> ProgressBar {
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} • {bytes_per_sec} • ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        self.add(name, total, style)
    }

    /// 按分片个数计的进度条（m3u8）。
    pub fn count_bar(&self, name: &str, total: u64) -> ProgressBar {
        let style =
            ProgressStyle::with_template("{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-");
        self.add(&format!("{name} (TS)"), total, style)
    }

    fn add(&self, prefix: &str, total: u64, style: ProgressStyle) -> ProgressBar {
        let bar = self.mp.add(ProgressBar::new(total));
        bar.set_style(style);
        bar.set_prefix(prefix.to_string());
        bar
    }

    pub fn remove(&self, bar: &ProgressBar) {
        bar.finish_and_clear();
        self.mp.remove(bar);
    }

    pub fn close(&self) {
        let _ = self.mp.clear();
        if self.attached {
            logging::detach_progress();
        }
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}
