//! 站点页面解析与媒体库命名。
//!
//! - `naming`：标题 → 本地路径（季度识别、集数补零）
//! - `page`：分类列表页 / 单集页的 HTML 解析

pub mod naming;
pub mod page;
