//! 交互层入口。
//!
//! 只有命令行一种交互：读取链接文件或提示输入，跑完一轮后打印汇总。

pub mod noui;
