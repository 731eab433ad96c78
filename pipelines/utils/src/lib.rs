//! 流水线程序依赖的通用组件.

use log::LevelFilter;
use simple_logger::SimpleLogger;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 初始化日志. 默认级别为 `Info`, 可被环境变量 `RUST_LOG` 覆盖.
///
/// 重复初始化时返回错误.
pub fn init_logger() -> Result<(), log::SetLoggerError> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
}
