use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// 读取全局配置快照
///
/// 返回的 Arc 可以跨 await 持有，不占锁。
/// 必须先调用 `init_config` 或 `init_config_from`。
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("config is read before init_config()")
        .load_full()
}

/// 从当前目录的 config.toml 加载配置（文件可缺省）
///
/// ```no_run
/// flash_offers::config::init_config();
/// let port = flash_offers::config::get_config().server.port;
/// # let _ = port;
/// ```
pub fn init_config() {
    init_config_from(super::DEFAULT_CONFIG_PATH);
}

/// 从指定路径加载配置，`--config` 参数走这里
///
/// 进程内只生效一次，后续调用直接忽略。
pub fn init_config_from(path: &str) {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(StaticConfig::load_from(path)));
}
