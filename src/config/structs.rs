use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - server: 服务器地址、端口、CPU 数量
/// - database: 数据库连接与读重试
/// - logging: 日志配置
/// - offers: 领取、核销码、到店校验
/// - rate_limit: 各订阅等级的 24h 发布额度
/// - targeting: 定向回看窗口
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub offers: OfferConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub targeting: TargetingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：FO，分隔符：__
    /// 示例：FO__SERVER__PORT=9999
    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("FO")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    /// 读操作（列表查询）的重试次数，不含首次尝试
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// 固定退避间隔
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// Offer / claim 行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferConfig {
    /// 未指定 radius 时的默认定向半径（公里）
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
    /// 领取后核销码有效期
    #[serde(default = "default_claim_ttl_hours")]
    pub claim_ttl_hours: i64,
    /// 签到在多长时间内视为“在店”
    #[serde(default = "default_presence_window_hours")]
    pub presence_window_hours: i64,
    /// 核销码冲突时的最大生成次数
    #[serde(default = "default_token_max_attempts")]
    pub token_max_attempts: u32,
    /// 事务路径失败时是否退化为非原子的顺序写入（有竞态窗口）
    #[serde(default)]
    pub allow_non_atomic_fallback: bool,
    #[serde(default = "default_page_size_max")]
    pub list_page_size_max: u64,
}

/// 发布额度配置（滚动窗口）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_free_limit")]
    pub free: u32,
    #[serde(default = "default_core_limit")]
    pub core: u32,
    #[serde(default = "default_pro_limit")]
    pub pro: u32,
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
    /// 子窗口长度：同一子窗口内的发布累加到同一行
    #[serde(default = "default_sub_window_minutes")]
    pub sub_window_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetingConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "flash_offers.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_radius_km() -> f64 {
    1.0
}

fn default_claim_ttl_hours() -> i64 {
    24
}

fn default_presence_window_hours() -> i64 {
    12
}

fn default_token_max_attempts() -> u32 {
    5
}

fn default_page_size_max() -> u64 {
    100
}

fn default_free_limit() -> u32 {
    3
}

fn default_core_limit() -> u32 {
    5
}

fn default_pro_limit() -> u32 {
    10
}

fn default_window_hours() -> i64 {
    24
}

fn default_sub_window_minutes() -> i64 {
    60
}

fn default_lookback_days() -> i64 {
    30
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for OfferConfig {
    fn default() -> Self {
        Self {
            default_radius_km: default_radius_km(),
            claim_ttl_hours: default_claim_ttl_hours(),
            presence_window_hours: default_presence_window_hours(),
            token_max_attempts: default_token_max_attempts(),
            allow_non_atomic_fallback: false,
            list_page_size_max: default_page_size_max(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            free: default_free_limit(),
            core: default_core_limit(),
            pro: default_pro_limit(),
            window_hours: default_window_hours(),
            sub_window_minutes: default_sub_window_minutes(),
        }
    }
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
        }
    }
}
