//! 数据库连接与迁移
//!
//! SQLite 使用 WAL：读不阻塞写，领取事务在写锁上排队，`busy_timeout`
//! 决定排队上限。内存库每个连接是独立数据库，只能用单连接。

use std::str::FromStr;
use std::time::Duration;

use sea_orm::sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

use crate::errors::{FlashOfferError, Result};
use migration::{Migrator, MigratorTrait};

/// 写锁等待上限，超过后领取返回可重试的数据库错误
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

pub async fn connect_sqlite(database_url: &str) -> Result<DatabaseConnection> {
    let config = crate::config::get_config();
    let in_memory = is_in_memory(database_url);

    let mut opt = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| FlashOfferError::database_config(format!("SQLite URL 解析失败: {}", e)))?
        .create_if_missing(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .foreign_keys(false)
        .pragma("cache_size", "-32000");
    if !in_memory {
        opt = opt
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let max_connections = if in_memory {
        1
    } else {
        config.database.pool_size.max(1)
    };
    debug!(
        "Opening SQLite pool ({} connections, in_memory={})",
        max_connections, in_memory
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(config.database.timeout.max(1)))
        .connect_with(opt)
        .await
        .map_err(|e| {
            FlashOfferError::database_connection(format!("无法连接到 SQLite 数据库: {}", e))
        })?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// MySQL / PostgreSQL：领取依赖行锁，连接数按配置
pub async fn connect_generic(database_url: &str, backend_name: &str) -> Result<DatabaseConnection> {
    let config = crate::config::get_config();
    let pool_size = config.database.pool_size.max(1);
    let timeout = Duration::from_secs(config.database.timeout.max(1));

    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(pool_size)
        .min_connections(pool_size.min(2))
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        FlashOfferError::database_connection(format!(
            "无法连接到 {} 数据库: {}",
            backend_name.to_uppercase(),
            e
        ))
    })
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| FlashOfferError::database_operation(format!("迁移失败: {}", e)))?;

    info!("Offer schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://offers.db?mode=rwc"));
    }
}
