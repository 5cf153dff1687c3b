use crate::services::{
    AnalyticsService, ClaimService, LoggingPushSender, OfferPublisher, OfferService, PushSender,
    RateLimiter, RedemptionService,
};
use crate::storage::{SeaOrmStorage, StorageFactory};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 后台清理间隔（秒）
const SWEEP_INTERVAL_SECS: u64 = 60;

/// 服务器运行所需的全部服务句柄
#[derive(Clone)]
pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub offers: OfferService,
    pub claims: ClaimService,
    pub redemption: RedemptionService,
    pub analytics: AnalyticsService,
    pub rate_limiter: RateLimiter,
    pub publisher: OfferPublisher,
}

impl StartupContext {
    pub fn new(storage: Arc<SeaOrmStorage>, sender: Arc<dyn PushSender>) -> Self {
        Self {
            offers: OfferService::new(storage.clone()),
            claims: ClaimService::new(storage.clone()),
            redemption: RedemptionService::new(storage.clone()),
            analytics: AnalyticsService::new(storage.clone()),
            rate_limiter: RateLimiter::new(storage.clone()),
            publisher: OfferPublisher::new(storage.clone(), sender),
            storage,
        }
    }
}

/// 一次完整的维护：过期 offer、过期 claim、补发到点的推送
///
/// 各步骤互不依赖，单步失败只记日志。
pub async fn run_sweep(ctx: &StartupContext) -> SweepReport {
    let mut report = SweepReport::default();

    match ctx.offers.expire_ended_offers().await {
        Ok(sync) => {
            report.offers_activated = sync.activated;
            report.offers_expired = sync.expired;
        }
        Err(e) => warn!("Sweep: offer status sync failed: {}", e),
    }

    match ctx.claims.expire_stale_claims().await {
        Ok(count) => report.claims_expired = count,
        Err(e) => warn!("Sweep: claim expiry failed: {}", e),
    }

    match ctx.publisher.dispatch_due_offers().await {
        Ok(count) => report.offers_pushed = count,
        Err(e) => warn!("Sweep: push dispatch failed: {}", e),
    }

    debug!("Sweep finished: {:?}", report);
    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub offers_activated: u64,
    pub offers_expired: u64,
    pub claims_expired: u64,
    pub offers_pushed: usize,
}

/// 连接存储并组装服务
pub async fn prepare_startup() -> Result<StartupContext> {
    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.get_backend_name());

    Ok(StartupContext::new(storage, Arc::new(LoggingPushSender)))
}

/// 准备服务器启动：组装服务并启动后台清理任务
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let ctx = prepare_startup().await?;

    let sweep_ctx = ctx.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(SWEEP_INTERVAL_SECS)).await;
            run_sweep(&sweep_ctx).await;
        }
    });
    debug!("Background sweep scheduled every {}s", SWEEP_INTERVAL_SECS);

    info!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );
    Ok(ctx)
}
