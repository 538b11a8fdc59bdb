use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::models::{MonitoredItem, Verdict};
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::product_manager::ProductManager;
use crate::scraper::PageSources;

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub checked: usize,
    pub failed: usize,
    pub unknown: usize,
    pub changes: usize,
    pub notification: Option<NotificationResult>,
    pub elapsed_ms: u64,
}

/// Sequential poll loop over every configured item.
pub struct StockMonitor {
    items: Vec<MonitoredItem>,
    sources: PageSources,
    product_manager: ProductManager,
    notifier: Box<dyn NotifierPlugin>,
    interval: Duration,
}

impl StockMonitor {
    pub fn new(
        items: Vec<MonitoredItem>,
        sources: PageSources,
        product_manager: ProductManager,
        notifier: Box<dyn NotifierPlugin>,
        interval: Duration,
    ) -> Self {
        Self {
            items,
            sources,
            product_manager,
            notifier,
            interval,
        }
    }

    pub fn product_manager(&self) -> &ProductManager {
        &self.product_manager
    }

    /// Check every item once and send the cycle's messages as a single
    /// notification.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let start_time = Instant::now();
        let mut report = CycleReport::default();
        let mut messages = Vec::new();

        for item in &self.items {
            match self.product_manager.check_item(&self.sources, item).await {
                Ok(check) => {
                    report.checked += 1;
                    if check.availability.verdict() == Verdict::Unknown {
                        report.unknown += 1;
                    }
                    if let Some(message) = check.message {
                        report.changes += 1;
                        messages.push(message);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("[{}] {} - {} check failed: {}", item.site, item.name, item.color, e);
                }
            }
        }

        if !messages.is_empty() {
            match self.notifier.notify(&messages.join("\n\n")).await {
                Ok(result) => {
                    if !result.success() && !result.skipped {
                        warn!(
                            "{} of {} notification chunks failed",
                            result.chunks_failed,
                            result.chunks_sent + result.chunks_failed
                        );
                    }
                    report.notification = Some(result);
                }
                Err(e) => error!("Notification via {} failed: {}", self.notifier.name(), e),
            }
        }

        report.elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Cycle finished in {}ms: {} checked, {} failed, {} unknown, {} changes",
            report.elapsed_ms, report.checked, report.failed, report.unknown, report.changes
        );
        report
    }

    /// Run cycles until `shutdown` resolves. Shutdown is observed while
    /// sleeping between cycles.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Monitoring {} items every {}s",
            self.items.len(),
            self.interval.as_secs()
        );

        loop {
            self.run_cycle().await;

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping monitor");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Run until Ctrl-C.
    pub async fn run(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    }
}
