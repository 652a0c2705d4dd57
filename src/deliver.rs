// src/deliver.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use tracing::{info, warn};

use crate::models::PendingDelivery;
use crate::notify::template::Renderer;
use crate::notify::DynTransport;
use crate::store::DynStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// Held by another dispatcher.
    pub skipped: usize,
}

/// Extra time a claim stays valid beyond the send timeout.
const CLAIM_GRACE: Duration = Duration::from_secs(60);

pub struct DeliveryDispatcher {
    store: DynStore,
    renderer: Arc<dyn Renderer>,
    transport: DynTransport,
    subject: String,
    send_timeout: Duration,
}

impl DeliveryDispatcher {
    pub fn new(
        store: DynStore,
        renderer: Arc<dyn Renderer>,
        transport: DynTransport,
        subject: impl Into<String>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            renderer,
            transport,
            subject: subject.into(),
            send_timeout,
        }
    }

    /// Send every undelivered digest generated on `today`. Each digest is claimed
    /// first, so overlapping dispatchers never send it twice; a failed send
    /// releases the claim and leaves the digest pending for the next run.
    pub async fn dispatch(&self, today: NaiveDate) -> Result<DeliveryReport> {
        let pending = self
            .store
            .pending_digests(today)
            .await
            .context("listing pending digests")?;
        let mut report = DeliveryReport::default();
        for p in &pending {
            match self.claim(p).await {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    info!(target: "deliver", digest_id = p.digest.id, "digest claimed elsewhere, skipping");
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("delivery_failed_total").increment(1);
                    warn!(target: "deliver", digest_id = p.digest.id, error = ?e, "claim failed");
                    continue;
                }
            }
            match self.deliver_one(p).await {
                Ok(()) => {
                    report.sent += 1;
                    counter!("delivery_sent_total").increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("delivery_failed_total").increment(1);
                    warn!(
                        target: "deliver",
                        digest_id = p.digest.id,
                        user_id = p.digest.user_id,
                        error = ?e,
                        "delivery failed, will retry next run"
                    );
                    if let Err(e) = self.store.release_delivery(p.digest.id).await {
                        warn!(target: "deliver", digest_id = p.digest.id, error = ?e, "claim release failed");
                    }
                }
            }
        }
        info!(
            target: "deliver",
            %today,
            pending = pending.len(),
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "delivery stage finished"
        );
        Ok(report)
    }

    /// A claim outlives one bounded send; anything older is abandoned.
    async fn claim(&self, p: &PendingDelivery) -> Result<bool> {
        let now = Utc::now();
        let stale_before = self
            .send_timeout
            .checked_add(CLAIM_GRACE)
            .and_then(|lease| chrono::Duration::from_std(lease).ok())
            .and_then(|lease| now.checked_sub_signed(lease))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.store.claim_delivery(p.digest.id, now, stale_before).await
    }

    async fn deliver_one(&self, p: &PendingDelivery) -> Result<()> {
        let articles = self.store.articles_by_ids(&p.digest.article_ids).await?;
        let body = self
            .renderer
            .render(&p.digest.overview, &articles, p.digest.generated_date);

        tokio::time::timeout(self.send_timeout, self.transport.send(&p.email, &self.subject, &body))
            .await
            .map_err(|_| anyhow!("send timed out after {:?}", self.send_timeout))?
            .with_context(|| format!("{} transport", self.transport.name()))?;

        self.store
            .mark_delivered(p.digest.id)
            .await
            .with_context(|| format!("digest {} sent but not marked delivered", p.digest.id))?;
        info!(target: "deliver", digest_id = p.digest.id, recipient = %p.email, "digest delivered");
        Ok(())
    }
}
