// ==========================================
// 服装工厂 ERP - outbox 回放
// ==========================================
// 将 realtime_outbox 中未投递的条目按顺序写入实时库
// - 成功: 标记 delivered
// - 失败: attempts + 1，保留 pending，并停止本轮（保证同路径写入顺序）
// ==========================================

use crate::realtime::error::RealtimeResult;
use crate::realtime::store::RealtimeStore;
use crate::repository::{OutboxEntry, OutboxOperation, OutboxRepository};
use std::sync::Arc;
use tracing::instrument;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub delivered: usize,
    pub failed: usize,
    pub remaining: i64,
}

pub struct OutboxRelay {
    outbox: Arc<OutboxRepository>,
    store: Arc<dyn RealtimeStore>,
    batch_size: usize,
}

impl OutboxRelay {
    pub fn new(outbox: Arc<OutboxRepository>, store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            outbox,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn apply(&self, entry: &OutboxEntry) -> RealtimeResult<()> {
        match entry.operation {
            OutboxOperation::Set => self.store.set(&entry.path, entry.payload.clone()).await,
            OutboxOperation::Merge => self.store.update(&entry.path, entry.payload.clone()).await,
            OutboxOperation::Remove => self.store.remove(&entry.path).await,
        }
    }

    /// 回放一批 pending 条目
    #[instrument(skip(self))]
    pub async fn replay_pending(&self) -> RealtimeResult<ReplaySummary> {
        let entries = self.outbox.list_pending(self.batch_size)?;
        let mut summary = ReplaySummary::default();

        for entry in &entries {
            match self.apply(entry).await {
                Ok(()) => {
                    self.outbox.mark_delivered(entry.outbox_id)?;
                    summary.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        outbox_id = entry.outbox_id,
                        path = %entry.path,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "outbox 回放失败，保留待重试"
                    );
                    self.outbox.mark_failed(entry.outbox_id, &e.to_string())?;
                    summary.failed += 1;
                    break;
                }
            }
        }

        summary.remaining = self.outbox.count_pending()?;
        if summary.delivered > 0 || summary.failed > 0 {
            tracing::info!(
                delivered = summary.delivered,
                failed = summary.failed,
                remaining = summary.remaining,
                "outbox 回放完成"
            );
        }
        Ok(summary)
    }

    /// 循环回放直到清空或遇到失败
    pub async fn drain(&self) -> RealtimeResult<ReplaySummary> {
        let mut total = ReplaySummary::default();
        loop {
            let round = self.replay_pending().await?;
            total.delivered += round.delivered;
            total.failed += round.failed;
            total.remaining = round.remaining;
            if round.failed > 0 || round.delivered == 0 || round.remaining == 0 {
                return Ok(total);
            }
        }
    }
}
