// ==========================================
// 服装工厂 ERP - 主入口
// ==========================================
// 启动流程: 日志 → AppState → 连接事件通道 + 回放 outbox → 状态概览
// ==========================================

use garment_erp::app::{get_default_db_path, AppState};
use garment_erp::domain::types::{OperatorStatus, WorkStatus};
use garment_erp::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 派工与计件核算", garment_erp::APP_NAME);
    tracing::info!("系统版本: {}", garment_erp::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    match state.bootstrap().await {
        Ok((attempts, summary)) => tracing::info!(
            attempts,
            delivered = summary.delivered,
            remaining = summary.remaining,
            "事件通道已连接，outbox 回放完成"
        ),
        Err(e) => tracing::warn!(error = %e, "启动同步未完成，将在下次回放时重试"),
    }

    let operators = state.operator_api.list_operators(None)?;
    let available_ops = operators
        .iter()
        .filter(|op| op.status == OperatorStatus::Available)
        .count();
    let open_items = state.assignment_api.list_work_items(WorkStatus::Available)?;
    let pending = state.assignment_api.list_pending_requests()?;

    tracing::info!(
        operators = operators.len(),
        available_operators = available_ops,
        open_work_items = open_items.len(),
        pending_requests = pending.len(),
        "系统就绪"
    );

    Ok(())
}
