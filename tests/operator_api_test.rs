// ==========================================
// OperatorApi 集成测试
// ==========================================
// 测试范围:
// 1. 建档: 校验、重复 ID、outbox 镜像
// 2. 状态变更: 持久化 + 事件
// 3. 合并视图: 实时状态覆盖档案
// ==========================================

mod test_helpers;

use chrono::Utc;
use garment_erp::domain::types::{OperatorStatus, SkillLevel};
use garment_erp::domain::LiveOperatorStatus;
use garment_erp::engine::ErpEventType;
use garment_erp::realtime::{EventTransport, RealtimeStore};
use test_helpers::*;

#[test]
fn test_create_operator_writes_outbox_mirror() {
    let env = TestEnv::new().expect("无法创建测试环境");

    let op = env.seed_operator("OP-1", "single_needle", SkillLevel::Advanced);
    assert_eq!(op.status, OperatorStatus::Available);
    assert_eq!(op.current_assignments, 0);

    let stored = env.state.operator_api.get_operator("OP-1").unwrap();
    assert_eq!(stored.name, op.name);
    assert!(stored.operates("single_needle"));
    assert_eq!(env.pending_outbox(), 1);
}

#[test]
fn test_create_operator_validation_has_no_side_effects() {
    let env = TestEnv::new().expect("无法创建测试环境");

    let mut bad = new_operator("OP-1", "single_needle", SkillLevel::Beginner);
    bad.name = " ".to_string();
    bad.max_concurrent_work = 0;

    let err = env.state.operator_api.create_operator(bad).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_FAILED");
    assert!(env.state.operator_api.list_operators(None).unwrap().is_empty());
    assert_eq!(env.pending_outbox(), 0);
}

#[test]
fn test_create_operator_duplicate_id() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_operator("OP-1", "overlock", SkillLevel::Intermediate);

    let err = env
        .state
        .operator_api
        .create_operator(new_operator("OP-1", "overlock", SkillLevel::Intermediate))
        .unwrap_err();
    assert_eq!(err.code(), "OPERATOR_CREATE_FAILED");
    // 失败事务不留 outbox 条目
    assert_eq!(env.pending_outbox(), 1);
}

#[test]
fn test_get_unknown_operator() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let err = env.state.operator_api.get_operator("OP-404").unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn test_update_status_persists_and_publishes() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_operator("OP-1", "overlock", SkillLevel::Intermediate);
    let mut rx = env.hub.subscribe();

    let updated = env
        .state
        .operator_api
        .update_status("OP-1", OperatorStatus::OnBreak)
        .unwrap();
    assert_eq!(updated.status, OperatorStatus::OnBreak);

    let on_break = env
        .state
        .operator_api
        .list_operators(Some(OperatorStatus::OnBreak))
        .unwrap();
    assert_eq!(on_break.len(), 1);

    let event = rx.try_recv().expect("应收到状态变更事件");
    assert_eq!(event.event_type, ErpEventType::OperatorStatusChanged);
    assert_eq!(event.entity_id, "OP-1");
    assert_eq!(env.pending_outbox(), 2);
}

#[test]
fn test_update_status_unknown_operator() {
    let env = TestEnv::new().expect("无法创建测试环境");
    let err = env
        .state
        .operator_api
        .update_status("OP-404", OperatorStatus::Offline)
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(env.pending_outbox(), 0);
}

#[tokio::test]
async fn test_resolve_operator_merges_live_status() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_operator("OP-1", "overlock", SkillLevel::Intermediate);

    // 无实时状态 → 档案本身
    let resolved = env.state.operator_api.resolve_operator("OP-1").await.unwrap();
    assert_eq!(resolved.status, OperatorStatus::Available);

    env.state
        .operator_api
        .report_live_status(&LiveOperatorStatus {
            id: "OP-1".to_string(),
            realtime_status: OperatorStatus::Working,
            current_work_item_id: Some("WI-7".to_string()),
            current_assignments: 1,
            last_seen_at: Utc::now(),
        })
        .await
        .unwrap();

    let resolved = env.state.operator_api.resolve_operator("OP-1").await.unwrap();
    assert_eq!(resolved.status, OperatorStatus::Working);
    assert_eq!(resolved.current_assignments, 1);
    assert_eq!(resolved.skill_level, SkillLevel::Intermediate);
}

#[tokio::test]
async fn test_resolve_operator_falls_back_when_store_offline() {
    let env = TestEnv::new().expect("无法创建测试环境");
    env.seed_operator("OP-1", "overlock", SkillLevel::Intermediate);
    env.store
        .set("operator_status/OP-1", serde_json::json!({"id": "OP-1", "realtime_status": "offline", "last_seen_at": "2026-03-01T08:00:00Z"}))
        .await
        .unwrap();

    env.store.set_offline(true);
    let resolved = env.state.operator_api.resolve_operator("OP-1").await.unwrap();
    assert_eq!(resolved.status, OperatorStatus::Available);

    env.store.set_offline(false);
    let resolved = env.state.operator_api.resolve_operator("OP-1").await.unwrap();
    assert_eq!(resolved.status, OperatorStatus::Offline);
}
