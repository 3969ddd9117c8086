// ==========================================
// 服装工厂 ERP - 实时库路径
// ==========================================
// 所有 outbox 条目与实时库读写使用同一套路径
// ==========================================

pub fn operator(operator_id: &str) -> String {
    format!("operators/{}", operator_id)
}

/// 车间终端上报的实时状态（不经 outbox）
pub fn live_status(operator_id: &str) -> String {
    format!("operator_status/{}", operator_id)
}

pub fn work_item(work_item_id: &str) -> String {
    format!("work_items/{}", work_item_id)
}

pub fn assignment(assignment_id: &str) -> String {
    format!("assignments/{}", assignment_id)
}

pub fn damage_report(work_item_id: &str, report_id: &str) -> String {
    format!("damage_reports/{}/{}", work_item_id, report_id)
}

pub fn quality_alert(report_id: &str) -> String {
    format!("quality_alerts/{}", report_id)
}

pub fn inspection(work_item_id: &str, inspection_id: &str) -> String {
    format!("quality_inspections/{}/{}", work_item_id, inspection_id)
}

pub fn payment(operator_id: &str, payment_id: &str) -> String {
    format!("payments/{}/{}", operator_id, payment_id)
}
