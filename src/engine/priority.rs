// ==========================================
// 服装工厂 ERP - 工单优先级评分
// ==========================================
// 评分 = 紧急程度(2~5) × 2 + 交期档位 + 复杂度(可选) + 客户重要度(可选)
// 交期档位（距交期天数）: ≤0 → 10, ≤1 → 7, ≤3 → 5, ≤7 → 3, 其他/无交期 → 1
// ==========================================

use crate::domain::types::UrgencyLevel;
use crate::domain::work_item::WorkItem;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityInput {
    pub urgency: UrgencyLevel,
    pub due_date: Option<NaiveDate>,
    pub today: NaiveDate,
    /// 1..=5，超出范围截断
    pub complexity: Option<u8>,
    /// 1..=5，超出范围截断
    pub customer_importance: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub score: u32,
    pub urgency_points: u32,
    pub due_date_points: u32,
    pub complexity_points: u32,
    pub customer_points: u32,
    pub days_until_due: Option<i64>,
}

/// 交期档位分
pub fn due_date_points(days_until_due: Option<i64>) -> u32 {
    match days_until_due {
        Some(d) if d <= 0 => 10,
        Some(d) if d <= 1 => 7,
        Some(d) if d <= 3 => 5,
        Some(d) if d <= 7 => 3,
        _ => 1,
    }
}

pub fn calculate_priority_score(input: &PriorityInput) -> PriorityScore {
    let days_until_due = input.due_date.map(|d| (d - input.today).num_days());

    let urgency_points = input.urgency.weight() * 2;
    let due_points = due_date_points(days_until_due);
    let complexity_points = input.complexity.map(|c| c.clamp(1, 5) as u32).unwrap_or(0);
    let customer_points = input
        .customer_importance
        .map(|c| c.clamp(1, 5) as u32)
        .unwrap_or(0);

    PriorityScore {
        score: urgency_points + due_points + complexity_points + customer_points,
        urgency_points,
        due_date_points: due_points,
        complexity_points,
        customer_points,
        days_until_due,
    }
}

/// 工单排序：优先级分降序 → 交期升序(无交期在后) → 创建时间升序
pub fn sort_by_priority(items: Vec<WorkItem>, today: NaiveDate) -> Vec<(WorkItem, PriorityScore)> {
    let mut scored: Vec<(WorkItem, PriorityScore)> = items
        .into_iter()
        .map(|item| {
            let score = calculate_priority_score(&PriorityInput {
                urgency: item.priority,
                due_date: item.due_date,
                today,
                complexity: None,
                customer_importance: None,
            });
            (item, score)
        })
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| {
        sb.score
            .cmp(&sa.score)
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SkillLevel;
    use crate::domain::work_item::NewWorkItem;
    use chrono::{Duration, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn input(urgency: UrgencyLevel, days: Option<i64>) -> PriorityInput {
        PriorityInput {
            urgency,
            due_date: days.map(|d| today() + Duration::days(d)),
            today: today(),
            complexity: None,
            customer_importance: None,
        }
    }

    #[test]
    fn test_due_date_bands() {
        assert_eq!(due_date_points(Some(-3)), 10);
        assert_eq!(due_date_points(Some(0)), 10);
        assert_eq!(due_date_points(Some(1)), 7);
        assert_eq!(due_date_points(Some(2)), 5);
        assert_eq!(due_date_points(Some(3)), 5);
        assert_eq!(due_date_points(Some(7)), 3);
        assert_eq!(due_date_points(Some(8)), 1);
        assert_eq!(due_date_points(None), 1);
    }

    #[test]
    fn test_priority_score_composition() {
        let score = calculate_priority_score(&input(UrgencyLevel::Urgent, Some(0)));
        assert_eq!(score.urgency_points, 10);
        assert_eq!(score.score, 20);

        let score = calculate_priority_score(&input(UrgencyLevel::Low, None));
        assert_eq!(score.score, 5);
    }

    #[test]
    fn test_optional_factors_are_clamped() {
        let mut i = input(UrgencyLevel::Normal, Some(5));
        i.complexity = Some(9);
        i.customer_importance = Some(0);
        let score = calculate_priority_score(&i);
        assert_eq!(score.complexity_points, 5);
        assert_eq!(score.customer_points, 1);
        assert_eq!(score.score, 6 + 3 + 5 + 1);
    }

    #[test]
    fn test_sort_by_priority() {
        let make = |id: &str, urgency: UrgencyLevel, due: Option<i64>| {
            NewWorkItem {
                id: id.to_string(),
                bundle_no: id.to_string(),
                machine_type: "overlock".to_string(),
                required_skill_level: SkillLevel::Beginner,
                priority: urgency,
                estimated_duration: 60,
                total_pieces: 10,
                rate_per_piece: 1.0,
                due_date: due.map(|d| today() + Duration::days(d)),
            }
            .into_work_item(Utc::now())
        };

        let sorted = sort_by_priority(
            vec![
                make("A", UrgencyLevel::Low, None),
                make("B", UrgencyLevel::Urgent, Some(1)),
                make("C", UrgencyLevel::High, Some(0)),
                make("D", UrgencyLevel::High, Some(-1)),
            ],
            today(),
        );
        let ids: Vec<&str> = sorted.iter().map(|(w, _)| w.id.as_str()).collect();
        // B=17, C=18, D=18 (更早交期在前), A=5
        assert_eq!(ids, vec!["D", "C", "B", "A"]);
    }
}
