//! 受众规则引擎集成测试
//!
//! 测试完整的规则解析、编译、目录查询与后置过滤工作流。

use campaign_shared::directory::MemoryDirectory;
use campaign_shared::models::{Device, Platform};
use campaign_shared::test_utils::RecipientBuilder;
use chrono::{TimeZone, Utc};
use rule_engine::{AudienceEngine, AudienceRule, AudienceRuleSpec, RuleError};
use serde_json::json;

/// 构造一个覆盖多种资料形态的目录
fn create_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    directory.insert_many([
        RecipientBuilder::new("alice")
            .verified(true)
            .gender("female")
            .location("Lagos", "NG")
            .birth_date(1995, 4, 2)
            .interests(&["music", "travel"])
            .build(),
        RecipientBuilder::new("bola")
            .verified(true)
            .gender("male")
            .location("Accra", "GH")
            .birth_date(1988, 11, 20)
            .premium(true)
            .build(),
        RecipientBuilder::new("chidi")
            .verified(false)
            .gender("male")
            .location("Lagos", "NG")
            .birth_date(2003, 1, 9)
            .interests(&["sports"])
            .build(),
        RecipientBuilder::new("dayo")
            .verified(true)
            .complete_profile()
            .location("Cape Town", "ZA")
            .without_devices()
            .device(Device::new("dayo-web", Platform::Web))
            .build(),
        // 没有活跃设备，任何规则都不应命中
        RecipientBuilder::new("emeka")
            .verified(true)
            .location("Lagos", "NG")
            .inactive_devices()
            .build(),
    ]);
    directory
}

fn as_of() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

async fn evaluate(spec: serde_json::Value) -> Result<Vec<String>, RuleError> {
    let engine = AudienceEngine::default();
    let rule = engine.validate(&AudienceRuleSpec::from_value(spec)?)?;
    let result = engine.evaluate_at(&rule, &create_directory(), as_of()).await?;
    Ok(result.recipient_ids)
}

// ==================== 组合语义 ====================

#[tokio::test]
async fn test_all_group_is_conjunction() {
    let ids = evaluate(json!({
        "all": [
            {"field": "is_verified", "op": "=", "value": true},
            {"field": "country", "op": "=", "value": "NG"}
        ]
    }))
    .await
    .unwrap();
    assert_eq!(ids, vec!["alice"]);
}

#[tokio::test]
async fn test_any_group_is_disjunction() {
    let ids = evaluate(json!({
        "any": [
            {"field": "is_premium", "op": "=", "value": "TRUE"},
            {"field": "interests", "op": "contains", "value": "sports"}
        ]
    }))
    .await
    .unwrap();
    assert_eq!(ids, vec!["bola", "chidi"]);
}

#[tokio::test]
async fn test_groups_combine_with_and() {
    let ids = evaluate(json!({
        "all": [{"field": "gender", "operator": "=", "value": "male"}],
        "any": [
            {"field": "age", "operator": "<=", "value": 25},
            {"field": "country", "operator": "in", "value": ["GH"]}
        ]
    }))
    .await
    .unwrap();
    assert_eq!(ids, vec!["bola", "chidi"]);
}

// ==================== 计算字段与设备 ====================

#[tokio::test]
async fn test_profile_complete_combined_with_platform() {
    let ids = evaluate(json!({
        "all": [
            {"field": "profile_complete", "op": "=", "value": 1},
            {"field": "platform", "op": "=", "value": "web"}
        ]
    }))
    .await
    .unwrap();
    assert_eq!(ids, vec!["dayo"]);
}

#[tokio::test]
async fn test_recipients_without_active_devices_excluded() {
    let ids = evaluate(json!({
        "all": [{"field": "is_verified", "op": "=", "value": true}]
    }))
    .await
    .unwrap();
    assert!(!ids.contains(&"emeka".to_string()));
    assert_eq!(ids.len(), 3);
}

// ==================== 校验 ====================

#[tokio::test]
async fn test_validation_errors_name_field_and_operator() {
    let err = evaluate(json!({"all": [{"field": "is_staff", "op": "=", "value": true}]}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("is_staff"));

    let err = evaluate(json!({"all": [{"field": "city", "op": "not_in", "value": ["Lagos"]}]}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuleError::DisallowedOperator { ref field, ref operator } if field == "city" && operator == "not_in"
    ));

    let err = evaluate(json!({})).await.unwrap_err();
    assert!(matches!(err, RuleError::EmptyRule));
}

#[tokio::test]
async fn test_persisted_rule_round_trips_through_json() {
    let engine = AudienceEngine::default();
    let spec = AudienceRuleSpec::from_value(json!({
        "all": [{"field": "is_verified", "op": "!=", "value": "false"}],
        "any": [{"field": "last_active", "op": "within_days", "value": "30"}]
    }))
    .unwrap();
    let rule = engine.validate(&spec).unwrap();

    let stored = serde_json::to_string(&rule).unwrap();
    let restored: AudienceRule = serde_json::from_str(&stored).unwrap();
    assert_eq!(restored, rule);
}
