//! 测试 fixtures
//!
//! 社区目录：
//!
//! | ID | 认证 | 会员 | 城市 | 资料完整 | 设备 |
//! |----|------|------|------|----------|------|
//! | alice | 是 | 是 | Shanghai | 是 | 1 台活跃 |
//! | bob | 是 | 否 | Beijing | 否 | 1 台活跃 |
//! | carol | 是 | 否 | Shanghai | 是 | 1 台活跃 |
//! | dave | 否 | 是 | Chengdu | 是 | 1 台活跃 |
//! | erin | 是 | 否 | Shanghai | 否 | 仅不活跃设备 |

use campaign::{NewCampaign, TemplateKey, Variables};
use campaign_shared::directory::MemoryDirectory;
use campaign_shared::models::{Device, Platform};
use campaign_shared::test_utils::RecipientBuilder;
use rule_engine::AudienceRuleSpec;
use serde_json::{Value, json};

pub const ALICE_DEVICE: &str = "alice-iphone";
pub const BOB_DEVICE: &str = "bob-pixel";
pub const CAROL_DEVICE: &str = "carol-ipad";
pub const DAVE_DEVICE: &str = "dave-iphone";

fn member(id: &str, device: &str, platform: Platform) -> RecipientBuilder {
    RecipientBuilder::new(id)
        .without_devices()
        .device(Device::new(device, platform))
}

/// 构造社区目录
pub fn community_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();

    directory.insert_many([
        member("alice", ALICE_DEVICE, Platform::Ios)
            .complete_profile()
            .verified(true)
            .premium(true)
            .location("Shanghai", "CN")
            .build(),
        member("bob", BOB_DEVICE, Platform::Android)
            .verified(true)
            .location("Beijing", "CN")
            .build(),
        member("carol", CAROL_DEVICE, Platform::Ios)
            .complete_profile()
            .verified(true)
            .location("Shanghai", "CN")
            .build(),
        member("dave", DAVE_DEVICE, Platform::Ios)
            .complete_profile()
            .premium(true)
            .location("Chengdu", "CN")
            .build(),
        RecipientBuilder::new("erin")
            .inactive_devices()
            .verified(true)
            .location("Shanghai", "CN")
            .build(),
    ]);

    directory
}

/// 解析规则 JSON
pub fn rule(value: Value) -> AudienceRuleSpec {
    AudienceRuleSpec::from_value(value).expect("规则 JSON 应当合法")
}

/// 已认证用户
pub fn verified_rule() -> AudienceRuleSpec {
    rule(json!({
        "all": [{"field": "is_verified", "op": "=", "value": true}]
    }))
}

/// 上海或会员用户，且资料完整
pub fn shanghai_or_premium_complete_rule() -> AudienceRuleSpec {
    rule(json!({
        "all": [{"field": "profile_complete", "op": "=", "value": "true"}],
        "any": [
            {"field": "city", "op": "=", "value": "Shanghai"},
            {"field": "is_premium", "op": "=", "value": true}
        ]
    }))
}

pub fn variables(pairs: &[(&str, &str)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 公告活动请求
pub fn announcement_request(audience: AudienceRuleSpec, headline: &str) -> NewCampaign {
    NewCampaign {
        name: format!("公告：{headline}"),
        audience,
        template_key: TemplateKey::Announcement,
        template_version: None,
        variables: variables(&[("headline", headline)]),
    }
}

/// 活动邀请请求
pub fn event_invite_request(audience: AudienceRuleSpec) -> NewCampaign {
    NewCampaign {
        name: "周末聚会邀请".to_string(),
        audience,
        template_key: TemplateKey::EventInvite,
        template_version: None,
        variables: variables(&[("event_name", "周末聚会"), ("event_date", "2026-11-07")]),
    }
}
