//! 条件评估器
//!
//! 在单个接收人资料上评估已编译的规则叶子。所有值在编译阶段已经校验过，
//! 这里只做比较，不会失败。

use campaign_shared::models::Recipient;
use chrono::{DateTime, Duration, Utc};

use crate::models::{AudienceRule, RuleLeaf};

/// 字符串比较忽略 ASCII 大小写
fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn one_of(value: Option<&str>, list: &[String]) -> bool {
    value.is_some_and(|v| list.iter().any(|item| same(v, item)))
}

impl RuleLeaf {
    /// 评估叶子
    ///
    /// `as_of` 是本次评估的基准时间，年龄与“最近 N 天活跃”都以它为准，
    /// 保证同一次评估内结果一致。缺失的资料字段不匹配任何正向条件。
    pub fn matches(&self, recipient: &Recipient, as_of: DateTime<Utc>) -> bool {
        match self {
            Self::IsVerified(expected) => recipient.is_verified == *expected,
            Self::IsPremium(expected) => recipient.is_premium == *expected,
            Self::HasProfilePicture(expected) => recipient.has_profile_picture() == *expected,
            Self::ProfileComplete(expected) => recipient.is_profile_complete() == *expected,

            Self::GenderEq(g) => recipient.gender.as_deref().is_some_and(|v| same(v, g)),
            Self::GenderNeq(g) => !recipient.gender.as_deref().is_some_and(|v| same(v, g)),
            Self::GenderIn(list) => one_of(recipient.gender.as_deref(), list),

            Self::CountryEq(c) => recipient.country().is_some_and(|v| same(v, c)),
            Self::CountryIn(list) => one_of(recipient.country(), list),
            Self::CountryNotIn(list) => !one_of(recipient.country(), list),
            Self::CityEq(c) => recipient.city().is_some_and(|v| same(v, c)),
            Self::CityIn(list) => one_of(recipient.city(), list),

            Self::AgeGte(min) => Self::age(recipient, as_of).is_some_and(|a| a >= *min),
            Self::AgeLte(max) => Self::age(recipient, as_of).is_some_and(|a| a <= *max),
            Self::AgeBetween { min, max } => {
                Self::age(recipient, as_of).is_some_and(|a| a >= *min && a <= *max)
            }

            Self::JoinedBefore(t) => recipient.date_joined < *t,
            Self::JoinedAfter(t) => recipient.date_joined > *t,
            Self::LastActiveBefore(t) => recipient.last_active.is_some_and(|v| v < *t),
            Self::LastActiveAfter(t) => recipient.last_active.is_some_and(|v| v > *t),
            Self::LastActiveWithinDays(days) => {
                let since = as_of - Duration::days(i64::from(*days));
                recipient.last_active.is_some_and(|v| v >= since)
            }

            Self::InterestsContains(tag) => recipient.interests.iter().any(|i| same(i, tag)),
            Self::InterestsContainsAny(tags) => recipient
                .interests
                .iter()
                .any(|i| tags.iter().any(|t| same(i, t))),

            Self::PlatformEq(platform) => recipient
                .active_devices()
                .any(|d| d.platform == *platform),
        }
    }

    fn age(recipient: &Recipient, as_of: DateTime<Utc>) -> Option<u32> {
        recipient.age_on(as_of.date_naive())
    }
}

/// 全部满足（空组视为满足）
pub fn matches_all(leaves: &[RuleLeaf], recipient: &Recipient, as_of: DateTime<Utc>) -> bool {
    leaves.iter().all(|leaf| leaf.matches(recipient, as_of))
}

/// 任一满足（空组视为满足）
pub fn matches_any(leaves: &[RuleLeaf], recipient: &Recipient, as_of: DateTime<Utc>) -> bool {
    leaves.is_empty() || leaves.iter().any(|leaf| leaf.matches(recipient, as_of))
}

impl AudienceRule {
    /// 在单个接收人上评估完整规则，包括隐含的活跃设备条件
    pub fn matches(&self, recipient: &Recipient, as_of: DateTime<Utc>) -> bool {
        recipient.has_active_device()
            && matches_all(self.all(), recipient, as_of)
            && matches_any(self.any(), recipient, as_of)
    }
}
