//! 通知模板
//!
//! 模板键是封闭集合，每个键声明自己的必需变量。模板版本发布后不可修改，
//! 修改内容即发布新版本；活动创建时冻结所引用的版本。
//!
//! 渲染采用 `{{variable}}` 语法的字面替换，不支持嵌套与转义：
//!
//! ```ignore
//! let template = Template::new(TemplateKey::ProfileReminder, "完善资料", "{{first_name}}，上传一张头像吧")?;
//! let rendered = TemplateRenderer.render(&template, &variables)?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use campaign_shared::models::{NotificationCategory, TargetAction};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{TemplateError, TemplateRenderError};

/// 合法占位符，变量名限定为 ASCII 标识符
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("占位符正则表达式合法")
});

/// 任意形似占位符的片段
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("占位符正则表达式合法"));

/// 文本中引用的变量名
pub fn placeholders(text: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn leftover_tokens(text: &str) -> Vec<String> {
    TOKEN.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// 模板键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKey {
    Announcement,
    ProfileReminder,
    EventInvite,
    ReEngagement,
    Promotion,
}

impl TemplateKey {
    pub const ALL: [TemplateKey; 5] = [
        Self::Announcement,
        Self::ProfileReminder,
        Self::EventInvite,
        Self::ReEngagement,
        Self::Promotion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Announcement => "announcement",
            Self::ProfileReminder => "profile_reminder",
            Self::EventInvite => "event_invite",
            Self::ReEngagement => "re_engagement",
            Self::Promotion => "promotion",
        }
    }

    /// 该键的模板必须引用、渲染时必须提供的变量
    pub fn required_variables(&self) -> &'static [&'static str] {
        match self {
            Self::Announcement => &["headline"],
            Self::ProfileReminder => &["first_name"],
            Self::EventInvite => &["event_name", "event_date"],
            Self::ReEngagement => &["first_name", "days_inactive"],
            Self::Promotion => &["offer", "expires_on"],
        }
    }

    pub fn default_category(&self) -> NotificationCategory {
        match self {
            Self::Announcement => NotificationCategory::Announcement,
            Self::ProfileReminder | Self::ReEngagement => NotificationCategory::Reminder,
            Self::EventInvite => NotificationCategory::Event,
            Self::Promotion => NotificationCategory::Promotion,
        }
    }

    pub fn default_target_action(&self) -> TargetAction {
        match self {
            Self::Announcement => TargetAction::OpenInbox,
            Self::ProfileReminder => TargetAction::OpenProfileEditor,
            Self::EventInvite => TargetAction::OpenEvent,
            Self::ReEngagement => TargetAction::OpenApp,
            Self::Promotion => TargetAction::OpenOffers,
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("未知的模板键: {s}"))
    }
}

/// 通知模板
///
/// `version` 为 0 表示尚未发布，由 `TemplateStore::publish` 分配版本号。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub key: TemplateKey,
    pub version: u32,
    pub title: String,
    pub body: String,
    pub target_action: TargetAction,
    pub category: NotificationCategory,
    pub created_at: DateTime<Utc>,
}

impl Template {
    /// 创建模板并按模板键的变量约定校验占位符
    pub fn new(
        key: TemplateKey,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let title = title.into();
        let body = body.into();

        for (part, text) in [("标题", &title), ("正文", &body)] {
            if text.trim().is_empty() {
                return Err(TemplateError::EmptyText { key, part });
            }
        }

        let declared: BTreeSet<&str> = key.required_variables().iter().copied().collect();
        for text in [&title, &body] {
            if let Some(token) = leftover_tokens(text).into_iter().find(|token| {
                !PLACEHOLDER.is_match(token)
                    || !declared.contains(token.trim_start_matches("{{").trim_end_matches("}}"))
            }) {
                return Err(TemplateError::UnknownPlaceholder {
                    key,
                    placeholder: token,
                });
            }
        }

        let used = &placeholders(&title) | &placeholders(&body);
        if let Some(variable) = declared.iter().find(|v| !used.contains(**v)) {
            return Err(TemplateError::MissingPlaceholder {
                key,
                variable: variable.to_string(),
            });
        }

        Ok(Self {
            key,
            version: 0,
            title,
            body,
            target_action: key.default_target_action(),
            category: key.default_category(),
            created_at: Utc::now(),
        })
    }

    pub fn with_category(mut self, category: NotificationCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_target_action(mut self, target_action: TargetAction) -> Self {
        self.target_action = target_action;
        self
    }

    /// 标题与正文中引用的变量
    pub fn referenced_variables(&self) -> BTreeSet<String> {
        &placeholders(&self.title) | &placeholders(&self.body)
    }
}

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedNotification {
    pub title: String,
    pub body: String,
    pub target_action: TargetAction,
    pub category: NotificationCategory,
}

/// 模板渲染器
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// 校验变量集合与模板引用的变量完全一致
    pub fn check_variables<V>(
        &self,
        template: &Template,
        variables: &V,
    ) -> Result<(), TemplateRenderError>
    where
        V: VariableLookup,
    {
        let referenced = template.referenced_variables();

        let missing: Vec<String> = referenced
            .iter()
            .filter(|name| variables.lookup(name).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TemplateRenderError::MissingVariables { names: missing });
        }

        let mut unexpected: Vec<String> = variables
            .names()
            .into_iter()
            .filter(|name| !referenced.contains(name))
            .collect();
        if !unexpected.is_empty() {
            unexpected.sort();
            return Err(TemplateRenderError::UnexpectedVariables { names: unexpected });
        }

        Ok(())
    }

    /// 渲染模板
    pub fn render<V>(
        &self,
        template: &Template,
        variables: &V,
    ) -> Result<RenderedNotification, TemplateRenderError>
    where
        V: VariableLookup,
    {
        self.check_variables(template, variables)?;

        let title = substitute(&template.title, variables);
        let body = substitute(&template.body, variables);

        let tokens: Vec<String> = leftover_tokens(&title)
            .into_iter()
            .chain(leftover_tokens(&body))
            .collect();
        if !tokens.is_empty() {
            return Err(TemplateRenderError::UnresolvedPlaceholders { tokens });
        }

        Ok(RenderedNotification {
            title,
            body,
            target_action: template.target_action,
            category: template.category,
        })
    }
}

fn substitute<V: VariableLookup>(text: &str, variables: &V) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match variables.lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// 渲染时的变量来源
pub trait VariableLookup {
    fn lookup(&self, name: &str) -> Option<&str>;
    fn names(&self) -> Vec<String>;
}

impl VariableLookup for std::collections::BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }

    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl VariableLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }

    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

/// 模板存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// 发布新版本，版本号按键单调递增
    async fn publish(&self, template: Template) -> Result<Template, TemplateError>;

    async fn get(&self, key: TemplateKey, version: u32) -> Result<Template, TemplateError>;

    async fn latest(&self, key: TemplateKey) -> Result<Template, TemplateError>;
}

/// 内存模板存储
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    versions: std::sync::Arc<DashMap<TemplateKey, Vec<Template>>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带有默认模板的存储，每个键发布一个版本
    pub fn with_defaults() -> Result<Self, TemplateError> {
        let store = Self::new();
        let defaults = [
            (TemplateKey::Announcement, "{{headline}}", "平台公告：{{headline}}"),
            (
                TemplateKey::ProfileReminder,
                "完善个人资料",
                "{{first_name}}，完善个人资料可以让更多人认识你！",
            ),
            (
                TemplateKey::EventInvite,
                "活动邀请：{{event_name}}",
                "{{event_name}} 将于 {{event_date}} 开始，快来报名吧！",
            ),
            (
                TemplateKey::ReEngagement,
                "{{first_name}}，好久不见",
                "你已经 {{days_inactive}} 天没有登录了，看看有什么新鲜事吧。",
            ),
            (TemplateKey::Promotion, "限时优惠", "{{offer}}，截止 {{expires_on}}。"),
        ];
        for (key, title, body) in defaults {
            store.insert_version(Template::new(key, title, body)?);
        }
        Ok(store)
    }

    fn insert_version(&self, mut template: Template) -> Template {
        let mut versions = self.versions.entry(template.key).or_default();
        template.version = versions.len() as u32 + 1;
        template.created_at = Utc::now();
        versions.push(template.clone());
        template
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn publish(&self, template: Template) -> Result<Template, TemplateError> {
        let published = self.insert_version(template);
        info!(
            key = %published.key,
            version = published.version,
            "模板新版本已发布"
        );
        Ok(published)
    }

    async fn get(&self, key: TemplateKey, version: u32) -> Result<Template, TemplateError> {
        self.versions
            .get(&key)
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|template| template.version == version)
                    .cloned()
            })
            .ok_or(TemplateError::NotFound { key, version })
    }

    async fn latest(&self, key: TemplateKey) -> Result<Template, TemplateError> {
        self.versions
            .get(&key)
            .and_then(|versions| versions.last().cloned())
            .ok_or(TemplateError::NoPublishedVersion { key })
    }
}
