//! 用户目录数据模型
//!
//! 接收人资料与推送设备是外部只读实体，活动系统只在投递时根据推送服务商
//! 的反馈把失效设备标记为不活跃。

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 设备平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Some(Self::Ios),
            "android" => Some(Self::Android),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 推送设备
///
/// `id` 为推送服务商分配的 player/device ID，对活动系统是不透明字符串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub platform: Platform,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

impl Device {
    pub fn new(id: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: id.into(),
            platform,
            active: true,
            registered_at: Utc::now(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// 所在地
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

/// 接收人资料
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub name: Option<String>,
    pub location: Option<Location>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub profile_pictures: Vec<String>,
    pub interests: Vec<String>,
    pub is_verified: bool,
    pub is_premium: bool,
    pub date_joined: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
    pub devices: Vec<Device>,
}

/// 资料完整度要求的兴趣标签数量区间（闭区间）
pub const PROFILE_INTERESTS_MIN: usize = 1;
pub const PROFILE_INTERESTS_MAX: usize = 5;

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            location: None,
            gender: None,
            birth_date: None,
            profile_pictures: Vec::new(),
            interests: Vec::new(),
            is_verified: false,
            is_premium: false,
            date_joined: Utc::now(),
            last_active: None,
            devices: Vec::new(),
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.is_verified = verified;
        self
    }

    pub fn active_devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.active)
    }

    pub fn has_active_device(&self) -> bool {
        self.devices.iter().any(|d| d.active)
    }

    pub fn has_profile_picture(&self) -> bool {
        !self.profile_pictures.is_empty()
    }

    pub fn city(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.city.as_str())
    }

    pub fn country(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.country.as_str())
    }

    /// 按给定日期计算周岁
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }

    /// 资料是否完整
    ///
    /// 姓名、所在地、性别、出生日期齐全，至少一张头像，兴趣标签 1 到 5 个。
    /// 这是计算字段，无法下推到目录查询。
    pub fn is_profile_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        filled(&self.name)
            && self.location.is_some()
            && filled(&self.gender)
            && self.birth_date.is_some()
            && self.has_profile_picture()
            && (PROFILE_INTERESTS_MIN..=PROFILE_INTERESTS_MAX).contains(&self.interests.len())
    }
}

/// 通知类别
///
/// 接收人可以按类别关闭推送，站内通知不受影响。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Announcement,
    Promotion,
    Reminder,
    Event,
    System,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Announcement => "announcement",
            Self::Promotion => "promotion",
            Self::Reminder => "reminder",
            Self::Event => "event",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 点击通知后客户端执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAction {
    OpenApp,
    OpenProfileEditor,
    OpenEvent,
    OpenOffers,
    OpenInbox,
}

impl TargetAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenApp => "open_app",
            Self::OpenProfileEditor => "open_profile_editor",
            Self::OpenEvent => "open_event",
            Self::OpenOffers => "open_offers",
            Self::OpenInbox => "open_inbox",
        }
    }
}

impl std::fmt::Display for TargetAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
