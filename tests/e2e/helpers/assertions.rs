//! 自定义断言宏和辅助函数
//!
//! 提供针对推送活动系统的专用断言功能。

use std::collections::BTreeSet;

use campaign::ExecutionRecord;

/// 断言活动处于指定状态
#[macro_export]
macro_rules! assert_campaign_status {
    ($env:expr, $campaign_id:expr, $expected:expr) => {
        let campaign = $env.service.get_campaign($campaign_id).await.unwrap();
        assert_eq!(
            campaign.status, $expected,
            "活动 {} 的状态应为 {}，实际为 {}",
            $campaign_id, $expected, campaign.status
        );
    };
}

/// 断言接收人收件箱中的通知数量
#[macro_export]
macro_rules! assert_inbox_count {
    ($env:expr, $recipient_id:expr, $expected:expr) => {
        let count = $env.inbox.list_for($recipient_id).len();
        assert_eq!(
            count, $expected,
            "接收人 {} 的站内通知数量应为 {}，实际为 {}",
            $recipient_id, $expected, count
        );
    };
}

/// 执行记录中的接收人集合
pub fn recipients_of(records: &[ExecutionRecord]) -> BTreeSet<String> {
    records.iter().map(|r| r.recipient_id.clone()).collect()
}

/// 断言执行记录与汇总计数一致：每个接收人一条，成功与失败条数分别匹配
pub fn assert_records_match_totals(records: &[ExecutionRecord], total_sent: u64, total_failed: u64) {
    let unique = recipients_of(records);
    assert_eq!(unique.len(), records.len(), "每个接收人只能有一条执行记录");

    let succeeded = records.iter().filter(|r| r.success).count() as u64;
    let failed = records.len() as u64 - succeeded;
    assert_eq!(succeeded, total_sent, "成功记录数应与 total_sent 一致");
    assert_eq!(failed, total_failed, "失败记录数应与 total_failed 一致");

    for record in records {
        if record.success {
            assert!(record.error.is_none(), "成功记录不应携带错误");
            assert!(record.delivered_at.is_some(), "成功记录应有投递时间");
        } else {
            assert!(record.error.is_some(), "失败记录必须携带错误原因");
        }
    }
}
