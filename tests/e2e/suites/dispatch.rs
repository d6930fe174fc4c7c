//! 推送分发测试套件
//!
//! 验证通知偏好、推送开关与设备失效反馈对活动执行的影响。

#[cfg(test)]
mod tests {
    use campaign_shared::config::DispatchConfig;
    use campaign_shared::models::NotificationCategory;

    use crate::assert_inbox_count;
    use crate::data::*;
    use crate::helpers::*;
    use crate::setup::{TestEnvConfig, TestEnvironment};

    #[tokio::test]
    async fn test_disabled_category_still_writes_inbox() {
        let env = TestEnvironment::new(community_directory());
        env.preferences.disable("carol", NotificationCategory::Event);

        let campaign = env
            .service
            .create_campaign(event_invite_request(verified_rule()), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();
        let summary = env.service.execute_campaign(campaign.id, "admin").await.unwrap();

        // 跳过推送不算失败，站内通知照常保存
        assert_eq!(summary.total_sent, 3);
        assert_eq!(summary.total_failed, 0);
        assert_inbox_count!(env, "carol", 1);
        assert_eq!(
            env.inbox.list_for("carol")[0].category,
            NotificationCategory::Event
        );
    }

    #[tokio::test]
    async fn test_invalid_device_is_deactivated_and_leaves_audience() {
        let env = TestEnvironment::new(community_directory());
        env.provider.mark_invalid(BOB_DEVICE);

        let first = env
            .service
            .create_campaign(announcement_request(verified_rule(), "第一期"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(first.id, "admin").await.unwrap();
        let summary = env.service.execute_campaign(first.id, "admin").await.unwrap();
        assert_eq!(summary.total_sent + summary.total_failed, 3);
        assert!(env.directory.active_devices("bob").unwrap().is_empty());
        assert_inbox_count!(env, "bob", 1);

        // 设备失效后 bob 不再满足活跃设备条件
        let second = env
            .service
            .create_campaign(announcement_request(verified_rule(), "第二期"), "admin")
            .await
            .unwrap();
        let preview = env.service.preview_campaign(second.id, "admin").await.unwrap();
        assert_eq!(preview.audience.count, 2);
        assert!(!preview.audience.recipient_ids.contains(&"bob".to_string()));
    }

    #[tokio::test]
    async fn test_push_disabled_only_writes_inbox() {
        let config = TestEnvConfig {
            dispatch: DispatchConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let env = TestEnvironment::with_config(community_directory(), config);

        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "维护通知"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();
        let summary = env.service.execute_campaign(campaign.id, "admin").await.unwrap();

        assert_eq!(summary.total_sent, 3);
        assert_eq!(env.inbox.count(), 3);
        // 没有调用服务商，设备保持活跃
        assert_eq!(env.directory.active_devices("alice").unwrap().len(), 1);

        let records = env.service.list_execution_records(campaign.id).await.unwrap();
        assert_records_match_totals(&records, summary.total_sent, summary.total_failed);
    }
}
