//! 活动主流程测试套件
//!
//! 创建 → 预览 → 执行 → 收件箱与事件。

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use campaign::CampaignStatus;
    use serde_json::json;

    use crate::assert_campaign_status;
    use crate::assert_inbox_count;
    use crate::data::*;
    use crate::helpers::*;
    use crate::setup::TestEnvironment;

    #[tokio::test]
    async fn test_announcement_full_flow() {
        let mut env = TestEnvironment::new(community_directory());

        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "版本更新"), "admin")
            .await
            .unwrap();
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.template.version, 1);

        let preview = env.service.preview_campaign(campaign.id, "admin").await.unwrap();
        assert_eq!(preview.audience.count, 3);
        assert_eq!(preview.rendered.body, "平台公告：版本更新");
        let sample: BTreeSet<_> = preview.audience.sample_ids.iter().cloned().collect();
        assert_eq!(sample, BTreeSet::from(["alice", "bob", "carol"].map(String::from)));
        assert_campaign_status!(env, campaign.id, CampaignStatus::Previewed);

        let summary = env.service.execute_campaign(campaign.id, "admin").await.unwrap();
        assert_eq!(summary.status, CampaignStatus::Sent);
        assert_eq!(summary.audience_count, 3);
        assert_eq!(summary.total_sent, 3);
        assert_eq!(summary.total_failed, 0);
        assert!(summary.errors.is_empty());
        assert_campaign_status!(env, campaign.id, CampaignStatus::Sent);

        // 只有命中的接收人收到站内通知
        assert_inbox_count!(env, "alice", 1);
        assert_inbox_count!(env, "bob", 1);
        assert_inbox_count!(env, "carol", 1);
        assert_inbox_count!(env, "dave", 0);
        assert_inbox_count!(env, "erin", 0);

        let notification = &env.inbox.list_for("alice")[0];
        assert_eq!(notification.title, "版本更新");
        assert_eq!(notification.payload["campaign_id"], json!(campaign.id));
        assert_eq!(notification.payload["template"], json!("announcement"));

        let kinds: Vec<_> = env.drain_events().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["created", "previewed", "execution_started", "execution_completed"]
        );
    }

    #[tokio::test]
    async fn test_any_group_with_profile_completeness() {
        let env = TestEnvironment::new(community_directory());

        let campaign = env
            .service
            .create_campaign(
                event_invite_request(shanghai_or_premium_complete_rule()),
                "admin",
            )
            .await
            .unwrap();
        let preview = env.service.preview_campaign(campaign.id, "admin").await.unwrap();

        // bob 资料不完整，erin 没有活跃设备
        assert_eq!(
            preview.audience.recipient_ids,
            vec!["alice".to_string(), "carol".to_string(), "dave".to_string()]
        );
        assert_eq!(preview.rendered.title, "活动邀请：周末聚会");

        let summary = env.service.execute_campaign(campaign.id, "admin").await.unwrap();
        assert_eq!(summary.total_sent, 3);

        let records = env.service.list_execution_records(campaign.id).await.unwrap();
        assert_eq!(
            recipients_of(&records),
            BTreeSet::from(["alice", "carol", "dave"].map(String::from))
        );
    }

    #[tokio::test]
    async fn test_schedule_then_execute() {
        let mut env = TestEnvironment::new(community_directory());
        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "周末活动"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();

        let at = chrono::Utc::now() + chrono::Duration::hours(2);
        let scheduled = env
            .service
            .schedule_campaign(campaign.id, at, "admin")
            .await
            .unwrap();
        assert_eq!(scheduled.status, CampaignStatus::Scheduled);
        assert_eq!(scheduled.scheduled_for, Some(at));

        let summary = env.service.execute_campaign(campaign.id, "scheduler").await.unwrap();
        assert_eq!(summary.total_sent, 3);

        let kinds: Vec<_> = env.drain_events().iter().map(|e| e.kind()).collect();
        assert!(kinds.contains(&"scheduled"));
    }

    #[tokio::test]
    async fn test_edit_requires_new_preview() {
        let env = TestEnvironment::new(community_directory());
        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "旧标题"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();

        let update = campaign::CampaignUpdate {
            variables: Some(variables(&[("headline", "新标题")])),
            ..Default::default()
        };
        let edited = env
            .service
            .update_campaign(campaign.id, update, "admin")
            .await
            .unwrap();
        assert_eq!(edited.status, CampaignStatus::Draft);
        assert_eq!(edited.preview_count, None);

        let err = env
            .service
            .execute_campaign(campaign.id, "admin")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PREVIEW_REQUIRED");

        let preview = env.service.preview_campaign(campaign.id, "admin").await.unwrap();
        assert_eq!(preview.rendered.body, "平台公告：新标题");
        env.service.execute_campaign(campaign.id, "admin").await.unwrap();
        assert_eq!(env.inbox.list_for("bob")[0].title, "新标题");
    }
}
