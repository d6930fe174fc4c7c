//! 取消与非法状态转换测试套件

#[cfg(test)]
mod tests {
    use campaign::{CampaignError, CampaignStatus, StateError};
    use campaign_shared::events::CampaignEvent;

    use crate::assert_campaign_status;
    use crate::data::*;
    use crate::setup::TestEnvironment;

    #[tokio::test]
    async fn test_cancel_previewed_campaign() {
        let mut env = TestEnvironment::new(community_directory());
        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "取消测试"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();

        let cancelled = env
            .service
            .cancel_campaign(campaign.id, "ops", "文案需要调整")
            .await
            .unwrap();
        assert_eq!(cancelled.status, CampaignStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("文案需要调整"));
        assert!(cancelled.cancelled_at.is_some());

        let last = env.drain_events().pop().unwrap();
        assert!(matches!(
            last,
            CampaignEvent::Cancelled { ref actor, ref reason, .. }
                if actor == "ops" && reason == "文案需要调整"
        ));

        // 取消后不可再执行，也没有任何投递
        let err = env
            .service
            .execute_campaign(campaign.id, "admin")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CampaignError::State(StateError::IllegalTransition {
                status: CampaignStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(env.inbox.count(), 0);
        assert_eq!(env.service.count_execution_records(campaign.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sent_campaign_cannot_be_cancelled_or_edited() {
        let env = TestEnvironment::new(community_directory());
        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "已发送"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();
        env.service.execute_campaign(campaign.id, "admin").await.unwrap();

        let err = env
            .service
            .cancel_campaign(campaign.id, "ops", "太晚了")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ILLEGAL_STATE_TRANSITION");

        let update = campaign::CampaignUpdate {
            name: Some("改名".to_string()),
            ..Default::default()
        };
        let err = env
            .service
            .update_campaign(campaign.id, update, "admin")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CampaignError::State(StateError::IllegalTransition {
                status: CampaignStatus::Sent,
                ..
            })
        ));
        assert_campaign_status!(env, campaign.id, CampaignStatus::Sent);
    }

    #[tokio::test]
    async fn test_audience_above_limit_is_rejected_without_side_effects() {
        let env = TestEnvironment::with_config(
            community_directory(),
            crate::setup::TestEnvConfig::default().with_max_audience(2),
        );
        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "超限"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();

        let err = env
            .service
            .execute_campaign(campaign.id, "admin")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CampaignError::RateLimitExceeded {
                audience_size: 3,
                max: 2
            }
        ));
        assert_campaign_status!(env, campaign.id, CampaignStatus::Previewed);
        assert_eq!(env.records.total(), 0);
        assert_eq!(env.inbox.count(), 0);
    }
}
