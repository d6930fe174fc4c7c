//! 数据一致性测试套件
//!
//! 验证并发执行下的单次投递保证，以及汇总、执行记录、站内通知三者的一致性。

#[cfg(test)]
mod tests {
    use campaign::{CampaignError, CampaignStatus};
    use campaign_shared::test_utils::seeded_directory;
    use futures::future::join_all;

    use crate::data::*;
    use crate::helpers::*;
    use crate::setup::TestEnvironment;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_execute_delivers_once() {
        let env = TestEnvironment::new(seeded_directory(12, 4));
        let campaign = env
            .service
            .create_campaign(announcement_request(verified_rule(), "并发"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();

        let attempts = (0..8).map(|i| {
            let service = env.service.clone();
            let id = campaign.id;
            tokio::spawn(async move { service.execute_campaign(id, &format!("admin-{i}")).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "只能有一次执行成功");
        for loser in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(loser, CampaignError::State(_)), "unexpected error: {loser}");
        }

        let summary = winners[0];
        assert_eq!(summary.total_sent, 12);

        let records = env.service.list_execution_records(campaign.id).await.unwrap();
        assert_eq!(records.len(), 12);
        assert_records_match_totals(&records, summary.total_sent, summary.total_failed);
        assert_eq!(env.inbox.count(), 12);
    }

    #[tokio::test]
    async fn test_stored_totals_match_records_and_inbox() {
        let env = TestEnvironment::new(community_directory());
        let campaign = env
            .service
            .create_campaign(
                event_invite_request(shanghai_or_premium_complete_rule()),
                "admin",
            )
            .await
            .unwrap();
        env.service.preview_campaign(campaign.id, "admin").await.unwrap();
        env.service.execute_campaign(campaign.id, "admin").await.unwrap();

        let stored = env.service.get_campaign(campaign.id).await.unwrap();
        assert_eq!(stored.preview_count, Some(3));
        assert!(stored.sent_at.is_some());

        let records = env.service.list_execution_records(campaign.id).await.unwrap();
        assert_records_match_totals(&records, stored.total_sent, stored.total_failed);
        assert_eq!(
            env.service.count_execution_records(campaign.id).await.unwrap(),
            records.len() as u64
        );

        for recipient in recipients_of(&records) {
            let inbox = env.inbox.list_for(&recipient);
            assert_eq!(inbox.len(), 1, "{recipient} 应当恰好收到一条站内通知");
            assert_eq!(inbox[0].payload["campaign_id"], serde_json::json!(campaign.id));
        }
    }

    #[tokio::test]
    async fn test_list_campaigns_by_status() {
        let env = TestEnvironment::new(community_directory());
        let sent = env
            .service
            .create_campaign(announcement_request(verified_rule(), "一"), "admin")
            .await
            .unwrap();
        let draft = env
            .service
            .create_campaign(announcement_request(verified_rule(), "二"), "admin")
            .await
            .unwrap();
        env.service.preview_campaign(sent.id, "admin").await.unwrap();
        env.service.execute_campaign(sent.id, "admin").await.unwrap();

        let drafts = env.service.list_campaigns(CampaignStatus::Draft).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, draft.id);

        let sent_list = env.service.list_campaigns(CampaignStatus::Sent).await.unwrap();
        assert_eq!(sent_list.len(), 1);
        assert_eq!(sent_list[0].id, sent.id);
    }
}
