mod common;

use chrono::{Duration, Utc};
use common::TestEngine;
use groupbuy_backend::error::{AppError, CampaignError, PledgeError};
use groupbuy_backend::pledge::models::PledgeStatus;
use groupbuy_backend::pledge::repository::PledgeRepository;

#[tokio::test]
async fn test_create_pledge_while_active() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let pledge = engine.pledges.create(campaign.id, buyer.id, 40).await.unwrap();
    assert_eq!(pledge.status, PledgeStatus::Pending);
    assert_eq!(pledge.quantity, 40);
    assert!(pledge.committed_at.is_none());
}

#[tokio::test]
async fn test_create_pledge_requires_active_organization() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.inactive_org("dormant-buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let err = engine
        .pledges
        .create(campaign.id, buyer.id, 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Pledge(PledgeError::OrganizationNotActive(_))
    ));
}

#[tokio::test]
async fn test_create_pledge_rejected_while_draft() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.draft_campaign(&supplier).await;

    let err = engine
        .pledges
        .create(campaign.id, buyer.id, 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Campaign(CampaignError::PhaseViolation { .. })
    ));
}

#[tokio::test]
async fn test_duplicate_pledge_fails() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    engine.pledges.create(campaign.id, buyer.id, 40).await.unwrap();
    let err = engine
        .pledges
        .create(campaign.id, buyer.id, 25)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Pledge(PledgeError::DuplicateCommitment)
    ));
}

#[tokio::test]
async fn test_withdrawn_pledge_is_reactivated_in_place() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let original = engine.pledges.create(campaign.id, buyer.id, 40).await.unwrap();
    engine.pledges.cancel(original.id, buyer.id).await.unwrap();

    // Creating again reuses the same row with the new quantity
    let revived = engine.pledges.create(campaign.id, buyer.id, 15).await.unwrap();
    assert_eq!(revived.id, original.id);
    assert_eq!(revived.status, PledgeStatus::Pending);
    assert_eq!(revived.quantity, 15);
    assert!(revived.committed_at.is_none());

    let rows = engine.pledge_repo.find_by_campaign(campaign.id).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_concurrent_creates_leave_exactly_one_row() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let (a, b) = tokio::join!(
        engine.pledges.create(campaign.id, buyer.id, 40),
        engine.pledges.create(campaign.id, buyer.id, 55),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(AppError::Pledge(PledgeError::DuplicateCommitment))
    )));

    let rows = engine.pledge_repo.find_by_campaign(campaign.id).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_update_quantity_only_while_active_and_owned() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let other = engine.org("other-buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let pledge = engine.pledges.create(campaign.id, buyer.id, 40).await.unwrap();

    let updated = engine.pledges.update(pledge.id, buyer.id, 70).await.unwrap();
    assert_eq!(updated.quantity, 70);

    let err = engine.pledges.update(pledge.id, other.id, 5).await.unwrap_err();
    assert!(matches!(err, AppError::Pledge(PledgeError::AccessDenied(_))));

    // Grace period freezes quantities
    engine
        .campaigns
        .advance_due(campaign.ends_at - Duration::hours(1))
        .await
        .unwrap();
    let err = engine.pledges.update(pledge.id, buyer.id, 90).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Campaign(CampaignError::PhaseViolation { .. })
    ));

    let stored = engine.pledge_repo.find(pledge.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 70);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let pledge = engine.pledges.create(campaign.id, buyer.id, 40).await.unwrap();
    let withdrawn = engine.pledges.cancel(pledge.id, buyer.id).await.unwrap();
    assert_eq!(withdrawn.status, PledgeStatus::Withdrawn);

    // Second cancel is a no-op, not an error
    let again = engine.pledges.cancel(pledge.id, buyer.id).await.unwrap();
    assert_eq!(again.status, PledgeStatus::Withdrawn);
}

#[tokio::test]
async fn test_commit_outside_grace_period_is_a_phase_violation() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let pledge = engine.pledges.create(campaign.id, buyer.id, 40).await.unwrap();
    let err = engine.pledges.commit(pledge.id, buyer.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Campaign(CampaignError::PhaseViolation { .. })
    ));

    let stored = engine.pledge_repo.find(pledge.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Pending);
}

#[tokio::test]
async fn test_commit_during_grace_period_stamps_commit_time() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let pledge = engine.pledges.create(campaign.id, buyer.id, 40).await.unwrap();
    engine
        .campaigns
        .advance_due(campaign.ends_at - Duration::hours(1))
        .await
        .unwrap();

    let before = Utc::now();
    let committed = engine.pledges.commit(pledge.id, buyer.id).await.unwrap();
    assert_eq!(committed.status, PledgeStatus::Committed);
    let stamp = committed.committed_at.unwrap();
    assert!(stamp >= before && stamp <= Utc::now());

    // Committing twice fails
    let err = engine.pledges.commit(pledge.id, buyer.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Pledge(PledgeError::InvalidStatus { .. })
    ));
}

#[tokio::test]
async fn test_pledges_can_still_be_created_during_grace_period() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("late-buyer").await;
    let campaign = engine.grace_campaign(&supplier).await;

    let pledge = engine.pledges.create(campaign.id, buyer.id, 20).await.unwrap();
    assert_eq!(pledge.status, PledgeStatus::Pending);
}

#[tokio::test]
async fn test_sweep_withdraws_only_pending_pledges() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let committed_buyer = engine.org("committed-buyer").await;
    let silent_buyer = engine.org("silent-buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let committed = engine
        .pledges
        .create(campaign.id, committed_buyer.id, 60)
        .await
        .unwrap();
    let silent = engine
        .pledges
        .create(campaign.id, silent_buyer.id, 30)
        .await
        .unwrap();

    engine
        .campaigns
        .advance_due(campaign.ends_at - Duration::hours(1))
        .await
        .unwrap();
    engine.pledges.commit(committed.id, committed_buyer.id).await.unwrap();

    let swept = engine.pledges.sweep_uncommitted(campaign.id).await.unwrap();
    assert_eq!(swept, 1);

    let committed_row = engine.pledge_repo.find(committed.id).await.unwrap().unwrap();
    let silent_row = engine.pledge_repo.find(silent.id).await.unwrap().unwrap();
    assert_eq!(committed_row.status, PledgeStatus::Committed);
    assert_eq!(silent_row.status, PledgeStatus::Withdrawn);
}

#[tokio::test]
async fn test_aggregate_quantities() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer_a = engine.org("buyer-a").await;
    let buyer_b = engine.org("buyer-b").await;
    let buyer_c = engine.org("buyer-c").await;
    let campaign = engine.active_campaign(&supplier).await;

    engine.pledges.create(campaign.id, buyer_a.id, 50).await.unwrap();
    let b = engine.pledges.create(campaign.id, buyer_b.id, 40).await.unwrap();
    let c = engine.pledges.create(campaign.id, buyer_c.id, 30).await.unwrap();
    engine.pledges.cancel(c.id, buyer_c.id).await.unwrap();

    engine
        .campaigns
        .advance_due(campaign.ends_at - Duration::hours(1))
        .await
        .unwrap();
    engine.pledges.commit(b.id, buyer_b.id).await.unwrap();

    // Withdrawn quantity never counts; committed + pending drive progress
    assert_eq!(engine.pledges.active_quantity(campaign.id).await.unwrap(), 90);
    assert_eq!(engine.pledges.committed_quantity(campaign.id).await.unwrap(), 40);
}

#[tokio::test]
async fn test_non_positive_quantity_is_rejected() {
    let engine = TestEngine::new();
    let supplier = engine.org("supplier").await;
    let buyer = engine.org("buyer").await;
    let campaign = engine.active_campaign(&supplier).await;

    let err = engine.pledges.create(campaign.id, buyer.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let pledge = engine.pledges.create(campaign.id, buyer.id, 10).await.unwrap();
    let err = engine.pledges.update(pledge.id, buyer.id, -5).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}
