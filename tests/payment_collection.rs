mod common;

use common::TestEngine;
use groupbuy_backend::error::{AppError, PaymentError};
use groupbuy_backend::gateway::GatewayOutcome;
use groupbuy_backend::payment::models::{PaymentIntent, PaymentIntentStatus, MAX_RETRIES};
use groupbuy_backend::payment::repository::PaymentIntentRepository;
use groupbuy_backend::payment::service::ArDisposition;
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn seeded_intent(engine: &TestEngine) -> PaymentIntent {
    let intent = PaymentIntent::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), dec!(450));
    engine.intent_repo.insert(&intent).await.unwrap();
    intent
}

/// Drive an intent to FAILED_RETRY_n through n checkout/failure rounds
async fn failed_intent(engine: &TestEngine, failures: i32) -> PaymentIntent {
    let intent = seeded_intent(engine).await;
    engine.payments.begin_collection(intent.id).await.unwrap();
    let mut current = engine
        .payments
        .apply_gateway_outcome(intent.id, GatewayOutcome::Failed)
        .await
        .unwrap();
    for _ in 1..failures {
        engine.payments.retry(intent.id).await.unwrap();
        current = engine
            .payments
            .apply_gateway_outcome(intent.id, GatewayOutcome::Failed)
            .await
            .unwrap();
    }
    current
}

#[tokio::test]
async fn test_successful_collection() {
    let engine = TestEngine::new();
    let intent = seeded_intent(&engine).await;

    let processing = engine.payments.begin_collection(intent.id).await.unwrap();
    assert_eq!(processing.status, PaymentIntentStatus::Processing);
    assert_eq!(engine.gateway.checkout_count().await, 1);

    let settled = engine
        .payments
        .apply_gateway_outcome(intent.id, GatewayOutcome::Succeeded)
        .await
        .unwrap();
    assert_eq!(settled.status, PaymentIntentStatus::Succeeded);
    assert_eq!(settled.retry_count, 0);

    // Terminal: no further outcome may move it
    let err = engine
        .payments
        .apply_gateway_outcome(intent.id, GatewayOutcome::Failed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Payment(PaymentError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_pending_outcome_changes_nothing() {
    let engine = TestEngine::new();
    let intent = seeded_intent(&engine).await;
    engine.payments.begin_collection(intent.id).await.unwrap();

    let unchanged = engine
        .payments
        .apply_gateway_outcome(intent.id, GatewayOutcome::Pending)
        .await
        .unwrap();
    assert_eq!(unchanged.status, PaymentIntentStatus::Processing);
    assert_eq!(unchanged.retry_count, 0);
}

#[tokio::test]
async fn test_failures_step_through_the_retry_ladder() {
    let engine = TestEngine::new();

    let first = failed_intent(&engine, 1).await;
    assert_eq!(first.status, PaymentIntentStatus::FailedRetry1);
    assert_eq!(first.retry_count, 1);

    let stored = engine.intent_repo.find(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentIntentStatus::FailedRetry1);

    // Retry goes back through PROCESSING; the next failure lands on the
    // next rung
    let retried = engine.payments.retry(first.id).await.unwrap();
    assert_eq!(retried.status, PaymentIntentStatus::Processing);
    assert_eq!(retried.retry_count, 1);

    let second = engine
        .payments
        .apply_gateway_outcome(first.id, GatewayOutcome::Failed)
        .await
        .unwrap();
    assert_eq!(second.status, PaymentIntentStatus::FailedRetry2);
    assert_eq!(second.retry_count, 2);
}

#[tokio::test]
async fn test_retry_cap_is_enforced() {
    let engine = TestEngine::new();
    let exhausted = failed_intent(&engine, MAX_RETRIES).await;
    assert_eq!(exhausted.status, PaymentIntentStatus::FailedRetry3);
    assert_eq!(exhausted.retry_count, 3);

    // Retry count is already 3: distinct from "wrong status"
    let err = engine.payments.retry(exhausted.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Payment(PaymentError::RetryLimitExceeded { max: 3, .. })
    ));

    let stored = engine.intent_repo.find(exhausted.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentIntentStatus::FailedRetry3);
    assert_eq!(stored.retry_count, 3);
}

#[tokio::test]
async fn test_retry_from_non_retryable_status() {
    let engine = TestEngine::new();
    let intent = seeded_intent(&engine).await;

    // PENDING has never been attempted; there is nothing to retry
    let err = engine.payments.retry(intent.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Payment(PaymentError::NotRetryable { .. })
    ));

    engine.payments.begin_collection(intent.id).await.unwrap();
    engine
        .payments
        .apply_gateway_outcome(intent.id, GatewayOutcome::Succeeded)
        .await
        .unwrap();
    let err = engine.payments.retry(intent.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Payment(PaymentError::NotRetryable { .. })
    ));
}

#[tokio::test]
async fn test_escalation_requires_an_exhausted_intent() {
    let engine = TestEngine::new();

    let partway = failed_intent(&engine, 2).await;
    let err = engine.payments.escalate_to_ar(partway.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Payment(PaymentError::NotRetryable { .. })
    ));

    let exhausted = failed_intent(&engine, MAX_RETRIES).await;
    let escalated = engine.payments.escalate_to_ar(exhausted.id).await.unwrap();
    assert_eq!(escalated.status, PaymentIntentStatus::SentToAr);
    assert_eq!(escalated.retry_count, 3);
}

#[tokio::test]
async fn test_ar_disposition() {
    let engine = TestEngine::new();

    let exhausted = failed_intent(&engine, MAX_RETRIES).await;
    engine.payments.escalate_to_ar(exhausted.id).await.unwrap();
    let collected = engine
        .payments
        .resolve_ar(exhausted.id, ArDisposition::Collected)
        .await
        .unwrap();
    assert_eq!(collected.status, PaymentIntentStatus::CollectedViaAr);

    let other = failed_intent(&engine, MAX_RETRIES).await;
    engine.payments.escalate_to_ar(other.id).await.unwrap();
    let written_off = engine
        .payments
        .resolve_ar(other.id, ArDisposition::WrittenOff)
        .await
        .unwrap();
    assert_eq!(written_off.status, PaymentIntentStatus::WrittenOff);

    // Both dispositions are terminal
    let err = engine
        .payments
        .resolve_ar(exhausted.id, ArDisposition::WrittenOff)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Payment(PaymentError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_checkout_rejection_burns_an_attempt() {
    let engine = TestEngine::new();
    let intent = seeded_intent(&engine).await;
    engine.gateway.fail_intent(intent.id).await;

    let err = engine.payments.begin_collection(intent.id).await.unwrap_err();
    assert!(matches!(err, AppError::External(_)));

    // The failure is recorded through the normal table edge
    let stored = engine.intent_repo.find(intent.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentIntentStatus::FailedRetry1);
    assert_eq!(stored.retry_count, 1);
}

#[tokio::test]
async fn test_reconciliation_retries_the_batch_independently() {
    let engine = TestEngine::new();

    let healthy_a = failed_intent(&engine, 1).await;
    let healthy_b = failed_intent(&engine, 2).await;
    let outage = failed_intent(&engine, 1).await;
    let exhausted = failed_intent(&engine, MAX_RETRIES).await;
    let succeeded = seeded_intent(&engine).await;
    engine.payments.begin_collection(succeeded.id).await.unwrap();
    engine
        .payments
        .apply_gateway_outcome(succeeded.id, GatewayOutcome::Succeeded)
        .await
        .unwrap();

    // One intent hits a gateway outage mid-batch
    engine.gateway.fail_intent(outage.id).await;

    let report = engine.reconciliation.run().await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.retried, 2);
    assert_eq!(report.failed, 1);

    for id in [healthy_a.id, healthy_b.id] {
        let stored = engine.intent_repo.find(id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentIntentStatus::Processing);
    }

    // The outage consumed an attempt but the intent stays collectable
    let stored = engine.intent_repo.find(outage.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentIntentStatus::FailedRetry2);

    // Exhausted and succeeded intents were never candidates
    let stored = engine.intent_repo.find(exhausted.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentIntentStatus::FailedRetry3);
    let stored = engine.intent_repo.find(succeeded.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentIntentStatus::Succeeded);
}

#[tokio::test]
async fn test_payment_history_queries() {
    let engine = TestEngine::new();
    let campaign_id = Uuid::new_v4();
    let buyer_id = Uuid::new_v4();

    let mine = PaymentIntent::new(campaign_id, Uuid::new_v4(), buyer_id, dec!(100));
    let theirs = PaymentIntent::new(campaign_id, Uuid::new_v4(), Uuid::new_v4(), dec!(200));
    let elsewhere = PaymentIntent::new(Uuid::new_v4(), Uuid::new_v4(), buyer_id, dec!(300));
    for intent in [&mine, &theirs, &elsewhere] {
        engine.intent_repo.insert(intent).await.unwrap();
    }

    let by_campaign = engine.payments.history_for_campaign(campaign_id).await.unwrap();
    assert_eq!(by_campaign.len(), 2);

    let by_buyer = engine.payments.history_for_buyer(buyer_id).await.unwrap();
    assert_eq!(by_buyer.len(), 2);
    assert!(by_buyer.iter().all(|i| i.buyer_org_id == buyer_id));
}
