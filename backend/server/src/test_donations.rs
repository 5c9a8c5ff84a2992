use donation_ledger::{Confirmation, Error as LedgerError, RequestKind, RequestStatus};

use crate::cleanup;
use crate::db::{self, requests::Decision};
use crate::errors::AppError;
use crate::models::{RequestFilter, UserRole};
use crate::notifications::NotificationKind;
use crate::test_support::{pledge, pool, request, user};

#[tokio::test]
async fn confirming_pending_donation_fulfills_request() {
    let pool = pool().await;
    let home = user(&pool, "Sunrise", UserRole::Orphanage).await;
    let alice = user(&pool, "Alice", UserRole::Donor).await;
    let bob = user(&pool, "Bob", UserRole::Donor).await;
    let req = request(&pool, home, RequestKind::Money, Some(50), &[]).await;

    let first = db::requests::submit_donation(&pool, alice, req.request.id, &pledge(r#"{"amount": 20}"#))
        .await
        .unwrap();
    let second = db::requests::submit_donation(&pool, bob, req.request.id, &pledge(r#"{"amount": "40"}"#))
        .await
        .unwrap();

    let r = db::requests::resolve_donation(&pool, first.id, Some(home), Decision::Confirm)
        .await
        .unwrap();
    assert_eq!(r.request.progress.donated, 20);
    assert!(!r.request.progress.fulfilled);
    assert!(!r.newly_fulfilled);
    assert_eq!(r.request.request.status, RequestStatus::Pending);

    let r = db::requests::resolve_donation(&pool, second.id, Some(home), Decision::Confirm)
        .await
        .unwrap();
    assert_eq!(r.request.progress.donated, 60);
    assert!(r.request.progress.fulfilled);
    assert!(r.newly_fulfilled);
    assert_eq!(r.request.request.status, RequestStatus::Fulfilled);
    assert_eq!(r.request.request.donated, 60);
    assert!(r.request.fulfilled_at.is_some());

    let inbox = db::messages::notifications_for(&pool, home, false).await.unwrap();
    assert!(inbox
        .iter()
        .any(|n| n.kind() == NotificationKind::RequestFulfilled));
    let bobs = db::messages::notifications_for(&pool, bob, true).await.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].kind(), NotificationKind::DonationConfirmed);
}

#[tokio::test]
async fn second_confirmation_is_a_conflict_not_a_double_count() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let req = request(&pool, home, RequestKind::Food, Some(100), &[]).await;
    let d = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"meals": 30}"#))
        .await
        .unwrap();

    db::requests::resolve_donation(&pool, d.id, Some(home), Decision::Confirm)
        .await
        .unwrap();
    let err = db::requests::resolve_donation(&pool, d.id, Some(home), Decision::Confirm)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::AlreadyResolved(_, "confirmed"))
    ));

    let view = db::requests::get_request(&pool, req.request.id).await.unwrap().unwrap();
    assert_eq!(view.request.donated, 30);
    assert_eq!(view.progress.donated, 30);
}

#[tokio::test]
async fn other_orphanage_cannot_confirm_and_nothing_changes() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let other = user(&pool, "Elsewhere", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let req = request(&pool, home, RequestKind::Clothes, Some(10), &[]).await;
    let d = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"clothes": 5}"#))
        .await
        .unwrap();

    let err = db::requests::resolve_donation(&pool, d.id, Some(other), Decision::Confirm)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let still = db::requests::get_donation(&pool, d.id).await.unwrap().unwrap();
    assert_eq!(still.confirmation, Confirmation::Pending.as_str());
    assert!(still.resolved_at.is_none());
}

#[tokio::test]
async fn rejected_donations_never_count() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let req = request(&pool, home, RequestKind::Other, Some(10), &[]).await;
    let d = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"quantity": 10}"#))
        .await
        .unwrap();

    let r = db::requests::resolve_donation(&pool, d.id, Some(home), Decision::Reject)
        .await
        .unwrap();
    assert_eq!(r.request.progress.donated, 0);
    assert_eq!(r.request.request.status, RequestStatus::Pending);

    let inbox = db::messages::notifications_for(&pool, donor, false).await.unwrap();
    assert_eq!(inbox[0].kind(), NotificationKind::DonationRejected);
}

#[tokio::test]
async fn pledges_are_checked_against_confirmed_remaining_need() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let req = request(&pool, home, RequestKind::Money, Some(100), &[]).await;

    let d = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"amount": 80}"#))
        .await
        .unwrap();
    db::requests::resolve_donation(&pool, d.id, Some(home), Decision::Confirm)
        .await
        .unwrap();

    let err = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"amount": 30}"#))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::ExceedsRemaining {
            pledged: 30,
            remaining: 20
        })
    ));

    let err = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"meals": 5}"#))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::MissingQuantity { field: "amount", .. })
    ));

    let missing = db::requests::submit_donation(&pool, donor, 9_999, &pledge(r#"{"amount": 1}"#))
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}

#[tokio::test]
async fn subtyped_request_fills_per_item() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let req = request(&pool, home, RequestKind::Clothes, None, &[("A", 10), ("B", 5)]).await;
    assert_eq!(req.progress.target, Some(15));

    let a = db::requests::submit_donation(
        &pool,
        donor,
        req.request.id,
        &pledge(r#"{"items": [{"name": "A", "quantity": 10}]}"#),
    )
    .await
    .unwrap();
    let r = db::requests::resolve_donation(&pool, a.id, Some(home), Decision::Confirm)
        .await
        .unwrap();
    assert!(r.request.progress.subtypes[0].exhausted);
    assert!(!r.request.progress.subtypes[1].exhausted);
    assert_eq!(r.request.request.status, RequestStatus::Pending);

    let err = db::requests::submit_donation(
        &pool,
        donor,
        req.request.id,
        &pledge(r#"{"items": [{"name": "A", "quantity": 1}]}"#),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::ItemExceedsRemaining { remaining: 0, .. })
    ));

    let b = db::requests::submit_donation(
        &pool,
        donor,
        req.request.id,
        &pledge(r#"{"items": [{"name": "B", "quantity": "5"}]}"#),
    )
    .await
    .unwrap();
    let r = db::requests::resolve_donation(&pool, b.id, Some(home), Decision::Confirm)
        .await
        .unwrap();
    assert!(r.newly_fulfilled);
    assert_eq!(r.request.request.donated, 15);
    assert_eq!(r.request.request.status, RequestStatus::Fulfilled);
}

#[tokio::test]
async fn concurrent_confirmations_both_count() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let req = request(&pool, home, RequestKind::Food, Some(100), &[]).await;

    let mut ids = Vec::new();
    for meals in [25, 35] {
        let d = db::requests::submit_donation(
            &pool,
            donor,
            req.request.id,
            &pledge(&format!(r#"{{"meals": {meals}}}"#)),
        )
        .await
        .unwrap();
        ids.push(d.id);
    }

    let (a, b) = tokio::join!(
        db::requests::resolve_donation(&pool, ids[0], Some(home), Decision::Confirm),
        db::requests::resolve_donation(&pool, ids[1], Some(home), Decision::Confirm),
    );
    a.unwrap();
    b.unwrap();

    let view = db::requests::get_request(&pool, req.request.id).await.unwrap().unwrap();
    assert_eq!(view.request.donated, 60);
    assert_eq!(view.progress.donated, 60);
}

#[tokio::test]
async fn browser_filters_and_counts_only_confirmed() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let food = request(&pool, home, RequestKind::Food, Some(100), &[]).await;
    request(&pool, home, RequestKind::Money, Some(500), &[]).await;

    let pending = db::requests::submit_donation(&pool, donor, food.request.id, &pledge(r#"{"meals": 40}"#))
        .await
        .unwrap();
    let confirmed = db::requests::submit_donation(&pool, donor, food.request.id, &pledge(r#"{"meals": 35}"#))
        .await
        .unwrap();
    db::requests::resolve_donation(&pool, confirmed.id, Some(home), Decision::Confirm)
        .await
        .unwrap();
    assert_eq!(pending.confirmation, "pending");

    let filter = RequestFilter {
        city: Some("pune".to_string()),
        kind: Some(RequestKind::Food),
        ..Default::default()
    };
    let views = db::requests::list_requests(&pool, &filter).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].progress.donated, 35);
    assert_eq!(views[0].progress.remaining, Some(65));

    let elsewhere = RequestFilter {
        city: Some("Mumbai".to_string()),
        ..Default::default()
    };
    assert!(db::requests::list_requests(&pool, &elsewhere).await.unwrap().is_empty());

    let history = db::requests::donations_by_donor(&pool, donor).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn cleanup_removes_only_stale_fulfilled_requests() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let old = request(&pool, home, RequestKind::Money, Some(10), &[]).await;
    let fresh = request(&pool, home, RequestKind::Money, Some(10), &[]).await;
    let open = request(&pool, home, RequestKind::Money, Some(10), &[]).await;

    for req in [&old, &fresh] {
        let d = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"amount": 10}"#))
            .await
            .unwrap();
        db::requests::resolve_donation(&pool, d.id, Some(home), Decision::Confirm)
            .await
            .unwrap();
    }
    let ninety_days_ago = db::now() - 90 * 86_400;
    sqlx::query("UPDATE requests SET fulfilled_at = ?1 WHERE id = ?2")
        .bind(ninety_days_ago)
        .bind(old.request.id)
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(cleanup::sweep_once(&pool, 30).await.unwrap(), 1);
    assert!(db::requests::get_request(&pool, old.request.id).await.unwrap().is_none());
    assert!(db::requests::get_request(&pool, fresh.request.id).await.unwrap().is_some());
    assert!(db::requests::get_request(&pool, open.request.id).await.unwrap().is_some());
    assert_eq!(cleanup::sweep_once(&pool, 30).await.unwrap(), 0);
}

#[tokio::test]
async fn admin_report_aggregates() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    user(&pool, "Root", UserRole::Admin).await;
    let req = request(&pool, home, RequestKind::Clothes, Some(50), &[]).await;
    let d = db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"clothes": 12}"#))
        .await
        .unwrap();
    db::requests::resolve_donation(&pool, d.id, Some(home), Decision::Confirm)
        .await
        .unwrap();
    db::requests::submit_donation(&pool, donor, req.request.id, &pledge(r#"{"clothes": 3}"#))
        .await
        .unwrap();

    let report = db::reports::admin_report(&pool).await.unwrap();
    assert_eq!(report.users_by_role.get("donor"), Some(&1));
    assert_eq!(report.users_by_role.get("admin"), Some(&1));
    assert_eq!(report.donations_by_confirmation.get("confirmed"), Some(&1));
    assert_eq!(report.donations_by_confirmation.get("pending"), Some(&1));
    assert_eq!(report.confirmed_units_by_kind[&RequestKind::Clothes], 12);
    assert_eq!(report.confirmed_units_by_kind[&RequestKind::Money], 0);
    assert_eq!(report.requests_by_status.get("pending"), Some(&1));
}

#[tokio::test]
async fn deleting_a_request_is_owner_only() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let other = user(&pool, "Elsewhere", UserRole::Orphanage).await;
    let req = request(&pool, home, RequestKind::Food, Some(5), &[]).await;

    let err = db::requests::delete_request(&pool, req.request.id, Some(other))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(db::requests::delete_request(&pool, req.request.id, Some(home)).await.unwrap());
    assert!(!db::requests::delete_request(&pool, req.request.id, None).await.unwrap());
}

#[tokio::test]
async fn browser_groups_confirmed_totals_per_matching_request() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let other = user(&pool, "Shelter", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;
    let ours = request(&pool, home, RequestKind::Food, Some(20), &[]).await;
    let theirs = request(&pool, other, RequestKind::Food, Some(100), &[]).await;

    for (req, owner, meals) in [(&ours, home, 20), (&theirs, other, 30)] {
        let d = db::requests::submit_donation(
            &pool,
            donor,
            req.request.id,
            &pledge(&format!(r#"{{"meals": {meals}}}"#)),
        )
        .await
        .unwrap();
        db::requests::resolve_donation(&pool, d.id, Some(owner), Decision::Confirm)
            .await
            .unwrap();
    }

    let fulfilled = RequestFilter {
        status: Some(RequestStatus::Fulfilled),
        ..Default::default()
    };
    let views = db::requests::list_requests(&pool, &fulfilled).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].request.id, ours.request.id);
    assert_eq!(views[0].progress.donated, 20);

    let theirs_only = RequestFilter {
        orphanage_id: Some(other),
        status: Some(RequestStatus::Pending),
        ..Default::default()
    };
    let views = db::requests::list_requests(&pool, &theirs_only).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].progress.donated, 30);
    assert_eq!(views[0].progress.remaining, Some(70));

    let everything = db::requests::list_requests(&pool, &RequestFilter::default())
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn oversized_figures_never_reach_the_browser() {
    let pool = pool().await;
    let home = user(&pool, "Haven", UserRole::Orphanage).await;
    let donor = user(&pool, "Dana", UserRole::Donor).await;

    let new = crate::models::NewRequest {
        orphanage_id: home,
        kind: RequestKind::Clothes,
        title: "Winter kit".to_string(),
        description: String::new(),
        city: None,
        target: None,
        subtypes: vec![
            donation_ledger::SubtypeTarget {
                name: "coats".to_string(),
                target: i64::MAX,
            },
            donation_ledger::SubtypeTarget {
                name: "boots".to_string(),
                target: i64::MAX,
            },
        ],
    };
    let err = db::requests::insert_request(&pool, &new, "Pune").await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::QuantityTooLarge { .. })
    ));

    let req = request(&pool, home, RequestKind::Clothes, None, &[("coats", 10)]).await;
    let err = db::requests::submit_donation(
        &pool,
        donor,
        req.request.id,
        &pledge(&format!(
            r#"{{"items": [{{"name": "coats", "quantity": {}}}, {{"name": "coats", "quantity": 1}}]}}"#,
            i64::MAX
        )),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::QuantityTooLarge { .. })
    ));

    let open = request(&pool, home, RequestKind::Other, None, &[]).await;
    let err = db::requests::submit_donation(
        &pool,
        donor,
        open.request.id,
        &pledge(&format!(r#"{{"quantity": {}}}"#, i64::MAX)),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::QuantityTooLarge { .. })
    ));

    let views = db::requests::list_requests(&pool, &RequestFilter::default())
        .await
        .unwrap();
    assert_eq!(views.len(), 2);
}
