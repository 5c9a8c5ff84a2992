use crate::invariants::{
    assert_resolution_final, assert_status_consistent, assert_status_monotonic,
    assert_total_matches_confirmed,
};
use crate::{
    confirm, progress, reject, settle, settle_fundraiser, tally, validate_fundraiser_pledge,
    validate_pledge, validate_request, Confirmation, Contribution, Donation, Error, Fundraiser,
    FundraiserDonation, FundraiserStatus, Request, RequestKind, RequestStatus, SubtypeQuantity,
    SubtypeTarget, MAX_QUANTITY,
};

fn request(target: Option<i64>) -> Request {
    Request {
        id: 1,
        orphanage_id: 100,
        kind: RequestKind::Money,
        title: "School fees".into(),
        description: String::new(),
        city: "Nairobi".into(),
        target,
        subtypes: Vec::new(),
        status: RequestStatus::Pending,
        donated: 0,
    }
}

fn subtyped(items: &[(&str, i64)]) -> Request {
    Request {
        kind: RequestKind::Clothes,
        target: None,
        subtypes: items
            .iter()
            .map(|(n, t)| SubtypeTarget {
                name: n.to_string(),
                target: *t,
            })
            .collect(),
        ..request(None)
    }
}

fn donation(id: i64, units: i64, confirmation: Confirmation) -> Donation {
    Donation {
        id,
        donor_id: 500 + id,
        request_id: 1,
        contribution: Contribution::Units(units),
        confirmation,
    }
}

fn items(id: i64, lines: &[(&str, i64)], confirmation: Confirmation) -> Donation {
    Donation {
        contribution: Contribution::Items(
            lines
                .iter()
                .map(|(n, q)| SubtypeQuantity {
                    name: n.to_string(),
                    quantity: *q,
                })
                .collect(),
        ),
        ..donation(id, 0, confirmation)
    }
}

/// Mimics the server: confirm, settle, write back.
fn confirm_and_settle(req: &mut Request, donations: &mut [Donation], id: i64) {
    let before = req.status;
    let d = donations.iter_mut().find(|d| d.id == id).unwrap();
    confirm(d).unwrap();
    let s = settle(req, donations.iter());
    assert_status_monotonic(before, &s);
    req.donated = s.donated;
    req.status = s.status;
}

#[test]
fn partial_confirmed_total_is_not_fulfilled() {
    let req = request(Some(100));
    let donations = vec![
        donation(1, 40, Confirmation::Confirmed),
        donation(2, 35, Confirmation::Confirmed),
    ];
    let p = progress(&req, &donations);
    assert_eq!(p.donated, 75);
    assert_eq!(p.remaining, Some(25));
    assert!(!p.fulfilled);
}

#[test]
fn reaching_target_exactly_fulfills() {
    let req = request(Some(100));
    let donations = vec![
        donation(1, 60, Confirmation::Confirmed),
        donation(2, 40, Confirmation::Confirmed),
    ];
    let s = settle(&req, &donations);
    assert_eq!(s.donated, 100);
    assert_eq!(s.status, RequestStatus::Fulfilled);
    assert!(s.newly_fulfilled);
}

#[test]
fn subtypes_are_exhausted_independently() {
    let req = subtyped(&[("A", 10), ("B", 5)]);
    let mut donations = vec![items(1, &[("A", 10)], Confirmation::Confirmed)];

    let p = progress(&req, &donations);
    assert!(p.subtypes[0].exhausted);
    assert!(!p.subtypes[1].exhausted);
    assert!(!p.fulfilled);

    donations.push(items(2, &[("B", 5)], Confirmation::Confirmed));
    let p = progress(&req, &donations);
    assert!(p.subtypes.iter().all(|s| s.exhausted));
    assert!(p.fulfilled);
    assert_eq!(p.donated, 15);
    assert_eq!(p.remaining, Some(0));
}

#[test]
fn pending_and_rejected_donations_never_count() {
    let req = request(Some(100));
    let donations = vec![
        donation(1, 30, Confirmation::Pending),
        donation(2, 70, Confirmation::Rejected),
        donation(3, 5, Confirmation::Confirmed),
    ];
    assert_eq!(tally(&req, &donations).donated, 5);
}

#[test]
fn donations_for_other_requests_are_skipped() {
    let req = request(Some(100));
    let mut stray = donation(9, 50, Confirmation::Confirmed);
    stray.request_id = 2;
    assert_eq!(tally(&req, &[stray]).donated, 0);
}

#[test]
fn summation_is_idempotent() {
    let req = subtyped(&[("A", 10), ("B", 5)]);
    let donations = vec![
        items(1, &[("A", 4), ("B", 1)], Confirmation::Confirmed),
        items(2, &[("A", 3)], Confirmation::Pending),
    ];
    let first = progress(&req, &donations);
    let second = progress(&req, &donations);
    assert_eq!(first, second);
    assert_eq!(settle(&req, &donations), settle(&req, &donations));
}

#[test]
fn confirming_a_pending_donation_fulfills_request() {
    let mut req = request(Some(50));
    let mut donations = vec![
        donation(1, 20, Confirmation::Pending),
        donation(2, 40, Confirmation::Pending),
    ];

    confirm_and_settle(&mut req, &mut donations, 1);
    let p = progress(&req, &donations);
    assert_eq!(p.donated, 20);
    assert!(!p.fulfilled);
    assert_eq!(req.status, RequestStatus::Pending);

    confirm_and_settle(&mut req, &mut donations, 2);
    let p = progress(&req, &donations);
    assert_eq!(p.donated, 60);
    assert!(p.fulfilled);
    assert_eq!(req.status, RequestStatus::Fulfilled);

    assert_total_matches_confirmed(&req, &donations);
    assert_status_consistent(&req, &donations);
}

#[test]
fn request_without_target_never_fulfills() {
    let req = request(None);
    let donations = vec![donation(1, 1_000_000, Confirmation::Confirmed)];
    let s = settle(&req, &donations);
    assert_eq!(s.donated, 1_000_000);
    assert_eq!(s.status, RequestStatus::Pending);
    assert_eq!(progress(&req, &donations).remaining, None);
}

#[test]
fn fulfilled_status_is_sticky() {
    let mut req = request(Some(10));
    req.status = RequestStatus::Fulfilled;
    let s = settle(&req, &[]);
    assert_eq!(s.status, RequestStatus::Fulfilled);
    assert!(!s.newly_fulfilled);
}

#[test]
fn double_confirmation_is_refused() {
    let mut d = donation(7, 10, Confirmation::Pending);
    confirm(&mut d).unwrap();
    assert_eq!(confirm(&mut d), Err(Error::AlreadyResolved(7, "confirmed")));
    assert_eq!(reject(&mut d), Err(Error::AlreadyResolved(7, "confirmed")));
    assert_resolution_final(Confirmation::Confirmed, d.confirmation);
}

#[test]
fn rejected_donation_cannot_be_confirmed_later() {
    let mut d = donation(3, 10, Confirmation::Pending);
    reject(&mut d).unwrap();
    assert_eq!(d.confirmation, Confirmation::Rejected);
    assert_eq!(confirm(&mut d), Err(Error::AlreadyResolved(3, "rejected")));
}

#[test]
fn pledge_beyond_remaining_need_is_refused() {
    let req = request(Some(100));
    let donations = vec![donation(1, 80, Confirmation::Confirmed)];
    let p = progress(&req, &donations);
    assert_eq!(
        validate_pledge(&req, &p, &Contribution::Units(30)),
        Err(Error::ExceedsRemaining {
            pledged: 30,
            remaining: 20
        })
    );
    assert!(validate_pledge(&req, &p, &Contribution::Units(20)).is_ok());
    assert_eq!(
        validate_pledge(&req, &p, &Contribution::Units(0)),
        Err(Error::InvalidQuantity("0".into()))
    );
}

#[test]
fn pending_pledges_do_not_reserve_capacity() {
    let req = request(Some(50));
    let donations = vec![donation(1, 45, Confirmation::Pending)];
    let p = progress(&req, &donations);
    assert!(validate_pledge(&req, &p, &Contribution::Units(50)).is_ok());
}

#[test]
fn item_pledges_are_checked_per_subtype() {
    let req = subtyped(&[("shoes", 10), ("coats", 5)]);
    let donations = vec![items(1, &[("coats", 4)], Confirmation::Confirmed)];
    let p = progress(&req, &donations);

    let two_coats = Contribution::Items(vec![SubtypeQuantity {
        name: "coats".into(),
        quantity: 2,
    }]);
    assert_eq!(
        validate_pledge(&req, &p, &two_coats),
        Err(Error::ItemExceedsRemaining {
            item: "coats".into(),
            pledged: 2,
            remaining: 1
        })
    );

    let hats = Contribution::Items(vec![SubtypeQuantity {
        name: "hats".into(),
        quantity: 1,
    }]);
    assert_eq!(
        validate_pledge(&req, &p, &hats),
        Err(Error::UnknownSubtype("hats".into()))
    );

    assert_eq!(
        validate_pledge(&req, &p, &Contribution::Units(3)),
        Err(Error::ItemsRequired(1))
    );
}

#[test]
fn duplicate_item_lines_are_summed_before_checking() {
    let req = subtyped(&[("shoes", 10)]);
    let p = progress(&req, &[]);
    let pledge = Contribution::Items(vec![
        SubtypeQuantity {
            name: "shoes".into(),
            quantity: 6,
        },
        SubtypeQuantity {
            name: "shoes".into(),
            quantity: 6,
        },
    ]);
    assert!(matches!(
        validate_pledge(&req, &p, &pledge),
        Err(Error::ItemExceedsRemaining { pledged: 12, .. })
    ));
}

#[test]
fn closed_request_takes_no_pledges() {
    let mut req = request(Some(10));
    req.status = RequestStatus::Fulfilled;
    let p = progress(&req, &[]);
    assert_eq!(
        validate_pledge(&req, &p, &Contribution::Units(1)),
        Err(Error::RequestClosed(1))
    );
}

#[test]
fn request_shapes_are_validated() {
    assert!(validate_request(&request(Some(10))).is_ok());
    assert!(validate_request(&request(None)).is_ok());
    assert!(validate_request(&request(Some(0))).is_err());
    assert!(validate_request(&subtyped(&[("A", 1), ("A", 2)])).is_err());
    assert!(validate_request(&subtyped(&[("A", 0)])).is_err());

    let mut both = subtyped(&[("A", 1)]);
    both.target = Some(1);
    assert!(validate_request(&both).is_err());
}

fn fundraiser(target: i64) -> Fundraiser {
    Fundraiser {
        id: 3,
        orphanage_id: 100,
        title: "New roof".into(),
        description: String::new(),
        target,
        raised: 0,
        status: FundraiserStatus::Active,
    }
}

fn gift(id: i64, amount: i64, confirmation: Confirmation) -> FundraiserDonation {
    FundraiserDonation {
        id,
        fundraiser_id: 3,
        donor_id: 1,
        amount,
        confirmation,
    }
}

#[test]
fn fundraiser_completes_at_target() {
    let f = fundraiser(1_000);
    let gifts = vec![
        gift(1, 600, Confirmation::Confirmed),
        gift(2, 300, Confirmation::Pending),
    ];
    let p = settle_fundraiser(&f, &gifts);
    assert_eq!(p.raised, 600);
    assert_eq!(p.status, FundraiserStatus::Active);
    assert!(!p.newly_completed);

    let gifts = vec![
        gift(1, 600, Confirmation::Confirmed),
        gift(2, 500, Confirmation::Confirmed),
    ];
    let p = settle_fundraiser(&f, &gifts);
    assert_eq!(p.raised, 1_100);
    assert_eq!(p.remaining, 0);
    assert_eq!(p.status, FundraiserStatus::Completed);
    assert!(p.newly_completed);
}

#[test]
fn completed_fundraiser_refuses_pledges() {
    let mut f = fundraiser(10);
    assert!(validate_fundraiser_pledge(&f, 5).is_ok());
    assert!(validate_fundraiser_pledge(&f, -5).is_err());
    f.status = FundraiserStatus::Completed;
    assert_eq!(
        validate_fundraiser_pledge(&f, 5),
        Err(Error::FundraiserClosed(3))
    );
}

// ─────────────────────────────────────────────────────────
// Oversized figures
// ─────────────────────────────────────────────────────────

#[test]
fn oversized_subtype_targets_are_refused_before_storage() {
    let req = subtyped(&[("shirts", i64::MAX), ("shoes", i64::MAX)]);
    assert_eq!(
        validate_request(&req),
        Err(Error::QuantityTooLarge {
            value: i64::MAX,
            max: MAX_QUANTITY
        })
    );

    let req = subtyped(&[("shirts", MAX_QUANTITY), ("shoes", MAX_QUANTITY)]);
    assert!(validate_request(&req).is_ok());
    let p = progress(&req, &[]);
    assert_eq!(p.target, Some(2 * MAX_QUANTITY));
    assert_eq!(p.remaining, Some(2 * MAX_QUANTITY));
}

#[test]
fn oversized_overall_target_is_refused() {
    assert!(validate_request(&request(Some(MAX_QUANTITY))).is_ok());
    assert!(matches!(
        validate_request(&request(Some(MAX_QUANTITY + 1))),
        Err(Error::QuantityTooLarge { .. })
    ));
}

#[test]
fn duplicate_item_lines_cannot_sum_past_the_limit() {
    let req = subtyped(&[("shirts", MAX_QUANTITY)]);
    let p = progress(&req, &[]);

    let huge = items(1, &[("shirts", i64::MAX), ("shirts", 1)], Confirmation::Pending);
    assert!(matches!(
        validate_pledge(&req, &p, &huge.contribution),
        Err(Error::QuantityTooLarge { .. })
    ));

    let split = items(
        2,
        &[("shirts", MAX_QUANTITY), ("shirts", MAX_QUANTITY)],
        Confirmation::Pending,
    );
    assert!(matches!(
        validate_pledge(&req, &p, &split.contribution),
        Err(Error::QuantityTooLarge { .. })
    ));
}

#[test]
fn untargeted_request_caps_each_pledge_and_keeps_settling() {
    let mut req = request(None);
    let p = progress(&req, &[]);
    assert!(matches!(
        validate_pledge(&req, &p, &Contribution::Units(i64::MAX)),
        Err(Error::QuantityTooLarge { .. })
    ));
    assert!(validate_pledge(&req, &p, &Contribution::Units(MAX_QUANTITY)).is_ok());

    let mut donations = vec![
        donation(1, MAX_QUANTITY, Confirmation::Pending),
        donation(2, MAX_QUANTITY, Confirmation::Pending),
    ];
    confirm_and_settle(&mut req, &mut donations, 1);
    confirm_and_settle(&mut req, &mut donations, 2);
    assert_eq!(req.donated, 2 * MAX_QUANTITY);
    assert_eq!(req.status, RequestStatus::Pending);
}

#[test]
fn stored_rows_past_the_limit_saturate_instead_of_wrapping() {
    let req = request(None);
    let donations = vec![
        donation(1, i64::MAX, Confirmation::Confirmed),
        donation(2, i64::MAX, Confirmation::Confirmed),
    ];
    assert_eq!(settle(&req, &donations).donated, i64::MAX);

    let f = fundraiser(10);
    let gifts = vec![
        gift(1, i64::MAX, Confirmation::Confirmed),
        gift(2, 1, Confirmation::Confirmed),
    ];
    let p = settle_fundraiser(&f, &gifts);
    assert_eq!(p.raised, i64::MAX);
    assert_eq!(p.remaining, 0);
}

#[test]
fn fundraiser_pledges_are_capped() {
    let f = fundraiser(10);
    assert!(validate_fundraiser_pledge(&f, MAX_QUANTITY).is_ok());
    assert!(matches!(
        validate_fundraiser_pledge(&f, i64::MAX),
        Err(Error::QuantityTooLarge { .. })
    ));
}
