//! Both backends must uphold the same dedup-identity and lease-CAS
//! invariants (spec §8, universal invariants 1 and 4), so this suite runs
//! the same scenarios against `MemoryStore` and an in-memory `SqliteStore`
//! rather than trusting the unit tests embedded in each backend module.

use std::sync::Arc;

use annum_common::{MessageType, ScheduledMessageStatus, UserId};
use annum_store::{MemoryStore, SqliteStore, Store};
use chrono::{NaiveDate, Utc};

async fn backends() -> Vec<(&'static str, Arc<dyn Store>)> {
    vec![
        ("memory", Arc::new(MemoryStore::new())),
        (
            "sqlite",
            Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap()),
        ),
    ]
}

/// Invariant 1: at most one record per `(user_id, message_type, date)`.
#[tokio::test]
async fn dedup_identity_holds_across_backends() {
    for (name, store) in backends().await {
        let date = NaiveDate::from_ymd_opt(2026, 5, 15).unwrap();
        let at = Utc::now();
        let user_id = UserId::new("user-1");

        let first = store
            .create_if_absent(&user_id, MessageType::Birthday, date, at, "first body")
            .await
            .unwrap();
        let second = store
            .create_if_absent(&user_id, MessageType::Birthday, date, at, "second body")
            .await
            .unwrap();

        assert_eq!(first.id, second.id, "[{name}] conflicting insert must resolve to the existing row");
        assert_eq!(second.message_body, "first body", "[{name}] body from the first insert must win");
    }
}

/// A different `message_type` or `scheduled_date` is a distinct identity,
/// even for the same user.
#[tokio::test]
async fn distinct_type_or_date_is_a_distinct_record() {
    for (name, store) in backends().await {
        let user_id = UserId::new("user-1");
        let at = Utc::now();
        let d1 = NaiveDate::from_ymd_opt(2026, 5, 15).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 5, 16).unwrap();

        let birthday = store
            .create_if_absent(&user_id, MessageType::Birthday, d1, at, "b")
            .await
            .unwrap();
        let anniversary = store
            .create_if_absent(&user_id, MessageType::Anniversary, d1, at, "a")
            .await
            .unwrap();
        let next_day = store
            .create_if_absent(&user_id, MessageType::Birthday, d2, at, "b2")
            .await
            .unwrap();

        assert_ne!(birthday.id, anniversary.id, "[{name}]");
        assert_ne!(birthday.id, next_day.id, "[{name}]");
    }
}

/// Invariant 4: exactly one caller wins a lease race for a given record.
#[tokio::test]
async fn lease_cas_admits_exactly_one_winner() {
    for (name, store) in backends().await {
        let user_id = UserId::new("user-1");
        let now = Utc::now();
        let record = store
            .create_if_absent(&user_id, MessageType::Birthday, now.date_naive(), now, "hi")
            .await
            .unwrap();

        let lease_until = now + chrono::Duration::minutes(5);
        let mut wins = 0;
        for n in 0..5 {
            let lock_id = format!("lock-{n}");
            if store
                .acquire_lease(&record.id, &lock_id, lease_until, now)
                .await
                .unwrap()
            {
                wins += 1;
            }
        }

        assert_eq!(wins, 1, "[{name}] exactly one of five racing lease acquisitions must win");
    }
}

/// An expired lease is equivalent to unlocked (invariant 3).
#[tokio::test]
async fn expired_lease_can_be_reacquired() {
    for (name, store) in backends().await {
        let user_id = UserId::new("user-1");
        let now = Utc::now();
        let record = store
            .create_if_absent(&user_id, MessageType::Birthday, now.date_naive(), now, "hi")
            .await
            .unwrap();

        let short_lease = now + chrono::Duration::seconds(1);
        assert!(store
            .acquire_lease(&record.id, "lock-a", short_lease, now)
            .await
            .unwrap());

        let after_expiry = short_lease + chrono::Duration::seconds(1);
        assert!(
            store
                .acquire_lease(&record.id, "lock-b", short_lease, after_expiry)
                .await
                .unwrap(),
            "[{name}] an expired lease must be treated as unlocked"
        );
    }
}

/// `select_due` never returns a record under a live lease, but does once the
/// lease expires; `list_missed` ignores lease state entirely (spec §4.B).
#[tokio::test]
async fn select_due_excludes_live_leases_but_list_missed_does_not() {
    for (name, store) in backends().await {
        let user_id = UserId::new("user-1");
        let now = Utc::now();
        let past = now - chrono::Duration::hours(1);
        let record = store
            .create_if_absent(&user_id, MessageType::Birthday, past.date_naive(), past, "hi")
            .await
            .unwrap();

        store
            .acquire_lease(&record.id, "lock-a", now + chrono::Duration::minutes(5), now)
            .await
            .unwrap();

        let due = store.select_due(now, 10).await.unwrap();
        assert!(due.is_empty(), "[{name}] a leased record must not be selected as due");

        let missed = store.list_missed(now).await.unwrap();
        assert_eq!(missed.len(), 1, "[{name}] list_missed ignores lease state");
    }
}

/// `mark_sent`/`mark_failure` require the caller to still hold the lease
/// they acquired.
#[tokio::test]
async fn terminal_transitions_require_the_matching_lease() {
    for (name, store) in backends().await {
        let user_id = UserId::new("user-1");
        let now = Utc::now();
        let record = store
            .create_if_absent(&user_id, MessageType::Birthday, now.date_naive(), now, "hi")
            .await
            .unwrap();

        store
            .acquire_lease(&record.id, "lock-a", now + chrono::Duration::minutes(5), now)
            .await
            .unwrap();

        assert!(
            !store.mark_sent(&record.id, "wrong-lock", now).await.unwrap(),
            "[{name}] a stale lock token must not be able to mark sent"
        );
        assert!(store.mark_sent(&record.id, "lock-a", now).await.unwrap());

        let found = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(found.status, ScheduledMessageStatus::Sent, "[{name}]");
        assert!(found.sent_at.is_some(), "[{name}]");
    }
}
