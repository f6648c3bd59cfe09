//! Price cascade tests against in-memory stores.

mod common;

use common::{dec, price_cascade, MemoryStore};
use service_core::error::AppError;
use settlement_service::models::NotificationKind;
use uuid::Uuid;

#[tokio::test]
async fn resale_below_new_cost_is_invalidated() {
    let store = MemoryStore::new();
    let service_id = Uuid::new_v4();

    let u = store.add_user("upstream", "code-u", None, "user", true);
    let d = store.add_user("downstream", "code-d", Some("code-u"), "user", true);
    store.set_price(d, service_id, "50.00", Some("70.00"));

    let cascade = price_cascade(&store);
    let outcome = cascade.propagate(u, service_id, dec("80.00")).await.unwrap();

    assert_eq!(outcome.invalidated, 1);
    assert_eq!(outcome.retained, 0);

    let price = store.price(d, service_id).unwrap();
    assert_eq!(price.cost_price, dec("80.00"));
    assert_eq!(price.resale_price, None);

    let notifications = store.notifications_for(d);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::PriceInvalidated);
    assert_eq!(notifications[0].related_id, Some(service_id));
}

#[tokio::test]
async fn resale_at_or_above_new_cost_is_retained() {
    let store = MemoryStore::new();
    let service_id = Uuid::new_v4();

    let u = store.add_user("upstream", "code-u", None, "user", true);
    let kept = store.add_user("kept", "code-k", Some("code-u"), "user", true);
    let exact = store.add_user("exact", "code-e", Some("code-u"), "user", true);
    store.set_price(kept, service_id, "50.00", Some("90.00"));
    store.set_price(exact, service_id, "50.00", Some("80.00"));

    let cascade = price_cascade(&store);
    let outcome = cascade.propagate(u, service_id, dec("80.00")).await.unwrap();

    assert_eq!(outcome.invalidated, 0);
    assert_eq!(outcome.retained, 2);

    let kept_price = store.price(kept, service_id).unwrap();
    assert_eq!(kept_price.cost_price, dec("80.00"));
    assert_eq!(kept_price.resale_price, Some(dec("90.00")));

    // Resale equal to the new cost survives with zero margin.
    let exact_price = store.price(exact, service_id).unwrap();
    assert_eq!(exact_price.cost_price, dec("80.00"));
    assert_eq!(exact_price.resale_price, Some(dec("80.00")));

    assert_eq!(store.notifications_for(kept).len(), 1);
    assert_eq!(
        store.notifications_for(kept)[0].kind,
        NotificationKind::CostUpdated
    );
}

#[tokio::test]
async fn descendant_without_price_row_is_untouched() {
    let store = MemoryStore::new();
    let service_id = Uuid::new_v4();

    let u = store.add_user("upstream", "code-u", None, "user", true);
    let d = store.add_user("downstream", "code-d", Some("code-u"), "user", true);

    let cascade = price_cascade(&store);
    let outcome = cascade.propagate(u, service_id, dec("80.00")).await.unwrap();

    assert_eq!(outcome.invalidated, 0);
    assert_eq!(outcome.retained, 0);
    assert!(store.price(d, service_id).is_none());
    assert!(store.notifications_for(d).is_empty());
}

#[tokio::test]
async fn cascade_covers_the_whole_subtree() {
    let store = MemoryStore::new();
    let service_id = Uuid::new_v4();

    let u = store.add_user("upstream", "code-u", None, "user", true);
    let child = store.add_user("child", "code-c", Some("code-u"), "user", true);
    let grandchild = store.add_user("grandchild", "code-g", Some("code-c"), "user", true);
    store.set_price(child, service_id, "50.00", Some("70.00"));
    store.set_price(grandchild, service_id, "70.00", Some("75.00"));

    let cascade = price_cascade(&store);
    let outcome = cascade.propagate(u, service_id, dec("80.00")).await.unwrap();

    assert_eq!(outcome.invalidated, 2);
    assert_eq!(store.price(child, service_id).unwrap().resale_price, None);
    assert_eq!(
        store.price(grandchild, service_id).unwrap().resale_price,
        None
    );
    assert_eq!(
        store.price(grandchild, service_id).unwrap().cost_price,
        dec("80.00")
    );
}

#[tokio::test]
async fn failing_descendant_is_skipped_not_fatal() {
    let store = MemoryStore::new();
    let service_id = Uuid::new_v4();

    let u = store.add_user("upstream", "code-u", None, "user", true);
    let broken = store.add_user("broken", "code-b", Some("code-u"), "user", true);
    let healthy = store.add_user("healthy", "code-h", Some("code-u"), "user", true);
    store.set_price(broken, service_id, "50.00", Some("70.00"));
    store.set_price(healthy, service_id, "50.00", Some("70.00"));
    store.fail_price_writes_for.lock().unwrap().insert(broken);

    let cascade = price_cascade(&store);
    let outcome = cascade.propagate(u, service_id, dec("80.00")).await.unwrap();

    assert_eq!(outcome.invalidated, 1);
    assert_eq!(store.price(healthy, service_id).unwrap().resale_price, None);

    // The failing descendant keeps its old row.
    let broken_price = store.price(broken, service_id).unwrap();
    assert_eq!(broken_price.cost_price, dec("50.00"));
    assert_eq!(broken_price.resale_price, Some(dec("70.00")));
}

#[tokio::test]
async fn notification_failure_does_not_abort_the_cascade() {
    let store = MemoryStore::new();
    let service_id = Uuid::new_v4();

    let u = store.add_user("upstream", "code-u", None, "user", true);
    let d = store.add_user("downstream", "code-d", Some("code-u"), "user", true);
    store.set_price(d, service_id, "50.00", Some("70.00"));
    *store.fail_notifications.lock().unwrap() = true;

    let cascade = price_cascade(&store);
    let outcome = cascade.propagate(u, service_id, dec("80.00")).await.unwrap();

    assert_eq!(outcome.invalidated, 1);
    assert_eq!(store.price(d, service_id).unwrap().resale_price, None);
    assert!(store.notifications_for(d).is_empty());
}

#[tokio::test]
async fn acting_user_is_never_treated_as_their_own_descendant() {
    let store = MemoryStore::new();
    let service_id = Uuid::new_v4();

    // u and d refer each other, so a walk from u rediscovers u.
    let u = store.add_user("upstream", "code-u", Some("code-d"), "user", true);
    let d = store.add_user("downstream", "code-d", Some("code-u"), "user", true);
    store.set_price(u, service_id, "50.00", Some("80.00"));
    store.set_price(d, service_id, "50.00", Some("70.00"));

    let cascade = price_cascade(&store);
    let outcome = cascade.propagate(u, service_id, dec("80.00")).await.unwrap();

    assert_eq!(outcome.invalidated, 1);
    assert_eq!(outcome.retained, 0);

    // The acting user's own row is untouched by the cascade.
    let own = store.price(u, service_id).unwrap();
    assert_eq!(own.cost_price, dec("50.00"));
    assert_eq!(own.resale_price, Some(dec("80.00")));
    assert!(store.notifications_for(u).is_empty());

    assert_eq!(store.price(d, service_id).unwrap().resale_price, None);
}

#[tokio::test]
async fn unknown_acting_user_is_not_found() {
    let store = MemoryStore::new();
    let cascade = price_cascade(&store);

    let result = cascade
        .propagate(Uuid::new_v4(), Uuid::new_v4(), dec("80.00"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
