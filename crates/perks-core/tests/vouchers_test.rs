#![allow(clippy::unwrap_used)]
// Voucher management, listing and the expiry sweep on every store.

mod common;

use std::time::Duration;

use chrono::{Duration as Span, Utc};
use futures::future::join_all;
use pretty_assertions::assert_eq;

use perks_core::{
    CoreError, Filters, MemoryStore, Perks, PerksConfig, Store, StoreContext, VoucherFilter,
    VoucherStore,
};

async fn seed_listing<S: Store>(perks: &Perks<S>) {
    for (code, min_spend, category) in [
        ("A", 10, "food"),
        ("B", 40, "travel"),
        ("C", 20, "food"),
        ("D", 30, "food"),
        ("E", 0, "travel"),
    ] {
        let mut req = common::voucher_request(code, 5);
        req.min_spend = min_spend;
        req.category = category.into();
        perks.create_voucher(req).await.unwrap();
    }
}

fn codes(items: &[perks_core::Voucher]) -> Vec<&str> {
    items.iter().map(|v| v.code.as_str()).collect()
}

// ── Create, read, delete ────────────────────────────────────────────

async fn created_voucher_reads_back_unchanged<S: Store>(perks: Perks<S>) {
    let mut req = common::voucher_request("SAVE10", 100);
    req.min_spend = 2500;
    req.category = "groceries".into();
    let created = perks.create_voucher(req).await.unwrap();

    assert_eq!(created.usage_count, 0);
    assert!(created.active);
    assert_eq!(perks.voucher("SAVE10").await.unwrap(), created);
}

async fn duplicate_code_is_rejected<S: Store>(perks: Perks<S>) {
    common::seed_voucher(&perks, "ONCE", 1).await;
    let err = perks
        .create_voucher(common::voucher_request("ONCE", 9))
        .await
        .unwrap_err();

    assert_eq!(err, CoreError::DuplicateCode);
    assert_eq!(perks.voucher("ONCE").await.unwrap().usage_limit, 1);
}

async fn missing_code_is_generated<S: Store>(perks: Perks<S>) {
    let mut req = common::voucher_request("unused", 1);
    req.code = None;
    let created = perks.create_voucher(req).await.unwrap();

    assert_eq!(created.code.len(), perks_core::code::CODE_LEN);
    assert!(perks.voucher(&created.code).await.is_ok());
}

async fn invalid_voucher_reports_fields<S: Store>(perks: Perks<S>) {
    let mut req = common::voucher_request("bad code!", -1);
    req.expires = req.starts;
    let err = perks.create_voucher(req).await.unwrap_err();

    let fields = err.field_errors().unwrap();
    for field in ["code", "usage_limit", "starts"] {
        assert!(fields.contains_key(field), "missing error for {field}");
    }
}

async fn deleted_voucher_is_gone<S: Store>(perks: Perks<S>) {
    common::seed_voucher(&perks, "BYE", 1).await;
    perks.delete_voucher("BYE").await.unwrap();

    assert!(matches!(
        perks.voucher("BYE").await,
        Err(CoreError::NotFound { entity: "voucher", .. })
    ));
    assert!(matches!(
        perks.delete_voucher("BYE").await,
        Err(CoreError::NotFound { .. })
    ));
}

// ── Usage counting ──────────────────────────────────────────────────

async fn concurrent_increments_have_one_winner<S: Store>(perks: Perks<S>) {
    common::seed_voucher(&perks, "ONLY1", 1).await;

    let tasks = (0..16).map(|_| {
        let perks = perks.clone();
        tokio::spawn(async move { perks.increment_usage("ONLY1").await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(CoreError::EditConflict)))
            .count(),
        15
    );
    let voucher = perks.voucher("ONLY1").await.unwrap();
    assert_eq!(voucher.usage_count, 1);
    assert!(!voucher.active);
}

async fn zero_limit_voucher_is_never_counted<S: Store>(perks: Perks<S>) {
    common::seed_voucher(&perks, "ZERO", 0).await;
    assert_eq!(
        perks.increment_usage("ZERO").await.unwrap_err(),
        CoreError::EditConflict
    );
    assert!(matches!(
        perks.increment_usage("NOSUCH").await,
        Err(CoreError::NotFound { .. })
    ));
}

// ── Listing ─────────────────────────────────────────────────────────

async fn listing_pages_by_code<S: Store>(perks: Perks<S>) {
    seed_listing(&perks).await;
    let filter = VoucherFilter::default();
    let mut filters = Filters {
        page_size: 2,
        ..Filters::default()
    };

    let first = perks.list_vouchers(&filter, &filters).await.unwrap();
    assert_eq!(codes(&first.items), ["A", "B"]);
    assert_eq!(first.metadata.cursor.as_deref(), Some("B"));

    filters.cursor = first.metadata.cursor;
    let second = perks.list_vouchers(&filter, &filters).await.unwrap();
    assert_eq!(codes(&second.items), ["C", "D"]);

    filters.cursor = second.metadata.cursor;
    let last = perks.list_vouchers(&filter, &filters).await.unwrap();
    assert_eq!(codes(&last.items), ["E"]);
    assert_eq!(last.metadata.cursor, None);
}

async fn listing_pages_by_descending_min_spend<S: Store>(perks: Perks<S>) {
    seed_listing(&perks).await;
    let filter = VoucherFilter::default();
    let mut filters = Filters {
        page_size: 2,
        sort: "-min_spend".into(),
        ..Filters::default()
    };

    let mut seen = Vec::new();
    loop {
        let page = perks.list_vouchers(&filter, &filters).await.unwrap();
        seen.extend(page.items.iter().map(|v| v.code.clone()));
        match page.metadata.cursor {
            Some(cursor) => filters.cursor = Some(cursor),
            None => break,
        }
    }
    assert_eq!(seen, ["B", "D", "C", "A", "E"]);
}

async fn listing_applies_filters<S: Store>(perks: Perks<S>) {
    seed_listing(&perks).await;
    let filter = VoucherFilter {
        category: Some("food".into()),
        max_min_spend: Some(20),
        ..VoucherFilter::default()
    };

    let page = perks
        .list_vouchers(&filter, &Filters::default())
        .await
        .unwrap();
    assert_eq!(codes(&page.items), ["A", "C"]);
}

async fn listing_rejects_unknown_sort<S: Store>(perks: Perks<S>) {
    let filters = Filters {
        sort: "password".into(),
        ..Filters::default()
    };
    let err = perks
        .list_vouchers(&VoucherFilter::default(), &filters)
        .await
        .unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("sort"));
}

// ── Expiry sweep ────────────────────────────────────────────────────

async fn sweep_deactivates_only_expired<S: Store>(perks: Perks<S>) {
    common::seed_voucher(&perks, "LIVE", 5).await;
    let mut lapsed = common::voucher_request("LAPSED", 5);
    lapsed.starts = Utc::now() - Span::days(10);
    lapsed.expires = Utc::now() - Span::seconds(1);
    perks.create_voucher(lapsed).await.unwrap();

    assert_eq!(perks.sweep_expired().await.unwrap(), 1);
    assert!(!perks.voucher("LAPSED").await.unwrap().active);
    assert!(perks.voucher("LIVE").await.unwrap().active);
    assert_eq!(perks.sweep_expired().await.unwrap(), 0);
}

common::store_tests!(
    created_voucher_reads_back_unchanged,
    duplicate_code_is_rejected,
    missing_code_is_generated,
    invalid_voucher_reports_fields,
    deleted_voucher_is_gone,
    concurrent_increments_have_one_winner,
    zero_limit_voucher_is_never_counted,
    listing_pages_by_code,
    listing_pages_by_descending_min_spend,
    listing_applies_filters,
    listing_rejects_unknown_sort,
    sweep_deactivates_only_expired,
);

#[tokio::test(start_paused = true)]
async fn background_sweep_runs_until_shutdown() {
    let config = PerksConfig {
        sweep_interval: Some(Duration::from_secs(60)),
        ..common::config()
    };
    let store = MemoryStore::new(StoreContext::new(config.op_timeout));
    let perks = Perks::new(store, config);

    let mut lapsed = common::voucher_request("SOON", 5);
    lapsed.starts = Utc::now() - Span::days(1);
    lapsed.expires = Utc::now() - Span::seconds(1);
    perks.create_voucher(lapsed).await.unwrap();

    assert!(perks.spawn_expiry_sweep().await);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!perks.store().voucher("SOON").await.unwrap().active);

    perks.shutdown().await;
}

#[tokio::test]
async fn sweep_is_off_without_an_interval() {
    let perks = Perks::new(MemoryStore::default(), common::config());
    assert!(!perks.spawn_expiry_sweep().await);
    perks.shutdown().await;
}

#[tokio::test]
async fn cancelled_store_refuses_work() {
    let perks = common::memory();
    perks.storage_cancellation().cancel();
    assert_eq!(
        perks.voucher("ANY").await.unwrap_err(),
        CoreError::Cancelled
    );
}
