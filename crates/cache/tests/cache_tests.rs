use chrono::NaiveDate;
use kabu_cache::mem::MemCache;
use kabu_cache::session::SessionCache;
use kabu_core::cache::entity::{CacheEntry, CacheKey};
use kabu_core::cache::error::CacheError;
use kabu_core::cache::port::{Cache, CacheExt};
use kabu_core::common::{Interval, Ticker};
use kabu_core::market::entity::HistoryParams;
use kabu_core::market::error::MarketError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct TestItem {
    id: u32,
    name: String,
}

#[derive(Debug)]
enum TestError {
    Market(MarketError),
    Cache(CacheError),
}

impl From<CacheError> for TestError {
    fn from(e: CacheError) -> Self {
        TestError::Cache(e)
    }
}

fn ticker(s: &str) -> Ticker {
    Ticker::parse(s).unwrap()
}

fn january() -> HistoryParams {
    HistoryParams {
        start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        interval: Interval::Day1,
        include_prepost: false,
        auto_adjust: true,
        include_actions: true,
    }
}

#[tokio::test]
async fn test_mem_cache_raw_ops() {
    let cache = MemCache::new();
    let key = CacheKey::quote(&ticker("AAPL"));
    let value = vec![1, 2, 3, 4];

    // 测试存取
    cache.set_raw(&key, value.clone()).await.unwrap();
    let result = cache.get_raw(&key).await.unwrap().unwrap();
    assert_eq!(result, value);
    assert_eq!(cache.keys().await.unwrap(), vec![key.clone()]);

    // 测试删除
    assert!(cache.del(&key).await.unwrap());
    assert!(!cache.del(&key).await.unwrap());
    assert!(cache.get_raw(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_mem_cache_typed_ops() {
    let cache = MemCache::new();
    let key = CacheKey::financials(&ticker("MSFT"));
    let item = TestItem {
        id: 42,
        name: "Kabu".to_string(),
    };

    cache.set(&key, &item).await.unwrap();
    let result: TestItem = cache.get(&key).await.unwrap().unwrap();
    assert_eq!(result, item);

    // 以错误类型读取同一键
    let wrong = cache.get::<Vec<f64>>(&key).await;
    assert!(matches!(wrong, Err(CacheError::Deserialize(_))));
}

#[tokio::test]
async fn test_identical_params_fetch_once() {
    let cache = SessionCache::in_memory();
    let key = CacheKey::history(&ticker("AAPL"));
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let value: Result<String, TestError> = cache
            .get_or_fetch(&key, &january(), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("rows".to_string())
            })
            .await;
        assert_eq!(value.unwrap(), "rows");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_changed_end_date_refetches_with_new_params() {
    let cache = SessionCache::in_memory();
    let aapl = ticker("AAPL");
    let history_key = CacheKey::history(&aapl);
    let seen: Mutex<Vec<HistoryParams>> = Mutex::new(Vec::new());

    let first = january();
    let mut second = january();
    second.end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

    for params in [&first, &second] {
        let _: String = cache
            .get_or_fetch::<_, _, TestError, _, _>(&history_key, params, |p| {
                let seen = &seen;
                async move {
                    let label = p.end.to_string();
                    seen.lock().unwrap().push(p);
                    Ok(label)
                }
            })
            .await
            .unwrap();
    }

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].end, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

    // 条目记录的是最新参数，且与报价键互不相同
    let entry: CacheEntry<HistoryParams, String> =
        cache.peek(&history_key).await.unwrap().unwrap();
    assert_eq!(entry.params, second);
    assert_eq!(entry.value, "2024-02-01");
    assert_eq!(history_key.to_string(), "AAPL-history");
    assert_ne!(history_key, CacheKey::quote(&aapl));
    assert!(!cache.contains(&CacheKey::quote(&aapl)).await.unwrap());
}

#[tokio::test]
async fn test_each_param_field_participates_in_equality() {
    let cache = SessionCache::in_memory();
    let key = CacheKey::history(&ticker("TSLA"));
    let calls = AtomicUsize::new(0);

    let mut variants = vec![january()];
    let mut p = january();
    p.interval = Interval::Hour1;
    variants.push(p);
    let mut p = january();
    p.include_prepost = true;
    variants.push(p);
    let mut p = january();
    p.auto_adjust = false;
    variants.push(p);
    let mut p = january();
    p.include_actions = false;
    variants.push(p);
    let mut p = january();
    p.start = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    variants.push(p);

    for params in &variants {
        let _: u32 = cache
            .get_or_fetch::<_, _, TestError, _, _>(&key, params, |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), variants.len());

    // 日期按自然日比较：重新构造的等值参数命中
    let rebuilt = HistoryParams {
        start: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        ..january()
    };
    let _: u32 = cache
        .get_or_fetch::<_, _, TestError, _, _>(&key, &rebuilt, |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), variants.len());
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let cache = SessionCache::in_memory();
    let key = CacheKey::quote(&ticker("AAPL"));
    let calls = AtomicUsize::new(0);

    let failed: Result<String, TestError> = cache
        .get_or_fetch(&key, &(), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Market(MarketError::UpstreamUnavailable(
                "connection reset".to_string(),
            )))
        })
        .await;
    assert!(matches!(
        failed,
        Err(TestError::Market(MarketError::UpstreamUnavailable(_)))
    ));
    assert!(!cache.contains(&key).await.unwrap());

    let retried: Result<String, TestError> = cache
        .get_or_fetch(&key, &(), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("quote".to_string())
        })
        .await;
    assert_eq!(retried.unwrap(), "quote");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.contains(&key).await.unwrap());
}

#[tokio::test]
async fn test_invalidate_removes_only_that_key() {
    let cache = SessionCache::in_memory();
    let aapl = ticker("AAPL");
    let msft = ticker("MSFT");
    let keys = [
        CacheKey::quote(&aapl),
        CacheKey::history(&aapl),
        CacheKey::quote(&msft),
    ];
    for key in &keys {
        let _: u8 = cache
            .get_or_fetch::<_, _, TestError, _, _>(key, &(), |_| async { Ok(0) })
            .await
            .unwrap();
    }

    assert!(cache.invalidate(&keys[0]).await.unwrap());
    assert!(!cache.invalidate(&keys[0]).await.unwrap());
    assert!(!cache.contains(&keys[0]).await.unwrap());
    assert!(cache.contains(&keys[1]).await.unwrap());
    assert!(cache.contains(&keys[2]).await.unwrap());
    assert_eq!(cache.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_invalidate_ticker_drops_every_derived_entry() {
    let cache = SessionCache::in_memory();
    let aapl = ticker("AAPL");
    let msft = ticker("MSFT");
    let keys = [
        CacheKey::quote(&aapl),
        CacheKey::history(&aapl),
        CacheKey::financials(&aapl),
        CacheKey::ai_summary(&aapl),
        CacheKey::comparison(&aapl, &msft),
        CacheKey::quote(&msft),
    ];
    for key in &keys {
        let _: u8 = cache
            .get_or_fetch::<_, _, TestError, _, _>(key, &(), |_| async { Ok(0) })
            .await
            .unwrap();
    }

    assert_eq!(cache.invalidate_ticker(&aapl).await.unwrap(), 5);
    assert_eq!(cache.keys().await.unwrap(), vec![CacheKey::quote(&msft)]);
}

#[tokio::test]
async fn test_history_refetch_marks_summary_stale_but_keeps_quote() {
    let cache = SessionCache::in_memory();
    let aapl = ticker("AAPL");
    let quote_calls = AtomicUsize::new(0);
    let summary_calls = AtomicUsize::new(0);

    let load = |params: HistoryParams| {
        let cache = &cache;
        let aapl = &aapl;
        let quote_calls = &quote_calls;
        let summary_calls = &summary_calls;
        async move {
            let _: String = cache
                .get_or_fetch::<_, _, TestError, _, _>(&CacheKey::quote(aapl), &(), |_| async {
                    quote_calls.fetch_add(1, Ordering::SeqCst);
                    Ok("quote".to_string())
                })
                .await
                .unwrap();
            let _: String = cache
                .get_or_fetch::<_, _, TestError, _, _>(&CacheKey::history(aapl), &params, |_| async {
                    Ok("history".to_string())
                })
                .await
                .unwrap();
            let _: String = cache
                .get_or_fetch::<_, _, TestError, _, _>(
                    &CacheKey::ai_summary(aapl),
                    &params,
                    |_| async {
                        summary_calls.fetch_add(1, Ordering::SeqCst);
                        Ok("summary".to_string())
                    },
                )
                .await
                .unwrap();
        }
    };

    load(january()).await;
    load(january()).await;
    assert_eq!(summary_calls.load(Ordering::SeqCst), 1);

    let mut weekly = january();
    weekly.interval = Interval::Week1;
    load(weekly).await;

    assert_eq!(quote_calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_history_refetch_with_summary_params_keeps_summary() {
    let cache = SessionCache::in_memory();
    let aapl = ticker("AAPL");
    let history_key = CacheKey::history(&aapl);
    let summary_key = CacheKey::ai_summary(&aapl);

    let _: String = cache
        .get_or_fetch::<_, _, TestError, _, _>(&history_key, &january(), |_| async {
            Ok("history".to_string())
        })
        .await
        .unwrap();
    let _: String = cache
        .get_or_fetch::<_, _, TestError, _, _>(&summary_key, &january(), |_| async {
            Ok("summary".to_string())
        })
        .await
        .unwrap();

    // 同一区间重新获取，分析仍对应该区间
    cache.invalidate(&history_key).await.unwrap();
    let _: String = cache
        .get_or_fetch::<_, _, TestError, _, _>(&history_key, &january(), |_| async {
            Ok("history".to_string())
        })
        .await
        .unwrap();
    let entry: CacheEntry<HistoryParams, String> = cache.peek(&summary_key).await.unwrap().unwrap();
    assert!(entry.valid);

    // 不同区间则标记过期
    let mut weekly = january();
    weekly.interval = Interval::Week1;
    let _: String = cache
        .get_or_fetch::<_, _, TestError, _, _>(&history_key, &weekly, |_| async {
            Ok("weekly".to_string())
        })
        .await
        .unwrap();
    let entry: CacheEntry<HistoryParams, String> = cache.peek(&summary_key).await.unwrap().unwrap();
    assert!(!entry.valid);
}

#[tokio::test]
async fn test_compare_history_does_not_touch_summary() {
    let cache = SessionCache::in_memory();
    let aapl = ticker("AAPL");
    let summary_calls = AtomicUsize::new(0);

    let _: String = cache
        .get_or_fetch::<_, _, TestError, _, _>(&CacheKey::history(&aapl), &january(), |_| async {
            Ok("january".to_string())
        })
        .await
        .unwrap();
    let summarize = |_: HistoryParams| async {
        summary_calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, TestError>("summary".to_string())
    };
    let _ = cache
        .get_or_fetch(&CacheKey::ai_summary(&aapl), &january(), summarize)
        .await
        .unwrap();

    let mut march = january();
    march.start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    march.end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    let _: String = cache
        .get_or_fetch::<_, _, TestError, _, _>(&CacheKey::compare_history(&aapl), &march, |_| async {
            Ok("march".to_string())
        })
        .await
        .unwrap();

    let _ = cache
        .get_or_fetch(&CacheKey::ai_summary(&aapl), &january(), summarize)
        .await
        .unwrap();
    assert_eq!(summary_calls.load(Ordering::SeqCst), 1);
    let history: CacheEntry<HistoryParams, String> =
        cache.peek(&CacheKey::history(&aapl)).await.unwrap().unwrap();
    assert_eq!(history.value, "january");
}

#[tokio::test]
async fn test_mark_stale_keeps_entry_readable() {
    let cache = SessionCache::in_memory();
    let key = CacheKey::ai_summary(&ticker("NVDA"));
    let calls = AtomicUsize::new(0);

    let fetch = |_: ()| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, TestError>("bullish".to_string())
    };
    let _ = cache.get_or_fetch(&key, &(), fetch).await.unwrap();

    assert!(cache.mark_stale(&key).await.unwrap());
    let entry: CacheEntry<(), String> = cache.peek(&key).await.unwrap().unwrap();
    assert!(!entry.valid);
    assert_eq!(entry.value, "bullish");

    let _ = cache.get_or_fetch(&key, &(), fetch).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.mark_stale(&CacheKey::quote(&ticker("NVDA"))).await.unwrap());
}

#[tokio::test]
async fn test_sessions_do_not_share_entries() {
    let store: Arc<MemCache> = Arc::new(MemCache::new());
    let first = SessionCache::new(store.clone());
    let second = SessionCache::in_memory();
    let key = CacheKey::quote(&ticker("AMZN"));

    let _: u8 = first
        .get_or_fetch::<_, _, TestError, _, _>(&key, &(), |_| async { Ok(7) })
        .await
        .unwrap();

    assert_eq!(store.len(), 1);
    assert!(!second.contains(&key).await.unwrap());
    first.clear().await.unwrap();
    assert!(store.is_empty());
}
