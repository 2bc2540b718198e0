//! End-to-end cache behaviour over the in-memory store
//!
//! Covers:
//! - Round trips and coalesced computation through the resource helpers
//! - Fail-open behaviour while the store is down
//! - TTL jitter bounds as seen by the store
//! - Prefix invalidation and the admin facade

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use application::{ApplicationError, KeyTtl, KeyValueStore};
use futures::TryStreamExt;
use futures::future::join_all;
use infrastructure::{AppConfig, CacheServices, InMemoryStore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Player {
    name: String,
    home_runs: u32,
}

impl Player {
    fn ruth() -> Self {
        Self {
            name: "Babe Ruth".into(),
            home_runs: 714,
        }
    }
}

#[derive(Debug, Error)]
#[error("stats service returned {0}")]
struct StatsError(u16);

fn services_with(config: AppConfig) -> (CacheServices, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let services =
        CacheServices::with_store(config, Arc::clone(&store) as Arc<dyn KeyValueStore>).unwrap();
    (services, store)
}

fn services() -> (CacheServices, Arc<InMemoryStore>) {
    services_with(AppConfig::default())
}

// ============================================================================
// Core client
// ============================================================================

mod core_client_tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (services, _) = services();
        let players = services.entity_cache::<Player>("player");

        players.set("ruth", &Player::ruth()).await.unwrap();
        assert_eq!(players.get("ruth").await, Some(Player::ruth()));
        assert_eq!(players.get("gehrig").await, None);
    }

    #[tokio::test]
    async fn delete_removes_value() {
        let (services, store) = services();
        let players = services.entity_cache::<Player>("player");

        players.set("ruth", &Player::ruth()).await.unwrap();
        players.delete("ruth").await.unwrap();
        assert_eq!(players.get("ruth").await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_for_ruth_compute_once() {
        let (services, _) = services();
        let players = services.entity_cache::<Player>("player");
        let calls = AtomicUsize::new(0);

        let fetch = || {
            players.get_or_compute("ruth", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, StatsError>(Player::ruth())
            })
        };
        let (first, second) = tokio::join!(fetch(), fetch());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(players.get("ruth").await, Some(Player::ruth()));
    }

    #[tokio::test]
    async fn many_callers_share_one_computation() {
        let (services, _) = services();
        let client = &services.client;
        let key = client.keys().entity_key("player", "ruth");
        let calls = AtomicUsize::new(0);

        let results = join_all((0..25).map(|_| {
            client.get_or_compute(&key, Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, StatsError>(Player::ruth())
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.into_iter().all(|r| r.unwrap() == Player::ruth()));
        assert_eq!(services.metrics.snapshot().computations, 1);
    }

    #[tokio::test]
    async fn many_callers_share_one_error() {
        let (services, store) = services();
        let client = &services.client;
        let key = client.keys().entity_key("player", "ruth");
        let calls = AtomicUsize::new(0);

        let results = join_all((0..10).map(|_| {
            client.get_or_compute(&key, Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err::<Player, _>(StatsError(503))
            })
        }))
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let errors: Vec<_> = results.into_iter().map(Result::unwrap_err).collect();
        assert!(errors.iter().all(|e| e.same_error(&errors[0])));
        assert_eq!(errors[0].downcast_ref::<StatsError>().unwrap().0, 503);
        // Failures are never cached as values
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn followers_take_over_when_leader_is_cancelled() {
        let (services, _) = services();
        let key = services.client.keys().entity_key("player", "ruth");
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let client = services.client.clone();
            let key = key.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                client
                    .get_or_compute(&key, Duration::from_secs(60), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::future::pending::<Result<u32, StatsError>>().await
                    })
                    .await
            })
        };
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let followers: Vec<_> = (0..4)
            .map(|_| {
                let client = services.client.clone();
                let key = key.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    client
                        .get_or_compute(&key, Duration::from_secs(60), move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, StatsError>(2_u32)
                        })
                        .await
                })
            })
            .collect();
        while services.metrics.snapshot().coalesced_waits < 4 {
            tokio::task::yield_now().await;
        }

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        for follower in followers {
            assert_eq!(follower.await.unwrap().unwrap(), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_computes_every_time() {
        let mut config = AppConfig::default();
        config.cache.enabled = false;
        let (services, store) = services_with(config);
        let players = services.entity_cache::<Player>("player");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let player = players
                .get_or_compute("ruth", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StatsError>(Player::ruth())
                })
                .await
                .unwrap();
            assert_eq!(player, Player::ruth());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn schema_bump_orphans_old_keys() {
        let store = Arc::new(InMemoryStore::new());
        let shared = Arc::clone(&store) as Arc<dyn KeyValueStore>;
        let v1 = CacheServices::with_store(AppConfig::default(), Arc::clone(&shared)).unwrap();
        let mut config = AppConfig::default();
        config.cache.schema_version = "v2".into();
        let v2 = CacheServices::with_store(config, shared).unwrap();

        v1.entity_cache::<Player>("player")
            .set("ruth", &Player::ruth())
            .await
            .unwrap();

        assert!(v2.entity_cache::<Player>("player").get("ruth").await.is_none());
        assert_eq!(store.len(), 1);
    }
}

// ============================================================================
// Fail-open behaviour
// ============================================================================

mod outage_tests {
    use super::*;

    #[tokio::test]
    async fn reads_miss_while_store_is_down() {
        let (services, store) = services();
        let players = services.entity_cache::<Player>("player");
        players.set("ruth", &Player::ruth()).await.unwrap();

        store.set_unavailable(true);
        assert_eq!(players.get("ruth").await, None);

        store.set_unavailable(false);
        assert_eq!(players.get("ruth").await, Some(Player::ruth()));
    }

    #[tokio::test]
    async fn compute_still_answers_while_store_is_down() {
        let (services, store) = services();
        store.set_unavailable(true);
        let players = services.entity_cache::<Player>("player");

        let player = players
            .get_or_compute("ruth", || async { Ok::<_, StatsError>(Player::ruth()) })
            .await
            .unwrap();
        assert_eq!(player, Player::ruth());
        assert!(services.metrics.snapshot().store_errors > 0);
    }

    #[tokio::test]
    async fn write_errors_are_cache_internal() {
        let (services, store) = services();
        store.set_unavailable(true);

        let err = services
            .entity_cache::<Player>("player")
            .set("ruth", &Player::ruth())
            .await
            .unwrap_err();
        assert!(err.is_cache_internal());
    }
}

// ============================================================================
// TTL jitter
// ============================================================================

mod ttl_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn thousand_entity_keys_land_within_ten_percent() {
        let (services, store) = services();
        let players = services.entity_cache::<u32>("player");
        assert_eq!(players.ttl(), Duration::from_secs(30 * 60));

        for id in 0..1000_u32 {
            players.set(id, &id).await.unwrap();
        }

        let lower = Duration::from_secs(27 * 60);
        let upper = Duration::from_secs(33 * 60);
        let mut distinct = std::collections::BTreeSet::new();
        for id in 0..1000_u32 {
            let key = players.key(id);
            match store.ttl(key.as_str()).await.unwrap() {
                KeyTtl::Expires(ttl) => {
                    assert!(ttl >= lower && ttl <= upper, "{key}: {ttl:?}");
                    distinct.insert(ttl.as_secs());
                },
                other => panic!("{key}: unexpected {other:?}"),
            }
        }
        // Expiries are spread, not synchronized
        assert!(distinct.len() > 100);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_histogram_reflects_category_ttls() {
        let (services, _) = services();
        let players = services.entity_cache::<u32>("player");
        let rosters = services.list_cache::<Vec<u32>>("roster");

        for id in 0..10_u32 {
            players.set(id, &id).await.unwrap();
        }
        rosters.set([("team", "yankees")], &vec![1, 2]).await.unwrap();

        let pattern = format!("{}*", services.client.keys().prefix());
        let stats = services.admin.stats(&pattern).await.unwrap();
        assert_eq!(stats.count(), 11);

        let histogram = stats.histogram(&application::DEFAULT_TTL_BUCKETS);
        assert_eq!(histogram.total(), 11);
        assert_eq!(histogram.persistent, 0);
        assert_eq!(histogram.missing, 0);
    }
}

// ============================================================================
// Invalidation and admin
// ============================================================================

mod invalidation_tests {
    use super::*;

    #[tokio::test]
    async fn invalidate_all_leaves_other_resources_intact() {
        let (services, store) = services();
        let rosters = services.list_cache::<Vec<u32>>("roster");
        let rosters_extended = services.list_cache::<Vec<u32>>("roster-extended");
        let players = services.entity_cache::<Player>("player");

        rosters.set([("team", "yankees")], &vec![3]).await.unwrap();
        rosters
            .set([("team", "red sox"), ("year", "1919")], &vec![3])
            .await
            .unwrap();
        rosters.set([("page", "2")], &vec![]).await.unwrap();
        rosters_extended
            .set([("team", "yankees")], &vec![3, 4])
            .await
            .unwrap();
        players.set("ruth", &Player::ruth()).await.unwrap();

        assert_eq!(rosters.invalidate_all().await.unwrap(), 3);

        let leftovers: Vec<String> = services
            .client
            .inspector()
            .scan(&format!("{}*", rosters.prefix()))
            .try_collect()
            .await
            .unwrap();
        assert!(leftovers.is_empty());
        assert_eq!(
            rosters_extended.get([("team", "yankees")]).await,
            Some(vec![3, 4])
        );
        assert_eq!(players.get("ruth").await, Some(Player::ruth()));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn invalidate_all_spares_nested_resource_names() {
        let (services, _) = services();
        let teams = services.list_cache::<Vec<u32>>("team");
        let rosters = services.list_cache::<Vec<u32>>("team:roster");

        teams.set([("league", "AL")], &vec![1]).await.unwrap();
        rosters.set([("team", "yankees")], &vec![3, 4]).await.unwrap();

        assert_eq!(teams.invalidate_all().await.unwrap(), 1);
        assert_eq!(teams.get([("league", "AL")]).await, None);
        assert_eq!(rosters.get([("team", "yankees")]).await, Some(vec![3, 4]));
    }

    #[tokio::test]
    async fn colon_in_id_does_not_reach_another_resource() {
        let (services, _) = services();
        let players = services.entity_cache::<String>("player");
        let seasons = services.entity_cache::<String>("player:1927");

        players
            .set("1927:ruth", &"ruth-from-player".to_owned())
            .await
            .unwrap();

        assert_eq!(seasons.get("ruth").await, None);
        assert_eq!(
            players.get("1927:ruth").await.as_deref(),
            Some("ruth-from-player")
        );
    }

    #[tokio::test]
    async fn permuted_parameters_hit_the_same_entry() {
        let (services, _) = services();
        let search = services.search_cache::<Vec<String>>();

        search
            .set([("q", "ruth"), ("sort", "hr"), ("page", "")], &vec!["ruth".into()])
            .await
            .unwrap();

        assert_eq!(
            search.get([("sort", "hr"), ("q", "ruth")]).await,
            Some(vec!["ruth".to_string()])
        );
        assert_eq!(search.get([("q", "gehrig"), ("sort", "hr")]).await, None);
    }

    #[tokio::test]
    async fn admin_requires_confirmation() {
        let (services, store) = services();
        services
            .entity_cache::<Player>("player")
            .set("ruth", &Player::ruth())
            .await
            .unwrap();

        assert!(matches!(
            services.admin.clear_namespace(false).await,
            Err(ApplicationError::ConfirmationRequired(_))
        ));
        assert!(matches!(
            services.admin.delete_matching("*", false).await,
            Err(ApplicationError::ConfirmationRequired(_))
        ));
        assert_eq!(store.len(), 1);

        assert_eq!(services.admin.clear_namespace(true).await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn admin_lists_and_inspects_keys() {
        let (services, _) = services();
        let players = services.entity_cache::<Player>("player");
        for id in ["ruth", "gehrig", "dimaggio"] {
            players.set(id, &Player::ruth()).await.unwrap();
        }

        let pattern = format!("{}*", services.client.keys().prefix());
        let keys = services.admin.list_keys(&pattern, 2).await.unwrap();
        assert_eq!(keys.len(), 2);

        let inspection = services
            .admin
            .inspect(players.key("ruth").as_str())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(inspection.ttl, KeyTtl::Expires(_)));
        assert_eq!(inspection.json.unwrap()["home_runs"], 714);
        assert!(services.admin.inspect("nope").await.unwrap().is_none());
    }
}
