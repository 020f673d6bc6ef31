//! Cache behavior tests.
//!
//! Tests verify:
//! - First request is a MISS, repeats are byte-identical HITs
//! - Cache hits never touch the raster
//! - FIFO eviction once capacity is reached
//! - Empty tiles are never cached

use std::sync::Arc;

use tokio::task::JoinSet;

use raster_tiler::geo::IdentityProjector;
use raster_tiler::tile::{TileKey, TileOutcome, TileService, TilerSettings};

use super::test_utils::{
    constant_raster, get, header, identity_router, identity_router_with, world_info,
    CountingRaster,
};

fn counting_world_raster() -> CountingRaster {
    CountingRaster::new(constant_raster(world_info(), &[10.0, 20.0, 30.0]))
}

// =============================================================================
// HIT / MISS
// =============================================================================

#[tokio::test]
async fn test_miss_then_hit() {
    let raster = counting_world_raster();
    let router = identity_router(raster.clone());

    let (_, headers, first) = get(&router, "/api/tiles/8/128/127").await;
    assert_eq!(header(&headers, "x-cache"), "MISS");
    assert_eq!(header(&headers, "x-tile-outcome"), "covered");
    let reads_after_miss = raster.reads();
    assert_eq!(reads_after_miss, 3);

    let (_, headers, second) = get(&router, "/api/tiles/8/128/127").await;
    assert_eq!(header(&headers, "x-cache"), "HIT");
    assert_eq!(header(&headers, "x-tile-outcome"), "cached");
    assert_eq!(header(&headers, "cache-control"), "public, max-age=3600");
    assert_eq!(first, second);

    assert_eq!(raster.reads(), reads_after_miss);
}

#[tokio::test]
async fn test_distinct_tiles_are_distinct_entries() {
    let router = identity_router(counting_world_raster());

    let (_, headers, _) = get(&router, "/api/tiles/8/128/127").await;
    assert_eq!(header(&headers, "x-cache"), "MISS");

    let (_, headers, _) = get(&router, "/api/tiles/8/127/127").await;
    assert_eq!(header(&headers, "x-cache"), "MISS");

    let (_, headers, _) = get(&router, "/api/tiles/8/128/127").await;
    assert_eq!(header(&headers, "x-cache"), "HIT");
}

// =============================================================================
// Eviction
// =============================================================================

#[tokio::test]
async fn test_fifo_eviction() {
    let settings = TilerSettings {
        cache_capacity: 3,
        ..TilerSettings::default()
    };
    let router = identity_router_with(counting_world_raster(), settings);

    let a = "/api/tiles/8/127/127";
    let b = "/api/tiles/8/128/127";
    let c = "/api/tiles/8/127/128";
    let d = "/api/tiles/8/128/128";

    for uri in [a, b, c] {
        let (_, headers, _) = get(&router, uri).await;
        assert_eq!(header(&headers, "x-cache"), "MISS", "{uri}");
    }

    // A hit does not refresh A's position in insertion order
    let (_, headers, _) = get(&router, a).await;
    assert_eq!(header(&headers, "x-cache"), "HIT");

    let (_, headers, _) = get(&router, d).await;
    assert_eq!(header(&headers, "x-cache"), "MISS");

    // A was the oldest insertion and is gone
    let (_, headers, _) = get(&router, a).await;
    assert_eq!(header(&headers, "x-cache"), "MISS");

    let (_, headers, _) = get(&router, d).await;
    assert_eq!(header(&headers, "x-cache"), "HIT");
}

#[tokio::test]
async fn test_cache_stats_track_capacity() {
    let settings = TilerSettings {
        cache_capacity: 2,
        ..TilerSettings::default()
    };
    let service = TileService::with_projector(
        Arc::new(counting_world_raster()),
        IdentityProjector,
        settings,
    )
    .unwrap();

    for (x, y) in [(127, 127), (128, 127), (127, 128)] {
        let response = service.get_tile(TileKey::new(8, x, y)).await;
        assert_eq!(response.outcome, TileOutcome::Covered);
    }

    let stats = service.cache_stats().await;
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.capacity, 2);
    assert!(stats.bytes > 0);

    service.clear_cache().await;
    assert_eq!(service.cache_stats().await.entries, 0);
}

// =============================================================================
// Empty Tiles
// =============================================================================

#[tokio::test]
async fn test_empty_tiles_are_not_cached() {
    let raster = counting_world_raster();
    let router = identity_router(raster.clone());

    for _ in 0..3 {
        let (_, headers, _) = get(&router, "/api/tiles/3/0/0").await;
        assert_eq!(header(&headers, "x-cache"), "MISS");
        assert_eq!(header(&headers, "x-tile-outcome"), "empty");
    }

    for _ in 0..2 {
        let (_, headers, _) = get(&router, "/api/tiles/3/9/0").await;
        assert_eq!(header(&headers, "x-cache"), "MISS");
    }

    // No-coverage tiles never reach the raster
    assert_eq!(raster.reads(), 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_identical_requests() {
    let router = identity_router(counting_world_raster());

    let mut set = JoinSet::new();
    for _ in 0..8 {
        let router = router.clone();
        set.spawn(async move { get(&router, "/api/tiles/8/128/127").await });
    }
    let responses = set.join_all().await;

    let first = &responses[0].2;
    for (status, _, body) in &responses {
        assert!(status.is_success());
        assert_eq!(body, first);
    }

    let (_, headers, body) = get(&router, "/api/tiles/8/128/127").await;
    assert_eq!(header(&headers, "x-cache"), "HIT");
    assert_eq!(&body, first);
}
