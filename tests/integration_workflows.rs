//! End-to-end pipeline workflows over scripted engines
//!
//! No model weights are needed: engines are scripted through the public
//! `SegmentationEngine` trait.

mod common;

use common::{
    centered_square, gray_image, leading_pixels, processor_with, test_config, NoModelFactory,
    ScriptedEngine,
};
use garment_cutout::{
    metrics::REQUESTS_TOTAL, EngineKind, EngineRegistry, EnginePreference, GarmentCutoutProcessor,
    MetricsRegistry, RequestOptions, SegmentationConfig,
};
use std::sync::{atomic::Ordering, Arc};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_primary_mask_accepted() {
    let primary = ScriptedEngine::primary_square(0.25);
    let fallback = ScriptedEngine::fallback_square(0.5);
    let fallback_calls = fallback.calls();
    let (processor, metrics) =
        processor_with(test_config(), Arc::new(primary), Arc::new(fallback));

    let result = processor
        .process_bgr(gray_image(200, 160), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(result.metadata.engine_used, EngineKind::Primary);
    assert_eq!(result.metadata.engine_name, "u2netp");
    assert!(!result.metadata.fallback_triggered);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.counter(REQUESTS_TOTAL), 1);
    assert_eq!(snapshot.engine_count("u2netp"), 1);
    assert_eq!(snapshot.fallback_count(), 0);
    assert_eq!(snapshot.mask_ratio_stats.as_ref().map(|s| s.count), Some(1));
}

#[tokio::test]
async fn test_low_primary_ratio_triggers_single_fallback() {
    // 50 foreground pixels on 100x100 is a ratio of 0.005
    let primary = ScriptedEngine::new("u2netp", EngineKind::Primary, |w, h| {
        Ok(leading_pixels(w, h, 50))
    });
    let fallback = ScriptedEngine::fallback_square(0.3);
    let (primary_calls, fallback_calls) = (primary.calls(), fallback.calls());
    let config = SegmentationConfig::builder()
        .gamma(1.0)
        .max_edge(256)
        .build()
        .unwrap();
    let (processor, metrics) = processor_with(config, Arc::new(primary), Arc::new(fallback));

    let result = processor
        .process_bgr(gray_image(100, 100), RequestOptions::new())
        .await
        .unwrap();

    assert!(result.metadata.fallback_triggered);
    assert_eq!(result.metadata.engine_used, EngineKind::Fallback);
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.fallback_count(), 1);
    assert_eq!(snapshot.engine_count("grabcut"), 1);
    assert_eq!(snapshot.engine_count("u2netp"), 0);
}

#[tokio::test]
async fn test_primary_failure_and_timeout_fall_back() {
    let config = SegmentationConfig::builder()
        .gamma(1.0)
        .primary_timeout_ms(50)
        .build()
        .unwrap();

    let failing = ScriptedEngine::failing("u2netp", EngineKind::Primary);
    let (processor, _) = processor_with(
        config.clone(),
        Arc::new(failing),
        Arc::new(ScriptedEngine::fallback_square(0.4)),
    );
    let result = processor
        .process_bgr(gray_image(64, 64), RequestOptions::new())
        .await
        .unwrap();
    assert!(result.metadata.fallback_triggered);

    let slow = ScriptedEngine::primary_square(0.4).with_delay(Duration::from_millis(400));
    let (processor, metrics) = processor_with(
        config,
        Arc::new(slow),
        Arc::new(ScriptedEngine::fallback_square(0.4)),
    );
    let result = processor
        .process_bgr(gray_image(64, 64), RequestOptions::new())
        .await
        .unwrap();
    assert!(result.metadata.fallback_triggered);
    assert_eq!(result.metadata.engine_name, "grabcut");
    assert_eq!(metrics.snapshot().fallback_count(), 1);
}

#[tokio::test]
async fn test_force_fallback_never_invokes_primary() {
    let primary = ScriptedEngine::primary_square(0.3);
    let primary_calls = primary.calls();
    let fallback = ScriptedEngine::fallback_square(0.3);
    let config = SegmentationConfig::builder()
        .gamma(1.0)
        .force_fallback(true)
        .build()
        .unwrap();
    let (processor, metrics) = processor_with(config, Arc::new(primary), Arc::new(fallback));

    for _ in 0..3 {
        let result = processor
            .process_bgr(gray_image(80, 80), RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(result.metadata.engine_used, EngineKind::Fallback);
        assert!(!result.metadata.fallback_triggered);
    }

    assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
    assert_eq!(metrics.snapshot().fallback_count(), 0);
    assert_eq!(metrics.snapshot().engine_count("grabcut"), 3);
}

#[tokio::test]
async fn test_request_level_engine_override() {
    let primary = ScriptedEngine::primary_square(0.3);
    let primary_calls = primary.calls();
    let (processor, _) = processor_with(
        test_config(),
        Arc::new(primary),
        Arc::new(ScriptedEngine::fallback_square(0.3)),
    );

    let result = processor
        .process_bgr(
            gray_image(80, 80),
            RequestOptions::new().engine(EnginePreference::Fallback),
        )
        .await
        .unwrap();
    assert_eq!(result.metadata.engine_used, EngineKind::Fallback);
    assert_eq!(primary_calls.load(Ordering::SeqCst), 0);

    let result = processor
        .process_bgr(gray_image(80, 80), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(result.metadata.engine_used, EngineKind::Primary);
}

#[tokio::test]
async fn test_unavailable_primary_is_built_once() {
    let factory = Arc::new(NoModelFactory::new(0.35));
    let builds = Arc::clone(&factory.primary_builds);
    let processor = GarmentCutoutProcessor::with_factory(test_config(), factory).unwrap();

    for _ in 0..3 {
        let result = processor
            .process_bgr(gray_image(64, 48), RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(result.metadata.engine_used, EngineKind::Fallback);
        assert!(result.metadata.fallback_triggered);
    }

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(processor.metrics_snapshot().fallback_count(), 3);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_processor() {
    let primary = ScriptedEngine::primary_square(0.25);
    let primary_calls = primary.calls();
    let metrics = Arc::new(MetricsRegistry::new());
    let engines = Arc::new(EngineRegistry::from_engines(
        Arc::new(primary),
        Arc::new(ScriptedEngine::fallback_square(0.25)),
    ));
    let processor = Arc::new(
        GarmentCutoutProcessor::with_parts(test_config(), engines, Arc::clone(&metrics)).unwrap(),
    );

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8u32 {
        let processor = Arc::clone(&processor);
        tasks.spawn(async move {
            let size = 60 + i * 10;
            processor
                .process_bgr(
                    gray_image(size, size),
                    RequestOptions::new().request_id(format!("seg-concurrent-{i}")),
                )
                .await
        });
    }

    let mut ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap().unwrap();
        let (w, h) = result.dimensions();
        assert_eq!(result.mask.dimensions, (w, h));
        ids.push(result.metadata.request_id);
    }
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 8);
    assert_eq!(primary_calls.load(Ordering::SeqCst), 8);
    assert_eq!(metrics.snapshot().counter(REQUESTS_TOTAL), 8);
    assert_eq!(metrics.snapshot().engine_count("u2netp"), 8);
}

#[tokio::test]
async fn test_outputs_round_trip_through_png() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let (processor, _) = processor_with(
        test_config(),
        Arc::new(ScriptedEngine::primary_square(0.3)),
        Arc::new(ScriptedEngine::fallback_square(0.3)),
    );
    let result = processor
        .process_bgr(gray_image(90, 70), RequestOptions::new())
        .await
        .unwrap();

    let cutout_path = temp_dir.path().join("cutout.png");
    let mask_path = temp_dir.path().join("mask.png");
    result.save_png(&cutout_path).unwrap();
    result.save_mask_png(&mask_path).unwrap();

    let cutout = image::open(&cutout_path).unwrap().to_rgba8();
    let mask = image::open(&mask_path).unwrap().to_luma8();
    assert_eq!(cutout.dimensions(), (90, 70));
    for (pixel, alpha) in cutout.pixels().zip(mask.pixels()) {
        assert_eq!(pixel.0[3], alpha.0[0]);
    }
}

#[tokio::test]
async fn test_metadata_serializes_for_callers() {
    let (processor, _) = processor_with(
        test_config(),
        Arc::new(ScriptedEngine::primary_square(0.25)),
        Arc::new(ScriptedEngine::fallback_square(0.25)),
    );
    let result = processor
        .process_bgr(gray_image(100, 100), RequestOptions::new())
        .await
        .unwrap();

    let json = serde_json::to_value(&result.metadata).unwrap();
    assert_eq!(json["engine_used"], "primary");
    assert_eq!(json["fallback_triggered"], false);
    assert_eq!(json["bbox_xywh"], serde_json::json!([25, 25, 50, 50]));
    assert!(json["request_id"].as_str().unwrap().starts_with("seg-"));
    assert!(json["timings"]["total_ms"].is_u64());
}

#[tokio::test]
async fn test_final_mask_matches_engine_square_after_cleanup() {
    let (processor, _) = processor_with(
        test_config(),
        Arc::new(ScriptedEngine::primary_square(0.25)),
        Arc::new(ScriptedEngine::fallback_square(0.25)),
    );
    let result = processor
        .process_bgr(gray_image(100, 100), RequestOptions::new().median_blur(0))
        .await
        .unwrap();

    // Opening and closing preserve a solid square; without median smoothing
    // the corners survive as well.
    assert_eq!(result.mask, centered_square(100, 100, 0.25));
    assert_eq!(result.bbox.to_xywh(), [25, 25, 50, 50]);
    assert_eq!(result.metadata.median_blur, 0);
}
