//! Failure handling: bad payloads, missing tables and unwritable output

use crate::common::{phase_body, test_config};
use cosmic_birthday::crawler::pipeline::{DatasetPipeline, FetchTarget};
use cosmic_birthday::models::MoonPhase;
use cosmic_birthday::storage::dataset::MOON_PHASES_FILE;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Malformed upstream payloads
// ============================================================================

#[tokio::test]
async fn test_malformed_json_fails_the_year() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .and(query_param("year", "2023"))
        .respond_with(ResponseTemplate::new(200).set_body_string(phase_body(2023)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .and(query_param("year", "2024"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2023, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    let report = pipeline.run(FetchTarget::Moon, false).await.unwrap();
    assert_eq!(report.failed_years["moon-phases"], vec![2024]);

    let moon = pipeline.store().load_moon_phases().unwrap().unwrap();
    let failed = &moon.moon_phases[&2024];
    assert!(!failed.success);
    assert_eq!(failed.count, 0);
    assert!(failed.error.as_deref().unwrap_or_default().contains("JSON"));
    assert!(moon.moon_phases[&2023].success);
}

#[tokio::test]
async fn test_upstream_error_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"error": "Year must be between 1700 and 2100"}"#),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2024, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    pipeline.run(FetchTarget::Moon, false).await.unwrap();

    let moon = pipeline.store().load_moon_phases().unwrap().unwrap();
    let error = moon.moon_phases[&2024].error.clone().unwrap_or_default();
    assert!(error.contains("Year must be between"), "{error}");
}

#[tokio::test]
async fn test_bad_rows_counted_not_fatal() {
    let mock_server = MockServer::start().await;

    let body = serde_json::json!({
        "phasedata": [
            {"day": 11, "month": 8, "phase": "Full Moon", "time": "02:08", "year": 2024},
            {"day": 30, "month": 2, "phase": "New Moon", "time": "00:00", "year": 2024},
            {"day": 12, "month": 8, "phase": "Waxing Gibbous", "time": "00:00", "year": 2024},
            {"day": 1, "month": 1, "phase": "Full Moon", "time": "00:00", "year": 2025}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2024, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    let report = pipeline.run(FetchTarget::Moon, false).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.metadata.counts.parse_failures, 2);

    let moon = pipeline.store().load_moon_phases().unwrap().unwrap();
    let year = &moon.moon_phases[&2024];
    assert!(year.success);
    assert_eq!(year.count, 1);
    assert_eq!(year.phases[0].phase, MoonPhase::FullMoon);
}

#[tokio::test]
async fn test_catalog_without_table_fails_every_year() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/(SE|LE)cat5/.*\.html$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><p>This page has moved</p></html>"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/eclipses/solar/year"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2023, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    let report = pipeline.run(FetchTarget::Eclipses, false).await.unwrap();
    assert_eq!(report.failed_years["solar-catalog"], vec![2023, 2024]);
    assert_eq!(report.failed_years["lunar-catalog"], vec![2023, 2024]);
    assert_eq!(report.failed_years["solar-usno"], vec![2023, 2024]);
    assert_eq!(report.metadata.counts.solar_eclipses, 0);
    assert_eq!(report.metadata.counts.lunar_eclipses, 0);
}

// ============================================================================
// Output failures
// ============================================================================

#[tokio::test]
async fn test_unwritable_output_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .respond_with(ResponseTemplate::new(200).set_body_string(phase_body(2024)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2024, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    // A directory squatting on the output name makes the final rename fail
    fs::create_dir(temp_dir.path().join(MOON_PHASES_FILE)).unwrap();

    assert!(pipeline.run(FetchTarget::Moon, false).await.is_err());
}

#[tokio::test]
async fn test_corrupt_checkpoint_ignored_on_resume() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .respond_with(ResponseTemplate::new(200).set_body_string(phase_body(2024)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2024, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    fs::write(
        pipeline.checkpoints().checkpoint_dir().join("moon-phases.checkpoint.json"),
        "{ truncated",
    )
    .unwrap();

    let report = pipeline.run(FetchTarget::Moon, true).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.metadata.counts.total_phases, 2);
}
