//! Full pipeline runs against a mock upstream

use crate::common::{
    phase_body, solar_body_2024, test_config, LUNAR_CATALOG_PAGE, SOLAR_CATALOG_PAGE,
};
use cosmic_birthday::crawler::pipeline::{DatasetPipeline, FetchTarget};
use cosmic_birthday::matcher::{find_matches, parse_birth_date};
use cosmic_birthday::models::EclipseKind;
use cosmic_birthday::storage::dataset::{
    LUNAR_ECLIPSES_FILE, MOON_PHASES_FILE, SOLAR_ECLIPSES_FILE,
};
use cosmic_birthday::storage::{read_dataset, DATASET_FILE};
use std::collections::BTreeSet;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Mock upstream
// ============================================================================

async fn mount_moon(server: &MockServer, year: i32) {
    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .and(query_param("year", year.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(phase_body(year)))
        .mount(server)
        .await;
}

async fn mount_catalogs(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/SEcat5/SE2001-2100.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SOLAR_CATALOG_PAGE))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/LEcat5/LE2001-2100.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LUNAR_CATALOG_PAGE))
        .expect(1)
        .mount(server)
        .await;
}

/// USNO solar answers 2024 and fails 2023
async fn mount_usno_solar(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/eclipses/solar/year"))
        .and(query_param("year", "2024"))
        .respond_with(ResponseTemplate::new(200).set_body_string(solar_body_2024()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/eclipses/solar/year"))
        .and(query_param("year", "2023"))
        .respond_with(ResponseTemplate::new(500).set_body_string("maintenance"))
        .mount(server)
        .await;
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_run_writes_all_files() {
    let mock_server = MockServer::start().await;
    mount_moon(&mock_server, 2023).await;
    mount_moon(&mock_server, 2024).await;
    mount_usno_solar(&mock_server).await;
    mount_catalogs(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2023, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    let report = pipeline.run(FetchTarget::All, false).await.unwrap();

    for file in [
        MOON_PHASES_FILE,
        SOLAR_ECLIPSES_FILE,
        LUNAR_ECLIPSES_FILE,
        DATASET_FILE,
    ] {
        assert!(temp_dir.path().join(file).exists(), "{file} missing");
    }
    assert_eq!(report.files.len(), 4);

    assert!(!report.is_complete());
    assert_eq!(report.failed_years["solar-usno"], vec![2023]);
    assert!(report.failed_years["moon-phases"].is_empty());
    assert!(report.failed_years["solar-catalog"].is_empty());
    assert!(report.failed_years["lunar-catalog"].is_empty());

    let counts = &report.metadata.counts;
    assert_eq!(counts.total_phases, 4);
    assert_eq!(counts.solar_eclipses, 4);
    assert_eq!(counts.lunar_eclipses, 4);
    assert_eq!(report.metadata.coverage.start_year, 2023);

    let dataset = read_dataset(&temp_dir.path().join(DATASET_FILE)).unwrap();
    assert_eq!(dataset.moon_phases.len(), 2);
    assert!(dataset.moon_phases[&2023].success);
    assert_eq!(dataset.moon_phases[&2024].count, 2);

    // USNO wins 2024, the catalog fills 2023
    let solar: Vec<(&str, &str)> = dataset
        .solar_eclipses
        .iter()
        .map(|e| (e.date.as_str(), e.source.as_str()))
        .collect();
    assert_eq!(
        solar,
        vec![
            ("2023-04-20", "nasa-catalog"),
            ("2023-10-14", "nasa-catalog"),
            ("2024-04-08", "usno"),
            ("2024-10-02", "usno"),
        ]
    );

    assert!(dataset
        .lunar_eclipses
        .iter()
        .all(|e| e.kind == EclipseKind::Lunar && e.source == "nasa-catalog"));
    assert!(dataset.metadata.sources.contains(&"usno".to_string()));
    assert!(dataset.metadata.sources.contains(&"nasa-catalog".to_string()));

    for name in ["moon-phases", "solar-usno", "solar-catalog", "lunar-catalog"] {
        assert!(pipeline.checkpoints().exists(name), "{name} checkpoint missing");
    }
}

#[tokio::test]
async fn test_dataset_answers_birthday_lookup() {
    let mock_server = MockServer::start().await;
    mount_moon(&mock_server, 2023).await;
    mount_moon(&mock_server, 2024).await;
    mount_usno_solar(&mock_server).await;
    mount_catalogs(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2023, 2024);
    DatasetPipeline::new(config)
        .unwrap()
        .run(FetchTarget::All, false)
        .await
        .unwrap();

    let dataset = read_dataset(&temp_dir.path().join(DATASET_FILE)).unwrap();

    let report = find_matches(parse_birth_date("1999-08-11").unwrap(), &dataset);
    assert_eq!(report.moon_phases.full_moon, BTreeSet::from([2023, 2024]));
    assert!(report.eclipses.is_empty());

    let report = find_matches(parse_birth_date("2024-08-11").unwrap(), &dataset);
    assert_eq!(report.moon_phases.full_moon, BTreeSet::from([2024]));

    let report = find_matches(parse_birth_date("1985-04-08").unwrap(), &dataset);
    assert_eq!(report.eclipses.len(), 1);
    assert_eq!(report.eclipses[0].year, 2024);
    assert_eq!(report.eclipses[0].label, "Total Solar Eclipse");
    assert_eq!(report.eclipses[0].source, "usno");

    let report = find_matches(parse_birth_date("1990-10-28").unwrap(), &dataset);
    assert_eq!(report.eclipses.len(), 1);
    assert_eq!(report.eclipses[0].label, "Partial Lunar Eclipse");
}

#[tokio::test]
async fn test_resume_skips_completed_years() {
    let mock_server = MockServer::start().await;
    mount_moon(&mock_server, 2023).await;
    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .and(query_param("year", "2024"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2023, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    let first = pipeline.run(FetchTarget::Moon, false).await.unwrap();
    assert_eq!(first.failed_years["moon-phases"], vec![2024]);
    assert!(pipeline.checkpoints().exists("moon-phases"));

    // Second run: 2023 must come from the checkpoint
    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .and(query_param("year", "2023"))
        .respond_with(ResponseTemplate::new(200).set_body_string(phase_body(2023)))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .and(query_param("year", "2024"))
        .respond_with(ResponseTemplate::new(200).set_body_string(phase_body(2024)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let second = pipeline.run(FetchTarget::Moon, true).await.unwrap();
    assert!(second.is_complete());
    assert_eq!(second.metadata.counts.total_phases, 4);

    let moon = pipeline.store().load_moon_phases().unwrap().unwrap();
    assert!(moon.moon_phases.values().all(|year| year.success));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_complete_run_can_drop_checkpoints() {
    let mock_server = MockServer::start().await;
    mount_moon(&mock_server, 2023).await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&mock_server.uri(), temp_dir.path(), 2023, 2023);
    config.output.keep_checkpoints = false;
    let pipeline = DatasetPipeline::new(config).unwrap();

    let report = pipeline.run(FetchTarget::Moon, false).await.unwrap();
    assert!(report.is_complete());
    assert!(!pipeline.checkpoints().exists("moon-phases"));
    assert!(temp_dir.path().join(MOON_PHASES_FILE).exists());
}

#[tokio::test]
async fn test_fallback_merged_after_live_sources() {
    let mock_server = MockServer::start().await;
    mount_usno_solar(&mock_server).await;
    // Both catalogs down
    Mock::given(method("GET"))
        .and(path("/SEcat5/SE2001-2100.html"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/LEcat5/LE2001-2100.html"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&mock_server.uri(), temp_dir.path(), 2024, 2024);
    config.sources.use_fallback = true;
    let pipeline = DatasetPipeline::new(config).unwrap();

    let report = pipeline.run(FetchTarget::Eclipses, false).await.unwrap();
    assert_eq!(report.failed_years["solar-catalog"], vec![2024]);
    assert_eq!(report.failed_years["lunar-catalog"], vec![2024]);

    let solar = pipeline
        .store()
        .load_eclipses(EclipseKind::Solar)
        .unwrap()
        .unwrap();
    assert_eq!(solar.eclipses.len(), 2);
    assert!(solar.eclipses.iter().all(|e| e.source == "usno"));

    let lunar = pipeline
        .store()
        .load_eclipses(EclipseKind::Lunar)
        .unwrap()
        .unwrap();
    assert!(!lunar.eclipses.is_empty());
    assert!(lunar.eclipses.iter().all(|e| e.source == "fallback-table"));
    assert!(lunar.metadata.sources.contains(&"fallback-table".to_string()));
}

#[tokio::test]
async fn test_collect_leaves_data_dir_untouched() {
    let mock_server = MockServer::start().await;
    mount_moon(&mock_server, 2024).await;
    mount_usno_solar(&mock_server).await;
    mount_catalogs(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&mock_server.uri(), temp_dir.path(), 2024, 2024);
    let pipeline = DatasetPipeline::new(config).unwrap();

    let dataset = pipeline.collect(FetchTarget::All).await;
    assert_eq!(dataset.metadata.counts.total_phases, 2);
    assert_eq!(dataset.solar_eclipses.len(), 2);
    assert_eq!(dataset.lunar_eclipses.len(), 2);

    assert!(!temp_dir.path().join(DATASET_FILE).exists());
    assert!(pipeline.checkpoints().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_narrow_run_after_wider_run_keeps_consistent_metadata() {
    let mock_server = MockServer::start().await;
    for year in 2020..=2024 {
        mount_moon(&mock_server, year).await;
    }
    mount_usno_solar(&mock_server).await;
    mount_catalogs(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();

    let wide = test_config(&mock_server.uri(), temp_dir.path(), 2020, 2024);
    DatasetPipeline::new(wide)
        .unwrap()
        .run(FetchTarget::Moon, false)
        .await
        .unwrap();

    let narrow = test_config(&mock_server.uri(), temp_dir.path(), 2024, 2024);
    let report = DatasetPipeline::new(narrow)
        .unwrap()
        .run(FetchTarget::Eclipses, false)
        .await
        .unwrap();

    let dataset = read_dataset(&temp_dir.path().join(DATASET_FILE)).unwrap();
    let meta = &dataset.metadata;
    assert_eq!(dataset.moon_phases.len(), 5);
    assert_eq!(meta.coverage.start_year, 2020);
    assert_eq!(meta.coverage.end_year, 2024);
    assert_eq!(meta.counts.years_requested, 5);
    assert!(meta.counts.years_succeeded + meta.counts.years_failed <= meta.counts.years_requested);
    assert_eq!(report.metadata.coverage, meta.coverage);
    assert_eq!(dataset.solar_eclipses.len(), 2);
}
