//! Shared fixtures for integration tests

#![allow(dead_code)]

use cosmic_birthday::config::Config;
use std::path::Path;

/// USNO moon-phase response for `year`: one full moon on Aug 11 and a new
/// moon on Jan 6
pub fn phase_body(year: i32) -> String {
    serde_json::json!({
        "apiversion": "4.0.1",
        "numphases": 2,
        "phasedata": [
            {"day": 6, "month": 1, "phase": "New Moon", "time": "18:14", "year": year},
            {"day": 11, "month": 8, "phase": "Full Moon", "time": "02:08", "year": year}
        ],
        "year": year
    })
    .to_string()
}

/// USNO solar-eclipse response for 2024
pub fn solar_body_2024() -> String {
    serde_json::json!({
        "apiversion": "4.0.1",
        "eclipses_in_year": [
            {"day": 8, "event": "Total Solar Eclipse of 2024 Apr. 08", "month": 4, "year": 2024},
            {"day": 2, "event": "Annular Solar Eclipse of 2024 Oct. 02", "month": 10, "year": 2024}
        ],
        "year": 2024
    })
    .to_string()
}

/// NASA solar catalog page for 2001-2100, trimmed to 2023 and 2024
pub const SOLAR_CATALOG_PAGE: &str = r#"<html><head><title>Catalog of Solar Eclipses: 2001 to 2100</title></head>
<body>
<h1>Catalog of Solar Eclipses: 2001 to 2100</h1>
<pre>
 Catalog   Calendar    TD of
 Number      Date     Greatest   Type

 09549  2023 Apr 20  04:17:56     69    290   120   H   -p  -0.3952
 09550  2023 Oct 14  18:00:41     71    295   125   A   -p   0.3753
 09551  2024 Apr 08  18:18:29     69    303   139   T   -p   0.3431
 09552  2024 Oct 02  18:46:13     74    308   144   A   -p   0.3509
</pre>
</body></html>"#;

/// NASA lunar catalog page for 2001-2100, trimmed to 2023 and 2024
pub const LUNAR_CATALOG_PAGE: &str = r#"<html><body>
<h1>Catalog of Lunar Eclipses: 2001 to 2100</h1>
<pre>
 Catalog   Calendar    TD of
 Number      Date     Greatest   Type

 09754  2023 May 05  17:24:05     69   -289   141   N   -a   -1.0350
 09755  2023 Oct 28  20:15:18     71   -283   146   P   -a    0.9472
 09756  2024 Mar 25  07:13:59     69   -277   113   N   -a    1.0610
 09757  2024 Sep 18  02:45:25     74   -271   118   P   -a   -0.9792
</pre>
</body></html>"#;

/// Config pointing every source at `server_uri`, writing into `data_dir`
pub fn test_config(server_uri: &str, data_dir: &Path, start_year: i32, end_year: i32) -> Config {
    let mut config = Config::default();
    config.fetch.start_year = start_year;
    config.fetch.end_year = end_year;
    config.fetch.batch_size = 2;
    config.fetch.batch_delay_secs = 0;
    config.fetch.request_timeout_secs = 5;
    config.fetch.requests_per_second = 100;
    config.sources.usno_base_url = format!("{server_uri}/api");
    config.sources.nasa_solar_catalog_url = format!("{server_uri}/SEcat5");
    config.sources.nasa_lunar_catalog_url = format!("{server_uri}/LEcat5");
    config.sources.use_fallback = false;
    config.sources.saros_projection = false;
    config.output.data_dir = data_dir.to_path_buf();
    config
}
