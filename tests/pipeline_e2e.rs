// tests/pipeline_e2e.rs
use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use housing_signals::config::PipelineConfig;
use housing_signals::extract::{Gazetteer, GazetteerEntry, TextExtractor};
use housing_signals::pipeline::{self, Stores};
use housing_signals::sink::{self, MemorySink};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JAN_8: i64 = 1_704_672_000;

async fn mount_upstreams(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", "MORTGAGE30US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [
                {"date": "2024-01-04", "value": "6.62"},
                {"date": "2024-01-11", "value": "."}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pullpush"))
        .and(query_param("subreddit", "FirstTimeHomeBuyer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": "p1", "subreddit": "FirstTimeHomeBuyer", "created_utc": JAN_8,
             "title": "We closed!", "selftext": "Paid $450K in Austin, TX &amp; love it",
             "score": 10, "num_comments": 3, "author": "buyer1",
             "permalink": "/r/FirstTimeHomeBuyer/comments/p1/"},
            {"id": "p2", "subreddit": "FirstTimeHomeBuyer", "created_utc": JAN_8 + 60,
             "title": "gone", "selftext": "[removed]", "score": 0, "num_comments": 0,
             "author": null, "permalink": "/r/FirstTimeHomeBuyer/comments/p2/"}
        ]})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pullpush"))
        .and(query_param("subreddit", "SameGrassButGreener"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": "r1", "subreddit": "SameGrassButGreener", "created_utc": JAN_8 + 3600,
             "title": "Denver vs Boise, ID?", "selftext": "Thinking about denver.",
             "score": 4, "num_comments": 9, "author": "mover",
             "permalink": "/r/SameGrassButGreener/comments/r1/"}
        ]})))
        .mount(server)
        .await;

    let timeline: Vec<Value> = (0..7)
        .map(|i| {
            json!({
                "timestamp": (JAN_8 + i * 86_400).to_string(),
                "values": [{"extracted_value": (i + 1) * 10}]
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/serpapi"))
        .and(query_param("engine", "google_trends"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "interest_over_time": {"timeline_data": timeline}
        })))
        .mount(server)
        .await;
}

fn write_inputs(root: &Path) {
    let zillow = root.join("zillow");
    fs::create_dir_all(&zillow).unwrap();
    let header = "RegionID,SizeRank,RegionName,RegionType,StateName,2023-12-31,2024-01-31\n";
    fs::write(
        zillow.join("zhvi_home_value.csv"),
        format!("{header}102001,0,United States,country,,340000,342000\n1,1,\"Austin, TX\",msa,TX,100,110\n2,2,\"Dallas, TX\",msa,TX,300,310\n"),
    )
    .unwrap();
    fs::write(
        zillow.join("active_listings.csv"),
        format!("{header}1,1,\"Austin, TX\",msa,TX,5,10\n2,2,\"Dallas, TX\",msa,TX,,20\n"),
    )
    .unwrap();

    let workbook = root.join("workbook");
    fs::create_dir_all(&workbook).unwrap();
    fs::write(
        workbook.join("Weekly, Ending Thursday.csv"),
        "observation_date,MORTGAGE30US\n2023-12-28,6.61\n2024-01-04,6.60\n",
    )
    .unwrap();
}

fn config(server: &MockServer, root: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.paths.zillow_dir = root.join("zillow");
    cfg.paths.fred_workbook_dir = root.join("workbook");

    cfg.fred.base_url = format!("{}/fred", server.uri());
    cfg.fred.api_key = "test-key".into();
    cfg.fred.min_delay_ms = 0;
    cfg.fred.series.truncate(1);

    cfg.reddit.base_url = format!("{}/pullpush", server.uri());
    cfg.reddit.min_delay_ms = 0;

    cfg.trends.base_url = format!("{}/serpapi", server.uri());
    cfg.trends.api_key = "test-key".into();
    cfg.trends.min_delay_ms = 0;
    cfg.trends.terms.truncate(1);
    cfg
}

fn extractor() -> TextExtractor {
    let entries = [("Denver", "CO"), ("Austin", "TX")].into_iter().map(|(c, s)| GazetteerEntry {
        city: c.into(),
        state: s.into(),
        population: 700_000,
    });
    TextExtractor::new(Gazetteer::from_entries(entries, 200_000).unwrap())
}

#[tokio::test]
async fn full_pass_builds_every_table_and_reruns_idempotently() {
    let server = MockServer::start().await;
    mount_upstreams(&server).await;
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());

    let cfg = config(&server, tmp.path());
    let stores = Stores::in_memory();
    let sink = MemorySink::new();
    let x = extractor();
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

    let report = pipeline::run(&cfg, &stores, &x, &sink, now).await.unwrap();
    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.failed_units(), 0);
    assert_eq!(report.removed_posts, 1);

    let fred = sink.table(sink::FRED_OBSERVATIONS).unwrap();
    assert_eq!(fred.len(), 2);
    // workbook history wins over the API value for the same week
    assert_eq!(fred.value(1, "value"), Some(&json!(6.60)));
    assert_eq!(fred.value(0, "date"), Some(&json!("2023-12-28")));

    let posts = sink.table(sink::REDDIT_POSTS).unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts.value(0, "location"), Some(&json!("Austin, TX")));
    assert_eq!(posts.value(0, "purchase_price"), Some(&json!(450000.0)));
    assert_eq!(posts.value(1, "city_mentions"), Some(&json!("Boise, ID|Denver, CO")));

    let weekly = sink.table(sink::TRENDS_WEEKLY).unwrap();
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly.value(0, "avg_interest_score"), Some(&json!(40)));
    assert_eq!(weekly.value(0, "search_term"), Some(&json!("Estate Sales")));

    let state = sink.table(sink::ZILLOW_STATE_AGGREGATED).unwrap();
    assert_eq!(state.len(), 1);
    assert_eq!(state.value(0, "active_listings"), Some(&json!(30.0)));
    assert_eq!(state.value(0, "zhvi"), Some(&json!(210.0)));
    assert_eq!(state.value(0, "city_count"), Some(&json!(2)));
    assert_eq!(sink.table(sink::ZILLOW_CITY_LATEST).unwrap().len(), 2);

    let tables_before: Vec<_> = sink
        .table_names()
        .into_iter()
        .map(|t| sink.table(&t))
        .collect();

    let again = pipeline::run(&cfg, &stores, &x, &sink, now).await.unwrap();
    assert!(again.sources.iter().all(|s| s.merged == 0));
    let tables_after: Vec<_> = sink
        .table_names()
        .into_iter()
        .map(|t| sink.table(&t))
        .collect();
    assert_eq!(tables_before, tables_after);
}

#[tokio::test]
async fn broken_identity_mapping_aborts_the_run() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());

    let mut cfg = config(&server, tmp.path());
    cfg.fred.enabled = false;
    cfg.reddit.enabled = false;
    cfg.trends.enabled = false;
    cfg.zillow.id_columns = vec!["RegionID".into(), "RegionName".into()];

    let err = pipeline::run(&cfg, &Stores::in_memory(), &extractor(), &MemorySink::new(), Utc::now())
        .await
        .unwrap_err();
    let pe = err
        .downcast_ref::<housing_signals::PipelineError>()
        .expect("pipeline error");
    assert!(pe.is_fatal());
}
