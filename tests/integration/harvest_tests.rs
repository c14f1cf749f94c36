//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the catalog portal and drive
//! the full harvest cycle end-to-end.

use catalog_harvest::config::Config;
use catalog_harvest::crawler::{crawl, Coordinator, FetchConfig, FetchTarget, Fetcher, PageProfile};
use catalog_harvest::output::JsonlSink;
use catalog_harvest::{Classification, HarvestError, WorkUnit};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIST_PATH: &str = "/prod/SU_DEGREE.p_list_degree";
const DETAIL_PATH: &str = "/prod/SU_DEGREE.p_degree_detail";
const COURSES_PATH: &str = "/prod/SU_DEGREE.p_list_courses";

/// Creates a test configuration pointed at the mock portal
fn create_test_config(base_url: &str, programs: &[(&str, &str)]) -> Config {
    let mut config = Config::default();
    config.portal.base_url = format!("{}/prod/", base_url);
    config.http.retries = 2;
    config.http.backoff_secs = 0.01;
    config.http.timeout_secs = 5.0;
    config.crawl.terms = vec!["202401".to_string()];
    config.crawl.workers = 4;
    config.crawl.skip_minors = true;
    config.programs = programs
        .iter()
        .map(|(code, stem)| (code.to_string(), stem.to_string()))
        .collect::<BTreeMap<_, _>>();
    config
}

fn listing(codes: &[&str]) -> String {
    let links: String = codes
        .iter()
        .map(|code| {
            format!(
                r#"<a href="SU_DEGREE.p_select_term?P_PROGRAM={code}&P_LANG=EN&P_LEVEL=UG">{code} Program</a>"#
            )
        })
        .collect();
    format!("<html><body>{links}</body></html>")
}

/// A course table; rows are (first-cell html, code, name)
fn course_table(rows: &[(&str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(first, code, name)| {
            format!("<tr><td>{first}</td><td>{code}</td><td>{name}</td><td>6</td><td>3</td><td>FENS</td></tr>")
        })
        .collect();
    format!(
        "<table><tr><th></th><th>Course</th><th>Name</th><th>ECTS</th><th>SU Credits</th><th>Faculty</th></tr>{body}</table>"
    )
}

fn cs_detail_page() -> String {
    format!(
        r#"<html><body>
        <p><a name="BSCS_REQ"></a><b>Required Courses</b></p>
        {}
        <p><a name="BSCS_CEL"></a><b>Core Electives</b></p>
        {}
        <div><a name="BSCS_FEL"></a><b>Free Electives</b></div>
        <div><a href="SU_DEGREE.p_list_courses?P_AREA=BSCS_FEL&P_TERM=202401">Click for the full list</a></div>
        </body></html>"#,
        course_table(&[
            ("<center>&nbsp;*&nbsp;</center>", "CS 201", "Introduction to Computing"),
            ("", "MATH 101", "Calculus I"),
        ]),
        course_table(&[("", "CS 300", "Data Analysis"), ("", "MATH 101", "Calculus I")])
    )
}

fn free_list_page() -> String {
    format!(
        "<html><body>{}</body></html>",
        course_table(&[("", "HIST 191", "Principles of Ataturk"), ("", "CS 300", "Data Analysis")])
    )
}

async fn mount_listing(server: &MockServer, codes: &[&str]) {
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("P_PRG_TYPE", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(codes)))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, program: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("P_PROGRAM", program))
        .and(query_param("P_TERM", "202401"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("Failed to read output file")
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_full_harvest_writes_sorted_catalogs() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, &["BSCS", "BSEE", "BSXX"]).await;
    mount_detail(&mock_server, "BSCS", cs_detail_page()).await;
    mount_detail(
        &mock_server,
        "BSEE",
        "<html><body><p>Catalog not available</p></body></html>".to_string(),
    )
    .await;

    // Linked from the anchor and found again by the page-wide sweep, but
    // fetched only once
    Mock::given(method("GET"))
        .and(path(COURSES_PATH))
        .and(query_param("P_AREA", "BSCS_FEL"))
        .respond_with(ResponseTemplate::new(200).set_body_string(free_list_page()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let sink = JsonlSink::new(out.path());
    let config = create_test_config(&mock_server.uri(), &[("BSCS", "CS"), ("BSEE", "EE")]);
    let coordinator = Coordinator::new(config).unwrap();

    let report = coordinator.run(&sink).await.expect("Harvest failed");

    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].1, 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, WorkUnit::major("BSEE", "202401", "EE"));

    let lines = read_lines(&out.path().join("202401/CS.jsonl"));
    let records: Vec<serde_json::Value> = lines
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let summary: Vec<(String, String, String)> = records
        .iter()
        .map(|r| {
            (
                format!("{}{}", r["Major"].as_str().unwrap(), r["Code"].as_str().unwrap()),
                r["EL_Type"].as_str().unwrap().to_string(),
                r["Faculty_Course"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("CS201".to_string(), "core".to_string(), "FENS".to_string()),
            ("CS300".to_string(), "core".to_string(), "No".to_string()),
            ("HIST191".to_string(), "free".to_string(), "No".to_string()),
            ("MATH101".to_string(), "required".to_string(), "No".to_string()),
        ]
    );

    assert!(!out.path().join("202401/EE.jsonl").exists());
    assert_eq!(
        read_lines(&out.path().join("terms.jsonl")),
        vec![r#"{"term":"202401","majors":["CS"]}"#.to_string()]
    );
}

#[tokio::test]
async fn test_rerun_produces_identical_output() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, &["BSCS", "BSEE"]).await;
    mount_detail(&mock_server, "BSCS", cs_detail_page()).await;
    mount_detail(
        &mock_server,
        "BSEE",
        format!(
            "<html><body><p><a name=\"BSEE_REQ\"></a></p>{}</body></html>",
            course_table(&[("", "EE 202", "Circuits"), ("", "EE 200", "Signals")])
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(COURSES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(free_list_page()))
        .mount(&mock_server)
        .await;

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let out = TempDir::new().unwrap();
        let sink = JsonlSink::new(out.path());
        let config = create_test_config(&mock_server.uri(), &[("BSCS", "CS"), ("BSEE", "EE")]);
        Coordinator::new(config)
            .unwrap()
            .run(&sink)
            .await
            .expect("Harvest failed");

        let files: Vec<Vec<u8>> = ["202401/CS.jsonl", "202401/EE.jsonl", "terms.jsonl"]
            .iter()
            .map(|f| fs::read(out.path().join(f)).unwrap())
            .collect();
        outputs.push(files);
    }

    assert_eq!(outputs[0], outputs[1]);
    let ee = String::from_utf8(outputs[0][1].clone()).unwrap();
    assert!(ee.find("\"200\"").unwrap() < ee.find("\"202\"").unwrap());
}

#[tokio::test]
async fn test_retry_then_success() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, &["BSCS"]).await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "BSCS", cs_detail_page()).await;
    Mock::given(method("GET"))
        .and(path(COURSES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(free_list_page()))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &[("BSCS", "CS")]);
    let coordinator = Coordinator::new(config).unwrap();
    let outcome = coordinator
        .run_batch(vec![WorkUnit::major("BSCS", "202401", "CS")])
        .await;

    assert_eq!(outcome.succeeded(), 1);
    assert_eq!(coordinator.fetcher().stats().retries(), 2);
}

#[tokio::test]
async fn test_retries_exhausted_fail_only_that_unit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("P_PROGRAM", "BSME"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "BSCS", cs_detail_page()).await;
    Mock::given(method("GET"))
        .and(path(COURSES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(free_list_page()))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), &[("BSCS", "CS"), ("BSME", "ME")]);
    config.http.retries = 1;
    let coordinator = Coordinator::new(config).unwrap();

    let me = WorkUnit::major("BSME", "202401", "ME");
    let cs = WorkUnit::major("BSCS", "202401", "CS");
    let outcome = coordinator.run_batch(vec![me.clone(), cs.clone()]).await;

    match &outcome.results[&me] {
        Err(HarvestError::Network { cause, .. }) => assert!(cause.contains("503"), "{cause}"),
        other => panic!("expected a network failure, got {:?}", other),
    }
    assert!(outcome.results[&cs].is_ok());
    assert_eq!(coordinator.fetcher().stats().failures(), 1);
}

#[tokio::test]
async fn test_in_flight_requests_stay_bounded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    "<html><body><p><a name=\"X_REQ\"></a></p>{}</body></html>",
                    course_table(&[("", "CS 201", "Intro")])
                ))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), &[]);
    config.crawl.workers = 8;
    config.http.max_in_flight = 2;
    let coordinator = Coordinator::new(config).unwrap();

    let units: Vec<WorkUnit> = (0..8)
        .map(|i| WorkUnit::major(format!("P{i}"), "202401", format!("P{i}")))
        .collect();
    let outcome = coordinator.run_batch(units).await;

    assert_eq!(outcome.succeeded(), 8);
    let stats = coordinator.fetcher().stats();
    assert!(stats.peak_in_flight() <= 2, "peak was {}", stats.peak_in_flight());
    assert!(stats.peak_in_flight() >= 1);
    assert_eq!(stats.in_flight(), 0);
    assert_eq!(stats.requests(), 8);
}

#[tokio::test]
async fn test_zero_records_is_structural_miss() {
    let mock_server = MockServer::start().await;

    // The anchor and table are there, but no row is a course row
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><p><a name=\"BSCS_REQ\"></a></p>\
             <table><tr><th>Course</th><th>Name</th><th>ECTS</th><th>Credits</th></tr>\
             <tr><td colspan=\"5\">To be announced</td></tr></table></body></html>",
        ))
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
    let session = fetcher.session(0).unwrap();
    let target = FetchTarget::get(format!("{}/empty", mock_server.uri()));

    let result = crawl(
        &session,
        &target,
        &PageProfile::default(),
        &Classification::default(),
    )
    .await;

    assert!(matches!(result, Err(HarvestError::StructuralMiss { .. })));
}

#[tokio::test]
async fn test_failed_course_list_fails_the_unit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
            <p><a name="BSCS_REQ"></a><b>Required Courses</b></p>
            {}
            <div><a name="BSCS_FEL"></a><b>Free Electives</b></div>
            <div><a href="SU_DEGREE.p_list_courses?P_AREA=BSCS_FEL&P_TERM=202401">Click for the full list</a></div>
            </body></html>"#,
            course_table(&[("", "CS 201", "Introduction to Computing"), ("", "MATH 101", "Calculus I")])
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/SU_DEGREE.p_list_courses"))
        .and(query_param("P_AREA", "BSCS_FEL"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(FetchConfig {
        retries: 1,
        backoff_base: Duration::from_millis(10),
        ..FetchConfig::default()
    })
    .unwrap();
    let session = fetcher.session(0).unwrap();
    let target = FetchTarget::get(format!("{}/detail", mock_server.uri()));

    let result = crawl(
        &session,
        &target,
        &PageProfile::default(),
        &Classification::default(),
    )
    .await;

    match result {
        Err(HarvestError::Network { url, cause }) => {
            assert!(url.contains("P_AREA=BSCS_FEL"), "{url}");
            assert!(cause.contains("503"), "{cause}");
        }
        other => panic!("expected a network failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let sink = JsonlSink::new(out.path());
    let mut config = create_test_config(&mock_server.uri(), &[("BSCS", "CS")]);
    config.http.retries = 0;

    let result = Coordinator::new(config).unwrap().run(&sink).await;
    assert!(matches!(result, Err(HarvestError::Listing(_))));
    assert!(!out.path().join("terms.jsonl").exists());
}

#[tokio::test]
async fn test_minor_catalogs() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, &["BSCS"]).await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("P_PRG_TYPE", "MINOR"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(&["MINBA", "MINXX"])))
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "BSCS", cs_detail_page()).await;
    Mock::given(method("GET"))
        .and(path(COURSES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(free_list_page()))
        .mount(&mock_server)
        .await;
    mount_detail(
        &mock_server,
        "MINBA",
        format!(
            "<html><body><p><a name=\"MINBA_REQ\"></a></p>{}\
             <p><a name=\"MINBA_PHL_A\"></a></p>{}</body></html>",
            course_table(&[("<center>&nbsp;*&nbsp;</center>", "ECON 201", "Microeconomics")]),
            course_table(&[("", "PHIL 301", "Ethics")])
        ),
    )
    .await;
    mount_detail(&mock_server, "MINXX", "<html><body></body></html>".to_string()).await;

    let out = TempDir::new().unwrap();
    let sink = JsonlSink::new(out.path());
    let mut config = create_test_config(&mock_server.uri(), &[("BSCS", "CS")]);
    config.crawl.skip_minors = false;

    let report = Coordinator::new(config).unwrap().run(&sink).await.unwrap();
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);

    let minor = read_lines(&out.path().join("minors/202401/MINBA.jsonl"));
    assert_eq!(minor.len(), 2);
    assert!(minor[0].contains(r#""Code":"201""#));
    assert!(minor[1].contains(r#""Code":"301""#));
    for line in &minor {
        assert!(line.contains(r#""EL_Type":"required""#), "{line}");
        assert!(line.contains(r#""Faculty_Course":"No""#), "{line}");
    }
    assert_eq!(
        read_lines(&out.path().join("minors/terms.jsonl")),
        vec![r#"{"term":"202401","minors":["MINBA"]}"#.to_string()]
    );
}

#[tokio::test]
async fn test_form_post_target() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/select"))
        .and(body_string_contains("P_TERM=202401"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
    let session = fetcher.session(3).unwrap();
    let target = FetchTarget::post_form(
        format!("{}/select", mock_server.uri()),
        vec![("P_TERM".to_string(), "202401".to_string())],
    );

    assert_eq!(session.fetch(&target).await.unwrap(), "ok");
}
