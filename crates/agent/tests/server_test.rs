use alert_agent::{
    config::Config,
    context::{HostContext, Platform},
    server::Server,
    store::FileStore,
    tools::Toolbox,
    AlertSchedulerHandler,
};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOST: &str = "c6401.ambari.apache.org";

fn test_server(dir: &Path) -> TestServer {
    let mut config = Config::default();
    config.alerts.cache_dir = dir.to_path_buf();

    let handler = Arc::new(AlertSchedulerHandler::new(
        &config,
        Arc::new(FileStore::new(dir)),
        Toolbox::for_platform(Platform::Linux, "python3").unwrap(),
        Arc::new(HostContext::new(Some(HOST.to_string()), Platform::Linux)),
    ));

    TestServer::new(Server::new(&config, handler).build_router()).unwrap()
}

fn definition(uuid: &str, source: Value) -> Value {
    json!({
        "name": format!("alert_{}", uuid),
        "service": "HDFS",
        "component": "NAMENODE",
        "label": "Integration alert",
        "interval": 1,
        "scope": "HOST",
        "enabled": true,
        "uuid": uuid,
        "source": source
    })
}

fn execution(definition: Value) -> Value {
    json!({ "clusterName": "c1", "hostName": HOST, "alertDefinition": definition })
}

async fn pending(server: &TestServer) -> Vec<Value> {
    let response = server.get("/alerts").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Vec<Value>>()
}

#[tokio::test]
async fn test_health_and_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(dir.path());

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "healthy");

    assert!(pending(&server).await.is_empty());

    let jobs: Value = server.get("/jobs").await.json();
    assert_eq!(jobs["count"], 0);

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // no stored document yet
    let response = server.post("/reschedule").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["jobs"], 0);
}

#[tokio::test]
async fn test_execute_port_alert_against_live_listener() {
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(dir.path());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let source = json!({
        "type": "PORT",
        "uri": format!("127.0.0.1:{}", port),
        "reporting": { "critical": { "text": "unused", "value": 5.0 } }
    });
    let response = server
        .post("/alerts/execute")
        .json(&json!([execution(definition("port-1", source))]))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>()["executed"], 1);

    let alerts = pending(&server).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["uuid"], "port-1");
    assert_eq!(alerts[0]["state"], "OK");
    assert_eq!(alerts[0]["clusterName"], "c1");
    assert_eq!(alerts[0]["hostName"], HOST);
    let text = alerts[0]["text"].as_str().unwrap();
    assert!(text.starts_with("TCP OK - "));
    assert!(text.ends_with(&format!("response on port {}", port)));

    let response = server.delete("/alerts/port-1").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["uuid"], "port-1");

    let response = server.delete("/alerts/port-1").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(pending(&server).await.is_empty());
}

#[tokio::test]
async fn test_execute_port_alert_connection_refused() {
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(dir.path());

    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let source = json!({ "type": "PORT", "uri": format!("127.0.0.1:{}", port), "reporting": {} });
    server
        .post("/alerts/execute")
        .json(&json!([execution(definition("port-2", source))]))
        .await;

    let alerts = pending(&server).await;
    assert_eq!(alerts[0]["state"], "CRITICAL");
    let text = alerts[0]["text"].as_str().unwrap();
    assert!(text.starts_with("Connection failed: "));
    assert!(text.ends_with(&format!("to 127.0.0.1:{}", port)));
}

#[tokio::test]
async fn test_execute_web_alert_maps_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(dir.path());

    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthy"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;

    let web = |uuid: &str, route: &str| {
        definition(
            uuid,
            json!({
                "type": "WEB",
                "uri": { "http": format!("{}{}", mock.uri(), route) },
                "reporting": {
                    "ok": { "text": "ok {0}" },
                    "warning": { "text": "warning {0} from {1}" }
                }
            }),
        )
    };

    let response = server
        .post("/alerts/execute")
        .json(&json!([execution(web("web-ok", "/healthy")), execution(web("web-warn", "/broken"))]))
        .await;
    assert_eq!(response.json::<Value>()["executed"], 2);

    let alerts = pending(&server).await;
    let by_uuid = |uuid: &str| alerts.iter().find(|a| a["uuid"] == uuid).unwrap().clone();

    assert_eq!(by_uuid("web-ok")["state"], "OK");
    assert_eq!(by_uuid("web-ok")["text"], "ok 200");
    assert_eq!(by_uuid("web-warn")["state"], "WARNING");
    assert_eq!(
        by_uuid("web-warn")["text"],
        format!("warning 503 from {}/broken", mock.uri())
    );
}

#[tokio::test]
async fn test_execute_metric_alert_reads_jmx() {
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(dir.path());

    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jmx"))
        .and(query_param("qry", "Hadoop:service=NameNode,name=FSNamesystemState"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "beans": [{ "CapacityUsed": 30, "CapacityRemaining": 70 }]
        })))
        .mount(&mock)
        .await;

    let authority = mock.uri().trim_start_matches("http://").to_string();
    let source = json!({
        "type": "METRIC",
        "uri": { "http": authority },
        "jmx": {
            "property_list": [
                "Hadoop:service=NameNode,name=FSNamesystemState/CapacityUsed",
                "Hadoop:service=NameNode,name=FSNamesystemState/CapacityRemaining"
            ],
            "value": "{0} * 100 / ({0} + {1})"
        },
        "reporting": {
            "ok": { "text": "Capacity used {2:.1f} percent" },
            "warning": { "text": "warning", "value": 80 },
            "critical": { "text": "critical", "value": 90 }
        }
    });

    server
        .post("/alerts/execute")
        .json(&json!([execution(definition("metric-1", source))]))
        .await;

    let alerts = pending(&server).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["state"], "OK");
    assert_eq!(alerts[0]["text"], "Capacity used 30.0 percent");
}

#[tokio::test]
async fn test_execute_skips_malformed_commands() {
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(dir.path());

    let response = server
        .post("/alerts/execute")
        .json(&json!([
            { "hostName": HOST },
            execution(json!({ "name": "no_source", "uuid": "x", "interval": 1 }))
        ]))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>()["executed"], 0);
    assert!(pending(&server).await.is_empty());
}

#[tokio::test]
async fn test_definitions_and_configurations_round_trip_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let server = test_server(dir.path());

    let port = |uuid: &str| {
        definition(
            uuid,
            json!({ "type": "PORT", "uri": "{{foo-site/bar}}", "default_port": 8020, "reporting": {} }),
        )
    };
    let document = json!([{
        "clusterName": "c1",
        "hostName": HOST,
        "hash": "12341234",
        "configurations": { "foo-site": { "bar": "c6402.ambari.apache.org:8020" } },
        "alertDefinitions": [port("a"), port("b")]
    }]);

    let response = server.post("/definitions").json(&document).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["clusters"], 1);
    assert_eq!(body["rescheduled"], false);
    assert_eq!(body["jobs"], 0);
    assert!(dir.path().join("definitions.json").exists());

    let response = server
        .post("/definitions")
        .add_query_param("reschedule", "true")
        .json(&document)
        .await;
    assert_eq!(response.json::<Value>()["jobs"], 2);

    let jobs: Value = server.get("/jobs").await.json();
    assert_eq!(jobs["count"], 2);
    let names: Vec<&str> = jobs["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    let response = server
        .post("/configurations")
        .json(&json!([{
            "clusterName": "c1",
            "configurations": { "foo-site": { "bar": "c6403.ambari.apache.org:8020", "unknown": "x" } }
        }]))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["changed"], true);

    let stored: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("definitions.json")).unwrap()).unwrap();
    assert_eq!(stored[0]["configurations"]["foo-site"]["bar"], "c6403.ambari.apache.org:8020");
    assert!(stored[0]["configurations"]["foo-site"].get("unknown").is_none());

    let jobs: Value = server.get("/jobs").await.json();
    assert_eq!(jobs["count"], 2);

    // same values again, and a cluster this host does not know
    let response = server
        .post("/configurations")
        .json(&json!([
            { "clusterName": "c1", "configurations": { "foo-site": { "bar": "c6403.ambari.apache.org:8020" } } },
            { "clusterName": "c9", "configurations": { "foo-site": { "bar": "elsewhere:1" } } }
        ]))
        .await;
    assert_eq!(response.json::<Value>()["changed"], false);
}
