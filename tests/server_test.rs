//! Integration tests for the IAQ HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use iaq_monitor::core::Classifier;
    use iaq_monitor::ingest::Ingestor;
    use iaq_monitor::server::{run, ServerConfig};
    use iaq_monitor::store::Store;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    struct TestServer {
        addr: SocketAddr,
        shutdown: Option<oneshot::Sender<()>>,
        client: reqwest::Client,
        _dir: TempDir,
    }

    impl TestServer {
        async fn start() -> Self {
            Self::start_with_site("Lab").await
        }

        async fn start_with_site(site: &str) -> Self {
            let dir = TempDir::new().expect("Failed to create temp dir");
            let store = Store::open(dir.path().join("iaq.db")).expect("Failed to open store");
            let ingestor =
                Ingestor::new(store, Classifier::cpcb_pm25()).with_default_site(site);

            let (addr, shutdown) = run(ServerConfig::new(0), ingestor)
                .await
                .expect("Failed to start server");

            // Give server time to start
            tokio::time::sleep(Duration::from_millis(100)).await;

            Self {
                addr,
                shutdown: Some(shutdown),
                client: reqwest::Client::new(),
                _dir: dir,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        async fn get(&self, path: &str) -> reqwest::Response {
            self.client
                .get(self.url(path))
                .send()
                .await
                .expect("Failed to send request")
        }

        async fn post(&self, path: &str, body: Value) -> reqwest::Response {
            self.client
                .post(self.url(path))
                .json(&body)
                .send()
                .await
                .expect("Failed to send request")
        }

        async fn ingest(&self, ts: &str, pm25: f64, site: &str) -> Value {
            let response = self
                .post("/ingest", json!({ "ts": ts, "pm25": pm25, "site": site }))
                .await;
            assert!(response.status().is_success());
            response.json().await.expect("Failed to parse JSON")
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = TestServer::start().await;

        let response = server.get("/health").await;
        assert!(response.status().is_success());

        let body: Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_root_reports_database() {
        let server = TestServer::start().await;

        let body: Value = server.get("/").await.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["count"], 0);
        assert!(body["last"].is_null());
        assert!(body["db"].as_str().unwrap().ends_with("iaq.db"));

        server.ingest("2024-05-01T10:00:00Z", 20.0, "Lab").await;
        let body: Value = server.get("/").await.json().await.unwrap();
        assert_eq!(body["count"], 1);
        assert!(body["last"].as_str().unwrap().starts_with("2024-05-01T10:00:00"));
    }

    #[tokio::test]
    async fn test_ingest_classifies() {
        let server = TestServer::start().await;

        let body = server.ingest("2024-05-01T10:00:00Z", 45.0, "Lab").await;
        assert_eq!(body["pm25_index"], 75);
        assert_eq!(body["pm25_category"], "Satisfactory");

        // No pm25 still stores the reading, unclassified.
        let response = server
            .post("/ingest", json!({ "ts": "2024-05-01T10:01:00Z", "co2": 800.0 }))
            .await;
        let body: Value = response.json().await.unwrap();
        assert!(body["pm25_index"].is_null());
        assert!(body["pm25_category"].is_null());
    }

    #[tokio::test]
    async fn test_exposure_minutes() {
        let server = TestServer::start().await;

        for minute in 0..10 {
            let ts = format!("2024-05-01T10:{minute:02}:00Z");
            server.ingest(&ts, 20.0, "Lab").await;
        }

        let body: Value = server
            .get("/exposure?window=1h&site=Lab")
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(body["window"], "1h");
        assert_eq!(body["good"], 10);
        assert_eq!(body["severe"], 0);

        // Unknown site has no exposure.
        let body: Value = server
            .get("/exposure?window=1h&site=Garage")
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(body["good"], 0);
    }

    #[tokio::test]
    async fn test_invalid_window_rejected() {
        let server = TestServer::start().await;

        for path in ["/exposure?window=abc", "/stats?window=0h", "/readings?window=5y"] {
            let response = server.get(path).await;
            assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{path}");
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["code"], "INVALID_WINDOW");
        }
    }

    #[tokio::test]
    async fn test_readings_oldest_first_and_limited() {
        let server = TestServer::start().await;

        for minute in [3, 1, 2, 0] {
            let ts = format!("2024-05-01T10:{minute:02}:00Z");
            server.ingest(&ts, 10.0 + minute as f64, "Lab").await;
        }

        let rows: Vec<Value> = server.get("/readings?limit=3").await.json().await.unwrap();
        let pm: Vec<f64> = rows.iter().map(|r| r["pm25"].as_f64().unwrap()).collect();
        assert_eq!(pm, vec![11.0, 12.0, 13.0]);
        assert_eq!(rows[0]["site"], "Lab");
        assert_eq!(rows[0]["pm25_category"], "Good");

        let rows: Vec<Value> = server.get("/readings?window=90s").await.json().await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_sites_listing() {
        let server = TestServer::start().await;

        let sites: Vec<String> = server.get("/sites").await.json().await.unwrap();
        assert_eq!(sites, vec!["Lab".to_string()]);

        server.ingest("2024-05-01T10:00:00Z", 20.0, "Office").await;
        server.ingest("2024-05-01T10:01:00Z", 20.0, "Bedroom").await;
        let sites: Vec<String> = server.get("/sites").await.json().await.unwrap();
        assert_eq!(sites, vec!["Bedroom".to_string(), "Office".to_string()]);
    }

    #[tokio::test]
    async fn test_configured_default_site() {
        let server = TestServer::start_with_site("Bedroom").await;

        let sites: Vec<String> = server.get("/sites").await.json().await.unwrap();
        assert_eq!(sites, vec!["Bedroom".to_string()]);

        let response = server
            .post("/ingest", json!({ "ts": "2024-05-01T10:00:00Z", "pm25": 20.0 }))
            .await;
        assert!(response.status().is_success());
        let rows: Vec<Value> = server.get("/readings").await.json().await.unwrap();
        assert_eq!(rows[0]["site"], "Bedroom");

        let body: Value = server
            .post("/seed", json!({ "hours": 1, "period_seconds": 600 }))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(body["site"], "Bedroom");
        assert_eq!(body["seeded"], 6);
    }

    #[tokio::test]
    async fn test_stats_summary() {
        let server = TestServer::start().await;

        let body: Value = server.get("/stats?window=1h").await.json().await.unwrap();
        assert_eq!(body["count"], 0);
        assert!(body.get("pm25").is_none());

        server.ingest("2024-05-01T10:00:00Z", 10.0, "Lab").await;
        server.ingest("2024-05-01T10:01:00Z", 30.0, "Lab").await;

        let body: Value = server.get("/stats?window=1h").await.json().await.unwrap();
        assert_eq!(body["count"], 2);
        assert_eq!(body["pm25"]["min"], 10.0);
        assert_eq!(body["pm25"]["mean"], 20.0);
        assert_eq!(body["pm25"]["max"], 30.0);
    }

    #[tokio::test]
    async fn test_alerts_and_acknowledge() {
        let server = TestServer::start().await;

        server.ingest("2024-05-01T10:00:00Z", 20.0, "Lab").await;
        server.ingest("2024-05-01T10:01:00Z", 100.0, "Lab").await;
        server.ingest("2024-05-01T10:02:00Z", 300.0, "Lab").await;

        let events: Vec<Value> = server.get("/events").await.json().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["severity"], "critical");
        assert_eq!(events[0]["type"], "pm25_alert");
        assert_eq!(events[0]["message"], "PM2.5 is Severe (300.0 µg/m³)");
        assert_eq!(events[1]["severity"], "warning");
        assert_eq!(events[1]["acknowledged"], false);

        let id = events[1]["id"].as_i64().unwrap();
        let response = server
            .client
            .post(server.url(&format!("/events/ack?event_id={id}")))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["acknowledged"], id);

        let events: Vec<Value> = server.get("/events?limit=1").await.json().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["acknowledged"], false);

        let events: Vec<Value> = server.get("/events").await.json().await.unwrap();
        assert_eq!(events[1]["acknowledged"], true);
    }

    #[tokio::test]
    async fn test_seed_and_reset() {
        let server = TestServer::start().await;

        let response = server
            .post("/seed", json!({ "hours": 1, "site": "Demo", "period_seconds": 60 }))
            .await;
        assert!(response.status().is_success());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["seeded"], 60);
        assert_eq!(body["site"], "Demo");

        let body: Value = server.get("/").await.json().await.unwrap();
        assert_eq!(body["count"], 60);

        let response = server
            .post("/seed", json!({ "hours": 1, "period_seconds": 0 }))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        server.ingest("2020-01-01T00:00:00Z", 20.0, "Lab").await;

        let response = server
            .client
            .post(server.url("/reset?site=Demo"))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let body: Value = server.get("/").await.json().await.unwrap();
        assert_eq!(body["count"], 1);
        let events: Vec<Value> = server.get("/events?site=Demo").await.json().await.unwrap();
        assert!(events.is_empty());

        server.client.post(server.url("/reset")).send().await.unwrap();
        let body: Value = server.get("/").await.json().await.unwrap();
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let server = TestServer::start().await;

        let response = server
            .client
            .get(server.url("/health"))
            .header("Origin", "http://dashboard.local")
            .send()
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
