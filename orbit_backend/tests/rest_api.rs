use orbit_backend::api;
use orbit_backend::bootstrap;
use orbit_backend::config::{OrbitConfig, OrbitPaths, ProximityConfig};
use tempfile::{tempdir, TempDir};
use tokio::time::{sleep, Duration};

struct TestServer {
    _dir: TempDir,
    server: tokio::task::JoinHandle<()>,
    base_url: String,
}

impl TestServer {
    async fn shutdown(self) {
        self.server.abort();
        let _ = self.server.await;
    }
}

fn next_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .unwrap()
        .port()
}

async fn wait_for_health(base_url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("server did not become healthy in time");
}

async fn spawn_server(port: u16) -> TestServer {
    let dir = tempdir().expect("tempdir");
    let paths = OrbitPaths::from_base_dir(dir.path()).expect("paths");
    let config = OrbitConfig::new(port, paths, ProximityConfig::default());

    let resources = bootstrap::initialize(&config).expect("bootstrap");
    let server_config = config.clone();
    let server_database = resources.database.clone();
    let server = tokio::spawn(async move {
        let _ = api::serve_http(server_config, server_database).await;
    });

    let base_url = format!("http://127.0.0.1:{port}");
    wait_for_health(&base_url).await;

    TestServer {
        _dir: dir,
        server,
        base_url,
    }
}

async fn register(client: &reqwest::Client, base_url: &str) -> serde_json::Value {
    let resp = client
        .post(format!("{base_url}/api/auth/register"))
        .send()
        .await
        .expect("register response");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    resp.json().await.expect("register json")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires local networking"]
async fn rest_roundtrip_friendship_and_nearby() {
    let port = next_port();
    let server = spawn_server(port).await;
    let base_url = server.base_url.clone();
    let client = reqwest::Client::new();

    let alice = register(&client, &base_url).await;
    let ben = register(&client, &base_url).await;

    let alice_secret = alice["deviceSecret"].as_str().expect("alice secret");
    let ben_secret = ben["deviceSecret"].as_str().expect("ben secret");
    let ben_code = ben["friendCode"].as_str().expect("ben friend code");
    let ben_id = ben["userId"].as_i64().expect("ben user id");

    // Unauthenticated requests to the protected surface are rejected.
    let resp = client
        .get(format!("{base_url}/api/settings"))
        .send()
        .await
        .expect("settings response");
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    // Alice invites Ben by friend code; Ben sees and accepts the request.
    let invite: serde_json::Value = client
        .post(format!("{base_url}/api/friends/invite"))
        .bearer_auth(alice_secret)
        .json(&serde_json::json!({ "friendCode": ben_code }))
        .send()
        .await
        .expect("invite response")
        .json()
        .await
        .expect("invite json");
    assert_eq!(invite["status"].as_str(), Some("PENDING"));

    let requests: serde_json::Value = client
        .get(format!("{base_url}/api/friends/requests"))
        .bearer_auth(ben_secret)
        .send()
        .await
        .expect("requests response")
        .json()
        .await
        .expect("requests json");
    let request_id = requests[0]["requestId"].as_i64().expect("request id");

    let accepted: serde_json::Value = client
        .post(format!("{base_url}/api/friends/accept"))
        .bearer_auth(ben_secret)
        .json(&serde_json::json!({ "requestId": request_id }))
        .send()
        .await
        .expect("accept response")
        .json()
        .await
        .expect("accept json");
    assert_eq!(accepted["id"].as_i64(), Some(alice["userId"].as_i64().unwrap()));

    // Both report locations about 256 meters apart.
    for (secret, lat) in [(alice_secret, 49.2827), (ben_secret, 49.2850)] {
        let resp = client
            .post(format!("{base_url}/api/location/update"))
            .bearer_auth(secret)
            .json(&serde_json::json!({
                "latitude": lat,
                "longitude": -123.1207,
                "accuracy": 10.0,
            }))
            .send()
            .await
            .expect("location response");
        assert!(resp.status().is_success());
    }

    let nearby: serde_json::Value = client
        .get(format!("{base_url}/api/location/nearby"))
        .bearer_auth(alice_secret)
        .send()
        .await
        .expect("nearby response")
        .json()
        .await
        .expect("nearby json");

    let entries = nearby["nearby"].as_array().expect("nearby array");
    assert_eq!(entries.len(), 1);
    let distance = entries[0]["distance"].as_i64().expect("distance");
    assert!((250..=262).contains(&distance), "distance was {distance}");
    assert_eq!(entries[0]["distanceCategory"].as_str(), Some("VERY_CLOSE"));
    assert_eq!(
        nearby["newAlerts"].as_array().expect("alerts"),
        &vec![serde_json::json!(ben_id)]
    );

    // The second poll inside the cooldown window reports no new alerts.
    let again: serde_json::Value = client
        .get(format!("{base_url}/api/location/nearby"))
        .bearer_auth(alice_secret)
        .send()
        .await
        .expect("nearby response")
        .json()
        .await
        .expect("nearby json");
    assert!(again["newAlerts"].as_array().expect("alerts").is_empty());

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires local networking"]
async fn settings_validation_and_visibility_modes() {
    let port = next_port();
    let server = spawn_server(port).await;
    let base_url = server.base_url.clone();
    let client = reqwest::Client::new();

    let user = register(&client, &base_url).await;
    let secret = user["deviceSecret"].as_str().expect("secret");

    let resp = client
        .post(format!("{base_url}/api/settings/update"))
        .bearer_auth(secret)
        .json(&serde_json::json!({ "radiusMeters": 50 }))
        .send()
        .await
        .expect("settings response");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{base_url}/api/settings/update"))
        .bearer_auth(secret)
        .json(&serde_json::json!({ "mode": "SOMETIMES" }))
        .send()
        .await
        .expect("settings response");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let updated: serde_json::Value = client
        .post(format!("{base_url}/api/settings/update"))
        .bearer_auth(secret)
        .json(&serde_json::json!({
            "displayName": "Wanderer",
            "mode": "EVERYONE",
            "radiusMeters": 1500,
        }))
        .send()
        .await
        .expect("settings response")
        .json()
        .await
        .expect("settings json");
    assert_eq!(updated["displayName"].as_str(), Some("Wanderer"));
    assert_eq!(updated["mode"].as_str(), Some("EVERYONE"));
    assert_eq!(updated["radiusMeters"].as_i64(), Some(1500));

    // Nearby before any location report explains what to do.
    let nearby: serde_json::Value = client
        .get(format!("{base_url}/api/location/nearby?scope=everyone"))
        .bearer_auth(secret)
        .send()
        .await
        .expect("nearby response")
        .json()
        .await
        .expect("nearby json");
    assert_eq!(
        nearby["message"].as_str(),
        Some("No location data available. Update your location first.")
    );

    let resp = client
        .get(format!("{base_url}/api/location/nearby?scope=sideways"))
        .bearer_auth(secret)
        .send()
        .await
        .expect("nearby response");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    server.shutdown().await;
}
