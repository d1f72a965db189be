use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = pickbay_api::app::build_app().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    operator: Uuid,
}

impl Client {
    fn new(srv: &TestServer) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: srv.base_url.clone(),
            operator: Uuid::now_v7(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .header("x-operator-id", self.operator.to_string())
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("x-operator-id", self.operator.to_string())
            .send()
            .await
            .unwrap()
    }

    async fn seed_locations(&self) {
        for body in [
            json!({ "code": "A-01", "is_default": true }),
            json!({ "code": "B-02" }),
            json!({ "code": "RET-01", "is_shortage_pool": true }),
        ] {
            let res = self.post("/locations", body).await;
            assert_eq!(res.status(), StatusCode::CREATED);
        }
    }

    async fn create_job(&self, job_type: &str, items: serde_json::Value) -> serde_json::Value {
        let res = self
            .post(
                "/jobs",
                json!({
                    "job_type": job_type,
                    "store_id": Uuid::now_v7().to_string(),
                    "items": items,
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }

    /// Bring stock on hand through an inbound receipt.
    async fn seed_stock(&self, sku: &str, qty: i64, location: &str) {
        let job = self
            .create_job(
                "inbound",
                json!([{ "sku_code": sku, "name": sku, "qty_planned": qty }]),
            )
            .await;
        let res = self
            .post(
                &format!("/jobs/{}/scans/receive", job["id"].as_str().unwrap()),
                json!({ "value": sku, "qty": qty, "location_code": location }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn health_is_open_but_everything_else_needs_an_operator() {
    let srv = TestServer::spawn().await;
    let http = reqwest::Client::new();

    let res = http
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = http
        .get(format!("{}/jobs", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = http
        .get(format!("{}/jobs", srv.base_url))
        .header("x-operator-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pick_lifecycle_with_quantity_conflict_and_approval() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    client.seed_locations().await;
    client.seed_stock("SKU-A", 20, "A-01").await;

    let job = client
        .create_job(
            "outbound",
            json!([{ "sku_code": "SKU-A", "name": "Widget", "qty_planned": 10 }]),
        )
        .await;
    let job_id = job["id"].as_str().unwrap().to_string();
    let item_id = job["items"][0]["id"].as_str().unwrap().to_string();

    // Two scans of 4 are inside the plan.
    for expected in [4, 8] {
        let res = client
            .post(
                &format!("/jobs/{job_id}/scans/pick"),
                json!({ "value": "sku-a", "qty": 4 }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["status"], "OK");
        assert_eq!(body["qty_picked"], expected);
        assert_eq!(body["used_location_code"], "A-01");
    }

    // The third overshoots: typed 409, clients branch on `kind`.
    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/pick"),
            json!({ "value": "SKU-A", "qty": 4 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "scan_conflict");
    assert_eq!(body["kind"], "QUANTITY_CONFLICT");
    assert_eq!(body["need"], 2);

    // Approve the shortfall, retry with force.
    let res = client
        .post(
            &format!("/jobs/{job_id}/items/{item_id}/approve-extra"),
            json!({ "qty": 2 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/pick"),
            json!({ "value": "SKU-A", "qty": 4, "force": true, "force_reason": "supervisor approved" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["qty_picked"], 12);
    assert_eq!(body["job_status"], "done");

    // The job shows the consumed approval.
    let res = client.get(&format!("/jobs/{job_id}")).await;
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "done");
    assert_eq!(body["items"][0]["qty_picked"], 12);
    assert_eq!(body["items"][0]["extra_picked_qty"], 2);
}

#[tokio::test]
async fn insufficient_stock_then_overpick_routes_to_the_pool() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    client.seed_locations().await;
    client.seed_stock("B2", 2, "B-02").await;

    let job = client
        .create_job(
            "outbound",
            json!([{ "sku_code": "B2", "name": "Gadget", "qty_planned": 5 }]),
        )
        .await;
    let job_id = job["id"].as_str().unwrap().to_string();

    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/pick"),
            json!({ "value": "B2", "qty": 5, "location_code": "B-02" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "INSUFFICIENT_STOCK");

    let res = client
        .post(&format!("/jobs/{job_id}/allow-overpick"), json!({ "allow": true }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/pick"),
            json!({ "value": "B2", "qty": 5, "location_code": "B-02" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["used_location_code"], "RET-01");
}

#[tokio::test]
async fn undo_endpoints_preview_then_reverse_the_ledger() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    client.seed_locations().await;
    client.seed_stock("SKU-A", 30, "A-01").await;

    let job = client
        .create_job(
            "outbound",
            json!([{ "sku_code": "SKU-A", "name": "Widget", "qty_planned": 12 }]),
        )
        .await;
    let job_id = job["id"].as_str().unwrap().to_string();

    for qty in [3, 4, 5] {
        let res = client
            .post(
                &format!("/jobs/{job_id}/scans/pick"),
                json!({ "value": "SKU-A", "qty": qty }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    // Preview: reversing the pick of 5 returns stock to the bin.
    let res = client.get(&format!("/jobs/{job_id}/undo/check")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let preview: serde_json::Value = res.json().await.unwrap();
    assert_eq!(preview["will_go_negative"], false);
    assert_eq!(preview["current_qty"], 18);
    assert_eq!(preview["undo_qty"], 5);
    assert_eq!(preview["result_qty"], 23);
    assert_eq!(preview["location_code"], "A-01");

    let res = client
        .post(&format!("/jobs/{job_id}/undo/last"), json!({}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let applied: serde_json::Value = res.json().await.unwrap();
    assert_eq!(applied["on_hand_after"], 23);
    assert_eq!(applied["job_status"], "open");

    // Sweep the rest.
    let res = client
        .post(&format!("/jobs/{job_id}/undo/all"), json!({}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let report: serde_json::Value = res.json().await.unwrap();
    assert_eq!(report["undone"].as_array().unwrap().len(), 2);
    assert!(report["blocked"].is_null());

    // Ledger keeps the full history, newest first: 3 undos then 3 picks.
    let res = client.get(&format!("/jobs/{job_id}/transactions")).await;
    let txs: serde_json::Value = res.json().await.unwrap();
    let txs = txs.as_array().unwrap();
    assert_eq!(txs.len(), 6);
    let kinds: Vec<&str> = txs.iter().map(|t| t["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["undo", "undo", "undo", "pick", "pick", "pick"]);
    for undo in txs.iter().take(3) {
        assert!(!undo["ref_tx_id"].is_null());
    }

    // Nothing left to reverse.
    let res = client.get(&format!("/jobs/{job_id}/undo/check")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn undo_refusal_carries_the_negative_stock_kind() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    client.seed_locations().await;
    client.seed_stock("SKU-A", 5, "A-01").await;

    // Another job drains 4 of the 5 received.
    let job = client
        .create_job(
            "outbound",
            json!([{ "sku_code": "SKU-A", "name": "Widget", "qty_planned": 4 }]),
        )
        .await;
    let job_id = job["id"].as_str().unwrap().to_string();
    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/pick"),
            json!({ "value": "SKU-A", "qty": 4 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    // Find the inbound job and try to reverse its receipt of 5.
    let res = client.get("/jobs?status=done").await;
    let jobs: serde_json::Value = res.json().await.unwrap();
    let inbound_id = jobs
        .as_array()
        .unwrap()
        .iter()
        .find(|j| j["job_type"] == "inbound")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client.get(&format!("/jobs/{inbound_id}/undo/check")).await;
    let preview: serde_json::Value = res.json().await.unwrap();
    assert_eq!(preview["will_go_negative"], true);
    assert_eq!(preview["result_qty"], -4);

    let res = client
        .post(&format!("/jobs/{inbound_id}/undo/last"), json!({}))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "NEGATIVE_STOCK_ON_UNDO");

    let res = client
        .post(&format!("/jobs/{inbound_id}/undo/last"), json!({ "force": true }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let applied: serde_json::Value = res.json().await.unwrap();
    assert_eq!(applied["on_hand_after"], -4);
}

#[tokio::test]
async fn validation_and_not_found_surfaces() {
    let srv = TestServer::spawn().await;
    let client = Client::new(&srv);
    client.seed_locations().await;

    let job = client
        .create_job(
            "outbound",
            json!([{ "sku_code": "SKU-A", "name": "Widget", "qty_planned": 5 }]),
        )
        .await;
    let job_id = job["id"].as_str().unwrap().to_string();

    // Non-positive quantity.
    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/pick"),
            json!({ "value": "SKU-A", "qty": 0 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Unknown scan value without force.
    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/pick"),
            json!({ "value": "NOPE", "qty": 1 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "ITEM_NOT_IN_JOB");

    // Unknown job.
    let res = client
        .post(
            &format!("/jobs/{}/scans/pick", Uuid::now_v7()),
            json!({ "value": "SKU-A", "qty": 1 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Receive on an outbound job is a direction mismatch.
    let res = client
        .post(
            &format!("/jobs/{job_id}/scans/receive"),
            json!({ "value": "SKU-A", "qty": 1, "location_code": "A-01" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Duplicate location code.
    let res = client.post("/locations", json!({ "code": "A-01" })).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
