use isa_sim::metrics::{init_metrics, ASSEMBLY_ERRORS_TOTAL};
use isa_sim::server::routes;
use isa_sim::{ExecConfig, ServerConfig};
use serde_json::{json, Value};

fn config() -> ServerConfig {
    ServerConfig {
        exec: ExecConfig::with_max_steps(500),
        ..ServerConfig::default()
    }
}

async fn post(path: &str, body: Value) -> Value {
    let response = warp::test::request()
        .method("POST")
        .path(path)
        .json(&body)
        .reply(&routes(config()))
        .await;
    assert_eq!(response.status(), 200);
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn test_run_program() {
    let body = post("/run", json!({ "code": "MOV R0 5\nMOV R1 3\nADD R0 R1\nHLT" })).await;

    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["registers"][0], "R0 = 8");
    assert_eq!(data["output"].as_array().unwrap().len(), 3);
    assert_eq!(data["stop"], "halted");
    assert_eq!(data["flags"]["zero"], 1);
    assert_eq!(data["memory"][0], "All memory cells are 0");
    assert_eq!(data["trace"][0]["event"], "executed");
}

#[tokio::test]
async fn test_run_reports_assembly_error() {
    let body = post("/run", json!({ "code": "FOO R0 R1" })).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "line 1: unknown opcode `FOO`");
    assert!(body["data"]["state"].is_null());
}

#[tokio::test]
async fn test_run_lenient_mode() {
    let body = post("/run", json!({ "code": "FOO R0 R1\nMOV R2 9", "mode": "lenient" })).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["registers"][2], "R2 = 9");
    assert_eq!(body["data"]["skipped"][0]["line"], 1);
}

#[tokio::test]
async fn test_run_step_limit_is_capped_by_server() {
    let body = post("/run", json!({ "code": "JUMP 0", "max_steps": 1_000_000 })).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "step limit of 500 reached at pc 0");
    assert_eq!(body["data"]["steps"], 500);
}

#[tokio::test]
async fn test_assemble_endpoint() {
    let body = post("/assemble", json!({ "code": "mov R0 5\nJUMPZ 0\nHLT" })).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["program"], json!(["1 0 5", "9 0", "15"]));
    assert_eq!(body["data"]["listing"][1], "1: JUMPZ 0");
}

#[tokio::test]
async fn test_bad_json_is_rejected() {
    let response = warp::test::request()
        .method("POST")
        .path("/run")
        .header("content-type", "application/json")
        .body("{ not json")
        .reply(&routes(config()))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_health_and_metrics() {
    init_metrics();
    let filter = routes(config());

    let health = warp::test::request().path("/health").reply(&filter).await;
    assert_eq!(health.status(), 200);

    post("/run", json!({ "code": "HLT" })).await;
    let metrics = warp::test::request().path("/metrics").reply(&filter).await;
    assert_eq!(metrics.status(), 200);
    let text = String::from_utf8(metrics.body().to_vec()).unwrap();
    assert!(text.contains("isa_runs_total"));
}

#[tokio::test]
async fn test_run_assembly_error_is_counted() {
    let unknown = ASSEMBLY_ERRORS_TOTAL.with_label_values(&["unknown_opcode"]);
    let before = unknown.get();

    let body = post("/run", json!({ "code": "FOO R0 R1" })).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["assembly_error"]["kind"]["kind"], "unknown_opcode");
    assert!(unknown.get() >= before + 1.0);
}
