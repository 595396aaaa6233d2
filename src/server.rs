use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::assembler::{assemble, AssemblyMode};
use crate::config::ServerConfig;
use crate::encoding::encode_program;
use crate::error::AssemblyError;
use crate::metrics::{init_metrics, record_api_request, record_assembly_error, record_run, Timer, REGISTRY};
use crate::report::RunReport;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub code: String,
    pub mode: Option<AssemblyMode>,
    pub max_steps: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AssembleRequest {
    pub code: String,
    pub mode: Option<AssemblyMode>,
}

#[derive(Debug, Serialize)]
pub struct AssembleResult {
    /// Packed instruction stream
    pub program: Vec<String>,
    /// Mnemonic listing, `<index>: <instruction>`
    pub listing: Vec<String>,
    pub skipped: Vec<AssemblyError>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Failed, but with partial data the caller can still show.
    pub fn failure(data: T, error: String) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(error),
        }
    }
}

/// All routes, without CORS. Split out so tests can drive them directly.
pub fn routes(config: ServerConfig) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    // Run a program
    let run = warp::path("run")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_config(config.clone()))
        .and_then(run_handler);

    // Assemble without executing
    let assemble = warp::path("assemble")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_config(config))
        .and_then(assemble_handler);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&ApiResponse::success("ok")));

    // Metrics endpoint
    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(metrics_handler);

    run.or(assemble).or(health).or(metrics)
}

pub async fn run_server(config: ServerConfig) {
    // Initialize Prometheus metrics
    init_metrics();

    println!("=== 6-Register ISA Simulator ===");
    println!(
        "Assembly mode: {:?}, step limit: {}",
        config.assembly_mode, config.exec.max_steps
    );

    // CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    let address = (config.host, config.port);
    let routes = routes(config).with(cors);

    println!("Simulator server starting on http://{}:{}", address.0, address.1);
    println!("API Documentation:");
    println!("  POST   /run       - Assemble and execute a program");
    println!("  POST   /assemble  - Assemble a program to the packed instruction stream");
    println!("  GET    /health    - Liveness check");
    println!("  GET    /metrics   - Prometheus metrics endpoint");

    warp::serve(routes).run(address).await;
}

fn with_config(config: ServerConfig) -> impl Filter<Extract = (ServerConfig,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

async fn run_handler(request: RunRequest, config: ServerConfig) -> Result<impl Reply, Rejection> {
    let timer = Timer::new();
    let mode = request.mode.unwrap_or(config.assembly_mode);
    let exec = config.effective_exec(request.max_steps);

    let report = RunReport::build(&request.code, mode, &exec);
    record_run(&report, timer.elapsed());

    let response = match report.error.clone() {
        None => ApiResponse::success(report),
        Some(error) => {
            eprintln!("run {} failed: {}", report.run_id, error);
            ApiResponse::failure(report, error)
        }
    };

    record_api_request("POST", "/run", 200, timer.elapsed());
    Ok(warp::reply::json(&response))
}

async fn assemble_handler(request: AssembleRequest, config: ServerConfig) -> Result<impl Reply, Rejection> {
    let timer = Timer::new();
    let mode = request.mode.unwrap_or(config.assembly_mode);

    let response = match assemble(&request.code, mode) {
        Ok(assembly) => {
            for skipped in &assembly.skipped {
                record_assembly_error(&skipped.kind);
            }
            let listing = assembly
                .program
                .iter()
                .enumerate()
                .map(|(index, instruction)| format!("{}: {}", index, instruction))
                .collect();
            ApiResponse::success(AssembleResult {
                program: encode_program(&assembly.program),
                listing,
                skipped: assembly.skipped,
            })
        }
        Err(error) => {
            record_assembly_error(&error.kind);
            ApiResponse::error(error.to_string())
        }
    };

    record_api_request("POST", "/assemble", 200, timer.elapsed());
    Ok(warp::reply::json(&response))
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    let timer = Timer::new();
    let encoder = prometheus::TextEncoder::new();
    let response = metrics_response(encoder.encode_to_string(&REGISTRY.gather()));
    record_api_request("GET", "/metrics", response.status().as_u16(), timer.elapsed());
    Ok(response)
}

fn metrics_response(encoded: prometheus::Result<String>) -> warp::reply::Response {
    match encoded {
        Ok(metrics_text) => warp::reply::with_status(
            warp::reply::with_header(metrics_text, "content-type", "text/plain; version=0.0.4"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => {
            eprintln!("Error encoding metrics: {}", e);
            warp::reply::with_status(
                warp::reply::with_header("Error encoding metrics".to_string(), "content-type", "text/plain"),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_response_status() {
        let ok = metrics_response(Ok("isa_runs_total 1\n".to_string()));
        assert_eq!(ok.status(), StatusCode::OK);

        let failed = metrics_response(Err(prometheus::Error::Msg("bad label".to_string())));
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.headers()["content-type"], "text/plain");
    }
}
