//! HTTP API server
//!
//! Thin boundary layer over the pipeline and the executor, using tokio and
//! basic HTTP handling directly. Endpoints mirror the CLI: generate a
//! statement, execute a statement, list databases, show a schema.

use querysmith::config::Config;
use querysmith::executor::{OperationType, QueryExecutor};
use querysmith::gateway::LlmGateway;
use querysmith::pipeline::QueryPipeline;
use querysmith::schema;
use querysmith::validator::{DataProbe, FeasibilityValidator, MySqlProbe};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::from_env()?);

    let bind = std::env::var("SERVER_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&bind).await?;
    info!("querysmith API listening on {}", bind);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Connection from {}", addr);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            handle_connection(stream, config).await;
        });
    }
}

async fn handle_connection(mut stream: TcpStream, config: Arc<Config>) {
    let mut buffer = vec![0u8; 65536];

    match stream.read(&mut buffer).await {
        Ok(size) => {
            let request = String::from_utf8_lossy(&buffer[..size]).into_owned();
            let response = handle_request(&request, &config).await;
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                error!("Failed to write response: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to read from stream: {}", e);
        }
    }
}

async fn handle_request(request: &str, config: &Config) -> String {
    let mut lines = request.lines();
    let request_line = match lines.next() {
        Some(line) => line,
        None => return create_response(400, "Bad Request", "{}"),
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    let mut path = parts[1].to_string();
    if let Some(query_start) = path.find('?') {
        path.truncate(query_start);
    }
    let path = path.trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    let body = request
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("");

    match (method, path) {
        ("OPTIONS", _) => create_response(204, "No Content", ""),
        ("GET", "/api/health") => {
            create_response(200, "OK", r#"{"status":"ok","service":"querysmith"}"#)
        }
        ("GET", "/api/databases") => match schema::list_databases(&config.mysql).await {
            Ok(databases) => json_response(200, &serde_json::json!({ "databases": databases })),
            Err(e) => error_response(500, &e.to_string()),
        },
        ("GET", p) if p.starts_with("/api/schema/") => {
            let database = p.trim_start_matches("/api/schema/");
            match schema::introspect_schema(&config.mysql, database).await {
                Ok(snapshot) => json_response(200, &serde_json::json!({ "schema": snapshot })),
                Err(e) => error_response(500, &e.to_string()),
            }
        }
        ("POST", "/api/generate") => generate_handler(body, config).await,
        ("POST", "/api/execute") => execute_handler(body, config).await,
        _ => error_response(404, "Not found"),
    }
}

async fn generate_handler(body: &str, config: &Config) -> String {
    let payload: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return error_response(400, "Invalid JSON body"),
    };
    let request = payload["query"].as_str().unwrap_or("").trim();
    if request.is_empty() {
        return error_response(400, "Query cannot be empty");
    }
    let database = payload["database"]
        .as_str()
        .unwrap_or(&config.mysql.database)
        .to_string();

    let snapshot = match schema::introspect_schema(&config.mysql, &database).await {
        Ok(snapshot) => snapshot,
        Err(e) => return error_response(500, &e.to_string()),
    };

    let gateway = Arc::new(LlmGateway::from_config(&config.providers));
    let probe: Arc<dyn DataProbe> =
        Arc::new(MySqlProbe::new(config.mysql.clone(), database.clone()));
    let validator = FeasibilityValidator::new(Arc::clone(&gateway), Some(probe));
    let pipeline = QueryPipeline::new(gateway, validator);

    let ctx = pipeline.run(request, &database, snapshot).await;

    let operation = ctx
        .statement
        .as_deref()
        .map(OperationType::classify);
    json_response(
        200,
        &serde_json::json!({
            "sql_query": ctx.statement,
            "error": ctx.error,
            "operation_type": operation,
        }),
    )
}

async fn execute_handler(body: &str, config: &Config) -> String {
    let payload: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return error_response(400, "Invalid JSON body"),
    };
    let statement = payload["sql_query"].as_str().unwrap_or("").trim();
    if statement.is_empty() {
        return error_response(400, "sql_query cannot be empty");
    }
    let database = payload["database"]
        .as_str()
        .unwrap_or(&config.mysql.database)
        .to_string();

    let executor = QueryExecutor::for_mysql(config.mysql.clone(), database);
    match executor.run(statement).await {
        Ok(report) => json_response(200, &serde_json::json!(report)),
        Err(e) => error_response(500, &e.to_string()),
    }
}

fn json_response(status: u16, value: &serde_json::Value) -> String {
    let body = value.to_string();
    create_response(status, status_text(status), &body)
}

fn error_response(status: u16, message: &str) -> String {
    json_response(status, &serde_json::json!({ "error": message }))
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
