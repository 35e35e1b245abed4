//! HTTP boundary
//!
//! Minimal HTTP/1.1 handling on top of tokio: read one request per
//! connection, route it, write one JSON response.

use crate::pipeline::AskPipeline;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_BYTES: usize = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, pipeline: Arc<AskPipeline>) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from: {}", addr);
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            handle_connection(stream, &pipeline).await;
        });
    }
}

async fn handle_connection(mut stream: TcpStream, pipeline: &AskPipeline) {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(READ_TIMEOUT, async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&temp_buf[..n]);
            if request_complete(&buffer) || buffer.len() > MAX_REQUEST_BYTES {
                break;
            }
        }
        Ok::<_, std::io::Error>(())
    })
    .await;

    match read_result {
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
        Ok(Err(e)) => {
            error!("Failed to read from stream: {}", e);
            return;
        }
        Ok(Ok(())) => {}
    }

    if buffer.is_empty() {
        return;
    }

    let response = match String::from_utf8(buffer) {
        Ok(request) => handle_request(&request, pipeline).await,
        Err(_) => create_response(400, "Bad Request", r#"{"error":"Request is not valid UTF-8"}"#),
    };
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

/// Headers received and, when announced, the full body too.
fn request_complete(buffer: &[u8]) -> bool {
    let Ok(s) = std::str::from_utf8(buffer) else {
        return false;
    };
    let Some(headers_end) = s.find("\r\n\r\n").map(|i| i + 4) else {
        return false;
    };
    match extract_content_length(s) {
        Some(len) => buffer.len() >= headers_end + len,
        None => true,
    }
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.is_empty() {
            break;
        }
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

/// Route a raw request and build the raw response.
pub async fn handle_request(request: &str, pipeline: &AskPipeline) -> String {
    let Some(request_line) = request.lines().next() else {
        return create_response(400, "Bad Request", "{}");
    };
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    let path = parts[1].split('?').next().unwrap_or("/");
    let path = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    debug!("Request: {} {}", method, path);

    match (method, path) {
        ("OPTIONS", _) => create_response(204, "No Content", ""),
        ("GET", "/") => create_response(
            200,
            "OK",
            r#"{"message":"Natural-language to SQL API. Use POST /ask with a question."}"#,
        ),
        ("GET", "/health") => create_response(200, "OK", r#"{"status":"ok"}"#),
        ("POST", "/ask") => {
            let body = request
                .find("\r\n\r\n")
                .map(|i| &request[i + 4..])
                .unwrap_or("");
            let ask: AskRequest = match serde_json::from_str(body.trim()) {
                Ok(ask) => ask,
                Err(e) => {
                    let body = serde_json::json!({ "error": format!("Invalid request body: {}", e) });
                    return create_response(400, "Bad Request", &body.to_string());
                }
            };
            let response = pipeline.ask(&ask.question).await;
            info!(failed = response.error.is_some(), "Answered question");
            match serde_json::to_string(&response) {
                Ok(json) => create_response(200, "OK", &json),
                Err(e) => {
                    error!("Failed to serialize response: {}", e);
                    create_response(500, "Internal Server Error", r#"{"error":"Failed to serialize response"}"#)
                }
            }
        }
        _ => create_response(404, "Not Found", r#"{"error":"Not found"}"#),
    }
}

pub fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content_length() {
        let req = "POST /ask HTTP/1.1\r\nHost: x\r\nContent-Length: 27\r\n\r\n{}";
        assert_eq!(extract_content_length(req), Some(27));
        assert_eq!(extract_content_length("GET / HTTP/1.1\r\n\r\n"), None);
    }

    #[test]
    fn test_request_complete() {
        assert!(!request_complete(b"POST /ask HTTP/1.1\r\nContent-Length: 4\r\n"));
        assert!(!request_complete(b"POST /ask HTTP/1.1\r\nContent-Length: 4\r\n\r\n{}"));
        assert!(request_complete(b"POST /ask HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}"));
        assert!(request_complete(b"GET / HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn test_create_response() {
        let response = create_response(200, "OK", r#"{"a":1}"#);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 7\r\n"));
        assert!(response.ends_with("\r\n\r\n{\"a\":1}"));
    }
}
