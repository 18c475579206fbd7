// ABOUTME: Minimal HTTP/1 client over a plain TCP connection using hyper.
// ABOUTME: One connection per request, bounded by a timeout.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT, CONTENT_TYPE, HOST};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use super::GatewayError;

const YAML: &str = "application/yaml";

#[derive(Debug)]
pub(super) struct HttpRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub method: &'static str,
    /// Origin-form path including the query.
    pub path: String,
    /// `application/x-www-form-urlencoded` body.
    pub form: Option<String>,
}

#[derive(Debug)]
pub(super) struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpRequest<'_> {
    pub fn uri(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

impl HttpResponse {
    /// Maps 404 and other non-2xx statuses to errors.
    pub fn success(self, uri: String) -> Result<String, GatewayError> {
        match self.status {
            200..=299 => Ok(self.body),
            404 => Err(GatewayError::NotFound { uri }),
            status => Err(GatewayError::Status {
                uri,
                status,
                body: self.body,
            }),
        }
    }
}

pub(super) async fn send(
    request: &HttpRequest<'_>,
    timeout: Duration,
) -> Result<HttpResponse, GatewayError> {
    match tokio::time::timeout(timeout, exchange(request)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            uri: request.uri(),
        }),
    }
}

async fn exchange(request: &HttpRequest<'_>) -> Result<HttpResponse, GatewayError> {
    let uri = request.uri();
    let failed = |message: String| GatewayError::Http {
        uri: uri.clone(),
        message,
    };
    tracing::debug!("{} {}", request.method, uri);

    let stream = TcpStream::connect((request.host, request.port))
        .await
        .map_err(|source| GatewayError::Connect {
            uri: uri.clone(),
            source,
        })?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| failed(format!("HTTP handshake failed: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("connection error: {}", e);
        }
    });

    let mut builder = hyper::Request::builder()
        .method(request.method)
        .uri(&request.path)
        .header(HOST, format!("{}:{}", request.host, request.port))
        .header(ACCEPT, YAML);
    if request.form.is_some() {
        builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    }
    let body = Full::new(Bytes::from(request.form.clone().unwrap_or_default()));
    let req = builder
        .body(body)
        .map_err(|e| failed(format!("failed to build request: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| failed(format!("request failed: {e}")))?;
    let status = resp.status().as_u16();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| failed(format!("failed to read response: {e}")))?
        .to_bytes();

    Ok(HttpResponse {
        status,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses() {
        let ok = HttpResponse {
            status: 200,
            body: "x".to_string(),
        };
        assert_eq!(ok.success("u".to_string()).unwrap(), "x");

        let missing = HttpResponse {
            status: 404,
            body: String::new(),
        };
        assert!(matches!(
            missing.success("u".to_string()),
            Err(GatewayError::NotFound { .. })
        ));

        let broken = HttpResponse {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(
            broken.success("http://h:1/p".to_string()).unwrap_err().to_string(),
            "got 502 from http://h:1/p: bad gateway"
        );
    }
}
