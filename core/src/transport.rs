use async_trait::async_trait;

use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

/// `Transport` over a pooled `reqwest::Client`.
///
/// Dropping the future returned by `send` drops the underlying reqwest
/// future, which closes the connection for that request.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        // Error bodies are best-effort; a success body that cannot be read is
        // a transport failure, not an empty payload.
        let body = match response.text().await {
            Ok(body) => body,
            Err(_) if !(200..300).contains(&status) => String::new(),
            Err(e) => return Err(TransportError(e.to_string())),
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
