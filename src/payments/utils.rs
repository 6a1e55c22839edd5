use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::{Client, Method};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Raw outcome of one gateway HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub latency: Duration,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Basic-auth credentials sent with a request.
#[derive(Debug, Clone, Copy)]
pub struct BasicAuth<'a> {
    pub username: &'a str,
    pub password: Option<&'a str>,
}

/// Thin reqwest wrapper shared by the gateway clients. Gateway calls are never
/// retried here; a failed create surfaces to the caller as-is.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    gateway: &'static str,
    timeout: Duration,
}

impl PaymentHttpClient {
    pub fn new(gateway: &'static str, timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            gateway,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `body` as JSON and returns the response without interpreting
    /// the status code.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        auth: Option<BasicAuth<'_>>,
        body: &B,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<RawResponse> {
        let mut request = self.client.request(method, url).json(body);
        if let Some(auth) = auth {
            request = request.basic_auth(auth.username, auth.password);
        }
        for (k, v) in additional_headers {
            request = request.header(*k, *v);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?
            .to_vec();

        Ok(RawResponse {
            status,
            body,
            headers,
            latency: started.elapsed(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> PaymentError {
        if err.is_timeout() {
            PaymentError::TimeoutError {
                gateway: self.gateway.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            PaymentError::NetworkError {
                message: format!("{} request failed: {}", self.gateway, err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_response_success_range() {
        let mut raw = RawResponse {
            status: 201,
            body: b"{}".to_vec(),
            headers: vec![],
            latency: Duration::from_millis(5),
        };
        assert!(raw.is_success());
        raw.status = 302;
        assert!(!raw.is_success());
        assert_eq!(raw.body_text(), "{}");
    }
}
