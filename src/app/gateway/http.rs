//! HTTP implementation of the booking service gateway
//!
//! JSON over HTTP with bearer authentication and client-side rate limiting.
//! No request is ever retried here: a retried create or cancel would turn a
//! single ambiguous outcome into several.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::config::GatewayConfig;
use super::RemoteReservationGateway;
use crate::app::models::{
    CreateReservation, OwnerIdentity, RemoteReservation, ReservationKind, ReservationStatus,
};
use crate::constants::gateway;
use crate::errors::{GatewayError, GatewayResult};

type DirectLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Deserialize)]
struct CreatedReservation {
    id: i64,
}

/// Booking service client over HTTP
#[derive(Debug)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    rate_limiter: DirectLimiter,
}

impl HttpGateway {
    /// Creates a gateway from configuration
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` for an invalid base URL, a zero rate
    /// limit, or an HTTP client that cannot be built
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = config.build_http_client()?;
        let base_url = config.parsed_base_url()?;
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            base_url,
            rate_limiter,
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> GatewayResult<DirectLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| GatewayError::Config {
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    fn collection_url(&self) -> GatewayResult<Url> {
        self.base_url
            .join(gateway::RESERVATIONS_PATH)
            .map_err(|e| GatewayError::Config {
                reason: format!("cannot build reservations URL: {e}"),
            })
    }

    fn item_url(&self, id: i64) -> GatewayResult<Url> {
        self.base_url
            .join(&format!("{}/{}", gateway::RESERVATIONS_PATH, id))
            .map_err(|e| GatewayError::Config {
                reason: format!("cannot build reservation URL: {e}"),
            })
    }

    async fn send(&self, request: RequestBuilder, owner: &OwnerIdentity) -> reqwest::Result<Response> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
        request.bearer_auth(owner.token()).send().await
    }

    /// Whether an error body signals a duplicate-submission conflict
    fn is_conflict(status: StatusCode, body: &str) -> bool {
        if status == StatusCode::CONFLICT {
            return true;
        }
        let lowered = body.to_lowercase();
        gateway::CONFLICT_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    }

    /// Classify a failed cancel send
    ///
    /// Only a failure to connect proves the request never left; anything
    /// later (timeouts, resets, body errors) may hide a server-side success.
    fn classify_cancel_error(error: reqwest::Error) -> GatewayError {
        if error.is_connect() || error.is_builder() {
            GatewayError::Transport {
                reason: error.to_string(),
            }
        } else {
            GatewayError::Ambiguous {
                reason: error.to_string(),
            }
        }
    }

    async fn error_body(response: Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"))
    }
}

#[async_trait]
impl RemoteReservationGateway for HttpGateway {
    async fn create(
        &self,
        owner: &OwnerIdentity,
        request: &CreateReservation,
    ) -> GatewayResult<i64> {
        let url = self.collection_url()?;
        let response = self
            .send(self.client.post(url.clone()).json(request), owner)
            .await
            .map_err(|e| GatewayError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::error_body(response).await;
            if Self::is_conflict(status, &body) {
                debug!("Create for {} reported a conflict: {}", owner.key(), body);
                return Err(GatewayError::Conflict { diagnostic: body });
            }
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedReservation =
            response.json().await.map_err(|e| GatewayError::Transport {
                reason: format!("unreadable create response: {e}"),
            })?;
        debug!("Created reservation {} via {}", created.id, url);
        Ok(created.id)
    }

    async fn cancel(&self, owner: &OwnerIdentity, id: i64) -> GatewayResult<()> {
        let url = self.item_url(id)?;
        let response = self
            .send(self.client.delete(url), owner)
            .await
            .map_err(Self::classify_cancel_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = Self::error_body(response).await;
        if status == StatusCode::BAD_GATEWAY || status == StatusCode::GATEWAY_TIMEOUT {
            warn!("Cancel of {} ended with HTTP {}; outcome unknown", id, status);
            return Err(GatewayError::Ambiguous {
                reason: format!("HTTP {}: {}", status.as_u16(), body),
            });
        }

        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn list(
        &self,
        owner: &OwnerIdentity,
        status: ReservationStatus,
        kind: Option<ReservationKind>,
    ) -> GatewayResult<Vec<RemoteReservation>> {
        let mut url = self.collection_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("status", status.as_str());
            if let Some(kind) = kind {
                query.append_pair("type", kind.as_str());
            }
        }

        let response = self
            .send(self.client.get(url), owner)
            .await
            .map_err(|e| GatewayError::Transport {
                reason: e.to_string(),
            })?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(GatewayError::Rejected {
                status: http_status.as_u16(),
                body: Self::error_body(response).await,
            });
        }

        let items: Vec<RemoteReservation> =
            response.json().await.map_err(|e| GatewayError::Transport {
                reason: format!("unreadable list response: {e}"),
            })?;
        debug!("Listed {} {} reservations", items.len(), status);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Accept one connection and answer it with `response`
    ///
    /// `None` closes the connection after reading the request without
    /// writing anything back.
    async fn serve_once(response: Option<String>) -> (HttpGateway, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            if let Some(response) = response {
                socket.write_all(response.as_bytes()).await.unwrap();
            }
            let _ = socket.shutdown().await;
            request
        });

        let config = GatewayConfig::with_base_url(format!("http://{addr}/api"))
            .with_request_timeout(Duration::from_secs(5));
        (HttpGateway::new(&config).unwrap(), server)
    }

    fn owner() -> OwnerIdentity {
        OwnerIdentity::new("session-token")
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        assert!(HttpGateway::build_rate_limiter(0).is_err());
    }

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let limiter = HttpGateway::build_rate_limiter(5).unwrap();
        limiter.until_ready().await;
    }

    #[test]
    fn test_conflict_detection() {
        assert!(HttpGateway::is_conflict(StatusCode::CONFLICT, ""));
        assert!(HttpGateway::is_conflict(
            StatusCode::BAD_REQUEST,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#
        ));
        assert!(!HttpGateway::is_conflict(
            StatusCode::BAD_REQUEST,
            r#"{"message":"slot is in the past"}"#
        ));
    }

    #[test]
    fn test_urls() {
        let gateway =
            HttpGateway::new(&GatewayConfig::with_base_url("https://api.example.com/v1")).unwrap();
        assert_eq!(
            gateway.collection_url().unwrap().as_str(),
            "https://api.example.com/v1/reservations"
        );
        assert_eq!(
            gateway.item_url(42).unwrap().as_str(),
            "https://api.example.com/v1/reservations/42"
        );
    }

    #[tokio::test]
    async fn test_cancel_against_closed_port_is_transport() {
        // Port 9 (discard) is closed on any sane test machine
        let config = GatewayConfig::with_base_url("http://127.0.0.1:9/")
            .with_request_timeout(Duration::from_secs(2));
        let gateway = HttpGateway::new(&config).unwrap();
        let result = gateway.cancel(&OwnerIdentity::new("t"), 1).await;
        assert!(matches!(result, Err(GatewayError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_create_returns_new_id() {
        let (gateway, server) = serve_once(Some(http_response("201 Created", r#"{"id":77}"#))).await;

        let id = gateway
            .create(&owner(), &CreateReservation::group("55"))
            .await
            .unwrap();
        assert_eq!(id, 77);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/reservations "));
        assert!(request.to_lowercase().contains("authorization: bearer session-token"));
        assert!(request.contains(r#""type":"GROUP""#));
        assert!(request.contains(r#""counterpartId":"55""#));
    }

    #[tokio::test]
    async fn test_create_409_is_conflict_with_raw_body() {
        let body = r#"{"message":"already booked"}"#;
        let (gateway, _server) = serve_once(Some(http_response("409 Conflict", body))).await;

        match gateway.create(&owner(), &CreateReservation::group("55")).await {
            Err(GatewayError::Conflict { diagnostic }) => assert_eq!(diagnostic, body),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_duplicate_key_body_is_conflict() {
        let body = r#"{"code":"23505","message":"duplicate key value"}"#;
        let (gateway, _server) =
            serve_once(Some(http_response("500 Internal Server Error", body))).await;

        let result = gateway.create(&owner(), &CreateReservation::group("55")).await;
        assert!(matches!(result, Err(GatewayError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_create_success_with_unreadable_body_is_transport() {
        let (gateway, _server) = serve_once(Some(http_response("200 OK", "not json"))).await;

        let result = gateway.create(&owner(), &CreateReservation::group("55")).await;
        assert!(matches!(result, Err(GatewayError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_create_other_failure_is_rejected() {
        let (gateway, _server) =
            serve_once(Some(http_response("400 Bad Request", r#"{"message":"slot is in the past"}"#)))
                .await;

        let result = gateway.create(&owner(), &CreateReservation::group("55")).await;
        assert!(matches!(result, Err(GatewayError::Rejected { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_cancel_success() {
        let (gateway, server) = serve_once(Some(http_response("204 No Content", ""))).await;

        assert!(gateway.cancel(&owner(), 42).await.is_ok());
        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /api/reservations/42 "));
    }

    #[tokio::test]
    async fn test_cancel_upstream_gateway_errors_are_ambiguous() {
        for status_line in ["502 Bad Gateway", "504 Gateway Timeout"] {
            let (gateway, _server) = serve_once(Some(http_response(status_line, ""))).await;
            let result = gateway.cancel(&owner(), 42).await;
            assert!(
                matches!(result, Err(GatewayError::Ambiguous { .. })),
                "{status_line}: {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_cancel_connection_dropped_after_send_is_ambiguous() {
        let (gateway, server) = serve_once(None).await;

        let result = gateway.cancel(&owner(), 42).await;
        assert!(matches!(result, Err(GatewayError::Ambiguous { .. })));
        assert!(server.await.unwrap().starts_with("DELETE "));
    }

    #[tokio::test]
    async fn test_cancel_forbidden_is_rejected() {
        let (gateway, _server) =
            serve_once(Some(http_response("403 Forbidden", r#"{"message":"not yours"}"#))).await;

        match gateway.cancel(&owner(), 42).await {
            Err(GatewayError::Rejected { status, body }) => {
                assert_eq!(status, 403);
                assert!(body.contains("not yours"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_parses_items_and_sends_filters() {
        let body = r#"[{"id":5,"type":"GROUP","counterpartId":"class-5","startAt":"2025-11-09T14:00:00"}]"#;
        let (gateway, server) = serve_once(Some(http_response("200 OK", body))).await;

        let items = gateway
            .list(&owner(), ReservationStatus::Upcoming, Some(ReservationKind::Group))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 5);
        assert_eq!(items[0].kind, ReservationKind::Group);
        assert!(items[0].start_at.is_some());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/reservations?status=upcoming&type=GROUP "));
    }

    #[tokio::test]
    async fn test_list_malformed_json_is_transport() {
        let (gateway, _server) =
            serve_once(Some(http_response("200 OK", r#"[{"id":"five"}"#))).await;

        let result = gateway
            .list(&owner(), ReservationStatus::Upcoming, None)
            .await;
        assert!(matches!(result, Err(GatewayError::Transport { .. })));
    }
}
