//! Inline inspection and proxying.
//!
//! Every transaction goes through two checkpoints:
//!
//! 1. Request headers are ready: the request is serialized into a per
//!    transaction [`Arena`] and handed to the [`RulesEngine`]. A block answers
//!    the client immediately; nothing reaches the upstream.
//! 2. The upstream response head is known: the status and response headers are
//!    serialized and evaluated again. A block replaces the upstream response.
//!
//! Passing transactions are forwarded with a shared [`reqwest::Client`], which
//! the caller configures with timeouts and connection pooling.

use std::convert::Infallible;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error, warn};

use crate::arena::Arena;
use crate::blocking::{BlockSpec, BlockingService, ResponseHost};
use crate::client_ip::ClientIpResolver;
use crate::defaults;
use crate::engine::{Phase, RulesEngine, Verdict};
use crate::error::{InspectError, Result};
use crate::headers;
use crate::serializer::RequestSerializer;
use crate::transaction::{HeaderList, RequestState, ResponseState};
use crate::types::{ConfigProvider, InspectionProvider};
use crate::value::Value;

/// Rules engine, client-IP resolver and block templates shared by every
/// connection task.
pub struct Inspector<E> {
    engine: E,
    resolver: ClientIpResolver,
    blocking: BlockingService,
}

impl<E: RulesEngine> Inspector<E> {
    pub fn new(engine: E, resolver: ClientIpResolver, blocking: BlockingService) -> Self {
        Self {
            engine,
            resolver,
            blocking,
        }
    }

    /// Inspector using the client-IP settings of `config`.
    pub fn from_config(
        engine: E,
        config: &impl InspectionProvider,
        blocking: BlockingService,
    ) -> Self {
        Self::new(engine, config.client_ip_resolver(), blocking)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn resolver(&self) -> &ClientIpResolver {
        &self.resolver
    }

    /// Serializes `request` into `arena` and evaluates it.
    pub fn inspect_request<'a>(&'a self, arena: &'a Arena, request: &'a RequestState) -> Verdict {
        let snapshot = RequestSerializer::new(arena, &self.resolver).serialize(request);
        self.evaluate(&snapshot, Phase::Request)
    }

    /// Serializes the response head into `arena` and evaluates it.
    pub fn inspect_response<'a>(
        &'a self,
        arena: &'a Arena,
        response: &'a ResponseState,
    ) -> Verdict {
        let snapshot = RequestSerializer::new(arena, &self.resolver).serialize_end(response);
        self.evaluate(&snapshot, Phase::Response)
    }

    fn evaluate(&self, snapshot: &Value<'_>, phase: Phase) -> Verdict {
        let verdict = self.engine.evaluate(snapshot, phase);
        if let Verdict::Block(spec) = &verdict {
            debug!(phase = %phase, status = spec.status, "Rules engine blocked transaction");
        }
        verdict
    }

    /// Builds the block response for a request carrying `accept`.
    pub fn block_response(&self, spec: &BlockSpec, accept: Option<&[u8]>) -> Response<Full<Bytes>> {
        let mut host = ResponseHost::new(accept);
        self.blocking.block(spec, &mut host);
        host.into_response().unwrap_or_else(|err| {
            error!(error = %err, "Failed to build block response");
            create_error_response(err.status_code(), err.user_message())
        })
    }
}

/// Handles one request through the inspection pipeline.
///
/// # Arguments
///
/// * `req` - The incoming HTTP request
/// * `peer_addr` - Address of the connected peer
/// * `forward_host` - The upstream host to forward requests to
/// * `forward_port` - The upstream port to forward requests to
/// * `inspector` - Shared rules engine and block templates
/// * `config` - Configuration provider for all settings
/// * `http_client` - HTTP client for forwarding requests (with connection pooling)
///
/// # Returns
///
/// Always returns `Ok` with either:
/// - A block response chosen by the rules engine
/// - The relayed upstream response
/// - An error response (400, 413, 502, 504, ...)
pub async fn handle_request<C, E, B>(
    req: Request<B>,
    peer_addr: Option<SocketAddr>,
    forward_host: String,
    forward_port: u16,
    inspector: Arc<Inspector<E>>,
    config: Arc<C>,
    http_client: reqwest::Client,
) -> std::result::Result<Response<Full<Bytes>>, Infallible>
where
    C: ConfigProvider,
    E: RulesEngine,
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    let request = RequestState::from_parts(&parts, peer_addr);
    let mut arena = Arena::with_capacity(defaults::ARENA_INITIAL_CAPACITY);

    if let Verdict::Block(spec) = inspector.inspect_request(&arena, &request) {
        // Returning here drops the unread request body
        return Ok(inspector.block_response(&spec, request.accept()));
    }

    let client_ip = inspector.resolver().resolve(&request);
    arena.reset();

    let upstream = Upstream {
        host: &forward_host,
        port: forward_port,
        client: &http_client,
    };

    let body = match collect_body(body, config.as_ref()).await {
        Ok(body) => body,
        Err(err) => return Ok(error_response(&err)),
    };

    let (response, body) = match upstream.forward(&parts, body, client_ip).await {
        Ok(relayed) => relayed,
        Err(err) => return Ok(error_response(&err)),
    };

    if let Verdict::Block(spec) = inspector.inspect_response(&arena, &response) {
        return Ok(inspector.block_response(&spec, request.accept()));
    }

    Ok(relay_response(&response, body))
}

async fn collect_body<B>(body: B, config: &impl ConfigProvider) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let bytes = body
        .collect()
        .await
        .map_err(|err| InspectError::BodyReadError(err.to_string()))?
        .to_bytes();

    let proxy_config = config.proxy_config();
    if proxy_config.exceeds_body_limit(bytes.len()) {
        return Err(InspectError::BodyTooLarge {
            size: bytes.len(),
            max: proxy_config.max_body_size,
        });
    }
    Ok(bytes)
}

struct Upstream<'u> {
    host: &'u str,
    port: u16,
    client: &'u reqwest::Client,
}

impl Upstream<'_> {
    /// Sends the request and returns the response head plus its body.
    async fn forward(
        &self,
        parts: &hyper::http::request::Parts,
        body: Bytes,
        client_ip: Option<IpAddr>,
    ) -> Result<(ResponseState, Bytes)> {
        let destination_uri = format!(
            "http://{}:{}{}",
            self.host,
            self.port,
            parts.uri.path_and_query().map_or("/", |pq| pq.as_str())
        );

        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|err| InspectError::InvalidHeader(format!("method: {err}")))?;
        let mut req_builder = self.client.request(method, &destination_uri);

        // X-Real-IP only ever carries the resolved address, never the client's
        for (name, value) in parts.headers.iter() {
            if name != headers::HOST
                && name != headers::CONTENT_LENGTH
                && name != headers::X_REAL_IP
                && !headers::is_hop_by_hop(name.as_str())
            {
                req_builder = req_builder.header(name.as_str(), value.as_bytes());
            }
        }

        if let Some(ip) = client_ip {
            req_builder = req_builder.header(headers::X_REAL_IP, ip.to_string());
        }

        if !body.is_empty() {
            req_builder = req_builder.body(body);
        }

        let response = req_builder.send().await.map_err(upstream_error)?;

        let state = ResponseState {
            status: response.status().as_u16(),
            headers: response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        Bytes::copy_from_slice(name.as_str().as_bytes()),
                        Bytes::copy_from_slice(value.as_bytes()),
                    )
                })
                .collect::<HeaderList>(),
        };

        let body = response.bytes().await.map_err(|err| {
            InspectError::UpstreamConnectionFailed(format!("reading response body: {err}"))
        })?;

        Ok((state, body))
    }
}

fn upstream_error(err: reqwest::Error) -> InspectError {
    if err.is_timeout() {
        InspectError::UpstreamTimeout(err.to_string())
    } else if err.is_connect() {
        InspectError::UpstreamConnectionFailed(err.to_string())
    } else {
        InspectError::HttpClientError(err)
    }
}

/// Rebuilds the upstream response, dropping hop-by-hop and deleted headers.
fn relay_response(response: &ResponseState, body: Bytes) -> Response<Full<Bytes>> {
    let Ok(status) = StatusCode::from_u16(response.status) else {
        warn!(status = response.status, "Upstream sent an invalid status");
        return create_error_response(StatusCode::BAD_GATEWAY, "Bad gateway");
    };

    let mut relayed = Response::new(Full::new(body));
    *relayed.status_mut() = status;

    for record in response.headers.records() {
        if record.is_deleted() {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(record.key()),
            HeaderValue::from_bytes(record.value()),
        ) && !headers::is_hop_by_hop(name.as_str())
        {
            relayed.headers_mut().append(name, value);
        }
    }

    relayed
}

fn error_response(err: &InspectError) -> Response<Full<Bytes>> {
    if err.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        debug!(error = %err, "Request rejected");
    }
    create_error_response(err.status_code(), err.user_message())
}

/// Creates a standardized plain text error response.
///
/// # Example
///
/// ```
/// use inspectgate_core::request_handler::create_error_response;
/// use hyper::StatusCode;
///
/// let response = create_error_response(StatusCode::BAD_GATEWAY, "Bad gateway");
/// assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
/// ```
pub fn create_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}
