//! Block responses.
//!
//! A [`BlockSpec`] says how to answer a blocked transaction. The
//! [`BlockingService`] turns it into a concrete response through a
//! [`BlockingHost`], the seam to whatever server owns the connection:
//!
//! 1. resolve the content type (negotiated from `Accept` when
//!    [`ContentTypePolicy::Auto`]);
//! 2. discard the request body;
//! 3. send status, `Content-Type`, `Content-Length` and optional `Location`;
//! 4. unless header-only, write the template body verbatim;
//! 5. finalize the transaction.
//!
//! Templates are the built-in defaults or operator files read once when the
//! service is built. A process keeps one service in a [`ServiceSlot`].

use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};
use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::defaults;
use crate::error::{InspectError, Result};
use crate::negotiation::{self, ContentType};

/// Body format requested by a [`BlockSpec`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypePolicy {
    /// Negotiate from the request's `Accept` header.
    #[default]
    Auto,
    Html,
    Json,
    /// Header-only response.
    None,
}

impl FromStr for ContentTypePolicy {
    type Err = InspectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            "none" => Ok(Self::None),
            other => Err(InspectError::ConfigError(format!(
                "unknown block content type '{other}' (expected auto, html, json or none)"
            ))),
        }
    }
}

/// How to answer a blocked transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub status: u16,
    pub content_type: ContentTypePolicy,
    pub location: Option<String>,
}

impl Default for BlockSpec {
    fn default() -> Self {
        Self {
            status: defaults::BLOCK_STATUS,
            content_type: ContentTypePolicy::Auto,
            location: None,
        }
    }
}

impl BlockSpec {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: ContentTypePolicy) -> Self {
        self.content_type = content_type;
        self
    }

    /// Redirecting block, e.g. `BlockSpec::new(303).with_location(...)`.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A [`BlockSpec`] with its content type resolved for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockResponse<'s> {
    pub status: u16,
    /// `None` for header-only responses.
    pub content_type: Option<ContentType>,
    pub location: Option<&'s str>,
}

impl<'s> BlockResponse<'s> {
    pub fn calculate_for(spec: &'s BlockSpec, accept: Option<&[u8]>) -> Self {
        let content_type = match spec.content_type {
            ContentTypePolicy::Auto => Some(negotiation::resolve(accept)),
            ContentTypePolicy::Html => Some(ContentType::Html),
            ContentTypePolicy::Json => Some(ContentType::Json),
            ContentTypePolicy::None => None,
        };
        Self {
            status: spec.status,
            content_type,
            location: spec.location.as_deref(),
        }
    }
}

/// Result of a host operation, mirroring how servers finalize requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCode {
    Ok,
    /// The response is complete.
    Done,
    Error,
    /// The host answered with its own status instead.
    Http(u16),
}

/// Response head handed to [`BlockingHost::send_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead<'s> {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub content_length: usize,
    pub location: Option<&'s str>,
}

/// Operations the blocking responder needs from the server.
pub trait BlockingHost {
    /// `Accept` value of the blocked request.
    fn accept(&self) -> Option<&[u8]>;

    fn discard_request_body(&mut self);

    fn send_header(&mut self, head: &ResponseHead<'_>) -> HostCode;

    /// Queues the complete response body.
    fn output_body(&mut self, body: Bytes) -> Result<()>;

    fn finalize(&mut self, code: HostCode);
}

/// Block templates plus the responder logic.
#[derive(Debug, Clone)]
pub struct BlockingService {
    template_html: Bytes,
    template_json: Bytes,
}

impl Default for BlockingService {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockingService {
    /// Service with the built-in templates.
    pub fn new() -> Self {
        Self {
            template_html: Bytes::from_static(defaults::TEMPLATE_HTML.as_bytes()),
            template_json: Bytes::from_static(defaults::TEMPLATE_JSON.as_bytes()),
        }
    }

    /// Service with operator templates where a path is given.
    ///
    /// # Errors
    ///
    /// [`InspectError::TemplateLoad`] if a given file cannot be read. There is
    /// no fallback to the built-in template.
    pub fn from_paths(html: Option<&Path>, json: Option<&Path>) -> Result<Self> {
        let mut service = Self::new();
        if let Some(path) = html {
            service.template_html = load_template(path)?;
        }
        if let Some(path) = json {
            service.template_json = load_template(path)?;
        }
        Ok(service)
    }

    pub fn template(&self, content_type: ContentType) -> &Bytes {
        match content_type {
            ContentType::Html => &self.template_html,
            ContentType::Json => &self.template_json,
        }
    }

    /// Answers the transaction held by `host` according to `spec` and
    /// returns the code the transaction was finalized with.
    pub fn block<H>(&self, spec: &BlockSpec, host: &mut H) -> HostCode
    where
        H: BlockingHost + ?Sized,
    {
        let response = BlockResponse::calculate_for(spec, host.accept());
        let body = response
            .content_type
            .map(|content_type| self.template(content_type).clone());

        info!(
            status = response.status,
            content_type = ?response.content_type,
            location = response.location,
            "Blocking request"
        );

        host.discard_request_body();

        let head = ResponseHead {
            status: response.status,
            content_type: response.content_type.map(ContentType::header_value),
            content_length: body.as_ref().map_or(0, Bytes::len),
            location: response.location,
        };

        let code = host.send_header(&head);
        if code != HostCode::Ok {
            warn!(code = ?code, "Host did not accept block response headers");
            host.finalize(code);
            return code;
        }

        let Some(body) = body else {
            host.finalize(code);
            return code;
        };

        if let Err(err) = host.output_body(body) {
            error!(error = %err, "Failed to write block response body");
            host.finalize(HostCode::Error);
            return HostCode::Error;
        }

        host.finalize(HostCode::Done);
        HostCode::Done
    }
}

fn load_template(path: &Path) -> Result<Bytes> {
    let template = std::fs::read(path).map_err(|source| InspectError::TemplateLoad {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = template.len(), "Loaded block template");
    Ok(Bytes::from(template))
}

// ============================================================================
// Process-wide service
// ============================================================================

/// Holds at most one [`BlockingService`] for the life of the slot.
#[derive(Debug, Default)]
pub struct ServiceSlot {
    cell: OnceCell<BlockingService>,
}

impl ServiceSlot {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Stores `service`.
    ///
    /// # Errors
    ///
    /// [`InspectError::AlreadyInitialized`] if the slot is already filled.
    pub fn initialize(&self, service: BlockingService) -> Result<&BlockingService> {
        self.cell
            .set(service)
            .map_err(|_| InspectError::AlreadyInitialized)?;
        self.get()
    }

    /// # Errors
    ///
    /// [`InspectError::NotInitialized`] before [`initialize`](Self::initialize).
    pub fn get(&self) -> Result<&BlockingService> {
        self.cell.get().ok_or(InspectError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

static SERVICE: ServiceSlot = ServiceSlot::new();

/// Builds the process-wide service from optional template paths.
///
/// # Errors
///
/// [`InspectError::AlreadyInitialized`] on a second call, or
/// [`InspectError::TemplateLoad`] if a template cannot be read.
pub fn initialize(html: Option<&Path>, json: Option<&Path>) -> Result<&'static BlockingService> {
    if SERVICE.is_initialized() {
        return Err(InspectError::AlreadyInitialized);
    }
    SERVICE.initialize(BlockingService::from_paths(html, json)?)
}

/// The process-wide service.
///
/// # Errors
///
/// [`InspectError::NotInitialized`] before [`initialize`].
pub fn instance() -> Result<&'static BlockingService> {
    SERVICE.get()
}

// ============================================================================
// Hyper host
// ============================================================================

/// [`BlockingHost`] that assembles a `hyper` response.
#[derive(Debug)]
pub struct ResponseHost<'r> {
    accept: Option<&'r [u8]>,
    head: Option<(StatusCode, HeaderMap)>,
    body: Bytes,
    body_discarded: bool,
    outcome: Option<HostCode>,
}

impl<'r> ResponseHost<'r> {
    pub fn new(accept: Option<&'r [u8]>) -> Self {
        Self {
            accept,
            head: None,
            body: Bytes::new(),
            body_discarded: false,
            outcome: None,
        }
    }

    pub fn body_discarded(&self) -> bool {
        self.body_discarded
    }

    /// The finished response.
    ///
    /// # Errors
    ///
    /// [`InspectError::HeaderWrite`] if the headers were never sent or the
    /// transaction was finalized with [`HostCode::Error`].
    pub fn into_response(self) -> Result<Response<Full<Bytes>>> {
        match (self.outcome, self.head) {
            (Some(HostCode::Http(status)), _) => {
                let status = StatusCode::from_u16(status)
                    .map_err(|err| InspectError::HeaderWrite(err.to_string()))?;
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = status;
                Ok(response)
            }
            (Some(HostCode::Ok | HostCode::Done), Some((status, headers))) => {
                let mut response = Response::new(Full::new(self.body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                Ok(response)
            }
            (outcome, _) => Err(InspectError::HeaderWrite(format!(
                "block response not completed (outcome: {outcome:?})"
            ))),
        }
    }
}

impl BlockingHost for ResponseHost<'_> {
    fn accept(&self) -> Option<&[u8]> {
        self.accept
    }

    // Records the request only; `handle_request` drops the unread hyper body.
    fn discard_request_body(&mut self) {
        self.body_discarded = true;
    }

    fn send_header(&mut self, head: &ResponseHead<'_>) -> HostCode {
        let Ok(status) = StatusCode::from_u16(head.status) else {
            error!(status = head.status, "Invalid block status");
            return HostCode::Error;
        };

        let mut headers = HeaderMap::new();
        if let Some(content_type) = head.content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(head.content_length));
        if let Some(location) = head.location {
            match HeaderValue::from_str(location) {
                Ok(value) => {
                    headers.insert(header::LOCATION, value);
                }
                Err(_) => {
                    error!(location, "Invalid block redirect location");
                    return HostCode::Error;
                }
            }
        }

        self.head = Some((status, headers));
        HostCode::Ok
    }

    fn output_body(&mut self, body: Bytes) -> Result<()> {
        self.body = body;
        Ok(())
    }

    fn finalize(&mut self, code: HostCode) {
        self.outcome = Some(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io::Write;

    #[derive(Default)]
    struct MockHost {
        accept: Option<&'static [u8]>,
        header_code: Option<HostCode>,
        fail_body: bool,
        discarded: bool,
        head: Option<(u16, Option<&'static str>, usize, Option<String>)>,
        body: Option<Bytes>,
        finalized: Vec<HostCode>,
    }

    impl BlockingHost for MockHost {
        fn accept(&self) -> Option<&[u8]> {
            self.accept
        }

        fn discard_request_body(&mut self) {
            self.discarded = true;
        }

        fn send_header(&mut self, head: &ResponseHead<'_>) -> HostCode {
            self.head = Some((
                head.status,
                head.content_type,
                head.content_length,
                head.location.map(String::from),
            ));
            self.header_code.unwrap_or(HostCode::Ok)
        }

        fn output_body(&mut self, body: Bytes) -> Result<()> {
            if self.fail_body {
                return Err(InspectError::BufferAllocation);
            }
            self.body = Some(body);
            Ok(())
        }

        fn finalize(&mut self, code: HostCode) {
            self.finalized.push(code);
        }
    }

    // ===========================================
    // BlockSpec / BlockResponse tests
    // ===========================================

    #[test]
    fn test_default_spec() {
        let spec = BlockSpec::default();
        assert_eq!(spec.status, 403);
        assert_eq!(spec.content_type, ContentTypePolicy::Auto);
        assert!(spec.location.is_none());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("AUTO".parse::<ContentTypePolicy>().unwrap(), ContentTypePolicy::Auto);
        assert_eq!(" html ".parse::<ContentTypePolicy>().unwrap(), ContentTypePolicy::Html);
        assert_eq!("json".parse::<ContentTypePolicy>().unwrap(), ContentTypePolicy::Json);
        assert_eq!("none".parse::<ContentTypePolicy>().unwrap(), ContentTypePolicy::None);
        assert!(matches!(
            "xml".parse::<ContentTypePolicy>(),
            Err(InspectError::ConfigError(_))
        ));
    }

    #[test]
    fn test_calculate_for_auto_negotiates() {
        let spec = BlockSpec::default();
        let html = BlockResponse::calculate_for(&spec, Some(&b"text/html"[..]));
        assert_eq!(html.content_type, Some(ContentType::Html));
        let json = BlockResponse::calculate_for(&spec, None);
        assert_eq!(json.content_type, Some(ContentType::Json));
    }

    #[test]
    fn test_calculate_for_fixed_policies() {
        let accept = Some(&b"text/html"[..]);
        let spec = BlockSpec::new(451).with_content_type(ContentTypePolicy::Json);
        let response = BlockResponse::calculate_for(&spec, accept);
        assert_eq!(response.status, 451);
        assert_eq!(response.content_type, Some(ContentType::Json));

        let spec = BlockSpec::new(303)
            .with_content_type(ContentTypePolicy::None)
            .with_location("https://example.com/blocked");
        let response = BlockResponse::calculate_for(&spec, accept);
        assert_eq!(response.content_type, None);
        assert_eq!(response.location, Some("https://example.com/blocked"));
    }

    // ===========================================
    // BlockingService::block tests
    // ===========================================

    #[test]
    fn test_json_block_is_byte_exact() {
        let service = BlockingService::new();
        let spec = BlockSpec::default().with_content_type(ContentTypePolicy::Json);
        let mut host = MockHost::default();

        assert_eq!(service.block(&spec, &mut host), HostCode::Done);

        let expected = defaults::TEMPLATE_JSON.as_bytes();
        assert!(host.discarded);
        assert_eq!(
            host.head,
            Some((403, Some("application/json"), expected.len(), None))
        );
        assert_eq!(host.body.as_deref(), Some(expected));
        assert_eq!(host.finalized, vec![HostCode::Done]);
    }

    #[test]
    fn test_auto_block_negotiates_html() {
        let service = BlockingService::new();
        let mut host = MockHost {
            accept: Some(&b"text/html,application/xhtml+xml"[..]),
            ..Default::default()
        };

        service.block(&BlockSpec::default(), &mut host);

        let (_, content_type, length, _) = host.head.clone().unwrap();
        assert_eq!(content_type, Some("text/html;charset=utf-8"));
        assert_eq!(length, defaults::TEMPLATE_HTML.len());
        assert_eq!(host.body.as_deref(), Some(defaults::TEMPLATE_HTML.as_bytes()));
    }

    #[test]
    fn test_header_only_block_with_location() {
        let service = BlockingService::new();
        let spec = BlockSpec::new(302)
            .with_content_type(ContentTypePolicy::None)
            .with_location("/blocked");
        let mut host = MockHost::default();

        assert_eq!(service.block(&spec, &mut host), HostCode::Ok);
        assert_eq!(host.head, Some((302, None, 0, Some("/blocked".to_string()))));
        assert!(host.body.is_none());
        assert_eq!(host.finalized, vec![HostCode::Ok]);
    }

    #[test]
    fn test_header_failure_finalizes_with_host_code() {
        let service = BlockingService::new();
        for code in [HostCode::Error, HostCode::Http(500)] {
            let mut host = MockHost {
                header_code: Some(code),
                ..Default::default()
            };
            assert_eq!(service.block(&BlockSpec::default(), &mut host), code);
            assert!(host.body.is_none());
            assert_eq!(host.finalized, vec![code]);
        }
    }

    #[test]
    fn test_body_failure_finalizes_with_error() {
        let service = BlockingService::new();
        let mut host = MockHost {
            fail_body: true,
            ..Default::default()
        };
        assert_eq!(service.block(&BlockSpec::default(), &mut host), HostCode::Error);
        assert_eq!(host.finalized, vec![HostCode::Error]);
    }

    // ===========================================
    // Template loading tests
    // ===========================================

    #[test]
    fn test_custom_templates_loaded_verbatim() {
        let mut html = tempfile::NamedTempFile::new().unwrap();
        html.write_all(b"<p>custom {{ not templated }}</p>").unwrap();

        let service = BlockingService::from_paths(Some(html.path()), None).unwrap();
        assert_eq!(
            &service.template(ContentType::Html)[..],
            b"<p>custom {{ not templated }}</p>"
        );
        assert_eq!(
            &service.template(ContentType::Json)[..],
            defaults::TEMPLATE_JSON.as_bytes()
        );
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");

        let err = BlockingService::from_paths(None, Some(missing.as_path())).unwrap_err();
        match err {
            InspectError::TemplateLoad { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    // ===========================================
    // ServiceSlot tests
    // ===========================================

    #[test]
    fn test_slot_initializes_once() {
        let slot = ServiceSlot::new();
        assert!(matches!(slot.get(), Err(InspectError::NotInitialized)));

        slot.initialize(BlockingService::new()).unwrap();
        assert!(slot.get().is_ok());
        assert!(matches!(
            slot.initialize(BlockingService::new()),
            Err(InspectError::AlreadyInitialized)
        ));
    }

    // ===========================================
    // ResponseHost tests
    // ===========================================

    #[tokio::test]
    async fn test_response_host_builds_hyper_response() {
        let service = BlockingService::new();
        let mut host = ResponseHost::new(Some(&b"application/json"[..]));
        service.block(&BlockSpec::default(), &mut host);
        assert!(host.body_discarded());

        let response = host.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(
            response.headers()["content-length"],
            defaults::TEMPLATE_JSON.len().to_string().as_str()
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], defaults::TEMPLATE_JSON.as_bytes());
    }

    #[test]
    fn test_response_host_redirect() {
        let service = BlockingService::new();
        let spec = BlockSpec::new(303)
            .with_content_type(ContentTypePolicy::None)
            .with_location("https://example.com/denied");
        let mut host = ResponseHost::new(None);
        service.block(&spec, &mut host);

        let response = host.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "https://example.com/denied");
        assert_eq!(response.headers()["content-length"], "0");
        assert!(response.headers().get("content-type").is_none());
    }

    #[test]
    fn test_response_host_rejects_invalid_location() {
        let service = BlockingService::new();
        let spec = BlockSpec::default().with_location("bad\nvalue");
        let mut host = ResponseHost::new(None);

        assert_eq!(service.block(&spec, &mut host), HostCode::Error);
        assert!(matches!(
            host.into_response(),
            Err(InspectError::HeaderWrite(_))
        ));
    }

    #[test]
    fn test_response_host_rejects_invalid_status() {
        let service = BlockingService::new();
        let mut host = ResponseHost::new(None);
        assert_eq!(service.block(&BlockSpec::new(42), &mut host), HostCode::Error);
    }
}
