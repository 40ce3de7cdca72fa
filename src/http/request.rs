use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::session::SessionStore;

/// HTTP request methods.
///
/// Methods outside the common set are kept verbatim in `Other`, so method
/// filtering can answer them with 405 instead of the transport rejecting them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
    Other(String),
}

impl Method {
    /// Parses an HTTP method token. Matching is case-sensitive.
    ///
    /// Returns `None` only when `s` is not a valid token.
    ///
    /// # Example
    ///
    /// ```
    /// # use ice_server::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("TRACE"), Some(Method::Other("TRACE".to_string())));
    /// assert_eq!(Method::from_str("GE T"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let method = match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other if is_token(other) => Method::Other(other.to_string()),
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Other(token) => token,
        }
    }
}

// RFC 9110 `token`
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of one in-flight exchange, handed to handlers.
///
/// Only the session accessors mutate anything, and they go through the
/// server's [`SessionStore`].
#[derive(Debug)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Path plus optional query, as sent by the client
    pub uri: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Headers in arrival order; duplicates are kept
    pub headers: Vec<(String, String)>,
    body: Option<Bytes>,
    remote_addr: String,
    params: HashMap<String, String>,
    session: Option<SessionBinding>,
}

#[derive(Debug)]
struct SessionBinding {
    store: Arc<SessionStore>,
    current: Mutex<Option<String>>,
}

/// Builder for constructing Request objects.
#[derive(Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    uri: Option<String>,
    version: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    remote_addr: Option<String>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            uri: self.uri.ok_or("uri missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body.filter(|b| !b.is_empty()),
            remote_addr: self.remote_addr.unwrap_or_default(),
            params: HashMap::new(),
            session: None,
        })
    }
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// The path portion of the URI, without the query string.
    pub fn path(&self) -> &str {
        self.uri
            .split_once('?')
            .map_or(self.uri.as_str(), |(path, _)| path)
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// First header whose name matches `key` exactly.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Whether the connection should remain open after the response.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is sent.
    pub fn keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) => !v.eq_ignore_ascii_case("close"),
            None => self.version != "HTTP/1.0",
        }
    }

    /// The body, or `None` when absent or empty.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Value of a `:name` segment captured by the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Value of cookie `key` from the `Cookie` headers.
    pub fn cookie(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k == "Cookie")
            .flat_map(|(_, v)| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_remote_addr(&mut self, addr: impl Into<String>) {
        self.remote_addr = addr.into();
    }

    pub(crate) fn discard_body(&mut self) {
        self.body = None;
    }

    /// Makes the session accessors operate on `store`.
    pub fn attach_sessions(&mut self, store: Arc<SessionStore>) {
        self.session = Some(SessionBinding {
            store,
            current: Mutex::new(None),
        });
    }

    /// Binds this request to session `id` if it is live.
    pub fn load_session(&self, id: &str) -> bool {
        let Some(binding) = &self.session else {
            return false;
        };
        if binding.store.load(id) {
            *binding.current.lock() = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Creates a fresh session and binds this request to it.
    ///
    /// Returns `None` when no session store is attached.
    pub fn create_session(&self) -> Option<String> {
        let binding = self.session.as_ref()?;
        let id = binding.store.create();
        *binding.current.lock() = Some(id.clone());
        Some(id)
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.as_ref()?.current.lock().clone()
    }

    /// Item `key` of the bound session. A missing or expired session reads as `None`.
    pub fn session_item(&self, key: &str) -> Option<String> {
        let binding = self.session.as_ref()?;
        let id = binding.current.lock().clone()?;
        binding.store.get_item(&id, key)
    }

    /// Returns `false` when no live session is bound.
    pub fn set_session_item(&self, key: &str, value: &str) -> bool {
        let Some(binding) = &self.session else {
            return false;
        };
        let Some(id) = binding.current.lock().clone() else {
            return false;
        };
        binding.store.set_item(&id, key, value)
    }

    pub fn remove_session_item(&self, key: &str) -> Option<String> {
        let binding = self.session.as_ref()?;
        let id = binding.current.lock().clone()?;
        binding.store.remove_item(&id, key)
    }
}
