use crate::error::ResponseError;

/// Returns the standard reason phrase for `status`.
///
/// # Example
///
/// ```
/// # use ice_server::http::response::reason_phrase;
/// assert_eq!(reason_phrase(200), "OK");
/// assert_eq!(reason_phrase(404), "Not Found");
/// ```
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        100..=199 => "Informational",
        200..=299 => "Success",
        300..=399 => "Redirection",
        400..=499 => "Client Error",
        _ => "Server Error",
    }
}

fn check_status(status: u16) -> Result<u16, ResponseError> {
    if (100..=599).contains(&status) {
        Ok(status)
    } else {
        Err(ResponseError::InvalidStatus(status))
    }
}

/// Mutable response built by a handler for one exchange.
///
/// Starts as `200` with no body. Headers keep insertion order and may repeat;
/// cookies are keyed and each becomes one `Set-Cookie` header when written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: None,
            headers: Vec::new(),
            cookies: Vec::new(),
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        let mut resp = Self::new();
        resp.set_body(body);
        resp
    }

    /// Response installed for requests that matched no endpoint.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: Some(b"Not found\n".to_vec()),
            ..Self::default()
        }
    }

    /// Response that replaces whatever a failed handler produced.
    pub fn internal_error(diagnostic: impl std::fmt::Display) -> Self {
        Self {
            status: 500,
            body: Some(format!("Error: {diagnostic}\n").into_bytes()),
            ..Self::default()
        }
    }

    pub(crate) fn transport_error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: Some(format!("{message}\n").into_bytes()),
            ..Self::default()
        }
    }

    pub fn redirect(location: &str, status: u16) -> Result<Self, ResponseError> {
        Self::builder()
            .status(status)
            .header("Location", location)
            .build()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) -> Result<(), ResponseError> {
        self.status = check_status(status)?;
        Ok(())
    }

    /// `None` means no body was set; it is written as zero bytes.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = Some(body.into());
    }

    /// Appends a header. Repeated keys produce repeated header lines.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    /// Replaces every header named `key` with a single line.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.headers.retain(|(k, _)| *k != key);
        self.headers.push((key, value.into()));
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sets cookie `key`, replacing an earlier value for the same key.
    pub fn set_cookie(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.cookies.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.cookies.push((key, value)),
        }
    }

    pub fn cookie(&self, key: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Builder for constructing responses in a fluent style.
///
/// # Example
///
/// ```
/// # use ice_server::http::response::ResponseBuilder;
/// let response = ResponseBuilder::new()
///     .status(201)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build()
///     .unwrap();
/// assert_eq!(response.status(), 201);
/// ```
#[derive(Default)]
pub struct ResponseBuilder {
    status: Option<u16>,
    response: Response,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status is validated by [`ResponseBuilder::build`].
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.add_header(key, value);
        self
    }

    pub fn cookie(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.set_cookie(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.response.set_body(body);
        self
    }

    pub fn build(mut self) -> Result<Response, ResponseError> {
        if let Some(status) = self.status {
            self.response.set_status(status)?;
        }
        Ok(self.response)
    }
}
