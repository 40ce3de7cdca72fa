//! Path routing.
//!
//! Endpoints are matched on path only. Method filtering is a registration
//! policy layered on top (see [`crate::server::Server::route`]).

use std::collections::HashMap;

use crate::error::RegistrationError;

/// Per-endpoint behaviour switches.
///
/// A fresh value is built for every registration; nothing is shared between
/// endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointFlags {
    /// Expose the request body to the handler.
    pub read_body: bool,
    /// Run the handler inline on the I/O thread.
    pub blocking: bool,
    /// Create a session when the request does not carry a live one.
    pub init_session: bool,
}

impl EndpointFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_body(mut self) -> Self {
        self.read_body = true;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn init_session(mut self) -> Self {
        self.init_session = true;
        self
    }

    /// Sets a flag by its wire name.
    pub fn set_flag(&mut self, name: &str, value: bool) -> Result<(), RegistrationError> {
        match name {
            "read_body" => self.read_body = value,
            "blocking" => self.blocking = value,
            "init_session" => self.init_session = value,
            other => return Err(RegistrationError::UnknownFlag(other.to_string())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Dense id assigned in registration order, starting at 0.
    pub id: usize,
    pub pattern: String,
    pub flags: EndpointFlags,
}

#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub endpoint: &'a Endpoint,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
}

#[derive(Debug)]
struct RouteEntry {
    endpoint: Endpoint,
    pattern: PathPattern,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers `pattern` and assigns the next sequential id.
    ///
    /// Two patterns conflict when they have the same shape: the same number of
    /// segments, equal static segments and captures in the same positions.
    /// Overlaps such as `/a/:x` and `/a/b` are allowed; the first registered
    /// wins at match time.
    pub fn add_endpoint(
        &mut self,
        pattern: &str,
        flags: EndpointFlags,
    ) -> Result<Endpoint, RegistrationError> {
        let parsed = PathPattern::parse(pattern)?;

        if let Some(existing) = self.routes.iter().find(|r| r.pattern.same_shape(&parsed)) {
            return Err(RegistrationError::DuplicatePattern {
                pattern: pattern.to_string(),
                existing: existing.endpoint.pattern.clone(),
                existing_id: existing.endpoint.id,
            });
        }

        let endpoint = Endpoint {
            id: self.routes.len(),
            pattern: pattern.to_string(),
            flags,
        };
        tracing::info!(endpoint_id = endpoint.id, path = %pattern, "Endpoint registered");

        self.routes.push(RouteEntry {
            endpoint: endpoint.clone(),
            pattern: parsed,
        });
        Ok(endpoint)
    }

    /// Resolves `uri` (path plus optional query) to exactly one endpoint.
    ///
    /// `method` does not take part in matching.
    pub fn match_route(&self, _method: &str, uri: &str) -> Option<RouteMatch<'_>> {
        let path = uri.split_once('?').map_or(uri, |(path, _)| path);
        let segments = split_segments(path);

        self.routes.iter().find_map(|route| {
            route.pattern.matches(&segments).map(|params| RouteMatch {
                endpoint: &route.endpoint,
                params,
            })
        })
    }

    pub fn endpoint(&self, id: usize) -> Option<&Endpoint> {
        self.routes.get(id).map(|r| &r.endpoint)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

#[derive(Debug, Clone)]
struct PathPattern {
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone)]
enum PathSegment {
    Static(String),
    Capture(String),
}

impl PathPattern {
    fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        for segment in split_segments(pattern) {
            match segment.strip_prefix(':') {
                Some("") => return Err(invalid("capture name cannot be empty")),
                Some(name) => segments.push(PathSegment::Capture(name.to_string())),
                None => segments.push(PathSegment::Static(segment.to_string())),
            }
        }
        Ok(Self { segments })
    }

    fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (PathSegment::Static(a), PathSegment::Static(b)) => a == b,
                    (PathSegment::Capture(_), PathSegment::Capture(_)) => true,
                    _ => false,
                })
    }

    fn matches(&self, segments: &[&str]) -> Option<HashMap<String, String>> {
        if segments.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (pattern_segment, actual) in self.segments.iter().zip(segments) {
            match pattern_segment {
                PathSegment::Static(value) if value == actual => {}
                PathSegment::Static(_) => return None,
                PathSegment::Capture(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_segments_are_extracted() {
        let pattern = PathPattern::parse("/users/:id").unwrap();
        let params = pattern.matches(&["users", "42"]).unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn static_mismatch_is_rejected() {
        let pattern = PathPattern::parse("/users/:id").unwrap();
        assert!(pattern.matches(&["accounts", "42"]).is_none());
    }

    #[test]
    fn capture_names_do_not_affect_shape() {
        let a = PathPattern::parse("/users/:id").unwrap();
        let b = PathPattern::parse("/users/:name").unwrap();
        assert!(a.same_shape(&b));
    }
}
