//! Native HTTP request and response types.

use std::collections::BTreeMap;

use url::Url;

/// An HTTP request built from an `http` wire value.
///
/// Header names are stored lowercased, so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    /// Route parameters.
    pub params: BTreeMap<String, String>,
    /// Set only when the host sent the raw body as a string.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Returns the first value of the named query parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Returns the header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the named value of an `application/x-www-form-urlencoded` body.
    pub fn form_value(&self, name: &str) -> Option<String> {
        let body = self.body.as_deref()?;
        url::form_urlencoded::parse(body.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// An HTTP response written by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Builder: append a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Builder: set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends a value to the named header.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, body: Option<&str>) -> HttpRequest {
        HttpRequest {
            method: "POST".into(),
            url: Url::parse(url).unwrap(),
            headers: BTreeMap::from([("content-type".to_string(), "text/plain".to_string())]),
            params: BTreeMap::new(),
            body: body.map(str::to_string),
        }
    }

    #[test]
    fn query_and_form_values() {
        let req = request(
            "https://example.org/api/login?name=testuser",
            Some("password=secretPassword"),
        );
        assert_eq!(req.query("name").as_deref(), Some("testuser"));
        assert_eq!(req.query("missing"), None);
        assert_eq!(req.form_value("password").as_deref(), Some("secretPassword"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = request("https://example.org/", None);
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
        assert!(req.form_value("password").is_none());
    }

    #[test]
    fn response_defaults_and_headers() {
        let resp = HttpResponse::default()
            .with_header("x-tag", "a")
            .with_header("x-tag", "b")
            .with_body("ok");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers["x-tag"], vec!["a", "b"]);
        assert_eq!(resp.body, "ok");
    }
}
