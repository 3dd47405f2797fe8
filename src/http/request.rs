use std::collections::{HashMap, HashSet};

use crate::http::decode::is_json_media_type;

/// Lower-cased header name to its (last seen) value.
pub type HeaderMap = HashMap<String, String>;

/// Decoded query key to its value. `None` when the key appeared without `=`.
pub type ParameterMap = HashMap<String, Option<String>>;

/// Values decoded from a form or multipart body. Same shape as [`ParameterMap`].
pub type AttributeMap = HashMap<String, Option<String>>;

/// HTTP request methods.
///
/// Any token outside this set fails parsing. Whether a known method is actually
/// served is decided later by the dispatcher's method policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// Matching is case-sensitive; the parser upper-cases the token first.
    ///
    /// ```
    /// # use skiff::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }

    /// Whether the parser should read a body for this method regardless of content type.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::POST | Method::PUT)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `name=value` pair from the `cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Cookies sent with a request. Kept apart from the header map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet {
    cookies: HashSet<Cookie>,
}

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie);
    }

    /// Value of the first cookie with the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }
}

impl FromIterator<Cookie> for CookieSet {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        Self {
            cookies: iter.into_iter().collect(),
        }
    }
}

/// A file uploaded through a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    /// Form field the file was sent under
    pub field_name: String,
    /// Filename as declared by the client
    pub filename: String,
    /// Declared MIME type of the payload
    pub content_type: String,
    /// Raw payload bytes
    pub data: Vec<u8>,
}

/// A fully parsed HTTP request.
///
/// Built once per connection by the parser and read-only afterwards: handlers only
/// get accessors. Header names are stored lower-cased, and the `cookie` header is
/// never present in [`headers`](Self::headers); see [`cookies`](Self::cookies).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    version: String,
    headers: HeaderMap,
    parameters: ParameterMap,
    attributes: AttributeMap,
    json: Option<String>,
    cookies: CookieSet,
    files: Option<HashMap<String, MultipartFile>>,
}

impl HttpRequest {
    pub fn method(&self) -> Method {
        self.method
    }

    /// Request path with the query string removed.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Retrieves a header value by name. Lookup is case-insensitive.
    pub fn header(&self, key: &str) -> Option<&str> {
        match self.headers.get(key) {
            Some(v) => Some(v.as_str()),
            None => self
                .headers
                .get(&key.to_ascii_lowercase())
                .map(|v| v.as_str()),
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// True when the declared content type is `application/json`.
    pub fn is_json(&self) -> bool {
        self.content_type().map(is_json_media_type).unwrap_or(false)
    }

    /// Query parameter value. Returns `None` both for missing keys and for keys
    /// sent without a value; use [`parameters`](Self::parameters) to tell them apart.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_deref())
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_deref())
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Raw JSON body, untouched. Only present for `application/json` requests.
    pub fn json(&self) -> Option<&str> {
        self.json.as_deref()
    }

    pub fn cookies(&self) -> &CookieSet {
        &self.cookies
    }

    /// Uploaded files keyed by field name. `None` unless the body was multipart.
    pub fn files(&self) -> Option<&HashMap<String, MultipartFile>> {
        self.files.as_ref()
    }

    pub fn file(&self, field: &str) -> Option<&MultipartFile> {
        self.files.as_ref().and_then(|f| f.get(field))
    }
}

/// Builder for constructing [`HttpRequest`] objects.
///
/// Used by the parser once all pieces are decoded, and by tests and handlers that
/// need a request without going through the wire format.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: HeaderMap,
    parameters: ParameterMap,
    attributes: AttributeMap,
    json: Option<String>,
    cookies: CookieSet,
    files: Option<HashMap<String, MultipartFile>>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a header. Names are lower-cased; a `cookie` header is routed into
    /// the cookie set instead.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        if key == "cookie" {
            for cookie in crate::http::decode::parse_cookies(&value).iter() {
                self.cookies.insert(cookie.clone());
            }
        } else {
            self.headers.insert(key, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.parameters.insert(key.into(), value.map(str::to_string));
        self
    }

    pub fn parameters(mut self, parameters: ParameterMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes.insert(key.into(), value.map(str::to_string));
        self
    }

    pub fn attributes(mut self, attributes: AttributeMap) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }

    pub fn cookies(mut self, cookies: CookieSet) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn files(mut self, files: HashMap<String, MultipartFile>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn build(self) -> Result<HttpRequest, &'static str> {
        Ok(HttpRequest {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            parameters: self.parameters,
            attributes: self.attributes,
            json: self.json,
            cookies: self.cookies,
            files: self.files,
        })
    }
}
