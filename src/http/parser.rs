use crate::http::decode::{
    decode_form_body, decode_query, is_json_media_type, is_multipart_media_type, parse_cookies,
};
use crate::http::multipart::{boundary_from_content_type, decode_multipart};
use crate::http::request::{CookieSet, HeaderMap, HttpRequest, Method, RequestBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The header section is not terminated yet; read more bytes.
    Incomplete,
    MalformedRequestLine,
    InvalidMethod(String),
    InvalidHeader,
    InvalidContentLength,
    HeadTooLarge,
    BodyTooLarge,
    MalformedMultipart(&'static str),
    /// The peer closed the stream in the middle of a request.
    UnexpectedEof,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "incomplete request"),
            ParseError::MalformedRequestLine => write!(f, "malformed request line"),
            ParseError::InvalidMethod(m) => write!(f, "unsupported method: {}", m),
            ParseError::InvalidHeader => write!(f, "malformed header line"),
            ParseError::InvalidContentLength => write!(f, "invalid content-length"),
            ParseError::HeadTooLarge => write!(f, "request head too large"),
            ParseError::BodyTooLarge => write!(f, "request body too large"),
            ParseError::MalformedMultipart(reason) => write!(f, "malformed multipart: {}", reason),
            ParseError::UnexpectedEof => write!(f, "connection closed mid-request"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Knobs for how request text is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Percent-decode query and form keys/values.
    pub percent_decode: bool,
    /// Lower-case the path portion of the request target.
    pub lowercase_path: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            percent_decode: false,
            lowercase_path: true,
        }
    }
}

/// Request line and headers, before any body has been read.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    /// Text after `?`, empty when the target had none
    pub query: String,
    pub version: String,
    pub headers: HeaderMap,
    pub cookies: CookieSet,
}

impl RequestHead {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }
}

/// How the body following a head is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body is read for this request.
    None,
    /// Exactly this many bytes, from `content-length`.
    Length(usize),
    /// Everything until the peer stops sending and closes.
    UntilClose,
}

/// Parses the request line and headers from the start of `buf`.
///
/// Returns the head and the number of bytes it occupied, so the caller can treat
/// the rest of the buffer as the start of the body. The header section ends at the
/// first empty or all-whitespace line; both CRLF and bare LF endings are accepted.
pub fn parse_head(buf: &[u8], options: &ParseOptions) -> Result<(RequestHead, usize), ParseError> {
    let mut lines = Vec::new();
    let mut offset = 0;
    let mut consumed = None;

    while let Some(pos) = buf[offset..].iter().position(|b| *b == b'\n') {
        let line = &buf[offset..offset + pos];
        offset += pos + 1;

        if !lines.is_empty() && line.iter().all(u8::is_ascii_whitespace) {
            consumed = Some(offset);
            break;
        }
        lines.push(line);
    }

    let consumed = consumed.ok_or(ParseError::Incomplete)?;
    let mut lines = lines.into_iter();

    // Request line
    let request_line = lines
        .next()
        .and_then(|l| std::str::from_utf8(l).ok())
        .ok_or(ParseError::MalformedRequestLine)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::MalformedRequestLine)?;
    let target = parts.next().ok_or(ParseError::MalformedRequestLine)?;
    let version = parts.next().unwrap_or("HTTP/1.1");

    let method = Method::from_str(&method_str.to_ascii_uppercase())
        .ok_or_else(|| ParseError::InvalidMethod(method_str.to_string()))?;

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    let path = if options.lowercase_path {
        path.to_ascii_lowercase()
    } else {
        path.to_string()
    };

    // Headers
    let mut headers = HeaderMap::new();
    let mut cookies = CookieSet::new();

    for line in lines {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidHeader)?;
        let (key, value) = line
            .split_once(": ")
            .or_else(|| line.split_once(':'))
            .ok_or(ParseError::InvalidHeader)?;

        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        if key == "cookie" {
            for cookie in parse_cookies(value).iter() {
                cookies.insert(cookie.clone());
            }
            continue;
        }

        headers.insert(key, value.to_string());
    }

    let head = RequestHead {
        method,
        path,
        query: query.to_string(),
        version: version.to_string(),
        headers,
        cookies,
    };

    Ok((head, consumed))
}

/// Decides whether and how much body follows `head`.
///
/// A body is read for POST and PUT, and for any request declaring a JSON content
/// type. `content-length` is honoured when present; otherwise the body runs until
/// the peer closes its side.
pub fn body_framing(head: &RequestHead) -> Result<BodyFraming, ParseError> {
    if !head.method.carries_body() && !is_json_media_type(head.content_type()) {
        return Ok(BodyFraming::None);
    }

    match head.header("content-length") {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map(BodyFraming::Length)
            .map_err(|_| ParseError::InvalidContentLength),
        None => Ok(BodyFraming::UntilClose),
    }
}

/// Builds the final request from a parsed head and its body bytes.
///
/// The body is interpreted by content type: JSON is kept verbatim, multipart is
/// split into attributes and files, anything else is decoded as a form.
pub fn assemble_request(
    head: RequestHead,
    body: Option<&[u8]>,
    options: &ParseOptions,
) -> Result<HttpRequest, ParseError> {
    let parameters = decode_query(&head.query, options.percent_decode);
    let content_type = head.content_type().to_string();

    let mut builder = RequestBuilder::new()
        .method(head.method)
        .path(head.path)
        .version(head.version)
        .parameters(parameters)
        .cookies(head.cookies)
        .headers(head.headers);

    if let Some(body) = body {
        if is_json_media_type(&content_type) {
            builder = builder.json(String::from_utf8_lossy(body).into_owned());
        } else if is_multipart_media_type(&content_type) {
            let delimiter = boundary_from_content_type(&content_type)?;
            let form = decode_multipart(body, &delimiter)?;
            builder = builder.attributes(form.fields).files(form.files);
        } else {
            let text = String::from_utf8_lossy(body);
            builder = builder.attributes(decode_form_body(&text, options.percent_decode));
        }
    }

    builder.build().map_err(|_| ParseError::MalformedRequestLine)
}

/// Parses a complete request held in `buf`.
///
/// When the request has a body without `content-length`, everything after the
/// head is taken as the body, so the buffer must already hold the whole message.
pub fn parse_http_request(
    buf: &[u8],
    options: &ParseOptions,
) -> Result<(HttpRequest, usize), ParseError> {
    let (head, headers_end) = parse_head(buf, options)?;
    let rest = &buf[headers_end..];

    let (body, body_len) = match body_framing(&head)? {
        BodyFraming::None => (None, 0),
        BodyFraming::Length(n) => {
            if rest.len() < n {
                return Err(ParseError::Incomplete);
            }
            (Some(&rest[..n]), n)
        }
        BodyFraming::UntilClose => (Some(rest), rest.len()),
    };

    let request = assemble_request(head, body, options)?;
    Ok((request, headers_end + body_len))
}
