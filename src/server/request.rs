use http::Method;
use std::collections::HashMap;

/// Parsed view of an incoming request handed to route handlers.
///
/// Only the pieces handlers in this module actually consume: the query string
/// is split off the path, header names are lowercased.
#[derive(Debug, Clone)]
pub struct RequestCtx {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl RequestCtx {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Build a [`RequestCtx`] from a raw request line and header iterator.
///
/// Shared by the may_minihttp adapter and test code.
pub fn parse_request<'a, I>(method: &str, raw_path: &str, headers: I) -> RequestCtx
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let method = method.parse().unwrap_or(Method::GET);
    let path = raw_path.split('?').next().unwrap_or("/").to_string();
    let headers = headers
        .into_iter()
        .map(|(name, value)| {
            (
                name.to_ascii_lowercase(),
                String::from_utf8_lossy(value).to_string(),
            )
        })
        .collect();

    RequestCtx {
        method,
        path,
        headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_string() {
        let req = parse_request("GET", "/index.html?v=2", std::iter::empty());
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/index.html");
    }

    #[test]
    fn lowercases_header_names() {
        let headers = [("Accept-Encoding", b"gzip".as_slice())];
        let req = parse_request("GET", "/", headers);
        assert_eq!(req.header("accept-encoding"), Some("gzip"));
        assert_eq!(req.header("Accept-Encoding"), Some("gzip"));
    }
}
