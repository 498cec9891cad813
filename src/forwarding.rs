use hyper::{
  header::{HeaderValue, CONNECTION, HOST},
  http::{self, uri::Authority},
  Body, HeaderMap, Request, Uri, Version,
};
use std::net::SocketAddr;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Headers that only describe the connection they arrived on and must not be relayed.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
  "connection",
  "keep-alive",
  "proxy-connection",
  "proxy-authenticate",
  "proxy-authorization",
  "te",
  "trailer",
  "transfer-encoding",
  "upgrade",
];

/// Turns an inbound client request into the request sent to `backend_uri`.
///
/// The body is moved over untouched, so it is streamed to the backend as it arrives.
pub fn backend_request(
  request: Request<Body>,
  backend_uri: &Uri,
  client_address: &SocketAddr,
) -> Result<Request<Body>, http::Error> {
  let (mut parts, body) = request.into_parts();

  let original_host = parts
    .headers
    .get(HOST)
    .cloned()
    .or_else(|| parts.uri.authority().and_then(|a| HeaderValue::from_str(a.as_str()).ok()));

  strip_hop_by_hop(&mut parts.headers);
  append_forwarded_for(&mut parts.headers, client_address)?;
  if let Some(original_host) = original_host {
    parts.headers.insert(X_FORWARDED_HOST, original_host);
  }
  parts.headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

  let authority = backend_uri.authority().map(Authority::as_str).unwrap_or_default();
  parts.headers.insert(HOST, HeaderValue::from_str(authority)?);
  parts.uri = target_uri(backend_uri, &parts.uri)?;
  // the upstream connection negotiates its own protocol version
  parts.version = Version::HTTP_11;

  Ok(Request::from_parts(parts, body))
}

/// Removes the hop-by-hop headers, including any named in the `Connection` header.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
  let listed: Vec<String> = headers
    .get_all(CONNECTION)
    .iter()
    .filter_map(|value| value.to_str().ok())
    .flat_map(|value| value.split(','))
    .map(|name| name.trim().to_ascii_lowercase())
    .filter(|name| !name.is_empty())
    .collect();

  for name in &listed {
    headers.remove(name.as_str());
  }
  for name in HOP_BY_HOP_HEADERS {
    headers.remove(name);
  }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_address: &SocketAddr) -> Result<(), http::Error> {
  let client_ip = client_address.ip().to_string();
  let prior: Vec<&str> = headers
    .get_all(X_FORWARDED_FOR)
    .iter()
    .filter_map(|value| value.to_str().ok())
    .collect();

  let forwarded_for = if prior.is_empty() {
    client_ip
  } else {
    format!("{}, {}", prior.join(", "), client_ip)
  };
  headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(&forwarded_for)?);
  Ok(())
}

/// Places the path of `request_uri` below the path of `backend_uri` and merges both queries.
fn target_uri(backend_uri: &Uri, request_uri: &Uri) -> Result<Uri, http::Error> {
  let path = join_paths(backend_uri.path(), request_uri.path());
  let queries: Vec<&str> = [backend_uri.query(), request_uri.query()]
    .into_iter()
    .flatten()
    .filter(|query| !query.is_empty())
    .collect();
  let path_and_query = if queries.is_empty() {
    path
  } else {
    format!("{}?{}", path, queries.join("&"))
  };

  Uri::builder()
    .scheme(backend_uri.scheme_str().unwrap_or("http"))
    .authority(backend_uri.authority().map(Authority::as_str).unwrap_or_default())
    .path_and_query(path_and_query)
    .build()
}

fn join_paths(base: &str, path: &str) -> String {
  match (base.ends_with('/'), path.starts_with('/')) {
    (true, true) => format!("{}{}", base, &path[1..]),
    (false, false) => format!("{}/{}", base, path),
    _ => format!("{}{}", base, path),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client_address() -> SocketAddr {
    "192.168.0.4:3000".parse().unwrap()
  }

  #[test]
  fn join_paths_uses_single_slash() {
    assert_eq!(join_paths("/", "/"), "/");
    assert_eq!(join_paths("/", "/users"), "/users");
    assert_eq!(join_paths("/api/", "/users"), "/api/users");
    assert_eq!(join_paths("/api", "/users"), "/api/users");
    assert_eq!(join_paths("/api", "users"), "/api/users");
  }

  #[test]
  fn target_uri_keeps_request_path_and_query() {
    let backend: Uri = "https://www.example.com/".parse().unwrap();
    let request: Uri = "/search?q=rust".parse().unwrap();

    assert_eq!(
      target_uri(&backend, &request).unwrap(),
      "https://www.example.com/search?q=rust".parse::<Uri>().unwrap()
    );
  }

  #[test]
  fn target_uri_merges_backend_path_and_query() {
    let backend: Uri = "http://127.0.0.1:8084/api?token=abc".parse().unwrap();
    let request: Uri = "/users?page=2".parse().unwrap();

    assert_eq!(
      target_uri(&backend, &request).unwrap().to_string(),
      "http://127.0.0.1:8084/api/users?token=abc&page=2"
    );
  }

  #[test]
  fn strip_hop_by_hop_removes_connection_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, "keep-alive, X-Session".parse().unwrap());
    headers.insert("keep-alive", "timeout=5".parse().unwrap());
    headers.insert("x-session", "42".parse().unwrap());
    headers.insert("upgrade", "websocket".parse().unwrap());
    headers.insert("accept", "*/*".parse().unwrap());

    strip_hop_by_hop(&mut headers);

    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get("accept").unwrap(), "*/*");
  }

  #[test]
  fn backend_request_rewrites_target_and_headers() {
    let request = Request::builder()
      .method("POST")
      .uri("/orders?id=7")
      .header(HOST, "shop.localhost")
      .header("authorization", "Bearer secret")
      .header(CONNECTION, "close")
      .body(Body::empty())
      .unwrap();
    let backend: Uri = "http://127.0.0.1:8085/".parse().unwrap();

    let forwarded = backend_request(request, &backend, &client_address()).unwrap();

    assert_eq!(forwarded.method(), "POST");
    assert_eq!(forwarded.uri().to_string(), "http://127.0.0.1:8085/orders?id=7");
    assert_eq!(forwarded.headers().get(HOST).unwrap(), "127.0.0.1:8085");
    assert_eq!(forwarded.headers().get(X_FORWARDED_HOST).unwrap(), "shop.localhost");
    assert_eq!(forwarded.headers().get(X_FORWARDED_FOR).unwrap(), "192.168.0.4");
    assert_eq!(forwarded.headers().get(X_FORWARDED_PROTO).unwrap(), "http");
    assert_eq!(forwarded.headers().get("authorization").unwrap(), "Bearer secret");
    assert!(forwarded.headers().get(CONNECTION).is_none());
  }

  #[test]
  fn backend_request_appends_to_existing_forwarded_for() {
    let request = Request::builder()
      .uri("/")
      .header(X_FORWARDED_FOR, "10.0.0.1")
      .body(Body::empty())
      .unwrap();
    let backend: Uri = "http://127.0.0.1:8085/".parse().unwrap();

    let forwarded = backend_request(request, &backend, &client_address()).unwrap();

    assert_eq!(
      forwarded.headers().get(X_FORWARDED_FOR).unwrap(),
      "10.0.0.1, 192.168.0.4"
    );
  }
}
