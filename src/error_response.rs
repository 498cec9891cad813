use hyper::{Body, Response, StatusCode};
use log::{error, warn};
use std::error::Error;

pub fn handle_bad_gateway<E: Error>(error: E) -> Response<Body> {
  error!("{}", error);
  bad_gateway()
}

pub fn bad_gateway() -> Response<Body> {
  status_response(StatusCode::BAD_GATEWAY)
}

pub fn handle_service_unavailable<E: Error>(error: E) -> Response<Body> {
  warn!("{}", error);
  service_unavailable()
}

pub fn service_unavailable() -> Response<Body> {
  status_response(StatusCode::SERVICE_UNAVAILABLE)
}

fn status_response(status: StatusCode) -> Response<Body> {
  let mut response = Response::new(Body::empty());
  *response.status_mut() = status;
  response
}
