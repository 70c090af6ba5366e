//! Cacheable GET/HEAD requests.

use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use axum::response::Response;
use stalegate_core::CacheKey;

use crate::error::ResponseError;
use crate::handler::AppState;
use crate::headers::{self, compose};
use crate::revalidate::Served;

pub async fn serve(state: &AppState, request: Request) -> Result<Response, ResponseError> {
    let head = request.method() == Method::HEAD;
    let key = CacheKey::new(request.method(), request.uri().path(), request.uri().query());

    let served = state.engine.handle(&key, &state.origins, &state.config.ttl).await?;

    Ok(render(served, head))
}

/// Build the final response. HEAD responses keep headers and drop the body.
fn render(served: Served, head: bool) -> Response {
    let body = if head { Body::empty() } else { Body::from(served.body) };

    let mut response = Response::new(body);
    *response.status_mut() = served.status;
    *response.headers_mut() = compose(&served.headers, headers::standard(), &served.diagnostics);
    response
}
