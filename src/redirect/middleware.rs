use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// When the redirect router first saw the request.
#[derive(Copy, Clone)]
pub struct RequestStart(pub Instant);

impl RequestStart {
    pub fn elapsed_ms(self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

pub async fn record_request_start(mut request: Request<Body>, next: Next) -> Response {
    request
        .extensions_mut()
        .insert(RequestStart(Instant::now()));
    next.run(request).await
}
