//! Rate limiting middleware for HTTP requests.

use std::{
    fmt::Display,
    future::Future,
    net::{IpAddr, SocketAddr},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, extract::ConnectInfo};
use http::{Request, Response, StatusCode, header};
use rate_limit::{Decision, RateLimiter, Signature};
use tower::Layer;

/// Layer applying per-signature rate limiting to every wrapped route.
#[derive(Clone)]
pub struct RateLimitLayer(Arc<RateLimiter>);

impl RateLimitLayer {
    /// Wrap routes with the given limiter.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self(limiter)
    }
}

impl<Service> Layer<Service> for RateLimitLayer
where
    Service: Send + Clone,
{
    type Service = RateLimitService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        RateLimitService {
            next,
            limiter: self.0.clone(),
        }
    }
}

/// Middleware evaluating one admission decision per inbound request.
#[derive(Clone)]
pub struct RateLimitService<Service> {
    next: Service,
    limiter: Arc<RateLimiter>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for RateLimitService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let signature = resolve_signature(&req);

            let decision = match limiter.check(&signature).await {
                Ok(decision) => decision,
                Err(err) => {
                    // Fail closed: a store outage must surface, not silently
                    // admit or reject traffic.
                    log::error!("Rate limit store failure: {err}");

                    return Ok(store_failure_response());
                }
            };

            if !decision.allowed {
                log::debug!("Request {signature} rejected, quota of {} exhausted", decision.limit);

                return Ok(too_many_attempts_response(&decision));
            }

            // The downstream response is passed through untouched apart from
            // the quota headers.
            let mut response = next.call(req).await?;

            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", decision.limit.into());
            headers.insert("x-ratelimit-remaining", decision.remaining.into());

            Ok(response)
        })
    }
}

/// Derive the request signature from method, host, path and client address.
///
/// A missing `Host` header or undeterminable client address contributes an
/// empty string; the request is still throttled under the remaining fields.
fn resolve_signature<B>(req: &Request<B>) -> Signature {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let client_addr = extract_client_ip(req).map(|ip| ip.to_string()).unwrap_or_default();

    Signature::resolve(req.method().as_str(), host, req.uri().path(), &client_addr)
}

/// Extract client IP address from request.
fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    // First try to get from ConnectInfo (direct connection)
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    // Try X-Forwarded-For header (for proxied requests)
    if let Some(forwarded_for) = req.headers().get("x-forwarded-for") {
        let value = forwarded_for.to_str().ok()?;

        // Take the first IP in the chain
        let ip_str = value.split(',').next()?;

        return ip_str.trim().parse::<IpAddr>().ok();
    }

    // Try X-Real-IP header
    let ip_str = req.headers().get("x-real-ip")?.to_str().ok()?;

    ip_str.parse::<IpAddr>().ok()
}

fn too_many_attempts_response(decision: &Decision) -> Response<Body> {
    let retry_after = decision.retry_after.unwrap_or_default().as_secs();

    let body = serde_json::json!({
        "error": "Too Many Attempts",
        "message": "Too many requests. Please try again later.",
        "retry_after": retry_after,
        "max_attempts": decision.limit,
    });

    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::RETRY_AFTER, retry_after)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn store_failure_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("Internal server error"))
        .unwrap()
}
