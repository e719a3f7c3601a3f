//! Admission middleware for HTTP request pipelines.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, extract::MatchedPath};
use http::{header, Request, Response, StatusCode};
use serde_json::{Map, Value};
use tower::Layer;

use crate::limit::{Decision, InputRateLimiter, Rejection, RejectionBody};
use crate::request::RequestSnapshot;

/// Tower layer that applies an [`InputRateLimiter`] in front of a service.
///
/// The limiter instance is shared across clones of the wrapped service, so
/// all in-flight requests consume from the same counter store.
///
/// Header names appear in the snapshot in lowercase (the http crate
/// normalizes them on parse), so identifying property paths must use the
/// lowercase form: `headers.x-user-id`, not `headers.X-User-Id`.
#[derive(Clone)]
pub struct AdmissionLayer(Arc<InputRateLimiter>);

impl AdmissionLayer {
    /// Create a new layer around a shared limiter.
    pub fn new(limiter: Arc<InputRateLimiter>) -> Self {
        Self(limiter)
    }
}

impl<Service> Layer<Service> for AdmissionLayer
where
    Service: Send + Clone,
{
    type Service = AdmissionService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AdmissionService {
            next,
            limiter: self.0.clone(),
        }
    }
}

/// Service produced by [`AdmissionLayer`].
#[derive(Clone)]
pub struct AdmissionService<Service> {
    next: Service,
    limiter: Arc<InputRateLimiter>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AdmissionService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
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
            let snapshot = snapshot_from_request(&req);

            match limiter.decide(&snapshot) {
                Decision::Admit => next.call(req).await,
                Decision::Reject(rejection) => Ok(rejection_response(&rejection)),
            }
        })
    }
}

/// Build the decision snapshot from request parts.
///
/// The route is the matched path template when axum has recorded one,
/// otherwise the raw URI path. The data exposes a `headers` subtree (headers
/// with valid UTF-8 values, names lowercased by the http crate) and a
/// `query` subtree parsed from the query string.
fn snapshot_from_request<B>(req: &Request<B>) -> RequestSnapshot {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let mut headers = Map::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_owned(), Value::String(value.to_owned()));
        }
    }

    let mut query = Map::new();
    if let Some(raw) = req.uri().query() {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_default();
        for (name, value) in pairs {
            query.insert(name, Value::String(value));
        }
    }

    let mut data = Map::new();
    data.insert("headers".to_owned(), Value::Object(headers));
    data.insert("query".to_owned(), Value::Object(query));

    RequestSnapshot::new(req.method().as_str(), route, Value::Object(data))
}

/// Convert a rejection into the terminating HTTP response.
fn rejection_response(rejection: &Rejection) -> Response<Body> {
    match rejection {
        Rejection::MissingProperty { .. } => Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(Body::empty())
            .unwrap(),
        Rejection::LimitExceeded { .. } => {
            let body = serde_json::to_vec(&RejectionBody::too_many_requests())
                .expect("rejection body serializes");

            Response::builder()
                .status(StatusCode::TOO_MANY_REQUESTS)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap()
        }
    }
}
