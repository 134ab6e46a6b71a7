//! Tower integration of the [`PaymentGate`].
//!
//! `PaymentGate` is itself a [`Layer`], so it can wrap an axum `Router`
//! directly:
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/premium", get(premium))
//!     .layer(PaymentGate::new(config));
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::v1_osmosis_exact::X_PAYMENT;
use crate::v1_osmosis_exact::gate::{GateDecision, PaymentGate};

impl<S> Layer<S> for PaymentGate {
    type Service = PaymentGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGateService {
            gate: self.clone(),
            inner,
        }
    }
}

/// Service produced by layering a [`PaymentGate`] over `S`.
#[derive(Debug, Clone)]
pub struct PaymentGateService<S> {
    gate: PaymentGate,
    inner: S,
}

impl<S> Service<Request> for PaymentGateService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // Hand the readied service to the future and keep a fresh clone.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        Box::pin(async move { Ok(handle(gate, inner, request).await) })
    }
}

async fn handle<S>(gate: PaymentGate, mut inner: S, request: Request) -> Response
where
    S: Service<Request, Response = Response, Error = Infallible>,
{
    let path = request.uri().path();
    if !gate.guards(path) {
        return forward(&mut inner, request).await;
    }

    // Request bodies are not Sync, so nothing borrowed from the request may
    // live across the facilitator calls.
    let path = path.to_owned();
    let resource = gate.resource_url(request.uri(), request.headers());
    let payment_header = request.headers().get(X_PAYMENT).cloned();
    let decision = gate
        .evaluate(
            &path,
            &resource,
            payment_header.as_ref().map(HeaderValue::as_bytes),
        )
        .await;

    match decision {
        GateDecision::Passthrough => forward(&mut inner, request).await,
        GateDecision::Reject(rejection) => rejection.into_response(),
        GateDecision::Admit(admission) => {
            let mut response = forward(&mut inner, request).await;
            admission.apply(response.headers_mut());
            response
        }
    }
}

async fn forward<S>(inner: &mut S, request: Request) -> Response
where
    S: Service<Request, Response = Response, Error = Infallible>,
{
    match inner.call(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
