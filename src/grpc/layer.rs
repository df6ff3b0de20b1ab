use std::task::{Context as TaskContext, Poll};

use tonic::{codegen::http, metadata::MetadataMap};
use tower::{Layer, Service};
use tracing::{instrument::Instrumented, Instrument};

use super::enricher::Enricher;
use super::interceptors::{enrich_once, BeforeCall};
use crate::context::Context;

/// Server layer enriching every call and running the whole call, handler
/// included, inside the call's span. Install with `Server::builder().layer`.
#[derive(Clone, Debug, Default)]
pub struct RequestIdLayer<B = Enricher> {
    before: B,
}

impl<B> RequestIdLayer<B> {
    pub fn new(before: B) -> Self {
        Self { before }
    }
}

impl<S, B: Clone> Layer<S> for RequestIdLayer<B> {
    type Service = RequestIdService<S, B>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService {
            inner,
            before: self.before.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestIdService<S, B = Enricher> {
    inner: S,
    before: B,
}

impl<S, B, ReqBody> Service<http::Request<ReqBody>> for RequestIdService<S, B>
where
    S: Service<http::Request<ReqBody>>,
    B: BeforeCall,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Instrumented<S::Future>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<ReqBody>) -> Self::Future {
        let metadata = MetadataMap::from_headers(request.headers().clone());
        let ctx = enrich_once(&self.before, request.extensions().get::<Context>(), &metadata);
        let span = ctx.span();
        request.extensions_mut().insert(ctx);
        self.inner.call(request).instrument(span)
    }
}
