use std::future::Future;

use tonic::{
    metadata::{errors::InvalidMetadataKey, AsciiMetadataKey, MetadataMap, MetadataValue},
    service::Interceptor,
    Request, Status,
};
use tracing::{warn, Instrument};

use super::enricher::{Enricher, OPHID_HEADER, REQUEST_ID_HEADER};
use super::layer::RequestIdLayer;
use super::stream::EnrichedStream;
use crate::context::Context;
use crate::id::IdGenerator;

/// Work done once at the start of every call or stream, before the handler.
pub trait BeforeCall {
    fn before_call(&self, ctx: Context) -> Context;
}

impl<G: IdGenerator> BeforeCall for Enricher<G> {
    fn before_call(&self, ctx: Context) -> Context {
        self.enrich(ctx)
    }
}

// marks a context enriched earlier in the same call
struct Enriched;

/// Context for a call, enriched exactly once: a context already enriched
/// by an earlier interceptor or layer is returned as is.
pub(crate) fn enrich_once<B: BeforeCall>(
    before: &B,
    attached: Option<&Context>,
    metadata: &MetadataMap,
) -> Context {
    match attached {
        Some(ctx) if ctx.value::<Enriched>().is_some() => ctx.clone(),
        _ => before
            .before_call(Context::from_parts(attached, metadata))
            .with_value(Enriched),
    }
}

/// Server interceptor attaching an enriched [`Context`] to every call.
///
/// Wrap handlers with [`unary`](Self::unary) and [`stream`](Self::stream):
/// they enrich the call, or pick up the context already attached by
/// `XxxServer::with_interceptor` or [`RequestIdLayer`],
/// and run the handler inside the call's span. Used alone through
/// `with_interceptor`, it only attaches the context; log lines get the
/// Request-Id and OpHID once the handler runs under `unary`/`stream` or
/// behind the layer.
#[derive(Clone, Debug, Default)]
pub struct RequestIdInterceptor<B = Enricher> {
    before: B,
}

impl<B: BeforeCall> RequestIdInterceptor<B> {
    pub fn new(before: B) -> Self {
        Self { before }
    }

    fn enrich<T>(&self, request: &Request<T>) -> Context {
        enrich_once(
            &self.before,
            request.extensions().get::<Context>(),
            request.metadata(),
        )
    }

    /// Enriches a single-response call and hands it to `next`. Whatever
    /// `next` returns is returned as is.
    pub async fn unary<T, F, Fut>(&self, mut request: Request<T>, next: F) -> Fut::Output
    where
        F: FnOnce(Request<T>) -> Fut,
        Fut: Future,
    {
        let ctx = self.enrich(&request);
        let span = ctx.span();
        request.extensions_mut().insert(ctx);
        next(request).instrument(span).await
    }

    /// Enriches a stream once at open time. `next` receives the stream
    /// wrapped in an [`EnrichedStream`] reporting the enriched context.
    pub async fn stream<S, F, Fut>(&self, request: Request<S>, next: F) -> Fut::Output
    where
        F: FnOnce(Request<EnrichedStream<S>>) -> Fut,
        Fut: Future,
    {
        let ctx = self.enrich(&request);
        let span = ctx.span();
        let (metadata, mut extensions, inner) = request.into_parts();
        extensions.insert(ctx.clone());
        let request = Request::from_parts(metadata, extensions, EnrichedStream::new(inner, ctx));
        next(request).instrument(span).await
    }
}

impl<B: Clone> RequestIdInterceptor<B> {
    /// Layer enriching with the same configuration.
    pub fn layer(&self) -> RequestIdLayer<B> {
        RequestIdLayer::new(self.before.clone())
    }
}

impl<B: BeforeCall> Interceptor for RequestIdInterceptor<B> {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let ctx = self.enrich(&request);
        request.extensions_mut().insert(ctx);
        Ok(request)
    }
}

/// Client interceptor copying the Request-Id and OpHID of a [`Context`]
/// found in the outbound request's extensions into its metadata.
#[derive(Clone, Debug)]
pub struct ContextPropagator {
    request_id_header: AsciiMetadataKey,
}

impl Default for ContextPropagator {
    fn default() -> Self {
        Self {
            request_id_header: AsciiMetadataKey::from_static(REQUEST_ID_HEADER),
        }
    }
}

impl ContextPropagator {
    pub fn new(request_id_header: &str) -> Result<Self, InvalidMetadataKey> {
        let request_id_header =
            AsciiMetadataKey::from_bytes(request_id_header.to_ascii_lowercase().as_bytes())?;
        Ok(Self { request_id_header })
    }
}

impl Interceptor for ContextPropagator {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let Some(ctx) = request.extensions().get::<Context>().cloned() else {
            return Ok(request);
        };

        if let Some(request_id) = ctx.request_id() {
            match MetadataValue::try_from(request_id) {
                Ok(value) => {
                    request
                        .metadata_mut()
                        .insert(self.request_id_header.clone(), value);
                }
                Err(_) => warn!(%request_id, "request id not propagated"),
            }
        }
        if let Some(ophid) = ctx.ophid().filter(|ophid| !ophid.is_empty()) {
            match MetadataValue::try_from(ophid) {
                Ok(value) => {
                    request.metadata_mut().insert(OPHID_HEADER, value);
                }
                Err(_) => warn!(%ophid, "ophid not propagated"),
            }
        }
        Ok(request)
    }
}
