//! Request-scoped context.
//!
//! A [`Context`] is an immutable chain of typed values. Adding a value
//! returns a new context whose head points at the previous one; lookups walk
//! from the head towards the root and return the first value of the
//! requested type. Clones share the chain.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tonic::{metadata::MetadataMap, Request};
use tracing::Span;

/// Correlation id of the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Identifier of the calling operator/session. May be empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpHid(pub String);

// metadata as received from the transport
#[derive(Clone)]
struct IncomingMetadata(MetadataMap);

struct Node {
    parent: Option<Arc<Node>>,
    value: Box<dyn Any + Send + Sync>,
}

#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

impl Context {
    /// Empty root context. Carries no metadata.
    pub fn background() -> Self {
        Self::default()
    }

    /// Root context for a server call, holding the call's inbound metadata.
    pub fn incoming(metadata: MetadataMap) -> Self {
        Self::background().with_value(IncomingMetadata(metadata))
    }

    /// Context attached to `request` by an earlier interceptor, or a fresh
    /// incoming context built from the request's metadata.
    pub fn from_request<T>(request: &Request<T>) -> Self {
        Self::from_parts(request.extensions().get::<Context>(), request.metadata())
    }

    /// `attached` when it already knows the call's metadata, otherwise
    /// `attached` (or a fresh root) with `metadata` bound on top.
    pub fn from_parts(attached: Option<&Context>, metadata: &MetadataMap) -> Self {
        match attached {
            Some(ctx) if ctx.incoming_metadata().is_some() => ctx.clone(),
            Some(ctx) => ctx.with_value(IncomingMetadata(metadata.clone())),
            None => Self::incoming(metadata.clone()),
        }
    }

    /// Returns a child context binding `value`. `self` is left as is.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            head: Some(Arc::new(Node {
                parent: self.head.clone(),
                value: Box::new(value),
            })),
        }
    }

    /// Nearest binding of type `T`.
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            if let Some(value) = node.value.downcast_ref::<T>() {
                return Some(value);
            }
            cursor = node.parent.as_deref();
        }
        None
    }

    pub fn incoming_metadata(&self) -> Option<&MetadataMap> {
        self.value::<IncomingMetadata>().map(|md| &md.0)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.value::<RequestId>().map(|id| id.0.as_str())
    }

    pub fn ophid(&self) -> Option<&str> {
        self.value::<OpHid>().map(|id| id.0.as_str())
    }

    /// Span bound to this context, or a disabled span.
    pub fn span(&self) -> Span {
        self.value::<Span>().cloned().unwrap_or_else(Span::none)
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            depth += 1;
            cursor = node.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id())
            .field("ophid", &self.ophid())
            .field("has_metadata", &self.incoming_metadata().is_some())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_to_parent() {
        let root = Context::background().with_value(RequestId("root".into()));
        let child = root.with_value(OpHid("op".into()));

        assert_eq!(child.request_id(), Some("root"));
        assert_eq!(child.ophid(), Some("op"));
        assert_eq!(root.ophid(), None);
    }

    #[test]
    fn child_shadows_parent_without_touching_it() {
        let parent = Context::background().with_value(RequestId("a".into()));
        let child = parent.with_value(RequestId("b".into()));

        assert_eq!(child.request_id(), Some("b"));
        assert_eq!(parent.request_id(), Some("a"));
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn background_has_no_metadata() {
        let ctx = Context::background();
        assert!(ctx.incoming_metadata().is_none());
        assert!(ctx.request_id().is_none());
        assert!(ctx.span().is_disabled());
    }

    #[test]
    fn from_request_prefers_extension() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("request-id", "from-header".parse().unwrap());

        let ctx = Context::from_request(&request);
        assert!(ctx.incoming_metadata().is_some());
        assert!(ctx.request_id().is_none());

        let attached = Context::background().with_value(RequestId("attached".into()));
        request.extensions_mut().insert(attached);
        let ctx = Context::from_request(&request);
        assert_eq!(ctx.request_id(), Some("attached"));
        assert!(ctx.incoming_metadata().is_some());
    }

    #[test]
    fn from_parts_keeps_metadata_already_attached() {
        let mut first = MetadataMap::new();
        first.insert("ophid", "first".parse().unwrap());
        let mut second = MetadataMap::new();
        second.insert("ophid", "second".parse().unwrap());

        let attached = Context::incoming(first);
        let ctx = Context::from_parts(Some(&attached), &second);
        assert_eq!(
            ctx.incoming_metadata().unwrap().get("ophid").unwrap(),
            "first"
        );
    }

    #[test]
    fn debug_lists_reserved_values() {
        let ctx = Context::incoming(MetadataMap::new()).with_value(OpHid("user-42".into()));
        let out = format!("{:?}", ctx);
        assert!(out.contains("user-42"));
        assert!(out.contains("has_metadata: true"));
    }
}
