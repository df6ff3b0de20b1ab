//! Request-Id / OpHID enrichment for tonic servers.
//!
//! Every inbound call gets a [`context::Context`] carrying a Request-Id
//! (reused from the `request-id` header or freshly generated) and an OpHID
//! (from the `ophid` header, empty when absent). Both values are also bound
//! to a `tracing` span for the duration of the call.

pub mod config;
pub mod context;
pub mod id;
pub mod logging;

pub mod grpc {
    pub mod client;
    pub mod enricher;
    pub mod interceptors;
    pub mod layer;
    pub mod server;
    pub mod stream;
    pub mod util;

    pub mod rpc {
        tonic::include_proto!("demo");
    }
}

pub use context::{Context, OpHid, RequestId};
pub use grpc::enricher::Enricher;
pub use grpc::interceptors::{BeforeCall, ContextPropagator, RequestIdInterceptor};
pub use grpc::layer::{RequestIdLayer, RequestIdService};
pub use grpc::stream::EnrichedStream;
pub use grpc::util::{extract_header, MetadataError};
pub use id::{IdGenerator, UuidGenerator};
