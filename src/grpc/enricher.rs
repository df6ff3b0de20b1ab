use tracing::trace;

use super::util::extract_header;
use crate::context::{Context, OpHid, RequestId};
use crate::id::{IdGenerator, UuidGenerator};
use crate::logging::bind_fields;

pub const REQUEST_ID_HEADER: &str = "request-id";
pub const OPHID_HEADER: &str = "ophid";

/// Resolves the Request-Id and OpHID of a call and derives a context
/// carrying both. Never fails: a missing or unusable Request-Id is replaced
/// by a generated one, a missing OpHID becomes `""`.
#[derive(Clone, Debug)]
pub struct Enricher<G = UuidGenerator> {
    request_id_header: String,
    generator: G,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher {
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator)
    }
}

impl<G: IdGenerator> Enricher<G> {
    pub fn with_generator(generator: G) -> Self {
        Self {
            request_id_header: REQUEST_ID_HEADER.to_string(),
            generator,
        }
    }

    /// Reads the Request-Id from `header` instead of `request-id`.
    pub fn with_request_id_header(mut self, header: &str) -> Self {
        self.request_id_header = header.to_ascii_lowercase();
        self
    }

    pub fn request_id_header(&self) -> &str {
        &self.request_id_header
    }

    pub fn enrich(&self, ctx: Context) -> Context {
        let request_id = match extract_header(&ctx, &self.request_id_header) {
            Ok(id) if !id.is_empty() => id,
            Ok(_) => self.generator.new_id(),
            Err(err) => {
                trace!(%err, "generating request id");
                self.generator.new_id()
            }
        };

        let ophid = extract_header(&ctx, OPHID_HEADER).unwrap_or_default();

        let span = bind_fields(&ctx, &request_id, &ophid);

        ctx.with_value(RequestId(request_id))
            .with_value(OpHid(ophid))
            .with_value(span)
    }
}
