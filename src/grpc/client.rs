use tokio_stream::iter;
use tonic::{metadata::MetadataValue, transport::Endpoint, Request};
use tracing::info;

use super::{
    enricher::{OPHID_HEADER, REQUEST_ID_HEADER},
    interceptors::ContextPropagator,
    rpc::{demo_client::DemoClient, CollectReply, ForwardPingRequest, PingReply, PingRequest},
    util::log_metadata,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Ids preset by the caller, sent as `request-id` / `ophid` headers.
#[derive(Clone, Debug, Default)]
pub struct CallIds {
    pub request_id: Option<String>,
    pub ophid: Option<String>,
}

/// Pings `address`. A `Context` in the request's extensions is propagated
/// into its metadata by `propagator`.
pub async fn ping_with_request(
    address: String,
    request: Request<PingRequest>,
    propagator: ContextPropagator,
) -> Result<PingReply, BoxError> {
    let channel = Endpoint::from_shared(address)?.connect().await?;
    let mut client = DemoClient::with_interceptor(channel, propagator);
    let response = client.ping(request).await?;
    log_metadata(response.metadata());
    Ok(response.into_inner())
}

pub async fn ping(port: u32, ids: &CallIds) -> Result<PingReply, BoxError> {
    let mut request = Request::new(PingRequest {
        message: "ping".to_string(),
    });
    add_id_headers(&mut request, ids)?;
    ping_with_request(port_to_url(port), request, ContextPropagator::default()).await
}

pub async fn fwd_ping(port: u32, fwd_port: u32, ids: &CallIds) -> Result<PingReply, BoxError> {
    let mut request = Request::new(ForwardPingRequest {
        address: port_to_url(fwd_port),
    });
    add_id_headers(&mut request, ids)?;

    let channel = Endpoint::from_shared(port_to_url(port))?.connect().await?;
    let mut client = DemoClient::new(channel);
    let response = client.forward_ping(request).await?;
    log_metadata(response.metadata());
    Ok(response.into_inner())
}

/// Streams `count` messages over a single call.
pub async fn collect(port: u32, count: usize, ids: &CallIds) -> Result<CollectReply, BoxError> {
    let messages: Vec<_> = (0..count)
        .map(|n| PingRequest {
            message: format!("message {}", n),
        })
        .collect();
    let mut request = Request::new(iter(messages));
    add_id_headers(&mut request, ids)?;

    let channel = Endpoint::from_shared(port_to_url(port))?.connect().await?;
    let mut client = DemoClient::new(channel);
    let response = client.collect(request).await?;
    info!(observed = response.get_ref().observed.len(), "collect finished");
    Ok(response.into_inner())
}

fn add_id_headers<T>(request: &mut Request<T>, ids: &CallIds) -> Result<(), BoxError> {
    if let Some(request_id) = &ids.request_id {
        request
            .metadata_mut()
            .insert(REQUEST_ID_HEADER, MetadataValue::try_from(request_id.as_str())?);
    }
    if let Some(ophid) = &ids.ophid {
        request
            .metadata_mut()
            .insert(OPHID_HEADER, MetadataValue::try_from(ophid.as_str())?);
    }
    Ok(())
}

pub fn port_to_url(port: u32) -> String {
    format!("http://[::1]:{}", port)
}
