use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

use super::{
    client::{ping_with_request, BoxError},
    enricher::Enricher,
    interceptors::{ContextPropagator, RequestIdInterceptor},
    rpc::{
        demo_server::{Demo, DemoServer},
        CollectReply, ForwardPingRequest, PingReply, PingRequest,
    },
    util::log_metadata,
};
use crate::{config::ServerArgs, context::Context};

#[derive(Clone, Debug, Default)]
pub struct DemoServerImpl {
    interceptor: RequestIdInterceptor,
    propagator: ContextPropagator,
}

impl DemoServerImpl {
    pub fn new(request_id_header: &str) -> Result<Self, BoxError> {
        Ok(Self {
            interceptor: RequestIdInterceptor::new(
                Enricher::new().with_request_id_header(request_id_header),
            ),
            propagator: ContextPropagator::new(request_id_header)?,
        })
    }
}

fn observed(ctx: &Context) -> PingReply {
    PingReply {
        request_id: ctx.request_id().unwrap_or_default().to_string(),
        ophid: ctx.ophid().unwrap_or_default().to_string(),
    }
}

#[tonic::async_trait]
impl Demo for DemoServerImpl {
    async fn ping(&self, request: Request<PingRequest>) -> Result<Response<PingReply>, Status> {
        self.interceptor
            .unary(request, |request| async move {
                log_metadata(request.metadata());
                info!(text = %request.get_ref().message, "ping");
                Ok(Response::new(observed(&Context::from_request(&request))))
            })
            .await
    }

    async fn forward_ping(
        &self,
        request: Request<ForwardPingRequest>,
    ) -> Result<Response<PingReply>, Status> {
        let propagator = self.propagator.clone();
        self.interceptor
            .unary(request, |request| async move {
                log_metadata(request.metadata());

                // pass context from this request to the forwarded one
                let ctx = Context::from_request(&request);
                let address = request.into_inner().address;
                let mut fwd_request = Request::new(PingRequest {
                    message: "forwarded".to_string(),
                });
                fwd_request.extensions_mut().insert(ctx);

                info!(%address, "forwarding ping");
                match ping_with_request(address, fwd_request, propagator).await {
                    Ok(reply) => Ok(Response::new(reply)),
                    Err(err) => {
                        warn!(%err, "forwarded ping failed");
                        Err(Status::unavailable(err.to_string()))
                    }
                }
            })
            .await
    }

    async fn collect(
        &self,
        request: Request<Streaming<PingRequest>>,
    ) -> Result<Response<CollectReply>, Status> {
        self.interceptor
            .stream(request, |request| async move {
                let mut stream = request.into_inner();
                let mut reply = CollectReply::default();
                while let Some(message) = stream.message().await? {
                    debug!(text = %message.message, "received");
                    reply.observed.push(observed(stream.context()));
                }
                info!(count = reply.observed.len(), "stream closed");
                Ok::<_, Status>(Response::new(reply))
            })
            .await
    }
}

pub async fn run(args: &ServerArgs) -> Result<(), BoxError> {
    let addr: SocketAddr = port_to_addr(args.port).parse()?;
    info!(%addr, request_id_header = %args.request_id_header, "serving");
    let service = DemoServerImpl::new(&args.request_id_header)?;
    Server::builder()
        .layer(service.interceptor.layer())
        .add_service(DemoServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}

/// Serves on an already bound listener.
pub async fn serve_with_listener(
    listener: TcpListener,
    service: DemoServerImpl,
) -> Result<(), BoxError> {
    Server::builder()
        .layer(service.interceptor.layer())
        .add_service(DemoServer::new(service))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;

    Ok(())
}

fn port_to_addr(port: u32) -> String {
    format!("[::1]:{}", port)
}
