use clap::Parser;

use grpc_requestid::{config::ServerArgs, grpc, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = ServerArgs::parse();
    logging::init_tracing(args.log_format);

    grpc::server::run(&args).await?;
    Ok(())
}
