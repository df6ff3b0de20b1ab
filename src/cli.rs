use clap::Parser;
use tracing::info;

use grpc_requestid::{
    grpc::client::{self, CallIds},
    logging::{self, LogFormat},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// if this flag is set, forward ping to this port on localhost
    #[arg(short, long, default_value_t = 0)]
    fwd: u32,

    /// port number on localhost
    #[arg(short, long, default_value_t = 9090)]
    port: u32,

    /// send this request id instead of letting the server generate one
    #[arg(long)]
    request_id: Option<String>,

    /// operator/caller id sent as the ophid header
    #[arg(long)]
    ophid: Option<String>,

    /// stream this many messages over one call instead of pinging
    #[arg(short, long, default_value_t = 0)]
    stream: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    logging::init_tracing(LogFormat::Compact);

    let ids = CallIds {
        request_id: args.request_id,
        ophid: args.ophid,
    };

    if args.fwd != 0 {
        let reply = client::fwd_ping(args.port, args.fwd, &ids).await?;
        info!(request_id = %reply.request_id, ophid = %reply.ophid, "forwarded ping");
    } else if args.stream > 0 {
        let reply = client::collect(args.port, args.stream, &ids).await?;
        for observed in reply.observed {
            info!(request_id = %observed.request_id, ophid = %observed.ophid, "observed");
        }
    } else {
        let reply = client::ping(args.port, &ids).await?;
        info!(request_id = %reply.request_id, ophid = %reply.ophid, "ping");
    }
    Ok(())
}
