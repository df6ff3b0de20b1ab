use clap::Parser;

use crate::{grpc::enricher::REQUEST_ID_HEADER, logging::LogFormat};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// port number on localhost
    #[arg(short, long, env = "DEMO_PORT", default_value_t = 9090)]
    pub port: u32,

    /// metadata field carrying an upstream request id
    #[arg(long, env = "REQUEST_ID_HEADER", default_value = REQUEST_ID_HEADER)]
    pub request_id_header: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
