use std::path::PathBuf;

use clap::Parser;

use rangedl::{DownloadRequest, DEFAULT_CONNECTIONS};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL to download
    #[arg(index = 1)]
    pub url: String,

    /// Maximum number of connections
    #[arg(short = 'n', long = "num-connections", default_value_t = DEFAULT_CONNECTIONS)]
    pub connections: usize,

    /// Local output file (defaults to the last segment of the URL path)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Add a header, as Name:Value (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Continue a partially downloaded output file
    #[arg(short = 'c', long = "continue")]
    pub resume: bool,

    /// Global speed limit in bytes per second (e.g., 1048576 for 1MB/s)
    #[arg(short = 's', long = "max-speed")]
    pub max_speed: Option<u32>,

    /// Expected SHA-256 of the finished file
    #[arg(long = "sha256")]
    pub sha256: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// No output to stderr
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// More status information
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the download summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    pub fn to_request(&self) -> DownloadRequest {
        let mut request = DownloadRequest::new(self.url.clone())
            .connections(self.connections)
            .resume(self.resume)
            .progress(!self.quiet)
            .verbose(self.verbose)
            .max_speed(self.max_speed)
            .expected_sha256(self.sha256.clone());
        if let Some(output) = &self.output {
            request = request.output(output);
        }
        for header in &self.headers {
            request = request.header(header.clone());
        }
        request
    }
}
