mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use rangedl::{Downloader, MessageSink, NullSink, ReqwestTransport, TerminalSink};

fn init_tracing(verbose: bool) {
    let default = if verbose { "rangedl=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let sink: Arc<dyn MessageSink> = if args.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(TerminalSink::new())
    };
    let request = args.to_request();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let transport = ReqwestTransport::new(Duration::from_secs(args.timeout))
            .context("Failed to build HTTP client")?;
        let downloader = Downloader::new(Arc::new(transport), sink.clone());
        let result = downloader
            .run(&request)
            .await
            .with_context(|| format!("Failed to download {}", args.url))?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        sink.emit(&format!("{} download finished!", result.url));
        Ok::<(), anyhow::Error>(())
    })
}
