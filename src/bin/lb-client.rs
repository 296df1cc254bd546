//! Minimal client: sends request heads to the balancer and prints replies.
//!
//! With `--concurrency` above 1 it doubles as a load generator and reports
//! how many requests got a response.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "lb-client")]
#[command(about = "Send plain request heads through the balancer", long_about = None)]
struct Cli {
    /// Balancer address.
    #[arg(short, long, default_value = "127.0.0.1:8003")]
    address: String,

    /// Request path.
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Total number of requests.
    #[arg(short = 'n', long, default_value_t = 1)]
    requests: usize,

    /// Requests in flight at once.
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Only print the summary.
    #[arg(short, long)]
    quiet: bool,
}

async fn send(address: &str, path: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(address).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {address}\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Arc::new(Cli::parse());
    let concurrency = cli.concurrency.clamp(1, cli.requests.max(1));
    let start = Instant::now();

    let mut tasks = Vec::with_capacity(concurrency);
    for lane in 0..concurrency {
        let cli = Arc::clone(&cli);
        tasks.push(tokio::spawn(async move {
            let (mut succeeded, mut failed) = (0usize, 0usize);
            for i in (lane..cli.requests).step_by(concurrency) {
                match send(&cli.address, &cli.path).await {
                    Ok(response) if !response.is_empty() => {
                        succeeded += 1;
                        if !cli.quiet {
                            println!("[{}] {}", i + 1, response.trim_end());
                        }
                    }
                    Ok(_) => {
                        failed += 1;
                        eprintln!("[{}] connection closed without a response", i + 1);
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("[{}] request failed: {e}", i + 1);
                    }
                }
            }
            (succeeded, failed)
        }));
    }

    let (mut succeeded, mut failed) = (0, 0);
    for task in tasks {
        let (ok, err) = task.await?;
        succeeded += ok;
        failed += err;
    }

    let elapsed = start.elapsed();
    println!(
        "{succeeded} succeeded, {failed} failed, {} requests in {:.2?} ({:.1} req/s, concurrency {concurrency})",
        cli.requests,
        elapsed,
        cli.requests as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
