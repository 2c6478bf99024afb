//! guide_send - send image files to a guidance server and print the replies.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use assembly_guide::transport::{read_frame, write_frame};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send images to a guidance server, one frame per file")]
struct Args {
    /// Server address.
    #[arg(long, env = "GUIDE_SERVER_ADDR", default_value = "127.0.0.1:2722")]
    addr: String,

    /// Send each image this many times in a row.
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Pause between frames, in milliseconds.
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Largest reply accepted, in bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    max_reply_bytes: u32,

    /// Encoded images (JPEG/PNG) to send, in order.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.addr)
        .with_context(|| format!("connect to {}", args.addr))?;
    stream.set_nodelay(true)?;

    for path in &args.images {
        let payload =
            std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        for _ in 0..args.repeat {
            write_frame(&mut stream, &payload)?;
            let reply = read_frame(&mut stream, args.max_reply_bytes)?
                .ok_or_else(|| anyhow!("server closed the connection"))?;
            let text = String::from_utf8(reply).context("reply is not UTF-8")?;
            println!("{}: {}", path.display(), text);
            if args.interval_ms > 0 {
                std::thread::sleep(Duration::from_millis(args.interval_ms));
            }
        }
    }
    Ok(())
}
