//! Line echo child
//!
//! Reads lines from stdin and writes each one back, trimmed. Exits when it
//! reads `STOP`, `"STOP"` or `{"cmd":"STOP"}`, or when stdin closes.

use std::process::ExitCode;

use clap::Parser;
use coprocess_wire::{is_stop_line, read_line, write_line};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "coprocess-echo-lines", version, about = "Echo stdin lines back on stdout")]
struct Args {
    /// Bytes of stderr output written before each reply
    #[arg(long, default_value_t = 0)]
    noise: usize,

    /// Print non-JSON lines and a blank line on stdout before each reply
    #[arg(long)]
    chatter: bool,

    /// Exit code used when asked to stop
    #[arg(long, default_value_t = 0)]
    exit_code: u8,
}

const NOISE_LINE: usize = 100;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();

    eprintln!("echo-lines: ready (pid {})", std::process::id());

    while let Some(line) = read_line(&mut stdin).await? {
        if is_stop_line(&line) {
            eprintln!("echo-lines: stopping with code {}", args.exit_code);
            return Ok(ExitCode::from(args.exit_code));
        }

        if args.noise > 0 {
            write_noise(&mut stderr, args.noise).await?;
        }
        if args.chatter {
            write_line(&mut stdout, "working on it...").await?;
            write_line(&mut stdout, "").await?;
        }
        write_line(&mut stdout, line.trim()).await?;
    }

    eprintln!("echo-lines: stdin closed");
    Ok(ExitCode::SUCCESS)
}

/// Exactly `bytes` bytes of newline-terminated filler.
async fn write_noise<W>(out: &mut W, bytes: usize) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut remaining = bytes;
    while remaining > 0 {
        let n = remaining.min(NOISE_LINE);
        let mut line = vec![b'x'; n - 1];
        line.push(b'\n');
        out.write_all(&line).await?;
        remaining -= n;
    }
    out.flush().await
}
