//! Object echo child
//!
//! Says hello, reads the host's hello, then echoes every frame back until it
//! receives the string `"STOP"` or stdin closes.

use coprocess_wire::{HELLO_PEER, is_stop_value, read_frame, write_frame};
use serde_json::Value;
use tokio::io::BufReader;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    write_frame(&mut stdout, HELLO_PEER).await?;
    let Some(hello) = read_frame::<_, Value>(&mut stdin).await? else {
        eprintln!("echo-objects: host left before saying hello");
        return Ok(());
    };
    eprintln!("echo-objects: host said {}", hello);

    while let Some(value) = read_frame::<_, Value>(&mut stdin).await? {
        if is_stop_value(&value) {
            eprintln!("echo-objects: stopping");
            return Ok(());
        }
        write_frame(&mut stdout, &value).await?;
    }

    eprintln!("echo-objects: stdin closed");
    Ok(())
}
