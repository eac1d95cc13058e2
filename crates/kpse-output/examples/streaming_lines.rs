//! Streaming output example
//!
//! Pipe the output of a kpsewhich run into this example to see how each
//! line is classified:
//!
//! ```text
//! kpsewhich --mode ljfour --dpi 600 --mktex=pk cmr10.600pk 2>&1 | cargo run --example streaming_lines
//! ```

use std::io::{self, Read};
use kpse_output::{LineBuffer, OutputLine};

fn main() -> io::Result<()> {
    let mut stdin = io::stdin().lock();
    let mut buf = LineBuffer::new();
    let mut chunk = [0u8; 1024];
    let mut found = 0usize;

    let mut report = |line: String| match OutputLine::parse(&line) {
        OutputLine::Found(path) => {
            found += 1;
            println!("found      {}", path.display());
        }
        OutputLine::GenerationStarted { font, dpi } => {
            println!("generating {} at {} dpi", font, dpi.map_or("?".to_string(), |d| d.to_string()));
        }
        OutputLine::Unresolved { font } => println!("missing    {}", font),
        OutputLine::Diagnostic(text) => println!("           {}", text),
        OutputLine::Blank => {}
    };

    loop {
        let n = stdin.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.feed_with(&chunk[..n], &mut report);
    }
    if let Some(rest) = buf.finish() {
        report(rest);
    }

    println!(
        "{} bytes, {} lines, {} fonts found",
        buf.stats().bytes_processed,
        buf.stats().lines_emitted,
        found
    );
    Ok(())
}
