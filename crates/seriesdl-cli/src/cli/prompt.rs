//! Numbered-menu prompts over any reader/writer pair.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};

/// Parse a 1-based menu choice into an index. Only ASCII digits are accepted.
pub fn parse_selection(input: &str, len: usize) -> Result<usize> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        bail!("'{}' is not a number", input);
    }
    let n: usize = input.parse().with_context(|| format!("'{}' is out of range", input))?;
    if n == 0 || n > len {
        bail!("choose a number between 1 and {}", len);
    }
    Ok(n - 1)
}

/// Print `items` as a numbered list and read a choice, asking again on bad input.
/// Fails on end of input.
pub fn choose<T, R, W, F>(input: &mut R, out: &mut W, title: &str, items: &[T], label: F) -> Result<usize>
where
    R: BufRead,
    W: Write,
    F: Fn(&T) -> String,
{
    if items.is_empty() {
        bail!("nothing to choose from");
    }
    writeln!(out, "{}:", title)?;
    for (i, item) in items.iter().enumerate() {
        writeln!(out, "{:>3}) {}", i + 1, label(item))?;
    }
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("no selection made");
        }
        match parse_selection(&line, items.len()) {
            Ok(i) => return Ok(i),
            Err(e) => writeln!(out, "{}", e)?,
        }
    }
}

/// Ask a yes/no question. Only `y`/`yes` and `n`/`no` are accepted; end of input means no.
pub fn confirm<R, W>(input: &mut R, out: &mut W, question: &str) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    loop {
        write!(out, "{} (y/n) ", question)?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(false);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(out, "answer y or n")?,
        }
    }
}
