use std::io::Write;

use crate::error::AppResult;

pub fn write_block<W: Write>(out: &mut W, text: &str) -> AppResult<()> {
    for line in text.lines() {
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}
