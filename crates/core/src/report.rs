//! Text encoding of a cycle's results.
//!
//! Each sequence is written as
//!
//! ```text
//! <LABEL>_START
//! v0,v1,...,vk
//! <LABEL>_END
//! ```
//!
//! with four fraction digits per value. Lines end in `\r\n` like the serial
//! console the receiving tools were written against.

use std::io::{self, Write};

pub const LINE_END: &str = "\r\n";

/// Formats `value` with four fraction digits. Negative zero prints as `0.0000`.
pub fn format_value(value: f32) -> String {
    // -0.0 + 0.0 == +0.0
    format!("{:.4}", value + 0.0)
}

/// Writes one labelled block.
pub fn write_block<W: Write + ?Sized>(out: &mut W, label: &str, values: &[f32]) -> io::Result<()> {
    write!(out, "{}_START{}", label, LINE_END)?;
    for (i, &v) in values.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(format_value(v).as_bytes())?;
    }
    out.write_all(LINE_END.as_bytes())?;
    write!(out, "{}_END{}", label, LINE_END)
}

/// Writes a free-text diagnostic line.
pub fn write_line<W: Write + ?Sized>(out: &mut W, text: &str) -> io::Result<()> {
    write!(out, "{}{}", text, LINE_END)
}
