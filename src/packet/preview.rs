use std::fmt::Write;

// ==========================================
// 调试输出：十六进制 dump / 可打印字符预览
// ==========================================

const ROW_WIDTH: usize = 16;

fn printable(c: u8) -> char {
    if (32..=126).contains(&c) { c as char } else { '.' }
}

/// `0000: 45 00 ...  E..` rows covering at most `sample` bytes.
pub fn hex_dump(bytes: &[u8], sample: usize) -> String {
    if sample == 0 {
        return String::new();
    }
    let n = sample.min(bytes.len());
    let mut out = String::with_capacity(n * 4 + 16);

    for (row, chunk) in bytes[..n].chunks(ROW_WIDTH).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:04x}: ", row * ROW_WIDTH);
        for i in 0..ROW_WIDTH {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02x} ");
                }
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        out.extend(chunk.iter().copied().map(printable));
    }

    if n < bytes.len() {
        out.push_str("\n...");
    }
    out
}

pub fn ascii_preview(bytes: &[u8], sample: usize) -> String {
    let n = sample.min(bytes.len());
    let mut out: String = bytes[..n].iter().copied().map(printable).collect();
    if n < bytes.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_pads_last_row() {
        let dump = hex_dump(b"ABC\x00", 128);
        assert_eq!(
            dump,
            format!("0000: 41 42 43 00 {} ABC.", "   ".repeat(12))
        );
    }

    #[test]
    fn hex_dump_marks_truncation() {
        let bytes: Vec<u8> = (0u8..40).collect();
        let dump = hex_dump(&bytes, 20);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0000: 00 01"));
        assert!(lines[1].starts_with("0010: 10 11 12 13 "));
        assert_eq!(lines[2], "...");
        assert!(hex_dump(&bytes, 0).is_empty());
    }

    #[test]
    fn ascii_preview_replaces_control_bytes() {
        assert_eq!(ascii_preview(b"GET /\r\n", 16), "GET /..");
        assert_eq!(ascii_preview(b"abcdef", 3), "abc...");
    }
}
