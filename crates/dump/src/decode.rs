/// Field value that stands for SQL NULL in COPY text format.
pub const NULL_SENTINEL: &str = "\\N";

/// Decode one COPY text-format field.
///
/// Returns `None` for the NULL sentinel. Backslash escapes are resolved:
/// `\b \f \n \r \t \v`, octal `\NNN`, hex `\xHH`, and `\<any>` for a
/// literal character. Invalid UTF-8 produced by byte escapes is replaced.
pub fn decode_field(raw: &str) -> Option<String> {
    if raw == NULL_SENTINEL {
        return None;
    }
    if !raw.contains('\\') {
        return Some(raw.to_owned());
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' || i + 1 == bytes.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = bytes[i + 1];
        i += 2;
        match next {
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                let mut value = next - b'0';
                let mut taken = 1;
                while taken < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value.wrapping_mul(8).wrapping_add(bytes[i] - b'0');
                    i += 1;
                    taken += 1;
                }
                out.push(value);
            }
            b'x' if i < bytes.len() && bytes[i].is_ascii_hexdigit() => {
                let mut value = 0u8;
                let mut taken = 0;
                while taken < 2 && i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                    value = value * 16 + hex_value(bytes[i]);
                    i += 1;
                    taken += 1;
                }
                out.push(value);
            }
            other => out.push(other),
        }
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}
