//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mimetree.
//
// Mimetree is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mimetree is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mimetree. If not, see <http://www.gnu.org/licenses/>.

//! Tokenizes an RFC 5322 header block into fields.

use super::header_fields::get_parser;
use super::transform::{ByteTransform, PushbackTransform};
use crate::support::error::Error;

/// RFC 5322 2.1.1 hard limit, not counting the CRLF.
const MAX_LINE_LENGTH: usize = 998;

fn premature_end() -> Error {
    Error::data("Premature end before all headers were read")
}

fn line_too_long() -> Error {
    Error::data("Header field line too long")
}

fn is_name_char(c: u8) -> bool {
    (0x21..=0x7e).contains(&c) && b':' != c
}

/// Reads header fields from `input` up to and including the blank line
/// that terminates the header block.
///
/// Field names are returned in lowercase. Values have folding line breaks
/// removed (the whitespace after each one is kept) and leading whitespace
/// trimmed. In fields the registry considers unstructured, 8-bit bytes
/// become U+FFFD; elsewhere they are an error.
pub fn read_headers<T: ByteTransform + ?Sized>(
    input: &mut T,
) -> Result<Vec<(String, String)>, Error> {
    let mut input = PushbackTransform::new(input);
    let mut headers = Vec::new();

    loop {
        let (name, consumed) = match read_field_name(&mut input)? {
            Some(field) => field,
            None => return Ok(headers),
        };
        let value = read_field_value(&mut input, &name, consumed)?;
        headers.push((name, value));
    }
}

/// Reads the field name and its colon, or the CRLF ending the headers, in
/// which case `None` is returned.
///
/// Along with the name, returns how many bytes of the line were consumed.
fn read_field_name<T: ByteTransform>(
    input: &mut PushbackTransform<T>,
) -> Result<Option<(String, usize)>, Error> {
    let mut name = String::new();
    let mut first = true;
    let mut after_whitespace = false;
    let mut line_length = 0;

    loop {
        let c = input.read_next()?.ok_or_else(premature_end)?;
        line_length += 1;

        if first && b'\r' == c {
            return match input.read_next()? {
                Some(b'\n') => Ok(None),
                _ => Err(Error::data("CR not followed by LF")),
            };
        }

        if line_length > MAX_LINE_LENGTH {
            return Err(line_too_long());
        }

        if is_name_char(c) {
            // Whitespace is only tolerated between the name and the colon
            if after_whitespace {
                return Err(Error::data("Whitespace within header field"));
            }
            first = false;
            name.push(c.to_ascii_lowercase() as char);
        } else if !first && b':' == c {
            break;
        } else if b' ' == c || b'\t' == c {
            after_whitespace = true;
            first = false;
        } else {
            return Err(Error::data("Malformed header field name"));
        }
    }

    if name.is_empty() {
        Err(Error::data("Empty header field name"))
    } else {
        Ok(Some((name, line_length)))
    }
}

fn read_field_value<T: ByteTransform>(
    input: &mut PushbackTransform<T>,
    name: &str,
    mut line_length: usize,
) -> Result<String, Error> {
    let structured = get_parser(name).is_structured();
    let mut value = String::new();

    loop {
        let c = input.read_next()?.ok_or_else(premature_end)?;
        line_length += 1;

        if b'\r' == c {
            match input.read_next()? {
                Some(b'\n') => {
                    // A line starting with whitespace continues the field
                    match input.read_next()? {
                        Some(b' ') | Some(b'\t') => {
                            input.unget();
                            line_length = 0;
                            continue;
                        },
                        _ => {
                            input.unget();
                            break;
                        },
                    }
                },
                _ => {
                    // Bare CR is kept as part of the value
                    input.unget();
                },
            }
        }

        if line_length > MAX_LINE_LENGTH {
            return Err(line_too_long());
        }

        if c < 0x80 {
            value.push(c as char);
        } else if !structured {
            value.push('\u{fffd}');
        } else {
            return Err(Error::data(format!(
                "Malformed header field value {}",
                value
            )));
        }
    }

    let trimmed = value.trim_start_matches(|c| ' ' == c || '\t' == c);
    if trimmed.len() != value.len() {
        value = trimmed.to_owned();
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn read(s: &[u8]) -> Result<Vec<(String, String)>, Error> {
        let mut input = s;
        read_headers(&mut input)
    }

    fn pairs(v: &[(&str, &str)]) -> Vec<(String, String)> {
        v.iter()
            .map(|&(n, v)| (n.to_owned(), v.to_owned()))
            .collect()
    }

    fn error_message(s: &[u8]) -> String {
        read(s).unwrap_err().to_string()
    }

    #[test]
    fn simple_headers() {
        assert_eq!(
            pairs(&[("subject", "Hello"), ("x-empty", ""), ("to", "a@b")]),
            read(b"Subject: Hello\r\nX-Empty:\r\nTO :a@b\r\n\r\nbody")
                .unwrap()
        );
        assert!(read(b"\r\n").unwrap().is_empty());
    }

    #[test]
    fn stops_after_blank_line() {
        let mut input = &b"A: b\r\n\r\nrest"[..];
        read_headers(&mut input).unwrap();
        assert_eq!(b"rest", input);
    }

    #[test]
    fn folding() {
        assert_eq!(
            pairs(&[("subject", "one two\tthree"), ("x", "y")]),
            read(b"Subject: one\r\n two\r\n\tthree\r\nX: y\r\n\r\n").unwrap()
        );
        // Whitespace-only continuation lines
        assert_eq!(
            pairs(&[("subject", "a  b")]),
            read(b"Subject: a\r\n \r\n b\r\n\r\n").unwrap()
        );
    }

    #[test]
    fn bare_cr_in_value() {
        assert_eq!(
            pairs(&[("x", "a\rb")]),
            read(b"X: a\rb\r\n\r\n").unwrap()
        );
        assert_eq!(
            pairs(&[("x", "a\r")]),
            read(b"X: a\r\r\n\r\n").unwrap()
        );
    }

    #[test]
    fn high_bytes() {
        assert_eq!(
            pairs(&[("subject", "caf\u{fffd}\u{fffd}")]),
            read(b"Subject: caf\xC3\xA9\r\n\r\n").unwrap()
        );
        assert_eq!(
            "Malformed header field value \u{20}caf",
            error_message(b"To: caf\xC3\xA9\r\n\r\n")
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            "Premature end before all headers were read",
            error_message(b"Subject: x\r\n")
        );
        assert_eq!(
            "Premature end before all headers were read",
            error_message(b"Subj")
        );
        assert_eq!("CR not followed by LF", error_message(b"\rX: y\r\n\r\n"));
        assert_eq!(
            "Whitespace within header field",
            error_message(b"Sub ject: x\r\n\r\n")
        );
        assert_eq!(
            "Malformed header field name",
            error_message(b": x\r\n\r\n")
        );
        assert_eq!(
            "Malformed header field name",
            error_message(b"Sub\x80ject: x\r\n\r\n")
        );
        assert_eq!("Empty header field name", error_message(b" : x\r\n\r\n"));

        let mut long = b"X: ".to_vec();
        long.extend(std::iter::repeat(b'a').take(995));
        long.extend_from_slice(b"\r\n\r\n");
        assert!(read(&long).is_ok());
        long.insert(5, b'a');
        assert_eq!("Header field line too long", error_message(&long));
    }

    #[test]
    fn space_before_colon_counts_towards_line_length() {
        let mut long = b"X   :".to_vec();
        long.extend(std::iter::repeat(b'a').take(993));
        long.extend_from_slice(b"\r\n\r\n");
        assert!(read(&long).is_ok());
        long.insert(5, b'a');
        assert_eq!("Header field line too long", error_message(&long));
    }

    proptest! {
        #[test]
        fn never_panics(
            data in prop::collection::vec(any::<u8>(), 0..200)
        ) {
            let _ = read(&data);
        }

        #[test]
        fn folded_values_unfold(
            words in prop::collection::vec("[a-z]{1,10}", 1..10)
        ) {
            let folded = format!("X: {}\r\n\r\n", words.join("\r\n "));
            let headers = read(folded.as_bytes()).unwrap();
            prop_assert_eq!(words.join(" "), headers[0].1.clone());
        }
    }
}
