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

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use mimetree::mime::transform::{ByteTransform, ReaderSource};
use mimetree::mime::Message;
use mimetree::support::config::{Config, ParserConfig};
use mimetree::support::error::Error;
use mimetree::support::sysexits::*;

use super::main::ParseSubcommand;

pub(super) fn parse(config: Config, cmd: ParseSubcommand) {
    let result = if Path::new("-") == cmd.input {
        read_message(io::stdin().lock(), &config.parser, cmd.fix_line_endings)
    } else {
        match fs::File::open(&cmd.input) {
            Ok(file) => {
                read_message(file, &config.parser, cmd.fix_line_endings)
            },
            Err(e) => die!(EX_NOINPUT, "{}: {}", cmd.input.display(), e),
        }
    };

    let message = match result {
        Ok(message) => message,
        Err(e) => die!(
            Sysexit::for_error(&e),
            "Unable to parse {}: {}",
            cmd.input.display(),
            e
        ),
    };

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let written = if cmd.serialize {
        write!(stdout, "{}", message)
    } else {
        print_tree(&mut stdout, &message, cmd.headers)
    };

    if let Err(e) = written {
        die!(EX_IOERR, "Error writing output: {}", e);
    }
}

fn read_message(
    reader: impl Read,
    config: &ParserConfig,
    fix_line_endings: bool,
) -> Result<Message, Error> {
    let source = ReaderSource::new(reader);
    if fix_line_endings {
        Message::from_transform(NormaliseLineEnding::new(source), config)
    } else {
        Message::from_transform(source, config)
    }
}

fn print_tree(
    out: &mut impl Write,
    root: &Message,
    headers: bool,
) -> io::Result<()> {
    // Depth-first, with an explicit stack since nesting is unbounded
    let mut pending = vec![(0, root)];
    while let Some((depth, message)) = pending.pop() {
        let indent = "  ".repeat(depth);
        write!(
            out,
            "{}{} [{}] {} headers",
            indent,
            message.content_type().type_and_subtype(),
            message.transfer_encoding(),
            message.headers().len()
        )?;
        if message.parts().is_empty() {
            writeln!(out, ", {} bytes", message.body().len())?;
        } else {
            writeln!(out, ", {} parts", message.parts().len())?;
        }

        if headers {
            for &(ref name, ref value) in message.headers() {
                writeln!(out, "{}  | {}: {}", indent, name, value)?;
            }
        }

        pending.extend(message.parts().iter().rev().map(|p| (depth + 1, p)));
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEndingDisposition {
    Unknown,
    Unix,
    Dos,
}

/// Converts UNIX line endings to DOS line endings, if the first line ending
/// in the input is a UNIX one.
#[derive(Debug)]
struct NormaliseLineEnding<T> {
    inner: T,
    disposition: LineEndingDisposition,
    last_was_cr: bool,
    queued_lf: bool,
}

impl<T> NormaliseLineEnding<T> {
    fn new(inner: T) -> Self {
        NormaliseLineEnding {
            inner,
            disposition: LineEndingDisposition::Unknown,
            last_was_cr: false,
            queued_lf: false,
        }
    }
}

impl<T: ByteTransform> ByteTransform for NormaliseLineEnding<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        if self.queued_lf {
            self.queued_lf = false;
            return Ok(Some(b'\n'));
        }

        let next = self.inner.read_next()?;
        if Some(b'\n') == next {
            if LineEndingDisposition::Unknown == self.disposition {
                self.disposition = if self.last_was_cr {
                    LineEndingDisposition::Dos
                } else {
                    LineEndingDisposition::Unix
                };
            }

            if LineEndingDisposition::Unix == self.disposition
                && !self.last_was_cr
            {
                self.queued_lf = true;
                return Ok(Some(b'\r'));
            }
        }

        self.last_was_cr = Some(b'\r') == next;
        Ok(next)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn normalise(input: &[u8]) -> Vec<u8> {
        let mut transform = NormaliseLineEnding::new(input);
        let mut out = Vec::new();
        while let Some(b) = transform.read_next().unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn unix_line_conversion() {
        assert_eq!(
            b"line 1\r\nline 2\r\n".to_vec(),
            normalise(b"line 1\nline 2\n")
        );
        assert_eq!(b"a\r\nb\r\nc\r\n".to_vec(), normalise(b"a\nb\r\nc\n"));
        assert_eq!(b"\r\n\r\n".to_vec(), normalise(b"\n\n"));
    }

    #[test]
    fn dos_line_non_conversion() {
        assert_eq!(b"a\r\nb\nc\r\n".to_vec(), normalise(b"a\r\nb\nc\r\n"));
        assert_eq!(b"no line ending".to_vec(), normalise(b"no line ending"));
    }

    #[test]
    fn parse_unix_message() {
        let message = read_message(
            &b"Subject: hi\nContent-Type: text/plain\n\nbody\n"[..],
            &ParserConfig::default(),
            true,
        )
        .unwrap();
        assert_eq!(b"body\r\n", message.body());

        assert!(read_message(
            &b"Subject: hi\n\nbody\n"[..],
            &ParserConfig::default(),
            false,
        )
        .is_err());
    }

    #[test]
    fn tree_output() {
        let message = read_message(
            &b"MIME-Version: 1.0\r\n\
               Subject: tree\r\n\
               Content-Type: multipart/mixed; boundary=X\r\n\
               \r\n\
               --X\r\n\
               \r\n\
               hello\r\n\
               --X\r\n\
               Content-Type: application/octet-stream\r\n\
               Content-Transfer-Encoding: base64\r\n\
               \r\n\
               AAEC\r\n\
               --X--\r\n"[..],
            &ParserConfig::default(),
            false,
        )
        .unwrap();

        let mut out = Vec::new();
        print_tree(&mut out, &message, true).unwrap();
        assert_eq!(
            "multipart/mixed [7bit] 2 headers, 2 parts\n\
             \x20\x20| mime-version: 1.0\n\
             \x20\x20| subject: tree\n\
             \x20\x20text/plain [7bit] 0 headers, 5 bytes\n\
             \x20\x20application/octet-stream [base64] 0 headers, 3 bytes\n",
            String::from_utf8(out).unwrap()
        );
    }

    #[test]
    fn nested_tree_output() {
        let message = read_message(
            &b"MIME-Version: 1.0\r\n\
               Content-Type: multipart/mixed; boundary=A\r\n\
               \r\n\
               --A\r\n\
               Content-Type: multipart/alternative; boundary=B\r\n\
               \r\n\
               --B\r\n\
               \r\n\
               one\r\n\
               --B--\r\n\
               --A\r\n\
               \r\n\
               two\r\n\
               --A--\r\n"[..],
            &ParserConfig::default(),
            false,
        )
        .unwrap();

        let mut out = Vec::new();
        print_tree(&mut out, &message, false).unwrap();
        assert_eq!(
            "multipart/mixed [7bit] 1 headers, 2 parts\n\
             \x20\x20multipart/alternative [7bit] 0 headers, 1 parts\n\
             \x20\x20\x20\x20text/plain [7bit] 0 headers, 3 bytes\n\
             \x20\x20text/plain [7bit] 0 headers, 3 bytes\n",
            String::from_utf8(out).unwrap()
        );
    }

    proptest! {
        #[test]
        fn dos_input_is_untouched(
            lines in prop::collection::vec("[a-z\n]{0,10}", 0..5)
        ) {
            let input = lines.join("\r\n") + "\r\n";
            let input = input.into_bytes();
            if input.iter().position(|&b| b'\n' == b)
                .map_or(true, |ix| ix > 0 && b'\r' == input[ix - 1])
            {
                prop_assert_eq!(input.clone(), normalise(&input));
            }
        }
    }
}
