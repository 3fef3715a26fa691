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

//! Detection of multipart boundary delimiter lines (RFC 2046 section 5.1).

use std::collections::VecDeque;

use log::debug;

use super::transform::{ByteTransform, PushbackTransform};
use crate::support::error::Error;

/// The longest boundary RFC 2046 allows, plus the two closing hyphens.
const MAX_DELIMITER_TAIL: usize = 72;

fn premature_end() -> Error {
    Error::data("Premature end of message")
}

/// Passes bytes through while hiding multipart delimiter lines.
///
/// The checker keeps a stack of the boundaries of every open entity, outer
/// to inner. Entities that are not multipart sit on the stack as `None` so
/// that the stack depth always matches the nesting of the parts being read.
///
/// A delimiter line is `--boundary` at the very start of the input or right
/// after a CRLF; the CRLF belongs to the delimiter and is not emitted.
/// Boundaries are tried from the innermost outward, and the first one that
/// is a prefix of the line wins.
///
/// When a delimiter opens a new part, the rest of its line is consumed,
/// `has_new_body_part()` becomes true, and `read_next()` returns `None`
/// until the caller has read the new part's headers through
/// `start_body_part_headers()` / `end_body_part_headers()`. When a closing
/// delimiter ends the outermost multipart, `read_next()` returns `None` for
/// good.
#[derive(Debug)]
pub struct BoundaryChecker<T> {
    input: PushbackTransform<T>,
    boundaries: Vec<Option<String>>,
    pending: VecDeque<u8>,
    started: bool,
    reading_headers: bool,
    has_new_body_part: bool,
    ended: bool,
}

impl<T: ByteTransform> BoundaryChecker<T> {
    pub fn new(input: T) -> Self {
        BoundaryChecker {
            input: PushbackTransform::new(input),
            boundaries: Vec::new(),
            pending: VecDeque::new(),
            started: true,
            reading_headers: false,
            has_new_body_part: false,
            ended: false,
        }
    }

    /// Enters a new entity, which is multipart if `boundary` is given.
    pub fn push_boundary(&mut self, boundary: Option<String>) {
        self.boundaries.push(boundary);
    }

    /// The depth of the entity stack after the last delimiter seen.
    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    pub fn has_new_body_part(&self) -> bool {
        self.has_new_body_part
    }

    /// Switches to passing the header block of a new part through
    /// unchanged.
    pub fn start_body_part_headers(&mut self) {
        debug_assert!(self.has_new_body_part);
        debug_assert!(!self.reading_headers);
        debug_assert!(self.pending.is_empty());

        self.reading_headers = true;
        self.has_new_body_part = false;
    }

    /// Resumes delimiter detection for the body of the new part.
    ///
    /// The blank line that ended the headers counts as a line break, so a
    /// delimiter immediately after it is recognised.
    pub fn end_body_part_headers(&mut self) {
        debug_assert!(self.reading_headers);
        debug_assert!(self.pending.is_empty());

        self.reading_headers = false;
        self.has_new_body_part = false;
        self.started = true;
    }

    fn check_boundaries(
        &mut self,
        include_crlf: bool,
    ) -> Result<Option<u8>, Error> {
        // Set once a closing delimiter has been seen: anything that is not a
        // delimiter is then epilogue and is dropped instead of replayed.
        let mut in_epilogue = false;

        loop {
            let mut line = Vec::with_capacity(MAX_DELIMITER_TAIL);
            while line.len() < MAX_DELIMITER_TAIL {
                match self.input.read_next()? {
                    Some(c) if c < 0x80 && b'\r' != c => line.push(c),
                    _ => {
                        self.input.unget();
                        break;
                    },
                }
            }

            let matched = self
                .boundaries
                .iter()
                .enumerate()
                .rev()
                .filter_map(|(ix, b)| b.as_ref().map(|b| (ix, b)))
                .find(|&(_, b)| {
                    !b.is_empty() && line.starts_with(b.as_bytes())
                })
                .map(|(ix, b)| (ix, b.len()));

            let (ix, len) = match matched {
                Some(m) => m,
                None if in_epilogue => {
                    self.skip_to_delimiter_line()?;
                    continue;
                },
                None => {
                    if include_crlf {
                        self.pending.extend(b"\n--");
                    } else {
                        self.pending.push_back(b'-');
                    }
                    self.pending.extend(line);
                    return Ok(Some(if include_crlf { b'\r' } else { b'-' }));
                },
            };

            self.boundaries.truncate(ix + 1);
            if !line[len..].starts_with(b"--") {
                self.skip_line()?;
                self.has_new_body_part = true;
                debug!("New body part at depth {}", self.boundaries.len());
                return Ok(None);
            }

            self.boundaries.pop();
            debug!("Multipart closed at depth {}", self.boundaries.len());
            if self.boundaries.is_empty() {
                self.ended = true;
                return Ok(None);
            }

            in_epilogue = true;
            self.skip_to_delimiter_line()?;
        }
    }

    /// Consumes the input through the next CRLF.
    fn skip_line(&mut self) -> Result<(), Error> {
        loop {
            match self.input.read_next()? {
                None => return Err(premature_end()),
                Some(b'\r') => match self.input.read_next()? {
                    None => return Err(premature_end()),
                    Some(b'\n') => return Ok(()),
                    Some(_) => self.input.unget(),
                },
                Some(_) => (),
            }
        }
    }

    /// Skips whole lines until one starts with `--`, consuming the hyphens.
    fn skip_to_delimiter_line(&mut self) -> Result<(), Error> {
        'line: loop {
            self.skip_line()?;
            for _ in 0..2 {
                match self.input.read_next()? {
                    None => return Err(premature_end()),
                    Some(b'-') => (),
                    Some(_) => {
                        self.input.unget();
                        continue 'line;
                    },
                }
            }
            return Ok(());
        }
    }

    fn replay_line_break(&mut self, tail: &[u8]) -> Option<u8> {
        self.pending.push_back(b'\n');
        self.pending.extend(tail);
        Some(b'\r')
    }
}

impl<T: ByteTransform> ByteTransform for BoundaryChecker<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(Some(b));
        }

        if self.has_new_body_part || self.ended {
            return Ok(None);
        }

        if self.reading_headers {
            return self.input.read_next();
        }

        let c = match self.input.read_next()? {
            Some(c) => c,
            None => {
                self.started = false;
                return Ok(None);
            },
        };

        if self.started {
            self.started = false;
            if b'-' == c {
                if Some(b'-') == self.input.read_next()? {
                    return self.check_boundaries(false);
                }
                self.input.unget();
                return Ok(Some(b'-'));
            }
        }

        if b'\r' != c {
            return Ok(Some(c));
        }

        if Some(b'\n') != self.input.read_next()? {
            self.input.unget();
            return Ok(Some(b'\r'));
        }

        // A CR is pushed back rather than buffered since it may start
        // another CRLF that precedes a delimiter.
        match self.input.read_next()? {
            Some(b'-') => (),
            Some(b'\r') | None => {
                self.input.unget();
                return Ok(self.replay_line_break(b""));
            },
            Some(c) => return Ok(self.replay_line_break(&[c])),
        }

        match self.input.read_next()? {
            Some(b'-') => self.check_boundaries(true),
            Some(b'\r') | None => {
                self.input.unget();
                Ok(self.replay_line_break(b"-"))
            },
            Some(c) => Ok(self.replay_line_break(&[b'-', c])),
        }
    }
}
