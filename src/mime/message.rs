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

use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::mem;

use log::{debug, warn};

use super::boundary::BoundaryChecker;
use super::charset::get_charset;
use super::content_encoding::{TransferDecoder, TransferEncoding};
use super::encoded_word::strip_comments_and_extra_space;
use super::encoder::{
    has_non_ascii_or_ctl_or_too_long_word, transfer_encoding_to_use,
    EncodedWordEncoder, WordWrapEncoder,
};
use super::header::{parse_address_list, parse_mailbox_list};
use super::header_fields::get_parser;
use super::header_reader::read_headers;
use super::media_type::MediaType;
use super::transform::{ByteTransform, ReaderSource};
use crate::support::config::ParserConfig;
use crate::support::error::Error;

/// How much of a body is logged when decoding it fails.
const ERROR_CONTEXT_BYTES: usize = 80;

/// A message or body part.
///
/// Leaf entities have a decoded `body`; `multipart` entities have `parts`
/// instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    headers: Vec<(String, String)>,
    content_type: MediaType,
    transfer_encoding: TransferEncoding,
    body: Vec<u8>,
    parts: Vec<Message>,
}

impl Message {
    /// Creates an empty `text/plain; charset=us-ascii` message.
    pub fn new() -> Self {
        Message::default()
    }

    /// Parses a complete message from `reader` with the default parser
    /// configuration.
    pub fn from_stream<R: Read>(reader: R) -> Result<Self, Error> {
        Message::from_stream_with_config(reader, &ParserConfig::default())
    }

    pub fn from_stream_with_config<R: Read>(
        reader: R,
        config: &ParserConfig,
    ) -> Result<Self, Error> {
        Message::from_transform(ReaderSource::new(reader), config)
    }

    /// Parses a complete message from an arbitrary byte source.
    pub fn from_transform<T: ByteTransform>(
        mut input: T,
        config: &ParserConfig,
    ) -> Result<Self, Error> {
        let mut message = Message::new();
        message.headers = read_headers(&mut input)?;
        message.process_headers(false, false)?;

        if message.content_type.is_multipart() {
            message.read_multipart_body(input, config)
        } else {
            message.read_simple_body(input, config)?;
            Ok(message)
        }
    }

    /// The header fields, names in lowercase, in the order they appeared.
    ///
    /// In MIME entities, `Content-Type` and `Content-Transfer-Encoding` are
    /// not included; see `content_type()` and `transfer_encoding()`.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the value of the first header named `name`.
    ///
    /// `content-type` always has a value: the parsed content type.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        if "content-type".eq_ignore_ascii_case(name) {
            return Some(Cow::Owned(self.content_type.to_string()));
        }

        self.headers
            .iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| Cow::Borrowed(v.as_str()))
    }

    /// Appends a header field.
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_owned()));
    }

    pub fn content_type(&self) -> &MediaType {
        &self.content_type
    }

    /// The transfer encoding the body was declared with.
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.transfer_encoding
    }

    /// The decoded body of a leaf entity.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded to text through the charset of the content type,
    /// or US-ASCII if that is missing or unknown.
    pub fn body_text(&self) -> String {
        self.content_type
            .get_parameter("charset")
            .and_then(get_charset)
            .or_else(|| get_charset("us-ascii"))
            .map(|charset| charset.decode_document(&self.body))
            .unwrap_or_else(|| String::from_utf8_lossy(&self.body).into_owned())
    }

    /// Replaces the body with `text`, making this a UTF-8 `text/plain`
    /// entity.
    pub fn set_body(&mut self, text: &str) {
        self.body = text.as_bytes().to_vec();
        self.content_type = MediaType::text_plain_utf8();
        self.parts.clear();
    }

    /// The child entities of a `multipart` entity.
    pub fn parts(&self) -> &[Message] {
        &self.parts
    }

    /// Validates, decodes and interprets the raw header fields.
    ///
    /// `assume_mime` is set for body parts, which are MIME entities whether
    /// or not they carry `MIME-Version`. `digest` is set for the parts of a
    /// `multipart/digest`, whose default type is `message/rfc822`.
    fn process_headers(
        &mut self,
        assume_mime: bool,
        digest: bool,
    ) -> Result<(), Error> {
        let mut mime = assume_mime;

        for &mut (ref name, ref mut value) in &mut self.headers {
            let blank = value.trim().is_empty();
            match name.as_str() {
                "from" => {
                    if parse_mailbox_list(value.as_bytes()).is_none() {
                        warn!("Ignoring invalid From header: {}", value);
                    }
                },
                "to" | "cc" | "bcc" if !blank => {
                    if parse_address_list(value.as_bytes()).is_none() {
                        let label = match name.as_str() {
                            "to" => "To",
                            "cc" => "Cc",
                            _ => "Bcc",
                        };
                        return Err(Error::data(format!(
                            "Invalid {} header: {}",
                            label, value
                        )));
                    }
                },
                "mime-version" => mime = true,
                _ => (),
            }

            let mut decoded =
                get_parser(name).replace_encoded_words(value).into_owned();
            if "content-transfer-encoding" == name {
                decoded = strip_comments_and_extra_space(&decoded);
            }
            *value = decoded;
        }

        let default_type = if digest {
            MediaType::message_rfc822()
        } else {
            MediaType::text_plain_ascii()
        };
        self.content_type = default_type.clone();
        self.transfer_encoding = TransferEncoding::SevenBit;

        let mut have_content_type = false;
        let mut have_from = false;
        let mut have_to = false;
        let mut have_subject = false;
        for (name, value) in mem::take(&mut self.headers) {
            let seen = match name.as_str() {
                "content-transfer-encoding" if mime => {
                    self.transfer_encoding =
                        TransferEncoding::from_token(&value);
                    continue;
                },
                "content-type" if mime => {
                    if have_content_type {
                        return Err(already_have(&name));
                    }
                    have_content_type = true;
                    self.content_type =
                        MediaType::parse(&value, default_type.clone());
                    continue;
                },
                "from" => &mut have_from,
                "to" => &mut have_to,
                "subject" => &mut have_subject,
                _ => {
                    self.headers.push((name, value));
                    continue;
                },
            };

            if *seen {
                return Err(already_have(&name));
            }
            *seen = true;
            self.headers.push((name, value));
        }

        if TransferEncoding::Unknown == self.transfer_encoding {
            let declared = mem::replace(
                &mut self.content_type,
                MediaType::application_octet_stream(),
            );
            check_container_encoding(&declared, self.transfer_encoding)
        } else {
            check_container_encoding(
                &self.content_type,
                self.transfer_encoding,
            )
        }
    }

    /// The boundary of a multipart entity, or `None` for leaves.
    fn boundary(&self) -> Result<Option<String>, Error> {
        if !self.content_type.is_multipart() {
            return Ok(None);
        }

        let boundary =
            self.content_type.get_parameter("boundary").ok_or_else(|| {
                Error::data("Multipart message has no boundary defined")
            })?;
        if !is_well_formed_boundary(boundary) {
            return Err(Error::data(
                "Multipart message has an invalid boundary defined",
            ));
        }

        Ok(Some(boundary.to_owned()))
    }

    fn is_plain_text(&self) -> bool {
        self.content_type.is("text", "plain")
    }

    fn read_simple_body<T: ByteTransform>(
        &mut self,
        input: T,
        config: &ParserConfig,
    ) -> Result<(), Error> {
        let mut decoder = TransferDecoder::new(
            input,
            self.transfer_encoding,
            self.is_plain_text(),
            config,
        );
        while let Some(b) = read_body_byte(&mut decoder, &self.body)? {
            self.body.push(b);
        }
        Ok(())
    }

    /// Reads the parts of this multipart message.
    ///
    /// Parts are discovered one after another in a single pass over the
    /// input, so rather than recursing, the entities currently open are kept
    /// on an explicit stack, innermost last. The stack always holds as many
    /// entries as the boundary checker has levels; a part is attached to its
    /// parent when it is popped.
    fn read_multipart_body<T: ByteTransform>(
        self,
        input: T,
        config: &ParserConfig,
    ) -> Result<Self, Error> {
        let mut checker = BoundaryChecker::new(input);
        checker.push_boundary(self.boundary()?);
        let mut decoder = TransferDecoder::new(
            checker,
            self.transfer_encoding,
            self.is_plain_text(),
            config,
        );

        let mut stack = vec![self];
        let mut body = Vec::new();
        loop {
            if let Some(b) = read_body_byte(&mut decoder, &body)? {
                body.push(b);
                continue;
            }

            let mut checker = decoder.into_inner();
            if let Some(top) = stack.last_mut() {
                if top.content_type.is_multipart() {
                    // Preamble and epilogue text
                    body.clear();
                } else {
                    top.body = mem::take(&mut body);
                }
            }

            if !checker.has_new_body_part() {
                return Ok(collapse(stack));
            }

            let depth = checker.boundary_count();
            debug!("Reading headers of part at depth {}", depth);
            let digest = collapse_to(&mut stack, depth)
                .content_type
                .is("multipart", "digest");

            checker.start_body_part_headers();
            let mut part = Message::new();
            part.headers = read_headers(&mut checker)?;
            part.process_headers(true, digest)?;
            checker.push_boundary(part.boundary()?);
            checker.end_body_part_headers();

            decoder = TransferDecoder::new(
                checker,
                part.transfer_encoding,
                part.is_plain_text(),
                config,
            );
            stack.push(part);
        }
    }
}

/// Nesting depth is bounded only by the input, so the tree is torn down
/// iteratively rather than through the recursive drop of `parts`.
impl Drop for Message {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.parts);
        while let Some(mut part) = pending.pop() {
            pending.append(&mut part.parts);
        }
    }
}

/// Pops entities off `stack` until `depth` are left, attaching each to its
/// parent, and returns the new top.
///
/// The root at the bottom of the stack is never popped.
fn collapse_to(stack: &mut Vec<Message>, depth: usize) -> &Message {
    while stack.len() > depth.max(1) {
        if let Some(child) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.parts.push(child);
            }
        }
    }

    &stack[stack.len() - 1]
}

/// Closes every entity on `stack` and returns the root.
fn collapse(mut stack: Vec<Message>) -> Message {
    collapse_to(&mut stack, 1);
    stack.swap_remove(0)
}

fn already_have(name: &str) -> Error {
    Error::data(format!("Already have this header: {}", name))
}

fn check_container_encoding(
    content_type: &MediaType,
    transfer_encoding: TransferEncoding,
) -> Result<(), Error> {
    let container = match content_type.top_level_type() {
        "multipart" | "message" => true,
        _ => false,
    };

    if container && !transfer_encoding.is_identity() {
        Err(Error::data("Invalid content encoding for multipart or message"))
    } else {
        Ok(())
    }
}

/// Reads one decoded body byte, logging the context of decoding failures.
fn read_body_byte<T: ByteTransform>(
    decoder: &mut T,
    body: &[u8],
) -> Result<Option<u8>, Error> {
    decoder.read_next().map_err(|e| {
        if e.is_invalid_data() {
            let tail = &body[body.len().saturating_sub(ERROR_CONTEXT_BYTES)..];
            warn!(
                "Failed to decode body ({}) after: {}",
                e,
                String::from_utf8_lossy(tail)
            );
        }
        e
    })
}

/// Whether `boundary` is a syntactically valid RFC 2046 boundary.
pub fn is_well_formed_boundary(boundary: &str) -> bool {
    !boundary.is_empty()
        && boundary.len() <= 70
        && !boundary.ends_with(' ')
        && boundary.bytes().all(|c| {
            c.is_ascii_alphanumeric() || b" '()+_,-./:=?".contains(&c)
        })
}

/// Capitalises each hyphen-separated word of a header field name.
fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut start_of_word = true;
    for c in name.chars() {
        if start_of_word {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        start_of_word = '-' == c;
    }
    out
}

fn wrap(prefix: &str, value: &str) -> String {
    let mut encoder = WordWrapEncoder::new(prefix);
    encoder.add_str(value);
    encoder.finish()
}

/// Writes the header block, re-encoding fields as needed so that the
/// result is 7-bit clean and folded, followed by the MIME fields
/// describing the body.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &(ref name, ref value) in &self.headers {
            match name.as_str() {
                "content-type" | "mime-version"
                | "content-transfer-encoding" => continue,
                _ => (),
            }

            let prefix = format!("{}:", canonical_name(name));
            let line = if !get_parser(name).is_structured() {
                if has_non_ascii_or_ctl_or_too_long_word(value) {
                    let mut encoder = EncodedWordEncoder::new(&prefix);
                    encoder.add_str(value);
                    encoder.finish()
                } else {
                    wrap(&prefix, value)
                }
            } else if has_non_ascii_or_ctl_or_too_long_word(value)
                || value.contains("=?")
            {
                format!("{} {}", prefix, value)
            } else {
                wrap(&prefix, value)
            };
            write!(f, "{}\r\n", line)?;
        }

        f.write_str("MIME-Version: 1.0\r\n")?;
        write!(
            f,
            "{}\r\n",
            wrap("Content-Type:", &self.content_type.to_string())
        )?;
        write!(
            f,
            "Content-Transfer-Encoding: {}\r\n\r\n",
            transfer_encoding_to_use(&self.content_type, &self.body)
        )
    }
}
