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

//! Per-field knowledge of header semantics: which fields are structured,
//! and how encoded words in them are decoded.

use std::borrow::Cow;

use super::encoded_word::replace_encoded_words;

pub trait HeaderFieldParser: Sync {
    /// Whether the field has RFC 5322 structure, in which case 8-bit bytes
    /// in its raw value are an error rather than replaced.
    fn is_structured(&self) -> bool;

    /// Decodes any RFC 2047 encoded words in the places this field allows
    /// them.
    fn replace_encoded_words<'a>(&self, value: &'a str) -> Cow<'a, str>;
}

/// Free text; encoded words may appear anywhere.
struct Unstructured;

impl HeaderFieldParser for Unstructured {
    fn is_structured(&self) -> bool {
        false
    }

    fn replace_encoded_words<'a>(&self, value: &'a str) -> Cow<'a, str> {
        replace_encoded_words(value, false)
    }
}

/// Address fields; encoded words occur in display names and comments.
struct Addresses;

impl HeaderFieldParser for Addresses {
    fn is_structured(&self) -> bool {
        true
    }

    fn replace_encoded_words<'a>(&self, value: &'a str) -> Cow<'a, str> {
        replace_encoded_words(value, true)
    }
}

/// Other structured fields, which never carry encoded words.
struct Structured;

impl HeaderFieldParser for Structured {
    fn is_structured(&self) -> bool {
        true
    }

    fn replace_encoded_words<'a>(&self, value: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(value)
    }
}

static UNSTRUCTURED: Unstructured = Unstructured;
static ADDRESSES: Addresses = Addresses;
static STRUCTURED: Structured = Structured;

/// Looks up the parser for the header field `name` (case-insensitive).
///
/// Fields nobody registered, including every `X-` field, are unstructured.
pub fn get_parser(name: &str) -> &'static dyn HeaderFieldParser {
    match name.to_ascii_lowercase().as_str() {
        "from" | "sender" | "reply-to" | "to" | "cc" | "bcc"
        | "resent-from" | "resent-sender" | "resent-reply-to"
        | "resent-to" | "resent-cc" | "resent-bcc" => &ADDRESSES,

        "date"
        | "resent-date"
        | "message-id"
        | "resent-message-id"
        | "in-reply-to"
        | "references"
        | "received"
        | "return-path"
        | "mime-version"
        | "content-type"
        | "content-transfer-encoding"
        | "content-id"
        | "content-disposition"
        | "content-language"
        | "content-location"
        | "content-base"
        | "content-md5" => &STRUCTURED,

        _ => &UNSTRUCTURED,
    }
}
