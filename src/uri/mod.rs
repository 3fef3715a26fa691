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

//! Splitting, escaping and resolution of IRI references (RFC 3987) and URI
//! references (RFC 3986).
//!
//! Everything here is a pure function of its input. Offsets are in the
//! code units of the input text: bytes for `str`, UTF-16 code units for
//! `[u16]`.

use std::fmt;
use std::str::FromStr;

use crate::support::error::Error;

mod chars;
pub mod escape;
pub mod resolve;
pub mod split;
pub mod text;

pub use self::escape::{escape_uri, EscapeMode};
pub use self::resolve::{normalize_path, relative_resolve};
pub use self::split::{
    has_scheme, has_scheme_for_uri, is_valid_curie_reference, is_valid_iri,
    split_iri, split_iri_at, IriSegments,
};
pub use self::text::IriText;

/// Controls which characters are accepted when splitting a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    /// Full RFC 3987 grammar. Unpaired surrogates are invalid.
    IriStrict,
    /// Full RFC 3986 grammar. Non-ASCII characters are invalid.
    UriStrict,
    /// Only the delimiters between components are located. Unpaired
    /// surrogates are invalid.
    IriLenient,
    /// Like `IriLenient`, but non-ASCII characters are invalid.
    UriLenient,
    /// Like `IriLenient`, but unpaired surrogates are read as U+FFFD.
    IriSurrogateLenient,
}

impl Default for ParseMode {
    fn default() -> Self {
        ParseMode::IriStrict
    }
}

impl ParseMode {
    pub(crate) fn is_strict(self) -> bool {
        match self {
            ParseMode::IriStrict | ParseMode::UriStrict => true,
            _ => false,
        }
    }

    pub(crate) fn is_ascii_only(self) -> bool {
        match self {
            ParseMode::UriStrict | ParseMode::UriLenient => true,
            _ => false,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParseMode::IriStrict => "iri-strict",
            ParseMode::UriStrict => "uri-strict",
            ParseMode::IriLenient => "iri-lenient",
            ParseMode::UriLenient => "uri-lenient",
            ParseMode::IriSurrogateLenient => "iri-surrogate-lenient",
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        [
            ParseMode::IriStrict,
            ParseMode::UriStrict,
            ParseMode::IriLenient,
            ParseMode::UriLenient,
            ParseMode::IriSurrogateLenient,
        ]
        .iter()
        .copied()
        .find(|mode| mode.name().eq_ignore_ascii_case(s))
        .ok_or_else(|| {
            Error::InvalidArgument(format!("unknown parse mode: {}", s))
        })
    }
}
