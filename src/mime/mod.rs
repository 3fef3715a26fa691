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

//! Parsing of Internet messages (RFC 5322) and MIME entities (RFC 2045
//! through RFC 2049) into a tree of `Message`s.
//!
//! Bodies are decoded through a chain of byte transforms: the raw input,
//! the multipart boundary checker when inside a multipart entity, and the
//! content-transfer-encoding decoder of the current part.

pub mod boundary;
pub mod charset;
pub mod content_encoding;
pub mod encoded_word;
pub mod encoder;
pub mod header;
pub mod header_fields;
pub mod header_reader;
pub mod media_type;
pub mod message;
pub mod model;
pub mod quoted_printable;
pub mod transform;

pub use self::content_encoding::TransferEncoding;
pub use self::media_type::MediaType;
pub use self::message::Message;
