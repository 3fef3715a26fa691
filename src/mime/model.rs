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

//! Syntax trees produced by the grammar in `header`.
//!
//! Everything borrows from the header value where possible; pieces that
//! needed unescaping are owned.

use std::borrow::Cow;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrSpec<'a> {
    pub local: Vec<Cow<'a, [u8]>>,
    pub domain: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxSpec<'a> {
    pub addr: AddrSpec<'a>,
    pub name: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec<'a> {
    pub name: Vec<Cow<'a, [u8]>>,
    pub boxes: Vec<MailboxSpec<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address<'a> {
    Mailbox(MailboxSpec<'a>),
    Group(GroupSpec<'a>),
}

/// A `Content-Type` value exactly as written, before names are normalised
/// and RFC 2231 extended parameters are decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMediaType<'a> {
    pub typ: &'a [u8],
    pub subtype: &'a [u8],
    pub parameters: Vec<(&'a [u8], Cow<'a, [u8]>)>,
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    parts: &[Cow<'_, [u8]>],
    sep: &str,
) -> fmt::Result {
    for (ix, part) in parts.iter().enumerate() {
        if ix > 0 {
            f.write_str(sep)?;
        }
        f.write_str(&String::from_utf8_lossy(part))?;
    }
    Ok(())
}

impl fmt::Display for AddrSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.local, ".")?;
        f.write_str("@")?;
        write_joined(f, &self.domain, ".")
    }
}

impl fmt::Display for MailboxSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.addr)
        } else {
            write_joined(f, &self.name, " ")?;
            write!(f, " <{}>", self.addr)
        }
    }
}

impl fmt::Display for Address<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Address::Mailbox(ref m) => write!(f, "{}", m),
            Address::Group(ref g) => {
                write_joined(f, &g.name, " ")?;
                f.write_str(":")?;
                for (ix, m) in g.boxes.iter().enumerate() {
                    if ix > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {}", m)?;
                }
                f.write_str(";")
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::header::parse_address_list;

    #[test]
    fn display_addresses() {
        let list = parse_address_list(
            b"John  Doe <john@example.com>, \"x\" (c) @ foo . bar, \
              Friends: a@b, c@d;",
        )
        .unwrap();
        let strs = list.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        assert_eq!(
            vec![
                "John Doe <john@example.com>",
                "x@foo.bar",
                "Friends: a@b, c@d;",
            ],
            strs
        );
    }
}
