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

//! Grammar for the structured header fields this crate needs to understand:
//! RFC 5322 address lists (with the obsolete syntax of section 4.4) and the
//! RFC 2045 media type syntax of `Content-Type`.
//!
//! The parsers operate on complete header values, so the "complete" flavour
//! of the nom combinators is used throughout.

use std::borrow::Cow;

use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, take, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, opt},
    error::ErrorKind,
    multi::{fold_many0, many0, many1, separated_nonempty_list},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::model::*;

// RFC 5322 3.2.1 "quoted-pair", including the 8-bit clean "obsolete" syntax
fn quoted_pair(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('\\'), take(1usize))(i)
}

// RFC 5322 3.2.2 "Folding white space".
// Unfolding has already happened by the time values get here, but line
// endings are still accepted as plain whitespace.
fn fws(i: &[u8]) -> IResult<&[u8], &[u8]> {
    map(is_a(" \t\r\n"), |_| &b" "[..])(i)
}

/// Comments nested deeper than this are rejected.
const MAX_COMMENT_DEPTH: usize = 64;

// RFC 5322 3.2.2 "Comment".
// The grammar is recursive, but header values have no length limit once
// unfolded, so nesting is tracked with a counter instead. Everything other
// than the parentheses and quoted pairs is ctext or FWS.
fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    let fail = || Err(nom::Err::Error((i, ErrorKind::Char)));
    if Some(&b'(') != i.first() {
        return fail();
    }

    let mut depth = 0usize;
    let mut ix = 0;
    while ix < i.len() {
        match i[ix] {
            b'(' => {
                depth += 1;
                if depth > MAX_COMMENT_DEPTH {
                    return fail();
                }
            },
            b')' => {
                depth -= 1;
                if 0 == depth {
                    return Ok((&i[ix + 1..], ()));
                }
            },
            b'\\' => ix += 1,
            _ => (),
        }
        ix += 1;
    }

    fail()
}

// RFC 5322 3.2.2 "Comment or folding white space".
fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    fold_many0(alt((map(fws, |_| ()), comment)), (), |_, _| ())(i)
}

fn is_atext(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
        // RFC 6532 Unicode
        || ch >= 0x80
}

// RFC 5322 3.2.3 "Atom text"
// Amended by RFC 6532 to include all non-ASCII characters
fn atext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_atext)(i)
}

// RFC 5322 3.2.3 "Atom"
fn atom(i: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(opt(cfws), atext, opt(cfws))(i)
}

// RFC 5322 3.2.4 "Quoted [string] text"
fn qtext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not(" \t\r\n\\\"")(i)
}

// RFC 5322 3.2.4 "Quoted [string] content"
fn qcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((qtext, quoted_pair, fws))(i)
}

// RFC 5322 3.2.4 "Quoted string"
fn quoted_string(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    delimited(
        pair(opt(cfws), char('"')),
        fold_many0(
            qcontent,
            Cow::Borrowed(&[] as &[u8]),
            |mut acc: Cow<[u8]>, item| {
                if acc.is_empty() {
                    acc = Cow::Borrowed(item);
                } else {
                    acc.to_mut().extend_from_slice(item);
                }
                acc
            },
        ),
        pair(char('"'), opt(cfws)),
    )(i)
}

// RFC 5322 3.2.5 "word"
fn word(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    alt((map(atom, Cow::Borrowed), quoted_string))(i)
}

// Part of the `obs-phrase` grammar, which accounts for the '.' that many
// agents put unquoted into display names.
fn obs_dot(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    terminated(map(char('.'), |_| Cow::Borrowed(&b"."[..])), opt(cfws))(i)
}

// RFC 5322 3.2.5 "phrase", plus the obsolete syntax
fn phrase(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    map(pair(word, many0(alt((word, obs_dot)))), |(head, mut tail)| {
        tail.insert(0, head);
        tail
    })(i)
}

// RFC 5322 3.4.1 local part of address
// `dot-atom` and `quoted-string` both conform to `obs-local-part`, so that
// is all that gets parsed.
fn local_part(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    separated_nonempty_list(char('.'), word)(i)
}

// RFC 5322 4.4 obsolete domain format
fn obs_domain(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    separated_nonempty_list(char('.'), map(atom, Cow::Borrowed))(i)
}

// RFC 5322 3.4.1 domain literal text and content
fn dtext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not("[]\\ \t\r\n")(i)
}

fn dcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((dtext, quoted_pair, fws))(i)
}

// RFC 5322 3.4.1 domain literal
fn domain_literal(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(
        delimited(
            pair(opt(cfws), char('[')),
            fold_many0(dcontent, vec![b'['], |mut acc, item| {
                acc.extend_from_slice(item);
                acc
            }),
            pair(char(']'), opt(cfws)),
        ),
        |mut res| {
            res.push(b']');
            res
        },
    )(i)
}

// RFC 5322 3.4.1 domain
fn domain(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    alt((obs_domain, map(domain_literal, |v| vec![Cow::Owned(v)])))(i)
}

// RFC 5322 3.4.1 address specification
fn addr_spec(i: &[u8]) -> IResult<&[u8], AddrSpec> {
    map(
        pair(local_part, preceded(char('@'), domain)),
        |(local, domain)| AddrSpec { local, domain },
    )(i)
}

// RFC 5322 4.4 obsolete routing information, which is discarded
fn obs_domain_list(i: &[u8]) -> IResult<&[u8], ()> {
    map(
        tuple((
            char('@'),
            domain,
            many0(tuple((
                fold_many0(
                    alt((map(fws, |_| ()), comment, map(char(','), |_| ()))),
                    (),
                    |_, _| (),
                ),
                char('@'),
                domain,
            ))),
        )),
        |_| (),
    )(i)
}

// RFC 5322 3.4 angle-delimited address, including the obsolete route
fn angle_addr(i: &[u8]) -> IResult<&[u8], AddrSpec> {
    delimited(
        tuple((
            opt(cfws),
            char('<'),
            opt(terminated(obs_domain_list, char(':'))),
        )),
        addr_spec,
        pair(char('>'), opt(cfws)),
    )(i)
}

// RFC 5322 3.4 mailbox
fn mailbox(i: &[u8]) -> IResult<&[u8], MailboxSpec> {
    map(
        alt((
            pair(opt(phrase), angle_addr),
            map(addr_spec, |a| (None, a)),
        )),
        |(name, addr)| MailboxSpec {
            name: name.unwrap_or_default(),
            addr,
        },
    )(i)
}

// Used in obsolete list syntax, which allows empty list elements
fn obs_list_delim(i: &[u8]) -> IResult<&[u8], ()> {
    map(many1(tuple((opt(cfws), char(','), opt(cfws)))), |_| ())(i)
}

// RFC 5322 3.4 mailbox list, including 4.4 obsolete syntax
fn mailbox_list(i: &[u8]) -> IResult<&[u8], Vec<MailboxSpec>> {
    delimited(
        opt(obs_list_delim),
        separated_nonempty_list(obs_list_delim, mailbox),
        opt(obs_list_delim),
    )(i)
}

// RFC 5322 3.4 group
fn group(i: &[u8]) -> IResult<&[u8], GroupSpec> {
    map(
        pair(
            terminated(phrase, char(':')),
            terminated(
                opt(mailbox_list),
                tuple((opt(cfws), char(';'), opt(cfws))),
            ),
        ),
        |(name, boxes)| GroupSpec {
            name,
            boxes: boxes.unwrap_or_default(),
        },
    )(i)
}

// RFC 5322 3.4 address
fn address(i: &[u8]) -> IResult<&[u8], Address> {
    alt((map(mailbox, Address::Mailbox), map(group, Address::Group)))(i)
}

// RFC 5322 3.4 address list, including 4.4 obsolete syntax
fn address_list(i: &[u8]) -> IResult<&[u8], Vec<Address>> {
    delimited(
        opt(obs_list_delim),
        separated_nonempty_list(obs_list_delim, address),
        opt(obs_list_delim),
    )(i)
}

// RFC 2045 5.1 "token": any CHAR except SPACE, CTLs, or tspecials
pub(super) fn is_token_char(ch: u8) -> bool {
    ch > b' ' && ch < 0x7f && !b"()<>@,;:\\\"/[]?=".contains(&ch)
}

fn mime_token(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_token_char)(i)
}

// RFC 2045 5.1 "value"
fn parameter_value(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    alt((map(mime_token, Cow::Borrowed), quoted_string))(i)
}

// RFC 2045 5.1 "parameter", including the ';' that introduces it
fn media_parameter(i: &[u8]) -> IResult<&[u8], (&[u8], Cow<[u8]>)> {
    preceded(
        tuple((opt(cfws), char(';'), opt(cfws))),
        separated_pair(
            mime_token,
            tuple((opt(cfws), char('='), opt(cfws))),
            parameter_value,
        ),
    )(i)
}

// RFC 2045 5.1 content type value. A trailing ';' is tolerated.
fn media_type(i: &[u8]) -> IResult<&[u8], RawMediaType> {
    map(
        tuple((
            delimited(opt(cfws), mime_token, opt(cfws)),
            preceded(char('/'), delimited(opt(cfws), mime_token, opt(cfws))),
            terminated(
                many0(media_parameter),
                tuple((opt(cfws), opt(char(';')), opt(cfws))),
            ),
        )),
        |(typ, subtype, parameters)| RawMediaType {
            typ,
            subtype,
            parameters,
        },
    )(i)
}

/// Parses a complete RFC 5322 `address-list`, as found in `To`, `Cc`, and
/// `Bcc`.
pub fn parse_address_list(i: &[u8]) -> Option<Vec<Address<'_>>> {
    all_consuming(address_list)(i).ok().map(|r| r.1)
}

/// Parses a complete RFC 5322 `mailbox-list`, as found in `From`.
pub fn parse_mailbox_list(i: &[u8]) -> Option<Vec<MailboxSpec<'_>>> {
    all_consuming(mailbox_list)(i).ok().map(|r| r.1)
}

/// Parses a complete `Content-Type` value.
pub fn parse_media_type(i: &[u8]) -> Option<RawMediaType<'_>> {
    all_consuming(media_type)(i).ok().map(|r| r.1)
}

/// If `i` starts with a well-formed (possibly nested) comment, returns the
/// length of that comment.
pub fn comment_length(i: &[u8]) -> Option<usize> {
    comment(i).ok().map(|(rest, ())| i.len() - rest.len())
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn s(b: &[u8]) -> &str {
        std::str::from_utf8(b).unwrap()
    }

    fn words(v: &[Cow<[u8]>]) -> Vec<String> {
        v.iter().map(|w| s(w).to_owned()).collect()
    }

    #[test]
    fn simple_addresses() {
        let list = parse_address_list(b"foo@bar.com").unwrap();
        assert_eq!(1, list.len());
        match list[0] {
            Address::Mailbox(ref m) => {
                assert!(m.name.is_empty());
                assert_eq!(vec!["foo"], words(&m.addr.local));
                assert_eq!(vec!["bar", "com"], words(&m.addr.domain));
            },
            ref a => panic!("Unexpected address: {:?}", a),
        }

        let list = parse_address_list(
            b"\"Doe, John\" <john@example.com>, Jane Q. Public \
              <jane@[127.0.0.1]> (comment)",
        )
        .unwrap();
        assert_eq!(2, list.len());
        match list[1] {
            Address::Mailbox(ref m) => {
                assert_eq!(vec!["Jane", "Q", ".", "Public"], words(&m.name));
                assert_eq!(vec!["[127.0.0.1]"], words(&m.addr.domain));
            },
            ref a => panic!("Unexpected address: {:?}", a),
        }
    }

    #[test]
    fn groups_and_obsolete_syntax() {
        let list = parse_address_list(
            b"Team: a@b.c, d@e.f;, undisclosed-recipients:;",
        )
        .unwrap();
        assert_eq!(2, list.len());
        match list[0] {
            Address::Group(ref g) => {
                assert_eq!(vec!["Team"], words(&g.name));
                assert_eq!(2, g.boxes.len());
            },
            ref a => panic!("Unexpected address: {:?}", a),
        }
        match list[1] {
            Address::Group(ref g) => assert!(g.boxes.is_empty()),
            ref a => panic!("Unexpected address: {:?}", a),
        }

        assert_eq!(
            2,
            parse_address_list(b", a@b, ,c@d,").unwrap().len()
        );
        assert_eq!(
            1,
            parse_mailbox_list(b"<@route.example,@other:x@y.z>")
                .unwrap()
                .len()
        );
    }

    #[test]
    fn invalid_addresses() {
        assert!(parse_address_list(b"").is_none());
        assert!(parse_address_list(b"not an address").is_none());
        assert!(parse_address_list(b"a@b <c@d").is_none());
        assert!(parse_mailbox_list(b"Team: a@b;").is_none());
    }

    #[test]
    fn media_types() {
        let mt = parse_media_type(b"text/plain").unwrap();
        assert_eq!("text", s(mt.typ));
        assert_eq!("plain", s(mt.subtype));
        assert!(mt.parameters.is_empty());

        let mt = parse_media_type(
            b"Multipart/Mixed ; boundary=\"simple \\\"b\\\" boundary\"; \
              charset = utf-8 (the charset);",
        )
        .unwrap();
        assert_eq!("Multipart", s(mt.typ));
        assert_eq!("Mixed", s(mt.subtype));
        assert_eq!(2, mt.parameters.len());
        assert_eq!("boundary", s(mt.parameters[0].0));
        assert_eq!("simple \"b\" boundary", s(&mt.parameters[0].1));
        assert_eq!("charset", s(mt.parameters[1].0));
        assert_eq!("utf-8", s(&mt.parameters[1].1));

        assert!(parse_media_type(b"text").is_none());
        assert!(parse_media_type(b"text/plain; charset").is_none());
        assert!(parse_media_type(b"text/plain garbage").is_none());
    }

    #[test]
    fn comments() {
        assert_eq!(Some(9), comment_length(b"(a (b) c) rest"));
        assert_eq!(Some(6), comment_length(b"(a\\)b)"));
        assert_eq!(None, comment_length(b"(unterminated"));
        assert_eq!(None, comment_length(b"no comment"));
        assert_eq!(None, comment_length(b"(trailing \\"));
    }

    #[test]
    fn deep_comments_rejected() {
        let nested = format!(
            "{}x{}",
            "(".repeat(MAX_COMMENT_DEPTH),
            ")".repeat(MAX_COMMENT_DEPTH)
        );
        assert_eq!(Some(nested.len()), comment_length(nested.as_bytes()));

        let too_deep = format!(
            "{}x{}",
            "(".repeat(MAX_COMMENT_DEPTH + 1),
            ")".repeat(MAX_COMMENT_DEPTH + 1)
        );
        assert_eq!(None, comment_length(too_deep.as_bytes()));

        let opens = "(".repeat(100_000);
        assert_eq!(None, comment_length(opens.as_bytes()));
        assert!(parse_address_list(opens.as_bytes()).is_none());
        assert!(parse_mailbox_list(opens.as_bytes()).is_none());
    }

    proptest! {
        #[test]
        fn parsers_never_panic(s in ".*") {
            parse_address_list(s.as_bytes());
            parse_mailbox_list(s.as_bytes());
            parse_media_type(s.as_bytes());
            comment_length(s.as_bytes());
        }
    }
}
