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

//! The pull-based byte pipeline that every decoder is built on.
//!
//! Each stage owns the stage it reads from, so a full pipeline is a strict
//! chain like `Base64<BoundaryChecker<ReaderSource<R>>>`.

use std::io::{self, BufRead, BufReader, Read};

use crate::support::error::Error;

/// A source of bytes that is read one byte at a time.
///
/// `Ok(None)` marks the end of the stream. Once a transform has returned
/// `None`, further calls keep returning `None` unless the transform
/// documents otherwise.
pub trait ByteTransform {
    fn read_next(&mut self) -> Result<Option<u8>, Error>;
}

impl<T: ByteTransform + ?Sized> ByteTransform for &mut T {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        (**self).read_next()
    }
}

impl<T: ByteTransform + ?Sized> ByteTransform for Box<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        (**self).read_next()
    }
}

impl ByteTransform for &[u8] {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        match self.split_first() {
            Some((&head, tail)) => {
                *self = tail;
                Ok(Some(head))
            },
            None => Ok(None),
        }
    }
}

/// Adapts any `Read` into a `ByteTransform`.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: BufReader<R>,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        ReaderSource {
            inner: BufReader::new(inner),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> ByteTransform for ReaderSource<R> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        loop {
            let next = match self.inner.fill_buf() {
                Ok(buf) => buf.first().copied(),
                Err(e) if io::ErrorKind::Interrupted == e.kind() => continue,
                Err(e) => return Err(e.into()),
            };

            if next.is_some() {
                self.inner.consume(1);
            }
            return Ok(next);
        }
    }
}

/// Wraps a transform with a single byte of pushback.
///
/// `unget()` makes the next `read_next()` return the value most recently
/// returned again, which may be `None`. Calling `unget()` twice without a
/// read in between is a bug in the caller.
#[derive(Debug)]
pub struct PushbackTransform<T> {
    inner: T,
    last: Option<u8>,
    unget: bool,
}

impl<T> PushbackTransform<T> {
    pub fn new(inner: T) -> Self {
        PushbackTransform {
            inner,
            last: None,
            unget: false,
        }
    }

    pub fn unget(&mut self) {
        debug_assert!(!self.unget, "unget() called twice without a read");
        self.unget = true;
    }

    /// Unwraps the underlying transform.
    ///
    /// Any pending pushback is lost, so this is only meaningful once the
    /// wrapper has reached a point where nothing has been pushed back.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: ByteTransform> ByteTransform for PushbackTransform<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        if self.unget {
            self.unget = false;
        } else {
            self.last = self.inner.read_next()?;
        }
        Ok(self.last)
    }
}

/// Drains `transform` into a byte vector.
pub fn read_to_end<T: ByteTransform + ?Sized>(
    transform: &mut T,
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    while let Some(b) = transform.read_next()? {
        out.push(b);
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn pushback_replays_last_value() {
        let mut pb = PushbackTransform::new(&b"ab"[..]);
        assert_eq!(Some(b'a'), pb.read_next().unwrap());
        pb.unget();
        assert_eq!(Some(b'a'), pb.read_next().unwrap());
        assert_eq!(Some(b'b'), pb.read_next().unwrap());
        assert_eq!(None, pb.read_next().unwrap());
        pb.unget();
        assert_eq!(None, pb.read_next().unwrap());
        assert_eq!(None, pb.read_next().unwrap());
    }

    #[test]
    fn reader_source_surfaces_io_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "broken"))
            }
        }

        let mut source = ReaderSource::new(Broken);
        assert_matches!(Err(Error::Io(..)), source.read_next());
    }

    proptest! {
        #[test]
        fn reader_source_yields_every_byte(
            data in prop::collection::vec(any::<u8>(), 0..20000)
        ) {
            let mut source = ReaderSource::new(&data[..]);
            prop_assert_eq!(data.clone(), read_to_end(&mut source).unwrap());
            prop_assert_eq!(None, source.read_next().unwrap());
        }
    }
}
