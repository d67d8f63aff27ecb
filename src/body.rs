use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Request or response payload.
///
/// A body is either fully buffered (replayable) or a byte stream that can be
/// read exactly once.
pub struct Body {
    kind: Kind,
}

enum Kind {
    Full(Bytes),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl Body {
    pub fn empty() -> Self {
        Self {
            kind: Kind::Full(Bytes::new()),
        }
    }

    /// Wraps a one-shot byte stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            kind: Kind::Stream(stream.boxed()),
        }
    }

    /// Wraps any async reader as a one-shot byte stream.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::from_stream(ReaderStream::new(reader))
    }

    /// Returns the bytes if the body is buffered.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.kind {
            Kind::Full(bytes) => Some(bytes),
            Kind::Stream(_) => None,
        }
    }

    /// Whether the body can be sent more than once without buffering.
    pub fn is_replayable(&self) -> bool {
        matches!(self.kind, Kind::Full(_))
    }

    /// Clones a buffered body; streams cannot be cloned.
    pub fn try_clone(&self) -> Option<Self> {
        match &self.kind {
            Kind::Full(bytes) => Some(Self::from(bytes.clone())),
            Kind::Stream(_) => None,
        }
    }

    /// Reads the whole body into memory.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self.kind {
            Kind::Full(bytes) => Ok(bytes),
            Kind::Stream(stream) => {
                let buffer = stream
                    .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                        buffer.extend_from_slice(&chunk);
                        Ok(buffer)
                    })
                    .await?;
                Ok(buffer.freeze())
            }
        }
    }

    /// Converts the body into a chunk stream regardless of its kind.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        match self.kind {
            Kind::Full(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            Kind::Stream(stream) => stream,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Full(bytes) => f.debug_tuple("Body").field(&bytes.len()).finish(),
            Kind::Stream(_) => f.write_str("Body(<stream>)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            kind: Kind::Full(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use bytes::Bytes;
    use futures::stream;

    use super::Body;

    #[tokio::test]
    async fn stream_body_collects_all_chunks() {
        let body = Body::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ]));
        assert!(!body.is_replayable());
        assert!(body.try_clone().is_none());
        assert_eq!(body.collect().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn stream_error_surfaces_on_collect() {
        let body = Body::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "cut")),
        ]));
        let err = body.collect().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn reader_body_is_one_shot_stream() {
        let body = Body::from_reader(io::Cursor::new(b"from reader".to_vec()));
        assert!(body.as_bytes().is_none());
        assert_eq!(
            body.collect().await.unwrap(),
            Bytes::from_static(b"from reader")
        );
    }

    #[test]
    fn buffered_body_clones() {
        let body = Body::from("payload");
        let copy = body.try_clone().expect("buffered body must clone");
        assert_eq!(copy.as_bytes(), Some(&b"payload"[..]));
        assert_eq!(body.as_bytes(), Some(&b"payload"[..]));
    }
}
