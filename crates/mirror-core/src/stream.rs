//! Shared byte-stream type.
//!
//! Items are `std::io::Result<Bytes>` so the same stream can be written to a
//! file, sent as a request body, or handed to an HTTP response without
//! re-wrapping the error type.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

/// A boxed, sendable stream of byte chunks.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// A stream yielding one chunk.
pub fn single_chunk(bytes: impl Into<Bytes>) -> ByteStream {
    stream::once(futures::future::ready(Ok(bytes.into()))).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_chunk_yields_once() {
        let mut s = single_chunk("abc");
        assert_eq!(s.next().await.unwrap().unwrap(), Bytes::from("abc"));
        assert!(s.next().await.is_none());
    }
}
