//! Frame assembly on top of a byte stream.
//!
//! There is no length prefix: the first byte of a frame is its tag and
//! the tag fixes the frame size. Reads loop (via `read_exact`) until the
//! whole frame is in the buffer; only then does the codec see it.

use std::io;

use donation_protocol::binary_codec::{
    decode_request, decode_response, encode_request, encode_response,
};
use donation_protocol::wire_types::{request_frame_len, response_frame_len};
use donation_protocol::{FrameLayout, ProtocolError, Request, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Outcome of waiting for the next client frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Incoming {
    /// A complete frame. Decoding may still have rejected it.
    Frame(Result<Request, ProtocolError>),
    /// The peer closed the stream on a frame boundary.
    Closed,
}

/// Reads whole frames from an async byte stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    layout: FrameLayout,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, layout: FrameLayout) -> Self {
        FrameReader {
            inner,
            layout,
            buf: Vec::with_capacity(32),
        }
    }

    /// Next client → server frame.
    ///
    /// End of stream before a tag byte is a clean close; end of stream
    /// inside a frame is `UnexpectedEof`.
    pub async fn next_request(&mut self) -> io::Result<Incoming> {
        let layout = self.layout;
        if !self.fill(|tag| Ok(request_frame_len(layout, tag))).await? {
            return Ok(Incoming::Closed);
        }
        Ok(Incoming::Frame(decode_request(&self.buf, layout)))
    }

    /// Next server → client frame, `None` on a clean close.
    pub async fn next_response(&mut self) -> io::Result<Option<Response>> {
        let layout = self.layout;
        let sized = |tag| {
            response_frame_len(layout, tag).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, ProtocolError::UnknownTag(tag))
            })
        };
        if !self.fill(sized).await? {
            return Ok(None);
        }
        decode_response(&self.buf, layout)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read one full frame into `buf`. `false` on EOF before the tag.
    async fn fill(&mut self, frame_len: impl FnOnce(u8) -> io::Result<usize>) -> io::Result<bool> {
        let mut tag = [0u8; 1];
        if self.inner.read(&mut tag).await? == 0 {
            return Ok(false);
        }

        let len = frame_len(tag[0])?;
        self.buf.clear();
        self.buf.resize(len, 0);
        self.buf[0] = tag[0];
        self.inner.read_exact(&mut self.buf[1..]).await?;
        Ok(true)
    }
}

pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Request,
    layout: FrameLayout,
) -> io::Result<()> {
    let mut frame = Vec::with_capacity(32);
    encode_request(msg, layout, &mut frame);
    writer.write_all(&frame).await?;
    writer.flush().await
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Response,
    layout: FrameLayout,
) -> io::Result<()> {
    let mut frame = Vec::with_capacity(32);
    encode_response(msg, layout, &mut frame);
    writer.write_all(&frame).await?;
    writer.flush().await
}
