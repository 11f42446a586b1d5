use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::frame::{self, Frame};
use crate::Error;

/// Upper bound for buffered, not yet parsed input. A single bulk argument may be up to 1 GiB,
/// the extra room covers the framing around it.
const MAX_BUFFERED: usize = frame::MAX_BULK_LEN as usize + 64 * 1024;

/// Turns the raw byte stream of a connection into request frames and reply frames back into
/// bytes.
///
/// Decoding never consumes a partial request: the parse runs over a cursor and the buffer is
/// only advanced once a whole request is available, so a short read simply waits for the next
/// chunk of data and retries from the same position.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse_request(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => {
                // Check if the frame size exceeds a certain limit to prevent DoS attacks.
                if src.len() > MAX_BUFFERED {
                    return Err("frame size exceeds limit".into());
                }
                return Ok(None);
            }
            Err(err @ frame::Error::Protocol(_)) => {
                debug!("Discarding malformed request: {}", err);
                // The broken request is answered with an error, the parsed prefix is dropped
                // and decoding carries on with whatever follows it.
                Frame::Error(format!("ERR {}", err))
            }
        };

        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&frame.serialize());
        Ok(())
    }
}
