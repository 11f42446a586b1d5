use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// A client connection: the socket wrapped in the frame codec, plus an id used to tell
/// connections apart in the logs.
pub struct Connection {
    pub id: Uuid,
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            framed: Framed::new(stream, FrameCodec),
        }
    }

    /// Reads the next request. Returns `None` once the peer closed the connection.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.framed.send(frame).await
    }
}
