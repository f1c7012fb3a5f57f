//! nng transports: a request/reply server that tracks faces in images sent by a
//! client, and a publisher that streams every frame's result.

use nng::{Message, Protocol, Socket};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::frame_source::Frame;
use crate::tracker::{FrameResult, Tracker};

/// Request body that shuts the server down.
pub const QUIT: &[u8] = b"quit";

fn send(socket: &Socket, body: &[u8]) -> Result<()> {
    socket
        .send(Message::from(body))
        .map_err(|(_, e)| e)?;
    Ok(())
}

/// Reply socket answering each encoded image with the tracking result as JSON.
pub struct Server {
    socket: Socket,
}

impl Server {
    pub fn listen(address: &str) -> Result<Self> {
        let socket = Socket::new(Protocol::Rep0)?;
        socket.listen(address)?;
        info!(address, "server listening");

        Ok(Self { socket })
    }

    /// Serves requests until a client sends [`QUIT`]. Returns the number of frames
    /// tracked.
    ///
    /// A body that does not decode as an image is answered with
    /// `{"error": "..."}` and does not stop the loop.
    pub fn serve(&self, tracker: &mut Tracker) -> Result<u64> {
        let mut frame_index = 0;

        loop {
            let request = self.socket.recv()?;

            if request.as_slice() == QUIT {
                send(&self.socket, json!({ "status": "bye" }).to_string().as_bytes())?;
                info!(frames = frame_index, "server stopped");
                return Ok(frame_index);
            }

            let reply = match image::load_from_memory(request.as_slice()) {
                Ok(raw) => {
                    let frame = Frame::new(frame_index, raw);
                    frame_index += 1;
                    let result = tracker.track(&frame);
                    debug!(frame = result.frame_index, faces = result.faces.len(), "replying");
                    result.to_json()?
                }
                Err(e) => {
                    warn!(error = %e, bytes = request.len(), "request is not an image");
                    json!({ "error": e.to_string() }).to_string()
                }
            };

            send(&self.socket, reply.as_bytes())?;
        }
    }
}

/// Listens on `address` and serves `tracker` until told to quit.
pub fn serve(address: &str, tracker: &mut Tracker) -> Result<u64> {
    Server::listen(address)?.serve(tracker)
}

/// Publish socket emitting one JSON message per tracked frame.
pub struct Publisher {
    socket: Socket,
}

impl Publisher {
    pub fn bind(address: &str) -> Result<Self> {
        let socket = Socket::new(Protocol::Pub0)?;
        socket.listen(address)?;
        info!(address, "publishing results");
        Ok(Self { socket })
    }

    pub fn publish(&self, result: &FrameResult) -> Result<()> {
        send(&self.socket, result.to_json()?.as_bytes())
    }
}
