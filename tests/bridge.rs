mod common;

use std::io::Cursor;
use std::sync::mpsc;
use std::thread;

use image::{DynamicImage, ImageOutputFormat};
use multiface::bridge::{Server, QUIT};
use multiface::geometry::Rect;
use nng::{Message, Protocol, Socket};

use common::{tracker, ScriptedDetector};

const ADDRESS: &str = "inproc://multiface-bridge-test";

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::new_luma8(width, height)
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn request(socket: &Socket, body: &[u8]) -> serde_json::Value {
    socket.send(Message::from(body)).unwrap();
    let reply = socket.recv().unwrap();
    serde_json::from_slice(reply.as_slice()).unwrap()
}

#[test]
fn request_reply_round_trip() {
    let (ready_tx, ready_rx) = mpsc::channel();

    let server = thread::spawn(move || {
        let mut tracker = tracker(
            2,
            ScriptedDetector::new(vec![vec![Rect::new(10.0, 10.0, 40.0, 40.0)]]),
        );
        let server = Server::listen(ADDRESS).unwrap();
        ready_tx.send(()).unwrap();
        server.serve(&mut tracker).unwrap()
    });

    ready_rx.recv().unwrap();
    let client = Socket::new(Protocol::Req0).unwrap();
    client.dial(ADDRESS).unwrap();

    let reply = request(&client, &png(64, 48));
    assert_eq!(reply["frame_index"], 0);
    assert_eq!(reply["found"], true);
    assert_eq!(reply["active_slots"], 1);
    assert_eq!(reply["intrinsics"]["cx"], 32.0);
    assert_eq!(reply["faces"][0]["bbox"]["width"], 40.0);
    assert_eq!(reply["faces"][0]["landmarks"].as_array().unwrap().len(), 2);

    let reply = request(&client, b"definitely not an image");
    assert!(reply["error"].is_string());

    let reply = request(&client, &png(64, 48));
    assert_eq!(reply["frame_index"], 1);
    assert_eq!(reply["active_slots"], 1);

    let reply = request(&client, QUIT);
    assert_eq!(reply["status"], "bye");

    assert_eq!(server.join().unwrap(), 2);
}
