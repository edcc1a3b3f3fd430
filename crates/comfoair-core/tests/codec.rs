//! Raw frame streaming over an async byte stream

use comfoair_core::protocol::{framed, Frame, FrameDecoder, Message, ParamValue, Request, ACK};
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn temperature_reply() -> Vec<u8> {
    Frame::new(
        [0x00, 0xD2],
        vec![0x28, 0x30, 0x32, 0x34, 0x36, 0x01, 0x28, 0x28, 0x28],
    )
    .unwrap()
    .to_bytes()
}

#[tokio::test]
async fn test_framed_reads_split_stream() {
    let (host, mut device) = tokio::io::duplex(256);
    let mut link = framed(host, true);

    let mut wire = vec![0x42, 0x00];
    wire.extend_from_slice(&ACK);
    wire.extend(temperature_reply());

    let writer = tokio::spawn(async move {
        for chunk in wire.chunks(3) {
            device.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
        device
    });

    assert_eq!(link.next().await.unwrap().unwrap(), Message::Ack);
    let message = link.next().await.unwrap().unwrap();
    let response = message.into_response().unwrap();
    assert!(response.is_valid());
    assert_eq!(response.description, Some("Temperatures"));
    assert_eq!(response.payload.len(), 9);

    drop(writer.await.unwrap());
    assert!(link.next().await.is_none());
}

#[tokio::test]
async fn test_framed_writes_named_requests() {
    let (host, mut device) = tokio::io::duplex(256);
    let mut link = framed(host, true);

    let params = [("level".to_string(), ParamValue::from("middle"))].into();
    link.send(Request::new("setLevel", params)).await.unwrap();
    link.send(Request::new("getFaults", Default::default()))
        .await
        .unwrap();
    drop(link);

    let mut wire = Vec::new();
    device.read_to_end(&mut wire).await.unwrap();

    // Host frames share the wire format
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(&wire);
    assert_eq!(frames.len(), 2);
    let set_level = frames[0].as_response().unwrap();
    assert_eq!(set_level.opcode, [0x00, 0x99]);
    assert!(set_level.is_valid());
    let get_faults = frames[1].as_response().unwrap();
    assert_eq!(get_faults.opcode, [0x00, 0xD9]);
    assert!(!get_faults.is_valid(), "queries carry no data");
}

#[tokio::test]
async fn test_framed_rejects_unknown_request() {
    let (host, _device) = tokio::io::duplex(64);
    let mut link = framed(host, true);
    assert!(link
        .send(Request::new("openWindow", Default::default()))
        .await
        .is_err());
}
