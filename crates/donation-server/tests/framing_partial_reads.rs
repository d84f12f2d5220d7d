// crates/donation-server/tests/framing_partial_reads.rs
use std::io;
use std::time::Duration;

use donation_core::CharityRecord;
use donation_protocol::{encode_request, encode_response, FrameLayout, Request, Response};
use donation_server::framing::{write_response, FrameReader, Incoming};
use tokio::io::{duplex, AsyncWriteExt};
use tokio::time::{sleep, timeout};

const DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn frames_split_across_writes_are_reassembled() {
    for layout in [FrameLayout::Compact, FrameLayout::Legacy] {
        let (mut tx, rx) = duplex(64);
        let mut frames = FrameReader::new(rx, layout);

        let sent = [
            Request::Donate { charity: 4, amount: 0x0102_0304_0506_0708 },
            Request::Cinfo { charity: 1 },
            Request::Logout,
        ];
        let mut bytes = Vec::new();
        for req in &sent {
            encode_request(req, layout, &mut bytes);
        }

        let writer = tokio::spawn(async move {
            for b in bytes {
                tx.write_all(&[b]).await.unwrap();
                sleep(Duration::from_millis(1)).await;
            }
        });

        for req in sent {
            let got = timeout(DEADLINE, frames.next_request()).await.unwrap().unwrap();
            assert_eq!(got, Incoming::Frame(Ok(req)), "{layout}");
        }
        writer.await.unwrap();
        assert_eq!(frames.next_request().await.unwrap(), Incoming::Closed);
    }
}

#[tokio::test]
async fn eof_inside_a_frame_is_an_error() {
    let (mut tx, rx) = duplex(64);
    let mut frames = FrameReader::new(rx, FrameLayout::Compact);

    let mut bytes = Vec::new();
    encode_request(&Request::Donate { charity: 0, amount: 9 }, FrameLayout::Compact, &mut bytes);
    tx.write_all(&bytes[..4]).await.unwrap();
    drop(tx);

    let err = frames.next_request().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn eof_on_a_frame_boundary_is_a_clean_close() {
    let (tx, rx) = duplex(64);
    let mut frames = FrameReader::new(rx, FrameLayout::Legacy);
    drop(tx);

    assert_eq!(frames.next_request().await.unwrap(), Incoming::Closed);
}

#[tokio::test]
async fn responses_round_trip_through_the_stream() {
    let (mut tx, rx) = duplex(256);
    let mut frames = FrameReader::new(rx, FrameLayout::Legacy);

    let sent = [
        Response::Cinfo(CharityRecord::new(150, 100, 2)),
        Response::Top([150, 20, 0]),
        Response::Error,
    ];
    for resp in &sent {
        write_response(&mut tx, resp, FrameLayout::Legacy).await.unwrap();
    }
    drop(tx);

    for resp in sent {
        assert_eq!(frames.next_response().await.unwrap(), Some(resp));
    }
    assert_eq!(frames.next_response().await.unwrap(), None);
}

#[tokio::test]
async fn unknown_response_tag_is_invalid_data() {
    let (mut tx, rx) = duplex(64);
    let mut frames = FrameReader::new(rx, FrameLayout::Compact);

    let mut bytes = Vec::new();
    encode_response(&Response::Logout, FrameLayout::Compact, &mut bytes);
    bytes.push(0x42);
    tx.write_all(&bytes).await.unwrap();

    assert_eq!(frames.next_response().await.unwrap(), Some(Response::Logout));
    let err = frames.next_response().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}
