// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::sync::mpsc;

use super::*;
use crate::model::Body;

fn body(req_id: &str) -> Body {
    Body { data: bytes::Bytes::from_static(b"{}"), req_id: req_id.to_owned() }
}

#[tokio::test]
async fn encode_loop_emits_one_newline_terminated_chunk_per_body() {
    let (writer_tx, mut writer_rx) = mpsc::channel(4);
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<reqwest::Result<Bytes>>(4);
    let closer = Closer::new();

    writer_tx.send(body("1")).await.unwrap();
    writer_tx.send(body("2")).await.unwrap();
    drop(writer_tx);

    encode_loop(chunk_tx, &mut writer_rx, closer).await;

    let first = chunk_rx.recv().await.unwrap().unwrap();
    assert!(first.ends_with(b"\n"));
    let decoded: Body = serde_json::from_slice(&first[..first.len() - 1]).unwrap();
    assert_eq!(decoded.req_id, "1");

    let second = chunk_rx.recv().await.unwrap().unwrap();
    let decoded: Body = serde_json::from_slice(&second[..second.len() - 1]).unwrap();
    assert_eq!(decoded.req_id, "2");

    assert!(chunk_rx.recv().await.is_none());
}

#[tokio::test]
async fn encode_loop_exits_once_the_closer_fires() {
    let (_writer_tx, mut writer_rx) = mpsc::channel(4);
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<reqwest::Result<Bytes>>(4);
    let closer = Closer::new();
    closer.close();

    encode_loop(chunk_tx, &mut writer_rx, closer).await;

    assert!(chunk_rx.recv().await.is_none());
}
