// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock syslog collector accepting newline-framed records over TCP

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Clone)]
pub struct MockCollector {
    pub addr: SocketAddr,
    pub received_lines: Arc<Mutex<Vec<String>>>,
    /// (accepted, open) connection counts
    connections: Arc<watch::Sender<(usize, usize)>>,
}

impl MockCollector {
    /// Start a mock collector on a random port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock collector");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let received_lines = Arc::new(Mutex::new(Vec::new()));
        let lines_clone = received_lines.clone();
        let (connections, _) = watch::channel((0usize, 0usize));
        let connections = Arc::new(connections);
        let connections_clone = connections.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let lines = lines_clone.clone();
                let counts = connections_clone.clone();
                counts.send_modify(|(accepted, open)| {
                    *accepted += 1;
                    *open += 1;
                });

                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream).lines();
                    while let Ok(Some(line)) = reader.next_line().await {
                        lines.lock().unwrap().push(line);
                    }
                    counts.send_modify(|(_, open)| *open -= 1);
                });
            }
        });

        Self {
            addr,
            received_lines,
            connections,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.received_lines.lock().unwrap().clone()
    }

    /// JSON payloads of every received record, syslog header stripped
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|line| {
                let (_, payload) = line.split_once("]: ").expect("syslog header");
                serde_json::from_str(payload).expect("JSON record")
            })
            .collect()
    }

    /// Records whose message equals `message`
    pub fn records_with_message(&self, message: &str) -> Vec<serde_json::Value> {
        self.records()
            .into_iter()
            .filter(|record| record["fields"]["message"] == message)
            .collect()
    }

    /// Wait until at least one sender connected and every sender hung up
    pub async fn wait_until_disconnected(&self, within: Duration) {
        let mut rx = self.connections.subscribe();
        tokio::time::timeout(within, rx.wait_for(|(accepted, open)| *accepted > 0 && *open == 0))
            .await
            .expect("collector connections did not close")
            .expect("collector state dropped");
    }
}
