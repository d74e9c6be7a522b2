use std::{sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, Method, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    RemoteEvent, RemoteService, Subscription,
    error::{RemoteError, RemoteResult},
    record_id,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// REST + server-sent-events client for the remote service.
///
/// Collections live under `{base}/{collection}`, records under
/// `{base}/{collection}/{id}`, channel history under
/// `{base}/channels/{channel}/messages` and the live feed under
/// `{base}/channels/{channel}/events`.
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Arc<str>,
}

impl HttpRemote {
    /// Build a client for the service rooted at `base_url`.
    pub fn new(base_url: &str) -> RemoteResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| RemoteError::transport(base_url, source))?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(base_url.trim_end_matches('/')),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send_json<T>(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> RemoteResult<T>
    where
        T: DeserializeOwned,
    {
        let mut builder = self
            .client
            .request(method, self.url(&path))
            .timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| RemoteError::transport(path.clone(), source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                path,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| RemoteError::decode(path, source))
    }

    fn record_path(collection: &str, record: &Value) -> RemoteResult<String> {
        let id = record_id(record).ok_or_else(|| RemoteError::MissingId {
            collection: collection.to_string(),
        })?;
        Ok(format!("{collection}/{id}"))
    }
}

impl RemoteService for HttpRemote {
    fn fetch(&self, collection: &str) -> BoxFuture<'static, RemoteResult<Vec<Value>>> {
        let remote = self.clone();
        let path = collection.to_string();
        Box::pin(async move { remote.send_json(Method::GET, path, None).await })
    }

    fn create(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>> {
        let remote = self.clone();
        let path = collection.to_string();
        Box::pin(async move { remote.send_json(Method::POST, path, Some(record)).await })
    }

    fn update(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>> {
        let remote = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            let path = Self::record_path(&collection, &record)?;
            remote.send_json(Method::PUT, path, Some(record)).await
        })
    }

    fn delete(&self, collection: &str, record: Value) -> BoxFuture<'static, RemoteResult<Value>> {
        let remote = self.clone();
        let collection = collection.to_string();
        Box::pin(async move {
            let path = Self::record_path(&collection, &record)?;
            let response = remote
                .client
                .delete(remote.url(&path))
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|source| RemoteError::transport(path.clone(), source))?;
            if response.status().is_success() {
                Ok(record)
            } else {
                Err(RemoteError::Status {
                    path,
                    status: response.status().as_u16(),
                })
            }
        })
    }

    fn subscribe(&self, channel: &str) -> BoxFuture<'static, RemoteResult<Subscription>> {
        let remote = self.clone();
        let channel = channel.to_string();
        Box::pin(async move {
            let path = format!("channels/{channel}/events");
            let response = remote
                .client
                .get(remote.url(&path))
                .header(header::ACCEPT, "text/event-stream")
                .send()
                .await
                .map_err(|source| RemoteError::transport(path.clone(), source))?;
            if !response.status().is_success() {
                return Err(RemoteError::Status {
                    path,
                    status: response.status().as_u16(),
                });
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let reader = tokio::spawn(async move {
                let mut stream = response.bytes_stream();
                let mut lines = EventLines::default();
                while let Some(chunk) = stream.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            warn!(
                                channel = %channel,
                                error = %err,
                                "remote event stream interrupted"
                            );
                            break;
                        }
                    };
                    for data in lines.push(&chunk) {
                        match serde_json::from_str::<Value>(&data) {
                            Ok(payload) => {
                                let event = RemoteEvent {
                                    channel: channel.clone(),
                                    payload,
                                };
                                if tx.send(event).is_err() {
                                    return;
                                }
                            }
                            Err(err) => debug!(
                                channel = %channel,
                                error = %err,
                                "skipping undecodable remote event"
                            ),
                        }
                    }
                }
            });

            Ok(Subscription::new(rx, move || reader.abort()))
        })
    }

    fn fetch_history(&self, channel: &str) -> BoxFuture<'static, RemoteResult<Vec<Value>>> {
        let remote = self.clone();
        let path = format!("channels/{channel}/messages");
        Box::pin(async move { remote.send_json(Method::GET, path, None).await })
    }

    fn health_check(&self) -> BoxFuture<'static, RemoteResult<()>> {
        let remote = self.clone();
        Box::pin(async move {
            let path = "health".to_string();
            let response = remote
                .client
                .get(remote.url(&path))
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|source| RemoteError::transport(path.clone(), source))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(RemoteError::Status {
                    path,
                    status: response.status().as_u16(),
                })
            }
        })
    }
}

/// Splits an event stream into the payloads of its `data:` lines.
///
/// Bytes are buffered until a full line arrives so characters split across
/// network chunks are decoded whole.
#[derive(Debug, Default)]
struct EventLines {
    buffer: Vec<u8>,
}

impl EventLines {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(data) = line.trim_end().strip_prefix("data:") {
                payloads.push(data.trim().to_string());
            }
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn characters_split_across_chunks_stay_intact() {
        let event = "data: {\"text\":\"👍\"}\n".as_bytes();
        let split = event.iter().position(|byte| *byte >= 0x80).unwrap() + 2;
        let mut lines = EventLines::default();

        assert!(lines.push(&event[..split]).is_empty());
        let payloads = lines.push(&event[split..]);

        assert_eq!(payloads, vec![r#"{"text":"👍"}"#.to_string()]);
        let value: Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(value["text"], "👍");
    }

    #[test]
    fn non_data_lines_are_skipped() {
        let mut lines = EventLines::default();
        let payloads = lines.push(b": keep-alive\nevent: message\ndata: 1\ndata: 2");

        assert_eq!(payloads, vec!["1".to_string()]);
        assert_eq!(lines.push(b"\n"), vec!["2".to_string()]);
    }
}
