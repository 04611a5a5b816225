/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The client end of a devtools connection. Requests are matched with their replies
//! by `requestId`, falling back to the order of requests per actor for replies that
//! carry none. Unsolicited packets are queued as events.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use devtools_traits::PacketTransport;
use futures::channel::oneshot;
use log::{debug, trace, warn};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::protocol::JsonPacketStream;

/// Errors seen by the client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientError {
    /// The server answered with an error packet.
    Protocol { error: String, message: String },
    /// The connection closed before the reply arrived.
    Disconnected,
    /// A request or reply did not have the expected shape.
    Marshal(String),
    Io(io::ErrorKind),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Protocol { error, message } => write!(f, "{error}: {message}"),
            ClientError::Disconnected => write!(f, "connection closed"),
            ClientError::Marshal(message) => write!(f, "malformed packet: {message}"),
            ClientError::Io(kind) => write!(f, "i/o error: {kind}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(error: io::Error) -> Self {
        ClientError::Io(error.kind())
    }
}

pub type Packet = Map<String, Value>;

type ReplySender = oneshot::Sender<Result<Packet, ClientError>>;

#[derive(Default)]
struct ClientState {
    next_request: u64,
    pending: FxHashMap<u64, ReplySender>,
    /// Outstanding request IDs per actor, oldest first.
    queues: FxHashMap<String, VecDeque<u64>>,
    /// Actors whose events go to a dedicated channel instead of the shared queue.
    subscribers: FxHashMap<String, Sender<Packet>>,
    closed: bool,
}

impl ClientState {
    fn take_pending(&mut self, actor: &str, request_id: u64) -> Option<ReplySender> {
        if let Some(queue) = self.queues.get_mut(actor) {
            queue.retain(|id| *id != request_id);
        }
        self.pending.remove(&request_id)
    }

    fn take_oldest(&mut self, actor: &str) -> Option<ReplySender> {
        let request_id = self.queues.get_mut(actor)?.pop_front()?;
        self.pending.remove(&request_id)
    }
}

struct ClientInner {
    writer: Mutex<Box<dyn PacketTransport>>,
    state: Arc<Mutex<ClientState>>,
    events: Receiver<Packet>,
    greeting: Packet,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Ok(writer) = self.writer.lock() {
            writer.shutdown();
        }
    }
}

/// A connection to a devtools server. Cloning shares the connection.
#[derive(Clone)]
pub struct DevtoolsClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for DevtoolsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevtoolsClient")
            .field("greeting", &self.inner.greeting)
            .finish_non_exhaustive()
    }
}

fn lock(state: &Mutex<ClientState>) -> MutexGuard<'_, ClientState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DevtoolsClient {
    /// Wait for the server's greeting on `transport` and start reading packets.
    pub fn connect(transport: Box<dyn PacketTransport>) -> Result<DevtoolsClient, ClientError> {
        let mut reader = transport.try_clone()?;
        let greeting = match reader.read_json_packet().map_err(ClientError::Marshal)? {
            Some(Value::Object(greeting)) => greeting,
            Some(packet) => {
                return Err(ClientError::Marshal(format!("unexpected greeting {packet}")));
            },
            None => return Err(ClientError::Disconnected),
        };

        let state = Arc::new(Mutex::new(ClientState::default()));
        let (event_sender, events) = unbounded();
        {
            let state = state.clone();
            thread::Builder::new()
                .name("DevtoolsClientReader".to_owned())
                .spawn(move || read_packets(reader, &state, event_sender))?;
        }

        Ok(DevtoolsClient {
            inner: Arc::new(ClientInner {
                writer: Mutex::new(transport),
                state,
                events,
                greeting,
            }),
        })
    }

    /// The packet the root actor sent when the connection opened.
    pub fn greeting(&self) -> &Packet {
        &self.inner.greeting
    }

    /// Send a request. The packet needs a `to` field; a `requestId` is added.
    pub fn request(&self, mut packet: Packet) -> Result<PendingReply, ClientError> {
        let to = packet
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Marshal("request without a destination".to_owned()))?
            .to_owned();

        let (sender, receiver) = oneshot::channel();
        let request_id = {
            let mut state = lock(&self.inner.state);
            if state.closed {
                return Err(ClientError::Disconnected);
            }
            let request_id = state.next_request;
            state.next_request += 1;
            state.pending.insert(request_id, sender);
            state.queues.entry(to.clone()).or_default().push_back(request_id);
            request_id
        };
        packet.insert("requestId".to_owned(), Value::from(request_id));

        let sent = match self.inner.writer.lock() {
            Ok(mut writer) => writer.send(&Value::Object(packet)),
            Err(_) => Err(io::ErrorKind::BrokenPipe.into()),
        };
        if let Err(error) = sent {
            lock(&self.inner.state).take_pending(&to, request_id);
            return Err(error.into());
        }
        Ok(PendingReply { receiver })
    }

    /// Send a request and block until its reply arrives.
    pub fn call(&self, packet: Packet) -> Result<Packet, ClientError> {
        self.request(packet)?.wait()
    }

    /// Route every event from `actor` to the returned channel.
    pub fn subscribe(&self, actor: &str) -> Receiver<Packet> {
        let (sender, receiver) = unbounded();
        lock(&self.inner.state)
            .subscribers
            .insert(actor.to_owned(), sender);
        receiver
    }

    pub fn unsubscribe(&self, actor: &str) {
        lock(&self.inner.state).subscribers.remove(actor);
    }

    /// The next event from an actor nobody subscribed to.
    pub fn next_event(&self, timeout: Duration) -> Option<Packet> {
        self.inner.events.recv_timeout(timeout).ok()
    }

    /// Wait for an event of the given type, dropping the events that come before it.
    pub fn wait_for_event(&self, event_type: &str, timeout: Duration) -> Option<Packet> {
        wait_for(&self.inner.events, event_type, timeout)
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.state).closed
    }

    /// Close the connection. Pending requests fail with `Disconnected`.
    pub fn close(&self) {
        if let Ok(writer) = self.inner.writer.lock() {
            writer.shutdown();
        }
    }
}

/// Wait on an event channel for an event of the given type.
pub(crate) fn wait_for(
    events: &Receiver<Packet>,
    event_type: &str,
    timeout: Duration,
) -> Option<Packet> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if event.get("type").and_then(Value::as_str) == Some(event_type) => {
                return Some(event);
            },
            Ok(event) => trace!("Skipping event {event:?}"),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

fn read_packets(
    mut reader: Box<dyn PacketTransport>,
    state: &Mutex<ClientState>,
    events: Sender<Packet>,
) {
    loop {
        let packet = match reader.read_json_packet() {
            Ok(Some(Value::Object(packet))) => packet,
            Ok(Some(packet)) => {
                warn!("Ignoring packet that is not an object: {packet}");
                continue;
            },
            Ok(None) => break,
            Err(error) => {
                debug!("Failed to read devtools packet: {error}");
                break;
            },
        };
        dispatch(packet, state, &events);
    }

    // Dropping the reply senders fails every pending request.
    let mut state = lock(state);
    state.closed = true;
    state.pending.clear();
    state.queues.clear();
    state.subscribers.clear();
}

fn dispatch(packet: Packet, state: &Mutex<ClientState>, events: &Sender<Packet>) {
    let from = packet
        .get("from")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let request_id = packet.get("requestId").and_then(Value::as_u64);
    let is_event = request_id.is_none() && packet.contains_key("type");

    let mut state = lock(state);
    if is_event {
        match state.subscribers.get(&from) {
            Some(subscriber) => {
                if subscriber.send(packet).is_err() {
                    state.subscribers.remove(&from);
                }
            },
            None => {
                let _ = events.send(packet);
            },
        }
        return;
    }

    let reply_sender = match request_id {
        Some(request_id) => state.take_pending(&from, request_id),
        None => state.take_oldest(&from),
    };
    let Some(reply_sender) = reply_sender else {
        warn!("Dropping reply from {from} that matches no request: {packet:?}");
        return;
    };
    drop(state);

    let reply = match packet.get("error").and_then(Value::as_str) {
        Some(error) => Err(ClientError::Protocol {
            error: error.to_owned(),
            message: packet
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
        }),
        None => Ok(packet),
    };
    // The caller may have stopped waiting.
    let _ = reply_sender.send(reply);
}

/// A reply that has not arrived yet.
#[derive(Debug)]
pub struct PendingReply {
    receiver: oneshot::Receiver<Result<Packet, ClientError>>,
}

impl PendingReply {
    /// Block the current thread until the reply arrives.
    pub fn wait(self) -> Result<Packet, ClientError> {
        futures::executor::block_on(self)
    }
}

impl Future for PendingReply {
    type Output = Result<Packet, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(reply)) => Poll::Ready(reply),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(ClientError::Disconnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use devtools_traits::PacketTransport;
    use serde_json::{Value, json};

    use super::{ClientError, DevtoolsClient, Packet};
    use crate::protocol::LocalTransport;

    fn object(value: Value) -> Packet {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn replies_without_request_ids_are_matched_in_order() {
        let (client, mut server) = LocalTransport::pair();
        server.send(&json!({ "from": "root", "applicationType": "browser" })).unwrap();
        let client = DevtoolsClient::connect(Box::new(client)).unwrap();
        assert_eq!(client.greeting()["applicationType"], "browser");

        let first = client.request(object(json!({ "to": "a", "type": "x" }))).unwrap();
        let second = client.request(object(json!({ "to": "a", "type": "y" }))).unwrap();
        let by_id = client.request(object(json!({ "to": "b", "type": "z" }))).unwrap();

        let server = thread::spawn(move || {
            let mut requests = vec![];
            for _ in 0..3 {
                requests.push(server.recv().unwrap().unwrap());
            }
            // An event from the same actor must not be taken for a reply.
            server.send(&json!({ "from": "a", "type": "news" })).unwrap();
            server.send(&json!({ "from": "a", "order": 1 })).unwrap();
            server.send(&json!({ "from": "a", "order": 2 })).unwrap();
            server
                .send(&json!({
                    "from": "b",
                    "error": "noSuchActor",
                    "message": "gone",
                    "requestId": requests[2]["requestId"],
                }))
                .unwrap();
            server
        });

        assert_eq!(first.wait().unwrap()["order"], 1);
        assert_eq!(second.wait().unwrap()["order"], 2);
        assert_eq!(
            by_id.wait(),
            Err(ClientError::Protocol {
                error: "noSuchActor".to_owned(),
                message: "gone".to_owned(),
            })
        );
        let event = client
            .wait_for_event("news", std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(event["from"], "a");

        let server = server.join().unwrap();
        server.shutdown();
    }

    #[test]
    fn pending_requests_fail_when_the_connection_closes() {
        let (client, mut server) = LocalTransport::pair();
        server.send(&json!({ "from": "root" })).unwrap();
        let client = DevtoolsClient::connect(Box::new(client)).unwrap();
        let pending = client.request(object(json!({ "to": "a", "type": "x" }))).unwrap();
        server.shutdown();
        assert_eq!(pending.wait(), Err(ClientError::Disconnected));
    }
}
