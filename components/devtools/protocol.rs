/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Low-level wire protocol implementation. Currently only supports
//! [JSON packets](https://wiki.mozilla.org/Remote_Debugging_Protocol_Stream_Transport#JSON_Packets).

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use devtools_traits::PacketTransport;
use log::{debug, error, trace};
use serde::Serialize;
use serde_json::{self, Value};

use crate::actor::ActorError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDescription {
    pub category: &'static str,
    pub type_name: &'static str,
    pub methods: Vec<Method>,
}

#[derive(Serialize)]
pub struct Method {
    pub name: &'static str,
    pub request: Value,
    pub response: Value,
}

pub trait JsonPacketStream {
    fn write_json_packet<T: Serialize>(&mut self, message: &T) -> Result<(), ActorError>;
    fn write_merged_json_packet<T: Serialize, U: Serialize>(
        &mut self,
        base: &T,
        extra: &U,
    ) -> Result<(), ActorError>;
    fn read_json_packet(&mut self) -> Result<Option<Value>, String>;
}

impl<S: PacketTransport + ?Sized> JsonPacketStream for S {
    fn write_json_packet<T: Serialize>(&mut self, message: &T) -> Result<(), ActorError> {
        let value = serde_json::to_value(message).map_err(|_| ActorError::Internal)?;
        trace!("<- {value}");
        self.send(&value).map_err(|error| {
            debug!("Failed to send packet: {error}");
            ActorError::Internal
        })
    }

    fn write_merged_json_packet<T: Serialize, U: Serialize>(
        &mut self,
        base: &T,
        extra: &U,
    ) -> Result<(), ActorError> {
        let mut value = serde_json::to_value(base).map_err(|_| ActorError::Internal)?;
        let object = value.as_object_mut().ok_or(ActorError::Internal)?;
        let extra = serde_json::to_value(extra).map_err(|_| ActorError::Internal)?;
        let extra = extra.as_object().ok_or(ActorError::Internal)?;

        for (key, value) in extra {
            object.insert(key.to_owned(), value.to_owned());
        }

        self.write_json_packet(object)
    }

    fn read_json_packet(&mut self) -> Result<Option<Value>, String> {
        match self.recv() {
            Ok(Some(packet)) => {
                debug!("-> {packet}");
                Ok(Some(packet))
            },
            Ok(None) => Ok(None),
            Err(error) => Err(error.to_string()),
        }
    }
}

/// A client connection over TCP.
///
/// <https://wiki.mozilla.org/Remote_Debugging_Protocol_Stream_Transport>
/// In short, each JSON packet is [ascii length]:[JSON data of given length]
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<TcpTransport> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(TcpTransport { stream, reader })
    }
}

impl PacketTransport for TcpTransport {
    fn send(&mut self, packet: &Value) -> io::Result<()> {
        let text = packet.to_string();
        write!(self.stream, "{}:{}", text.len(), text)?;
        self.stream.flush()
    }

    fn recv(&mut self) -> io::Result<Option<Value>> {
        let mut length = vec![];
        let read = self.reader.read_until(b':', &mut length)?;
        if read == 0 {
            return Ok(None);
        }
        if length.pop() != Some(b':') {
            // The stream ended in the middle of a length prefix.
            return Ok(None);
        }
        let length = std::str::from_utf8(&length)
            .ok()
            .and_then(|length| length.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "packet length missing / not parsable",
                )
            })?;

        let mut packet = String::new();
        (&mut self.reader).take(length).read_to_string(&mut packet)?;
        serde_json::from_str(&packet)
            .map(Some)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }

    fn try_clone(&self) -> io::Result<Box<dyn PacketTransport>> {
        Ok(Box::new(TcpTransport::new(self.stream.try_clone()?)?))
    }

    fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// One end of an in-process connection. Packets are handed over as values, so no
/// framing is involved.
#[derive(Clone, Debug)]
pub struct LocalTransport {
    outgoing: Sender<Value>,
    incoming: Receiver<Value>,
    loopback: Sender<Value>,
    closed: Arc<AtomicBool>,
}

impl LocalTransport {
    /// Create both ends of a connection.
    pub fn pair() -> (LocalTransport, LocalTransport) {
        let (client_sender, server_receiver) = unbounded();
        let (server_sender, client_receiver) = unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let client = LocalTransport {
            outgoing: client_sender.clone(),
            incoming: client_receiver,
            loopback: server_sender.clone(),
            closed: closed.clone(),
        };
        let server = LocalTransport {
            outgoing: server_sender,
            incoming: server_receiver,
            loopback: client_sender,
            closed,
        };
        (client, server)
    }
}

impl PacketTransport for LocalTransport {
    fn send(&mut self, packet: &Value) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.outgoing
            .send(packet.clone())
            .map_err(|_| io::ErrorKind::BrokenPipe.into())
    }

    fn recv(&mut self) -> io::Result<Option<Value>> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        // Null is never a packet; it marks a shutdown.
        match self.incoming.recv() {
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(packet) => Ok(Some(packet)),
        }
    }

    fn try_clone(&self) -> io::Result<Box<dyn PacketTransport>> {
        Ok(Box::new(self.clone()))
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = self.outgoing.send(Value::Null);
        let _ = self.loopback.send(Value::Null);
    }
}

/// The sending half of a connection, shared by everything that writes packets to
/// one client. Writes are serialized so packets never interleave.
#[derive(Clone, Debug)]
pub struct PacketSender(Arc<Mutex<Box<dyn PacketTransport>>>);

impl PacketSender {
    pub fn new(transport: Box<dyn PacketTransport>) -> PacketSender {
        PacketSender(Arc::new(Mutex::new(transport)))
    }

    pub fn send<T: Serialize>(&self, packet: &T) -> Result<(), ActorError> {
        let mut transport = self.0.lock().map_err(|_| ActorError::Internal)?;
        transport.write_json_packet(packet)
    }

    pub fn send_merged<T: Serialize, U: Serialize>(
        &self,
        base: &T,
        extra: &U,
    ) -> Result<(), ActorError> {
        let mut transport = self.0.lock().map_err(|_| ActorError::Internal)?;
        transport.write_merged_json_packet(base, extra)
    }

    pub fn shutdown(&self) {
        if let Ok(transport) = self.0.lock() {
            transport.shutdown();
        }
    }
}

#[derive(Serialize)]
struct ErrorReply<'a> {
    from: &'a str,
    error: &'static str,
    message: String,
}

/// A request from a client to one actor. Exactly one reply is written for it, either
/// by the handler or, when the handler fails, as an error packet.
pub(crate) struct ClientRequest<'req, 'sent> {
    sender: &'req PacketSender,
    actor_name: &'req str,
    request_id: Option<&'req Value>,
    reply_sent: &'sent mut bool,
}

impl<'req> ClientRequest<'req, '_> {
    /// Run `handler` for a request, and send an error packet if it fails or
    /// finishes without replying.
    pub fn handle(
        sender: &'req PacketSender,
        actor_name: &'req str,
        request_id: Option<&'req Value>,
        handler: impl FnOnce(ClientRequest<'req, '_>) -> Result<(), ActorError>,
    ) -> Result<(), ActorError> {
        let mut reply_sent = false;
        let request = ClientRequest {
            sender,
            actor_name,
            request_id,
            reply_sent: &mut reply_sent,
        };
        let result = handler(request).and_then(|()| {
            if reply_sent {
                Ok(())
            } else {
                error!("Actor {actor_name} did not send a reply");
                Err(ActorError::Internal)
            }
        });

        match result {
            Ok(()) => Ok(()),
            Err(error) if reply_sent => Err(error),
            Err(error) => {
                let reply = ErrorReply {
                    from: actor_name,
                    error: error.name(),
                    message: error.message(),
                };
                ClientRequest::send_with_id(sender, request_id, &reply)?;
                Err(error)
            },
        }
    }

    /// Send the reply to this request.
    pub fn reply_final<T: Serialize>(self, reply: &T) -> Result<(), ActorError> {
        ClientRequest::send_with_id(self.sender, self.request_id, reply)?;
        *self.reply_sent = true;
        Ok(())
    }

    /// Send an error reply without failing the handler.
    pub fn reply_error(self, error: &ActorError) -> Result<(), ActorError> {
        let reply = ErrorReply {
            from: self.actor_name,
            error: error.name(),
            message: error.message(),
        };
        self.reply_final(&reply)
    }

    fn send_with_id<T: Serialize>(
        sender: &PacketSender,
        request_id: Option<&Value>,
        reply: &T,
    ) -> Result<(), ActorError> {
        match request_id {
            Some(request_id) => {
                sender.send_merged(reply, &serde_json::json!({ "requestId": request_id }))
            },
            None => sender.send(reply),
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use devtools_traits::PacketTransport;
    use serde_json::json;

    use super::{LocalTransport, TcpTransport};

    #[test]
    fn tcp_packets_are_length_prefixed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let writer = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut transport = TcpTransport::new(stream).unwrap();
            transport.send(&json!({"from": "root", "text": "a:b"})).unwrap();
            transport.send(&json!({"from": "root", "text": "ü"})).unwrap();
        });

        let stream = TcpStream::connect(address).unwrap();
        let mut transport = TcpTransport::new(stream).unwrap();
        assert_eq!(
            transport.recv().unwrap(),
            Some(json!({"from": "root", "text": "a:b"}))
        );
        assert_eq!(
            transport.recv().unwrap(),
            Some(json!({"from": "root", "text": "ü"}))
        );
        writer.join().unwrap();
        assert_eq!(transport.recv().unwrap(), None);
    }

    #[test]
    fn local_shutdown_ends_both_readers() {
        let (mut client, mut server) = LocalTransport::pair();
        client.send(&json!({"to": "root", "type": "listTabs"})).unwrap();
        assert_eq!(
            server.recv().unwrap(),
            Some(json!({"to": "root", "type": "listTabs"}))
        );

        let mut reader = server.try_clone().unwrap();
        client.shutdown();
        assert_eq!(reader.recv().unwrap(), None);
        assert_eq!(client.recv().unwrap(), None);
        assert!(server.send(&json!({"from": "root"})).is_err());
    }
}
