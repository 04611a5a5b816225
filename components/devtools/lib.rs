/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! An actor-based remote devtools server implementation, together with a client
//! that mirrors the server's actors. Largely based on the
//! [Firefox remote debugging protocol](https://wiki.mozilla.org/Remote_Debugging_Protocol)
//! and its inspector, tracer and console actors.

#![crate_name = "devtools"]
#![crate_type = "rlib"]
#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use devtools_traits::{
    ChromeToDevtoolsControlMsg, ConsoleMessage, DevtoolsControlMsg, DevtoolsPageInfo, PageError,
    PacketTransport, ScriptToDevtoolsControlMsg, TabHost, TabId,
};
use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::connection::ConnectionEvent;
pub use crate::prefs::DevtoolsPrefs;
pub use crate::protocol::{LocalTransport, TcpTransport};

mod actor;
/// <https://searchfox.org/mozilla-central/source/devtools/server/actors>
mod actors {
    pub mod console;
    pub mod frame;
    pub mod inspector;
    pub mod network_event;
    pub mod object;
    pub mod root;
    pub mod string;
    pub mod tab;
    pub mod thread;
    pub mod tracer;
}
mod connection;
pub mod front;
mod grip;
mod prefs;
mod protocol;
mod schema;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct StreamId(u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn{}", self.0)
    }
}

#[derive(Serialize)]
pub struct EmptyReplyMsg {
    pub from: String,
}

/// A message kept for clients that ask for cached messages later.
#[derive(Clone, Debug)]
pub(crate) enum CachedMessage {
    ConsoleApi(ConsoleMessage),
    PageError(PageError),
}

impl CachedMessage {
    pub fn time_stamp(&self) -> u64 {
        match self {
            CachedMessage::ConsoleApi(message) => message.time_stamp,
            CachedMessage::PageError(error) => error.time_stamp,
        }
    }
}

/// Everything the server knows about one tab, shared by all connections.
#[derive(Clone, Debug)]
pub(crate) struct TabHandle {
    pub id: TabId,
    pub host: TabHost,
    pub info: Arc<Mutex<DevtoolsPageInfo>>,
    pub console_cache: Arc<Mutex<Vec<CachedMessage>>>,
}

impl TabHandle {
    fn new(id: TabId, host: TabHost, info: DevtoolsPageInfo) -> TabHandle {
        TabHandle {
            id,
            host,
            info: Arc::new(Mutex::new(info)),
            console_cache: Arc::default(),
        }
    }

    pub fn page_info(&self) -> DevtoolsPageInfo {
        self.info
            .lock()
            .map(|info| info.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn cached_messages(&self) -> Vec<CachedMessage> {
        match self.console_cache.lock() {
            Ok(cache) => cache.clone(),
            Err(_) => vec![],
        }
    }

    pub fn clear_cached_messages(&self) {
        if let Ok(mut cache) = self.console_cache.lock() {
            cache.clear();
        }
    }

    fn cache_message(&self, message: CachedMessage, limit: usize) {
        if let Ok(mut cache) = self.console_cache.lock() {
            cache.push(message);
            let excess = cache.len().saturating_sub(limit);
            if excess > 0 {
                cache.drain(..excess);
            }
        }
    }
}

/// A running devtools server.
pub struct DevtoolsServer {
    sender: Sender<DevtoolsControlMsg>,
    port: Option<u16>,
    thread: Option<JoinHandle<()>>,
}

impl DevtoolsServer {
    /// The channel through which the host reports tabs, console messages and
    /// network activity.
    pub fn sender(&self) -> Sender<DevtoolsControlMsg> {
        self.sender.clone()
    }

    /// The TCP port clients can connect to, if the server listens on one.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Open an in-process client connection.
    pub fn connect_local(&self) -> io::Result<LocalTransport> {
        let (client, server) = LocalTransport::pair();
        self.sender
            .send(DevtoolsControlMsg::FromChrome(
                ChromeToDevtoolsControlMsg::AddClient(Box::new(server)),
            ))
            .map_err(|_| io::Error::from(io::ErrorKind::NotConnected))?;
        Ok(client)
    }

    /// Close every connection and stop the devtools thread.
    pub fn shutdown(mut self) {
        let _ = self.sender.send(DevtoolsControlMsg::FromChrome(
            ChromeToDevtoolsControlMsg::ServerExitMsg,
        ));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spin up a devtools server that listens for connections on the configured port.
pub fn start_server(prefs: DevtoolsPrefs) -> io::Result<DevtoolsServer> {
    let listener = TcpListener::bind((prefs.bind_address.as_str(), prefs.port))?;
    let port = listener.local_addr()?.port();
    info!("Devtools server listening on {}:{port}", prefs.bind_address);

    let (sender, receiver) = unbounded();
    {
        let sender = sender.clone();
        thread::Builder::new()
            .name("DevtoolsCliAcceptor".to_owned())
            .spawn(move || {
                // accept connections and process them, spawning a new thread for each one
                for stream in listener.incoming() {
                    let transport = match stream.and_then(TcpTransport::new) {
                        Ok(transport) => transport,
                        Err(error) => {
                            warn!("Failed to accept devtools client: {error}");
                            continue;
                        },
                    };
                    let message = DevtoolsControlMsg::FromChrome(
                        ChromeToDevtoolsControlMsg::AddClient(Box::new(transport)),
                    );
                    if sender.send(message).is_err() {
                        break;
                    }
                }
            })?;
    }

    let thread = spawn_instance(prefs, receiver)?;
    Ok(DevtoolsServer {
        sender,
        port: Some(port),
        thread: Some(thread),
    })
}

/// Spin up a devtools server that only accepts in-process clients.
pub fn start_local_server(prefs: DevtoolsPrefs) -> io::Result<DevtoolsServer> {
    let (sender, receiver) = unbounded();
    let thread = spawn_instance(prefs, receiver)?;
    Ok(DevtoolsServer {
        sender,
        port: None,
        thread: Some(thread),
    })
}

fn spawn_instance(
    prefs: DevtoolsPrefs,
    receiver: Receiver<DevtoolsControlMsg>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("Devtools".to_owned())
        .spawn(move || DevtoolsInstance::new(prefs, receiver).run())
}

struct ConnectionHandle {
    events: Sender<ConnectionEvent>,
    thread: JoinHandle<()>,
}

struct DevtoolsInstance {
    prefs: DevtoolsPrefs,
    receiver: Receiver<DevtoolsControlMsg>,
    tabs: BTreeMap<TabId, TabHandle>,
    connections: BTreeMap<StreamId, ConnectionHandle>,
    next_id: StreamId,
}

impl DevtoolsInstance {
    fn new(prefs: DevtoolsPrefs, receiver: Receiver<DevtoolsControlMsg>) -> DevtoolsInstance {
        DevtoolsInstance {
            prefs,
            receiver,
            tabs: BTreeMap::new(),
            connections: BTreeMap::new(),
            next_id: StreamId(0),
        }
    }

    fn run(mut self) {
        while let Ok(msg) = self.receiver.recv() {
            trace!("{:?}", msg);
            match msg {
                DevtoolsControlMsg::FromChrome(ChromeToDevtoolsControlMsg::AddClient(
                    transport,
                )) => self.handle_add_client(transport),
                DevtoolsControlMsg::FromChrome(ChromeToDevtoolsControlMsg::NetworkEvent(
                    tab,
                    request_id,
                    network_event,
                )) => self.broadcast(ConnectionEvent::Network(tab, request_id, network_event)),
                DevtoolsControlMsg::FromChrome(ChromeToDevtoolsControlMsg::ServerExitMsg) => break,
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::NewGlobal(
                    tab,
                    host,
                    page_info,
                )) => self.handle_new_global(tab, host, page_info),
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::TitleChanged(
                    tab,
                    title,
                )) => self.handle_title_changed(tab, title),
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::ConsoleAPI(
                    tab,
                    console_message,
                )) => {
                    self.cache(tab, CachedMessage::ConsoleApi(console_message.clone()));
                    self.broadcast(ConnectionEvent::ConsoleApi(tab, console_message));
                },
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::ReportPageError(
                    tab,
                    page_error,
                )) => {
                    self.cache(tab, CachedMessage::PageError(page_error.clone()));
                    self.broadcast(ConnectionEvent::PageError(tab, page_error));
                },
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::FileActivity(
                    tab,
                    uri,
                )) => self.broadcast(ConnectionEvent::FileActivity(tab, uri)),
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::FrameLoad(
                    tab,
                    frame,
                )) => self.broadcast(ConnectionEvent::FrameLoad(tab, frame)),
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::DocumentUnload(
                    tab,
                    document,
                )) => self.broadcast(ConnectionEvent::DocumentUnload(tab, document)),
                DevtoolsControlMsg::FromScript(ScriptToDevtoolsControlMsg::TabClosed(tab)) => {
                    self.tabs.remove(&tab);
                    self.broadcast(ConnectionEvent::TabClosed(tab));
                },
            }
        }

        // Shut down all active connections
        for (id, connection) in std::mem::take(&mut self.connections) {
            let _ = connection.events.send(ConnectionEvent::Shutdown);
            if connection.thread.join().is_err() {
                warn!("Devtools connection {id} panicked");
            }
        }
    }

    fn handle_add_client(&mut self, transport: Box<dyn PacketTransport>) {
        let id = self.next_id;
        self.next_id = StreamId(id.0 + 1);

        let (events, event_receiver) = unbounded();
        let tabs = self.tabs.values().cloned().collect();
        let prefs = self.prefs.clone();
        let connection_events = events.clone();
        let thread = thread::Builder::new()
            .name(format!("DevtoolsClientHandler{}", id.0))
            .spawn(move || {
                connection::run(id, transport, tabs, connection_events, event_receiver, prefs)
            });
        match thread {
            Ok(thread) => {
                debug!("Devtools client {id} connected");
                self.connections.insert(id, ConnectionHandle { events, thread });
            },
            Err(error) => warn!("Failed to spawn thread for devtools client: {error}"),
        }
    }

    // We need separate actor representations for each script global that exists;
    // clients can theoretically connect to multiple globals simultaneously.
    fn handle_new_global(&mut self, tab: TabId, host: TabHost, page_info: DevtoolsPageInfo) {
        let handle = TabHandle::new(tab, host, page_info);
        self.tabs.insert(tab, handle.clone());
        self.broadcast(ConnectionEvent::TabAdded(handle));
    }

    fn handle_title_changed(&self, tab: TabId, title: String) {
        let Some(handle) = self.tabs.get(&tab) else {
            warn!("Title change for unknown tab {tab}");
            return;
        };
        if let Ok(mut info) = handle.info.lock() {
            info.title = title;
        }
    }

    fn cache(&self, tab: TabId, message: CachedMessage) {
        if !self.prefs.cache_console_messages {
            return;
        }
        match self.tabs.get(&tab) {
            Some(handle) => handle.cache_message(message, self.prefs.console_cache_limit),
            None => warn!("Console message for unknown tab {tab}"),
        }
    }

    /// Hand an event to every live connection, forgetting connections that ended.
    fn broadcast(&mut self, event: ConnectionEvent) {
        let mut closed = vec![];
        for (id, connection) in &self.connections {
            if connection.events.send(event.clone()).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            if let Some(connection) = self.connections.remove(&id) {
                debug!("Devtools client {id} disconnected");
                let _ = connection.thread.join();
            }
        }
    }
}
