/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The thread serving one client. It owns the connection's actor registry and
//! interleaves client requests with events from the host.

use std::rc::Rc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use devtools_traits::dom::{DomMutation, NodeId};
use devtools_traits::{ConsoleMessage, NetworkEvent, PacketTransport, PageError, TabId};
use log::{debug, warn};
use serde_json::Value;

use crate::actor::ActorRegistry;
use crate::actors::console::ConsoleActor;
use crate::actors::inspector::walker::WalkerActor;
use crate::actors::root::RootActor;
use crate::prefs::DevtoolsPrefs;
use crate::protocol::{JsonPacketStream, PacketSender};
use crate::{StreamId, TabHandle};

/// Work for a connection thread that does not come from its client.
#[derive(Clone, Debug)]
pub(crate) enum ConnectionEvent {
    /// Mutation observer records for the walker with the given name.
    Mutations {
        walker: String,
        mutations: Vec<DomMutation>,
    },
    TabAdded(TabHandle),
    TabClosed(TabId),
    ConsoleApi(TabId, ConsoleMessage),
    PageError(TabId, PageError),
    FileActivity(TabId, String),
    Network(TabId, String, NetworkEvent),
    FrameLoad(TabId, NodeId),
    DocumentUnload(TabId, NodeId),
    Shutdown,
}

pub(crate) fn run(
    id: StreamId,
    transport: Box<dyn PacketTransport>,
    tabs: Vec<TabHandle>,
    events: Sender<ConnectionEvent>,
    event_receiver: Receiver<ConnectionEvent>,
    prefs: DevtoolsPrefs,
) {
    let mut reader = match transport.try_clone() {
        Ok(reader) => reader,
        Err(error) => {
            warn!("Failed to clone devtools transport: {error}");
            return;
        },
    };
    let (packet_sender, packets) = unbounded();
    let reader_thread = thread::Builder::new()
        .name(format!("DevtoolsReader{id}"))
        .spawn(move || {
            loop {
                match reader.read_json_packet() {
                    Ok(Some(packet)) => {
                        if packet_sender.send(packet).is_err() {
                            break;
                        }
                    },
                    Ok(None) => break,
                    Err(error) => {
                        debug!("Failed to read devtools packet: {error}");
                        break;
                    },
                }
            }
        });
    let reader_thread = match reader_thread {
        Ok(thread) => thread,
        Err(error) => {
            warn!("Failed to spawn devtools reader: {error}");
            return;
        },
    };

    let sender = PacketSender::new(transport);
    let registry = ActorRegistry::new(id, sender.clone(), events, prefs);
    let root = RootActor::register(&registry);
    for tab in tabs {
        root.add_tab(&registry, tab);
    }

    if sender.send(&root.encodable()).is_ok() {
        serve(&registry, &root, &packets, &event_receiver);
    }

    registry.release_all();
    sender.shutdown();
    let _ = reader_thread.join();
    debug!("Devtools connection {id} closed");
}

fn serve(
    registry: &ActorRegistry,
    root: &RootActor,
    packets: &Receiver<Value>,
    events: &Receiver<ConnectionEvent>,
) {
    loop {
        select! {
            recv(packets) -> packet => match packet {
                Ok(Value::Object(msg)) => {
                    if registry.handle_message(&msg).is_err() {
                        break;
                    }
                },
                Ok(packet) => warn!("Ignoring packet that is not an object: {packet}"),
                Err(_) => break,
            },
            recv(events) -> event => match event {
                Ok(ConnectionEvent::Shutdown) | Err(_) => break,
                Ok(event) => handle_event(registry, root, event),
            },
        }
    }
}

fn handle_event(registry: &ActorRegistry, root: &RootActor, event: ConnectionEvent) {
    match event {
        ConnectionEvent::Mutations { walker, mutations } => {
            match registry.find::<WalkerActor>(&walker) {
                Some(walker) => walker.on_mutations(registry, mutations),
                None => debug!("Dropping mutations for released walker {walker}"),
            }
        },
        ConnectionEvent::TabAdded(tab) => root.add_tab(registry, tab),
        ConnectionEvent::TabClosed(tab) => root.remove_tab(registry, tab),
        ConnectionEvent::ConsoleApi(tab, message) => {
            if let Some(console) = console_for(registry, root, tab) {
                console.on_console_api(registry, &message);
            }
        },
        ConnectionEvent::PageError(tab, error) => {
            if let Some(console) = console_for(registry, root, tab) {
                console.on_page_error(registry, &error);
            }
        },
        ConnectionEvent::FileActivity(tab, uri) => {
            if let Some(console) = console_for(registry, root, tab) {
                console.on_file_activity(registry, &uri);
            }
        },
        ConnectionEvent::Network(tab, request_id, network_event) => {
            if let Some(console) = console_for(registry, root, tab) {
                console.on_network_event(registry, &request_id, network_event);
            }
        },
        ConnectionEvent::FrameLoad(tab, frame) => {
            if let Some(tab) = root.tab(registry, tab) {
                for walker in tab.walkers(registry) {
                    walker.on_frame_load(registry, frame);
                }
            }
        },
        ConnectionEvent::DocumentUnload(tab, document) => {
            if let Some(tab) = root.tab(registry, tab) {
                for walker in tab.walkers(registry) {
                    walker.on_document_unload(registry, document);
                }
            }
        },
        ConnectionEvent::Shutdown => {},
    }
}

fn console_for(registry: &ActorRegistry, root: &RootActor, tab: TabId) -> Option<Rc<ConsoleActor>> {
    let tab = root.tab(registry, tab)?;
    registry.find::<ConsoleActor>(&tab.console)
}
