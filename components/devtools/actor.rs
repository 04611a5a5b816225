/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! General actor system infrastructure.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use crossbeam_channel::Sender;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::StreamId;
use crate::connection::ConnectionEvent;
use crate::prefs::DevtoolsPrefs;
use crate::protocol::{ClientRequest, PacketSender};
use crate::schema::ActorSchema;

/// Errors reported to the client in reply to a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActorError {
    MissingParameter(String),
    BadParameterType(String),
    UnrecognizedPacketType,
    NoSuchActor(String),
    WrongState(String),
    NoSuchTrace(String),
    InvalidSelector(String),
    Internal,
}

impl ActorError {
    pub fn name(&self) -> &'static str {
        match self {
            ActorError::MissingParameter(_) => "missingParameter",
            ActorError::BadParameterType(_) => "badParameterType",
            ActorError::UnrecognizedPacketType => "unrecognizedPacketType",
            ActorError::NoSuchActor(_) => "noSuchActor",
            ActorError::WrongState(_) => "wrongState",
            ActorError::NoSuchTrace(_) => "noSuchTrace",
            ActorError::InvalidSelector(_) => "invalidSelector",
            // Clients treat every error they do not know by name as internal.
            ActorError::Internal => "internal",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ActorError::MissingParameter(name) => format!("Missing parameter '{name}'"),
            ActorError::BadParameterType(message) |
            ActorError::WrongState(message) |
            ActorError::InvalidSelector(message) => message.clone(),
            ActorError::UnrecognizedPacketType => "Unrecognized packet type".to_owned(),
            ActorError::NoSuchActor(name) => format!("No such actor for ID: {name}"),
            ActorError::NoSuchTrace(name) => format!("No such trace: {name}"),
            ActorError::Internal => "Internal error".to_owned(),
        }
    }
}

/// A common trait for all devtools actors that encompasses an immutable name
/// and the ability to process messages that are directed to particular actors.
pub(crate) trait Actor: Any + ActorAsAny {
    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        let _ = (request, registry, msg_type, msg);
        Err(ActorError::UnrecognizedPacketType)
    }

    fn name(&self) -> String;

    /// The declared methods of this actor type, used to validate requests.
    fn schema(&self) -> Option<&'static ActorSchema> {
        None
    }

    /// Called once when the actor is released, after its children.
    fn destroy(&self, _registry: &ActorRegistry) {}
}

pub(crate) trait ActorAsAny {
    fn actor_as_any(&self) -> &dyn Any;
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Actor> ActorAsAny for T {
    fn actor_as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

pub(crate) trait ActorEncode<T: Serialize> {
    fn encode(&self, registry: &ActorRegistry) -> T;
}

/// The actors owned by one client connection, and the ownership tree between them.
///
/// Only the connection thread touches the registry.
pub struct ActorRegistry {
    actors: RefCell<FxHashMap<String, Rc<dyn Actor>>>,
    /// Children of each actor, in the order they were added.
    children: RefCell<FxHashMap<String, Vec<String>>>,
    owners: RefCell<FxHashMap<String, String>>,
    /// Debuggee object identity to the object actor describing it.
    script_actors: RefCell<FxHashMap<u64, String>>,
    next: Cell<u32>,
    stream_id: StreamId,
    sender: PacketSender,
    events: Sender<ConnectionEvent>,
    prefs: DevtoolsPrefs,
    start_stamp: Instant,
}

impl ActorRegistry {
    pub(crate) fn new(
        stream_id: StreamId,
        sender: PacketSender,
        events: Sender<ConnectionEvent>,
        prefs: DevtoolsPrefs,
    ) -> ActorRegistry {
        ActorRegistry {
            actors: RefCell::default(),
            children: RefCell::default(),
            owners: RefCell::default(),
            script_actors: RefCell::default(),
            next: Cell::new(0),
            stream_id,
            sender,
            events,
            prefs,
            start_stamp: Instant::now(),
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn prefs(&self) -> &DevtoolsPrefs {
        &self.prefs
    }

    /// Get start stamp when registry was started
    pub fn start_stamp(&self) -> Instant {
        self.start_stamp
    }

    pub(crate) fn sender(&self) -> &PacketSender {
        &self.sender
    }

    /// A channel back into this connection, for callbacks that fire on other threads.
    pub(crate) fn events(&self) -> Sender<ConnectionEvent> {
        self.events.clone()
    }

    /// Create a unique name based on a monotonically increasing suffix
    pub fn new_name(&self, prefix: &str) -> String {
        let suffix = self.next.get();
        self.next.set(suffix + 1);
        format!("{}.{}{}", self.stream_id, prefix, suffix)
    }

    /// Add an actor to the registry of known actors that can receive messages.
    pub(crate) fn register<T: Actor>(&self, actor: T) -> Rc<T> {
        let actor = Rc::new(actor);
        let name = actor.name();
        debug!("registering actor {name}");
        self.actors.borrow_mut().insert(name, actor.clone());
        actor
    }

    /// Add an actor that is released together with `owner`.
    pub(crate) fn manage<T: Actor>(&self, owner: &str, actor: T) -> Rc<T> {
        let actor = self.register(actor);
        let name = actor.name();
        self.children
            .borrow_mut()
            .entry(owner.to_owned())
            .or_default()
            .push(name.clone());
        self.owners.borrow_mut().insert(name, owner.to_owned());
        actor
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actors.borrow().contains_key(name)
    }

    /// Find an actor by registered name
    pub(crate) fn find<T: Actor>(&self, name: &str) -> Option<Rc<T>> {
        let actor = self.actors.borrow().get(name)?.clone();
        actor.into_any_rc().downcast::<T>().ok()
    }

    /// Like `find`, but reports a stale or foreign ID as an error for the client.
    pub(crate) fn lookup<T: Actor>(&self, name: &str) -> Result<Rc<T>, ActorError> {
        self.find::<T>(name).ok_or_else(|| {
            warn!("Request referenced unknown actor {name}");
            ActorError::NoSuchActor(name.to_owned())
        })
    }

    pub(crate) fn encode<A: Actor + ActorEncode<T>, T: Serialize>(&self, name: &str) -> Option<T> {
        self.find::<A>(name).map(|actor| actor.encode(self))
    }

    pub(crate) fn register_script_actor(&self, object: u64, actor: String) {
        debug!("registering {actor} for debuggee object {object}");
        self.script_actors.borrow_mut().insert(object, actor);
    }

    pub(crate) fn script_to_actor(&self, object: u64) -> Option<String> {
        self.script_actors.borrow().get(&object).cloned()
    }

    /// Release an actor and, first, every actor it manages. Afterwards the name no
    /// longer addresses anything.
    pub(crate) fn release(&self, name: &str) {
        let children = self.children.borrow_mut().remove(name).unwrap_or_default();
        for child in children.iter().rev() {
            self.release(child);
        }

        if let Some(owner) = self.owners.borrow_mut().remove(name) {
            if let Some(siblings) = self.children.borrow_mut().get_mut(&owner) {
                siblings.retain(|sibling| sibling != name);
            }
        }
        self.script_actors
            .borrow_mut()
            .retain(|_, actor| actor != name);

        let actor = self.actors.borrow_mut().remove(name);
        if let Some(actor) = actor {
            debug!("releasing actor {name}");
            actor.destroy(self);
        }
    }

    /// Release everything, as when the connection closes.
    pub(crate) fn release_all(&self) {
        let roots: Vec<String> = self
            .actors
            .borrow()
            .keys()
            .filter(|name| !self.owners.borrow().contains_key(*name))
            .cloned()
            .collect();
        for root in roots {
            self.release(&root);
        }
    }

    /// Send an unsolicited packet to the client.
    pub(crate) fn send_event<T: Serialize>(&self, event: &T) {
        if let Err(error) = self.sender.send(event) {
            warn!("Failed to send event to client: {error:?}");
        }
    }

    /// Attempt to process a message as directed by its `to` property. Every
    /// failure is answered with an error packet; `Err` means the client is gone.
    pub(crate) fn handle_message(&self, msg: &Map<String, Value>) -> Result<(), ()> {
        let request_id = msg.get("requestId");
        let Some(to) = msg.get("to").and_then(Value::as_str) else {
            warn!("Received message without a destination: {msg:?}");
            return self.reply_error(
                "root",
                request_id,
                ActorError::MissingParameter("to".to_owned()),
            );
        };

        let Some(actor) = self.actors.borrow().get(to).cloned() else {
            warn!("Message received for unknown actor \"{to}\"");
            return self.reply_error(to, request_id, ActorError::NoSuchActor(to.to_owned()));
        };

        let Some(msg_type) = msg.get("type").and_then(Value::as_str) else {
            return self.reply_error(to, request_id, ActorError::UnrecognizedPacketType);
        };

        let method = match actor.schema() {
            Some(schema) => match schema.validate_request(msg_type, msg) {
                Ok(method) => Some(method),
                Err(error) => return self.reply_error(to, request_id, error),
            },
            None => None,
        };

        let result = ClientRequest::handle(&self.sender, to, request_id, |request| {
            actor.handle_message(request, self, msg_type, msg)
        });
        match result {
            Ok(()) => {
                if method.is_some_and(|method| method.release) {
                    self.release(to);
                }
            },
            Err(error) => debug!(
                "Request \"{msg_type}\" to actor \"{to}\" failed with {}",
                error.name()
            ),
        }
        Ok(())
    }

    fn reply_error(
        &self,
        from: &str,
        request_id: Option<&Value>,
        error: ActorError,
    ) -> Result<(), ()> {
        ClientRequest::handle(&self.sender, from, request_id, |request| {
            request.reply_error(&error)
        })
        .map_err(|_| ())
    }
}
