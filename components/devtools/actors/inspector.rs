/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/inspector.js).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use devtools_traits::dom::DocumentTree;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::actor::{Actor, ActorEncode, ActorError, ActorRegistry};
use crate::actors::inspector::walker::{WalkerActor, WalkerMsg};
use crate::protocol::ClientRequest;
use crate::schema::{ActorSchema, ProtocolType, field, method};

pub mod document_walker;
pub mod node;
pub mod node_list;
pub mod walker;

pub(crate) static INSPECTOR_SCHEMA: ActorSchema = ActorSchema {
    type_name: "inspector",
    methods: &[method(
        "getWalker",
        &[],
        &[field("walker", ProtocolType::Actor("domwalker"))],
    )],
    events: &[],
};

#[derive(Serialize)]
struct GetWalkerReply {
    from: String,
    walker: WalkerMsg,
}

pub(crate) struct InspectorActor {
    name: String,
    document: Arc<dyn DocumentTree>,
    /// Every walker handed out so far. Each one keeps its own set of known nodes.
    walkers: RefCell<Vec<String>>,
}

impl Actor for InspectorActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&INSPECTOR_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        _msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "getWalker" => {
                let walker = WalkerActor::register(registry, &self.name, self.document.clone());
                self.walkers.borrow_mut().push(walker.name());
                let msg = GetWalkerReply {
                    from: self.name(),
                    walker: walker.encode(registry),
                };
                request.reply_final(&msg)?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

impl InspectorActor {
    pub fn register(
        registry: &ActorRegistry,
        owner: &str,
        document: Arc<dyn DocumentTree>,
    ) -> Rc<InspectorActor> {
        registry.manage(
            owner,
            InspectorActor {
                name: registry.new_name("inspector"),
                document,
                walkers: RefCell::default(),
            },
        )
    }

    /// The walkers that are still alive.
    pub fn walkers(&self, registry: &ActorRegistry) -> Vec<Rc<WalkerActor>> {
        let mut walkers = self.walkers.borrow_mut();
        walkers.retain(|name| registry.contains(name));
        walkers
            .iter()
            .filter_map(|name| registry.find::<WalkerActor>(name))
            .collect()
    }
}
