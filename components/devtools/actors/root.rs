/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/root.js).
//! Connection point for all new remote devtools interactions, providing lists of known actors
//! that perform more specific actions (tabs, inspectors, consoles, tracers).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use devtools_traits::TabId;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::TabHandle;
use crate::actor::{Actor, ActorError, ActorRegistry};
use crate::actors::console::CONSOLE_SCHEMA;
use crate::actors::frame::FRAME_SCHEMA;
use crate::actors::inspector::INSPECTOR_SCHEMA;
use crate::actors::inspector::node::NODE_SCHEMA;
use crate::actors::inspector::node_list::NODE_LIST_SCHEMA;
use crate::actors::inspector::walker::WALKER_SCHEMA;
use crate::actors::network_event::NETWORK_EVENT_SCHEMA;
use crate::actors::object::OBJECT_SCHEMA;
use crate::actors::string::LONG_STRING_SCHEMA;
use crate::actors::tab::{TAB_SCHEMA, TabActor, TabActorMsg};
use crate::actors::thread::THREAD_SCHEMA;
use crate::actors::tracer::TRACE_SCHEMA;
use crate::protocol::{ActorDescription, ClientRequest};
use crate::schema::{ActorSchema, ProtocolType, field, method};

pub(crate) static ROOT_SCHEMA: ActorSchema = ActorSchema {
    type_name: "root",
    methods: &[
        method(
            "listTabs",
            &[],
            &[
                field("tabs", ProtocolType::Json),
                field("selected", ProtocolType::Number),
            ],
        ),
        method(
            "protocolDescription",
            &[],
            &[field("types", ProtocolType::Json)],
        ),
    ],
    events: &[],
};

/// Every actor type a client can meet on this server.
pub(crate) static ALL_SCHEMAS: &[&ActorSchema] = &[
    &ROOT_SCHEMA,
    &TAB_SCHEMA,
    &INSPECTOR_SCHEMA,
    &WALKER_SCHEMA,
    &NODE_SCHEMA,
    &NODE_LIST_SCHEMA,
    &LONG_STRING_SCHEMA,
    &TRACE_SCHEMA,
    &CONSOLE_SCHEMA,
    &OBJECT_SCHEMA,
    &NETWORK_EVENT_SCHEMA,
    &THREAD_SCHEMA,
    &FRAME_SCHEMA,
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActorTraits {
    sources: bool,
    highlightable: bool,
    custom_highlighters: bool,
    network_monitor: bool,
    trace_types: bool,
}

#[derive(Serialize)]
struct ListTabsReply {
    from: String,
    selected: u32,
    tabs: Vec<TabActorMsg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RootActorMsg {
    from: String,
    application_type: String,
    traits: ActorTraits,
}

#[derive(Serialize)]
struct ProtocolDescriptionReply {
    from: String,
    types: BTreeMap<&'static str, ActorDescription>,
}

pub(crate) struct RootActor {
    /// The tab actor standing for each tab the host reported.
    tabs: RefCell<BTreeMap<TabId, String>>,
}

impl Actor for RootActor {
    fn name(&self) -> String {
        "root".to_owned()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&ROOT_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        _msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            // https://wiki.mozilla.org/Remote_Debugging_Protocol#Listing_Browser_Tabs
            "listTabs" => {
                let msg = ListTabsReply {
                    from: self.name(),
                    selected: 0,
                    tabs: self
                        .tabs
                        .borrow()
                        .values()
                        .filter_map(|tab| registry.encode::<TabActor, _>(tab))
                        .collect(),
                };
                request.reply_final(&msg)?
            },

            "protocolDescription" => {
                let msg = ProtocolDescriptionReply {
                    from: self.name(),
                    types: ALL_SCHEMAS
                        .iter()
                        .map(|schema| (schema.type_name, schema.description()))
                        .collect(),
                };
                request.reply_final(&msg)?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

impl RootActor {
    pub fn register(registry: &ActorRegistry) -> Rc<RootActor> {
        registry.register(RootActor {
            tabs: RefCell::default(),
        })
    }

    pub fn encodable(&self) -> RootActorMsg {
        RootActorMsg {
            from: "root".to_owned(),
            application_type: "browser".to_owned(),
            traits: ActorTraits {
                sources: false,
                highlightable: false,
                custom_highlighters: false,
                network_monitor: true,
                trace_types: true,
            },
        }
    }

    pub fn add_tab(&self, registry: &ActorRegistry, tab: TabHandle) {
        let id = tab.id;
        let actor = TabActor::register(registry, &self.name(), tab);
        let previous = self.tabs.borrow_mut().insert(id, actor.name());
        // A new global for a known tab replaces everything built on the old one.
        if let Some(previous) = previous {
            registry.release(&previous);
        }
    }

    pub fn remove_tab(&self, registry: &ActorRegistry, tab: TabId) {
        let actor = self.tabs.borrow_mut().remove(&tab);
        if let Some(actor) = actor {
            registry.release(&actor);
        }
    }

    pub fn tab(&self, registry: &ActorRegistry, tab: TabId) -> Option<Rc<TabActor>> {
        let name = self.tabs.borrow().get(&tab).cloned()?;
        registry.find::<TabActor>(&name)
    }
}
