/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/webbrowser.js).
//! Connection point for remote devtools that wish to investigate a particular tab's contents.
//! Supports dynamic attaching and detaching which control notifications of navigation, etc.

use std::rc::Rc;

use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::TabHandle;
use crate::actor::{Actor, ActorEncode, ActorError, ActorRegistry};
use crate::actors::console::ConsoleActor;
use crate::actors::inspector::InspectorActor;
use crate::actors::inspector::walker::WalkerActor;
use crate::actors::thread::ThreadActor;
use crate::actors::tracer::TraceActor;
use crate::protocol::ClientRequest;
use crate::schema::{ActorSchema, ProtocolType, field, method};

pub(crate) static TAB_SCHEMA: ActorSchema = ActorSchema {
    type_name: "tab",
    methods: &[
        method(
            "attach",
            &[],
            &[field("threadActor", ProtocolType::String)],
        ),
        method("detach", &[], &[]),
    ],
    events: &[],
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TabActorMsg {
    actor: String,
    title: String,
    url: String,
    inspector_actor: String,
    trace_actor: String,
    console_actor: String,
    thread_actor: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TabAttachedReply {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    thread_actor: String,
}

#[derive(Serialize)]
struct TabDetachedReply {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
}

pub(crate) struct TabActor {
    name: String,
    tab: TabHandle,
    pub inspector: String,
    pub tracer: String,
    pub console: String,
    pub thread: String,
}

impl Actor for TabActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&TAB_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        _registry: &ActorRegistry,
        msg_type: &str,
        _msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "attach" => {
                let msg = TabAttachedReply {
                    from: self.name(),
                    type_: "tabAttached",
                    thread_actor: self.thread.clone(),
                };
                request.reply_final(&msg)?
            },

            "detach" => {
                debug!("Client detached from {}", self.tab.id);
                let msg = TabDetachedReply {
                    from: self.name(),
                    type_: "detached",
                };
                request.reply_final(&msg)?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

impl TabActor {
    pub fn register(registry: &ActorRegistry, owner: &str, tab: TabHandle) -> Rc<TabActor> {
        let name = registry.new_name("tab");
        let host = tab.host.clone();
        let inspector = InspectorActor::register(registry, &name, host.document.clone()).name();
        let tracer = TraceActor::register(registry, &name, host.engine.clone());
        let thread = ThreadActor::register(registry, &name, host.engine.clone());
        let console = ConsoleActor::register(registry, &name, tab.clone());
        registry.manage(
            owner,
            TabActor {
                name,
                tab,
                inspector,
                tracer,
                console,
                thread,
            },
        )
    }

    /// Every walker the client obtained for this tab.
    pub fn walkers(&self, registry: &ActorRegistry) -> Vec<Rc<WalkerActor>> {
        registry
            .find::<InspectorActor>(&self.inspector)
            .map(|inspector| inspector.walkers(registry))
            .unwrap_or_default()
    }
}

impl ActorEncode<TabActorMsg> for TabActor {
    fn encode(&self, _: &ActorRegistry) -> TabActorMsg {
        let info = self.tab.page_info();
        TabActorMsg {
            actor: self.name(),
            title: info.title,
            url: info.url,
            inspector_actor: self.inspector.clone(),
            trace_actor: self.tracer.clone(),
            console_actor: self.console.clone(),
            thread_actor: self.thread.clone(),
        }
    }
}
