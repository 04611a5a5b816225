/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The thread actor lists the frames of the paused debuggee stack.

use std::cell::RefCell;
use std::sync::Arc;

use devtools_traits::debugger::ScriptEngine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::actor::{Actor, ActorError, ActorRegistry};
use crate::actors::frame::{FrameActor, FrameActorMsg};
use crate::protocol::ClientRequest;
use crate::schema::{ActorSchema, NULLABLE_NUMBER, ProtocolType, field, method, option};

pub(crate) static THREAD_SCHEMA: ActorSchema = ActorSchema {
    type_name: "thread",
    methods: &[method(
        "frames",
        &[option("start", NULLABLE_NUMBER), option("count", NULLABLE_NUMBER)],
        &[field("frames", ProtocolType::Json)],
    )],
    events: &[],
};

#[derive(Serialize)]
struct FramesReply {
    from: String,
    frames: Vec<FrameActorMsg>,
}

pub(crate) struct ThreadActor {
    name: String,
    engine: Arc<dyn ScriptEngine>,
    /// Frame actors from the last `frames` request. The stack may have moved on
    /// since, so they are replaced on every request.
    frames: RefCell<Vec<String>>,
}

impl Actor for ThreadActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&THREAD_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "frames" => {
                let start = msg.get("start").and_then(Value::as_u64).unwrap_or(0) as usize;
                let count = msg
                    .get("count")
                    .and_then(Value::as_u64)
                    .map_or(usize::MAX, |count| count as usize);

                for frame in self.frames.take() {
                    registry.release(&frame);
                }
                let names: Vec<String> = self
                    .engine
                    .paused_frames()
                    .into_iter()
                    .enumerate()
                    .skip(start)
                    .take(count)
                    .map(|(depth, frame)| FrameActor::register(registry, &self.name, depth, frame))
                    .collect();
                let frames = names
                    .iter()
                    .filter_map(|name| registry.encode::<FrameActor, _>(name))
                    .collect();
                *self.frames.borrow_mut() = names;

                let msg = FramesReply {
                    from: self.name(),
                    frames,
                };
                request.reply_final(&msg)?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

impl ThreadActor {
    pub fn register(registry: &ActorRegistry, owner: &str, engine: Arc<dyn ScriptEngine>) -> String {
        let name = registry.new_name("thread");
        registry.manage(
            owner,
            ThreadActor {
                name: name.clone(),
                engine,
                frames: RefCell::default(),
            },
        );
        name
    }
}
