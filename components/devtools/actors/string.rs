/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/string.js).
//! Strings too long to be sent in one piece. The client fetches them in slices.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::EmptyReplyMsg;
use crate::actor::{Actor, ActorError, ActorRegistry};
use crate::grip::StringLimits;
use crate::protocol::ClientRequest;
use crate::schema::{ActorSchema, ProtocolType, arg, field, method, release_method};

pub(crate) static LONG_STRING_SCHEMA: ActorSchema = ActorSchema {
    type_name: "longstring",
    methods: &[
        method(
            "substring",
            &[
                arg("start", ProtocolType::Number),
                arg("end", ProtocolType::Number),
            ],
            &[field("substring", ProtocolType::String)],
        ),
        release_method("release"),
    ],
    events: &[],
};

#[derive(Serialize)]
pub(crate) struct LongStringGrip {
    #[serde(rename = "type")]
    type_: &'static str,
    actor: String,
    length: usize,
    initial: String,
}

#[derive(Serialize)]
struct SubstringReply {
    from: String,
    substring: String,
}

pub(crate) struct LongStringActor {
    name: String,
    value: String,
}

impl Actor for LongStringActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&LONG_STRING_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        _registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "substring" => {
                let start = index_arg(msg, "start")?;
                let end = index_arg(msg, "end")?;
                let msg = SubstringReply {
                    from: self.name(),
                    substring: self.substring(start, end),
                };
                request.reply_final(&msg)?
            },

            // Releasing happens in the registry once the reply is out.
            "release" => request.reply_final(&EmptyReplyMsg { from: self.name() })?,

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }
}

fn index_arg(msg: &Map<String, Value>, name: &str) -> Result<usize, ActorError> {
    let value = msg
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| ActorError::MissingParameter(name.to_owned()))?;
    Ok(value.max(0.0) as usize)
}

impl LongStringActor {
    /// The slice of the string between two character offsets, clamped to its length.
    pub fn substring(&self, start: usize, end: usize) -> String {
        let end = end.max(start);
        self.value.chars().skip(start).take(end - start).collect()
    }

    /// Register an actor for `value`, released together with `owner`, and return its grip.
    pub fn register(registry: &ActorRegistry, owner: &str, value: &str) -> LongStringGrip {
        let limits = StringLimits::from(registry.prefs());
        let actor = LongStringActor {
            name: registry.new_name("longString"),
            value: value.to_owned(),
        };
        let grip = LongStringGrip {
            type_: "longString",
            actor: actor.name(),
            length: value.chars().count(),
            initial: limits.initial(value),
        };
        registry.manage(owner, actor);
        grip
    }

    pub fn grip(registry: &ActorRegistry, owner: &str, value: &str) -> Value {
        serde_json::to_value(LongStringActor::register(registry, owner, value))
            .unwrap_or(Value::Null)
    }

    /// A plain string when short enough, otherwise a long string grip.
    pub fn string_or_grip(registry: &ActorRegistry, owner: &str, value: &str) -> Value {
        if StringLimits::from(registry.prefs()).is_long(value) {
            LongStringActor::grip(registry, owner, value)
        } else {
            Value::from(value)
        }
    }
}
