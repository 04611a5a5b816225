/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use devtools_traits::debugger::{FrameId, FrameInfo};
use serde::Serialize;

use crate::actor::{Actor, ActorEncode, ActorRegistry};
use crate::schema::ActorSchema;

pub(crate) static FRAME_SCHEMA: ActorSchema = ActorSchema {
    type_name: "frame",
    methods: &[],
    events: &[],
};

#[derive(Serialize)]
pub(crate) struct FrameWhere {
    url: String,
    line: u32,
    column: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FrameActorMsg {
    actor: String,
    #[serde(rename = "type")]
    type_: String,
    display_name: String,
    depth: usize,
    #[serde(rename = "where")]
    where_: FrameWhere,
}

/// Represents a paused stack frame. Handed out by the `ThreadActor`, and usable as
/// the target of console evaluations.
/// <https://searchfox.org/firefox-main/source/devtools/server/actors/frame.js>
pub(crate) struct FrameActor {
    name: String,
    depth: usize,
    frame: FrameInfo,
}

impl Actor for FrameActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&FRAME_SCHEMA)
    }
}

impl FrameActor {
    pub fn register(registry: &ActorRegistry, owner: &str, depth: usize, frame: FrameInfo) -> String {
        let name = registry.new_name("frame");
        registry.manage(
            owner,
            FrameActor {
                name: name.clone(),
                depth,
                frame,
            },
        );
        name
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame.id
    }
}

impl ActorEncode<FrameActorMsg> for FrameActor {
    fn encode(&self, _: &ActorRegistry) -> FrameActorMsg {
        FrameActorMsg {
            actor: self.name(),
            type_: self.frame.frame_type.clone(),
            display_name: self.frame.display_name.clone(),
            depth: self.depth,
            where_: FrameWhere {
                url: self.frame.url.clone(),
                line: self.frame.line,
                column: self.frame.column,
            },
        }
    }
}
