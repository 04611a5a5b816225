/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde_json::{Map, Value};

use crate::front::walker::WalkerFront;
use crate::front::{ClientError, DevtoolsClient, Front, args};

pub struct InspectorFront {
    front: Front,
}

impl InspectorFront {
    pub fn new(client: &DevtoolsClient, actor: &str) -> Result<InspectorFront, ClientError> {
        Ok(InspectorFront {
            front: Front::new(client, actor, "inspector")?,
        })
    }

    pub fn actor_id(&self) -> &str {
        self.front.actor_id()
    }

    /// A fresh walker over the tab's document.
    pub fn get_walker(&self) -> Result<WalkerFront, ClientError> {
        let reply = self.front.call("getWalker", Map::new())?;
        let walker = reply
            .get("walker")
            .ok_or_else(|| ClientError::Marshal("getWalker without a walker".to_owned()))?;
        WalkerFront::new(self.front.client(), walker)
    }
}

/// A list of nodes matched on the server. Nodes are read into the walker that
/// made the query as they are fetched.
pub struct NodeListFront {
    front: Front,
    length: usize,
}

impl NodeListFront {
    pub(crate) fn from_form(client: &DevtoolsClient, form: &Value) -> Result<NodeListFront, ClientError> {
        Ok(NodeListFront {
            front: Front::from_form(client, form, "domnodelist")?,
            length: form.get("length").and_then(Value::as_u64).unwrap_or(0) as usize,
        })
    }

    pub fn actor_id(&self) -> &str {
        self.front.actor_id()
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn item(&self, walker: &mut WalkerFront, index: usize) -> Result<Option<String>, ClientError> {
        let reply = self
            .front
            .call("item", args([("item", Some(Value::from(index)))]))?;
        walker.read_forms(self.front.reply_forms("item", &reply))?;
        Ok(reply
            .get("node")
            .and_then(|node| node.get("actor"))
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    /// The nodes between `start` and `end`, defaulting to the whole list.
    pub fn items(
        &self,
        walker: &mut WalkerFront,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<Vec<String>, ClientError> {
        let reply = self.front.call(
            "items",
            args([
                ("start", start.map(Value::from)),
                ("end", end.map(Value::from)),
            ]),
        )?;
        walker.read_forms(self.front.reply_forms("items", &reply))?;
        Ok(reply
            .get("nodes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|node| node.get("actor")?.as_str().map(str::to_owned))
            .collect())
    }

    pub fn release(self) -> Result<(), ClientError> {
        self.front.call("release", Map::new())?;
        Ok(())
    }
}
