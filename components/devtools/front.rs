/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Client side mirrors of server actors. A front knows the methods of its actor
//! type from the same schema tables the server validates requests with.

use serde_json::{Map, Value};

use crate::actors::root::ALL_SCHEMAS;
use crate::schema::ActorSchema;

mod client;
mod console;
mod inspector;
mod tracer;
mod walker;

pub use crate::actors::inspector::walker::MutationMsg as Mutation;
pub use crate::front::client::{ClientError, DevtoolsClient, Packet, PendingReply};
pub use crate::front::console::{ConsoleFront, EvaluationResult};
pub use crate::front::inspector::{InspectorFront, NodeListFront};
pub use crate::front::tracer::TraceFront;
pub use crate::front::walker::{Attr, ChildrenOptions, ChildrenPage, NodeForm, NodeFront, WalkerFront};

fn schema_for(type_name: &str) -> Option<&'static ActorSchema> {
    ALL_SCHEMAS
        .iter()
        .find(|schema| schema.type_name == type_name)
        .copied()
}

/// A client handle on one server actor.
#[derive(Clone, Debug)]
pub struct Front {
    client: DevtoolsClient,
    actor: String,
    schema: &'static ActorSchema,
}

impl Front {
    /// A front for `actor`, whose type is named `type_name` in the protocol.
    pub fn new(client: &DevtoolsClient, actor: &str, type_name: &str) -> Result<Front, ClientError> {
        let schema = schema_for(type_name)
            .ok_or_else(|| ClientError::Marshal(format!("unknown actor type {type_name}")))?;
        Ok(Front {
            client: client.clone(),
            actor: actor.to_owned(),
            schema,
        })
    }

    /// A front for the actor described by `form`.
    pub fn from_form(
        client: &DevtoolsClient,
        form: &Value,
        type_name: &str,
    ) -> Result<Front, ClientError> {
        let actor = form
            .get("actor")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Marshal(format!("{type_name} form without an actor")))?;
        Front::new(client, actor, type_name)
    }

    pub fn actor_id(&self) -> &str {
        &self.actor
    }

    pub fn type_name(&self) -> &'static str {
        self.schema.type_name
    }

    pub fn client(&self) -> &DevtoolsClient {
        &self.client
    }

    /// Start a call to `method`. Arguments are checked against the method's
    /// declaration, and actor arguments may be given as forms.
    pub fn request(&self, method: &str, args: Map<String, Value>) -> Result<PendingReply, ClientError> {
        let schema = self.schema.method(method).ok_or_else(|| {
            ClientError::Marshal(format!("{} has no method {method}", self.schema.type_name))
        })?;
        let packet = schema
            .write_request(&self.actor, args)
            .map_err(|error| ClientError::Marshal(error.message()))?;
        self.client.request(packet)
    }

    /// Call `method` and wait for the reply.
    pub fn call(&self, method: &str, args: Map<String, Value>) -> Result<Map<String, Value>, ClientError> {
        self.request(method, args)?.wait()
    }

    /// Every actor form in a reply to `method`, in the order they appear, with
    /// the name of its actor type.
    pub(crate) fn reply_forms(
        &self,
        method: &str,
        reply: &Map<String, Value>,
    ) -> Vec<(&'static str, Value)> {
        let mut forms = vec![];
        if let Some(schema) = self.schema.method(method) {
            schema.visit_reply_forms(reply, &mut |type_name, form| {
                forms.push((type_name, form.clone()))
            });
        }
        forms
    }
}

/// Build an argument map from name/value pairs, skipping absent values.
pub(crate) fn args<const N: usize>(pairs: [(&str, Option<Value>); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name.to_owned(), value)))
        .collect()
}

/// The full text of a value that is either a plain string or a long string grip.
/// Long strings are fetched in one slice and released afterwards.
pub fn string_value(client: &DevtoolsClient, value: &Value) -> Result<String, ClientError> {
    if let Some(text) = value.as_str() {
        return Ok(text.to_owned());
    }
    if value.get("type").and_then(Value::as_str) != Some("longString") {
        return Err(ClientError::Marshal(format!("not a string: {value}")));
    }
    let long_string = Front::from_form(client, value, "longstring")?;
    let length = value.get("length").and_then(Value::as_u64).unwrap_or(0);
    let reply = long_string.call(
        "substring",
        args([
            ("start", Some(Value::from(0))),
            ("end", Some(Value::from(length))),
        ]),
    )?;
    long_string.call("release", Map::new())?;
    reply
        .get("substring")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ClientError::Marshal("substring reply without a substring".to_owned()))
}
