/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use crossbeam_channel::Receiver;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::front::client::wait_for;
use crate::front::{ClientError, DevtoolsClient, Front, Packet, args};

/// The reply to an `evaluateJS` request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub input: String,
    pub result: Value,
    pub timestamp: u64,
    #[serde(default)]
    pub exception: Value,
    #[serde(default)]
    pub exception_message: Option<String>,
    #[serde(default)]
    pub helper_result: Value,
}

impl EvaluationResult {
    pub fn threw(&self) -> bool {
        !self.exception.is_null()
    }
}

/// Client for a tab's console actor. Console events are queued from the moment
/// the front is created.
pub struct ConsoleFront {
    front: Front,
    events: Receiver<Packet>,
}

fn strings(reply: &Packet, field: &str) -> Vec<String> {
    reply
        .get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|value| value.as_str().map(str::to_owned))
        .collect()
}

impl ConsoleFront {
    pub fn new(client: &DevtoolsClient, actor: &str) -> Result<ConsoleFront, ClientError> {
        Ok(ConsoleFront {
            front: Front::new(client, actor, "console")?,
            events: client.subscribe(actor),
        })
    }

    pub fn actor_id(&self) -> &str {
        self.front.actor_id()
    }

    pub fn start_listeners(&self, listeners: &[&str]) -> Result<Vec<String>, ClientError> {
        let reply = self.front.call(
            "startListeners",
            args([("listeners", Some(Value::from(listeners.to_vec())))]),
        )?;
        Ok(strings(&reply, "startedListeners"))
    }

    /// Stop the given listeners, or all of them.
    pub fn stop_listeners(&self, listeners: Option<&[&str]>) -> Result<Vec<String>, ClientError> {
        let reply = self.front.call(
            "stopListeners",
            args([(
                "listeners",
                listeners.map(|listeners| Value::from(listeners.to_vec())),
            )]),
        )?;
        Ok(strings(&reply, "stoppedListeners"))
    }

    pub fn get_cached_messages(&self, message_types: &[&str]) -> Result<Vec<Value>, ClientError> {
        let reply = self.front.call(
            "getCachedMessages",
            args([("messageTypes", Some(Value::from(message_types.to_vec())))]),
        )?;
        Ok(reply
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Evaluate `text` in the page, optionally with `_self` bound to an object
    /// actor's value or inside a paused frame.
    pub fn evaluate_js(
        &self,
        text: &str,
        bind_object_actor: Option<&str>,
        frame_actor: Option<&str>,
    ) -> Result<EvaluationResult, ClientError> {
        let reply = self.front.call(
            "evaluateJS",
            args([
                ("text", Some(Value::from(text))),
                ("bindObjectActor", bind_object_actor.map(Value::from)),
                ("frameActor", frame_actor.map(Value::from)),
            ]),
        )?;
        serde_json::from_value(Value::Object(reply))
            .map_err(|error| ClientError::Marshal(format!("bad evaluation reply: {error}")))
    }

    /// Completions for `text` up to `cursor`, with the prefix they complete.
    pub fn autocomplete(
        &self,
        text: &str,
        cursor: Option<usize>,
    ) -> Result<(Vec<String>, String), ClientError> {
        let reply = self.front.call(
            "autocomplete",
            args([
                ("text", Some(Value::from(text))),
                ("cursor", cursor.map(Value::from)),
            ]),
        )?;
        let match_prop = reply
            .get("matchProp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Ok((strings(&reply, "matches"), match_prop))
    }

    pub fn clear_messages_cache(&self) -> Result<(), ClientError> {
        self.front.call("clearMessagesCache", Map::new())?;
        Ok(())
    }

    pub fn set_preferences(&self, preferences: Map<String, Value>) -> Result<Vec<String>, ClientError> {
        let reply = self.front.call(
            "setPreferences",
            args([("preferences", Some(Value::Object(preferences)))]),
        )?;
        Ok(strings(&reply, "updated"))
    }

    /// Wait for a console event such as `consoleAPICall` or `networkEvent`.
    pub fn wait_for_event(&self, event_type: &str, timeout: Duration) -> Option<Packet> {
        wait_for(&self.events, event_type, timeout)
    }
}

impl Drop for ConsoleFront {
    fn drop(&mut self) {
        self.front.client().unsubscribe(self.front.actor_id());
    }
}
