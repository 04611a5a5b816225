/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use crossbeam_channel::Receiver;
use serde_json::{Map, Value};

use crate::front::{ClientError, DevtoolsClient, Front, Packet, args};

/// Client for a tab's trace actor. Frame events are queued from the moment the
/// front is created.
pub struct TraceFront {
    front: Front,
    events: Receiver<Packet>,
}

impl TraceFront {
    pub fn new(client: &DevtoolsClient, actor: &str) -> Result<TraceFront, ClientError> {
        Ok(TraceFront {
            front: Front::new(client, actor, "trace")?,
            events: client.subscribe(actor),
        })
    }

    pub fn actor_id(&self) -> &str {
        self.front.actor_id()
    }

    /// Attach to the tab's scripts and return the trace types the server supports.
    pub fn attach(&self) -> Result<Vec<String>, ClientError> {
        let reply = self.front.call("attach", Map::new())?;
        Ok(reply
            .get("traceTypes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|trace_type| trace_type.as_str().map(str::to_owned))
            .collect())
    }

    pub fn detach(&self) -> Result<(), ClientError> {
        self.front.call("detach", Map::new())?;
        Ok(())
    }

    /// Start a trace and return its name, which the server picks when none is given.
    pub fn start_trace(&self, trace_types: &[&str], name: Option<&str>) -> Result<String, ClientError> {
        let reply = self.front.call(
            "startTrace",
            args([
                ("trace", Some(Value::from(trace_types.to_vec()))),
                ("name", name.map(Value::from)),
            ]),
        )?;
        trace_name(&reply)
    }

    /// Stop the named trace, or the most recently started one.
    pub fn stop_trace(&self, name: Option<&str>) -> Result<String, ClientError> {
        let reply = self
            .front
            .call("stopTrace", args([("name", name.map(Value::from))]))?;
        trace_name(&reply)
    }

    /// The next `enteredFrame` or `exitedFrame` packet.
    pub fn next_frame_event(&self, timeout: Duration) -> Option<Packet> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Collect frame packets until `count` have arrived or `timeout` passes without one.
    pub fn frame_events(&self, count: usize, timeout: Duration) -> Vec<Packet> {
        let mut events = Vec::with_capacity(count);
        while events.len() < count {
            match self.next_frame_event(timeout) {
                Some(event) => events.push(event),
                None => break,
            }
        }
        events
    }
}

impl Drop for TraceFront {
    fn drop(&mut self) {
        self.front.client().unsubscribe(self.front.actor_id());
    }
}

fn trace_name(reply: &Packet) -> Result<String, ClientError> {
    reply
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ClientError::Marshal("trace reply without a name".to_owned()))
}
