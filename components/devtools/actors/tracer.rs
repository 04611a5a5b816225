/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The trace actor streams a packet to the client for every frame the debuggee
//! enters and leaves, carrying whichever details the active traces asked for.
//!
//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/tracer.js).

use std::cell::{Cell, RefCell};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use devtools_traits::debugger::{
    Completion, DebuggeeFrame, DebuggeeValue, DebuggerSession, FrameHook, NewGlobalHook,
    ScriptEngine,
};
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::actor::{Actor, ActorError, ActorRegistry};
use crate::grip::{ObjectPool, StringLimits, value_grip};
use crate::protocol::{ClientRequest, PacketSender};
use crate::schema::{
    ActorSchema, EventSchema, NULLABLE_STRING, ProtocolType, STRING_ARRAY, arg, field, method,
    option,
};

pub mod map_stack;

use map_stack::MapStack;

pub(crate) static TRACE_SCHEMA: ActorSchema = ActorSchema {
    type_name: "trace",
    methods: &[
        method("attach", &[], &[field("traceTypes", STRING_ARRAY)]),
        method("detach", &[], &[]),
        method(
            "startTrace",
            &[arg("trace", STRING_ARRAY), option("name", NULLABLE_STRING)],
            &[field("name", ProtocolType::String)],
        ),
        method(
            "stopTrace",
            &[option("name", NULLABLE_STRING)],
            &[field("name", ProtocolType::String)],
        ),
    ],
    events: &[
        EventSchema {
            name: "enteredFrame",
            fields: &[],
        },
        EventSchema {
            name: "exitedFrame",
            fields: &[],
        },
    ],
};

/// The details a trace can ask for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum TraceType {
    Name,
    Callsite,
    Time,
    ParameterNames,
    Arguments,
    Return,
    Throw,
    Yield,
}

pub(crate) const TRACE_TYPES: [TraceType; 8] = [
    TraceType::Name,
    TraceType::Callsite,
    TraceType::Time,
    TraceType::ParameterNames,
    TraceType::Arguments,
    TraceType::Return,
    TraceType::Throw,
    TraceType::Yield,
];

impl TraceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceType::Name => "name",
            TraceType::Callsite => "callsite",
            TraceType::Time => "time",
            TraceType::ParameterNames => "parameterNames",
            TraceType::Arguments => "arguments",
            TraceType::Return => "return",
            TraceType::Throw => "throw",
            TraceType::Yield => "yield",
        }
    }

    pub fn parse(name: &str) -> Option<TraceType> {
        TRACE_TYPES
            .iter()
            .copied()
            .find(|trace_type| trace_type.as_str() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// How many active traces asked for each trace type, and where the current
/// tracing session started.
#[derive(Debug)]
struct TraceState {
    requests: [usize; TRACE_TYPES.len()],
    sequence: u64,
    start_time: Instant,
}

impl TraceState {
    fn requested(&self, trace_type: TraceType) -> bool {
        self.requests[trace_type.index()] > 0
    }
}

/// The frame hook installed in the debugger. It runs on the debuggee's thread and
/// writes packets straight to the client.
struct FrameTracer {
    actor: String,
    sender: PacketSender,
    limits: StringLimits,
    state: Mutex<TraceState>,
}

impl FrameTracer {
    fn state(&self) -> MutexGuard<'_, TraceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the next sequence number together with the trace types to report.
    /// Values must be serialized after the lock is released: getters run debuggee code.
    fn next_packet(
        &self,
        packet_type: &str,
    ) -> (Map<String, Value>, [bool; TRACE_TYPES.len()], u64) {
        let mut state = self.state();
        let sequence = state.sequence;
        state.sequence += 1;
        let requested = TRACE_TYPES.map(|trace_type| state.requested(trace_type));
        let elapsed = state.start_time.elapsed().as_millis() as u64;

        let mut packet = Map::new();
        packet.insert("from".to_owned(), Value::from(self.actor.clone()));
        packet.insert("type".to_owned(), Value::from(packet_type));
        packet.insert("sequence".to_owned(), Value::from(sequence));
        (packet, requested, elapsed)
    }

    fn send(&self, packet: Map<String, Value>) {
        if let Err(error) = self.sender.send(&Value::Object(packet)) {
            debug!("Failed to send trace packet: {error:?}");
        }
    }

    fn pooled_grip(&self, value: &DebuggeeValue) -> Value {
        let mut pool = ObjectPool::new(self.limits);
        let grip = value_grip(value, &mut pool);
        json!({ "value": grip, "objectPool": pool.into_descriptors() })
    }
}

impl FrameHook for FrameTracer {
    fn on_enter_frame(&self, frame: &dyn DebuggeeFrame) {
        let (mut packet, requested, elapsed) = self.next_packet("enteredFrame");
        let wants = |trace_type: TraceType| requested[trace_type.index()];

        if wants(TraceType::Name) {
            let name = match frame.callee() {
                Some(callee) => callee
                    .display_name()
                    .unwrap_or_else(|| "(anonymous function)".to_owned()),
                None => format!("({})", frame.frame_type()),
            };
            packet.insert("name".to_owned(), Value::from(name));
        }

        if wants(TraceType::Callsite) {
            if let Some(location) = frame.location() {
                let column = location.column.unwrap_or_else(|| {
                    warn!("Could not find a column for a frame in {}", location.url);
                    0
                });
                packet.insert(
                    "callsite".to_owned(),
                    json!({ "url": location.url, "line": location.line, "column": column }),
                );
            }
        }

        if wants(TraceType::Time) {
            packet.insert("time".to_owned(), Value::from(elapsed));
        }

        if wants(TraceType::ParameterNames) {
            if let Some(names) = frame.callee().and_then(|_| frame.parameter_names()) {
                packet.insert("parameterNames".to_owned(), Value::from(names));
            }
        }

        if wants(TraceType::Arguments) {
            if let Some(arguments) = frame.arguments() {
                let mut pool = ObjectPool::new(self.limits);
                let values: Vec<Value> = arguments
                    .iter()
                    .map(|argument| value_grip(argument, &mut pool))
                    .collect();
                packet.insert(
                    "arguments".to_owned(),
                    json!({ "values": values, "objectPool": pool.into_descriptors() }),
                );
            }
        }

        self.send(packet);
    }

    fn on_pop_frame(&self, _frame: &dyn DebuggeeFrame, completion: &Completion) {
        let (mut packet, requested, elapsed) = self.next_packet("exitedFrame");
        let wants = |trace_type: TraceType| requested[trace_type.index()];

        if wants(TraceType::Time) {
            packet.insert("time".to_owned(), Value::from(elapsed));
        }
        let (trace_type, value) = match completion {
            Completion::Return(value) => (TraceType::Return, value),
            Completion::Throw(value) => (TraceType::Throw, value),
            Completion::Yield(value) => (TraceType::Yield, value),
            Completion::Terminated => return self.send(packet),
        };
        if wants(trace_type) {
            packet.insert(trace_type.as_str().to_owned(), self.pooled_grip(value));
        }

        self.send(packet);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachedReply {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    trace_types: Vec<&'static str>,
}

#[derive(Serialize)]
struct DetachedReply {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Serialize)]
struct TraceReply {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    why: &'static str,
    name: String,
}

pub(crate) struct TraceActor {
    name: String,
    engine: Arc<dyn ScriptEngine>,
    /// Present while attached.
    session: RefCell<Option<Box<dyn DebuggerSession>>>,
    active_traces: RefCell<MapStack<String, Vec<TraceType>>>,
    total_traces: Cell<u32>,
    tracer: Arc<FrameTracer>,
}

impl Actor for TraceActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&TRACE_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        _registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "attach" => {
                self.attach()?;
                let msg = AttachedReply {
                    from: self.name(),
                    type_: "attached",
                    trace_types: TRACE_TYPES.iter().map(TraceType::as_str).collect(),
                };
                request.reply_final(&msg)?
            },

            "detach" => {
                self.detach();
                let msg = DetachedReply {
                    from: self.name(),
                    type_: "detached",
                };
                request.reply_final(&msg)?
            },

            "startTrace" => {
                let trace_types = msg
                    .get("trace")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ActorError::MissingParameter("trace".to_owned()))?
                    .iter()
                    .map(|trace_type| {
                        trace_type
                            .as_str()
                            .and_then(TraceType::parse)
                            .ok_or_else(|| {
                                ActorError::BadParameterType(format!(
                                    "No such trace type: {trace_type}"
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let name = msg.get("name").and_then(Value::as_str);
                let name = self.start_trace(name, trace_types)?;
                let msg = TraceReply {
                    from: self.name(),
                    type_: "startedTrace",
                    why: "requested",
                    name,
                };
                request.reply_final(&msg)?
            },

            "stopTrace" => {
                let name = msg.get("name").and_then(Value::as_str);
                let name = self.stop_trace(name)?;
                let msg = TraceReply {
                    from: self.name(),
                    type_: "stoppedTrace",
                    why: "requested",
                    name,
                };
                request.reply_final(&msg)?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }

    fn destroy(&self, _registry: &ActorRegistry) {
        self.detach();
    }
}

impl TraceActor {
    pub fn register(registry: &ActorRegistry, owner: &str, engine: Arc<dyn ScriptEngine>) -> String {
        let name = registry.new_name("trace");
        let tracer = Arc::new(FrameTracer {
            actor: name.clone(),
            sender: registry.sender().clone(),
            limits: StringLimits::from(registry.prefs()),
            state: Mutex::new(TraceState {
                requests: [0; TRACE_TYPES.len()],
                sequence: 0,
                start_time: Instant::now(),
            }),
        });
        registry.manage(
            owner,
            TraceActor {
                name: name.clone(),
                engine,
                session: RefCell::default(),
                active_traces: RefCell::default(),
                total_traces: Cell::new(0),
                tracer,
            },
        );
        name
    }

    fn attached(&self) -> bool {
        self.session.borrow().is_some()
    }

    fn tracing(&self) -> bool {
        self.attached() && !self.active_traces.borrow().is_empty()
    }

    fn attach(&self) -> Result<(), ActorError> {
        if self.attached() {
            return Err(ActorError::WrongState(
                "Already attached to a client".to_owned(),
            ));
        }

        let mut session = self.engine.new_debugger();
        let content = self.engine.content_global();
        let debuggees = std::iter::once(content).chain(self.engine.child_globals(content));
        for global in debuggees {
            if let Err(error) = session.add_debuggee(global) {
                warn!("Ignoring request to add {global:?} as a debuggee: {}", error.0);
            }
        }
        // Only globals embedded in the content window, like iframe children.
        let new_global_hook: NewGlobalHook =
            Box::new(move |_global, parent| parent == Some(content));
        session.set_new_global_hook(Some(new_global_hook));
        session.set_frame_hook(Some(self.tracer.clone() as Arc<dyn FrameHook>));
        session.set_enabled(false);
        *self.session.borrow_mut() = Some(session);
        Ok(())
    }

    /// Stop every trace, then tear the debugger down.
    fn detach(&self) {
        while self.tracing() {
            if let Err(error) = self.stop_trace(None) {
                warn!("Failed to stop trace while detaching: {error:?}");
                break;
            }
        }
        if let Some(mut session) = self.session.borrow_mut().take() {
            session.set_enabled(false);
            session.set_frame_hook(None);
            session.set_new_global_hook(None);
        }
    }

    fn start_trace(
        &self,
        name: Option<&str>,
        trace_types: Vec<TraceType>,
    ) -> Result<String, ActorError> {
        let mut session = self.session.borrow_mut();
        let Some(session) = session.as_mut() else {
            return Err(ActorError::WrongState("Not attached".to_owned()));
        };

        let mut active_traces = self.active_traces.borrow_mut();
        let mut state = self.tracer.state();
        if active_traces.is_empty() {
            state.sequence = 0;
            state.start_time = Instant::now();
            session.set_enabled(true);
        }

        self.total_traces.set(self.total_traces.get() + 1);
        let name = name
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Trace {}", self.total_traces.get()));
        for trace_type in &trace_types {
            state.requests[trace_type.index()] += 1;
        }
        // A trace restarted under the same name gives up what the old one asked for.
        if let Some(replaced) = active_traces.push(name.clone(), trace_types) {
            for trace_type in replaced {
                state.requests[trace_type.index()] -= 1;
            }
        }
        Ok(name)
    }

    fn stop_trace(&self, name: Option<&str>) -> Result<String, ActorError> {
        if !self.tracing() {
            return Err(ActorError::WrongState("No active traces".to_owned()));
        }

        let mut active_traces = self.active_traces.borrow_mut();
        let (name, stopped) = match name {
            Some(name) => {
                let name = name.to_owned();
                let Some(stopped) = active_traces.delete(&name) else {
                    return Err(ActorError::NoSuchTrace(name));
                };
                (name, stopped)
            },
            None => active_traces.pop().ok_or(ActorError::Internal)?,
        };

        let mut state = self.tracer.state();
        for trace_type in stopped {
            state.requests[trace_type.index()] -= 1;
        }
        if active_traces.is_empty() {
            if let Some(session) = self.session.borrow_mut().as_mut() {
                session.set_enabled(false);
            }
        }
        Ok(name)
    }
}
