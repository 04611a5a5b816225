/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/webconsole.js).
//! Mediates interaction between the remote web console and equivalent functionality (object
//! inspection, JS evaluation, autocompletion, cached and live messages) in the debuggee.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use devtools_traits::debugger::{
    Binding, Bindings, Completion, DebuggeeObject, DebuggeeValue, DebuggerSession, FrameId,
    GlobalId, HelperFunction, PropertyKind,
};
use devtools_traits::{ConsoleMessage, NetworkEvent, PageError, StackFrame, current_time_stamp};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::actor::{Actor, ActorError, ActorRegistry};
use crate::actors::frame::FrameActor;
use crate::actors::network_event::{NetworkEventActor, NetworkEventGrip};
use crate::actors::object::ObjectActor;
use crate::grip::{ActorGripper, undefined_grip, value_grip};
use crate::protocol::ClientRequest;
use crate::schema::{
    ActorSchema, NULLABLE_NUMBER, NULLABLE_STRING, ProtocolType, STRING_ARRAY, arg, field, method,
    option,
};
use crate::{CachedMessage, EmptyReplyMsg, TabHandle};

const SAVE_BODIES_PREF: &str = "NetworkMonitor.saveRequestAndResponseBodies";

pub(crate) static CONSOLE_SCHEMA: ActorSchema = ActorSchema {
    type_name: "console",
    methods: &[
        method(
            "startListeners",
            &[arg("listeners", STRING_ARRAY)],
            &[
                field("startedListeners", STRING_ARRAY),
                field("nativeConsoleAPI", ProtocolType::Boolean),
            ],
        ),
        method(
            "stopListeners",
            &[option("listeners", STRING_ARRAY)],
            &[field("stoppedListeners", STRING_ARRAY)],
        ),
        method(
            "getCachedMessages",
            &[arg("messageTypes", STRING_ARRAY)],
            &[field("messages", ProtocolType::Json)],
        ),
        method(
            "evaluateJS",
            &[
                arg("text", ProtocolType::String),
                option("bindObjectActor", NULLABLE_STRING),
                option("frameActor", NULLABLE_STRING),
            ],
            &[
                field("input", ProtocolType::String),
                field("result", ProtocolType::Json),
                field("timestamp", ProtocolType::Number),
                field("exception", ProtocolType::Json),
                field("exceptionMessage", NULLABLE_STRING),
                field("helperResult", ProtocolType::Json),
            ],
        ),
        method(
            "autocomplete",
            &[
                arg("text", ProtocolType::String),
                option("cursor", NULLABLE_NUMBER),
            ],
            &[
                field("matches", STRING_ARRAY),
                field("matchProp", ProtocolType::String),
            ],
        ),
        method("clearMessagesCache", &[], &[]),
        method(
            "setPreferences",
            &[arg("preferences", ProtocolType::Json)],
            &[field("updated", STRING_ARRAY)],
        ),
    ],
    events: &[],
};

/// The kinds of live messages a client can subscribe to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Listener {
    PageError,
    ConsoleApi,
    NetworkActivity,
    FileActivity,
}

const LISTENERS: [Listener; 4] = [
    Listener::PageError,
    Listener::ConsoleApi,
    Listener::NetworkActivity,
    Listener::FileActivity,
];

impl Listener {
    fn parse(name: &str) -> Option<Listener> {
        LISTENERS
            .into_iter()
            .find(|listener| listener.as_str() == name)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Listener::PageError => "PageError",
            Listener::ConsoleApi => "ConsoleAPI",
            Listener::NetworkActivity => "NetworkActivity",
            Listener::FileActivity => "FileActivity",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartedListenersReply {
    from: String,
    native_console_api: bool,
    started_listeners: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopListenersReply {
    from: String,
    stopped_listeners: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleApiMsg {
    level: &'static str,
    filename: String,
    line_number: u32,
    column_number: u32,
    function_name: String,
    time_stamp: u64,
    arguments: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stacktrace: Option<Vec<StackFrame>>,
}

#[derive(Serialize)]
#[serde(tag = "_type")]
enum CachedMessageMsg {
    #[serde(rename = "ConsoleAPI")]
    ConsoleApi(ConsoleApiMsg),
    PageError(PageError),
}

#[derive(Serialize)]
struct GetCachedMessagesReply {
    from: String,
    messages: Vec<CachedMessageMsg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateJsReply {
    from: String,
    input: String,
    result: Value,
    timestamp: u64,
    exception: Value,
    exception_message: Option<String>,
    helper_result: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AutocompleteReply {
    from: String,
    matches: Vec<String>,
    match_prop: String,
}

#[derive(Serialize)]
struct SetPreferencesReply {
    from: String,
    updated: Vec<String>,
}

#[derive(Serialize)]
struct ConsoleApiCallMsg {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    message: ConsoleApiMsg,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageErrorMsg<'a> {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    page_error: &'a PageError,
}

#[derive(Serialize)]
struct FileActivityMsg<'a> {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    uri: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkEventMsg {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    event_actor: NetworkEventGrip,
}

/// What a helper function asks the client to do after an evaluation.
#[derive(Clone, Debug)]
enum HelperResult {
    ClearOutput,
    OpenHelp,
    InspectObject(DebuggeeValue),
}

/// Where an evaluation runs.
#[derive(Clone, Copy, Debug)]
enum EvalTarget {
    Global(GlobalId),
    Frame(FrameId),
}

pub(crate) struct ConsoleActor {
    name: String,
    tab: TabHandle,
    /// Created on the first evaluation.
    session: RefCell<Option<Box<dyn DebuggerSession>>>,
    listeners: RefCell<Vec<Listener>>,
    prefs: RefCell<Map<String, Value>>,
    network_events: RefCell<NetworkRequests>,
    /// The result of the last evaluation, bound as `$_`.
    last_result: RefCell<DebuggeeValue>,
}

impl Actor for ConsoleActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&CONSOLE_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        match msg_type {
            "startListeners" => {
                let mut started_listeners = vec![];
                for name in string_array(msg, "listeners") {
                    let Some(listener) = Listener::parse(name) else {
                        debug!("Ignoring unknown console listener {name}");
                        continue;
                    };
                    let mut listeners = self.listeners.borrow_mut();
                    if !listeners.contains(&listener) {
                        listeners.push(listener);
                    }
                    started_listeners.push(listener.as_str());
                }
                let msg = StartedListenersReply {
                    from: self.name(),
                    native_console_api: true,
                    started_listeners,
                };
                request.reply_final(&msg)?
            },

            "stopListeners" => {
                let requested: Vec<Listener> = match msg.get("listeners") {
                    Some(Value::Array(_)) => string_array(msg, "listeners")
                        .filter_map(Listener::parse)
                        .collect(),
                    _ => LISTENERS.to_vec(),
                };
                let mut listeners = self.listeners.borrow_mut();
                let stopped_listeners = requested
                    .iter()
                    .filter(|listener| listeners.contains(listener))
                    .map(|listener| listener.as_str())
                    .collect();
                listeners.retain(|listener| !requested.contains(listener));
                let msg = StopListenersReply {
                    from: self.name(),
                    stopped_listeners,
                };
                request.reply_final(&msg)?
            },

            "getCachedMessages" => {
                let types: Vec<&str> = string_array(msg, "messageTypes").collect();
                let mut cached = self.tab.cached_messages();
                cached.sort_by_key(CachedMessage::time_stamp);
                let messages = cached
                    .into_iter()
                    .filter_map(|message| match message {
                        CachedMessage::ConsoleApi(message)
                            if types.contains(&"ConsoleAPI") &&
                                self.is_listening(Listener::ConsoleApi) =>
                        {
                            Some(CachedMessageMsg::ConsoleApi(
                                self.console_api_msg(registry, &message),
                            ))
                        },
                        CachedMessage::PageError(error)
                            if types.contains(&"PageError") &&
                                self.is_listening(Listener::PageError) =>
                        {
                            Some(CachedMessageMsg::PageError(error))
                        },
                        _ => None,
                    })
                    .collect();
                let msg = GetCachedMessagesReply {
                    from: self.name(),
                    messages,
                };
                request.reply_final(&msg)?
            },

            "evaluateJS" => {
                let text = msg
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ActorError::MissingParameter("text".to_owned()))?;
                let bind_object = msg.get("bindObjectActor").and_then(Value::as_str);
                let frame_actor = msg.get("frameActor").and_then(Value::as_str);
                let msg = self.evaluate_js(registry, text, bind_object, frame_actor);
                request.reply_final(&msg)?
            },

            "autocomplete" => {
                let text = msg.get("text").and_then(Value::as_str).unwrap_or_default();
                let cursor = msg
                    .get("cursor")
                    .and_then(Value::as_u64)
                    .map_or(usize::MAX, |cursor| cursor as usize);
                let input: String = text.chars().take(cursor).collect();
                let global = self.tab.host.engine.content_global();
                let result = self
                    .with_session(|session| session.autocomplete(global, &input))
                    .unwrap_or_default();
                let msg = AutocompleteReply {
                    from: self.name(),
                    matches: result.matches,
                    match_prop: result.match_prop,
                };
                request.reply_final(&msg)?
            },

            "clearMessagesCache" => {
                self.tab.clear_cached_messages();
                request.reply_final(&EmptyReplyMsg { from: self.name() })?
            },

            "setPreferences" => {
                let preferences = msg
                    .get("preferences")
                    .and_then(Value::as_object)
                    .ok_or_else(|| {
                        ActorError::BadParameterType(
                            "Parameter 'preferences' should be an object".to_owned(),
                        )
                    })?;
                let mut prefs = self.prefs.borrow_mut();
                for (key, value) in preferences {
                    prefs.insert(key.clone(), value.clone());
                }
                let msg = SetPreferencesReply {
                    from: self.name(),
                    updated: preferences.keys().cloned().collect(),
                };
                request.reply_final(&msg)?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }

    fn destroy(&self, _registry: &ActorRegistry) {
        self.session.take();
        self.network_events.borrow_mut().clear();
    }
}

/// Host request IDs to the network event actors describing them.
#[derive(Default)]
struct NetworkRequests(FxHashMap<String, String>);

impl NetworkRequests {
    /// Track `actor` for `request_id`, returning the actor of an earlier start
    /// of the same request.
    fn start(&mut self, request_id: &str, actor: String) -> Option<String> {
        self.0.insert(request_id.to_owned(), actor)
    }

    fn actor(&self, request_id: &str) -> Option<&str> {
        self.0.get(request_id).map(String::as_str)
    }

    fn forget_request(&mut self, request_id: &str) {
        self.0.remove(request_id);
    }

    fn forget_actor(&mut self, actor: &str) {
        self.0.retain(|_, tracked| tracked != actor);
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }
}

fn string_array<'a>(msg: &'a Map<String, Value>, name: &str) -> impl Iterator<Item = &'a str> {
    msg.get(name)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

impl ConsoleActor {
    pub fn register(registry: &ActorRegistry, owner: &str, tab: TabHandle) -> String {
        let name = registry.new_name("console");
        registry.manage(
            owner,
            ConsoleActor {
                name: name.clone(),
                tab,
                session: RefCell::default(),
                listeners: RefCell::default(),
                prefs: RefCell::default(),
                network_events: RefCell::default(),
                last_result: RefCell::new(DebuggeeValue::Undefined),
            },
        );
        name
    }

    fn is_listening(&self, listener: Listener) -> bool {
        self.listeners.borrow().contains(&listener)
    }

    fn save_bodies(&self) -> bool {
        self.prefs
            .borrow()
            .get(SAVE_BODIES_PREF)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut dyn DebuggerSession) -> R) -> R {
        let mut session = self.session.borrow_mut();
        let session = session.get_or_insert_with(|| {
            let engine = &self.tab.host.engine;
            let mut session = engine.new_debugger();
            if let Err(error) = session.add_debuggee(engine.content_global()) {
                warn!("Console could not debug the content global: {error:?}");
            }
            session
        });
        f(session.as_mut())
    }

    fn console_api_msg(&self, registry: &ActorRegistry, message: &ConsoleMessage) -> ConsoleApiMsg {
        let mut gripper = ActorGripper::new(registry, &self.name);
        ConsoleApiMsg {
            level: message.log_level.as_str(),
            filename: message.filename.clone(),
            line_number: message.line_number,
            column_number: message.column_number,
            function_name: message.function_name.clone(),
            time_stamp: message.time_stamp,
            arguments: message
                .arguments
                .iter()
                .map(|argument| value_grip(argument, &mut gripper))
                .collect(),
            stacktrace: message.stacktrace.clone(),
        }
    }

    fn evaluate_js(
        &self,
        registry: &ActorRegistry,
        text: &str,
        bind_object: Option<&str>,
        frame_actor: Option<&str>,
    ) -> EvaluateJsReply {
        // The help function needs to be easy to guess, so the () is optional.
        let input = match text.trim() {
            "help" | "?" => "help()",
            _ => text,
        };

        let bind_self: Option<Arc<dyn DebuggeeObject>> = bind_object
            .and_then(|actor| registry.find::<ObjectActor>(actor))
            .map(|actor| actor.object().clone());

        let frame = frame_actor.and_then(|actor| match registry.find::<FrameActor>(actor) {
            Some(frame) => Some(frame.frame_id()),
            None => {
                warn!("Web Console Actor: the frame actor was not found: {actor}");
                None
            },
        });

        let content_global = self.tab.host.engine.content_global();
        let target = match (frame, bind_self.as_ref().and_then(|object| object.global())) {
            (Some(frame), _) => EvalTarget::Frame(frame),
            (None, Some(global)) => EvalTarget::Global(global),
            (None, None) => EvalTarget::Global(content_global),
        };

        let helper_result = Arc::new(Mutex::new(None));
        let mut bindings = self.helpers(helper_result.clone());
        if let Some(object) = &bind_self {
            bindings.insert(
                "_self".to_owned(),
                Binding::Value(DebuggeeValue::Object(object.clone())),
            );
        }

        let (completion, exception_message) = self.with_session(|session| {
            for helper in ["$", "$$"] {
                let found = match target {
                    EvalTarget::Frame(frame) => session.frame_has_binding(frame, helper),
                    EvalTarget::Global(global) => session.global_has_binding(global, helper),
                };
                if found {
                    bindings.remove(helper);
                }
            }

            let completion = match target {
                EvalTarget::Frame(frame) => session.eval_in_frame(frame, input, &bindings),
                EvalTarget::Global(global) if global != content_global => {
                    // Objects from other globals are evaluated in their own global.
                    if let Err(error) = session.add_debuggee(global) {
                        warn!("Could not debug the global of the bound object: {error:?}");
                    }
                    let completion = session.eval_in_global(global, input, &bindings);
                    session.remove_debuggee(global);
                    completion
                },
                EvalTarget::Global(global) => session.eval_in_global(global, input, &bindings),
            };
            let exception_message = match &completion {
                Completion::Throw(error) => session.error_message(error),
                _ => None,
            };
            (completion, exception_message)
        });

        let mut gripper = ActorGripper::new(registry, &self.name);
        let (result, exception) = match completion {
            Completion::Return(value) | Completion::Yield(value) => {
                *self.last_result.borrow_mut() = value.clone();
                (value_grip(&value, &mut gripper), Value::Null)
            },
            Completion::Throw(error) => (undefined_grip(), value_grip(&error, &mut gripper)),
            Completion::Terminated => {
                debug!("Evaluation of {input:?} was terminated");
                (undefined_grip(), Value::Null)
            },
        };

        let helper_result = match helper_result.lock() {
            Ok(mut helper_result) => helper_result.take(),
            Err(_) => None,
        };
        let helper_result = match helper_result {
            None => Value::Null,
            Some(HelperResult::ClearOutput) => json!({ "type": "clearOutput" }),
            Some(HelperResult::OpenHelp) => json!({ "type": "openHelp" }),
            Some(HelperResult::InspectObject(object)) => json!({
                "type": "inspectObject",
                "input": input,
                "object": value_grip(&object, &mut gripper),
            }),
        };

        EvaluateJsReply {
            from: self.name(),
            input: text.to_owned(),
            result,
            timestamp: current_time_stamp(),
            exception,
            exception_message,
            helper_result,
        }
    }

    /// The functions and values bound for one evaluation.
    fn helpers(&self, helper_result: Arc<Mutex<Option<HelperResult>>>) -> Bindings {
        let document = self.tab.host.document.clone();
        let engine = self.tab.host.engine.clone();
        let mut bindings = Bindings::new();

        let query: HelperFunction = {
            let (document, engine) = (document.clone(), engine.clone());
            Arc::new(move |args: &[DebuggeeValue]| {
                let Some(DebuggeeValue::String(selector)) = args.first() else {
                    return DebuggeeValue::Null;
                };
                match document.query_selector(document.root_document(), selector) {
                    Ok(Some(node)) => engine.node_value(node),
                    Ok(None) => DebuggeeValue::Null,
                    Err(error) => {
                        debug!("$ helper: {error}");
                        DebuggeeValue::Null
                    },
                }
            })
        };
        bindings.insert("$".to_owned(), Binding::Function(query));

        let query_all: HelperFunction = {
            let engine = engine.clone();
            Arc::new(move |args: &[DebuggeeValue]| {
                let Some(DebuggeeValue::String(selector)) = args.first() else {
                    return engine.make_array(vec![]);
                };
                let nodes = document
                    .query_selector_all(document.root_document(), selector)
                    .unwrap_or_default();
                engine.make_array(nodes.into_iter().map(|node| engine.node_value(node)).collect())
            })
        };
        bindings.insert("$$".to_owned(), Binding::Function(query_all));

        bindings.insert(
            "$_".to_owned(),
            Binding::Value(self.last_result.borrow().clone()),
        );

        let keys: HelperFunction = {
            let engine = engine.clone();
            Arc::new(move |args: &[DebuggeeValue]| {
                let names = args
                    .first()
                    .and_then(DebuggeeValue::as_object)
                    .and_then(|object| object.own_property_names().ok())
                    .unwrap_or_default();
                engine.make_array(names.into_iter().map(DebuggeeValue::String).collect())
            })
        };
        bindings.insert("keys".to_owned(), Binding::Function(keys));

        let values: HelperFunction = Arc::new(move |args: &[DebuggeeValue]| {
            let Some(object) = args.first().and_then(DebuggeeValue::as_object) else {
                return engine.make_array(vec![]);
            };
            let values = object
                .own_property_names()
                .unwrap_or_default()
                .iter()
                .filter_map(|name| object.own_property_descriptor(name).ok().flatten())
                .filter_map(|descriptor| match descriptor.kind {
                    PropertyKind::Data { value, .. } => Some(value),
                    PropertyKind::Accessor { .. } => None,
                })
                .collect();
            engine.make_array(values)
        });
        bindings.insert("values".to_owned(), Binding::Function(values));

        let requests = [
            ("clear", HelperResult::ClearOutput),
            ("help", HelperResult::OpenHelp),
        ];
        for (name, request) in requests {
            let helper_result = helper_result.clone();
            let helper: HelperFunction = Arc::new(move |_: &[DebuggeeValue]| {
                if let Ok(mut helper_result) = helper_result.lock() {
                    *helper_result = Some(request.clone());
                }
                DebuggeeValue::Undefined
            });
            bindings.insert(name.to_owned(), Binding::Function(helper));
        }

        let inspect: HelperFunction = Arc::new(move |args: &[DebuggeeValue]| {
            let object = args.first().cloned().unwrap_or(DebuggeeValue::Undefined);
            if let Ok(mut helper_result) = helper_result.lock() {
                *helper_result = Some(HelperResult::InspectObject(object));
            }
            DebuggeeValue::Undefined
        });
        bindings.insert("inspect".to_owned(), Binding::Function(inspect));

        bindings
    }

    pub fn on_console_api(&self, registry: &ActorRegistry, message: &ConsoleMessage) {
        if !self.is_listening(Listener::ConsoleApi) {
            return;
        }
        let msg = ConsoleApiCallMsg {
            from: self.name(),
            type_: "consoleAPICall",
            message: self.console_api_msg(registry, message),
        };
        registry.send_event(&msg);
    }

    pub fn on_page_error(&self, registry: &ActorRegistry, error: &PageError) {
        if !self.is_listening(Listener::PageError) {
            return;
        }
        let msg = PageErrorMsg {
            from: self.name(),
            type_: "pageError",
            page_error: error,
        };
        registry.send_event(&msg);
    }

    pub fn on_file_activity(&self, registry: &ActorRegistry, uri: &str) {
        if !self.is_listening(Listener::FileActivity) {
            return;
        }
        let msg = FileActivityMsg {
            from: self.name(),
            type_: "fileActivity",
            uri,
        };
        registry.send_event(&msg);
    }

    /// A request starts with `HttpRequest`; every later stage is routed to the
    /// network event actor created for it.
    pub fn on_network_event(&self, registry: &ActorRegistry, request_id: &str, event: NetworkEvent) {
        if !self.is_listening(Listener::NetworkActivity) {
            return;
        }
        if let NetworkEvent::HttpRequest(request) = event {
            let actor = NetworkEventActor::register(registry, &self.name, request, self.save_bodies());
            let previous = self
                .network_events
                .borrow_mut()
                .start(request_id, actor.clone());
            if let Some(previous) = previous {
                debug!("Request {request_id} restarted, releasing {previous}");
                registry.release(&previous);
            }
            let Some(event_actor) = registry.encode::<NetworkEventActor, _>(&actor) else {
                return;
            };
            let msg = NetworkEventMsg {
                from: self.name(),
                type_: "networkEvent",
                event_actor,
            };
            registry.send_event(&msg);
            return;
        }

        let actor = self
            .network_events
            .borrow()
            .actor(request_id)
            .map(str::to_owned);
        let actor: Option<Rc<NetworkEventActor>> =
            actor.and_then(|actor| registry.find::<NetworkEventActor>(&actor));
        match actor {
            Some(actor) => actor.on_event(registry, event),
            None => {
                warn!("Network event for unknown request {request_id}");
                self.network_events.borrow_mut().forget_request(request_id);
            },
        }
    }

    /// Called when a network event actor is released.
    pub fn forget_network_event(&self, actor: &str) {
        self.network_events.borrow_mut().forget_actor(actor);
    }
}

#[cfg(test)]
mod test {
    use super::NetworkRequests;

    #[test]
    fn released_actors_are_forgotten() {
        let mut requests = NetworkRequests::default();
        assert_eq!(requests.start("r1", "netEvent1".to_owned()), None);
        assert_eq!(requests.start("r2", "netEvent2".to_owned()), None);
        assert_eq!(requests.actor("r1"), Some("netEvent1"));

        requests.forget_actor("netEvent1");
        assert_eq!(requests.actor("r1"), None);
        assert_eq!(requests.len(), 1);

        requests.forget_request("r2");
        assert_eq!(requests.len(), 0);
    }

    #[test]
    fn restarted_requests_replace_their_actor() {
        let mut requests = NetworkRequests::default();
        requests.start("r1", "netEvent1".to_owned());
        assert_eq!(
            requests.start("r1", "netEvent2".to_owned()).as_deref(),
            Some("netEvent1")
        );
        // Releasing the replaced actor leaves the new one tracked.
        requests.forget_actor("netEvent1");
        assert_eq!(requests.actor("r1"), Some("netEvent2"));
    }
}
