/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! This module contains shared types and messages for use by the devtools server and
//! the host that embeds it. The traits are here instead of in the host so that the
//! devtools crate can be modified independently of the document and script engines
//! it inspects.

#![crate_name = "devtools_traits"]
#![crate_type = "rlib"]
#![deny(unsafe_code)]

use core::fmt;
use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod debugger;
pub mod dom;

use crate::debugger::{DebuggeeValue, ScriptEngine};
use crate::dom::{DocumentTree, NodeId};

/// Identifies one inspectable page known to the devtools server.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab{}", self.0)
    }
}

// Information would be attached to NewGlobal to be received and show in devtools.
// Extend these fields if we need more information.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DevtoolsPageInfo {
    pub title: String,
    pub url: String,
}

/// The host services that back one tab: its document tree and its script engine.
#[derive(Clone)]
pub struct TabHost {
    pub document: Arc<dyn DocumentTree>,
    pub engine: Arc<dyn ScriptEngine>,
}

impl fmt::Debug for TabHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabHost")
            .field("root_document", &self.document.root_document())
            .finish_non_exhaustive()
    }
}

/// A bidirectional channel carrying JSON packets between one client and the server.
///
/// Implementations own their framing; callers only ever see whole packets.
pub trait PacketTransport: fmt::Debug + Send {
    /// Send one packet. Fails once the peer has gone away.
    fn send(&mut self, packet: &Value) -> io::Result<()>;
    /// Block until the next packet arrives. `Ok(None)` means the peer closed the channel.
    fn recv(&mut self) -> io::Result<Option<Value>>;
    /// Obtain another handle onto the same channel, typically so that reading and
    /// writing can happen on different threads.
    fn try_clone(&self) -> io::Result<Box<dyn PacketTransport>>;
    /// Close both directions. Blocked readers on any handle observe end of stream.
    fn shutdown(&self);
}

/// Messages to instruct the devtools server to update its known actors/state
/// according to changes in the host.
#[derive(Debug)]
pub enum DevtoolsControlMsg {
    /// Messages from threads in the chrome process (embedder/network/devtools)
    FromChrome(ChromeToDevtoolsControlMsg),
    /// Messages from script threads
    FromScript(ScriptToDevtoolsControlMsg),
}

/// Events that the devtools server must act upon.
#[derive(Debug)]
pub enum ChromeToDevtoolsControlMsg {
    /// A new client has connected to the server.
    AddClient(Box<dyn PacketTransport>),
    /// The host is shutting down.
    ServerExitMsg,
    /// A network event occurred (request, reply, etc.) for the request with the
    /// given id inside the given tab.
    NetworkEvent(TabId, String, NetworkEvent),
}

/// Events that the devtools server must act upon.
#[derive(Debug)]
pub enum ScriptToDevtoolsControlMsg {
    /// A new content global was created for a tab. The means of inspecting it are provided.
    NewGlobal(TabId, TabHost, DevtoolsPageInfo),
    /// The tab's title changed.
    TitleChanged(TabId, String),
    /// A particular page has invoked the console API.
    ConsoleAPI(TabId, ConsoleMessage),
    /// Report a page error for the given tab.
    ReportPageError(TabId, PageError),
    /// A file was loaded on behalf of the page.
    FileActivity(TabId, String),
    /// The frame element finished loading a new document.
    FrameLoad(TabId, NodeId),
    /// The given document is about to be unloaded.
    DocumentUnload(TabId, NodeId),
    /// The tab went away; every actor inspecting it becomes unusable.
    TabClosed(TabId),
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Debug,
    Info,
    Warn,
    Error,
    Clear,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Clear => "clear",
            LogLevel::Trace => "trace",
            LogLevel::Log => "log",
        }
    }
}

/// A console message as it is sent from script to the devtools server.
/// The arguments are live values; they are turned into grips per connection.
#[derive(Clone, Debug)]
pub struct ConsoleMessage {
    pub log_level: LogLevel,
    pub filename: String,
    pub line_number: u32,
    pub column_number: u32,
    pub function_name: String,
    pub time_stamp: u64,
    pub arguments: Vec<DebuggeeValue>,
    pub stacktrace: Option<Vec<StackFrame>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StackFrame {
    pub filename: String,

    #[serde(rename = "functionName")]
    pub function_name: String,

    #[serde(rename = "columnNumber")]
    pub column_number: u32,

    #[serde(rename = "lineNumber")]
    pub line_number: u32,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
    pub struct CachedConsoleMessageTypes: u8 {
        const PAGE_ERROR  = 1 << 0;
        const CONSOLE_API = 1 << 1;
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageError {
    pub error_message: String,
    pub source_name: String,
    pub line_text: String,
    pub line_number: u32,
    pub column_number: u32,
    pub category: String,
    pub time_stamp: u64,
    pub error: bool,
    pub warning: bool,
    pub exception: bool,
    pub strict: bool,
    pub private: bool,
}

/// Milliseconds since the unix epoch, the unit every devtools timestamp uses.
pub fn current_time_stamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub struct ConsoleMessageBuilder {
    level: LogLevel,
    filename: String,
    line_number: u32,
    column_number: u32,
    function_name: String,
    arguments: Vec<DebuggeeValue>,
    stack_trace: Option<Vec<StackFrame>>,
}

impl ConsoleMessageBuilder {
    pub fn new(level: LogLevel, filename: String, line_number: u32, column_number: u32) -> Self {
        Self {
            level,
            filename,
            line_number,
            column_number,
            function_name: String::new(),
            arguments: vec![],
            stack_trace: None,
        }
    }

    pub fn function_name(&mut self, name: &str) -> &mut Self {
        self.function_name = name.to_owned();
        self
    }

    pub fn attach_stack_trace(&mut self, stack_trace: Vec<StackFrame>) -> &mut Self {
        self.stack_trace = Some(stack_trace);
        self
    }

    pub fn add_argument(&mut self, argument: DebuggeeValue) -> &mut Self {
        self.arguments.push(argument);
        self
    }

    pub fn finish(self) -> ConsoleMessage {
        ConsoleMessage {
            log_level: self.level,
            filename: self.filename,
            line_number: self.line_number,
            column_number: self.column_number,
            function_name: self.function_name,
            time_stamp: current_time_stamp(),
            arguments: self.arguments,
            stacktrace: self.stack_trace,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub http_version: String,
    pub headers_size: usize,
    pub started_date_time: SystemTime,
    pub is_xhr: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponseStart {
    pub http_version: String,
    pub status: u16,
    pub status_text: String,
    pub headers_size: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpResponseContent {
    pub mime_type: String,
    pub body: Option<Vec<u8>>,
}

/// The phases of a request as measured by the network stack, in milliseconds.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct EventTimings {
    pub blocked: u64,
    pub dns: u64,
    pub connect: u64,
    pub send: u64,
    pub wait: u64,
    pub receive: u64,
}

impl EventTimings {
    pub fn total(&self) -> u64 {
        self.blocked + self.dns + self.connect + self.send + self.wait + self.receive
    }
}

/// One step in the life of a network request, reported in order as it happens.
#[derive(Clone, Debug, PartialEq)]
pub enum NetworkEvent {
    HttpRequest(HttpRequest),
    RequestHeaders(Vec<HttpHeader>),
    RequestCookies(Vec<HttpHeader>),
    RequestPostData(Vec<u8>),
    ResponseStart(HttpResponseStart),
    ResponseHeaders(Vec<HttpHeader>),
    ResponseCookies(Vec<HttpHeader>),
    ResponseContent(HttpResponseContent),
    EventTimings(EventTimings),
}
