/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Liberally derived from the [Firefox JS implementation](http://mxr.mozilla.org/mozilla-central/source/toolkit/devtools/server/actors/webconsole.js).
//! Handles interaction with the remote web console on network events (HTTP requests, responses).

use std::cell::RefCell;
use std::time::SystemTime;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use devtools_traits::{
    EventTimings, HttpHeader, HttpRequest, HttpResponseContent, HttpResponseStart, NetworkEvent,
};
use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::EmptyReplyMsg;
use crate::actor::{Actor, ActorEncode, ActorError, ActorRegistry};
use crate::actors::console::ConsoleActor;
use crate::actors::string::LongStringActor;
use crate::protocol::ClientRequest;
use crate::schema::{ActorSchema, ProtocolType, field, method, release_method};

pub(crate) static NETWORK_EVENT_SCHEMA: ActorSchema = ActorSchema {
    type_name: "netEvent",
    methods: &[
        release_method("release"),
        method(
            "getRequestHeaders",
            &[],
            &[
                field("headers", ProtocolType::Json),
                field("headersSize", ProtocolType::Number),
            ],
        ),
        method("getRequestCookies", &[], &[field("cookies", ProtocolType::Json)]),
        method(
            "getRequestPostData",
            &[],
            &[
                field("postData", ProtocolType::Json),
                field("postDataDiscarded", ProtocolType::Boolean),
            ],
        ),
        method(
            "getResponseHeaders",
            &[],
            &[
                field("headers", ProtocolType::Json),
                field("headersSize", ProtocolType::Number),
            ],
        ),
        method("getResponseCookies", &[], &[field("cookies", ProtocolType::Json)]),
        method(
            "getResponseContent",
            &[],
            &[
                field("content", ProtocolType::Json),
                field("contentDiscarded", ProtocolType::Boolean),
            ],
        ),
        method(
            "getEventTimings",
            &[],
            &[
                field("timings", ProtocolType::Json),
                field("totalTime", ProtocolType::Number),
            ],
        ),
    ],
    events: &[],
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NetworkEventGrip {
    actor: String,
    started_date_time: String,
    url: String,
    method: String,
    #[serde(rename = "isXHR")]
    is_xhr: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkEventUpdateMsg {
    from: String,
    #[serde(rename = "type")]
    type_: &'static str,
    update_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeadersUpdateMsg {
    headers: usize,
    headers_size: usize,
}

#[derive(Serialize)]
struct CookiesUpdateMsg {
    cookies: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostDataUpdateMsg {
    data_size: usize,
    discard_request_body: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseStartMsg {
    http_version: String,
    status: String,
    status_text: String,
    headers_size: usize,
    discard_response_body: bool,
}

#[derive(Serialize)]
struct ResponseStartUpdateMsg {
    response: ResponseStartMsg,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseContentUpdateMsg {
    mime_type: String,
    content_size: usize,
    discard_response_body: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTimingsUpdateMsg {
    total_time: u64,
}

#[derive(Serialize)]
struct HeaderMsg {
    name: String,
    value: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeadersReply {
    from: String,
    headers: Vec<HeaderMsg>,
    headers_size: usize,
}

#[derive(Serialize)]
struct CookiesReply {
    from: String,
    cookies: Vec<HeaderMsg>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BodyMsg {
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    text: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostDataReply {
    from: String,
    post_data: Option<BodyMsg>,
    post_data_discarded: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseContentReply {
    from: String,
    content: Option<BodyMsg>,
    content_discarded: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTimingsReply {
    from: String,
    timings: EventTimings,
    total_time: u64,
}

/// What has been reported about one request so far.
#[derive(Default)]
struct NetworkEventState {
    request_headers: Vec<HttpHeader>,
    request_cookies: Vec<HttpHeader>,
    post_data: Option<Vec<u8>>,
    response_start: Option<HttpResponseStart>,
    response_headers: Vec<HttpHeader>,
    response_cookies: Vec<HttpHeader>,
    response_content: Option<HttpResponseContent>,
    timings: Option<EventTimings>,
}

/// One HTTP request and its response, as reported by the network monitor.
pub(crate) struct NetworkEventActor {
    name: String,
    console: String,
    request: HttpRequest,
    save_bodies: bool,
    state: RefCell<NetworkEventState>,
}

impl Actor for NetworkEventActor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn schema(&self) -> Option<&'static ActorSchema> {
        Some(&NETWORK_EVENT_SCHEMA)
    }

    fn handle_message(
        &self,
        request: ClientRequest,
        registry: &ActorRegistry,
        msg_type: &str,
        _msg: &Map<String, Value>,
    ) -> Result<(), ActorError> {
        let state = self.state.borrow();
        match msg_type {
            "release" => request.reply_final(&EmptyReplyMsg { from: self.name() })?,

            "getRequestHeaders" => {
                let msg = HeadersReply {
                    from: self.name(),
                    headers: self.header_msgs(registry, &state.request_headers),
                    headers_size: self.request.headers_size,
                };
                request.reply_final(&msg)?
            },

            "getRequestCookies" => {
                let msg = CookiesReply {
                    from: self.name(),
                    cookies: self.header_msgs(registry, &state.request_cookies),
                };
                request.reply_final(&msg)?
            },

            "getRequestPostData" => {
                let msg = PostDataReply {
                    from: self.name(),
                    post_data: state
                        .post_data
                        .as_deref()
                        .map(|body| self.body_msg(registry, None, body)),
                    post_data_discarded: !self.save_bodies,
                };
                request.reply_final(&msg)?
            },

            "getResponseHeaders" => {
                let msg = HeadersReply {
                    from: self.name(),
                    headers: self.header_msgs(registry, &state.response_headers),
                    headers_size: state
                        .response_start
                        .as_ref()
                        .map_or(0, |start| start.headers_size),
                };
                request.reply_final(&msg)?
            },

            "getResponseCookies" => {
                let msg = CookiesReply {
                    from: self.name(),
                    cookies: self.header_msgs(registry, &state.response_cookies),
                };
                request.reply_final(&msg)?
            },

            "getResponseContent" => {
                let content = state.response_content.as_ref().map(|content| {
                    let body = content.body.as_deref().unwrap_or_default();
                    self.body_msg(registry, Some(content.mime_type.clone()), body)
                });
                let msg = ResponseContentReply {
                    from: self.name(),
                    content,
                    content_discarded: !self.save_bodies,
                };
                request.reply_final(&msg)?
            },

            "getEventTimings" => {
                let timings = state.timings.clone().unwrap_or_default();
                let msg = EventTimingsReply {
                    from: self.name(),
                    total_time: timings.total(),
                    timings,
                };
                request.reply_final(&msg)?
            },

            _ => return Err(ActorError::UnrecognizedPacketType),
        };
        Ok(())
    }

    fn destroy(&self, registry: &ActorRegistry) {
        if let Some(console) = registry.find::<ConsoleActor>(&self.console) {
            console.forget_network_event(&self.name);
        }
    }
}

impl NetworkEventActor {
    pub fn register(
        registry: &ActorRegistry,
        console: &str,
        request: HttpRequest,
        save_bodies: bool,
    ) -> String {
        let name = registry.new_name("netEvent");
        registry.manage(
            console,
            NetworkEventActor {
                name: name.clone(),
                console: console.to_owned(),
                request,
                save_bodies,
                state: RefCell::default(),
            },
        );
        name
    }

    /// Record a later stage of the request and tell the client about it.
    pub fn on_event(&self, registry: &ActorRegistry, event: NetworkEvent) {
        let update = |update_type: &'static str| NetworkEventUpdateMsg {
            from: self.name(),
            type_: "networkEventUpdate",
            update_type,
        };
        let sender = registry.sender();
        let mut state = self.state.borrow_mut();
        let result = match event {
            NetworkEvent::HttpRequest(_) => {
                warn!("{} already has its request", self.name);
                return;
            },
            NetworkEvent::RequestHeaders(headers) => {
                let extra = HeadersUpdateMsg {
                    headers: headers.len(),
                    headers_size: self.request.headers_size,
                };
                state.request_headers = headers;
                sender.send_merged(&update("requestHeaders"), &extra)
            },
            NetworkEvent::RequestCookies(cookies) => {
                let extra = CookiesUpdateMsg {
                    cookies: cookies.len(),
                };
                state.request_cookies = cookies;
                sender.send_merged(&update("requestCookies"), &extra)
            },
            NetworkEvent::RequestPostData(body) => {
                let extra = PostDataUpdateMsg {
                    data_size: body.len(),
                    discard_request_body: !self.save_bodies,
                };
                if self.save_bodies {
                    state.post_data = Some(body);
                }
                sender.send_merged(&update("requestPostData"), &extra)
            },
            NetworkEvent::ResponseStart(start) => {
                let extra = ResponseStartUpdateMsg {
                    response: ResponseStartMsg {
                        http_version: start.http_version.clone(),
                        status: start.status.to_string(),
                        status_text: start.status_text.clone(),
                        headers_size: start.headers_size,
                        discard_response_body: !self.save_bodies,
                    },
                };
                state.response_start = Some(start);
                sender.send_merged(&update("responseStart"), &extra)
            },
            NetworkEvent::ResponseHeaders(headers) => {
                let extra = HeadersUpdateMsg {
                    headers: headers.len(),
                    headers_size: state
                        .response_start
                        .as_ref()
                        .map_or(0, |start| start.headers_size),
                };
                state.response_headers = headers;
                sender.send_merged(&update("responseHeaders"), &extra)
            },
            NetworkEvent::ResponseCookies(cookies) => {
                let extra = CookiesUpdateMsg {
                    cookies: cookies.len(),
                };
                state.response_cookies = cookies;
                sender.send_merged(&update("responseCookies"), &extra)
            },
            NetworkEvent::ResponseContent(mut content) => {
                let extra = ResponseContentUpdateMsg {
                    mime_type: content.mime_type.clone(),
                    content_size: content.body.as_ref().map_or(0, Vec::len),
                    discard_response_body: !self.save_bodies,
                };
                if !self.save_bodies {
                    content.body = None;
                }
                state.response_content = Some(content);
                sender.send_merged(&update("responseContent"), &extra)
            },
            NetworkEvent::EventTimings(timings) => {
                let extra = EventTimingsUpdateMsg {
                    total_time: timings.total(),
                };
                state.timings = Some(timings);
                sender.send_merged(&update("eventTimings"), &extra)
            },
        };
        if let Err(error) = result {
            warn!("Failed to send network event update: {error:?}");
        }
    }

    fn header_msgs(&self, registry: &ActorRegistry, headers: &[HttpHeader]) -> Vec<HeaderMsg> {
        headers
            .iter()
            .map(|header| HeaderMsg {
                name: header.name.clone(),
                value: LongStringActor::string_or_grip(registry, &self.name, &header.value),
            })
            .collect()
    }

    fn body_msg(&self, registry: &ActorRegistry, mime_type: Option<String>, body: &[u8]) -> BodyMsg {
        match std::str::from_utf8(body) {
            Ok(text) => BodyMsg {
                mime_type,
                text: LongStringActor::string_or_grip(registry, &self.name, text),
                encoding: None,
            },
            Err(_) => BodyMsg {
                mime_type,
                text: Value::from(STANDARD.encode(body)),
                encoding: Some("base64"),
            },
        }
    }
}

fn started_date_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ActorEncode<NetworkEventGrip> for NetworkEventActor {
    fn encode(&self, _: &ActorRegistry) -> NetworkEventGrip {
        NetworkEventGrip {
            actor: self.name(),
            started_date_time: started_date_time(self.request.started_date_time),
            url: self.request.url.clone(),
            method: self.request.method.clone(),
            is_xhr: self.request.is_xhr,
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, UNIX_EPOCH};

    use super::started_date_time;

    #[test]
    fn start_times_are_rfc3339_in_utc() {
        let time = UNIX_EPOCH + Duration::from_millis(1_400_000_000_123);
        assert_eq!(started_date_time(time), "2014-05-13T16:53:20.123Z");
    }
}
