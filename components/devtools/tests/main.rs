/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;
use std::time::Duration;

use devtools::front::{DevtoolsClient, Front, Packet};
use devtools::{DevtoolsPrefs, DevtoolsServer, start_local_server};
use devtools_traits::dom::NodeId;
use devtools_traits::{
    DevtoolsControlMsg, DevtoolsPageInfo, ScriptToDevtoolsControlMsg, TabHost, TabId,
};
use serde_json::{Map, Value};

use crate::host::{MockDocument, MockEngine};

mod host;
mod inspector;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A page with one server and one connected client.
pub struct TestPage {
    pub document: Arc<MockDocument>,
    pub engine: Arc<MockEngine>,
    pub server: DevtoolsServer,
    pub client: DevtoolsClient,
    /// The tab form from `listTabs`.
    pub tab: Value,
}

impl TestPage {
    pub fn new() -> TestPage {
        TestPage::with_prefs(DevtoolsPrefs::default())
    }

    pub fn with_prefs(prefs: DevtoolsPrefs) -> TestPage {
        let _ = env_logger::builder().is_test(true).try_init();

        let document = MockDocument::new();
        build_page(&document);
        let engine = MockEngine::new();

        let server = start_local_server(prefs).unwrap();
        let host = TabHost {
            document: document.clone(),
            engine: engine.clone(),
        };
        let info = DevtoolsPageInfo {
            title: "Test page".to_owned(),
            url: "http://test/".to_owned(),
        };
        server
            .sender()
            .send(DevtoolsControlMsg::FromScript(
                ScriptToDevtoolsControlMsg::NewGlobal(TabId(0), host, info),
            ))
            .unwrap();

        let transport = server.connect_local().unwrap();
        let client = DevtoolsClient::connect(Box::new(transport)).unwrap();
        let root = Front::new(&client, "root", "root").unwrap();
        let reply = root.call("listTabs", Map::new()).unwrap();
        let tab = reply["tabs"][0].clone();

        TestPage {
            document,
            engine,
            server,
            client,
            tab,
        }
    }

    pub fn tab_actor(&self, field: &str) -> String {
        self.tab[field].as_str().unwrap().to_owned()
    }

    pub fn send(&self, msg: DevtoolsControlMsg) {
        self.server.sender().send(msg).unwrap();
    }

    pub fn node(&self, selector: &str) -> NodeId {
        self.document.node(selector)
    }

    pub fn close(self) {
        self.client.close();
        self.server.shutdown();
    }
}

/// ```text
/// #document
///   HTML
///     HEAD
///     BODY
///       DIV#a.item
///       DIV#b.item
///         SPAN#c
///           "hello"
///       DIV#d.item
///       UL#list
///         LI#li0 .. LI#li9
/// ```
fn build_page(document: &MockDocument) {
    let html = document.element(document.root(), "html", &[]);
    document.element(html, "head", &[]);
    let body = document.element(html, "body", &[]);
    document.element(body, "div", &[("id", "a"), ("class", "item")]);
    let b = document.element(body, "div", &[("id", "b"), ("class", "item")]);
    let c = document.element(b, "span", &[("id", "c")]);
    document.text(c, "hello");
    document.element(body, "div", &[("id", "d"), ("class", "item")]);
    let list = document.element(body, "ul", &[("id", "list")]);
    for index in 0..10 {
        let id = format!("li{index}");
        document.element(list, "li", &[("id", id.as_str())]);
    }
}

pub fn error_name(error: &devtools::front::ClientError) -> &str {
    match error {
        devtools::front::ClientError::Protocol { error, .. } => error,
        _ => panic!("not a protocol error: {error:?}"),
    }
}

pub fn str_field<'a>(packet: &'a Packet, field: &str) -> &'a str {
    packet[field].as_str().unwrap()
}
