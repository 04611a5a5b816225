/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Configuration of the devtools server.

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DevtoolsPrefs {
    /// The address the TCP listener binds to.
    pub bind_address: String,

    /// The port the TCP listener binds to. Zero picks any free port.
    pub port: u16,

    /// Text node values and character data mutations longer than this are
    /// truncated and flagged as incomplete.
    pub value_summary_length: usize,

    /// Strings at least this long are sent as long string grips.
    pub long_string_length: usize,

    /// How much of a long string is sent along with its grip.
    pub long_string_initial_length: usize,

    /// Keep console messages and page errors per tab so that clients attaching
    /// later can ask for them.
    pub cache_console_messages: bool,

    /// The most messages kept per tab. Older ones are dropped first.
    pub console_cache_limit: usize,
}

impl Default for DevtoolsPrefs {
    fn default() -> Self {
        DevtoolsPrefs {
            bind_address: "127.0.0.1".to_owned(),
            port: 6080,
            value_summary_length: 50,
            long_string_length: 10000,
            long_string_initial_length: 1000,
            cache_console_messages: true,
            console_cache_limit: 1000,
        }
    }
}

impl DevtoolsPrefs {
    /// Read preferences from a JSON document. Missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<DevtoolsPrefs, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read preferences from a file, falling back to the defaults when the file
    /// cannot be read or parsed.
    pub fn from_file(path: &Path) -> DevtoolsPrefs {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                warn!("Could not read devtools preferences from {path:?}: {error}");
                return DevtoolsPrefs::default();
            },
        };
        DevtoolsPrefs::from_json(&text).unwrap_or_else(|error| {
            warn!("Ignoring malformed devtools preferences in {path:?}: {error}");
            DevtoolsPrefs::default()
        })
    }
}

#[cfg(test)]
mod test {
    use super::DevtoolsPrefs;

    #[test]
    fn missing_keys_keep_defaults() {
        let prefs = DevtoolsPrefs::from_json(r#"{"port": 0, "value_summary_length": 10}"#).unwrap();
        assert_eq!(prefs.port, 0);
        assert_eq!(prefs.value_summary_length, 10);
        assert_eq!(prefs.long_string_length, 10000);
        assert_eq!(prefs.long_string_initial_length, 1000);
        assert!(prefs.cache_console_messages);
        assert_eq!(prefs.console_cache_limit, 1000);
    }
}
