//! Environment variables exposed to client code.

use std::collections::BTreeMap;

use serde::Serialize;

/// Only variables with this prefix leak into the client bundle.
pub const CLIENT_ENV_PREFIX: &str = "REACT_APP_";

/// Variables injected into the HTML document for client code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientEnvironment {
    raw: BTreeMap<String, String>,
}

impl ClientEnvironment {
    /// Build from an explicit variable list.
    ///
    /// `public_url` is the public URL without its trailing separator.
    pub fn from_vars<I, K, V>(vars: I, public_url: &str) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw = BTreeMap::new();
        let mut node_env = None;

        for (key, value) in vars {
            let key = key.into();
            if key == "NODE_ENV" {
                node_env = Some(value.into());
            } else if key.starts_with(CLIENT_ENV_PREFIX) {
                raw.insert(key, value.into());
            }
        }

        raw.insert(
            "NODE_ENV".to_string(),
            node_env.unwrap_or_else(|| "production".to_string()),
        );
        raw.insert("PUBLIC_URL".to_string(), public_url.to_string());

        Self { raw }
    }

    /// Build from the current process environment.
    pub fn from_process_env(public_url: &str) -> Self {
        Self::from_vars(std::env::vars(), public_url)
    }

    pub fn raw(&self) -> &BTreeMap<String, String> {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }
}
