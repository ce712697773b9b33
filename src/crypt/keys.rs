//! Server key blocks
//!
//! The server sends `(key type, plugin list)` pairs, each optionally followed
//! by plugin specific items of the form `plugin NUL data`.

use super::EncryptionIdentifier;
use crate::params::clumplet::Clumplets;
use crate::protocol::constants::key_tag;
use crate::{Error, Result};
use std::collections::HashMap;

/// One key type the server can use, and the plugins accepting it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownServerKey {
    key_type: String,
    plugins: Vec<String>,
    specific_data: HashMap<String, Vec<u8>>,
}

/// A plugin the server offers with its specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpecificData {
    pub identifier: EncryptionIdentifier,
    pub specific_data: Option<Vec<u8>>,
}

fn ascii(value: &[u8]) -> String {
    value.iter().map(|&b| char::from(b)).collect()
}

impl KnownServerKey {
    pub fn new(key_type: impl Into<String>, plugins: &str) -> Self {
        Self {
            key_type: key_type.into(),
            plugins: plugins.split_whitespace().map(str::to_string).collect(),
            specific_data: HashMap::new(),
        }
    }

    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    /// Plugins in server preference order
    pub fn plugin_specific_data(&self) -> impl Iterator<Item = PluginSpecificData> + '_ {
        self.plugins.iter().map(move |plugin| PluginSpecificData {
            identifier: EncryptionIdentifier::new(self.key_type.clone(), plugin.clone()),
            specific_data: self.specific_data.get(plugin).cloned(),
        })
    }

    /// Parse a server key block
    ///
    /// Known-plugin items belong to authentication and are skipped.
    pub fn parse_keys(data: &[u8]) -> Result<Vec<KnownServerKey>> {
        let mut keys: Vec<KnownServerKey> = Vec::new();
        let mut items = Clumplets::untagged(data);
        while let Some(item) = items.next() {
            let (tag, value) = item?;
            match tag {
                key_tag::KEY_TYPE => {
                    let Some(next) = items.next() else {
                        break;
                    };
                    let (next_tag, plugins) = next?;
                    if next_tag != key_tag::KEY_PLUGINS {
                        return Err(Error::Protocol(format!(
                            "expected key plugins after key type, got tag {}",
                            next_tag
                        )));
                    }
                    keys.push(KnownServerKey::new(ascii(value), &ascii(plugins)));
                }
                key_tag::PLUGIN_SPECIFIC => {
                    let Some(sep) = value.iter().position(|&b| b == 0).filter(|&i| i > 0)
                    else {
                        continue;
                    };
                    match keys.last_mut() {
                        Some(key) => {
                            key.specific_data
                                .insert(ascii(&value[..sep]), value[sep + 1..].to_vec());
                        }
                        None => tracing::debug!("plugin specific data without key type"),
                    }
                }
                _ => {}
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
        out.push(tag);
        out.push(value.len() as u8);
        out.extend_from_slice(value);
    }

    #[test]
    fn test_parse_keys_with_specific_data() {
        let mut data = Vec::new();
        item(&mut data, key_tag::KNOWN_PLUGINS, b"Srp256, Srp");
        item(&mut data, key_tag::KEY_TYPE, b"Symmetric");
        item(&mut data, key_tag::KEY_PLUGINS, b"ChaCha Arc4");
        item(&mut data, key_tag::PLUGIN_SPECIFIC, b"ChaCha\0123456789012");

        let keys = KnownServerKey::parse_keys(&data).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_type(), "Symmetric");
        assert_eq!(keys[0].plugins(), &["ChaCha".to_string(), "Arc4".to_string()]);

        let offered: Vec<_> = keys[0].plugin_specific_data().collect();
        assert_eq!(offered[0].identifier, EncryptionIdentifier::symmetric("ChaCha"));
        assert_eq!(offered[0].specific_data.as_deref(), Some(&b"123456789012"[..]));
        assert_eq!(offered[1].identifier.plugin_name(), "Arc4");
        assert_eq!(offered[1].specific_data, None);
    }

    #[test]
    fn test_key_type_without_plugins() {
        let mut data = Vec::new();
        item(&mut data, key_tag::KEY_TYPE, b"Symmetric");
        item(&mut data, key_tag::PLUGIN_SPECIFIC, b"Arc4\0x");
        assert!(KnownServerKey::parse_keys(&data).is_err());
    }

    #[test]
    fn test_empty_block() {
        assert!(KnownServerKey::parse_keys(&[]).unwrap().is_empty());
    }
}
