//! Capability announcement sent in reply to `ENQ`.
//!
//! The reply is a single line: a fixed prefix followed by a JSON object
//! describing the controller, e.g.
//! `POTERION IOT:{"name": "Raspi W2812 Server", "features": ["light-strip"], "properties": ["24x2+2"]}`.
//!
//! Peers may compare the line as text, so the JSON keeps a space after
//! every `:` and `,`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, Serializer};
use std::io;

/// Prefix of the announcement line.
pub const ANNOUNCE_PREFIX: &str = "POTERION IOT:";

/// Single-line JSON with `": "` and `", "` separators.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// What a controller reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Device name.
    pub name: String,
    /// Supported features (e.g. "light-strip", "bluetooth").
    #[serde(default)]
    pub features: Vec<String>,
    /// Free-form properties, such as the strip layout.
    #[serde(default)]
    pub properties: Vec<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            name: "Raspi W2812 Server".to_string(),
            features: vec![
                "light-strip".to_string(),
                "usb".to_string(),
                "bluetooth".to_string(),
            ],
            properties: vec!["24x2+2".to_string()],
        }
    }
}

impl Capabilities {
    /// Create capabilities with a name and no features.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Set the feature list.
    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    /// Set the property list.
    #[must_use]
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    /// Render the announcement line (without terminator).
    pub fn announcement(&self) -> Result<String> {
        let mut json = Vec::new();
        let mut ser = Serializer::with_formatter(&mut json, SpacedFormatter);
        self.serialize(&mut ser)
            .map_err(|e| Error::Protocol(format!("cannot encode announcement: {e}")))?;
        let json = String::from_utf8(json)
            .map_err(|e| Error::Protocol(format!("cannot encode announcement: {e}")))?;
        Ok(format!("{ANNOUNCE_PREFIX}{json}"))
    }

    /// Parse an announcement line received from a peer.
    pub fn parse_announcement(line: &str) -> Result<Self> {
        let json = line
            .trim()
            .strip_prefix(ANNOUNCE_PREFIX)
            .ok_or_else(|| Error::Protocol(format!("not an announcement: {line:?}")))?;
        serde_json::from_str(json.trim())
            .map_err(|e| Error::Protocol(format!("malformed announcement: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_announcement() {
        let line = Capabilities::default()
            .announcement()
            .unwrap();
        assert_eq!(
            line,
            r#"POTERION IOT:{"name": "Raspi W2812 Server", "features": ["light-strip", "usb", "bluetooth"], "properties": ["24x2+2"]}"#
        );
    }

    #[test]
    fn test_announcement_empty_lists() {
        let line = Capabilities::new("Bare")
            .announcement()
            .unwrap();
        assert_eq!(
            line,
            r#"POTERION IOT:{"name": "Bare", "features": [], "properties": []}"#
        );
    }

    #[test]
    fn test_announcement_round_trip() {
        let caps = Capabilities::new("Desk strip")
            .with_features(["light-strip"])
            .with_properties(["60"]);
        let parsed = Capabilities::parse_announcement(&caps.announcement().unwrap()).unwrap();
        assert_eq!(parsed, caps);
    }

    #[test]
    fn test_parse_accepts_spaced_json() {
        let line = r#"POTERION IOT:{"name": "Raspi W2812 Server", "features": ["usb"], "properties": []}"#;
        let caps = Capabilities::parse_announcement(line).unwrap();
        assert_eq!(caps.name, "Raspi W2812 Server");
        assert_eq!(caps.features, vec!["usb"]);
        assert!(caps.properties.is_empty());
    }

    #[test]
    fn test_parse_rejects_other_lines() {
        assert!(Capabilities::parse_announcement("ACK:1").is_err());
        assert!(Capabilities::parse_announcement("POTERION IOT:{not json").is_err());
    }
}
