//! Push notification message types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{DeviceToken, PushError, Result};

/// Spellings of the background-update flag accepted from loose input.
const CONTENT_AVAILABLE_KEYS: [&str; 3] = ["content-available", "contentAvailable", "content_available"];

/// Keys with a meaning of their own; never accepted as custom payload keys.
const RESERVED_KEYS: [&str; 5] = ["aps", "alert", "badge", "sound", "category"];

/// Alert shown on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Alert {
    /// Plain alert text.
    Text(String),
    /// Structured localization dictionary (`loc-key`, `loc-args`, ...), passed through.
    Localized(Map<String, Value>),
}

impl Alert {
    /// Mutable access to the text that truncation shortens.
    ///
    /// For a localized alert this is the first entry of `loc-args`.
    pub(crate) fn truncatable_text_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Localized(dict) => match dict.get_mut("loc-args") {
                Some(Value::Array(args)) => match args.first_mut() {
                    Some(Value::String(first)) => Some(first),
                    _ => None,
                },
                _ => None,
            },
        }
    }
}

impl From<&str> for Alert {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Alert {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Sound to play on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sound {
    /// The application's default sound.
    Default,
    /// A named sound file from the application bundle.
    Named(String),
}

impl Sound {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Default => "default",
            Self::Named(name) => name,
        }
    }
}

impl Serialize for Sound {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Options of a single notification.
///
/// At least one of `alert`, `badge` or `sound` must be set for the
/// notification to be valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationOptions {
    /// Alert text or localization dictionary.
    pub alert: Option<Alert>,
    /// Badge count.
    pub badge: Option<u32>,
    /// Sound.
    pub sound: Option<Sound>,
    /// Notification category.
    pub category: Option<String>,
    /// Background update flag.
    pub content_available: bool,
    /// Custom keys merged into the payload root, next to `aps`.
    pub custom: BTreeMap<String, Value>,
}

impl NotificationOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shortcut for an alert-only notification.
    pub fn alert_only(alert: impl Into<Alert>) -> Self {
        Self::new().alert(alert)
    }

    /// Set the alert.
    pub fn alert(mut self, alert: impl Into<Alert>) -> Self {
        self.alert = Some(alert.into());
        self
    }

    /// Set the badge count.
    pub fn badge(mut self, count: u32) -> Self {
        self.badge = Some(count);
        self
    }

    /// Set a named sound.
    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(Sound::Named(sound.into()));
        self
    }

    /// Play the default sound.
    pub fn default_sound(mut self) -> Self {
        self.sound = Some(Sound::Default);
        self
    }

    /// Set the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Mark as a background update.
    pub fn content_available(mut self) -> Self {
        self.content_available = true;
        self
    }

    /// Add a custom root-level key.
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Whether alert, badge or sound is present.
    pub fn is_valid(&self) -> bool {
        self.alert.is_some() || self.badge.is_some() || self.sound.is_some()
    }

    /// Parse loosely-typed options, as they arrive from a job queue.
    ///
    /// A bare string is taken as the alert. Badges may be numeric strings,
    /// `sound: true` selects the default sound and `sound: false` none.
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::String(text) => return Ok(Self::alert_only(text)),
            Value::Object(map) => map,
            other => {
                return Err(PushError::InvalidNotification(format!(
                    "options must be a string or an object, got {other}"
                )));
            }
        };

        let mut options = Self::new();
        for (key, value) in map {
            if CONTENT_AVAILABLE_KEYS.contains(&key.as_str()) {
                options.content_available = is_truthy(&value);
                continue;
            }
            match key.as_str() {
                "alert" => options.alert = parse_alert(value)?,
                "badge" => options.badge = parse_badge(value)?,
                "sound" => options.sound = parse_sound(value)?,
                "category" => options.category = parse_category(value)?,
                _ => {
                    options.custom.insert(key, value);
                }
            }
        }
        Ok(options)
    }

    /// Loosely-typed representation accepted by [`Self::from_value`].
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(alert) = &self.alert {
            let alert = match alert {
                Alert::Text(text) => Value::String(text.clone()),
                Alert::Localized(dict) => Value::Object(dict.clone()),
            };
            map.insert("alert".into(), alert);
        }
        if let Some(badge) = self.badge {
            map.insert("badge".into(), badge.into());
        }
        match &self.sound {
            Some(Sound::Default) => {
                map.insert("sound".into(), Value::Bool(true));
            }
            Some(Sound::Named(name)) => {
                map.insert("sound".into(), name.clone().into());
            }
            None => {}
        }
        if let Some(category) = &self.category {
            map.insert("category".into(), category.clone().into());
        }
        if self.content_available {
            map.insert("content-available".into(), Value::Bool(true));
        }
        for (key, value) in &self.custom {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

fn parse_alert(value: Value) -> Result<Option<Alert>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(Alert::Text(text))),
        Value::Object(dict) => Ok(Some(Alert::Localized(dict))),
        Value::Number(n) => Ok(Some(Alert::Text(n.to_string()))),
        Value::Bool(b) => Ok(Some(Alert::Text(b.to_string()))),
        Value::Array(_) => Err(PushError::InvalidNotification(
            "alert must be a string or a dictionary".into(),
        )),
    }
}

fn parse_badge(value: Value) -> Result<Option<u32>> {
    let invalid = || PushError::InvalidNotification(format!("badge must be a non-negative integer, got {value}"));
    match &value {
        Value::Null => Ok(None),
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(v), _) => u32::try_from(v).map(Some).map_err(|_| invalid()),
            (None, Some(f)) if f >= 0.0 && f <= u32::MAX as f64 => Ok(Some(f as u32)),
            _ => Err(invalid()),
        },
        Value::String(s) => s.trim().parse::<u32>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_sound(value: Value) -> Result<Option<Sound>> {
    match value {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::Bool(true) => Ok(Some(Sound::Default)),
        Value::String(name) => Ok(Some(Sound::Named(name))),
        Value::Number(n) => Ok(Some(Sound::Named(n.to_string()))),
        other => Err(PushError::InvalidNotification(format!(
            "sound must be a string or a boolean, got {other}"
        ))),
    }
}

fn parse_category(value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(category) => Ok(Some(category)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(PushError::InvalidNotification(format!(
            "category must be a string, got {other}"
        ))),
    }
}

fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key) || CONTENT_AVAILABLE_KEYS.contains(&key)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// A notification addressed to one device.
///
/// Construction validates the token and the options; once built the
/// notification is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    token: DeviceToken,
    options: NotificationOptions,
}

impl Notification {
    /// Create a new notification.
    pub fn new(token: &str, options: NotificationOptions) -> Result<Self> {
        let token = DeviceToken::parse(token)?;
        Self::for_device(token, options)
    }

    /// Create a notification for an already parsed token.
    pub fn for_device(token: DeviceToken, options: NotificationOptions) -> Result<Self> {
        if !options.is_valid() {
            return Err(PushError::InvalidNotification(
                "at least one of alert, badge or sound is required".into(),
            ));
        }
        if let Some(key) = options.custom.keys().find(|key| is_reserved_key(key)) {
            return Err(PushError::InvalidNotification(format!(
                "custom key `{key}` is reserved"
            )));
        }
        Ok(Self { token, options })
    }

    /// Device token.
    pub fn token(&self) -> &DeviceToken {
        &self.token
    }

    /// Notification options.
    pub fn options(&self) -> &NotificationOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOKEN: &str = "2589b1aa363d23d8d7f166951a9e3ff41fb0130a637d6997a2080d881b2a19b5";

    #[test]
    fn test_requires_alert_badge_or_sound() {
        let err = Notification::new(TOKEN, NotificationOptions::new().category("x")).unwrap_err();
        assert!(matches!(err, PushError::InvalidNotification(_)));

        assert!(Notification::new(TOKEN, NotificationOptions::new().badge(0)).is_ok());
        assert!(Notification::new(TOKEN, NotificationOptions::new().default_sound()).is_ok());
    }

    #[test]
    fn test_aps_custom_key_is_reserved() {
        let options = NotificationOptions::alert_only("hi").custom("aps", json!({}));
        assert!(matches!(
            Notification::new(TOKEN, options),
            Err(PushError::InvalidNotification(_))
        ));
    }

    #[test]
    fn test_custom_keys_cannot_shadow_options() {
        for key in [
            "alert",
            "badge",
            "sound",
            "category",
            "content-available",
            "contentAvailable",
            "content_available",
        ] {
            let options = NotificationOptions::new().badge(1).custom(key, 5);
            match Notification::new(TOKEN, options) {
                Err(PushError::InvalidNotification(msg)) => assert!(msg.contains(key)),
                other => panic!("`{key}` was accepted as a custom key: {other:?}"),
            }
        }

        let options = NotificationOptions::new().badge(1).custom("thread", 5);
        assert!(Notification::new(TOKEN, options).is_ok());
    }

    #[test]
    fn test_scalar_category_and_sound_are_stringified() {
        let options = NotificationOptions::from_value(json!({
            "alert": "hi",
            "category": 42,
            "sound": 7
        }))
        .unwrap();
        assert_eq!(options.category.as_deref(), Some("42"));
        assert_eq!(options.sound, Some(Sound::Named("7".into())));

        let options = NotificationOptions::from_value(json!({"alert": "hi", "category": true})).unwrap();
        assert_eq!(options.category.as_deref(), Some("true"));

        assert!(NotificationOptions::from_value(json!({"alert": "hi", "category": ["a"]})).is_err());
        assert!(NotificationOptions::from_value(json!({"alert": "hi", "sound": {"name": "x"}})).is_err());
    }

    #[test]
    fn test_string_shortcut() {
        let options = NotificationOptions::from_value(json!("hello")).unwrap();
        assert_eq!(options.alert, Some(Alert::Text("hello".into())));
    }

    #[test]
    fn test_loose_parsing() {
        let options = NotificationOptions::from_value(json!({
            "alert": "hi",
            "badge": "7",
            "sound": true,
            "contentAvailable": 1,
            "category": "INVITE",
            "custom": {"code": 23}
        }))
        .unwrap();

        assert_eq!(options.badge, Some(7));
        assert_eq!(options.sound, Some(Sound::Default));
        assert!(options.content_available);
        assert_eq!(options.category.as_deref(), Some("INVITE"));
        assert_eq!(options.custom.get("custom"), Some(&json!({"code": 23})));
    }

    #[test]
    fn test_sound_false_is_absent() {
        let options = NotificationOptions::from_value(json!({"sound": false})).unwrap();
        assert!(options.sound.is_none());
        assert!(!options.is_valid());
    }

    #[test]
    fn test_negative_badge_is_rejected() {
        assert!(NotificationOptions::from_value(json!({"badge": -1})).is_err());
        assert!(NotificationOptions::from_value(json!({"badge": "many"})).is_err());
    }

    #[test]
    fn test_value_round_trip() {
        let options = NotificationOptions::alert_only("hi")
            .badge(2)
            .sound("chime.caf")
            .content_available()
            .custom("thread", "abc");
        let parsed = NotificationOptions::from_value(options.to_value()).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn test_localized_truncatable_text() {
        let mut alert = Alert::Localized(
            json!({"loc-key": "GREETING", "loc-args": ["Ann", "Bob"]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(alert.truncatable_text_mut().map(|s| s.as_str()), Some("Ann"));

        let mut no_args = Alert::Localized(Map::new());
        assert!(no_args.truncatable_text_mut().is_none());
    }
}
