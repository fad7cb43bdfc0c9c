//! Manager action builder
//!
//! Every field passes through [`Action::encode`] before it reaches the
//! wire, so user-supplied text can never close a block early or smuggle
//! extra `Key: Value` lines into a request.

use std::fmt;

use crate::{AmiError, Result};

/// One manager action request
#[derive(Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    fields: Vec<(String, String)>,
}

impl Action {
    /// Create an action with no fields
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Append a `key: value` field
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    /// `Login` with event delivery switched off for this session
    pub fn login(username: &str, secret: &str) -> Self {
        Self::new("Login")
            .field("Username", username)
            .field("Secret", secret)
            .field("Events", "off")
    }

    /// `DBGet` for a single AstDB entry
    pub fn db_get(family: &str, key: &str) -> Self {
        Self::new("DBGet").field("Family", family).field("Key", key)
    }

    /// `Logoff`
    pub fn logoff() -> Self {
        Self::new("Logoff")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First value for `key`, compared case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to CRLF lines closed by a blank line.
    ///
    /// Fails without producing any output if a key or value would break
    /// the framing.
    pub fn encode(&self) -> Result<String> {
        validate_value("Action", &self.name)?;
        if self.name.is_empty() {
            return Err(AmiError::InvalidField("Action name is empty".to_string()));
        }

        let mut wire = String::with_capacity(64 + self.fields.len() * 32);
        wire.push_str("Action: ");
        wire.push_str(&self.name);
        wire.push_str("\r\n");

        for (key, value) in &self.fields {
            validate_key(key)?;
            validate_value(key, value)?;
            wire.push_str(key);
            wire.push_str(": ");
            wire.push_str(value);
            wire.push_str("\r\n");
        }

        wire.push_str("\r\n");
        Ok(wire)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("Secret") {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();

        f.debug_struct("Action")
            .field("name", &self.name)
            .field("fields", &fields)
            .finish()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AmiError::InvalidField("empty field name".to_string()));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AmiError::InvalidField(format!(
            "field name {:?} contains illegal characters",
            key
        )));
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n', '\0']) {
        return Err(AmiError::InvalidField(format!(
            "value for {} contains a line break or NUL",
            key
        )));
    }
    Ok(())
}
