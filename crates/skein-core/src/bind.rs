//! Explicit form binding
//!
//! Types opt in by implementing [`FromForm`] and pulling each field out of a
//! [`FormValues`] by name. Lenient getters mirror classic form binding: a
//! missing or unparsable number becomes its default rather than an error.

use crate::{Error, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// Decoded form or query values, first occurrence per name
#[derive(Debug, Default, Clone)]
pub struct FormValues {
    values: HashMap<String, String>,
}

impl FormValues {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Raw value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    /// Value or empty string
    pub fn string(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    /// Parsed value, falling back to `T::default()` when missing or malformed
    pub fn lenient<T: FromStr + Default>(&self, name: &str) -> T {
        self.get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    /// Parsed value; missing is `None`, malformed is an error
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| Error::Form(format!("invalid value for '{}': {}", name, raw))),
        }
    }

    /// Parsed value that must be present
    pub fn require<T: FromStr>(&self, name: &str) -> Result<T> {
        self.parse(name)?
            .ok_or_else(|| Error::Form(format!("missing field '{}'", name)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-type decoding from form values
pub trait FromForm: Sized {
    fn from_form(form: &FormValues) -> Result<Self>;
}
