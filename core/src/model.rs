// Classbook
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Types to describe client-supplied records and the problems found in them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Key under which errors that do not belong to a single field are reported.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// A single field of a client-supplied JSON record.
///
/// Deserializing never fails because of the field's contents: a value of the wrong JSON type is
/// kept as `Invalid` so that validation can report it against the field's name.  An explicit
/// `null` is the same as leaving the field out.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Input<T> {
    /// The field was not supplied.
    #[default]
    Missing,

    /// The field was supplied with a value of the expected type.
    Valid(T),

    /// The field was supplied with a value that cannot be converted to `T`.
    Invalid(serde_json::Value),
}

impl<T> Input<T> {
    /// Returns true if the field was not supplied.
    pub fn is_missing(&self) -> bool {
        matches!(self, Input::Missing)
    }

    /// Returns the supplied value, if any, either converted to `T` or as the raw JSON that could
    /// not be converted.
    pub fn supplied(self) -> Option<Result<T, serde_json::Value>> {
        match self {
            Input::Missing => None,
            Input::Valid(value) => Some(Ok(value)),
            Input::Invalid(raw) => Some(Err(raw)),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Input<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Input::Missing);
        }
        match T::deserialize(&raw) {
            Ok(value) => Ok(Input::Valid(value)),
            Err(_) => Ok(Input::Invalid(raw)),
        }
    }
}

impl<T: Serialize> Serialize for Input<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Input::Missing => serializer.serialize_none(),
            Input::Valid(value) => value.serialize(serializer),
            Input::Invalid(raw) => raw.serialize(serializer),
        }
    }
}

/// Collection of validation problems found in a client-supplied record, keyed by field name.
///
/// Fields are kept sorted so that the textual and serialized representations are stable.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Records a new `message` against `field`.
    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Returns the messages recorded against `field`, if any.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Returns true if no problems have been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the names of the fields that have problems.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Turns the collection into a result: `value` if there are no problems, or `self` otherwise.
    pub fn check<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}
