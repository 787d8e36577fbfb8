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

//! Checks applied to client-supplied records before they are written.
//!
//! Every validator collects all problems it finds instead of stopping at the first one so that
//! clients get a complete picture of what is wrong with their payload.

use crate::db;
use crate::model::{
    Course, CourseId, CoursePayload, Membership, MembershipPayload, Student, StudentFields,
    StudentId, StudentPayload, iso_date,
};
use classbook_core::db::{DbError, Executor};
use classbook_core::driver::DriverResult;
use classbook_core::model::{FieldErrors, Input, NON_FIELD_ERRORS};
use serde_json::Value;
use time::Date;

/// Message for fields that must be present but were not supplied.
pub(crate) const REQUIRED: &str = "This field is required.";

/// Message for text fields that are empty after trimming.
pub(crate) const BLANK: &str = "This field may not be blank.";

/// Message for text fields that received a JSON value with no textual form.
pub(crate) const NOT_A_STRING: &str = "Not a valid string.";

/// Message for dates that cannot be parsed.
pub(crate) const INVALID_DATE: &str =
    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";

/// Message for memberships that would enroll a student in the same course twice.
pub(crate) const NOT_UNIQUE: &str = "The fields student, course must make a unique set.";

/// Returns the validation errors that describe a duplicate enrollment.
pub(crate) fn duplicate_enrollment() -> FieldErrors {
    let mut errors = FieldErrors::default();
    errors.add(NON_FIELD_ERRORS, NOT_UNIQUE);
    errors
}

/// Name of the JSON type of `raw`, as reported to clients.
fn json_type_name(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Trims `value` and checks that it is non-empty and at most `max_length` characters long.
///
/// Numbers are accepted in their textual form.
fn check_name(value: Result<String, Value>, max_length: usize) -> Result<String, String> {
    let value = match value {
        Ok(value) => value,
        Err(Value::Number(n)) => n.to_string(),
        Err(_) => return Err(NOT_A_STRING.to_owned()),
    };
    let value = value.trim();
    if value.is_empty() {
        return Err(BLANK.to_owned());
    }
    if value.chars().count() > max_length {
        return Err(format!("Ensure this field has no more than {} characters.", max_length));
    }
    Ok(value.to_owned())
}

/// Parses `value` as a `YYYY-MM-DD` date.
fn check_date(value: Result<String, Value>) -> Result<Date, String> {
    let value = value.map_err(|_| INVALID_DATE.to_owned())?;
    let value = value.trim();
    if value.is_empty() {
        return Err(BLANK.to_owned());
    }
    iso_date::parse(value).map_err(|_| INVALID_DATE.to_owned())
}

/// Checks that `value` is usable as an identifier, accepting numbers in textual form.
///
/// Whether the identifier points to an existing record is checked separately.
fn check_reference<I, F>(value: Result<I, Value>, new: F) -> Result<I, String>
where
    F: FnOnce(i64) -> I,
{
    match value {
        Ok(id) => Ok(id),
        Err(Value::String(text)) => match text.trim().parse::<i64>() {
            Ok(id) => Ok(new(id)),
            Err(_) => Err(incorrect_type(&Value::String(text))),
        },
        Err(raw) => Err(incorrect_type(&raw)),
    }
}

/// Message for references that are not identifiers.
fn incorrect_type(raw: &Value) -> String {
    format!("Incorrect type. Expected pk value, received {}.", json_type_name(raw))
}

/// Determines the final value of `field`.
///
/// A supplied `value` goes through `check`, which also receives values of the wrong JSON type.
/// A missing one falls back to `current`, the value stored in the record being modified, and is
/// reported as required when there is none.
fn resolve<T, R, F>(
    errors: &mut FieldErrors,
    field: &str,
    value: Input<T>,
    current: Option<R>,
    check: F,
) -> Option<R>
where
    F: FnOnce(Result<T, Value>) -> Result<R, String>,
{
    match (value.supplied(), current) {
        (Some(value), _) => match check(value) {
            Ok(value) => Some(value),
            Err(message) => {
                errors.add(field, message);
                None
            }
        },
        (None, Some(current)) => Some(current),
        (None, None) => {
            errors.add(field, REQUIRED);
            None
        }
    }
}

/// Validates a student `payload` and returns the fields to store.
///
/// `current` is the stored record when applying a partial update, in which case missing fields
/// keep their stored values.
pub(crate) fn validate_student(
    payload: StudentPayload,
    current: Option<&Student>,
    max_name_length: usize,
) -> Result<StudentFields, FieldErrors> {
    let mut errors = FieldErrors::default();

    let first_name = resolve(
        &mut errors,
        "first_name",
        payload.first_name,
        current.map(|s| s.first_name().clone()),
        |v| check_name(v, max_name_length),
    );
    let last_name = resolve(
        &mut errors,
        "last_name",
        payload.last_name,
        current.map(|s| s.last_name().clone()),
        |v| check_name(v, max_name_length),
    );
    let birthday = resolve(
        &mut errors,
        "birthday",
        payload.birthday,
        current.map(|s| *s.birthday()),
        check_date,
    );

    match (first_name, last_name, birthday) {
        (Some(first_name), Some(last_name), Some(birthday)) => {
            errors.check(StudentFields::new(first_name, last_name, birthday))
        }
        _ => Err(errors),
    }
}

/// Validates a course `payload` and returns the name to store.
///
/// `current` is the stored record when applying a partial update.
pub(crate) fn validate_course(
    payload: CoursePayload,
    current: Option<&Course>,
    max_name_length: usize,
) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::default();

    let name = resolve(&mut errors, "name", payload.name, current.map(|c| c.name().clone()), |v| {
        check_name(v, max_name_length)
    });

    match name {
        Some(name) => errors.check(name),
        None => Err(errors),
    }
}

/// Message for references to records that do not exist.
fn dangling_reference(id: i64) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

/// Validates a membership `payload` and returns the student and course to link.
///
/// `current` is the stored record when updating, and is used both to fill in missing fields on
/// partial updates and to ignore the record itself when checking for duplicate enrollments.
/// The referenced records are looked up through `ex` so that the checks see the same state as
/// the write that follows.
pub(crate) async fn validate_membership(
    ex: &mut Executor,
    payload: MembershipPayload,
    current: Option<&Membership>,
    partial: bool,
) -> DriverResult<(StudentId, CourseId)> {
    let mut errors = FieldErrors::default();

    let fallback = if partial { current } else { None };
    let student =
        resolve(&mut errors, "student", payload.student, fallback.map(|m| *m.student()), |v| {
            check_reference(v, StudentId::new)
        });
    let course =
        resolve(&mut errors, "course", payload.course, fallback.map(|m| *m.course()), |v| {
            check_reference(v, CourseId::new)
        });

    if let Some(student) = student {
        match db::get_student(ex, student).await {
            Ok(_) => (),
            Err(DbError::NotFound) => errors.add("student", dangling_reference(student.as_i64())),
            Err(e) => return Err(e.into()),
        }
    }
    if let Some(course) = course {
        match db::get_course(ex, course).await {
            Ok(_) => (),
            Err(DbError::NotFound) => errors.add("course", dangling_reference(course.as_i64())),
            Err(e) => return Err(e.into()),
        }
    }

    let (student, course) = match (student, course) {
        (Some(student), Some(course)) if errors.is_empty() => (student, course),
        _ => return Err(errors.into()),
    };

    if let Some(existing) = db::find_membership(ex, student, course).await? {
        if current.map(|m| *m.id()) != Some(existing) {
            return Err(duplicate_enrollment().into());
        }
    }

    Ok((student, course))
}
