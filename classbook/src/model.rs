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

//! High-level data types.

use classbook_core::model::Input;
use derive_getters::Getters;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use time::{Date, OffsetDateTime};

/// Generates a newtype for the store-assigned identifier of an entity.
macro_rules! entity_id [
    ( $name:ident, $what:literal ) => {
        #[doc = concat!("Store-assigned identifier of a ", $what, ".")]
        #[derive(
            Clone, Constructor, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq,
            PartialOrd, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Returns the raw integer used by the database.
            pub fn as_i64(self) -> i64 {
                self.0
            }
        }
    }
];

entity_id!(StudentId, "student");
entity_id!(CourseId, "course");
entity_id!(MembershipId, "membership");

/// Serde adapter to represent calendar dates as `YYYY-MM-DD` strings.
pub mod iso_date {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;
    use time::format_description::BorrowedFormatItem;
    use time::macros::format_description;

    /// Textual layout of a date.
    const FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

    /// Parses `s` as a `YYYY-MM-DD` date.
    pub fn parse(s: &str) -> Result<Date, time::error::Parse> {
        Date::parse(s, FORMAT)
    }

    /// Formats `date` as `YYYY-MM-DD`.
    pub fn format(date: Date) -> Result<String, time::error::Format> {
        date.format(FORMAT)
    }

    /// Serializes `date` as a `YYYY-MM-DD` string.
    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let text = format(*date).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    /// Deserializes a `YYYY-MM-DD` string into a date.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(D::Error::custom)
    }
}

/// The validated, writable attributes of a student.
#[derive(Clone, Constructor, Debug, Getters, PartialEq)]
pub struct StudentFields {
    /// Given name, trimmed and non-empty.
    first_name: String,

    /// Family name, trimmed and non-empty.
    last_name: String,

    /// Date of birth.
    birthday: Date,
}

/// A student as stored in the database.
#[derive(Clone, Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub struct Student {
    /// Identifier of the student.
    id: StudentId,

    /// Given name.
    first_name: String,

    /// Family name.
    last_name: String,

    /// Date of birth.
    #[serde(with = "iso_date")]
    birthday: Date,
}

impl Student {
    /// Creates a student from its identifier and its validated `fields`.
    pub fn from_fields(id: StudentId, fields: StudentFields) -> Self {
        Self {
            id,
            first_name: fields.first_name,
            last_name: fields.last_name,
            birthday: fields.birthday,
        }
    }
}

/// Ordering of students in listings: by last name, then first name, then identifier so that
/// namesakes are returned in a stable order.
pub fn student_order(a: &Student, b: &Student) -> Ordering {
    a.last_name
        .cmp(&b.last_name)
        .then_with(|| a.first_name.cmp(&b.first_name))
        .then_with(|| a.id.cmp(&b.id))
}

/// A course as stored in the database.
#[derive(Clone, Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub struct Course {
    /// Identifier of the course.
    id: CourseId,

    /// Name of the course.
    name: String,
}

/// The enrollment of a student in a course.
#[derive(Clone, Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub struct Membership {
    /// Identifier of the membership.
    id: MembershipId,

    /// The enrolled student.
    student: StudentId,

    /// The course the student is enrolled in.
    course: CourseId,

    /// When the enrollment was recorded.  Assigned by the service and never changed.
    #[serde(with = "time::serde::rfc3339")]
    join_date: OffsetDateTime,
}

/// A membership together with a read-only snapshot of the enrolled student.
#[derive(Clone, Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub struct MembershipView {
    /// The membership itself.
    #[serde(flatten)]
    membership: Membership,

    /// Given name of the enrolled student.
    student_first_name: String,

    /// Family name of the enrolled student.
    student_last_name: String,

    /// Date of birth of the enrolled student.
    #[serde(with = "iso_date")]
    student_birthday: Date,
}

/// A course together with its roster.
#[derive(Clone, Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub struct CourseDetail {
    /// The course itself.
    #[serde(flatten)]
    course: Course,

    /// The course's memberships in roster order.
    students: Vec<MembershipView>,
}

/// Client-supplied student record.  Every field is an `Input` so that validation can report all
/// missing or mistyped fields at once and so that partial updates can omit them.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StudentPayload {
    /// Desired given name.
    #[serde(default, skip_serializing_if = "Input::is_missing")]
    pub first_name: Input<String>,

    /// Desired family name.
    #[serde(default, skip_serializing_if = "Input::is_missing")]
    pub last_name: Input<String>,

    /// Desired date of birth, still in textual form.
    #[serde(default, skip_serializing_if = "Input::is_missing")]
    pub birthday: Input<String>,
}

/// Client-supplied course record.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CoursePayload {
    /// Desired course name.
    #[serde(default, skip_serializing_if = "Input::is_missing")]
    pub name: Input<String>,
}

/// Client-supplied membership record.  Any `join_date` sent by the client is ignored.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MembershipPayload {
    /// Student to enroll.
    #[serde(default, skip_serializing_if = "Input::is_missing")]
    pub student: Input<StudentId>,

    /// Course to enroll the student in.
    #[serde(default, skip_serializing_if = "Input::is_missing")]
    pub course: Input<CourseId>,
}

/// Restricts a membership listing to the given student and/or course.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MembershipFilter {
    /// Only return memberships of this student.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentId>,

    /// Only return memberships in this course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<CourseId>,
}
