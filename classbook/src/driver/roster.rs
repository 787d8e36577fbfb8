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

//! Composition of the ordered list of students enrolled in a course.

use crate::db;
use crate::model::{CourseId, MembershipView};
use classbook_core::db::{DbResult, Executor};
use std::cmp::Ordering;

/// Ordering of the entries of a roster: by student last name, then first name, then the time
/// the student joined the course.  Students with identical names that joined at the same instant
/// are ordered by membership identifier.
pub(crate) fn roster_order(a: &MembershipView, b: &MembershipView) -> Ordering {
    a.student_last_name()
        .cmp(b.student_last_name())
        .then_with(|| a.student_first_name().cmp(b.student_first_name()))
        .then_with(|| a.membership().join_date().cmp(b.membership().join_date()))
        .then_with(|| a.membership().id().cmp(b.membership().id()))
}

/// Returns the memberships of `course` sorted by `roster_order`.
///
/// Courses that do not exist have an empty roster.
pub(crate) async fn course_roster(
    ex: &mut Executor,
    course: CourseId,
) -> DbResult<Vec<MembershipView>> {
    let mut roster = db::list_course_memberships(ex, course).await?;
    roster.sort_by(roster_order);
    Ok(roster)
}
