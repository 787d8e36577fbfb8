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

//! Entry point to the REST server.

use crate::driver::Driver;
use axum::Router;

mod course_delete;
mod course_get;
mod course_patch;
mod course_put;
mod courses_get;
mod courses_post;
mod membership_delete;
mod membership_get;
mod membership_patch;
mod membership_put;
mod memberships_get;
mod memberships_post;
mod student_delete;
mod student_get;
mod student_patch;
mod student_put;
mod students_get;
mod students_post;
#[cfg(test)]
mod testutils;

/// Creates the router for the application.
pub(crate) fn app(driver: Driver) -> Router {
    use axum::routing::get;
    Router::new()
        .route("/api/v1/students", get(students_get::handler).post(students_post::handler))
        .route(
            "/api/v1/students/:id",
            get(student_get::handler)
                .put(student_put::handler)
                .patch(student_patch::handler)
                .delete(student_delete::handler),
        )
        .route("/api/v1/courses", get(courses_get::handler).post(courses_post::handler))
        .route(
            "/api/v1/courses/:id",
            get(course_get::handler)
                .put(course_put::handler)
                .patch(course_patch::handler)
                .delete(course_delete::handler),
        )
        .route("/api/v1/memberships", get(memberships_get::handler).post(memberships_post::handler))
        .route(
            "/api/v1/memberships/:id",
            get(membership_get::handler)
                .put(membership_put::handler)
                .patch(membership_patch::handler)
                .delete(membership_delete::handler),
        )
        .with_state(driver)
}
