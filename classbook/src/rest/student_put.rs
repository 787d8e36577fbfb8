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

//! API to replace all fields of a student.

use crate::driver::Driver;
use crate::model::{StudentId, StudentPayload};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use classbook_core::rest::{JsonBody, RestError};

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(id): Path<StudentId>,
    JsonBody(payload): JsonBody<StudentPayload>,
) -> Result<impl IntoResponse, RestError> {
    let student = driver.update_student(id, payload).await?;
    Ok(Json(student))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Student;
    use crate::rest::testutils::*;
    use axum::http;
    use classbook_core::model::Input;
    use classbook_core::rest::testutils::*;
    use time::macros::date;

    fn route(id: StudentId) -> (http::Method, String) {
        (http::Method::PUT, format!("/api/v1/students/{}", id))
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContext::setup().await;

        let student = context.create_student("Ada", "Lovelace").await;
        let other = context.create_student("Alan", "Turing").await;

        let request = StudentPayload {
            first_name: Input::Valid("Augusta".to_owned()),
            last_name: Input::Valid("King".to_owned()),
            birthday: Input::Valid("1815-12-10".to_owned()),
        };
        let response = OneShotBuilder::new(context.app(), route(*student.id()))
            .send_json(request)
            .await
            .expect_json::<Student>()
            .await;
        let exp_student = Student::new(
            *student.id(),
            "Augusta".to_owned(),
            "King".to_owned(),
            date!(1815 - 12 - 10),
        );
        assert_eq!(exp_student, response);

        assert_eq!(exp_student, context.driver().get_student(*student.id()).await.unwrap());
        assert_eq!(other, context.driver().get_student(*other.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_requires_all_fields() {
        let context = TestContext::setup().await;

        let student = context.create_student("Ada", "Lovelace").await;

        let request = StudentPayload {
            last_name: Input::Valid("King".to_owned()),
            ..Default::default()
        };
        OneShotBuilder::new(context.app(), route(*student.id()))
            .send_json(request)
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_field_error("first_name", "required")
            .await;

        assert_eq!(student, context.driver().get_student(*student.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup().await;

        let request = StudentPayload {
            first_name: Input::Valid("Ada".to_owned()),
            last_name: Input::Valid("Lovelace".to_owned()),
            birthday: Input::Valid("1815-12-10".to_owned()),
        };
        OneShotBuilder::new(context.app(), route(StudentId::new(8)))
            .send_json(request)
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("Student not found")
            .await;
    }

    test_payload_must_be_json!(TestContext::setup().await.into_app(), route(StudentId::new(1)));
}
