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

//! Extends the driver with operations on students.

use crate::db;
use crate::driver::validation::validate_student;
use crate::driver::{Driver, map_not_found};
use crate::model::{Student, StudentId, StudentPayload};
use classbook_core::driver::DriverResult;
use log::info;

impl Driver {
    /// Gets all students ordered by name.
    pub(crate) async fn list_students(self) -> DriverResult<Vec<Student>> {
        let mut ex = self.db.ex().await?;
        Ok(db::list_students(&mut ex).await?)
    }

    /// Gets the student `id`.
    pub(crate) async fn get_student(self, id: StudentId) -> DriverResult<Student> {
        let mut ex = self.db.ex().await?;
        db::get_student(&mut ex, id).await.map_err(|e| map_not_found(e, "Student"))
    }

    /// Creates a new student from the client-supplied `payload`.
    pub(crate) async fn create_student(self, payload: StudentPayload) -> DriverResult<Student> {
        let fields = validate_student(payload, None, self.opts.max_name_length)?;

        let mut tx = self.db.begin().await?;
        let student = db::create_student(tx.ex(), fields).await?;
        tx.commit().await?;

        info!("Created student {}", student.id());
        Ok(student)
    }

    /// Modifies the student `id` with the contents of `payload`.
    ///
    /// When `partial` is false, `payload` must carry every writable field.  Otherwise, missing
    /// fields keep their stored values.
    async fn modify_student(
        self,
        id: StudentId,
        payload: StudentPayload,
        partial: bool,
    ) -> DriverResult<Student> {
        let mut tx = self.db.begin().await?;

        let current = db::get_student(tx.ex(), id).await.map_err(|e| map_not_found(e, "Student"))?;
        let current = if partial { Some(&current) } else { None };
        let fields = validate_student(payload, current, self.opts.max_name_length)?;

        let student =
            db::update_student(tx.ex(), id, fields).await.map_err(|e| map_not_found(e, "Student"))?;
        tx.commit().await?;

        info!("Updated student {}", id);
        Ok(student)
    }

    /// Replaces all writable fields of the student `id` with the contents of `payload`.
    pub(crate) async fn update_student(
        self,
        id: StudentId,
        payload: StudentPayload,
    ) -> DriverResult<Student> {
        self.modify_student(id, payload, false).await
    }

    /// Replaces the fields of the student `id` that are present in `payload`.
    pub(crate) async fn patch_student(
        self,
        id: StudentId,
        payload: StudentPayload,
    ) -> DriverResult<Student> {
        self.modify_student(id, payload, true).await
    }

    /// Deletes the student `id` together with all of its memberships.
    pub(crate) async fn delete_student(self, id: StudentId) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        db::delete_student(tx.ex(), id).await.map_err(|e| map_not_found(e, "Student"))?;
        tx.commit().await?;

        info!("Deleted student {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testutils::*;
    use crate::driver::validation::{BLANK, REQUIRED};
    use crate::model::MembershipFilter;
    use classbook_core::driver::DriverError;
    use classbook_core::model::Input;
    use time::macros::date;

    /// Shorthand to build a complete student payload.
    fn payload(first_name: &str, last_name: &str, birthday: &str) -> StudentPayload {
        StudentPayload {
            first_name: Input::Valid(first_name.to_owned()),
            last_name: Input::Valid(last_name.to_owned()),
            birthday: Input::Valid(birthday.to_owned()),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_student() {
        let context = TestContext::setup().await;

        let student = context
            .driver()
            .create_student(payload("Ada", "Lovelace", "1815-12-10"))
            .await
            .unwrap();
        assert_eq!("Ada", student.first_name());
        assert_eq!("Lovelace", student.last_name());
        assert_eq!(date!(1815 - 12 - 10), *student.birthday());

        assert_eq!(student, context.driver().get_student(*student.id()).await.unwrap());
        assert_eq!(vec![student], context.driver().list_students().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_student_validation_error_writes_nothing() {
        let context = TestContext::setup().await;

        match context.driver().create_student(payload("", "Lovelace", "")).await {
            Err(DriverError::Validation(errors)) => {
                assert_eq!(vec!["birthday", "first_name"], errors.fields().collect::<Vec<&str>>());
            }
            e => panic!("{:?}", e),
        }

        let missing = StudentPayload { birthday: Input::Missing, ..payload("Ada", "Lovelace", "") };
        match context.driver().create_student(missing).await {
            Err(DriverError::Validation(errors)) => {
                assert_eq!(Some([REQUIRED.to_owned()].as_slice()), errors.get("birthday"));
            }
            e => panic!("{:?}", e),
        }

        assert!(context.driver().list_students().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_student_not_found() {
        let context = TestContext::setup().await;

        assert_eq!(
            DriverError::NotFound("Student not found".to_owned()),
            context.driver().get_student(StudentId::new(5)).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_update_student_replaces_all_fields() {
        let context = TestContext::setup().await;
        let student = context.create_student("Ada", "Lovelace").await;

        let updated = context
            .driver()
            .update_student(*student.id(), payload("Augusta", "King", "1815-12-10"))
            .await
            .unwrap();
        assert_eq!(student.id(), updated.id());
        assert_eq!("Augusta", updated.first_name());
        assert_eq!("King", updated.last_name());
        assert_eq!(updated, context.driver().get_student(*student.id()).await.unwrap());

        let partial = StudentPayload {
            first_name: Input::Valid("Ada".to_owned()),
            ..Default::default()
        };
        match context.driver().update_student(*student.id(), partial).await {
            Err(DriverError::Validation(errors)) => {
                assert_eq!(vec!["birthday", "last_name"], errors.fields().collect::<Vec<&str>>());
            }
            e => panic!("{:?}", e),
        }
        assert_eq!(updated, context.driver().get_student(*student.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_patch_student_only_changes_given_fields() {
        let context = TestContext::setup().await;
        let student = context.create_student("Ada", "Lovelace").await;

        let patch = StudentPayload {
            last_name: Input::Valid("King".to_owned()),
            ..Default::default()
        };
        let patched = context.driver().patch_student(*student.id(), patch).await.unwrap();
        assert_eq!(student.first_name(), patched.first_name());
        assert_eq!("King", patched.last_name());
        assert_eq!(student.birthday(), patched.birthday());

        let patch = StudentPayload {
            first_name: Input::Valid(" ".to_owned()),
            ..Default::default()
        };
        match context.driver().patch_student(*student.id(), patch).await {
            Err(DriverError::Validation(errors)) => {
                assert_eq!(Some([BLANK.to_owned()].as_slice()), errors.get("first_name"));
            }
            e => panic!("{:?}", e),
        }
    }

    #[tokio::test]
    async fn test_modify_unknown_student_is_not_found_before_validation() {
        let context = TestContext::setup().await;

        let id = StudentId::new(99);
        assert_eq!(
            DriverError::NotFound("Student not found".to_owned()),
            context.driver().update_student(id, StudentPayload::default()).await.unwrap_err()
        );
        assert_eq!(
            DriverError::NotFound("Student not found".to_owned()),
            context.driver().patch_student(id, StudentPayload::default()).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_delete_student_cascades() {
        let context = TestContext::setup().await;
        let student = context.create_student("Ada", "Lovelace").await;
        let other = context.create_student("Alan", "Turing").await;
        let course = context.create_course("Math").await;
        context.enroll(&student, &course).await;
        context.enroll(&other, &course).await;

        context.driver().delete_student(*student.id()).await.unwrap();

        assert_eq!(
            DriverError::NotFound("Student not found".to_owned()),
            context.driver().get_student(*student.id()).await.unwrap_err()
        );
        let memberships =
            context.driver().list_memberships(MembershipFilter::default()).await.unwrap();
        assert_eq!(1, memberships.len());
        assert_eq!(other.id(), memberships[0].membership().student());

        assert_eq!(
            DriverError::NotFound("Student not found".to_owned()),
            context.driver().delete_student(*student.id()).await.unwrap_err()
        );
    }
}
