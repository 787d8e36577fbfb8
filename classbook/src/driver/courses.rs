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

//! Extends the driver with operations on courses.

use crate::db;
use crate::driver::roster::course_roster;
use crate::driver::validation::validate_course;
use crate::driver::{Driver, map_not_found};
use crate::model::{CourseDetail, CourseId, CoursePayload};
use classbook_core::driver::DriverResult;
use log::info;

impl Driver {
    /// Gets all courses, each with its roster.
    ///
    /// The courses and their rosters are read within a single transaction so that they are
    /// consistent with each other.
    pub(crate) async fn list_courses(self) -> DriverResult<Vec<CourseDetail>> {
        let mut tx = self.db.begin().await?;

        let courses = db::list_courses(tx.ex()).await?;
        let mut details = Vec::with_capacity(courses.len());
        for course in courses {
            let roster = course_roster(tx.ex(), *course.id()).await?;
            details.push(CourseDetail::new(course, roster));
        }

        tx.commit().await?;
        Ok(details)
    }

    /// Gets the course `id` with its roster.
    pub(crate) async fn get_course(self, id: CourseId) -> DriverResult<CourseDetail> {
        let mut tx = self.db.begin().await?;

        let course = db::get_course(tx.ex(), id).await.map_err(|e| map_not_found(e, "Course"))?;
        let roster = course_roster(tx.ex(), id).await?;

        tx.commit().await?;
        Ok(CourseDetail::new(course, roster))
    }

    /// Creates a new course from the client-supplied `payload`.  New courses have no students.
    pub(crate) async fn create_course(self, payload: CoursePayload) -> DriverResult<CourseDetail> {
        let name = validate_course(payload, None, self.opts.max_name_length)?;

        let mut tx = self.db.begin().await?;
        let course = db::create_course(tx.ex(), name).await?;
        tx.commit().await?;

        info!("Created course {}", course.id());
        Ok(CourseDetail::new(course, vec![]))
    }

    /// Modifies the course `id` with the contents of `payload`.
    ///
    /// When `partial` is false, `payload` must carry every writable field.
    async fn modify_course(
        self,
        id: CourseId,
        payload: CoursePayload,
        partial: bool,
    ) -> DriverResult<CourseDetail> {
        let mut tx = self.db.begin().await?;

        let current = db::get_course(tx.ex(), id).await.map_err(|e| map_not_found(e, "Course"))?;
        let current = if partial { Some(&current) } else { None };
        let name = validate_course(payload, current, self.opts.max_name_length)?;

        let course =
            db::update_course(tx.ex(), id, name).await.map_err(|e| map_not_found(e, "Course"))?;
        let roster = course_roster(tx.ex(), id).await?;
        tx.commit().await?;

        info!("Updated course {}", id);
        Ok(CourseDetail::new(course, roster))
    }

    /// Replaces all writable fields of the course `id` with the contents of `payload`.
    pub(crate) async fn update_course(
        self,
        id: CourseId,
        payload: CoursePayload,
    ) -> DriverResult<CourseDetail> {
        self.modify_course(id, payload, false).await
    }

    /// Replaces the fields of the course `id` that are present in `payload`.
    pub(crate) async fn patch_course(
        self,
        id: CourseId,
        payload: CoursePayload,
    ) -> DriverResult<CourseDetail> {
        self.modify_course(id, payload, true).await
    }

    /// Deletes the course `id` together with all of its memberships.
    pub(crate) async fn delete_course(self, id: CourseId) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        db::delete_course(tx.ex(), id).await.map_err(|e| map_not_found(e, "Course"))?;
        tx.commit().await?;

        info!("Deleted course {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverOptions;
    use crate::driver::testutils::*;
    use crate::driver::validation::{BLANK, REQUIRED};
    use crate::model::MembershipFilter;
    use classbook_core::driver::DriverError;
    use classbook_core::model::Input;

    /// Shorthand to build a course payload.
    fn payload(name: &str) -> CoursePayload {
        CoursePayload { name: Input::Valid(name.to_owned()) }
    }

    #[tokio::test]
    async fn test_create_and_get_course() {
        let context = TestContext::setup().await;

        let created = context.driver().create_course(payload("Math")).await.unwrap();
        assert_eq!("Math", created.course().name());
        assert!(created.students().is_empty());

        let fetched = context.driver().get_course(*created.course().id()).await.unwrap();
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn test_create_course_validation() {
        let context = TestContext::setup().await;

        for (payload, message) in [(payload(""), BLANK), (CoursePayload::default(), REQUIRED)] {
            match context.driver().create_course(payload).await {
                Err(DriverError::Validation(errors)) => {
                    assert_eq!(Some([message.to_owned()].as_slice()), errors.get("name"));
                }
                e => panic!("{:?}", e),
            }
        }

        assert!(context.driver().list_courses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_course_name_length_is_configurable() {
        let context = TestContext::setup_with(DriverOptions { max_name_length: 3 }).await;

        context.driver().create_course(payload("Art")).await.unwrap();
        match context.driver().create_course(payload("Math")).await {
            Err(DriverError::Validation(errors)) => {
                assert_eq!(
                    Some(["Ensure this field has no more than 3 characters.".to_owned()].as_slice()),
                    errors.get("name")
                );
            }
            e => panic!("{:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_course_includes_sorted_roster() {
        let context = TestContext::setup().await;
        let course = context.create_course("Math").await;
        let zed = context.create_student("Zed", "Zulu").await;
        let amy = context.create_student("Amy", "Alpha").await;
        context.enroll(&zed, &course).await;
        context.enroll(&amy, &course).await;

        let detail = context.driver().get_course(*course.id()).await.unwrap();
        let names = detail
            .students()
            .iter()
            .map(|v| v.student_last_name().as_str())
            .collect::<Vec<&str>>();
        assert_eq!(vec!["Alpha", "Zulu"], names);
    }

    #[tokio::test]
    async fn test_list_courses_with_rosters() {
        let context = TestContext::setup().await;
        let math = context.create_course("Math").await;
        let art = context.create_course("Art").await;
        let student = context.create_student("Ada", "Lovelace").await;
        context.enroll(&student, &art).await;

        let details = context.driver().list_courses().await.unwrap();
        assert_eq!(2, details.len());
        assert_eq!(&math, details[0].course());
        assert!(details[0].students().is_empty());
        assert_eq!(&art, details[1].course());
        assert_eq!(1, details[1].students().len());
    }

    #[tokio::test]
    async fn test_update_and_patch_course() {
        let context = TestContext::setup().await;
        let course = context.create_course("Math").await;

        let updated = context.driver().update_course(*course.id(), payload("Algebra")).await.unwrap();
        assert_eq!("Algebra", updated.course().name());

        let patched =
            context.driver().patch_course(*course.id(), CoursePayload::default()).await.unwrap();
        assert_eq!("Algebra", patched.course().name());

        match context.driver().update_course(*course.id(), CoursePayload::default()).await {
            Err(DriverError::Validation(errors)) => {
                assert_eq!(Some([REQUIRED.to_owned()].as_slice()), errors.get("name"));
            }
            e => panic!("{:?}", e),
        }

        assert_eq!(
            DriverError::NotFound("Course not found".to_owned()),
            context.driver().update_course(CourseId::new(50), payload("x")).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_delete_course_cascades() {
        let context = TestContext::setup().await;
        let course = context.create_course("Math").await;
        let other = context.create_course("Art").await;
        let student = context.create_student("Ada", "Lovelace").await;
        context.enroll(&student, &course).await;
        context.enroll(&student, &other).await;

        context.driver().delete_course(*course.id()).await.unwrap();

        assert_eq!(
            DriverError::NotFound("Course not found".to_owned()),
            context.driver().get_course(*course.id()).await.unwrap_err()
        );
        let memberships =
            context.driver().list_memberships(MembershipFilter::default()).await.unwrap();
        assert_eq!(1, memberships.len());
        assert_eq!(other.id(), memberships[0].membership().course());
        assert_eq!(student, context.driver().get_student(*student.id()).await.unwrap());
    }
}
