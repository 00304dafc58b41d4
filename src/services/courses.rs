use serde_json::json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::db::models::{Course, Enrollment, User};
use crate::db::types::{EnrollmentStatus, NotificationKind, UserRole};
use crate::repositories::courses::CreateCourse;
use crate::services::authorization;
use crate::services::errors::{StoreResultExt, WorkflowError};
use crate::services::notifications::{Dispatched, NotificationDraft, Recipients};

#[derive(Debug, Clone)]
pub(crate) struct NewCourse {
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    /// Admins may assign the course to another teacher.
    pub(crate) teacher_id: Option<String>,
}

#[derive(Debug)]
pub(crate) struct EnrollmentChange {
    pub(crate) enrollment: Enrollment,
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) notified: Option<Dispatched>,
}

pub(crate) async fn load_course(
    state: &AppState,
    course_id: &str,
) -> Result<Course, WorkflowError> {
    state
        .store()
        .find_course(course_id)
        .await
        .persistence("Failed to load course")?
        .ok_or_else(|| WorkflowError::not_found("Course not found"))
}

pub(crate) async fn create_course(
    state: &AppState,
    actor: &User,
    input: NewCourse,
    now: PrimitiveDateTime,
) -> Result<Course, WorkflowError> {
    if !authorization::can_create_course(actor.role) {
        return Err(WorkflowError::forbidden("Only teachers can create courses"));
    }

    let teacher_id = match input.teacher_id {
        Some(teacher_id) if teacher_id != actor.id => {
            if !authorization::is_admin(actor.role) {
                return Err(WorkflowError::forbidden("Only admins can assign another teacher"));
            }
            let teacher = state
                .store()
                .find_user(&teacher_id)
                .await
                .persistence("Failed to load teacher")?
                .ok_or_else(|| WorkflowError::not_found("Teacher not found"))?;
            if teacher.role != UserRole::Teacher {
                return Err(WorkflowError::validation("Assigned user is not a teacher"));
            }
            teacher.id
        }
        _ => actor.id.clone(),
    };

    let code = input.code.trim().to_string();
    let taken = state
        .store()
        .find_course_by_code(&code)
        .await
        .persistence("Failed to check course code")?
        .is_some();
    if taken {
        return Err(WorkflowError::conflict("Course code already exists"));
    }

    let course = state
        .store()
        .create_course(CreateCourse {
            id: Uuid::new_v4().to_string(),
            code,
            title: input.title.trim().to_string(),
            description: input.description,
            teacher_id,
            created_at: now,
        })
        .await
        .persistence("Failed to create course")?;

    tracing::info!(
        course_id = %course.id,
        code = %course.code,
        teacher_id = %course.teacher_id,
        "Course created"
    );
    Ok(course)
}

pub(crate) async fn enroll(
    state: &AppState,
    actor: &User,
    course_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<EnrollmentChange, WorkflowError> {
    let course = load_course(state, course_id).await?;
    let allowed = authorization::can_change_enrollment(
        &actor.id,
        actor.role,
        student_id,
        &course.teacher_id,
    );
    if !allowed {
        return Err(WorkflowError::forbidden("Not allowed to enroll this student"));
    }
    if !course.is_active {
        return Err(WorkflowError::conflict("Course is not active"));
    }

    let student = state
        .store()
        .find_user(student_id)
        .await
        .persistence("Failed to load student")?
        .filter(|user| user.is_active)
        .ok_or_else(|| WorkflowError::not_found("Student not found"))?;
    if student.role != UserRole::Student {
        return Err(WorkflowError::validation("Only students can be enrolled"));
    }

    let existing = state
        .store()
        .find_enrollment(&course.id, &student.id)
        .await
        .persistence("Failed to load enrollment")?;
    if authorization::is_active_enrollment(existing.as_ref().map(|enrollment| enrollment.status)) {
        return Err(WorkflowError::conflict("Student is already enrolled"));
    }

    change_enrollment(state, &course, &student, EnrollmentStatus::Active, now).await
}

pub(crate) async fn drop_enrollment(
    state: &AppState,
    actor: &User,
    course_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<EnrollmentChange, WorkflowError> {
    let course = load_course(state, course_id).await?;
    let allowed = authorization::can_change_enrollment(
        &actor.id,
        actor.role,
        student_id,
        &course.teacher_id,
    );
    if !allowed {
        return Err(WorkflowError::forbidden("Not allowed to change this enrollment"));
    }

    let existing = state
        .store()
        .find_enrollment(&course.id, student_id)
        .await
        .persistence("Failed to load enrollment")?;
    if !authorization::is_active_enrollment(existing.map(|enrollment| enrollment.status)) {
        return Err(WorkflowError::not_found("Active enrollment not found"));
    }

    let student = state
        .store()
        .find_user(student_id)
        .await
        .persistence("Failed to load student")?
        .ok_or_else(|| WorkflowError::not_found("Student not found"))?;

    change_enrollment(state, &course, &student, EnrollmentStatus::Dropped, now).await
}

async fn change_enrollment(
    state: &AppState,
    course: &Course,
    student: &User,
    status: EnrollmentStatus,
    now: PrimitiveDateTime,
) -> Result<EnrollmentChange, WorkflowError> {
    let enrollment = state
        .store()
        .upsert_enrollment(&course.id, &student.id, status, now)
        .await
        .persistence("Failed to save enrollment")?;

    tracing::info!(
        course_id = %course.id,
        student_id = %student.id,
        status = ?status,
        "Enrollment changed"
    );

    let (title, message) = match status {
        EnrollmentStatus::Active => (
            "Enrolled in course".to_string(),
            format!("You are now enrolled in {} ({}).", course.title, course.code),
        ),
        EnrollmentStatus::Dropped => (
            "Removed from course".to_string(),
            format!("You are no longer enrolled in {} ({}).", course.title, course.code),
        ),
        EnrollmentStatus::Completed => (
            "Course completed".to_string(),
            format!("You have completed {} ({}).", course.title, course.code),
        ),
    };
    let draft = NotificationDraft::new(NotificationKind::Info, title, message)
        .metadata(json!({ "course_id": course.id, "enrollment_status": status }));

    let notified = match state
        .dispatcher()
        .dispatch(Recipients::Users(vec![student.id.clone()]), draft, now)
        .await
    {
        Ok(dispatched) => Some(dispatched),
        Err(err) => {
            tracing::warn!(error = %err, course_id = %course.id, "Enrollment notification skipped");
            None
        }
    };

    Ok(EnrollmentChange { enrollment, notified })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::test_support::{seed_course, seed_user, TestWorld};

    #[tokio::test]
    async fn teacher_creates_course_they_own() {
        let world = TestWorld::new();
        let teacher = seed_user(&world.store, "t@classhub.test", UserRole::Teacher).await;

        let course = create_course(
            &world.state,
            &teacher,
            NewCourse {
                code: " CS101 ".to_string(),
                title: "Intro".to_string(),
                description: None,
                teacher_id: None,
            },
            primitive_now_utc(),
        )
        .await
        .expect("course");

        assert_eq!(course.code, "CS101");
        assert_eq!(course.teacher_id, teacher.id);

        let duplicate = create_course(
            &world.state,
            &teacher,
            NewCourse {
                code: "CS101".to_string(),
                title: "Again".to_string(),
                description: None,
                teacher_id: None,
            },
            primitive_now_utc(),
        )
        .await
        .unwrap_err();
        assert!(matches!(duplicate, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn students_cannot_create_courses() {
        let world = TestWorld::new();
        let student = seed_user(&world.store, "s@classhub.test", UserRole::Student).await;

        let err = create_course(
            &world.state,
            &student,
            NewCourse {
                code: "X".to_string(),
                title: "X".to_string(),
                description: None,
                teacher_id: None,
            },
            primitive_now_utc(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[tokio::test]
    async fn self_enrollment_notifies_student() {
        let world = TestWorld::new();
        let teacher = seed_user(&world.store, "t@classhub.test", UserRole::Teacher).await;
        let student = seed_user(&world.store, "s@classhub.test", UserRole::Student).await;
        let course = seed_course(&world.store, "CS101", &teacher.id).await;

        let change = enroll(&world.state, &student, &course.id, &student.id, primitive_now_utc())
            .await
            .expect("enroll");

        assert_eq!(change.enrollment.status, EnrollmentStatus::Active);
        let notified = change.notified.expect("notification");
        assert_eq!(notified.notifications[0].kind, NotificationKind::Info);
        notified.delivery.await.expect("delivery");
        assert_eq!(world.mailer.delivered_to(), vec!["s@classhub.test"]);

        let again = enroll(&world.state, &student, &course.id, &student.id, primitive_now_utc())
            .await
            .unwrap_err();
        assert!(matches!(again, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn other_teachers_cannot_enroll_students() {
        let world = TestWorld::new();
        let owner = seed_user(&world.store, "t1@classhub.test", UserRole::Teacher).await;
        let other = seed_user(&world.store, "t2@classhub.test", UserRole::Teacher).await;
        let student = seed_user(&world.store, "s@classhub.test", UserRole::Student).await;
        let course = seed_course(&world.store, "CS101", &owner.id).await;

        let err = enroll(&world.state, &other, &course.id, &student.id, primitive_now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[tokio::test]
    async fn dropping_requires_active_enrollment() {
        let world = TestWorld::new();
        let teacher = seed_user(&world.store, "t@classhub.test", UserRole::Teacher).await;
        let student = seed_user(&world.store, "s@classhub.test", UserRole::Student).await;
        let course = seed_course(&world.store, "CS101", &teacher.id).await;

        let missing =
            drop_enrollment(&world.state, &teacher, &course.id, &student.id, primitive_now_utc())
                .await
                .unwrap_err();
        assert!(matches!(missing, WorkflowError::NotFound(_)));

        enroll(&world.state, &teacher, &course.id, &student.id, primitive_now_utc())
            .await
            .expect("enroll");
        let dropped =
            drop_enrollment(&world.state, &teacher, &course.id, &student.id, primitive_now_utc())
                .await
                .expect("drop");
        assert_eq!(dropped.enrollment.status, EnrollmentStatus::Dropped);
        assert_eq!(world.store.notifications_for(&student.id).len(), 2);
    }
}
