use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{
    Assignment, Course, Enrollment, Grade, Notification, Submission, TokenTransaction, User,
};
use crate::db::types::{AssignmentStatus, EnrollmentStatus, SubmissionStatus, UserRole};

use super::assignments::CreateAssignment;
use super::courses::CreateCourse;
use super::grades::{GradeWrite, RecordedGrade};
use super::notifications::CreateNotification;
use super::submissions::{DraftSubmission, TransitionStamp};
use super::token_transactions::CreateTokenTransaction;
use super::users::{CreateUser, UpdateUser};
use super::{
    assignments, courses, enrollments, grades, health, notifications, submissions,
    token_transactions, users,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations the workflow depends on. Every method is a
/// suspension point; conditional writes return `None` when their guard did
/// not match instead of erroring.
#[async_trait]
pub(crate) trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>, StoreError>;
    async fn list_active_users(&self, role: Option<UserRole>) -> Result<Vec<User>, StoreError>;
    async fn create_user(&self, params: CreateUser) -> Result<User, StoreError>;
    async fn update_user(&self, id: &str, params: UpdateUser) -> Result<(), StoreError>;

    async fn create_course(&self, params: CreateCourse) -> Result<Course, StoreError>;
    async fn find_course(&self, id: &str) -> Result<Option<Course>, StoreError>;
    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>, StoreError>;

    async fn upsert_enrollment(
        &self,
        course_id: &str,
        student_id: &str,
        status: EnrollmentStatus,
        now: PrimitiveDateTime,
    ) -> Result<Enrollment, StoreError>;
    async fn find_enrollment(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> Result<Option<Enrollment>, StoreError>;
    async fn list_active_students(&self, course_id: &str) -> Result<Vec<User>, StoreError>;

    async fn create_assignment(&self, params: CreateAssignment) -> Result<Assignment, StoreError>;
    async fn find_assignment(&self, id: &str) -> Result<Option<Assignment>, StoreError>;
    async fn list_assignments(
        &self,
        course_id: &str,
        statuses: &[AssignmentStatus],
    ) -> Result<Vec<Assignment>, StoreError>;
    async fn transition_assignment(
        &self,
        id: &str,
        from: AssignmentStatus,
        to: AssignmentStatus,
        now: PrimitiveDateTime,
    ) -> Result<Option<Assignment>, StoreError>;

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError>;
    async fn find_submission_for(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<Submission>, StoreError>;
    async fn list_submissions(&self, assignment_id: &str) -> Result<Vec<Submission>, StoreError>;
    /// `None` when the (assignment, student) row exists and is no longer a draft.
    async fn upsert_draft(&self, params: DraftSubmission)
        -> Result<Option<Submission>, StoreError>;
    async fn transition_submission(
        &self,
        id: &str,
        from: SubmissionStatus,
        to: SubmissionStatus,
        stamp: TransitionStamp,
        now: PrimitiveDateTime,
    ) -> Result<Option<Submission>, StoreError>;

    async fn find_grade(&self, submission_id: &str) -> Result<Option<Grade>, StoreError>;
    /// `None` when the submission is missing or not in a gradable state.
    async fn record_grade(&self, params: GradeWrite) -> Result<Option<RecordedGrade>, StoreError>;

    /// All-or-nothing bulk insert.
    async fn insert_notifications(
        &self,
        rows: Vec<CreateNotification>,
    ) -> Result<Vec<Notification>, StoreError>;
    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64), StoreError>;
    async fn count_unread_notifications(&self, user_id: &str) -> Result<i64, StoreError>;
    async fn mark_notification_read(
        &self,
        id: &str,
        user_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<Option<Notification>, StoreError>;
    async fn mark_all_notifications_read(
        &self,
        user_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<u64, StoreError>;
    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, StoreError>;

    async fn insert_token_transaction(
        &self,
        params: CreateTokenTransaction,
    ) -> Result<TokenTransaction, StoreError>;
    async fn token_balance(&self, user_id: &str) -> Result<i64, StoreError>;
    async fn list_token_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TokenTransaction>, StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Unavailable("connection pool is closed".to_string()));
        }
        Ok(health::ping(&self.pool).await?)
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(users::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(users::find_by_email(&self.pool, email).await?)
    }

    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>, StoreError> {
        Ok(users::find_many(&self.pool, ids).await?)
    }

    async fn list_active_users(&self, role: Option<UserRole>) -> Result<Vec<User>, StoreError> {
        Ok(users::list_active(&self.pool, role).await?)
    }

    async fn create_user(&self, params: CreateUser) -> Result<User, StoreError> {
        Ok(users::create(&self.pool, params).await?)
    }

    async fn update_user(&self, id: &str, params: UpdateUser) -> Result<(), StoreError> {
        Ok(users::update(&self.pool, id, params).await?)
    }

    async fn create_course(&self, params: CreateCourse) -> Result<Course, StoreError> {
        Ok(courses::create(&self.pool, params).await?)
    }

    async fn find_course(&self, id: &str) -> Result<Option<Course>, StoreError> {
        Ok(courses::find_by_id(&self.pool, id).await?)
    }

    async fn find_course_by_code(&self, code: &str) -> Result<Option<Course>, StoreError> {
        Ok(courses::find_by_code(&self.pool, code).await?)
    }

    async fn upsert_enrollment(
        &self,
        course_id: &str,
        student_id: &str,
        status: EnrollmentStatus,
        now: PrimitiveDateTime,
    ) -> Result<Enrollment, StoreError> {
        Ok(enrollments::upsert(&self.pool, course_id, student_id, status, now).await?)
    }

    async fn find_enrollment(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(enrollments::find(&self.pool, course_id, student_id).await?)
    }

    async fn list_active_students(&self, course_id: &str) -> Result<Vec<User>, StoreError> {
        Ok(enrollments::list_active_students(&self.pool, course_id).await?)
    }

    async fn create_assignment(&self, params: CreateAssignment) -> Result<Assignment, StoreError> {
        Ok(assignments::create(&self.pool, params).await?)
    }

    async fn find_assignment(&self, id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(assignments::find_by_id(&self.pool, id).await?)
    }

    async fn list_assignments(
        &self,
        course_id: &str,
        statuses: &[AssignmentStatus],
    ) -> Result<Vec<Assignment>, StoreError> {
        Ok(assignments::list_for_course(&self.pool, course_id, statuses).await?)
    }

    async fn transition_assignment(
        &self,
        id: &str,
        from: AssignmentStatus,
        to: AssignmentStatus,
        now: PrimitiveDateTime,
    ) -> Result<Option<Assignment>, StoreError> {
        Ok(assignments::transition(&self.pool, id, from, to, now).await?)
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::find_by_id(&self.pool, id).await?)
    }

    async fn find_submission_for(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::find_for_student(&self.pool, assignment_id, student_id).await?)
    }

    async fn list_submissions(&self, assignment_id: &str) -> Result<Vec<Submission>, StoreError> {
        Ok(submissions::list_for_assignment(&self.pool, assignment_id).await?)
    }

    async fn upsert_draft(
        &self,
        params: DraftSubmission,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::upsert_draft(&self.pool, params).await?)
    }

    async fn transition_submission(
        &self,
        id: &str,
        from: SubmissionStatus,
        to: SubmissionStatus,
        stamp: TransitionStamp,
        now: PrimitiveDateTime,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::transition(&self.pool, id, from, to, stamp, now).await?)
    }

    async fn find_grade(&self, submission_id: &str) -> Result<Option<Grade>, StoreError> {
        Ok(grades::find_by_submission(&self.pool, submission_id).await?)
    }

    async fn record_grade(&self, params: GradeWrite) -> Result<Option<RecordedGrade>, StoreError> {
        Ok(grades::record(&self.pool, params).await?)
    }

    async fn insert_notifications(
        &self,
        rows: Vec<CreateNotification>,
    ) -> Result<Vec<Notification>, StoreError> {
        Ok(notifications::insert_many(&self.pool, rows).await?)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64), StoreError> {
        let items =
            notifications::list_for_user(&self.pool, user_id, unread_only, skip, limit).await?;
        let total = notifications::count_for_user(&self.pool, user_id, unread_only).await?;
        Ok((items, total))
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(notifications::count_for_user(&self.pool, user_id, true).await?)
    }

    async fn mark_notification_read(
        &self,
        id: &str,
        user_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<Option<Notification>, StoreError> {
        Ok(notifications::mark_read(&self.pool, id, user_id, now).await?)
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<u64, StoreError> {
        Ok(notifications::mark_all_read(&self.pool, user_id, now).await?)
    }

    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        Ok(notifications::delete(&self.pool, id, user_id).await?)
    }

    async fn insert_token_transaction(
        &self,
        params: CreateTokenTransaction,
    ) -> Result<TokenTransaction, StoreError> {
        Ok(token_transactions::insert(&self.pool, params).await?)
    }

    async fn token_balance(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(token_transactions::balance(&self.pool, user_id).await?)
    }

    async fn list_token_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TokenTransaction>, StoreError> {
        Ok(token_transactions::list_recent(&self.pool, user_id, limit).await?)
    }
}
