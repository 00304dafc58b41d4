//! Access predicates over plain identifiers. Callers load whatever rows they
//! need and pass the relevant ids in.

use crate::db::types::{EnrollmentStatus, UserRole};

pub(crate) fn is_admin(role: UserRole) -> bool {
    role == UserRole::Admin
}

pub(crate) fn can_create_course(role: UserRole) -> bool {
    matches!(role, UserRole::Admin | UserRole::Teacher)
}

/// The course's own teacher or an admin.
pub(crate) fn can_manage_course(actor_id: &str, role: UserRole, course_teacher_id: &str) -> bool {
    is_admin(role) || (role == UserRole::Teacher && actor_id == course_teacher_id)
}

pub(crate) fn can_grade(actor_id: &str, role: UserRole, course_teacher_id: &str) -> bool {
    can_manage_course(actor_id, role, course_teacher_id)
}

/// Students may only act on their own enrollment; managers on anyone's.
pub(crate) fn can_change_enrollment(
    actor_id: &str,
    role: UserRole,
    student_id: &str,
    course_teacher_id: &str,
) -> bool {
    (role == UserRole::Student && actor_id == student_id)
        || can_manage_course(actor_id, role, course_teacher_id)
}

pub(crate) fn can_write_submission(actor_id: &str, role: UserRole, student_id: &str) -> bool {
    actor_id == student_id || is_admin(role)
}

pub(crate) fn can_view_submission(
    actor_id: &str,
    role: UserRole,
    student_id: &str,
    course_teacher_id: &str,
) -> bool {
    actor_id == student_id || can_manage_course(actor_id, role, course_teacher_id)
}

pub(crate) fn can_send_notifications(role: UserRole) -> bool {
    matches!(role, UserRole::Admin | UserRole::Teacher)
}

pub(crate) fn is_active_enrollment(status: Option<EnrollmentStatus>) -> bool {
    status == Some(EnrollmentStatus::Active)
}
