use serde_json::json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::format_primitive;
use crate::db::models::{Assignment, Course, User};
use crate::db::types::{AssignmentStatus, NotificationKind, NotificationPriority, UserRole};
use crate::repositories::assignments::CreateAssignment;
use crate::services::authorization;
use crate::services::courses::load_course;
use crate::services::errors::{StoreResultExt, WorkflowError};
use crate::services::notifications::{Dispatched, NotificationDraft, Recipients};

#[derive(Debug, Clone)]
pub(crate) struct NewAssignment {
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) due_date: PrimitiveDateTime,
    pub(crate) max_points: f64,
    pub(crate) allow_late_submission: bool,
    pub(crate) late_penalty_rate: f64,
}

#[derive(Debug)]
pub(crate) struct Published {
    pub(crate) assignment: Assignment,
    pub(crate) notified: Option<Dispatched>,
}

pub(crate) async fn load_assignment(
    state: &AppState,
    assignment_id: &str,
) -> Result<Assignment, WorkflowError> {
    state
        .store()
        .find_assignment(assignment_id)
        .await
        .persistence("Failed to load assignment")?
        .ok_or_else(|| WorkflowError::not_found("Assignment not found"))
}

/// Loads the assignment and its course, requiring the actor to manage it.
pub(crate) async fn load_managed(
    state: &AppState,
    actor: &User,
    assignment_id: &str,
) -> Result<(Assignment, Course), WorkflowError> {
    let assignment = load_assignment(state, assignment_id).await?;
    let course = load_course(state, &assignment.course_id).await?;
    if !authorization::can_manage_course(&actor.id, actor.role, &course.teacher_id) {
        return Err(WorkflowError::forbidden(
            "Only the course teacher can manage this assignment",
        ));
    }
    Ok((assignment, course))
}

pub(crate) async fn create_assignment(
    state: &AppState,
    actor: &User,
    input: NewAssignment,
    now: PrimitiveDateTime,
) -> Result<Assignment, WorkflowError> {
    if !(input.max_points > 0.0) || !input.max_points.is_finite() {
        return Err(WorkflowError::validation("max_points must be positive"));
    }
    if !(0.0..=100.0).contains(&input.late_penalty_rate) {
        return Err(WorkflowError::validation("late_penalty_rate must be between 0 and 100"));
    }

    let course = load_course(state, &input.course_id).await?;
    if !authorization::can_manage_course(&actor.id, actor.role, &course.teacher_id) {
        return Err(WorkflowError::forbidden("Only the course teacher can create assignments"));
    }

    let assignment = state
        .store()
        .create_assignment(CreateAssignment {
            id: Uuid::new_v4().to_string(),
            course_id: course.id,
            title: input.title.trim().to_string(),
            description: input.description,
            due_date: input.due_date,
            max_points: input.max_points,
            allow_late_submission: input.allow_late_submission,
            late_penalty_rate: input.late_penalty_rate,
            created_by: actor.id.clone(),
            created_at: now,
        })
        .await
        .persistence("Failed to create assignment")?;

    tracing::info!(
        assignment_id = %assignment.id,
        course_id = %assignment.course_id,
        "Assignment created"
    );
    Ok(assignment)
}

/// Managers see every assignment; active students only published or closed
/// ones.
pub(crate) async fn visible_assignment(
    state: &AppState,
    actor: &User,
    assignment_id: &str,
) -> Result<Assignment, WorkflowError> {
    let assignment = load_assignment(state, assignment_id).await?;
    let statuses = visible_statuses(state, actor, &assignment.course_id).await?;
    if !statuses.contains(&assignment.status) {
        return Err(WorkflowError::not_found("Assignment not found"));
    }
    Ok(assignment)
}

pub(crate) async fn list_for_course(
    state: &AppState,
    actor: &User,
    course_id: &str,
) -> Result<Vec<Assignment>, WorkflowError> {
    let statuses = visible_statuses(state, actor, course_id).await?;
    state
        .store()
        .list_assignments(course_id, statuses)
        .await
        .persistence("Failed to list assignments")
}

async fn visible_statuses(
    state: &AppState,
    actor: &User,
    course_id: &str,
) -> Result<&'static [AssignmentStatus], WorkflowError> {
    const ALL: &[AssignmentStatus] =
        &[AssignmentStatus::Draft, AssignmentStatus::Published, AssignmentStatus::Closed];
    const OPENED: &[AssignmentStatus] = &[AssignmentStatus::Published, AssignmentStatus::Closed];

    let course = load_course(state, course_id).await?;
    if authorization::can_manage_course(&actor.id, actor.role, &course.teacher_id) {
        return Ok(ALL);
    }

    if actor.role == UserRole::Student {
        let enrollment = state
            .store()
            .find_enrollment(&course.id, &actor.id)
            .await
            .persistence("Failed to load enrollment")?;
        if authorization::is_active_enrollment(enrollment.map(|enrollment| enrollment.status)) {
            return Ok(OPENED);
        }
    }

    Err(WorkflowError::forbidden("Not enrolled in this course"))
}

/// draft -> published, then tells every actively enrolled student.
pub(crate) async fn publish(
    state: &AppState,
    actor: &User,
    assignment_id: &str,
    now: PrimitiveDateTime,
) -> Result<Published, WorkflowError> {
    let (assignment, course) = load_managed(state, actor, assignment_id).await?;
    if assignment.status != AssignmentStatus::Draft {
        return Err(WorkflowError::conflict("Only draft assignments can be published"));
    }

    let assignment = state
        .store()
        .transition_assignment(
            &assignment.id,
            AssignmentStatus::Draft,
            AssignmentStatus::Published,
            now,
        )
        .await
        .persistence("Failed to publish assignment")?
        .ok_or_else(|| WorkflowError::conflict("Assignment was changed concurrently"))?;

    tracing::info!(
        assignment_id = %assignment.id,
        course_id = %course.id,
        "Assignment published"
    );

    let draft = NotificationDraft::new(
        NotificationKind::Assignment,
        format!("New assignment: {}", assignment.title),
        format!(
            "A new assignment was published in {} and is due {} UTC.",
            course.title,
            format_primitive(assignment.due_date)
        ),
    )
    .priority(NotificationPriority::High)
    .metadata(json!({ "assignment_id": assignment.id, "course_id": course.id }));

    let notified = match state
        .dispatcher()
        .dispatch(Recipients::CourseStudents(course.id.clone()), draft, now)
        .await
    {
        Ok(dispatched) => Some(dispatched),
        Err(err) => {
            tracing::error!(
                error = %err,
                assignment_id = %assignment.id,
                "Assignment published without notifications"
            );
            None
        }
    };

    Ok(Published { assignment, notified })
}

/// published -> closed. Closed assignments accept no further content.
pub(crate) async fn close(
    state: &AppState,
    actor: &User,
    assignment_id: &str,
    now: PrimitiveDateTime,
) -> Result<Assignment, WorkflowError> {
    let (assignment, _) = load_managed(state, actor, assignment_id).await?;
    if assignment.status != AssignmentStatus::Published {
        return Err(WorkflowError::conflict("Only published assignments can be closed"));
    }

    let assignment = state
        .store()
        .transition_assignment(
            &assignment.id,
            AssignmentStatus::Published,
            AssignmentStatus::Closed,
            now,
        )
        .await
        .persistence("Failed to close assignment")?
        .ok_or_else(|| WorkflowError::conflict("Assignment was changed concurrently"))?;

    tracing::info!(assignment_id = %assignment.id, "Assignment closed");
    Ok(assignment)
}
