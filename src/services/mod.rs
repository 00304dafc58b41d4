pub(crate) mod assignments;
pub(crate) mod authorization;
pub(crate) mod best_effort;
pub(crate) mod courses;
pub(crate) mod errors;
pub(crate) mod grading;
pub(crate) mod mailer;
pub(crate) mod notifications;
pub(crate) mod rewards;
pub(crate) mod submissions;
