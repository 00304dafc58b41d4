pub(crate) mod assignments;
pub(crate) mod auth;
pub(crate) mod courses;
pub(crate) mod errors;
pub(crate) mod grades;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod notifications;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod submissions;
pub(crate) mod users;
pub(crate) mod validation;
