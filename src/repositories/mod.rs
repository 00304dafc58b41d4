pub(crate) mod assignments;
pub(crate) mod courses;
pub(crate) mod enrollments;
pub(crate) mod grades;
pub(crate) mod health;
pub(crate) mod notifications;
pub(crate) mod store;
pub(crate) mod submissions;
pub(crate) mod token_transactions;
pub(crate) mod users;

pub(crate) use store::{PgStore, Store, StoreError};
