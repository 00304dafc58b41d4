use uuid::Uuid;

use crate::core::config::Settings;
use crate::core::security;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories::users::{CreateUser, UpdateUser};
use crate::repositories::Store;

/// Creates the configured admin account, or repairs its password, role and
/// active flag when they drifted.
pub(crate) async fn ensure_superuser(store: &dyn Store, settings: &Settings) -> anyhow::Result<()> {
    let admin = settings.admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let email = admin.first_superuser_email.trim().to_ascii_lowercase();
    let now = primitive_now_utc();

    if let Some(user) = store.find_user_by_email(&email).await? {
        let verified =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);

        let update = UpdateUser {
            hashed_password: if verified {
                None
            } else {
                Some(security::hash_password(&admin.first_superuser_password)?)
            },
            role: (user.role != UserRole::Admin).then_some(UserRole::Admin),
            is_active: (!user.is_active).then_some(true),
            updated_at: now,
        };

        if update.hashed_password.is_some() || update.role.is_some() || update.is_active.is_some()
        {
            store.update_user(&user.id, update).await?;
            tracing::info!(email = %email, "Updated default superuser");
        } else {
            tracing::info!("Default superuser already up to date");
        }

        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)?;
    store
        .create_user(CreateUser {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            hashed_password,
            full_name: "Administrator".to_string(),
            role: UserRole::Admin,
            is_active: true,
            created_at: now,
        })
        .await?;

    tracing::info!(email = %email, "Created default superuser");
    Ok(())
}
