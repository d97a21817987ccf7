//! User Handlers
//!
//! Registration and profile updates. Users are the ownership boundary of
//! loans; nothing here touches balances.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::store::{LedgerStore, User};

use super::commands::validate_name;
use super::{require_user, CreateUserCommand, UpdateProfileCommand};

/// Handler for user creation
pub struct CreateUserHandler {
    store: LedgerStore,
}

impl CreateUserHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Execute the create user command
    pub async fn execute(
        &self,
        command: CreateUserCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        let (name, email) = command.validate()?;
        let user_id = command.user_id.unwrap_or_else(Uuid::new_v4);

        let user = self
            .store
            .insert_user(user_id, &name, &email, &command.currency)
            .await
            .map_err(|e| e.into_write_error(&email))?;

        tracing::info!(
            user_id = %user.id,
            currency = %user.currency.as_str(),
            correlation_id = ?context.correlation_id,
            "User created"
        );

        Ok(user)
    }
}

/// Handler for profile changes of the requesting user
pub struct UpdateProfileHandler {
    store: LedgerStore,
}

impl UpdateProfileHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: UpdateProfileCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        let user_id = require_user(context)?;
        let name = command.name.as_deref().map(validate_name).transpose()?;

        let user = self
            .store
            .update_user(user_id, name.as_deref(), command.currency.as_ref())
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        tracing::info!(
            user_id = %user.id,
            correlation_id = ?context.correlation_id,
            "Profile updated"
        );

        Ok(user)
    }
}
