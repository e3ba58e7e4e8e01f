//! User accounts, device binding and tracking consent.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use db::models::{
    user::{self, Model as User},
    User as UserEntity,
};
use log::info;
use rand::rngs::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::{ServiceError, ServiceResult};
use crate::tracking_service::find_user;

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub struct UserService;

impl UserService {
    pub async fn create_user(db: &DatabaseConnection, params: CreateUser) -> ServiceResult<User> {
        if params.name.trim().is_empty() {
            return Err(ServiceError::validation("name", "cannot be empty"));
        }
        if params.email.trim().is_empty() {
            return Err(ServiceError::validation("email", "cannot be empty"));
        }
        if params.password.is_empty() {
            return Err(ServiceError::validation("password", "cannot be empty"));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(params.password.as_bytes(), &salt)
            .map_err(|e| ServiceError::validation("password", format!("hashing failed: {e}")))?
            .to_string();

        let now = Utc::now();
        let created = user::ActiveModel {
            name: Set(params.name),
            email: Set(params.email),
            password_hash: Set(hash),
            is_punched_in: Set(false),
            tracking_consent: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("created user {} ({})", created.id, created.email);
        Ok(created)
    }

    pub async fn find_by_id(db: &DatabaseConnection, user_id: i64) -> ServiceResult<User> {
        find_user(db, user_id).await
    }

    /// Returns the user when the email/password pair checks out, `None` for
    /// a wrong password, `NotFound` for an unknown email.
    pub async fn verify_credentials(
        db: &DatabaseConnection,
        email: &str,
        password: &str,
    ) -> ServiceResult<Option<User>> {
        let found = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;

        let parsed = PasswordHash::new(&found.password_hash)
            .map_err(|e| ServiceError::validation("password", format!("corrupt hash: {e}")))?;
        let ok = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();

        Ok(ok.then_some(found))
    }

    /// Binds the reporting device to the account.
    pub async fn register_device(
        db: &DatabaseConnection,
        user_id: i64,
        android_id: String,
        device_model: Option<String>,
    ) -> ServiceResult<User> {
        if android_id.trim().is_empty() {
            return Err(ServiceError::validation("android_id", "cannot be empty"));
        }

        let user = find_user(db, user_id).await?;
        let mut am: user::ActiveModel = user.into();
        am.android_id = Set(Some(android_id));
        am.device_model = Set(device_model);
        am.updated_at = Set(Utc::now());
        Ok(am.update(db).await?)
    }

    /// Records or withdraws tracking consent; `consented_at` holds the
    /// moment consent was last granted.
    pub async fn save_consent(
        db: &DatabaseConnection,
        user_id: i64,
        consented: bool,
    ) -> ServiceResult<User> {
        let user = find_user(db, user_id).await?;
        let now = Utc::now();
        let mut am: user::ActiveModel = user.into();
        am.tracking_consent = Set(consented);
        am.consented_at = Set(consented.then_some(now));
        am.updated_at = Set(now);
        Ok(am.update(db).await?)
    }
}
