use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, Order, QueryOrder, QuerySelect,
    prelude::*,
    sea_query::{Func, LikeExpr, SimpleExpr},
};
use uuid::Uuid;

use super::{
    base::{FindOptions, Page, Repository},
    extends_repository,
};
use crate::{
    NewUser, RepositoryError, ResultRepo, User, UserRole, UserStatus,
    error::StorageContext,
    schema::{decode_label, users},
    util::like_pattern,
    validation::normalize_email,
};

/// Users: registration, lookup and the token-based account flows.
#[derive(Clone, Debug)]
pub struct UserRepository {
    base: Repository<User>,
}

extends_repository!(UserRepository, User);

impl UserRepository {
    /// Creates a user after checking the email is free.
    ///
    /// A concurrent registration with the same email still fails on the
    /// unique index, as [`RepositoryError::Conflict`].
    pub async fn register(&self, input: NewUser) -> ResultRepo<User> {
        let email = normalize_email(&input.email)?;
        if self.is_email_taken(&email, None).await? {
            return Err(RepositoryError::Validation(format!(
                "email already registered: {email}"
            )));
        }
        self.create(NewUser { email, ..input }).await
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(&self, email: &str) -> ResultRepo<Option<User>> {
        let email = email.trim().to_lowercase();
        self.find_one(Condition::all().add(users::Column::Email.eq(email)))
            .await
    }

    pub async fn is_email_taken(&self, email: &str, exclude: Option<Uuid>) -> ResultRepo<bool> {
        let mut condition =
            Condition::all().add(users::Column::Email.eq(email.trim().to_lowercase()));
        if let Some(id) = exclude {
            condition = condition.add(users::Column::Id.ne(id));
        }
        self.exists(condition).await
    }

    pub async fn find_by_status(&self, status: UserStatus) -> ResultRepo<Vec<User>> {
        self.find(
            FindOptions::filter(Condition::all().add(users::Column::Status.eq(status.as_str())))
                .order_by(users::Column::CreatedAt, Order::Asc),
        )
        .await
    }

    pub async fn find_by_role(&self, role: UserRole) -> ResultRepo<Vec<User>> {
        self.find(
            FindOptions::filter(Condition::all().add(users::Column::Role.eq(role.as_str())))
                .order_by(users::Column::CreatedAt, Order::Asc),
        )
        .await
    }

    pub async fn find_active(&self) -> ResultRepo<Vec<User>> {
        self.find_by_status(UserStatus::Active).await
    }

    /// Number of users per status; statuses without users are omitted.
    pub async fn count_by_status(&self) -> ResultRepo<Vec<(UserStatus, u64)>> {
        let rows: Vec<(String, i64)> = users::Entity::find()
            .select_only()
            .column(users::Column::Status)
            .column_as(Expr::col(users::Column::Id).count(), "count")
            .group_by(users::Column::Status)
            .order_by_asc(users::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await
            .context("count users by status")?;

        rows.into_iter()
            .map(|(status, count)| {
                let status = decode_label(&status, "user", "status")?;
                Ok((status, u64::try_from(count).unwrap_or_default()))
            })
            .collect()
    }

    /// Paginated search over first name, last name and email.
    pub async fn search(&self, query: &str, page: u64, limit: u64) -> ResultRepo<Page<User>> {
        let pattern = like_pattern(query);
        let matches = |column: users::Column| {
            Expr::expr(Func::lower(Expr::col(column)))
                .like(LikeExpr::new(pattern.clone()).escape('\\'))
        };
        let condition = Condition::any()
            .add(matches(users::Column::FirstName))
            .add(matches(users::Column::LastName))
            .add(matches(users::Column::Email));
        self.find_with_pagination(
            page,
            limit,
            FindOptions::filter(condition).order_by(users::Column::Email, Order::Asc),
        )
        .await
    }

    async fn update_where(
        &self,
        operation: &str,
        filter: SimpleExpr,
        values: Vec<(users::Column, SimpleExpr)>,
    ) -> ResultRepo<bool> {
        Ok(self.set_columns(&self.db, operation, filter, values).await? > 0)
    }

    pub async fn touch_last_login(&self, id: Uuid) -> ResultRepo<bool> {
        self.update_where(
            "touch last login",
            users::Column::Id.eq(id),
            vec![(users::Column::LastLoginAt, Expr::value(Utc::now()))],
        )
        .await
    }

    pub async fn set_email_verification_token(&self, id: Uuid, token: &str) -> ResultRepo<bool> {
        let token = required_token(token)?;
        self.update_where(
            "set verification token",
            users::Column::Id.eq(id),
            vec![(users::Column::EmailVerificationToken, Expr::value(token))],
        )
        .await
    }

    /// Marks the email verified and consumes the token. `None` when no user
    /// holds this token.
    pub async fn verify_email(&self, token: &str) -> ResultRepo<Option<User>> {
        let token = required_token(token)?;
        let Some(user) = self
            .find_one(Condition::all().add(users::Column::EmailVerificationToken.eq(token.clone())))
            .await?
        else {
            return Ok(None);
        };

        let consumed = self
            .update_where(
                "verify email",
                users::Column::Id
                    .eq(user.id)
                    .and(users::Column::EmailVerificationToken.eq(token)),
                vec![
                    (users::Column::EmailVerifiedAt, Expr::value(Utc::now())),
                    (
                        users::Column::EmailVerificationToken,
                        Expr::value(Option::<String>::None),
                    ),
                ],
            )
            .await?;
        if !consumed {
            return Ok(None);
        }
        self.find_by_id(user.id).await
    }

    /// Stores a reset token for the user with this email. False when the
    /// email is unknown.
    pub async fn set_password_reset_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> ResultRepo<bool> {
        let token = required_token(token)?;
        self.update_where(
            "set password reset token",
            users::Column::Email.eq(email.trim().to_lowercase()),
            vec![
                (users::Column::PasswordResetToken, Expr::value(token)),
                (users::Column::PasswordResetExpiresAt, Expr::value(expires_at)),
            ],
        )
        .await
    }

    /// The user holding this token, if it has not expired yet.
    pub async fn find_by_password_reset_token(&self, token: &str) -> ResultRepo<Option<User>> {
        let token = required_token(token)?;
        self.find_one(
            Condition::all()
                .add(users::Column::PasswordResetToken.eq(token))
                .add(users::Column::PasswordResetExpiresAt.gt(Utc::now())),
        )
        .await
    }

    /// Replaces the password hash when the token is valid and clears the
    /// token so it cannot be replayed.
    pub async fn reset_password(
        &self,
        token: &str,
        password_hash: &str,
    ) -> ResultRepo<Option<User>> {
        if password_hash.trim().is_empty() {
            return Err(RepositoryError::Validation(
                "password hash must not be empty".to_string(),
            ));
        }
        let Some(user) = self.find_by_password_reset_token(token).await? else {
            return Ok(None);
        };

        let reset = self
            .update_where(
                "reset password",
                users::Column::Id
                    .eq(user.id)
                    .and(users::Column::PasswordResetToken.eq(token.trim())),
                vec![
                    (users::Column::PasswordHash, Expr::value(password_hash)),
                    (
                        users::Column::PasswordResetToken,
                        Expr::value(Option::<String>::None),
                    ),
                    (
                        users::Column::PasswordResetExpiresAt,
                        Expr::value(Option::<DateTime<Utc>>::None),
                    ),
                ],
            )
            .await?;
        if !reset {
            return Ok(None);
        }
        self.find_by_id(user.id).await
    }
}

fn required_token(token: &str) -> ResultRepo<String> {
    let token = token.trim();
    if token.is_empty() {
        return Err(RepositoryError::Validation(
            "token must not be empty".to_string(),
        ));
    }
    Ok(token.to_string())
}
