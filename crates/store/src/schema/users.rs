use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use super::{decode_json, decode_label, encode_json};
use crate::{
    NewUser, ResultRepo, User, UserPatch,
    ops::base::Record,
    validation::{validate_new_user, validate_user_patch, validate_user_record},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub status: String,
    pub preferences: Json,
    pub last_login_at: Option<DateTimeUtc>,
    pub email_verified_at: Option<DateTimeUtc>,
    pub email_verification_token: Option<String>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::accounts::Entity")]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Record for User {
    type Entity = Entity;
    type Model = Model;
    type ActiveModel = ActiveModel;
    type New = NewUser;
    type Patch = UserPatch;

    const NAME: &'static str = "user";

    fn id_column() -> Column {
        Column::Id
    }

    fn created_at_column() -> Column {
        Column::CreatedAt
    }

    fn updated_at_column() -> Column {
        Column::UpdatedAt
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_model(model: Model) -> ResultRepo<Self> {
        Ok(User {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            first_name: model.first_name,
            last_name: model.last_name,
            role: decode_label(&model.role, Self::NAME, "role")?,
            status: decode_label(&model.status, Self::NAME, "status")?,
            preferences: decode_json(model.preferences, Self::NAME, "preferences")?,
            last_login_at: model.last_login_at,
            email_verified_at: model.email_verified_at,
            email_verification_token: model.email_verification_token,
            password_reset_token: model.password_reset_token,
            password_reset_expires_at: model.password_reset_expires_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn to_active_model(&self) -> ResultRepo<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id),
            email: ActiveValue::Set(self.email.trim().to_lowercase()),
            password_hash: ActiveValue::Set(self.password_hash.clone()),
            first_name: ActiveValue::Set(self.first_name.clone()),
            last_name: ActiveValue::Set(self.last_name.clone()),
            role: ActiveValue::Set(self.role.as_str().to_string()),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            preferences: ActiveValue::Set(encode_json(&self.preferences, "preferences")?),
            last_login_at: ActiveValue::Set(self.last_login_at),
            email_verified_at: ActiveValue::Set(self.email_verified_at),
            email_verification_token: ActiveValue::Set(self.email_verification_token.clone()),
            password_reset_token: ActiveValue::Set(self.password_reset_token.clone()),
            password_reset_expires_at: ActiveValue::Set(self.password_reset_expires_at),
            created_at: ActiveValue::Set(self.created_at),
            updated_at: ActiveValue::Set(self.updated_at),
        })
    }

    fn validate_record(&self) -> ResultRepo<()> {
        validate_user_record(self)
    }

    fn new_active_model(input: NewUser) -> ResultRepo<ActiveModel> {
        let input = validate_new_user(input)?;
        Ok(ActiveModel {
            email: ActiveValue::Set(input.email),
            password_hash: ActiveValue::Set(input.password_hash),
            first_name: ActiveValue::Set(input.first_name),
            last_name: ActiveValue::Set(input.last_name),
            role: ActiveValue::Set(input.role.as_str().to_string()),
            status: ActiveValue::Set(crate::UserStatus::Active.as_str().to_string()),
            preferences: ActiveValue::Set(encode_json(&input.preferences, "preferences")?),
            last_login_at: ActiveValue::Set(None),
            email_verified_at: ActiveValue::Set(None),
            email_verification_token: ActiveValue::Set(None),
            password_reset_token: ActiveValue::Set(None),
            password_reset_expires_at: ActiveValue::Set(None),
            ..Default::default()
        })
    }

    fn patch_active_model(patch: UserPatch) -> ResultRepo<ActiveModel> {
        let patch = validate_user_patch(patch)?;
        let mut active = <ActiveModel as Default>::default();
        if let Some(email) = patch.email {
            active.email = ActiveValue::Set(email);
        }
        if let Some(hash) = patch.password_hash {
            active.password_hash = ActiveValue::Set(hash);
        }
        if let Some(first_name) = patch.first_name {
            active.first_name = ActiveValue::Set(first_name);
        }
        if let Some(last_name) = patch.last_name {
            active.last_name = ActiveValue::Set(last_name);
        }
        if let Some(role) = patch.role {
            active.role = ActiveValue::Set(role.as_str().to_string());
        }
        if let Some(status) = patch.status {
            active.status = ActiveValue::Set(status.as_str().to_string());
        }
        if let Some(preferences) = patch.preferences {
            active.preferences = ActiveValue::Set(encode_json(&preferences, "preferences")?);
        }
        Ok(active)
    }
}
