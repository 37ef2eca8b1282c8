use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use super::decode_label;
use crate::{
    Account, AccountPatch, AccountStatus, MoneyCents, NewAccount, ProviderLink, ResultRepo,
    ops::base::Record,
    validation::{validate_account_patch, validate_account_record, validate_new_account},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub account_type: String,
    pub status: String,
    pub source: String,
    pub currency: String,
    /// Minor units.
    pub current_balance: i64,
    pub available_balance: Option<i64>,
    pub credit_limit: Option<i64>,
    pub sync_enabled: bool,
    pub last_sync_at: Option<DateTimeUtc>,
    pub sync_error: Option<String>,
    #[sea_orm(unique)]
    pub provider_account_id: Option<String>,
    pub provider_item_id: Option<String>,
    pub institution_name: Option<String>,
    pub mask: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn provider_link(model: &Model) -> Option<ProviderLink> {
    model.provider_account_id.as_ref().map(|account_id| ProviderLink {
        account_id: account_id.clone(),
        item_id: model.provider_item_id.clone(),
        institution_name: model.institution_name.clone(),
        mask: model.mask.clone(),
    })
}

fn set_provider(active: &mut ActiveModel, provider: Option<ProviderLink>) {
    let provider = provider.unwrap_or_default();
    let account_id = Some(provider.account_id).filter(|id| !id.trim().is_empty());
    active.provider_account_id = ActiveValue::Set(account_id);
    active.provider_item_id = ActiveValue::Set(provider.item_id);
    active.institution_name = ActiveValue::Set(provider.institution_name);
    active.mask = ActiveValue::Set(provider.mask);
}

impl Record for Account {
    type Entity = Entity;
    type Model = Model;
    type ActiveModel = ActiveModel;
    type New = NewAccount;
    type Patch = AccountPatch;

    const NAME: &'static str = "account";

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
        let provider = provider_link(&model);
        Ok(Account {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            account_type: decode_label(&model.account_type, Self::NAME, "account_type")?,
            status: decode_label(&model.status, Self::NAME, "status")?,
            source: decode_label(&model.source, Self::NAME, "source")?,
            currency: decode_label(&model.currency, Self::NAME, "currency")?,
            current_balance: MoneyCents::new(model.current_balance),
            available_balance: model.available_balance.map(MoneyCents::new),
            credit_limit: model.credit_limit.map(MoneyCents::new),
            sync_enabled: model.sync_enabled,
            last_sync_at: model.last_sync_at,
            sync_error: model.sync_error,
            provider,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn to_active_model(&self) -> ResultRepo<ActiveModel> {
        let mut active = ActiveModel {
            id: ActiveValue::Set(self.id),
            user_id: ActiveValue::Set(self.user_id),
            name: ActiveValue::Set(self.name.clone()),
            account_type: ActiveValue::Set(self.account_type.as_str().to_string()),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            source: ActiveValue::Set(self.source.as_str().to_string()),
            currency: ActiveValue::Set(self.currency.code().to_string()),
            current_balance: ActiveValue::Set(self.current_balance.cents()),
            available_balance: ActiveValue::Set(self.available_balance.map(MoneyCents::cents)),
            credit_limit: ActiveValue::Set(self.credit_limit.map(MoneyCents::cents)),
            sync_enabled: ActiveValue::Set(self.sync_enabled),
            last_sync_at: ActiveValue::Set(self.last_sync_at),
            sync_error: ActiveValue::Set(self.sync_error.clone()),
            created_at: ActiveValue::Set(self.created_at),
            updated_at: ActiveValue::Set(self.updated_at),
            ..Default::default()
        };
        set_provider(&mut active, self.provider.clone());
        Ok(active)
    }

    fn validate_record(&self) -> ResultRepo<()> {
        validate_account_record(self)
    }

    fn new_active_model(input: NewAccount) -> ResultRepo<ActiveModel> {
        let input = validate_new_account(input)?;
        let mut active = ActiveModel {
            user_id: ActiveValue::Set(input.user_id),
            name: ActiveValue::Set(input.name),
            account_type: ActiveValue::Set(input.account_type.as_str().to_string()),
            status: ActiveValue::Set(AccountStatus::Active.as_str().to_string()),
            source: ActiveValue::Set(input.source.as_str().to_string()),
            currency: ActiveValue::Set(input.currency.code().to_string()),
            current_balance: ActiveValue::Set(input.current_balance.cents()),
            available_balance: ActiveValue::Set(input.available_balance.map(MoneyCents::cents)),
            credit_limit: ActiveValue::Set(input.credit_limit.map(MoneyCents::cents)),
            sync_enabled: ActiveValue::Set(input.sync_enabled),
            last_sync_at: ActiveValue::Set(None),
            sync_error: ActiveValue::Set(None),
            ..Default::default()
        };
        set_provider(&mut active, input.provider);
        Ok(active)
    }

    fn patch_active_model(patch: AccountPatch) -> ResultRepo<ActiveModel> {
        let patch = validate_account_patch(patch)?;
        let mut active = <ActiveModel as Default>::default();
        if let Some(name) = patch.name {
            active.name = ActiveValue::Set(name);
        }
        if let Some(account_type) = patch.account_type {
            active.account_type = ActiveValue::Set(account_type.as_str().to_string());
        }
        if let Some(status) = patch.status {
            active.status = ActiveValue::Set(status.as_str().to_string());
        }
        if let Some(limit) = patch.credit_limit {
            active.credit_limit = ActiveValue::Set(limit.map(MoneyCents::cents));
        }
        if let Some(enabled) = patch.sync_enabled {
            active.sync_enabled = ActiveValue::Set(enabled);
        }
        Ok(active)
    }
}
