use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use super::{decode_json, decode_label, encode_json};
use crate::{
    MoneyCents, NewTransaction, ResultRepo, Transaction, TransactionPatch,
    ops::base::Record,
    validation::{
        validate_new_transaction, validate_transaction_patch, validate_transaction_record,
    },
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    /// Non-negative, minor units.
    pub amount: i64,
    pub transaction_type: String,
    pub status: String,
    pub source: String,
    pub date: Date,
    pub authorized_date: Option<Date>,
    pub description: String,
    pub merchant_name: Option<String>,
    pub original_description: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub tags: Json,
    pub location: Option<Json>,
    pub split: Option<Json>,
    pub external_id: Option<String>,
    pub provider_metadata: Option<Json>,
    pub is_hidden: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn encode_optional<T: serde::Serialize>(
    value: Option<&T>,
    field: &str,
) -> ResultRepo<Option<Json>> {
    value.map(|v| encode_json(v, field)).transpose()
}

impl Record for Transaction {
    type Entity = Entity;
    type Model = Model;
    type ActiveModel = ActiveModel;
    type New = NewTransaction;
    type Patch = TransactionPatch;

    const NAME: &'static str = "transaction";

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
        Ok(Transaction {
            id: model.id,
            account_id: model.account_id,
            category_id: model.category_id,
            amount: MoneyCents::new(model.amount),
            transaction_type: decode_label(&model.transaction_type, Self::NAME, "transaction_type")?,
            status: decode_label(&model.status, Self::NAME, "status")?,
            source: decode_label(&model.source, Self::NAME, "source")?,
            date: model.date,
            authorized_date: model.authorized_date,
            description: model.description,
            merchant_name: model.merchant_name,
            original_description: model.original_description,
            currency: decode_label(&model.currency, Self::NAME, "currency")?,
            notes: model.notes,
            tags: decode_json(model.tags, Self::NAME, "tags")?,
            location: model
                .location
                .map(|v| decode_json(v, Self::NAME, "location"))
                .transpose()?,
            split: model
                .split
                .map(|v| decode_json(v, Self::NAME, "split"))
                .transpose()?,
            external_id: model.external_id,
            provider_metadata: model.provider_metadata,
            is_hidden: model.is_hidden,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn to_active_model(&self) -> ResultRepo<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id),
            account_id: ActiveValue::Set(self.account_id),
            category_id: ActiveValue::Set(self.category_id),
            amount: ActiveValue::Set(self.amount.cents()),
            transaction_type: ActiveValue::Set(self.transaction_type.as_str().to_string()),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            source: ActiveValue::Set(self.source.as_str().to_string()),
            date: ActiveValue::Set(self.date),
            authorized_date: ActiveValue::Set(self.authorized_date),
            description: ActiveValue::Set(self.description.clone()),
            merchant_name: ActiveValue::Set(self.merchant_name.clone()),
            original_description: ActiveValue::Set(self.original_description.clone()),
            currency: ActiveValue::Set(self.currency.code().to_string()),
            notes: ActiveValue::Set(self.notes.clone()),
            tags: ActiveValue::Set(encode_json(&self.tags, "tags")?),
            location: ActiveValue::Set(encode_optional(self.location.as_ref(), "location")?),
            split: ActiveValue::Set(encode_optional(self.split.as_ref(), "split")?),
            external_id: ActiveValue::Set(self.external_id.clone()),
            provider_metadata: ActiveValue::Set(self.provider_metadata.clone()),
            is_hidden: ActiveValue::Set(self.is_hidden),
            created_at: ActiveValue::Set(self.created_at),
            updated_at: ActiveValue::Set(self.updated_at),
        })
    }

    fn validate_record(&self) -> ResultRepo<()> {
        validate_transaction_record(self)
    }

    fn new_active_model(input: NewTransaction) -> ResultRepo<ActiveModel> {
        let input = validate_new_transaction(input)?;
        Ok(ActiveModel {
            account_id: ActiveValue::Set(input.account_id),
            category_id: ActiveValue::Set(input.category_id),
            amount: ActiveValue::Set(input.amount.cents()),
            transaction_type: ActiveValue::Set(input.transaction_type.as_str().to_string()),
            status: ActiveValue::Set(input.status.as_str().to_string()),
            source: ActiveValue::Set(input.source.as_str().to_string()),
            date: ActiveValue::Set(input.date),
            authorized_date: ActiveValue::Set(input.authorized_date),
            description: ActiveValue::Set(input.description),
            merchant_name: ActiveValue::Set(input.merchant_name),
            original_description: ActiveValue::Set(input.original_description),
            currency: ActiveValue::Set(input.currency.code().to_string()),
            notes: ActiveValue::Set(input.notes),
            tags: ActiveValue::Set(encode_json(&input.tags, "tags")?),
            location: ActiveValue::Set(encode_optional(input.location.as_ref(), "location")?),
            split: ActiveValue::Set(encode_optional(input.split.as_ref(), "split")?),
            external_id: ActiveValue::Set(input.external_id),
            provider_metadata: ActiveValue::Set(input.provider_metadata),
            is_hidden: ActiveValue::Set(input.is_hidden),
            ..Default::default()
        })
    }

    fn patch_active_model(patch: TransactionPatch) -> ResultRepo<ActiveModel> {
        let patch = validate_transaction_patch(patch)?;
        let mut active = <ActiveModel as Default>::default();
        if let Some(category_id) = patch.category_id {
            active.category_id = ActiveValue::Set(category_id);
        }
        if let Some(amount) = patch.amount {
            active.amount = ActiveValue::Set(amount.cents());
        }
        if let Some(tx_type) = patch.transaction_type {
            active.transaction_type = ActiveValue::Set(tx_type.as_str().to_string());
        }
        if let Some(status) = patch.status {
            active.status = ActiveValue::Set(status.as_str().to_string());
        }
        if let Some(date) = patch.date {
            active.date = ActiveValue::Set(date);
        }
        if let Some(authorized_date) = patch.authorized_date {
            active.authorized_date = ActiveValue::Set(authorized_date);
        }
        if let Some(description) = patch.description {
            active.description = ActiveValue::Set(description);
        }
        if let Some(merchant_name) = patch.merchant_name {
            active.merchant_name = ActiveValue::Set(merchant_name);
        }
        if let Some(notes) = patch.notes {
            active.notes = ActiveValue::Set(notes);
        }
        if let Some(tags) = patch.tags {
            active.tags = ActiveValue::Set(encode_json(&tags, "tags")?);
        }
        if let Some(location) = patch.location {
            active.location = ActiveValue::Set(encode_optional(location.as_ref(), "location")?);
        }
        if let Some(split) = patch.split {
            active.split = ActiveValue::Set(encode_optional(split.as_ref(), "split")?);
        }
        if let Some(metadata) = patch.provider_metadata {
            active.provider_metadata = ActiveValue::Set(metadata);
        }
        if let Some(hidden) = patch.is_hidden {
            active.is_hidden = ActiveValue::Set(hidden);
        }
        Ok(active)
    }
}
