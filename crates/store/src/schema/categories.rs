use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use super::{decode_json, decode_label, encode_json};
use crate::{
    Category, CategoryPatch, CategoryStatus, NewCategory, RepositoryError, ResultRepo,
    ops::base::Record,
    validation::{validate_category_patch, validate_category_record, validate_new_category},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub category_type: String,
    pub status: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_default: bool,
    pub is_system: bool,
    pub sort_order: i32,
    pub parent_id: Option<Uuid>,
    pub rules: Json,
    pub metadata: Json,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Parent,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Record for Category {
    type Entity = Entity;
    type Model = Model;
    type ActiveModel = ActiveModel;
    type New = NewCategory;
    type Patch = CategoryPatch;

    const NAME: &'static str = "category";

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
        Ok(Category {
            id: model.id,
            name: model.name,
            slug: model.slug,
            category_type: decode_label(&model.category_type, Self::NAME, "category_type")?,
            status: decode_label(&model.status, Self::NAME, "status")?,
            color: model.color,
            icon: model.icon,
            is_default: model.is_default,
            is_system: model.is_system,
            sort_order: model.sort_order,
            parent_id: model.parent_id,
            rules: decode_json(model.rules, Self::NAME, "rules")?,
            metadata: decode_json(model.metadata, Self::NAME, "metadata")?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn to_active_model(&self) -> ResultRepo<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id),
            name: ActiveValue::Set(self.name.clone()),
            slug: ActiveValue::Set(self.slug.clone()),
            category_type: ActiveValue::Set(self.category_type.as_str().to_string()),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            color: ActiveValue::Set(self.color.clone()),
            icon: ActiveValue::Set(self.icon.clone()),
            is_default: ActiveValue::Set(self.is_default),
            is_system: ActiveValue::Set(self.is_system),
            sort_order: ActiveValue::Set(self.sort_order),
            parent_id: ActiveValue::Set(self.parent_id),
            rules: ActiveValue::Set(encode_json(&self.rules, "rules")?),
            metadata: ActiveValue::Set(encode_json(&self.metadata, "metadata")?),
            created_at: ActiveValue::Set(self.created_at),
            updated_at: ActiveValue::Set(self.updated_at),
        })
    }

    fn validate_record(&self) -> ResultRepo<()> {
        validate_category_record(self)
    }

    fn check_replace(&self, stored: &Self) -> ResultRepo<()> {
        if self.parent_id != stored.parent_id {
            return Err(RepositoryError::InvalidState(format!(
                "save cannot reparent category {}; use move_category",
                self.id
            )));
        }
        if self.status != stored.status {
            return Err(RepositoryError::InvalidState(format!(
                "save cannot change the status of category {}; use set_status or \
                 archive_and_reassign",
                self.id
            )));
        }
        Ok(())
    }

    fn new_active_model(input: NewCategory) -> ResultRepo<ActiveModel> {
        let input = validate_new_category(input)?;
        let slug = input
            .slug
            .ok_or_else(|| RepositoryError::Validation("category slug is required".to_string()))?;
        Ok(ActiveModel {
            name: ActiveValue::Set(input.name),
            slug: ActiveValue::Set(slug),
            category_type: ActiveValue::Set(input.category_type.as_str().to_string()),
            status: ActiveValue::Set(CategoryStatus::Active.as_str().to_string()),
            color: ActiveValue::Set(input.color),
            icon: ActiveValue::Set(input.icon),
            is_default: ActiveValue::Set(input.is_default),
            is_system: ActiveValue::Set(input.is_system),
            sort_order: ActiveValue::Set(input.sort_order),
            parent_id: ActiveValue::Set(input.parent_id),
            rules: ActiveValue::Set(encode_json(&input.rules, "rules")?),
            metadata: ActiveValue::Set(encode_json(&input.metadata, "metadata")?),
            ..Default::default()
        })
    }

    fn patch_active_model(patch: CategoryPatch) -> ResultRepo<ActiveModel> {
        let patch = validate_category_patch(patch)?;
        let mut active = <ActiveModel as Default>::default();
        if let Some(name) = patch.name {
            active.name = ActiveValue::Set(name);
        }
        if let Some(slug) = patch.slug {
            active.slug = ActiveValue::Set(slug);
        }
        if let Some(category_type) = patch.category_type {
            active.category_type = ActiveValue::Set(category_type.as_str().to_string());
        }
        if let Some(color) = patch.color {
            active.color = ActiveValue::Set(color);
        }
        if let Some(icon) = patch.icon {
            active.icon = ActiveValue::Set(icon);
        }
        if let Some(is_default) = patch.is_default {
            active.is_default = ActiveValue::Set(is_default);
        }
        if let Some(sort_order) = patch.sort_order {
            active.sort_order = ActiveValue::Set(sort_order);
        }
        if let Some(rules) = patch.rules {
            active.rules = ActiveValue::Set(encode_json(&rules, "rules")?);
        }
        if let Some(metadata) = patch.metadata {
            active.metadata = ActiveValue::Set(encode_json(&metadata, "metadata")?);
        }
        Ok(active)
    }
}
