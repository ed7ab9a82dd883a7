use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub image_url: String,
    pub is_active: bool, // Porte de visibilité storefront
    pub preview_media_url: Option<String>,
    pub telegram_link: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::price::Entity")]
    Price,

    #[sea_orm(has_many = "super::product_region::Entity")]
    ProductRegion,
}

impl Related<super::price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Price.def()
    }
}

impl Related<super::product_region::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductRegion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
