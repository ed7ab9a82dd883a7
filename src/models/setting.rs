use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

/// Paramètre clé/valeur. Clés utilisées par le storefront:
/// support_telegram, payment_gateway, black_friday_promo,
/// forced_purchase_enabled.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "setting")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
