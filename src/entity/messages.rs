use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub dialogue_id: i64,
    pub user_id: i64,
    pub message: String,
    pub timestamp: i64,
    #[sea_orm(belongs_to, from = "dialogue_id", to = "id")]
    pub dialogue: HasOne<super::dialogues::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
