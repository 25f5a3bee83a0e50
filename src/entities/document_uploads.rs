use sea_orm::entity::prelude::*;

/// Audit trail of file uploads, independent of the product records that
/// end up pointing at the stored object.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "document_uploads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub original_filename: String,

    #[sea_orm(unique)]
    pub storage_key: String,

    pub url: String,

    pub uploaded_at: String,

    pub uploaded_by: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
