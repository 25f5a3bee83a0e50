use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub codigo: String,

    pub nome_do_produto: String,

    pub qtade_maxima_armazenada: Option<String>,

    pub fornecedor: Option<String>,

    pub estado_fisico: Option<String>,

    pub local_de_armazenamento: Option<String>,

    pub substancia1: Option<String>,
    pub n_cas1: Option<String>,
    pub concentracao1: Option<String>,

    pub substancia2: Option<String>,
    pub n_cas2: Option<String>,
    pub concentracao2: Option<String>,

    pub substancia3: Option<String>,
    pub n_cas3: Option<String>,
    pub concentracao3: Option<String>,

    pub perigos_fisicos: Option<String>,
    pub perigos_saude: Option<String>,
    pub perigos_meio_ambiente: Option<String>,

    pub palavra_de_perigo: Option<String>,

    pub categoria: Option<String>,

    /// One of "pendente", "aprovado", "rejeitado"
    pub status: String,

    /// Account id of the creator. Intentionally not a foreign key: the
    /// creator may be deleted later and the product must survive.
    pub created_by: i32,

    /// Attached safety sheet. Both present or both absent.
    pub pdf_url: Option<String>,
    pub pdf_storage_key: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
