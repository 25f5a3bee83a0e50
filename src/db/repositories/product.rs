use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::products;
use crate::models::{ProductStatus, SearchField};
use crate::security::policy::Visibility;

pub use crate::entities::products::Model as ProductRecord;

/// Input for product creation. Status has already been decided by policy
/// at this point.
#[derive(Debug, Default)]
pub struct NewProduct {
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
    pub status: Option<ProductStatus>,
    pub created_by: i32,
}

/// Field-set for product updates. `None` leaves the column untouched; the
/// caller has already authorized every field present.
#[derive(Debug, Default)]
pub struct ProductChanges {
    pub codigo: Option<String>,
    pub nome_do_produto: Option<String>,
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
    pub status: Option<ProductStatus>,
}

impl ProductChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.codigo.is_none()
            && self.nome_do_produto.is_none()
            && self.qtade_maxima_armazenada.is_none()
            && self.fornecedor.is_none()
            && self.estado_fisico.is_none()
            && self.local_de_armazenamento.is_none()
            && self.substancia1.is_none()
            && self.n_cas1.is_none()
            && self.concentracao1.is_none()
            && self.substancia2.is_none()
            && self.n_cas2.is_none()
            && self.concentracao2.is_none()
            && self.substancia3.is_none()
            && self.n_cas3.is_none()
            && self.concentracao3.is_none()
            && self.perigos_fisicos.is_none()
            && self.perigos_saude.is_none()
            && self.perigos_meio_ambiente.is_none()
            && self.palavra_de_perigo.is_none()
            && self.categoria.is_none()
            && self.status.is_none()
    }
}

/// Search filter applied on top of the role-scoped visibility condition.
#[derive(Debug)]
pub enum SearchFilter {
    Id(i32),
    Text(SearchField, String),
}

pub struct ProductRepository {
    conn: DatabaseConnection,
}

impl ProductRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn visibility_condition(visibility: &Visibility) -> Option<Condition> {
        match visibility {
            Visibility::Unrestricted => None,
            Visibility::ApprovedOnly => Some(
                Condition::all()
                    .add(products::Column::Status.eq(ProductStatus::Approved.as_str())),
            ),
            Visibility::ApprovedOrOwn(user_id) => Some(
                Condition::any()
                    .add(products::Column::Status.eq(ProductStatus::Approved.as_str()))
                    .add(products::Column::CreatedBy.eq(*user_id)),
            ),
        }
    }

    pub async fn insert(&self, new_product: NewProduct) -> Result<ProductRecord> {
        let now = chrono::Utc::now().to_rfc3339();
        let status = new_product.status.unwrap_or(ProductStatus::Pending);

        let active = products::ActiveModel {
            id: NotSet,
            codigo: Set(new_product.codigo),
            nome_do_produto: Set(new_product.nome_do_produto),
            qtade_maxima_armazenada: Set(new_product.qtade_maxima_armazenada),
            fornecedor: Set(new_product.fornecedor),
            estado_fisico: Set(new_product.estado_fisico),
            local_de_armazenamento: Set(new_product.local_de_armazenamento),
            substancia1: Set(new_product.substancia1),
            n_cas1: Set(new_product.n_cas1),
            concentracao1: Set(new_product.concentracao1),
            substancia2: Set(new_product.substancia2),
            n_cas2: Set(new_product.n_cas2),
            concentracao2: Set(new_product.concentracao2),
            substancia3: Set(new_product.substancia3),
            n_cas3: Set(new_product.n_cas3),
            concentracao3: Set(new_product.concentracao3),
            perigos_fisicos: Set(new_product.perigos_fisicos),
            perigos_saude: Set(new_product.perigos_saude),
            perigos_meio_ambiente: Set(new_product.perigos_meio_ambiente),
            palavra_de_perigo: Set(new_product.palavra_de_perigo),
            categoria: Set(new_product.categoria),
            status: Set(status.as_str().to_string()),
            created_by: Set(new_product.created_by),
            pdf_url: Set(None),
            pdf_storage_key: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert product")
    }

    pub async fn get(&self, id: i32) -> Result<Option<ProductRecord>> {
        products::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query product by ID")
    }

    pub async fn list(&self, visibility: &Visibility) -> Result<Vec<ProductRecord>> {
        let mut query = products::Entity::find().order_by_asc(products::Column::Id);
        if let Some(condition) = Self::visibility_condition(visibility) {
            query = query.filter(condition);
        }

        query.all(&self.conn).await.context("Failed to list products")
    }

    pub async fn search(
        &self,
        visibility: &Visibility,
        filter: SearchFilter,
    ) -> Result<Vec<ProductRecord>> {
        let mut query = products::Entity::find().order_by_asc(products::Column::Id);
        if let Some(condition) = Self::visibility_condition(visibility) {
            query = query.filter(condition);
        }

        query = match filter {
            SearchFilter::Id(id) => query.filter(products::Column::Id.eq(id)),
            SearchFilter::Text(field, needle) => {
                let column = match field {
                    SearchField::ProductName => products::Column::NomeDoProduto,
                    SearchField::Code => products::Column::Codigo,
                    SearchField::Substance1 => products::Column::Substancia1,
                    SearchField::Substance2 => products::Column::Substancia2,
                    SearchField::Substance3 => products::Column::Substancia3,
                    SearchField::Category => products::Column::Categoria,
                    SearchField::Supplier => products::Column::Fornecedor,
                    // Id selectors are parsed upstream into SearchFilter::Id
                    SearchField::Id => products::Column::Id,
                };
                query.filter(column.contains(&needle))
            }
        };

        query
            .all(&self.conn)
            .await
            .context("Failed to search products")
    }

    /// Products carrying an attached document, under the same role-scoped
    /// visibility as any other read.
    pub async fn list_with_document(
        &self,
        visibility: &Visibility,
    ) -> Result<Vec<ProductRecord>> {
        let mut query = products::Entity::find()
            .filter(products::Column::PdfUrl.is_not_null())
            .order_by_asc(products::Column::Id);
        if let Some(condition) = Self::visibility_condition(visibility) {
            query = query.filter(condition);
        }

        query
            .all(&self.conn)
            .await
            .context("Failed to list products with documents")
    }

    pub async fn update(
        &self,
        id: i32,
        changes: ProductChanges,
    ) -> Result<Option<ProductRecord>> {
        let Some(existing) = products::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query product for update")?
        else {
            return Ok(None);
        };

        let mut active: products::ActiveModel = existing.into();

        if let Some(value) = changes.codigo {
            active.codigo = Set(value);
        }
        if let Some(value) = changes.nome_do_produto {
            active.nome_do_produto = Set(value);
        }
        if let Some(value) = changes.qtade_maxima_armazenada {
            active.qtade_maxima_armazenada = Set(Some(value));
        }
        if let Some(value) = changes.fornecedor {
            active.fornecedor = Set(Some(value));
        }
        if let Some(value) = changes.estado_fisico {
            active.estado_fisico = Set(Some(value));
        }
        if let Some(value) = changes.local_de_armazenamento {
            active.local_de_armazenamento = Set(Some(value));
        }
        if let Some(value) = changes.substancia1 {
            active.substancia1 = Set(Some(value));
        }
        if let Some(value) = changes.n_cas1 {
            active.n_cas1 = Set(Some(value));
        }
        if let Some(value) = changes.concentracao1 {
            active.concentracao1 = Set(Some(value));
        }
        if let Some(value) = changes.substancia2 {
            active.substancia2 = Set(Some(value));
        }
        if let Some(value) = changes.n_cas2 {
            active.n_cas2 = Set(Some(value));
        }
        if let Some(value) = changes.concentracao2 {
            active.concentracao2 = Set(Some(value));
        }
        if let Some(value) = changes.substancia3 {
            active.substancia3 = Set(Some(value));
        }
        if let Some(value) = changes.n_cas3 {
            active.n_cas3 = Set(Some(value));
        }
        if let Some(value) = changes.concentracao3 {
            active.concentracao3 = Set(Some(value));
        }
        if let Some(value) = changes.perigos_fisicos {
            active.perigos_fisicos = Set(Some(value));
        }
        if let Some(value) = changes.perigos_saude {
            active.perigos_saude = Set(Some(value));
        }
        if let Some(value) = changes.perigos_meio_ambiente {
            active.perigos_meio_ambiente = Set(Some(value));
        }
        if let Some(value) = changes.palavra_de_perigo {
            active.palavra_de_perigo = Set(Some(value));
        }
        if let Some(value) = changes.categoria {
            active.categoria = Set(Some(value));
        }
        if let Some(status) = changes.status {
            active.status = Set(status.as_str().to_string());
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update product")?;

        Ok(Some(model))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = products::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete product")?;

        Ok(result.rows_affected > 0)
    }

    /// Points a product at a stored document. URL and storage key move
    /// together, never one without the other.
    pub async fn set_document(
        &self,
        id: i32,
        url: &str,
        storage_key: &str,
    ) -> Result<Option<ProductRecord>> {
        let Some(existing) = products::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query product for document attach")?
        else {
            return Ok(None);
        };

        let mut active: products::ActiveModel = existing.into();
        active.pdf_url = Set(Some(url.to_string()));
        active.pdf_storage_key = Set(Some(storage_key.to_string()));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to attach document to product")?;

        Ok(Some(model))
    }

    /// Clears the document pointer on every product referencing a storage
    /// key, used when the underlying object is deleted.
    pub async fn clear_document_by_key(&self, storage_key: &str) -> Result<u64> {
        let result = products::Entity::update_many()
            .col_expr(products::Column::PdfUrl, sea_orm::sea_query::Expr::value(Option::<String>::None))
            .col_expr(
                products::Column::PdfStorageKey,
                sea_orm::sea_query::Expr::value(Option::<String>::None),
            )
            .filter(products::Column::PdfStorageKey.eq(storage_key))
            .exec(&self.conn)
            .await
            .context("Failed to clear document references")?;

        Ok(result.rows_affected)
    }
}
