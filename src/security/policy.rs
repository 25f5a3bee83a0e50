//! Role-based authorization tables and the product visibility rules.
//!
//! Every protected operation maps to an explicit set of admitted roles.
//! There is no role hierarchy to derive from: analyst and viewer have
//! incomparable capabilities on some paths, so each operation lists its
//! roles outright.

use crate::models::{ProductStatus, Role};

/// Protected operations, one per guarded route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListUsers,
    GetUser,
    UpdateUser,
    DeleteUser,
    CreateProduct,
    ListProducts,
    GetProduct,
    SearchProducts,
    UpdateProduct,
    DeleteProduct,
    UploadDocument,
    ListDocuments,
    DeleteDocument,
}

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Analyst, Role::Viewer];
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const ADMIN_AND_ANALYST: &[Role] = &[Role::Admin, Role::Analyst];

/// The static authorization table.
#[must_use]
pub const fn allowed_roles(operation: Operation) -> &'static [Role] {
    match operation {
        Operation::ListUsers
        | Operation::GetUser
        | Operation::UpdateUser
        | Operation::DeleteUser
        | Operation::DeleteProduct
        | Operation::UploadDocument
        | Operation::DeleteDocument => ADMIN_ONLY,
        Operation::CreateProduct | Operation::UpdateProduct => ADMIN_AND_ANALYST,
        Operation::ListProducts
        | Operation::GetProduct
        | Operation::SearchProducts
        | Operation::ListDocuments => ALL_ROLES,
    }
}

#[must_use]
pub fn authorize(role: Role, operation: Operation) -> bool {
    allowed_roles(operation).contains(&role)
}

/// Role-scoped filter applied to product queries before any user-supplied
/// search predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Unrestricted,
    ApprovedOrOwn(i32),
    ApprovedOnly,
}

#[must_use]
pub const fn visibility_for(role: Role, subject_id: i32) -> Visibility {
    match role {
        Role::Admin => Visibility::Unrestricted,
        Role::Analyst => Visibility::ApprovedOrOwn(subject_id),
        Role::Viewer => Visibility::ApprovedOnly,
    }
}

/// Single-record read check. Applied to the specific record so a denied
/// read yields an explicit refusal rather than pretending the record does
/// not exist.
#[must_use]
pub fn can_view(role: Role, subject_id: i32, status: ProductStatus, owner: i32) -> bool {
    match role {
        Role::Admin => true,
        Role::Analyst => status == ProductStatus::Approved || owner == subject_id,
        Role::Viewer => status == ProductStatus::Approved,
    }
}

/// Why a product update was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDenial {
    /// Analysts may only edit products they created.
    NotOwner,
    /// Approved products are frozen for analysts.
    ApprovedLocked,
    /// Only admins transition the workflow status.
    StatusField,
    /// The role has no mutation rights at all.
    Role,
}

/// Update authorization for non-admin roles. All-or-nothing: a payload
/// touching a forbidden field fails entirely, no partial write.
pub fn can_update(
    role: Role,
    subject_id: i32,
    status: ProductStatus,
    owner: i32,
    touches_status: bool,
) -> Result<(), UpdateDenial> {
    match role {
        Role::Admin => Ok(()),
        Role::Analyst => {
            if owner != subject_id {
                return Err(UpdateDenial::NotOwner);
            }
            if status == ProductStatus::Approved {
                return Err(UpdateDenial::ApprovedLocked);
            }
            if touches_status {
                return Err(UpdateDenial::StatusField);
            }
            Ok(())
        }
        Role::Viewer => Err(UpdateDenial::Role),
    }
}

/// Status a newly created product starts in. Non-admin creators are
/// forced to pending no matter what the payload asked for; this is a
/// policy override, not a validation failure.
#[must_use]
pub fn initial_status(role: Role, requested: Option<ProductStatus>) -> ProductStatus {
    match role {
        Role::Admin => requested.unwrap_or(ProductStatus::Pending),
        Role::Analyst | Role::Viewer => ProductStatus::Pending,
    }
}
