use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role. Wire values keep the Portuguese names used by the
/// deployed frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "administrador")]
    Admin,
    #[serde(rename = "analista")]
    Analyst,
    #[serde(rename = "visualizador")]
    Viewer,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "administrador",
            Self::Analyst => "analista",
            Self::Viewer => "visualizador",
        }
    }

    /// Parses a wire value. Anything outside the fixed set is invalid,
    /// never coerced.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "administrador" => Some(Self::Admin),
            "analista" => Some(Self::Analyst),
            "visualizador" => Some(Self::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product approval state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "aprovado")]
    Approved,
    #[serde(rename = "rejeitado")]
    Rejected,
}

impl ProductStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pendente",
            Self::Approved => "aprovado",
            Self::Rejected => "rejeitado",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pendente" => Some(Self::Pending),
            "aprovado" => Some(Self::Approved),
            "rejeitado" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Searchable product fields. The set is closed: an unrecognized selector
/// is a validation error, not an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    ProductName,
    Code,
    Id,
    Substance1,
    Substance2,
    Substance3,
    Category,
    Supplier,
}

impl SearchField {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "nome_do_produto" => Some(Self::ProductName),
            "codigo" => Some(Self::Code),
            "id" => Some(Self::Id),
            "substancia1" => Some(Self::Substance1),
            "substancia2" => Some(Self::Substance2),
            "substancia3" => Some(Self::Substance3),
            "categoria" => Some(Self::Category),
            "fornecedor" => Some(Self::Supplier),
            _ => None,
        }
    }
}
