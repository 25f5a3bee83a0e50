use super::ApiError;
use crate::models::{ProductStatus, Role, SearchField};

/// Path identifiers are parsed by hand so malformed values produce the
/// standard 400 envelope.
pub fn parse_id(resource: &str, raw: &str) -> Result<i32, ApiError> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::validation(format!("Invalid {resource} ID: '{raw}'")))
}

pub fn require_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::validation(format!("Field '{name}' is required"))),
    }
}

pub fn parse_role(raw: &str) -> Result<Role, ApiError> {
    Role::parse(raw).ok_or_else(|| {
        ApiError::validation(format!(
            "Invalid role '{raw}'. Use 'administrador', 'analista' or 'visualizador'"
        ))
    })
}

pub fn parse_status(raw: &str) -> Result<ProductStatus, ApiError> {
    ProductStatus::parse(raw).ok_or_else(|| {
        ApiError::validation(format!(
            "Invalid status '{raw}'. Use 'pendente', 'aprovado' or 'rejeitado'"
        ))
    })
}

pub fn parse_search_field(raw: &str) -> Result<SearchField, ApiError> {
    SearchField::parse(raw).ok_or_else(|| {
        ApiError::validation(
            "Invalid search field. Use 'nome_do_produto', 'codigo', 'id', 'substancia1', \
             'substancia2', 'substancia3', 'categoria' or 'fornecedor'",
        )
    })
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let well_formed = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    });
    if well_formed {
        Ok(())
    } else {
        Err(ApiError::validation(format!("Invalid email address: '{email}'")))
    }
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_parsing() {
        assert_eq!(parse_id("product", "12").unwrap(), 12);
        assert!(parse_id("product", "0").is_err());
        assert!(parse_id("product", "-3").is_err());
        assert!(parse_id("product", "abc").is_err());
        assert!(parse_id("product", "12abc").is_err());
    }

    #[test]
    fn required_fields() {
        assert_eq!(require_field(Some("x"), "codigo").unwrap(), "x");
        assert!(require_field(Some("   "), "codigo").is_err());
        assert!(require_field(None, "codigo").is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("ana@empresa.com.br").is_ok());
        assert!(validate_email("semarroba").is_err());
        assert!(validate_email("@dominio.com").is_err());
        assert!(validate_email("ana@semponto").is_err());
    }

    #[test]
    fn enum_selectors() {
        assert!(parse_role("analista").is_ok());
        assert!(parse_role("superuser").is_err());
        assert!(parse_status("rejeitado").is_ok());
        assert!(parse_status("reprovado").is_err());
        assert!(parse_search_field("fornecedor").is_ok());
        assert!(parse_search_field("by_foo").is_err());
    }
}
