use crate::error::{ForecastError, Result};
use crate::schema::ColumnBindings;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    Date,
    Value,
    Product,
    Client,
}

impl ColumnRole {
    pub fn is_mandatory(self) -> bool {
        matches!(self, ColumnRole::Date | ColumnRole::Value)
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Date => "date",
            ColumnRole::Value => "value",
            ColumnRole::Product => "product",
            ColumnRole::Client => "client",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBinding {
    pub role: ColumnRole,
    /// Name as the user typed it.
    pub declared: String,
    /// Matching header, or `declared` when nothing matched.
    pub name: String,
    pub found: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumns {
    pub date: ColumnBinding,
    pub value: ColumnBinding,
    pub product: Option<ColumnBinding>,
    pub client: Option<ColumnBinding>,
}

/// Case-insensitive exact match of `declared` against `headers`.
pub fn find_actual_column_name<'a>(declared: &str, headers: &'a [String]) -> Option<&'a str> {
    let wanted = declared.to_lowercase();
    headers
        .iter()
        .find(|header| header.to_lowercase() == wanted)
        .map(String::as_str)
}

fn bind(role: ColumnRole, declared: &str, headers: &[String]) -> ColumnBinding {
    match find_actual_column_name(declared, headers) {
        Some(actual) => {
            debug!("Column '{}' resolved as '{}' ({} role)", declared, actual, role);
            ColumnBinding {
                role,
                declared: declared.to_string(),
                name: actual.to_string(),
                found: true,
            }
        }
        None => {
            warn!("Column '{}' ({} role) was not found in the input", declared, role);
            ColumnBinding {
                role,
                declared: declared.to_string(),
                name: declared.to_string(),
                found: false,
            }
        }
    }
}

fn bind_optional(role: ColumnRole, declared: Option<&str>, headers: &[String]) -> Option<ColumnBinding> {
    declared
        .filter(|name| !name.is_empty())
        .map(|name| bind(role, name, headers))
}

impl ResolvedColumns {
    /// `headers` are expected to be trimmed already.
    pub fn resolve(bindings: &ColumnBindings, headers: &[String]) -> Self {
        Self {
            date: bind(ColumnRole::Date, &bindings.date, headers),
            value: bind(ColumnRole::Value, &bindings.value, headers),
            product: bind_optional(ColumnRole::Product, bindings.product.as_deref(), headers),
            client: bind_optional(ColumnRole::Client, bindings.client.as_deref(), headers),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let optional = self.product.iter().chain(self.client.iter());
        for binding in [&self.date, &self.value].into_iter().chain(optional) {
            if binding.role.is_mandatory() && !binding.found {
                return Err(ForecastError::MissingColumn {
                    role: binding.role.to_string(),
                    column: binding.declared.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn resolve_and_validate(bindings: &ColumnBindings, headers: &[String]) -> Result<Self> {
        let resolved = Self::resolve(bindings, headers);
        resolved.validate()?;
        Ok(resolved)
    }

    /// Header of the product column, only when it exists in the sheet.
    pub fn product_column(&self) -> Option<&str> {
        self.product
            .as_ref()
            .filter(|b| b.found)
            .map(|b| b.name.as_str())
    }

    pub fn client_column(&self) -> Option<&str> {
        self.client
            .as_ref()
            .filter(|b| b.found)
            .map(|b| b.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_case_insensitive_match_with_accents() {
        let cols = headers(&["EMISSÃO", "VALOR TOTAL"]);
        assert_eq!(find_actual_column_name("Emissão", &cols), Some("EMISSÃO"));
        assert_eq!(find_actual_column_name("valor total", &cols), Some("VALOR TOTAL"));
        assert_eq!(find_actual_column_name("valor", &cols), None);
    }

    #[test]
    fn test_unresolved_role_keeps_declared_name() {
        let cols = headers(&["Data", "Valor"]);
        let bindings = ColumnBindings::new("data", "valor").with_product("Produto");
        let resolved = ResolvedColumns::resolve(&bindings, &cols);

        assert_eq!(resolved.date.name, "Data");
        assert_eq!(resolved.value.name, "Valor");
        let product = resolved.product.as_ref().unwrap();
        assert!(!product.found);
        assert_eq!(product.name, "Produto");
        assert_eq!(resolved.product_column(), None);
        assert!(!product.role.is_mandatory());
        assert!(resolved.validate().is_ok());
    }

    #[test]
    fn test_missing_mandatory_column_fails_validation() {
        let cols = headers(&["Data", "Quantidade"]);
        let bindings = ColumnBindings::new("Data", "Valor");
        let err = ResolvedColumns::resolve_and_validate(&bindings, &cols).unwrap_err();

        match err {
            ForecastError::MissingColumn { role, column } => {
                assert_eq!(role, "value");
                assert_eq!(column, "Valor");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_optional_binding_is_ignored() {
        let cols = headers(&["Data", "Valor"]);
        let bindings = ColumnBindings::new("Data", "Valor").with_client("");
        let resolved = ResolvedColumns::resolve(&bindings, &cols);
        assert!(resolved.client.is_none());
    }
}
