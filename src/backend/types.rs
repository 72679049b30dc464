//! Tipos de dados trocados com o serviço de backend de candidaturas.
//!
//! O corpo da requisição espelha o [`Item`](crate::coordinator::Item) que está
//! sendo processado; a resposta é opcional e lida de forma tolerante.

use serde::{Deserialize, Serialize};

use crate::coordinator::Item;

/// Corpo enviado para `POST {backend_url}/applications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    /// Identificador da vaga na fonte de origem.
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl From<&Item> for ApplicationRequest {
    fn from(item: &Item) -> Self {
        Self {
            job_id: item.id.clone(),
            url: item.url.clone(),
            title: item.title.clone(),
            company: item.company.clone(),
        }
    }
}

/// Recibo devolvido pelo backend. Todos os campos são opcionais.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationReceipt {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_from_item_skips_missing_fields() {
        let mut item = Item::new("zr-42");
        item.title = Some("Platform Engineer".into());
        let req = ApplicationRequest::from(&item);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"job_id":"zr-42","title":"Platform Engineer"}"#);
    }

    #[test]
    fn receipt_tolerates_partial_body() {
        let receipt: ApplicationReceipt = serde_json::from_str(r#"{"id":"app_1"}"#).unwrap();
        assert_eq!(receipt.id.as_deref(), Some("app_1"));
        assert!(receipt.status.is_none());

        let empty: ApplicationReceipt = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ApplicationReceipt::default());
    }
}
