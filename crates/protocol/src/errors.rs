use serde::{Deserialize, Serialize};

/// `{ "errors": [...] }` body returned with non-2xx statuses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl ErrorObject {
    /// Field name an error points at: the last segment of `source.pointer`
    /// (`/data/attributes/title` -> `title`), or `source.parameter`.
    pub fn field(&self) -> Option<&str> {
        let source = self.source.as_ref()?;
        if let Some(pointer) = source.pointer.as_deref() {
            let last = pointer.rsplit('/').next().unwrap_or(pointer);
            if !last.is_empty() {
                return Some(last);
            }
        }
        source.parameter.as_deref().filter(|p| !p.is_empty())
    }
}

impl ErrorDocument {
    pub fn parse_best_effort(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_comes_from_pointer_tail_or_parameter() {
        let doc = ErrorDocument::parse_best_effort(
            r#"{"errors":[
                {"status":"422","detail":"The title field is required.","source":{"pointer":"/data/attributes/title"}},
                {"detail":"Bad sort.","source":{"parameter":"sort"}},
                {"detail":"No source."}
            ]}"#,
        )
        .expect("error document");
        let fields: Vec<Option<&str>> = doc.errors.iter().map(ErrorObject::field).collect();
        assert_eq!(fields, vec![Some("title"), Some("sort"), None]);
    }

    #[test]
    fn non_json_body_is_not_an_error_document() {
        assert!(ErrorDocument::parse_best_effort("<html>502</html>").is_none());
    }
}
