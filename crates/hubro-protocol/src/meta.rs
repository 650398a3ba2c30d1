//! Document metadata carried by rendered previews.

use serde::{Deserialize, Serialize};

use crate::lenient;

/// Front matter of the document being edited, as reported by the server
/// alongside each rendered preview.
///
/// Keys follow the page front matter names (`hideTitle`, `hideAuthor`).
/// Unknown keys are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentMeta {
    /// Page title.
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,

    /// Page author.
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub author: Option<String>,

    /// Publication date (`YYYY-MM-DD` or RFC 3339), unparsed.
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,

    /// Short description shown in listings.
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    /// Tags attached to the page.
    #[serde(deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,

    /// Hide the title block in the rendered page.
    #[serde(deserialize_with = "lenient::flag")]
    pub hide_title: bool,

    /// Hide the author block in the rendered page.
    #[serde(deserialize_with = "lenient::flag")]
    pub hide_author: bool,

    /// Page is a draft and not listed publicly.
    #[serde(deserialize_with = "lenient::flag")]
    pub draft: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_meta() {
        let json = r#"{
            "title": "Hello",
            "author": "Ada",
            "date": "2024-03-01",
            "tags": ["rust", "web"],
            "hideTitle": true,
            "hideAuthor": false
        }"#;

        let meta: DocumentMeta = serde_json::from_str(json).unwrap();

        assert_eq!(
            meta,
            DocumentMeta {
                title: Some("Hello".to_owned()),
                author: Some("Ada".to_owned()),
                date: Some("2024-03-01".to_owned()),
                description: None,
                tags: vec!["rust".to_owned(), "web".to_owned()],
                hide_title: true,
                hide_author: false,
                draft: false,
            }
        );
    }

    #[test]
    fn test_parse_empty_meta_uses_defaults() {
        let meta: DocumentMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, DocumentMeta::default());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let meta: DocumentMeta =
            serde_json::from_str(r#"{"sortOrder": 3, "visible": true, "title": "T"}"#).unwrap();
        assert_eq!(meta.title.as_deref(), Some("T"));
    }

    #[test]
    fn test_scalar_coercion() {
        let meta: DocumentMeta = serde_json::from_str(
            r#"{"title": 2024, "hideAuthor": "true", "hideTitle": 0, "draft": "yes"}"#,
        )
        .unwrap();

        assert_eq!(meta.title.as_deref(), Some("2024"));
        assert!(meta.hide_author);
        assert!(!meta.hide_title);
        assert!(meta.draft);
    }

    #[test]
    fn test_tags_from_comma_separated_string() {
        let meta: DocumentMeta = serde_json::from_str(r#"{"tags": "rust, , web"}"#).unwrap();
        assert_eq!(meta.tags, vec!["rust".to_owned(), "web".to_owned()]);
    }

    #[test]
    fn test_null_fields_fall_back() {
        let meta: DocumentMeta =
            serde_json::from_str(r#"{"title": null, "tags": null, "hideTitle": null}"#).unwrap();
        assert_eq!(meta, DocumentMeta::default());
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let meta = DocumentMeta {
            title: Some("T".to_owned()),
            ..Default::default()
        };

        let json = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["title"], "T");
        assert!(json.get("author").is_none());
        assert_eq!(json["hideTitle"], false);
    }
}
