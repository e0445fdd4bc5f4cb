//! Mapping of epics and stories onto Jira issue fields.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::pipeline::types::{Epic, Story, UploadLabel};

/// A configurable custom-field id that may be switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldId {
    Enabled(String),
    /// Field is left out of the payload entirely.
    Disabled,
}

impl FieldId {
    /// `""` and `skip` (any case) disable the field.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("skip") {
            FieldId::Disabled
        } else {
            FieldId::Enabled(raw.to_string())
        }
    }
}

/// How epics and stories are expressed in the destination project.
///
/// Built once at startup and passed into every publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSchema {
    /// Field that marks an issue as an epic and carries its name.
    pub epic_name_field: FieldId,
    /// Field on a story that points at its epic.
    pub epic_link_field: FieldId,
    pub epic_issue_type: String,
    pub story_issue_type: String,
    /// Link type used between the grouping issue and each epic.
    pub link_type: String,
}

impl Default for DestinationSchema {
    fn default() -> Self {
        Self {
            epic_name_field: FieldId::Enabled("customfield_10011".into()),
            epic_link_field: FieldId::Enabled("customfield_10014".into()),
            epic_issue_type: "Epic".into(),
            story_issue_type: "Story".into(),
            link_type: "Relates".into(),
        }
    }
}

impl DestinationSchema {
    pub fn grouping_fields(&self, project_key: &str, label: &UploadLabel) -> IssueFields {
        let summary = format!("Requirements Upload - {}", label.timestamp());
        let description = format!(
            "Parent epic grouping all epics and stories generated from requirements document uploaded on {}.",
            label.uploaded_at()
        );
        IssueFields::new(project_key, &summary, &description, &self.epic_issue_type)
            .with_labels(vec![label.as_label()])
            .with_field(&self.epic_name_field, json!(summary))
    }

    pub fn epic_fields(&self, project_key: &str, epic: &Epic, label: &UploadLabel) -> IssueFields {
        IssueFields::new(
            project_key,
            &epic.summary,
            &epic.description,
            &self.epic_issue_type,
        )
        .with_labels(vec![label.as_label()])
        .with_field(&self.epic_name_field, json!(epic.summary))
    }

    /// Stories are found through their epic, so they carry no upload label.
    pub fn story_fields(&self, project_key: &str, story: &Story, epic_key: &str) -> IssueFields {
        IssueFields::new(
            project_key,
            &story.summary,
            &story.description,
            &self.story_issue_type,
        )
        .with_field(&self.epic_link_field, json!(epic_key))
    }
}

/// The `fields` object of a create-issue request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IssueFields(Map<String, Value>);

impl IssueFields {
    pub fn new(project_key: &str, summary: &str, description: &str, issue_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": project_key }));
        fields.insert("summary".into(), json!(summary));
        fields.insert("description".into(), json!(AdfDocument::paragraph(description)));
        fields.insert("issuetype".into(), json!({ "name": issue_type }));
        Self(fields)
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.0.insert("labels".into(), json!(labels));
        self
    }

    /// Set a configurable field; a disabled id leaves the payload untouched.
    pub fn with_field(mut self, id: &FieldId, value: Value) -> Self {
        if let FieldId::Enabled(name) = id {
            self.0.insert(name.clone(), value);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn summary(&self) -> &str {
        self.0
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

// ── Atlassian Document Format ───────────────────────────────────────

/// Single-paragraph rich-text document required by the description field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdfDocument {
    #[serde(rename = "type")]
    kind: &'static str,
    version: u8,
    content: Vec<AdfParagraph>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct AdfParagraph {
    #[serde(rename = "type")]
    kind: &'static str,
    content: Vec<AdfText>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct AdfText {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl AdfDocument {
    pub fn paragraph(text: &str) -> Self {
        Self {
            kind: "doc",
            version: 1,
            content: vec![AdfParagraph {
                kind: "paragraph",
                content: vec![AdfText {
                    kind: "text",
                    text: text.to_string(),
                }],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn label() -> UploadLabel {
        UploadLabel::from_timestamp(chrono::Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap())
    }

    #[test]
    fn adf_envelope_is_exact() {
        let doc = serde_json::to_string(&AdfDocument::paragraph("Hello")).unwrap();
        assert_eq!(
            doc,
            r#"{"type":"doc","version":1,"content":[{"type":"paragraph","content":[{"type":"text","text":"Hello"}]}]}"#
        );
    }

    #[test]
    fn field_id_parsing() {
        assert_eq!(FieldId::parse("skip"), FieldId::Disabled);
        assert_eq!(FieldId::parse("SKIP"), FieldId::Disabled);
        assert_eq!(FieldId::parse("  "), FieldId::Disabled);
        assert_eq!(
            FieldId::parse(" customfield_1 "),
            FieldId::Enabled("customfield_1".into())
        );
    }

    #[test]
    fn grouping_issue_fields() {
        let schema = DestinationSchema::default();
        let fields = schema.grouping_fields("PROJ", &label());
        let json = serde_json::to_value(&fields).unwrap();

        assert_eq!(json["project"]["key"], "PROJ");
        assert_eq!(json["summary"], "Requirements Upload - 2025-03-04T05-06-07");
        assert_eq!(json["issuetype"]["name"], "Epic");
        assert_eq!(json["labels"], json!(["upload-2025-03-04T05-06-07"]));
        assert_eq!(json["customfield_10011"], json["summary"]);
        let text = json["description"]["content"][0]["content"][0]["text"]
            .as_str()
            .unwrap();
        assert!(text.starts_with("Parent epic grouping all epics and stories"));
    }

    #[test]
    fn story_carries_epic_link_field() {
        let schema = DestinationSchema::default();
        let story = Story {
            summary: "Login page".into(),
            description: String::new(),
        };
        let fields = schema.story_fields("PROJ", &story, "PROJ-2");
        assert_eq!(fields.get("customfield_10014"), Some(&json!("PROJ-2")));
        assert_eq!(fields.get("issuetype"), Some(&json!({"name": "Story"})));
        assert!(fields.get("customfield_10011").is_none());
        assert!(fields.get("labels").is_none());
    }

    #[test]
    fn disabled_fields_are_omitted() {
        let schema = DestinationSchema {
            epic_name_field: FieldId::Disabled,
            epic_link_field: FieldId::Disabled,
            ..DestinationSchema::default()
        };
        let epic = Epic {
            summary: "Auth".into(),
            description: "Login things".into(),
            stories: vec![],
        };
        let epic_json = serde_json::to_value(schema.epic_fields("PROJ", &epic, &label())).unwrap();
        let story = Story {
            summary: "Login".into(),
            description: String::new(),
        };
        let story_json =
            serde_json::to_value(schema.story_fields("PROJ", &story, "PROJ-1")).unwrap();

        let epic_keys: Vec<&String> = epic_json.as_object().unwrap().keys().collect();
        let story_keys: Vec<&String> = story_json.as_object().unwrap().keys().collect();
        assert!(epic_keys.iter().all(|k| !k.starts_with("customfield")));
        assert!(story_keys.iter().all(|k| !k.starts_with("customfield")));
        assert_eq!(epic_json["description"]["content"][0]["content"][0]["text"], "Login things");
    }
}
