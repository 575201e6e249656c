use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One course section as read from the catalog export.
///
/// Every field is optional on disk. Accessors resolve absent fields to `""`,
/// while [`Document::field`] keeps the distinction so filters can treat a
/// missing field as a non-match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "OfferingName", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub offering_id: Option<String>,
    #[serde(rename = "SectionName", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(rename = "Title", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Description", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Department", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(rename = "SchoolName", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(rename = "Level", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(rename = "InstructorsFullName", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub instructors: Option<String>,
    #[serde(rename = "Credits", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub credits: Option<String>,
    #[serde(rename = "Areas", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub areas: Option<String>,
    #[serde(rename = "Status", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "SeatsAvailable", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub seats_available: Option<String>,
    #[serde(rename = "Meetings", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub meetings: Option<String>,
    #[serde(rename = "Prerequisites", default, deserialize_with = "lenient_prerequisites")]
    pub prerequisites: Vec<Prerequisite>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// Identity of a section within one corpus snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocKey {
    pub offering_id: String,
    pub section_id: String,
}

/// Fields a filter may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    OfferingId,
    SectionId,
    Title,
    Description,
    Department,
    School,
    Level,
    Instructors,
    Credits,
    Areas,
    Status,
    SeatsAvailable,
    Meetings,
}

impl Field {
    /// Accepts both the catalog spelling (`SchoolName`) and the model spelling (`school`).
    pub fn parse(name: &str) -> Option<Field> {
        let field = match name {
            "OfferingName" | "offering_id" => Field::OfferingId,
            "SectionName" | "section_id" => Field::SectionId,
            "Title" | "title" => Field::Title,
            "Description" | "description" => Field::Description,
            "Department" | "department" => Field::Department,
            "SchoolName" | "school" => Field::School,
            "Level" | "level" => Field::Level,
            "InstructorsFullName" | "instructors" => Field::Instructors,
            "Credits" | "credits" => Field::Credits,
            "Areas" | "areas" => Field::Areas,
            "Status" | "status" => Field::Status,
            "SeatsAvailable" | "seats_available" => Field::SeatsAvailable,
            "Meetings" | "meetings" => Field::Meetings,
            _ => return None,
        };
        Some(field)
    }
}

impl Document {
    pub fn offering_id(&self) -> &str { or_empty(&self.offering_id) }
    pub fn section_id(&self) -> &str { or_empty(&self.section_id) }
    pub fn title(&self) -> &str { or_empty(&self.title) }
    pub fn description(&self) -> &str { or_empty(&self.description) }
    pub fn department(&self) -> &str { or_empty(&self.department) }
    pub fn school(&self) -> &str { or_empty(&self.school) }
    pub fn level(&self) -> &str { or_empty(&self.level) }
    pub fn instructors(&self) -> &str { or_empty(&self.instructors) }

    /// Areas, unless absent, empty, or the catalog's literal `"None"` placeholder.
    pub fn areas(&self) -> Option<&str> {
        self.areas.as_deref().filter(|a| !a.is_empty() && *a != "None")
    }

    pub fn key(&self) -> DocKey {
        DocKey { offering_id: self.offering_id().to_string(), section_id: self.section_id().to_string() }
    }

    /// Raw field value; `None` when the record never carried it.
    pub fn field(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::OfferingId => &self.offering_id,
            Field::SectionId => &self.section_id,
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Department => &self.department,
            Field::School => &self.school,
            Field::Level => &self.level,
            Field::Instructors => &self.instructors,
            Field::Credits => &self.credits,
            Field::Areas => &self.areas,
            Field::Status => &self.status,
            Field::SeatsAvailable => &self.seats_available,
            Field::Meetings => &self.meetings,
        };
        value.as_deref()
    }

    fn prerequisite_texts(&self) -> impl Iterator<Item = &str> {
        self.prerequisites.iter().map(|p| p.description.as_str()).filter(|d| !d.is_empty())
    }

    /// Text fed to the lexical index. The title is repeated three times to weight its terms.
    pub fn searchable_text(&self) -> String {
        let title = self.title();
        let dept_number = format!("{} {}", self.department(), self.offering_id());
        let mut fields: Vec<&str> = vec![title, title, title, self.description(), &dept_number, self.instructors()];
        if let Some(areas) = self.areas() {
            fields.push(areas);
        }
        fields.extend(self.prerequisite_texts());
        fields.retain(|f| !f.is_empty());
        fields.join(" ")
    }

    /// Labelled multi-line text sent to the embedding model.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![
            format!("Title: {}", self.title()),
            format!("Course: {} - {}", self.offering_id(), self.department()),
        ];
        if !self.description().is_empty() {
            parts.push(format!("Description: {}", self.description()));
        }
        if let Some(areas) = self.areas() {
            parts.push(format!("Areas: {areas}"));
        }
        if !self.level().is_empty() {
            parts.push(format!("Level: {}", self.level()));
        }
        if !self.instructors().is_empty() {
            parts.push(format!("Instructors: {}", self.instructors()));
        }
        let prereqs: Vec<&str> = self.prerequisite_texts().collect();
        if !prereqs.is_empty() {
            parts.push(format!("Prerequisites: {}", prereqs.join(" ")));
        }
        parts.join("\n")
    }
}

fn or_empty(value: &Option<String>) -> &str { value.as_deref().unwrap_or("") }

// The catalog mixes strings, numbers and nulls for the same field across records.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_prerequisites<'de, D>(deserializer: D) -> std::result::Result<Vec<Prerequisite>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else { return Ok(Vec::new()) };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => {
                let description = match map.get("Description") {
                    Some(Value::String(s)) => s.clone(),
                    _ => String::new(),
                };
                Some(Prerequisite { description })
            }
            _ => None,
        })
        .collect())
}
