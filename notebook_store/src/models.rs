use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Notebook {
    pub id: i64,
    pub title: String,
    pub date: String,
    #[serde(default, deserialize_with = "sources_or_legacy_count")]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Metadata for one uploaded file, as stored in the notebook's `sources`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub name: String,
    pub path: String,
    pub size: String,
    /// Client-declared, may be `null` in older collection files.
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
}

//Older collection files carry a source count (or null) instead of the list.
fn sources_or_legacy_count<'de, D>(deserializer: D) -> Result<Vec<SourceRef>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sources {
        List(Vec<SourceRef>),
        Legacy(Option<u64>),
    }

    Ok(match Sources::deserialize(deserializer)? {
        Sources::List(sources) => sources,
        Sources::Legacy(_) => Vec::new(),
    })
}
