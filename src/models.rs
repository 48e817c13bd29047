use serde::{Deserialize, Deserializer};

/// Decodes `null` the same way as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Depth {
        Number(u32),
        Text(String),
    }

    match Option::<Depth>::deserialize(deserializer)? {
        Some(Depth::Number(depth)) => Ok(depth),
        Some(Depth::Text(text)) => text.trim().parse().map_err(serde::de::Error::custom),
        None => Ok(0),
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NamedEntity {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BookInfo {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub web_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub identifier: String,
    #[serde(default, deserialize_with = "nullable")]
    pub isbn: String,
    #[serde(default, deserialize_with = "nullable")]
    pub issued: String,
    #[serde(default, deserialize_with = "nullable")]
    pub rights: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cover: String,
    #[serde(default, deserialize_with = "nullable")]
    pub authors: Vec<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub publishers: Vec<NamedEntity>,
    #[serde(default, deserialize_with = "nullable")]
    pub subjects: Vec<NamedEntity>,
}

impl BookInfo {
    pub fn author_names(&self) -> Vec<&str> {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Stylesheet {
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Chapter {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub filename: String,
    /// Url of the chapter html, not the html itself.
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default, deserialize_with = "nullable")]
    pub asset_base_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub stylesheets: Vec<Stylesheet>,
    #[serde(default, deserialize_with = "nullable")]
    pub site_styles: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub fragment: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub depth: u32,
    /// Set once the chapter html is fetched and references the v2 epub api.
    #[serde(skip)]
    pub api_v2_assets: bool,
}

impl Chapter {
    /// Cover chapters get promoted to the front of their page.
    pub fn is_cover(&self) -> bool {
        self.filename.to_lowercase().contains("cover") || self.title.to_lowercase().contains("cover")
    }

    pub fn xhtml_filename(&self) -> String {
        self.filename.replace(".html", ".xhtml")
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct ChaptersResponse {
    #[serde(default)]
    pub count: usize,
    pub next: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub results: Vec<Chapter>,
}
