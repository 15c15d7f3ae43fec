use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

/// A catalogued specimen as served by `GET /specimens`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Specimen {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "imageLink", default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
    #[serde(rename = "primaryImage", default)]
    pub primary_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub minerals: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub colors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fluorescence: Vec<Option<String>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "dateAdded", default)]
    pub date_added: Option<String>,
}

/// The catalog sends `null` for some absent lists; treat it like a missing key.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Distinct facet values observed across the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryIndex {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub minerals: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub locations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MineralBadges<'a> {
    pub shown: &'a [String],
    pub overflow: usize,
}

impl Specimen {
    pub fn primary_image_url(&self) -> Option<&str> {
        self.primary_image
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.images.first().map(String::as_str))
    }

    /// A leading `null` tag is the catalog's marker for "unknown / none".
    pub fn is_fluorescent(&self) -> bool {
        matches!(self.fluorescence.first(), Some(Some(_)))
    }

    pub fn fluorescence_tags(&self) -> impl Iterator<Item = &str> {
        self.fluorescence.iter().filter_map(Option::as_deref)
    }

    pub fn mineral_badges(&self, max: usize) -> MineralBadges<'_> {
        let shown_len = self.minerals.len().min(max);
        MineralBadges {
            shown: &self.minerals[..shown_len],
            overflow: self.minerals.len() - shown_len,
        }
    }

    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }

    pub fn location(&self) -> Option<&str> {
        non_blank(self.location.as_deref())
    }

    pub fn added_on(&self) -> Option<String> {
        let raw = non_blank(self.date_added.as_deref())?;
        let date = DateTime::parse_from_rfc3339(raw)
            .map(|timestamp| timestamp.date_naive())
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .ok()?;
        Some(date.format("%B %-d, %Y").to_string())
    }
}

pub fn is_plain_fluorescence_tag(tag: &str) -> bool {
    tag == "None"
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
pub(crate) fn sample_specimen(id: &str, image_count: usize) -> Specimen {
    Specimen {
        id: id.to_string(),
        name: format!("Specimen {id}"),
        description: None,
        images: (0..image_count)
            .map(|index| format!("https://images.example/{id}/{index}.jpg"))
            .collect(),
        primary_image: None,
        minerals: Vec::new(),
        colors: Vec::new(),
        fluorescence: Vec::new(),
        location: None,
        date_added: None,
    }
}
