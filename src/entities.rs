use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Iso8601, Rfc3339};

use crate::record::{Record, SortValue};

/// Label skills fall under when their category is absent or blank.
pub const DEFAULT_CATEGORY: &str = "Other";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub short_description: Option<String>,
    /// Comma-separated on the wire.
    pub tags: Option<String>,
    pub problem_statement: Option<String>,
    pub approach_taken: Option<String>,
    pub tools_used: Option<String>,
    pub results_impact: Option<String>,
    pub project_image: Option<String>,
}

impl Project {
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    #[serde(rename = "_id")]
    pub id: String,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl Experience {
    /// Start date as a sortable timestamp. `None` when the date is
    /// absent or does not parse; callers rank those as oldest rather
    /// than dropping the entry.
    pub fn start_value(&self) -> Option<SortValue> {
        parse_date_ms(self.start_date.as_deref()?).map(SortValue::Timestamp)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    #[serde(rename = "_id")]
    pub id: String,
    pub skill_name: Option<String>,
    pub category: Option<String>,
    pub proficiency_level: Option<String>,
    pub description: Option<String>,
    pub official_website: Option<String>,
}

/// One review shelf entry: a movie, album, or book with the facets and
/// sort keys the shelf pages curate on. Display fields ride along
/// untouched.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Review {
    pub id: String,
    pub title: String,
    /// Director, artist, or author.
    pub creator: Option<String>,
    pub year: i32,
    pub rating: f64,
    pub genres: Vec<String>,
    /// Reading/listening status where the shelf tracks one.
    pub status: Option<String>,
    pub body: String,
    pub link: Option<String>,
}

impl Record for Review {
    fn id(&self) -> &str {
        &self.id
    }

    fn facet_values(&self, facet: &str) -> Vec<&str> {
        match facet {
            "genre" => self.genres.iter().map(String::as_str).collect(),
            "status" => self.status.as_deref().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn sort_value(&self, key: &str) -> Option<SortValue> {
        match key {
            "year" => Some(SortValue::Int(i64::from(self.year))),
            "rating" => Some(SortValue::Float(self.rating)),
            _ => None,
        }
    }
}

/// Orders work history most recent first. Stable: entries sharing a
/// start date keep their fetched order; entries without one sink to
/// the end.
pub fn sort_by_recency(entries: &mut [Experience]) {
    entries.sort_by(|a, b| {
        let a = a.start_value().unwrap_or_else(SortValue::floor);
        let b = b.start_value().unwrap_or_else(SortValue::floor);
        b.cmp(&a)
    });
}

#[derive(Clone, Debug)]
pub struct SkillGroup {
    pub category: String,
    pub skills: Vec<Skill>,
}

/// Groups skills by category. Group order is the first-seen order of
/// each category in the fetched sequence; member order inside a group
/// is preserved. Absent or blank categories land under
/// [`DEFAULT_CATEGORY`].
pub fn group_by_category(skills: Vec<Skill>) -> Vec<SkillGroup> {
    let mut groups: Vec<SkillGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for skill in skills {
        let category = skill
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();

        match index.get(&category) {
            Some(&i) => groups[i].skills.push(skill),
            None => {
                index.insert(category.clone(), groups.len());
                groups.push(SkillGroup {
                    category,
                    skills: vec![skill],
                });
            }
        }
    }

    groups
}

fn parse_date_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = time::OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(dt.unix_timestamp() * 1000);
    }
    let date = time::Date::parse(raw, &Iso8601::DEFAULT).ok()?;
    Some(date.midnight().assume_utc().unix_timestamp() * 1000)
}
