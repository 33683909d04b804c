use serde::{Deserialize, Serialize};

/// A user's preference profile, as stored by the front-end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    #[serde(rename = "academicPreference", default)]
    pub academic_preference: Vec<String>,
    #[serde(rename = "newsBlogsClubsPreference", default)]
    pub news_blogs_clubs_preference: Vec<String>,
    #[serde(rename = "sportsPreference", default)]
    pub sports_preference: SportsPreference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportsPreference {
    #[serde(rename = "varsitySportsList", default)]
    pub varsity_sports_list: Vec<String>,
    #[serde(rename = "competitiveSportsList", default)]
    pub competitive_sports_list: Vec<String>,
}

impl UserPreference {
    /// Category string for news, events, blogs and clubs.
    pub fn general_query(&self) -> String {
        join_categories(&[&self.academic_preference, &self.news_blogs_clubs_preference])
    }

    /// Category string for sports news.
    pub fn sports_query(&self) -> String {
        join_categories(&[
            &self.sports_preference.varsity_sports_list,
            &self.sports_preference.competitive_sports_list,
        ])
    }
}

/// Concatenate category lists into the space separated string the search
/// function matches against. Blank entries are skipped.
pub fn join_categories(lists: &[&Vec<String>]) -> String {
    lists
        .iter()
        .flat_map(|list| list.iter())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
