//! Report groups - named sets of teams

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::CardFilter;

pub const ALL_GROUP: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportGroup {
    pub name: String,
    /// `None` reports on every team
    pub teams: Option<Vec<String>>,
}

impl ReportGroup {
    /// Look up a group; unknown names and "all" are unfiltered
    pub fn resolve(config: &Config, name: &str) -> Self {
        Self {
            name: name.to_string(),
            teams: config.report_group_teams(name).map(|teams| teams.to_vec()),
        }
    }

    pub fn filter(&self) -> CardFilter {
        match &self.teams {
            Some(teams) => CardFilter::teams(teams.clone()),
            None => CardFilter::all(),
        }
    }

    pub fn includes_team(&self, team: &str) -> bool {
        self.teams
            .as_ref()
            .map_or(true, |teams| teams.iter().any(|t| t == team))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let mut config = Config::default();
        config
            .report_groups
            .insert("mobile".into(), vec!["iPhone".into(), "Android".into()]);

        let mobile = ReportGroup::resolve(&config, "mobile");
        assert_eq!(
            mobile.filter(),
            CardFilter::teams(vec!["iPhone".into(), "Android".into()])
        );
        assert!(mobile.includes_team("Android"));
        assert!(!mobile.includes_team("Web"));

        let all = ReportGroup::resolve(&config, ALL_GROUP);
        assert_eq!(all.filter(), CardFilter::all());
        assert!(all.includes_team("Web"));

        assert_eq!(ReportGroup::resolve(&config, "nope").teams, None);
    }
}
