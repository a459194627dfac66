use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use regex::{Regex, RegexBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::SprintSource;
use crate::config::GitHubConfig;
use crate::error::PublicError;
use crate::model::sprint::{SprintCard, SprintColumn, SprintSummary};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_PROJECT_REGEX: &str = r"Sprint \d+ - (?P<end_date>\d+/\d+/\d+)";

/// Sprints are organisation projects whose name carries the end date, e.g.
/// `Sprint 12 - 3/15/2024`.
pub struct GitHubSprintSource {
    api_url: String,
    token: Option<String>,
    organization: String,
    project_regex: String,
    sprint_pattern: Regex,
    client: reqwest::Client,
}

impl GitHubSprintSource {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let project_regex = config
            .project_regex
            .clone()
            .unwrap_or_else(|| DEFAULT_PROJECT_REGEX.to_string());
        let sprint_pattern = RegexBuilder::new(&project_regex)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid github.project_regex \"{project_regex}\""))?;

        Ok(Self {
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: config.token.clone(),
            organization: config.organization.clone(),
            project_regex,
            sprint_pattern,
            client: reqwest::Client::new(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "burndown");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("GitHub API request failed: {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API returned {status} for {url}: {body}");
        }
        resp.json()
            .await
            .with_context(|| format!("Failed to parse GitHub response from {url}"))
    }

    async fn sprint_boards(&self) -> Result<Vec<SprintBoard>> {
        let url = format!(
            "{}/orgs/{}/projects?per_page=100",
            self.api_url,
            urlencoding::encode(&self.organization)
        );
        let projects: Vec<GhProject> = self.get_json(&url).await?;
        Ok(sprint_boards(projects, &self.sprint_pattern))
    }

    async fn column_cards(&self, column: &GhColumn) -> Result<SprintColumn> {
        let url = format!(
            "{}/projects/columns/{}/cards?per_page=100",
            self.api_url, column.id
        );
        let cards: Vec<GhCard> = self.get_json(&url).await?;

        let hydrated = futures::future::try_join_all(cards.iter().map(|card| self.card(card))).await?;
        Ok(SprintColumn::new(column.name.clone(), hydrated))
    }

    async fn card(&self, card: &GhCard) -> Result<SprintCard> {
        let Some(content_url) = card.content_url.as_deref() else {
            return Ok(SprintCard {
                issue_number: None,
                story_points: 0,
            });
        };
        let Some(issue_number) = issue_number(content_url) else {
            return Ok(SprintCard {
                issue_number: None,
                story_points: 0,
            });
        };

        let issue: GhIssue = self.get_json(content_url).await?;
        Ok(SprintCard {
            issue_number: Some(issue_number),
            story_points: story_points(&issue.labels).unwrap_or(0),
        })
    }

    async fn summarize(&self, sprint_id: Option<u64>) -> Result<SprintSummary> {
        let boards = self.sprint_boards().await?;
        let board = select_board(boards, sprint_id, &self.project_regex)?;

        log::info!("Summarizing sprint board \"{}\"", board.name);
        let url = format!("{}/projects/{}/columns", self.api_url, board.id);
        let columns: Vec<GhColumn> = self.get_json(&url).await?;

        let mut hydrated = Vec::with_capacity(columns.len());
        for column in &columns {
            hydrated.push(self.column_cards(column).await?);
        }

        Ok(SprintSummary::new(board.number, board.end_date, hydrated))
    }
}

#[async_trait]
impl SprintSource for GitHubSprintSource {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn organization(&self) -> &str {
        &self.organization
    }

    async fn sprint_summary(&self, sprint_id: Option<u64>) -> Result<SprintSummary, PublicError> {
        self.summarize(sprint_id).await.map_err(PublicError::from_anyhow)
    }
}

#[derive(Debug, Deserialize)]
struct GhProject {
    id: u64,
    number: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhColumn {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhCard {
    content_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    #[serde(default)]
    labels: Vec<GhLabel>,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Clone, PartialEq)]
struct SprintBoard {
    id: u64,
    number: u64,
    name: String,
    end_date: DateTime<Utc>,
}

/// Projects whose name matches the sprint pattern, earliest end date first.
fn sprint_boards(projects: Vec<GhProject>, pattern: &Regex) -> Vec<SprintBoard> {
    let mut boards: Vec<SprintBoard> = projects
        .into_iter()
        .filter_map(|project| {
            let caps = pattern.captures(&project.name)?;
            let end_date = parse_end_date(caps.name("end_date")?.as_str())?;
            Some(SprintBoard {
                id: project.id,
                number: project.number,
                name: project.name,
                end_date,
            })
        })
        .collect();
    boards.sort_by_key(|b| b.end_date);
    boards
}

fn select_board(
    boards: Vec<SprintBoard>,
    sprint_id: Option<u64>,
    project_regex: &str,
) -> Result<SprintBoard, PublicError> {
    let no_sprints =
        || PublicError::not_found("No active sprints were found. Validate project is not closed");
    if boards.is_empty() {
        return Err(no_sprints());
    }

    match sprint_id {
        None => boards.into_iter().next().ok_or_else(no_sprints),
        Some(id) => boards.into_iter().find(|b| b.number == id).ok_or_else(|| {
            PublicError::not_found(format!(
                "No active sprint was found by ID {id}. Validate project 1) name matches \"{project_regex}\"; 2) is not closed"
            ))
        }),
    }
}

/// `M/D/YYYY` at midnight UTC.
fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn issue_number(content_url: &str) -> Option<u64> {
    let (rest, number) = content_url.rsplit_once('/')?;
    if !rest.to_ascii_lowercase().ends_with("/issues") {
        return None;
    }
    number.parse().ok()
}

/// The first label that is purely digits is the issue's story points.
fn story_points(labels: &[GhLabel]) -> Option<u32> {
    labels
        .iter()
        .map(|l| l.name.as_str())
        .find(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|name| name.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pattern() -> Regex {
        RegexBuilder::new(DEFAULT_PROJECT_REGEX)
            .case_insensitive(true)
            .build()
            .unwrap()
    }

    fn project(id: u64, number: u64, name: &str) -> GhProject {
        GhProject {
            id,
            number,
            name: name.to_string(),
        }
    }

    fn label(name: &str) -> GhLabel {
        GhLabel {
            name: name.to_string(),
        }
    }

    #[test]
    fn boards_are_matched_and_sorted_by_end_date() {
        let boards = sprint_boards(
            vec![
                project(1, 11, "Sprint 11 - 3/29/2024"),
                project(2, 90, "Roadmap"),
                project(3, 10, "sprint 10 - 3/15/2024"),
            ],
            &pattern(),
        );

        let numbers: Vec<u64> = boards.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![10, 11]);
        assert_eq!(boards[0].end_date, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn unparseable_end_date_is_not_a_sprint() {
        let boards = sprint_boards(vec![project(1, 1, "Sprint 1 - 13/45/2024")], &pattern());
        assert!(boards.is_empty());
    }

    #[test]
    fn first_board_is_default() {
        let boards = sprint_boards(
            vec![
                project(1, 11, "Sprint 11 - 3/29/2024"),
                project(3, 10, "Sprint 10 - 3/15/2024"),
            ],
            &pattern(),
        );
        let board = select_board(boards, None, DEFAULT_PROJECT_REGEX).unwrap();
        assert_eq!(board.number, 10);
    }

    #[test]
    fn board_selected_by_number() {
        let boards = sprint_boards(
            vec![
                project(1, 11, "Sprint 11 - 3/29/2024"),
                project(3, 10, "Sprint 10 - 3/15/2024"),
            ],
            &pattern(),
        );
        let board = select_board(boards, Some(11), DEFAULT_PROJECT_REGEX).unwrap();
        assert_eq!(board.id, 1);
    }

    #[test]
    fn no_boards_is_not_found() {
        let err = select_board(vec![], None, DEFAULT_PROJECT_REGEX).unwrap_err();
        assert_eq!(err.status, 404);
        assert!(err.message.contains("No active sprints"));
    }

    #[test]
    fn unknown_sprint_number_is_not_found() {
        let boards = sprint_boards(vec![project(3, 10, "Sprint 10 - 3/15/2024")], &pattern());
        let err = select_board(boards, Some(99), DEFAULT_PROJECT_REGEX).unwrap_err();
        assert_eq!(err.status, 404);
        assert!(err.message.contains("ID 99"));
    }

    #[test]
    fn issue_urls_are_recognized() {
        assert_eq!(
            issue_number("https://api.github.com/repos/acme/app/issues/42"),
            Some(42)
        );
        assert_eq!(issue_number("https://api.github.com/repos/acme/app/pulls/42"), None);
        assert_eq!(issue_number("https://api.github.com/repos/acme/app/issues/abc"), None);
    }

    #[test]
    fn numeric_label_is_story_points() {
        let labels = vec![label("bug"), label("5"), label("8")];
        assert_eq!(story_points(&labels), Some(5));
        assert_eq!(story_points(&[label("p1"), label("")]), None);
    }

    #[test]
    fn api_url_trailing_slash_is_trimmed() {
        let source = GitHubSprintSource::new(&GitHubConfig {
            api_url: Some("https://ghe.example.com/api/v3/".into()),
            token: None,
            organization: "acme".into(),
            project_regex: None,
        })
        .unwrap();
        assert_eq!(source.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(source.organization(), "acme");
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let result = GitHubSprintSource::new(&GitHubConfig {
            api_url: None,
            token: None,
            organization: "acme".into(),
            project_regex: Some("Sprint (".into()),
        });
        assert!(result.is_err());
    }
}
