//! Turn raw event commits into validated [`Commit`]s.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone as _, Utc};

use crate::commit::{Author, Commit, FileChanges, MAX_MESSAGE_CHARS};
use crate::event::{RawAuthor, RawCommit, RawTimestamp, Repository};

const UNKNOWN_AUTHOR_NAME: &str = "Unknown";
const UNKNOWN_AUTHOR_EMAIL: &str = "unknown@example.com";
const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Commits that survived validation, and how many did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Valid commits in their original order.
    pub commits: Vec<Commit>,
    /// Number of raw commits rejected.
    pub dropped: usize,
}

/// Validates and cleans up commits for one repository.
#[derive(Debug, Clone)]
pub struct Normalizer<'a> {
    repository: &'a Repository,
    server_url: &'a str,
    now: DateTime<Utc>,
}

impl<'a> Normalizer<'a> {
    /// Normalize commits belonging to `repository` on github.com.
    pub fn new(repository: &'a Repository) -> Self {
        Self {
            repository,
            server_url: DEFAULT_SERVER_URL,
            now: Utc::now(),
        }
    }

    /// Use a different Github server when building commit links.
    pub fn with_server_url(mut self, server_url: &'a str) -> Self {
        self.server_url = server_url.trim_end_matches('/');
        self
    }

    /// Substitute `now` for unreadable timestamps.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Validate every raw commit, keeping the valid ones in order.
    pub fn normalize(&self, raw: &[RawCommit]) -> Normalized {
        let mut normalized = Normalized::default();

        for commit in raw {
            match self.commit(commit) {
                Some(commit) => normalized.commits.push(commit),
                None => {
                    tracing::debug!(
                        "Dropping invalid commit {}: {}",
                        commit.short_id(),
                        serde_json::to_string(commit).unwrap_or_default()
                    );
                    normalized.dropped += 1;
                }
            }
        }

        normalized
    }

    /// A commit needs a non-empty id, a non-empty message, and an author.
    fn commit(&self, raw: &RawCommit) -> Option<Commit> {
        let id = raw.id.as_deref().filter(|id| !id.is_empty())?;
        let message = raw.message.as_deref().filter(|m| !m.is_empty())?;
        let author = raw.author.as_ref()?;

        let files = FileChanges::new(
            raw.added.clone().unwrap_or_default(),
            raw.modified.clone().unwrap_or_default(),
            raw.removed.clone().unwrap_or_default(),
        );

        let commit = Commit {
            id: id.to_owned(),
            message: truncate_chars(message, MAX_MESSAGE_CHARS).to_owned(),
            author: author_or_unknown(author),
            timestamp: self.timestamp(raw.timestamp.as_ref(), id),
            url: self.url(raw.url.as_deref(), id),
            files,
        };

        tracing::debug!(
            "Processing commit {}: added {:?}, modified {:?}, removed {:?}",
            commit.short_id(),
            commit.files.added(),
            commit.files.modified(),
            commit.files.removed()
        );

        Some(commit)
    }

    fn timestamp(&self, raw: Option<&RawTimestamp>, id: &str) -> String {
        let parsed = raw.and_then(parse_timestamp);
        if parsed.is_none() {
            tracing::debug!(
                "Commit {} has no readable timestamp, using current time",
                crate::commit::short_sha(id)
            );
        }

        parsed
            .unwrap_or(self.now)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn url(&self, raw: Option<&str>, id: &str) -> String {
        match raw {
            Some(url) if url.starts_with("https://") => url.to_owned(),
            _ => format!(
                "{}/{}/{}/commit/{}",
                self.server_url, self.repository.owner, self.repository.name, id
            ),
        }
    }
}

fn author_or_unknown(author: &RawAuthor) -> Author {
    let name = author.name.as_deref().filter(|name| !name.is_empty());
    let email = author.email.as_deref().filter(|email| !email.is_empty());

    Author {
        name: name.unwrap_or(UNKNOWN_AUTHOR_NAME).to_owned(),
        email: email.unwrap_or(UNKNOWN_AUTHOR_EMAIL).to_owned(),
    }
}

fn parse_timestamp(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Millis(millis) => Utc.timestamp_millis_opt(*millis).single(),
        RawTimestamp::Text(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|ts| ts.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    // Without an offset, assume UTC.
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|ts| ts.and_utc())
                })
        }
    }
}

/// Keep at most `max` characters of `text`, never splitting a character.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn repo() -> Repository {
        Repository::new("octo", "hello")
    }

    fn raw(id: &str) -> RawCommit {
        RawCommit {
            id: Some(id.to_owned()),
            message: Some("fix".to_owned()),
            author: Some(RawAuthor {
                name: Some("A".into()),
                email: Some("a@x.com".into()),
                username: None,
            }),
            timestamp: Some(RawTimestamp::Text("2024-01-01T00:00:00Z".into())),
            url: Some(format!("https://github.com/octo/hello/commit/{id}")),
            added: Some(vec!["f.ts".into()]),
            modified: None,
            removed: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn valid_commit_is_normalized() {
        let repo = repo();
        let normalized = Normalizer::new(&repo).normalize(&[raw("abc123")]);

        assert_eq!(normalized.dropped, 0);
        let commit = &normalized.commits[0];
        assert_eq!(commit.id, "abc123");
        assert_eq!(commit.message, "fix");
        assert_eq!(commit.author.name, "A");
        assert_eq!(commit.timestamp, "2024-01-01T00:00:00.000Z");
        assert_eq!(commit.url, "https://github.com/octo/hello/commit/abc123");
        assert_eq!(commit.files.added(), ["f.ts"]);
        assert_eq!(commit.files.total_changes(), 1);
    }

    #[test]
    fn file_lists_are_logged() {
        let repo = repo();
        let commit = RawCommit {
            modified: Some(vec!["src/lib.rs".into(), "README.md".into()]),
            ..raw("abc123")
        };

        let (logs, _guard) = crate::logging::capture::debug_logs();
        Normalizer::new(&repo).normalize(&[commit]);

        let output = logs.contents();
        assert!(
            output.contains(
                r#"Processing commit abc123: added ["f.ts"], modified ["src/lib.rs", "README.md"], removed []"#
            ),
            "{output}"
        );
    }

    #[test]
    fn commits_missing_required_fields_are_dropped() {
        let repo = repo();

        let no_id = RawCommit {
            id: None,
            ..raw("x")
        };
        let empty_message = RawCommit {
            message: Some(String::new()),
            ..raw("y")
        };
        let no_author = RawCommit {
            author: None,
            ..raw("z")
        };

        let normalized =
            Normalizer::new(&repo).normalize(&[no_id, raw("keep"), empty_message, no_author]);

        assert_eq!(normalized.dropped, 3);
        assert_eq!(normalized.commits.len(), 1);
        assert_eq!(normalized.commits[0].id, "keep");
    }

    #[test]
    fn order_is_preserved() {
        let repo = repo();
        let normalized = Normalizer::new(&repo).normalize(&[raw("a"), raw("b"), raw("c")]);
        let ids: Vec<_> = normalized.commits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn long_messages_are_truncated_by_character() {
        let repo = repo();
        let commit = RawCommit {
            message: Some("é".repeat(MAX_MESSAGE_CHARS + 5)),
            ..raw("abc")
        };

        let normalized = Normalizer::new(&repo).normalize(&[commit]);
        let message = &normalized.commits[0].message;
        assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn blank_author_fields_use_placeholders() {
        let repo = repo();
        let commit = RawCommit {
            author: Some(RawAuthor::default()),
            ..raw("abc")
        };

        let normalized = Normalizer::new(&repo).normalize(&[commit]);
        let author = &normalized.commits[0].author;
        assert_eq!(author.name, "Unknown");
        assert_eq!(author.email, "unknown@example.com");
    }

    #[test]
    fn timestamps_are_utc_millis() {
        let repo = repo();
        let normalizer = Normalizer::new(&repo).with_now(now());

        let offset = RawCommit {
            timestamp: Some(RawTimestamp::Text("2024-01-01T02:30:00.123456+02:00".into())),
            ..raw("a")
        };
        let millis = RawCommit {
            timestamp: Some(RawTimestamp::Millis(1_704_067_200_000)),
            ..raw("b")
        };
        let naive = RawCommit {
            timestamp: Some(RawTimestamp::Text("2024-01-01T00:00:00".into())),
            ..raw("c")
        };

        let normalized = normalizer.normalize(&[offset, millis, naive]);
        assert_eq!(normalized.commits[0].timestamp, "2024-01-01T00:30:00.123Z");
        assert_eq!(normalized.commits[1].timestamp, "2024-01-01T00:00:00.000Z");
        assert_eq!(normalized.commits[2].timestamp, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn unreadable_timestamp_uses_now() {
        let repo = repo();
        let garbage = RawCommit {
            timestamp: Some(RawTimestamp::Text("yesterday-ish".into())),
            ..raw("a")
        };
        let missing = RawCommit {
            timestamp: None,
            ..raw("b")
        };

        let normalized = Normalizer::new(&repo)
            .with_now(now())
            .normalize(&[garbage, missing]);

        assert_eq!(normalized.commits[0].timestamp, "2025-06-01T12:00:00.000Z");
        assert_eq!(normalized.commits[1].timestamp, "2025-06-01T12:00:00.000Z");
    }

    #[test]
    fn non_https_urls_are_rebuilt() {
        let repo = repo();
        let insecure = RawCommit {
            url: Some("http://github.com/octo/hello/commit/a".into()),
            ..raw("a")
        };
        let missing = RawCommit {
            url: None,
            ..raw("b")
        };

        let normalized = Normalizer::new(&repo)
            .with_server_url("https://github.example.com/")
            .normalize(&[insecure, missing]);

        assert_eq!(
            normalized.commits[0].url,
            "https://github.example.com/octo/hello/commit/a"
        );
        assert_eq!(
            normalized.commits[1].url,
            "https://github.example.com/octo/hello/commit/b"
        );
    }

    #[test]
    fn truncate_on_char_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
