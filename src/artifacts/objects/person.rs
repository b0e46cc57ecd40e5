//! Author and committer identity lines
//!
//! Commits and tags carry `name <email> epoch tz` lines for the author,
//! committer, and tagger. The epoch is in seconds and the timezone is a
//! `+HHMM` / `-HHMM` offset; both round-trip byte-exactly.

use anyhow::Context;
use chrono::{DateTime, FixedOffset};

/// Identity plus timestamp as embedded in commit and tag headers.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Person {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Person {
    /// Create a person stamped with the current local time.
    pub fn new(name: String, email: String) -> Self {
        Person {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Person {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// Format as "Name <email@example.com>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// Format the full header form "name <email> epoch tz"
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Format timestamp in human-readable form, e.g. "Mon Jan 1 12:34:56 2024 +0000"
    pub fn readable_timestamp(&self) -> String {
        self.timestamp
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string()
    }

    /// Read authorship from the environment, if fully present.
    ///
    /// `GIT_AUTHOR_NAME` and `GIT_AUTHOR_EMAIL` supply the identity;
    /// `GIT_AUTHOR_DATE` optionally pins the timestamp and accepts either
    /// the raw "epoch tz" header form or RFC 2822.
    pub fn from_env() -> Option<Self> {
        let name = std::env::var("GIT_AUTHOR_NAME").ok()?;
        let email = std::env::var("GIT_AUTHOR_EMAIL").ok()?;

        let timestamp = std::env::var("GIT_AUTHOR_DATE")
            .ok()
            .and_then(|date| parse_date(&date).ok());

        match timestamp {
            Some(ts) => Some(Person::new_with_timestamp(name, email, ts)),
            None => Some(Person::new(name, email)),
        }
    }
}

impl TryFrom<&str> for Person {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        // Format: "name <email> epoch tz"; split from the right so names may
        // contain spaces.
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            anyhow::bail!("invalid person line '{}'", value);
        }

        let tz = parts[0];
        let epoch = parts[1]
            .parse::<i64>()
            .with_context(|| format!("invalid epoch in person line '{}'", value))?;
        let name_email = parts[2];

        let email_start = name_email
            .find('<')
            .ok_or_else(|| anyhow::anyhow!("person line missing '<': '{}'", value))?;
        let email_end = name_email
            .find('>')
            .ok_or_else(|| anyhow::anyhow!("person line missing '>': '{}'", value))?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        Ok(Person {
            name,
            email,
            timestamp: parse_epoch_tz(epoch, tz)?,
        })
    }
}

/// Build a fixed-offset timestamp from raw header fields.
pub fn parse_epoch_tz(epoch: i64, tz: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    let bytes = tz.as_bytes();
    if bytes.len() != 5 || (bytes[0] != b'+' && bytes[0] != b'-') {
        anyhow::bail!("invalid timezone offset '{}'", tz);
    }

    let hours = tz[1..3]
        .parse::<i32>()
        .with_context(|| format!("invalid timezone offset '{}'", tz))?;
    let minutes = tz[3..5]
        .parse::<i32>()
        .with_context(|| format!("invalid timezone offset '{}'", tz))?;

    let mut seconds = hours * 3600 + minutes * 60;
    if bytes[0] == b'-' {
        seconds = -seconds;
    }

    let offset = FixedOffset::east_opt(seconds)
        .ok_or_else(|| anyhow::anyhow!("timezone offset out of range '{}'", tz))?;
    let utc = DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| anyhow::anyhow!("epoch out of range {}", epoch))?;

    Ok(utc.with_timezone(&offset))
}

fn parse_date(date: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    // Raw header form first: "1700000000 +0000"
    if let Some((epoch, tz)) = date.split_once(' ')
        && let Ok(epoch) = epoch.parse::<i64>()
        && let Ok(parsed) = parse_epoch_tz(epoch, tz)
    {
        return Ok(parsed);
    }

    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S %z"))
        .with_context(|| format!("unparseable date '{}'", date))
}
