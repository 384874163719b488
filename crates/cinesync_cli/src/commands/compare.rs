use clap::ValueEnum;
use cinesync::sync::SyncCandidate;
use cinesync::{Engine, SyncDirection};
use console::style;
use tabled::{Table, Tabled, settings::Style};

/// Output format for listings.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Display struct for one sync candidate.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
pub(crate) struct CandidateDisplay {
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Year")]
    year: String,
    #[tabled(rename = "Rating")]
    source_rating: String,
    #[tabled(rename = "Converted")]
    target_rating: String,
    #[tabled(rename = "Target ID")]
    target_id: String,
    #[tabled(rename = "Rated On")]
    rated_on: String,
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl From<&SyncCandidate> for CandidateDisplay {
    fn from(candidate: &SyncCandidate) -> Self {
        Self {
            title: candidate.title().to_string(),
            year: or_dash(candidate.movie.year),
            source_rating: or_dash(candidate.source_rating()),
            target_rating: or_dash(candidate.target_rating()),
            target_id: or_dash(candidate.target_id()),
            rated_on: or_dash(candidate.source_date()),
        }
    }
}

/// Render candidates as a rounded table or pretty JSON.
pub(crate) fn render_candidates(
    candidates: &[SyncCandidate],
    output: OutputFormat,
) -> Result<String, serde_json::Error> {
    let rows: Vec<CandidateDisplay> = candidates.iter().map(CandidateDisplay::from).collect();
    match output {
        OutputFormat::Json => serde_json::to_string_pretty(&rows),
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            Ok(table.to_string())
        }
    }
}

/// Handle `cinesync compare`: list what a sync in `direction` would write.
pub(crate) fn handle_compare(
    engine: &Engine,
    direction: SyncDirection,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let candidates = engine.diff(direction.source())?;

    if matches!(output, OutputFormat::Table) && candidates.is_empty() {
        println!(
            "{} Nothing to sync: every {} rating is already on {}.",
            style("✓").green(),
            direction.source().display_name(),
            direction.target().display_name()
        );
        return Ok(());
    }

    println!("{}", render_candidates(&candidates, output)?);
    if matches!(output, OutputFormat::Table) {
        let incomplete = candidates
            .iter()
            .filter(|c| c.target_id().is_none() || c.target_rating().is_none())
            .count();
        println!(
            "\n{} ratings missing on {} ({} without a {} id)",
            candidates.len(),
            direction.target().display_name(),
            incomplete,
            direction.target().display_name()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cinesync::MergedMovie;

    fn candidate() -> SyncCandidate {
        let movie = MergedMovie {
            douban_id: Some("1292052".into()),
            imdb_id: None,
            title: "The Shawshank Redemption".into(),
            year: Some(1994),
            rating_douban: Some(5),
            date_rated_douban: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..MergedMovie::default()
        };
        SyncCandidate::new(SyncDirection::DoubanToImdb, movie)
    }

    #[test]
    fn test_display_converts_and_marks_missing_fields() {
        let row = CandidateDisplay::from(&candidate());
        assert_eq!(row.source_rating, "5");
        assert_eq!(row.target_rating, "10");
        assert_eq!(row.target_id, "-");
        assert_eq!(row.rated_on, "2024-03-01");
        assert_eq!(row.year, "1994");
    }

    #[test]
    fn test_render_table_has_headers() {
        let out = render_candidates(&[candidate()], OutputFormat::Table).unwrap();
        assert!(out.contains("Title"));
        assert!(out.contains("Converted"));
        assert!(out.contains("The Shawshank Redemption"));
    }

    #[test]
    fn test_render_json() {
        let out = render_candidates(&[candidate()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["target_rating"], "10");
    }
}
