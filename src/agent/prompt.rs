//! System prompts and user-message builders for the planning agents.
//!
//! System prompts hold the fixed instructions. User messages carry the
//! per-request data: the question, the collection listing, the valid
//! report identifiers.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::core::{CollectionCatalog, CollectionDescriptor, FieldRole};

/// System prompt for the collection planner.
pub const PLANNER_SYSTEM_PROMPT: &str = r#"You route questions about Power BI reports to the collections of a retrieval system. Each report is made of dashboards, organised into pages that hold elements such as charts, tables and KPIs. Every collection returns a small number of documents, so select as few collections and as few documents as the question allows.

## Decision sequence

Walk these steps in order. Each step that applies adds one entry; stop as soon as the question is covered.

1. **Report names.** Does the question only need the names of the available reports, with no further data?
   - Yes: add `{"name": "report_names", "n": n}` and stop.
2. **Element index.** Does it only need the list of elements in a report, without values?
   - Yes: add `{"name": "element_names", "n": n}`. Stop unless values or further data are needed.
3. **Upload dates.** Does it ask when reports were uploaded or updated?
   - Yes: add `{"name": "upload_dates", "n": n}`. Stop unless more information is needed.
4. **Element values.** Does it need specific values of KPIs, tables, charts or other visuals?
   - Yes: add `{"name": "Elements", "n": n}` with n of at least 3, and stop.
5. **Report summary.** Does it need the global context of a whole report section, usually for a complex question?
   - Yes: add `{"name": "Report Summaries", "n": n}` (typically 1) and stop.
6. **Page text.** Does it need detailed content from specific pages of a report?
   - Yes: add `{"name": "Text Pages", "n": n}` and stop.

`n` is the smallest number of documents that answers the question. Use the default depths listed with the collections as a starting point.

## Output

Answer with a single JSON object and nothing else, no code fences, no explanation:

{"collections": [{"name": "<collection>", "n": <documents>}]}

## Examples

Question: What reports are available?
Answer: {"collections": [{"name": "report_names", "n": 10}]}

Question: When was the last report uploaded?
Answer: {"collections": [{"name": "upload_dates", "n": 5}]}"#;

/// System prompt for the structured-query (self-query filter) step.
pub const SELF_QUERY_SYSTEM_PROMPT: &str = r#"You turn a question about Power BI reports into a search query plus metadata filters.

## Instructions

1. Write `query`: the text to search for, with any report name or date you turned into a filter removed. Keep the user's language.
2. Fill `report_ids` with the report identifiers the question refers to. You MUST ONLY use identifiers from the list of valid report identifiers you are given, spelled exactly as listed. If the question names a report that is not in the list, do not include it. If no report is named, return an empty list.
3. Fill `insertion_year` (4 digits), `insertion_month` (2 digits) and `insertion_day` (2 digits) only when the question restricts the date the report was inserted. Otherwise use null.
4. Never invent filters the question does not ask for.

## Output

Answer with a single JSON object and nothing else:

{"query": "<search text>", "report_ids": ["<id>"], "insertion_year": null, "insertion_month": null, "insertion_day": null}"#;

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/pbi-context/prompts";

/// Environment variable overriding the prompt directory.
const PROMPT_DIR_ENV: &str = "PBI_PROMPT_DIR";

/// Filename of the planner prompt template.
const PLANNER_FILENAME: &str = "planner.md";
/// Filename of the structured-query prompt template.
const SELF_QUERY_FILENAME: &str = "self_query.md";

/// System prompts for both planning agents.
///
/// Loaded from template files when present, falling back to the
/// compiled-in defaults one file at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Collection planner prompt.
    pub planner: String,
    /// Structured-query prompt.
    pub self_query: String,
}

impl PromptSet {
    /// Loads prompts, falling back to compiled-in defaults.
    ///
    /// Directory resolution: `prompt_dir`, then `PBI_PROMPT_DIR`, then
    /// `~/.config/pbi-context/prompts/`.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var(PROMPT_DIR_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|content| !content.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            planner: load_file(PLANNER_FILENAME, PLANNER_SYSTEM_PROMPT),
            self_query: load_file(SELF_QUERY_FILENAME, SELF_QUERY_SYSTEM_PROMPT),
        }
    }

    /// Compiled-in defaults, without touching the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            planner: PLANNER_SYSTEM_PROMPT.to_string(),
            self_query: SELF_QUERY_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the default templates into `dir` for editing.
    ///
    /// Existing files are **not** overwritten. Returns the paths written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or a file cannot be written.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for (filename, content) in [
            (PLANNER_FILENAME, PLANNER_SYSTEM_PROMPT),
            (SELF_QUERY_FILENAME, SELF_QUERY_SYSTEM_PROMPT),
        ] {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }
        Ok(written)
    }

    /// `~/.config/pbi-context/prompts`, if the home directory is known.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Builds the planner's user message.
#[must_use]
pub fn build_planner_prompt(query: &str, catalog: &CollectionCatalog) -> String {
    format!(
        "<query>{query}</query>\n\n\
         <collections>\n{}</collections>\n\n\
         Default depths: {}.\n\n\
         Select the collections for this question.",
        catalog.planner_listing(),
        catalog.default_depths()
    )
}

/// Builds the structured-query user message.
///
/// Only the attributes carried by the planned `collections` are described.
#[must_use]
pub fn build_self_query_prompt(
    query: &str,
    report_ids: &str,
    collections: &[&CollectionDescriptor],
) -> String {
    let mut roles: Vec<FieldRole> = Vec::new();
    for role in collections
        .iter()
        .flat_map(|c| c.metadata_fields.iter().map(|f| f.role))
    {
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    let mut attributes = String::new();
    for role in &roles {
        let line = match role {
            FieldRole::ReportId => {
                "- report_ids: unique names of the reports or report sections. \
                 Only names from the valid list below are allowed."
            }
            FieldRole::InsertionYear => "- insertion_year: the year the report was inserted, 4 digits.",
            FieldRole::InsertionMonth => {
                "- insertion_month: the month the report was inserted, 2 digits."
            }
            FieldRole::InsertionDay => "- insertion_day: the day the report was inserted, 2 digits.",
        };
        let _ = writeln!(attributes, "{line}");
    }

    let reports = if report_ids.is_empty() {
        "(none available)"
    } else {
        report_ids
    };

    format!(
        "<query>{query}</query>\n\n\
         <attributes>\n{attributes}</attributes>\n\n\
         <valid_report_ids>{reports}</valid_report_ids>"
    )
}
