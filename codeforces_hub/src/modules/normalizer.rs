use codeforces_hub_libs::{codeforces::model::RawProblem, CodeforcesError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Tags that only make sense at document level and would break the page embedding a fragment.
static DOCUMENT_LEVEL_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/?\s*(html|head|body)\b").unwrap());

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub contest_id: u64,
    pub index: String,
    pub title: String,
    pub statement: String,
    pub input_spec: Option<String>,
    pub output_spec: Option<String>,
    pub examples: Option<String>,
    pub note: Option<String>,
}

/// Statement object of JSON-speaking upstreams (Polygon-style keys and their aliases).
#[derive(Deserialize, Debug, Default)]
struct StatementJson {
    #[serde(alias = "title")]
    name: Option<String>,
    #[serde(alias = "statement")]
    legend: Option<String>,
    #[serde(alias = "inputSpec", alias = "inputSpecification")]
    input: Option<String>,
    #[serde(alias = "outputSpec", alias = "outputSpecification")]
    output: Option<String>,
    #[serde(alias = "sampleTests")]
    examples: Option<String>,
    #[serde(alias = "note")]
    notes: Option<String>,
}

pub struct ProblemNormalizer {
    statement: Selector,
    title: Selector,
    input_spec: Selector,
    output_spec: Selector,
    examples: Selector,
    note: Selector,
}

impl Default for ProblemNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProblemNormalizer {
    pub fn new() -> Self {
        let statement = Selector::parse(".problem-statement").unwrap();
        let title = Selector::parse(".header > .title").unwrap();
        let input_spec = Selector::parse(".input-specification").unwrap();
        let output_spec = Selector::parse(".output-specification").unwrap();
        let examples = Selector::parse(".sample-tests").unwrap();
        let note = Selector::parse(".note").unwrap();

        Self {
            statement,
            title,
            input_spec,
            output_spec,
            examples,
            note,
        }
    }

    /// Maps an upstream payload onto [`Problem`].
    ///
    /// HTML fragments are passed through as the upstream serves them. Sanitizing them is
    /// left to whoever renders them.
    pub fn normalize(&self, contest_id: u64, index: &str, raw: &RawProblem) -> Result<Problem> {
        let problem = match raw {
            RawProblem::Html(html) => self.parse_html(contest_id, index, html)?,
            RawProblem::Json(value) => self.parse_json(contest_id, index, value)?,
        };

        check_fragment("statement", &problem.statement)?;
        for (section, fragment) in [
            ("input specification", &problem.input_spec),
            ("output specification", &problem.output_spec),
            ("examples", &problem.examples),
            ("note", &problem.note),
        ] {
            if let Some(fragment) = fragment {
                check_fragment(section, fragment)?;
            }
        }

        Ok(problem)
    }

    fn parse_html(&self, contest_id: u64, index: &str, html: &str) -> Result<Problem> {
        let html = Html::parse_document(html);

        let root = html.select(&self.statement).next().ok_or_else(|| {
            CodeforcesError::MalformedUpstream(format!(
                "problem {}{}: statement block not found",
                contest_id, index
            ))
        })?;

        let title = root
            .select(&self.title)
            .next()
            .map(|title| title.text().collect::<String>())
            .map(|title| strip_index(&title, index))
            .filter(|title| !title.is_empty())
            .ok_or_else(|| {
                CodeforcesError::MalformedUpstream(format!(
                    "problem {}{}: title not found",
                    contest_id, index
                ))
            })?;

        // The legend is the only direct child without a class.
        let statement = root
            .children()
            .filter_map(ElementRef::wrap)
            .find(|child| child.value().name() == "div" && child.value().attr("class").is_none())
            .map(|legend| legend.inner_html())
            .ok_or_else(|| {
                CodeforcesError::MalformedUpstream(format!(
                    "problem {}{}: statement not found",
                    contest_id, index
                ))
            })?;

        let section = |selector: &Selector| root.select(selector).next().map(|e| e.inner_html());

        Ok(Problem {
            contest_id,
            index: index.to_string(),
            title,
            statement,
            input_spec: section(&self.input_spec),
            output_spec: section(&self.output_spec),
            examples: section(&self.examples),
            note: section(&self.note),
        })
    }

    fn parse_json(&self, contest_id: u64, index: &str, value: &Value) -> Result<Problem> {
        let json: StatementJson = serde_json::from_value(value.clone()).map_err(|e| {
            CodeforcesError::MalformedUpstream(format!(
                "problem {}{}: unexpected statement shape: {}",
                contest_id, index, e
            ))
        })?;

        let title = json
            .name
            .map(|name| strip_index(&name, index))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                CodeforcesError::MalformedUpstream(format!(
                    "problem {}{}: title not found",
                    contest_id, index
                ))
            })?;
        let statement = json.legend.ok_or_else(|| {
            CodeforcesError::MalformedUpstream(format!(
                "problem {}{}: statement not found",
                contest_id, index
            ))
        })?;

        Ok(Problem {
            contest_id,
            index: index.to_string(),
            title,
            statement,
            input_spec: json.input,
            output_spec: json.output,
            examples: json.examples,
            note: json.notes,
        })
    }
}

/// `"A. Watermelon"` -> `"Watermelon"`
fn strip_index(title: &str, index: &str) -> String {
    let title = title.trim();
    title
        .strip_prefix(index)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(str::trim)
        .unwrap_or(title)
        .to_string()
}

fn check_fragment(section: &str, fragment: &str) -> Result<()> {
    if fragment.contains('\0') {
        return Err(CodeforcesError::MalformedUpstream(format!(
            "{} contains NUL characters",
            section
        )));
    }
    if let Some(tag) = DOCUMENT_LEVEL_TAGS.find(fragment) {
        return Err(CodeforcesError::MalformedUpstream(format!(
            "{} contains document level markup {:?}",
            section,
            tag.as_str()
        )));
    }

    Ok(())
}
