use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::errors::{Error, Result};
use crate::lookup::{CommonLookup, EnvironmentLookup};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Question {
    pub variable: String,
    pub label: String,
    pub description: String,
    #[serde(deserialize_with = "de_scalar_string")]
    pub default: String,
    pub required: bool,
}

/// Defaults may be typed scalars in the document; answers are always text.
fn de_scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s),
        _ => Err(serde::de::Error::custom("question default must be a scalar")),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogSection {
    questions: Vec<Question>,
}

/// Variables answered from a questions file. Interactive prompting is not
/// wired in, so each question resolves to its declared default. A missing
/// file yields an empty lookup.
pub fn question_lookup(
    path: &Path,
    parent: Option<Box<dyn EnvironmentLookup>>,
) -> Result<CommonLookup> {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(CommonLookup::new(HashMap::new(), parent));
        }
        Err(err) => {
            return Err(Error::ResourceLookup {
                path: path.display().to_string(),
                file: String::new(),
                reason: err.to_string(),
            });
        }
    };

    let questions = parse_questions(&contents)?;

    let mut variables = HashMap::new();
    for (key, question) in questions {
        if !question.default.is_empty() {
            variables.insert(key, question.default);
        }
    }

    Ok(CommonLookup::new(variables, parent))
}

/// The catalog section lives either under a `.catalog` pseudo-service or
/// under a top-level `catalog`/`.catalog` key.
pub fn parse_questions(contents: &[u8]) -> Result<HashMap<String, Question>> {
    let document: Value = serde_yaml::from_slice(contents)?;

    let section = catalog_value(&document)
        .map(|value| serde_yaml::from_value::<CatalogSection>(value.clone()))
        .transpose()?
        .unwrap_or_default();

    Ok(section
        .questions
        .into_iter()
        .map(|question| (question.variable.clone(), question))
        .collect())
}

fn catalog_value(document: &Value) -> Option<&Value> {
    if let Some(services) = document.get("services") {
        if let Some(catalog) = services.get(".catalog") {
            return Some(catalog);
        }
    }

    document
        .get("catalog")
        .or_else(|| document.get(".catalog"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_become_answers() {
        let contents = b"
.catalog:
  questions:
    - variable: SCALE
      label: Scale
      default: '2'
    - variable: EMPTY
      label: Unanswered
";

        let questions = parse_questions(contents).unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(questions["SCALE"].default, "2");
        assert_eq!(questions["EMPTY"].default, "");
    }

    #[test]
    fn test_v2_catalog_service() {
        let contents = b"
version: '2'
services:
  .catalog:
    questions:
      - variable: NAME
        default: corral
";

        let questions = parse_questions(contents).unwrap();

        assert_eq!(questions["NAME"].default, "corral");
    }
}
