use std::collections::HashMap;
use std::path::Path;

use crate::errors::{Error, Result};
use crate::lookup::{CommonLookup, EnvironmentLookup};
use crate::utils::parse_key_val;

/// Variables from a `KEY=value` file. Comment and blank lines are skipped,
/// unparsable lines are warnings.
pub fn env_file_lookup(
    path: &Path,
    parent: Option<Box<dyn EnvironmentLookup>>,
) -> Result<CommonLookup> {
    let contents = std::fs::read_to_string(path).map_err(|err| Error::ResourceLookup {
        path: path.display().to_string(),
        file: String::new(),
        reason: err.to_string(),
    })?;

    Ok(CommonLookup::new(parse_env_lines(&contents), parent))
}

pub fn parse_env_lines(contents: &str) -> HashMap<String, String> {
    let mut variables = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_key_val(line) {
            Some((key, value)) => {
                variables.insert(key, value);
            }
            None => log::warn!("Failed to parse env file line: {line}"),
        }
    }

    variables
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_env_lines() {
        let variables = parse_env_lines("# comment\n\nFOO=bar\nBAZ=a=b\nnope\n");

        assert_eq!(variables.len(), 2);
        assert_eq!(variables.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(variables.get("BAZ"), Some(&"a=b".to_string()));
    }
}
