// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Rules read from a yaml or json file.
///
/// ```yaml
/// name: cmap
/// types:
///   KT: string
///   VT: github.com/x/y#z.Value
/// fields:
///   RemoveMe:
/// rules:
///   selector:cm.HashFn: hash.Fn
/// tags: [fast]
/// ```
///
/// A missing or empty target deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    /// Output package name.
    pub name: Option<String>,
    pub types: BTreeMap<String, Option<String>>,
    pub fields: BTreeMap<String, Option<String>>,
    pub funcs: BTreeMap<String, Option<String>>,
    pub selectors: BTreeMap<String, Option<String>>,
    /// Fully spelled `kind:name` keys.
    pub rules: BTreeMap<String, Option<String>>,
    /// Extra build tags.
    pub tags: Vec<String>,
}

impl RuleConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&contents),
            Some("json") => Self::from_json_str(&contents),
            _ => bail!(
                "Unsupported rule file `{}`. Must be yaml or json.",
                path.display()
            ),
        };
        config.with_context(|| format!("Failed to load {}", path.display()))
    }

    /// `kind:name` keys and targets, an empty target meaning delete.
    pub fn raw_rules(&self) -> Vec<(String, String)> {
        let sections = [
            ("type", &self.types),
            ("field", &self.fields),
            ("func", &self.funcs),
            ("selector", &self.selectors),
        ];
        let mut out: Vec<(String, String)> = sections
            .iter()
            .flat_map(|(kind, table)| {
                table
                    .iter()
                    .map(move |(name, target)| (format!("{kind}:{name}"), target.clone().unwrap_or_default()))
            })
            .collect();
        out.extend(
            self.rules
                .iter()
                .map(|(key, target)| (key.clone(), target.clone().unwrap_or_default())),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_rules() -> Result<()> {
        let config = RuleConfig::from_yaml_str(
            "name: cmap\ntypes:\n  KT: string\n  VT:\nfields:\n  RemoveMe: \"-\"\nrules:\n  selector:cm.HashFn: hash.Fn\ntags: [fast]\n",
        )?;
        assert_eq!(config.name.as_deref(), Some("cmap"));
        assert_eq!(config.tags, ["fast"]);
        assert_eq!(
            config.raw_rules(),
            [
                ("type:KT".to_string(), "string".to_string()),
                ("type:VT".to_string(), String::new()),
                ("field:RemoveMe".to_string(), "-".to_string()),
                ("selector:cm.HashFn".to_string(), "hash.Fn".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn json_rules() -> Result<()> {
        let config = RuleConfig::from_json_str(r#"{"funcs": {"DoStuff": null}}"#)?;
        assert_eq!(
            config.raw_rules(),
            [("func:DoStuff".to_string(), String::new())]
        );
        Ok(())
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(RuleConfig::from_yaml_str("typez:\n  KT: int\n").is_err());
    }

    #[test]
    fn file_extension_picks_the_format() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let yaml = dir.path().join("rules.yaml");
        std::fs::write(&yaml, "types:\n  KT: int\n")?;
        assert_eq!(RuleConfig::from_file(&yaml)?.raw_rules().len(), 1);

        let txt = dir.path().join("rules.txt");
        std::fs::write(&txt, "")?;
        assert!(RuleConfig::from_file(&txt).is_err());
        Ok(())
    }
}
