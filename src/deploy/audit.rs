// ABOUTME: Audit trail returned by the remote deployer, and the checks run against it.
// ABOUTME: Entries may carry YAML tags like `!<deployable>`; the tag is not needed.

use serde::Deserialize;

use super::error::DeployError;
use super::scalar;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audits {
    #[serde(default)]
    pub process_state: Option<String>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub audits: Vec<Audit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Warning {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Audit {
    #[serde(default)]
    pub operation: String,
    /// Log level audits name their category instead.
    #[serde(default, alias = "category")]
    pub name: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Change {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "scalar::deserialize")]
    pub old_value: Option<String>,
    #[serde(default, deserialize_with = "scalar::deserialize")]
    pub new_value: Option<String>,
}

impl Audits {
    /// An empty document has no audits.
    pub fn parse_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let audits: Option<Self> = serde_yaml::from_str(text)?;
        Ok(audits.unwrap_or_default())
    }

    /// Checks that a deploy of `name` added or changed it to `version`.
    pub fn expect_deploy(&self, name: &str, version: &str) -> Result<&Audit, DeployError> {
        let prefix = format!("expected deploy audit for {name}");
        let audit = self.single(name, &prefix)?;
        if !matches!(audit.operation.as_str(), "add" | "change") {
            return Err(DeployError::UnexpectedAudit(format!(
                "{prefix} to be in [add, change] but is a {}",
                audit.operation
            )));
        }
        let change = audit.change("version").ok_or_else(|| {
            DeployError::UnexpectedAudit(format!("{prefix} to change version."))
        })?;
        if change.new_value.as_deref() != Some(version) {
            return Err(DeployError::UnexpectedAudit(format!(
                "{prefix} to change version to {version}, but changed to {}.",
                change.new_value.as_deref().unwrap_or("nothing")
            )));
        }
        tracing::debug!(
            "audit deploy change {} version {:?} -> {:?}",
            name,
            change.old_value,
            change.new_value
        );
        Ok(audit)
    }

    /// Checks that an undeploy removed `name`.
    pub fn expect_undeploy(&self, name: &str) -> Result<&Audit, DeployError> {
        let prefix = format!("expected undeploy audit for {name}");
        let audit = self.single(name, &prefix)?;
        if audit.operation != "remove" {
            return Err(DeployError::UnexpectedAudit(format!(
                "{prefix} to be in [remove] but is a {}",
                audit.operation
            )));
        }
        Ok(audit)
    }

    fn single(&self, name: &str, prefix: &str) -> Result<&Audit, DeployError> {
        let matching: Vec<&Audit> = self
            .audits
            .iter()
            .filter(|audit| audit.name == name)
            .collect();
        match matching.as_slice() {
            [audit] => Ok(*audit),
            [] => Err(DeployError::UnexpectedAudit(prefix.to_string())),
            many => Err(DeployError::UnexpectedAudit(format!(
                "{prefix} to be unique but found {}",
                many.len()
            ))),
        }
    }
}

impl Audit {
    pub fn change(&self, name: &str) -> Option<&Change> {
        self.changes.iter().find(|change| change.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYED: &str = "\
processState: running
audits:
- !<deployable>
  operation: change
  name: foo
  changes:
  - name: version
    old-value: 1.0.0
    new-value: 1.0.2
";

    #[test]
    fn parses_tagged_audits() {
        let audits = Audits::parse_yaml(DEPLOYED).unwrap();
        assert_eq!(audits.process_state.as_deref(), Some("running"));
        assert_eq!(
            audits.audits,
            vec![Audit {
                operation: "change".to_string(),
                name: "foo".to_string(),
                changes: vec![Change {
                    name: "version".to_string(),
                    old_value: Some("1.0.0".to_string()),
                    new_value: Some("1.0.2".to_string()),
                }],
            }]
        );
    }

    #[test]
    fn category_names_an_audit() {
        let audits = Audits::parse_yaml(
            "audits:\n- !loglevel\n  operation: add\n  category: com.example\n",
        )
        .unwrap();
        assert_eq!(audits.audits[0].name, "com.example");
    }

    #[test]
    fn numeric_versions_are_strings() {
        let audits = Audits::parse_yaml(
            "audits:\n- operation: add\n  name: foo\n  changes:\n  - name: version\n    new-value: 2.0\n",
        )
        .unwrap();
        let change = audits.audits[0].change("version").unwrap();
        assert_eq!(change.old_value, None);
        assert_eq!(change.new_value.as_deref(), Some("2.0"));
    }

    #[test]
    fn warnings_are_texts() {
        let audits =
            Audits::parse_yaml("warnings:\n- text: careful\naudits: []\n").unwrap();
        assert_eq!(
            audits.warnings,
            vec![Warning {
                text: "careful".to_string()
            }]
        );
        assert!(audits.audits.is_empty());
    }

    #[test]
    fn empty_document_has_no_audits() {
        assert_eq!(Audits::parse_yaml("").unwrap(), Audits::default());
    }

    #[test]
    fn rejects_non_mapping() {
        let err = Audits::parse_yaml("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("invalid type"));
    }

    #[test]
    fn expect_deploy_accepts_matching_version() {
        let audits = Audits::parse_yaml(DEPLOYED).unwrap();
        assert!(audits.expect_deploy("foo", "1.0.2").is_ok());
    }

    #[test]
    fn expect_deploy_rejects_other_version() {
        let audits = Audits::parse_yaml(DEPLOYED).unwrap();
        let err = audits.expect_deploy("foo", "1.0.3").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected deploy audit for foo to change version to 1.0.3, but changed to 1.0.2."
        );
    }

    #[test]
    fn expect_deploy_rejects_missing_entry_and_wrong_operation() {
        let audits = Audits::parse_yaml(DEPLOYED).unwrap();
        assert_eq!(
            audits.expect_deploy("bar", "1.0.2").unwrap_err().to_string(),
            "expected deploy audit for bar"
        );
        assert_eq!(
            audits.expect_undeploy("foo").unwrap_err().to_string(),
            "expected undeploy audit for foo to be in [remove] but is a change"
        );
    }

    #[test]
    fn expect_deploy_requires_version_change() {
        let audits =
            Audits::parse_yaml("audits:\n- operation: add\n  name: foo\n  changes: []\n").unwrap();
        assert_eq!(
            audits.expect_deploy("foo", "1").unwrap_err().to_string(),
            "expected deploy audit for foo to change version."
        );
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let audits = Audits::parse_yaml(
            "audits:\n- operation: remove\n  name: foo\n- operation: remove\n  name: foo\n",
        )
        .unwrap();
        assert_eq!(
            audits.expect_undeploy("foo").unwrap_err().to_string(),
            "expected undeploy audit for foo to be unique but found 2"
        );
    }
}
