//! Validate a triggerable configuration without scheduling anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{join_or_dash, list_table, output, CommandOutput};
use crate::domain::models::{BuilderDefinition, Config, TriggerableConfig};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Triggerable configuration (overrides `triggerable_config`)
    #[arg(short, long)]
    pub triggerable: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct BuilderOutput {
    pub key: String,
    pub name: String,
    pub slaves: Vec<String>,
    /// `type: platform/test` for each test configuration
    pub tests: Vec<String>,
    pub build_platforms: Vec<u64>,
}

impl From<&BuilderDefinition> for BuilderOutput {
    fn from(builder: &BuilderDefinition) -> Self {
        Self {
            key: builder.key.clone(),
            name: builder.name.clone(),
            slaves: builder.slave_list.clone().unwrap_or_default(),
            tests: builder
                .test_configurations
                .iter()
                .map(|configuration| {
                    format!("{}: {}/{}", configuration.type_name, configuration.platform, configuration.test)
                })
                .collect(),
            build_platforms: builder.build_configurations.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub triggerable: String,
    pub repository_groups: Vec<String>,
    pub builders: Vec<BuilderOutput>,
}

impl From<&TriggerableConfig> for ValidateOutput {
    fn from(config: &TriggerableConfig) -> Self {
        Self {
            triggerable: config.name.clone(),
            repository_groups: config.repository_groups.iter().map(|group| group.name.clone()).collect(),
            builders: config.builders.iter().map(BuilderOutput::from).collect(),
        }
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["key", "builder", "slaves", "configurations"]);
        for builder in &self.builders {
            let mut configurations = builder.tests.clone();
            configurations.extend(builder.build_platforms.iter().map(|platform| format!("build: {platform}")));
            table.add_row(vec![
                builder.key.clone(),
                builder.name.clone(),
                join_or_dash(&builder.slaves),
                join_or_dash(&configurations),
            ]);
        }
        format!(
            "Triggerable {} is valid.\nRepository groups: {}\n\n{table}",
            self.triggerable,
            join_or_dash(&self.repository_groups)
        )
    }
}

pub async fn execute(args: ValidateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let path = args.triggerable.as_ref().unwrap_or(&config.triggerable_config);
    let mut triggerable = super::connect(config, path)?;
    let validated = triggerable
        .init_syncers()
        .await
        .with_context(|| format!("{} is not a valid triggerable configuration", path.display()))?;

    output(&ValidateOutput::from(validated), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output_lists_builders() {
        let rendered = ValidateOutput {
            triggerable: "build-webkit".to_string(),
            repository_groups: vec!["webkit".to_string()],
            builders: vec![BuilderOutput {
                key: "builder-1".to_string(),
                name: "some tester".to_string(),
                slaves: vec!["tester-0".to_string()],
                tests: vec!["some-test: 65/5".to_string()],
                build_platforms: vec![65],
            }],
        };

        let human = rendered.to_human();
        assert!(human.starts_with("Triggerable build-webkit is valid."));
        assert!(human.contains("Repository groups: webkit"));
        assert!(human.contains("BUILDER"));
        assert!(human.contains("some tester"));
        assert!(human.contains("build: 65"));
        assert_eq!(rendered.to_json()["builders"][0]["slaves"][0], "tester-0");
    }
}
