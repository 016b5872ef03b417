use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::definition::{Reporting, ScriptSource};
use super::{positive_duration, AlertState, CheckContext, Evaluation};
use crate::template::FormatArg;
use crate::tools::ScriptInvocation;
use crate::{Error, Result};

const DEFAULT_TEXT: &str = "{0}";

/// Check delegated to an external script that reports its own state.
#[derive(Debug, Clone)]
pub struct ScriptAlert {
    source: ScriptSource,
}

impl ScriptAlert {
    pub fn new(source: ScriptSource) -> Self {
        Self { source }
    }

    pub fn reporting(&self) -> &Reporting {
        &self.source.reporting
    }

    pub fn default_reporting_text(_state: AlertState) -> &'static str {
        DEFAULT_TEXT
    }

    pub fn path(&self) -> &str {
        &self.source.path
    }

    /// Find the script: the path as given, then relative to the stacks,
    /// common-services and host-scripts directories.
    pub fn locate(&self) -> Result<PathBuf> {
        let path = Path::new(&self.source.path);
        if path.is_file() {
            return Ok(path.to_path_buf());
        }

        let roots = [
            &self.source.stacks_directory,
            &self.source.common_services_directory,
            &self.source.host_scripts_directory,
        ];

        roots
            .iter()
            .filter_map(|root| root.as_deref())
            .map(|root| {
                self.source
                    .path
                    .split('/')
                    .filter(|part| !part.is_empty())
                    .fold(root.to_path_buf(), |acc, part| acc.join(part))
            })
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                let searched: Vec<String> = roots
                    .iter()
                    .filter_map(|root| root.as_deref())
                    .map(|root| root.display().to_string())
                    .collect();
                Error::Script(format!(
                    "Unable to find '{}' as an absolute path or part of {}",
                    self.source.path,
                    if searched.is_empty() {
                        "any script directory".to_string()
                    } else {
                        searched.join(" or ")
                    }
                ))
            })
    }

    fn parameters(&self) -> BTreeMap<String, serde_json::Value> {
        self.source
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }

    /// `Ok(None)` when the script reports `SKIPPED`.
    pub(crate) async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Option<Evaluation>> {
        let script = self.locate()?;
        let timeout = self
            .source
            .timeout
            .map(positive_duration)
            .transpose()?
            .flatten()
            .unwrap_or_else(|| ctx.timeouts.script());

        let invocation = ScriptInvocation {
            configurations: ctx.configurations.clone(),
            parameters: self.parameters(),
            host_name: ctx.host_name.to_string(),
            timeout,
        };

        debug!(script = %script.display(), timeout = ?timeout, "running alert script");
        let output = ctx.tools.scripts.run(&script, &invocation).await?;

        if output.state.eq_ignore_ascii_case("SKIPPED") {
            return Ok(None);
        }

        let state = output.state.parse::<AlertState>().map_err(|_| {
            Error::Script(format!(
                "{} returned an unrecognized state '{}'",
                self.source.path, output.state
            ))
        })?;
        let args = output.text.iter().map(FormatArg::from).collect();

        Ok(Some(Evaluation::new(state, args)))
    }
}
