use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::station::domain::LastRainObservation;

/// Keeps the last rain observation of one station in a small JSON file.
#[derive(Debug, Clone)]
pub struct LastRainStore {
    path: PathBuf,
}

impl LastRainStore {
    pub fn new(state_dir: &Path, host: &str) -> Self {
        Self {
            path: state_dir.join(format!("last_rain_{}.json", file_name_safe(host))),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> anyhow::Result<Option<LastRainObservation>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Error reading {}", self.path.display())),
        };

        let observation = serde_json::from_str(&content)
            .with_context(|| format!("Error parsing last rain state in {}", self.path.display()))?;

        Ok(Some(observation))
    }

    pub async fn save(&self, observation: &LastRainObservation) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Error creating state directory {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(observation)?;

        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Error writing {}", self.path.display()))
    }
}

fn file_name_safe(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
