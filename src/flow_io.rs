//! Reading and writing flow documents. YAML is picked by extension,
//! everything else is JSON.

use std::path::Path;

use anyhow::{Context, Result};
use soulflow_core_types::Flow;
use tokio::fs;

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

pub async fn read_flow(path: &Path) -> Result<Flow> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read flow file {}", path.display()))?;
    let flow = if is_yaml(path) {
        serde_yaml::from_str(&content).context("Failed to parse flow YAML")?
    } else {
        serde_json::from_str(&content).context("Failed to parse flow JSON")?
    };
    Ok(flow)
}

pub fn render_flow(flow: &Flow, yaml: bool) -> Result<String> {
    if yaml {
        Ok(serde_yaml::to_string(flow)?)
    } else {
        Ok(serde_json::to_string_pretty(flow)?)
    }
}

pub async fn write_flow(flow: &Flow, path: &Path) -> Result<()> {
    let rendered = render_flow(flow, is_yaml(path))?;
    fs::write(path, rendered)
        .await
        .with_context(|| format!("Failed to write flow file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulflow_core_types::{NodeType, Step};

    #[tokio::test]
    async fn yaml_and_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let flow = Flow::new("f1", "Demo").with_steps(vec![Step::new("s1", NodeType::Delay)]);

        for name in ["flow.yaml", "flow.json"] {
            let path = dir.path().join(name);
            write_flow(&flow, &path).await.unwrap();
            let loaded = read_flow(&path).await.unwrap();
            assert_eq!(loaded, flow);
        }
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = read_flow(Path::new("does/not/exist.json")).await.unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
