use std::{collections::HashMap, path::Path, sync::Arc};

use crate::BotConfig;
use plugin_core::{Plugin, PluginRegistry, PluginSpec, factory::PluginFactory};
use plugin_forward::ForwardConfig;
use tracing::warn;

fn factories() -> Vec<Box<dyn PluginFactory>> {
    vec![
        Box::new(plugin_forward::ForwardPlugin),
        Box::new(plugin_forward::CancelPlugin),
        Box::new(plugin_forward::ProbePlugin),
        Box::new(plugin_chatid::ChatIdPlugin),
        Box::new(plugin_help::HelpPlugin),
    ]
}

/// Build the registry from the YAML specs, the built-in defaults and
/// `<plugins_dir>/<id>/config.yaml` overrides, in increasing precedence:
/// defaults (with `forward` carrying the CLI delays), YAML, per-plugin file.
pub async fn build_registry(
    config: &BotConfig,
    forward: &ForwardConfig,
    plugins_dir: &Path,
) -> Arc<PluginRegistry> {
    let mut plugins: HashMap<&'static str, Arc<dyn Plugin>> = HashMap::new();
    let mut defaults = Vec::new();
    for factory in factories() {
        factory.register_defaults(&mut defaults);
        let plugin = factory.build();
        plugins.insert(plugin.id(), plugin);
    }
    for spec in &mut defaults {
        if spec.id == "forward" {
            spec.config = serde_yaml::to_value(forward).unwrap_or_default();
        }
    }

    let mut specs = config.plugins.clone().unwrap_or_default();
    for default in defaults {
        merge_default_spec(&mut specs, default);
    }

    let registry = Arc::new(PluginRegistry::new());
    for mut spec in specs {
        let Some(plugin) = plugins.get(spec.id.as_str()) else {
            warn!("Unknown plugin ID: {}", spec.id);
            continue;
        };
        if let Some(file_cfg) = load_plugin_config(plugins_dir, &spec.id) {
            spec.config = merge_yaml(file_cfg, spec.config);
        }
        registry.register(spec, Arc::clone(plugin)).await;
    }

    registry
}

fn merge_yaml(file_cfg: serde_yaml::Value, spec_cfg: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value::{Mapping, Null, Sequence};
    match (file_cfg, spec_cfg) {
        (Mapping(mut a), Mapping(b)) => {
            for (k, v_b) in b {
                match a.get_mut(&k) {
                    Some(v_a) => {
                        let merged = merge_yaml(v_a.clone(), v_b);
                        *v_a = merged;
                    }
                    None => {
                        a.insert(k, v_b);
                    }
                }
            }
            Mapping(a)
        }
        (Sequence(mut a), Sequence(b)) => {
            a.extend(b);
            Sequence(a)
        }
        (Null, b) => b,
        (a, _b) => a,
    }
}

fn load_plugin_config(root: &Path, id: &str) -> Option<serde_yaml::Value> {
    let path = root.join(id).join("config.yaml");
    match std::fs::read_to_string(&path) {
        Ok(s) => match serde_yaml::from_str::<serde_yaml::Value>(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(plugin = %id, file = %path.display(), error = %e, "Failed to parse plugin config YAML");
                None
            }
        },
        Err(e) => {
            if path.exists() {
                warn!(plugin = %id, file = %path.display(), error = %e, "Failed to read plugin config file");
            }
            None
        }
    }
}

fn merge_default_spec(specs: &mut Vec<PluginSpec>, default: PluginSpec) {
    if let Some(existing) = specs.iter_mut().find(|s| s.id == default.id) {
        for cmd in default.triggers.commands {
            if !existing
                .triggers
                .commands
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&cmd))
            {
                existing.triggers.commands.push(cmd);
            }
        }
        // Values set in the YAML win over defaults.
        existing.config = merge_yaml(existing.config.clone(), default.config);
    } else {
        specs.push(default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(yaml: &str) -> BotConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn cli_delays() -> ForwardConfig {
        ForwardConfig {
            base_delay_secs: 2.0,
            fail_delay_secs: 3.0,
        }
    }

    #[tokio::test]
    async fn defaults_register_every_command() {
        let tmp = TempDir::new().unwrap();
        let registry =
            build_registry(&BotConfig::default(), &ForwardConfig::default(), tmp.path()).await;

        for cmd in ["/forward", "/cancel", "/test", "/resolve", "/chatid", "/start", "/help"] {
            assert!(registry.entry_by_command(cmd).await.is_some(), "{cmd}");
        }
    }

    #[tokio::test]
    async fn cli_delays_reach_forward_unless_yaml_sets_them() {
        let tmp = TempDir::new().unwrap();
        let registry = build_registry(&BotConfig::default(), &cli_delays(), tmp.path()).await;
        let entry = registry.entry("forward").await.unwrap();
        assert_eq!(ForwardConfig::from_spec(&entry.spec), cli_delays());

        let yaml = config(
            "plugins:\n  - id: forward\n    config:\n      base_delay_secs: 0.5\n",
        );
        let registry = build_registry(&yaml, &cli_delays(), tmp.path()).await;
        let cfg = ForwardConfig::from_spec(&registry.entry("forward").await.unwrap().spec);
        assert_eq!(cfg.base_delay_secs, 0.5);
        assert_eq!(cfg.fail_delay_secs, 3.0);
    }

    #[tokio::test]
    async fn plugin_dir_config_overrides_everything() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("forward");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "fail_delay_secs: 9.0\n").unwrap();

        let registry = build_registry(&BotConfig::default(), &cli_delays(), tmp.path()).await;
        let cfg = ForwardConfig::from_spec(&registry.entry("forward").await.unwrap().spec);
        assert_eq!(cfg.base_delay_secs, 2.0);
        assert_eq!(cfg.fail_delay_secs, 9.0);
    }

    #[tokio::test]
    async fn yaml_can_disable_and_add_commands() {
        let tmp = TempDir::new().unwrap();
        let yaml = config(
            "plugins:\n  - id: chatid\n    enabled: false\n  - id: forward\n    triggers:\n      commands: [\"/copy\"]\n  - id: nope\n",
        );
        let registry = build_registry(&yaml, &ForwardConfig::default(), tmp.path()).await;

        assert!(!registry.is_enabled("chatid").await);
        assert!(registry.entry_by_command("/copy").await.is_some());
        assert!(registry.entry_by_command("/forward").await.is_some());
        assert!(registry.entry("nope").await.is_none());
    }

    #[test]
    fn merge_prefers_first_value_and_fills_gaps() {
        let a: serde_yaml::Value = serde_yaml::from_str("x: 1\nnested: {y: 2}").unwrap();
        let b: serde_yaml::Value = serde_yaml::from_str("x: 5\nz: 3\nnested: {w: 4}").unwrap();
        let merged = merge_yaml(a, b);
        let expected: serde_yaml::Value =
            serde_yaml::from_str("x: 1\nnested: {y: 2, w: 4}\nz: 3").unwrap();
        assert_eq!(merged, expected);
        assert_eq!(merge_yaml(serde_yaml::Value::Null, expected.clone()), expected);
    }
}
