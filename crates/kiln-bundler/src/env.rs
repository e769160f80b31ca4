//! Client environment: values visible to application code and the HTML template.

use std::collections::BTreeMap;

use kiln_config::KilnConfig;

/// Environment exposed to the browser build.
///
/// The raw map feeds `%KEY%` placeholders in the HTML template. The same
/// values, JSON-stringified, replace `process.env.KEY` in scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnvironment {
    raw: BTreeMap<String, String>,
    defines: Vec<(String, String)>,
}

impl ClientEnvironment {
    /// Build the environment from config and the current process environment.
    pub fn from_config(config: &KilnConfig) -> Self {
        Self::with_process_vars(config, std::env::vars())
    }

    /// Build the environment from config and an explicit set of process variables.
    pub fn with_process_vars(
        config: &KilnConfig,
        process_vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut raw: BTreeMap<String, String> = config.env.vars.clone();

        if let Some(prefix) = config.env.prefix.as_deref().filter(|p| !p.is_empty()) {
            raw.extend(process_vars.into_iter().filter(|(key, _)| key.starts_with(prefix)));
        }

        raw.insert("NODE_ENV".to_string(), config.env.node_env.clone());
        raw.insert("PUBLIC_URL".to_string(), config.public_url());

        let mut defines: Vec<(String, String)> = raw
            .iter()
            .map(|(key, value)| (format!("process.env.{key}"), json_string(value)))
            .collect();

        if let Some(name) = config.theme.define_as.as_deref() {
            let themes: serde_json::Map<String, serde_json::Value> = config
                .theme
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            defines.push((name.to_string(), serde_json::Value::Object(themes).to_string()));
        }

        defines.extend(config.define.iter().map(|(k, v)| (k.clone(), v.clone())));
        defines.sort();
        defines.dedup_by(|a, b| a.0 == b.0);

        Self { raw, defines }
    }

    pub fn raw(&self) -> &BTreeMap<String, String> {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    /// Compile-time replacements as `(expression, js source)` pairs, sorted by expression.
    pub fn defines(&self) -> &[(String, String)] {
        &self.defines
    }

    /// Replace every `%KEY%` with its raw value. Unknown keys are left alone.
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end) if is_env_key(&after[..end]) && self.raw.contains_key(&after[..end]) => {
                    out.push_str(&self.raw[&after[..end]]);
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push('%');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn is_env_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(config: &KilnConfig) -> ClientEnvironment {
        ClientEnvironment::with_process_vars(
            config,
            [
                ("APP_API".to_string(), "https://api.example.com".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ],
        )
    }

    #[test]
    fn raw_map_holds_prefixed_and_builtin_values() {
        let mut config = KilnConfig::default();
        config.public_path = "/app/".into();
        config.env.vars.insert("TITLE".into(), "Demo".into());

        let env = env(&config);
        assert_eq!(env.get("NODE_ENV"), Some("production"));
        assert_eq!(env.get("PUBLIC_URL"), Some("/app"));
        assert_eq!(env.get("APP_API"), Some("https://api.example.com"));
        assert_eq!(env.get("TITLE"), Some("Demo"));
        assert_eq!(env.get("HOME"), None);
    }

    #[test]
    fn defines_are_json_stringified() {
        let mut config = KilnConfig::default();
        config.theme.variables.insert("primary-color".into(), "#1DA57A".into());
        config.define.insert("__DEV__".into(), "false".into());

        let env = env(&config);
        let defines: BTreeMap<_, _> = env.defines().iter().cloned().collect();
        assert_eq!(defines["process.env.NODE_ENV"], "\"production\"");
        assert_eq!(defines["THEMES"], r##"{"primary-color":"#1DA57A"}"##);
        assert_eq!(defines["__DEV__"], "false");
    }

    #[test]
    fn interpolation_replaces_known_keys_only() {
        let mut config = KilnConfig::default();
        config.env.vars.insert("TITLE".into(), "Demo".into());
        let env = env(&config);

        assert_eq!(
            env.interpolate("<title>%TITLE%</title><a href=\"%PUBLIC_URL%/x\">100%</a>%NOPE%"),
            "<title>Demo</title><a href=\"/x\">100%</a>%NOPE%"
        );
    }

    #[test]
    fn disabling_theme_define_drops_the_constant() {
        let mut config = KilnConfig::default();
        config.theme.define_as = None;
        assert!(env(&config).defines().iter().all(|(k, _)| k != "THEMES"));
    }
}
