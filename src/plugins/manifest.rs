//! Manifest plugins for hookbot
//!
//! A manifest plugin is a directory containing a `plugin.json` that declares
//! hooks without any Rust code. Each hook reacts to a set of event names,
//! optionally filtered by a body regex and by admin status, and sends one or
//! more line templates.
//!
//! # Example plugin.json
//!
//! ```json
//! {
//!   "name": "greeter",
//!   "version": "1.0.0",
//!   "description": "Say hello to people joining",
//!   "requires": ["channels"],
//!   "hooks": [
//!     {
//!       "name": "greet",
//!       "events": ["JOIN"],
//!       "send": ["PRIVMSG {{target}} :welcome, {{nick}}!"]
//!     },
//!     {
//!       "name": "uptime",
//!       "events": ["PRIVMSG"],
//!       "body": "^!uptime$",
//!       "admin_only": true,
//!       "send": ["PRIVMSG {{reply}} :{{me}} is up"]
//!     }
//!   ]
//! }
//! ```
//!
//! # Placeholders
//!
//! `{{name}}`, `{{origin}}`, `{{target}}`, `{{body}}`, `{{nick}}`,
//! `{{ident}}`, `{{host}}`, `{{reply}}` (channel or sender) and `{{me}}`
//! (the bot's nick). Absent values render as an empty string.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::connection::BotHandle;
use crate::error::{BotError, Result};
use crate::hooks::Hook;
use crate::protocol::{Event, IrcCommands};

use super::builtin::auth;
use super::loader::LoadContext;
use super::types::{Plugin, PluginOrigin, PluginSource};

/// File name of a plugin manifest inside its directory.
pub const MANIFEST_FILE: &str = "plugin.json";

/// Matches any event name.
pub const ANY_EVENT: &str = "*";

static PLUGIN_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_\-]{0,63}$").expect("plugin name pattern is valid")
});

static HOOK_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{0,63}$").expect("hook name pattern is valid")
});

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"));

/// The parsed `plugin.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Plugins loaded before this one.
    #[serde(default)]
    pub requires: Vec<String>,
    pub hooks: Vec<ManifestHookDef>,
}

/// One declarative hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestHookDef {
    pub name: String,
    /// Event names to react to; `*` matches every event.
    pub events: Vec<String>,
    /// Regex the event body must match.
    #[serde(default)]
    pub body: Option<String>,
    /// Only react to configured admins.
    #[serde(default)]
    pub admin_only: bool,
    /// Line templates sent, in order, when the hook fires.
    pub send: Vec<String>,
}

/// Validate a manifest for correctness.
///
/// Checks:
/// - plugin name is 1-64 characters: alphanumerics, `_` and `-`
/// - version is non-empty
/// - at least one hook, each with a valid name, at least one event and
///   at least one template
/// - body patterns compile
/// - templates contain no line breaks
pub fn validate_manifest(manifest: &PluginManifest) -> Result<()> {
    if !PLUGIN_NAME_RE.is_match(&manifest.name) {
        return Err(BotError::Plugin(format!(
            "Invalid plugin name '{}': must be 1-64 alphanumeric characters, '_' or '-', starting with alphanumeric",
            manifest.name
        )));
    }

    if manifest.version.trim().is_empty() {
        return Err(BotError::Plugin(format!(
            "Plugin '{}' has an empty version string",
            manifest.name
        )));
    }

    if manifest.hooks.is_empty() {
        return Err(BotError::Plugin(format!(
            "Plugin '{}' must define at least one hook",
            manifest.name
        )));
    }

    for hook in &manifest.hooks {
        if !HOOK_NAME_RE.is_match(&hook.name) {
            return Err(BotError::Plugin(format!(
                "Invalid hook name '{}' in plugin '{}': must be 1-64 alphanumeric characters and underscores, starting with a letter",
                hook.name, manifest.name
            )));
        }
        if hook.events.is_empty() {
            return Err(BotError::Plugin(format!(
                "Hook '{}' in plugin '{}' listens to no events",
                hook.name, manifest.name
            )));
        }
        if let Some(pattern) = &hook.body {
            Regex::new(pattern).map_err(|e| {
                BotError::Plugin(format!(
                    "Hook '{}' in plugin '{}' has an invalid body pattern: {}",
                    hook.name, manifest.name, e
                ))
            })?;
        }
        if hook.send.is_empty() {
            return Err(BotError::Plugin(format!(
                "Hook '{}' in plugin '{}' sends nothing",
                hook.name, manifest.name
            )));
        }
        if hook.send.iter().any(|t| t.contains('\r') || t.contains('\n')) {
            return Err(BotError::Plugin(format!(
                "Hook '{}' in plugin '{}' has a template with a line break",
                hook.name, manifest.name
            )));
        }
    }

    Ok(())
}

/// SHA-256 of the manifest bytes, hex encoded.
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Read, parse and validate `<dir>/plugin.json`.
pub fn load_manifest(dir: &Path) -> Result<ManifestPlugin> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(BotError::Plugin(format!(
            "No {} found in {}",
            MANIFEST_FILE,
            dir.display()
        )));
    }

    let content = fs::read(&manifest_path).map_err(|e| {
        BotError::Plugin(format!("Failed to read {}: {}", manifest_path.display(), e))
    })?;
    let manifest: PluginManifest = serde_json::from_slice(&content)?;
    validate_manifest(&manifest)?;

    Ok(ManifestPlugin {
        manifest,
        dir: dir.to_path_buf(),
        fingerprint: fingerprint(&content),
    })
}

/// A validated manifest plugin ready to load.
#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    pub manifest: PluginManifest,
    pub dir: PathBuf,
    fingerprint: String,
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn version(&self) -> &str {
        &self.manifest.version
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn origin(&self) -> PluginOrigin {
        PluginOrigin::Manifest(self.dir.clone())
    }

    fn fingerprint(&self) -> Option<String> {
        Some(self.fingerprint.clone())
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> Result<()> {
        for dependency in &self.manifest.requires {
            ctx.require(dependency)?;
        }
        if self.manifest.hooks.iter().any(|h| h.admin_only) {
            ctx.require(auth::NAME)?;
        }

        for def in &self.manifest.hooks {
            let rule = Arc::new(CompiledHook::compile(def)?);
            ctx.register_hook(&def.name, move |bot| {
                Box::new(ManifestHook {
                    rule: Arc::clone(&rule),
                    bot: bot.clone(),
                }) as Box<dyn Hook>
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
struct CompiledHook {
    events: Vec<String>,
    body: Option<Regex>,
    admin_only: bool,
    send: Vec<String>,
}

impl CompiledHook {
    fn compile(def: &ManifestHookDef) -> Result<Self> {
        let body = def
            .body
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| BotError::Plugin(format!("invalid body pattern: {}", e)))?;
        Ok(Self {
            events: def.events.clone(),
            body,
            admin_only: def.admin_only,
            send: def.send.clone(),
        })
    }
}

struct ManifestHook {
    rule: Arc<CompiledHook>,
    bot: BotHandle,
}

impl Hook for ManifestHook {
    fn matches(&self, event: &Event) -> bool {
        if !self
            .rule
            .events
            .iter()
            .any(|e| e == ANY_EVENT || event.is(e))
        {
            return false;
        }
        if let Some(pattern) = &self.rule.body {
            match event.body.as_deref() {
                Some(body) if pattern.is_match(body) => {}
                _ => return false,
            }
        }
        !self.rule.admin_only || self.bot.with_config(|config| auth::is_admin(event, config))
    }

    fn call(&mut self, event: &Event) -> Result<()> {
        let me = self.bot.nick();
        for template in &self.rule.send {
            self.bot.send_line(&render(template, event, &me));
        }
        Ok(())
    }
}

/// Fill the `{{...}}` placeholders of `template` from `event`.
///
/// The template is scanned once, so substituted text is never expanded
/// again. Unknown placeholders are left as written.
pub fn render(template: &str, event: &Event, me: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let value = match &caps[1] {
                "name" => Some(event.name()),
                "origin" => Some(event.origin.as_deref().unwrap_or("")),
                "target" => Some(event.target.as_deref().unwrap_or("")),
                "body" => Some(event.body_str()),
                "nick" => Some(event.nick().unwrap_or("")),
                "ident" => Some(event.ident().unwrap_or("")),
                "host" => Some(event.host().unwrap_or("")),
                "reply" => Some(event.reply_target().unwrap_or("")),
                "me" => Some(me),
                _ => None,
            };
            value.unwrap_or(&caps[0]).to_string()
        })
        .into_owned()
}

/// Plugins found in manifest directories.
///
/// Each configured directory is scanned for subdirectories containing a
/// `plugin.json`. Directories are searched in order; entries within a
/// directory in name order.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    dirs: Vec<PathBuf>,
}

impl ManifestSource {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn plugin_dirs(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for dir in &self.dirs {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "Plugin directory does not exist, skipping");
                continue;
            }
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to read plugin directory");
                    continue;
                }
            };
            let mut subdirs: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_dir() && path.join(MANIFEST_FILE).exists())
                .collect();
            subdirs.sort();
            found.extend(subdirs);
        }
        found
    }
}

impl PluginSource for ManifestSource {
    fn label(&self) -> String {
        let dirs: Vec<String> = self.dirs.iter().map(|d| d.display().to_string()).collect();
        format!("manifests [{}]", dirs.join(", "))
    }

    fn discover(&self) -> Vec<String> {
        let mut names = Vec::new();
        for dir in self.plugin_dirs() {
            match load_manifest(&dir) {
                Ok(plugin) => {
                    info!(
                        plugin = %plugin.manifest.name,
                        version = %plugin.manifest.version,
                        hooks = plugin.manifest.hooks.len(),
                        "Discovered plugin"
                    );
                    if !names.contains(&plugin.manifest.name) {
                        names.push(plugin.manifest.name);
                    }
                }
                Err(e) => warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to load plugin manifest, skipping"
                ),
            }
        }
        names
    }

    fn find(&self, name: &str) -> Result<Option<Box<dyn Plugin>>> {
        for dir in self.plugin_dirs() {
            let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
            match load_manifest(&dir) {
                Ok(plugin) if plugin.manifest.name == name => return Ok(Some(Box::new(plugin))),
                Ok(_) => {}
                Err(e) if dir_name == name => return Err(e),
                Err(_) => {}
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hooks::HookRegistry;
    use crate::plugins::{BuiltinSource, PluginLoader};
    use serde_json::json;
    use tempfile::TempDir;

    fn valid_manifest() -> PluginManifest {
        PluginManifest {
            name: "greeter".to_string(),
            version: "1.0.0".to_string(),
            description: "Greets people".to_string(),
            requires: vec![],
            hooks: vec![ManifestHookDef {
                name: "greet".to_string(),
                events: vec!["JOIN".to_string()],
                body: None,
                admin_only: false,
                send: vec!["PRIVMSG {{target}} :welcome, {{nick}}!".to_string()],
            }],
        }
    }

    fn write_plugin_json(dir: &Path, manifest: &PluginManifest) {
        fs::create_dir_all(dir).unwrap();
        let content = serde_json::to_string_pretty(manifest).unwrap();
        fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    // ---- validation ----

    #[test]
    fn test_validate_valid_manifest() {
        assert!(validate_manifest(&valid_manifest()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let mut manifest = valid_manifest();
        manifest.name = "-leading".to_string();
        assert!(validate_manifest(&manifest).is_err());

        let mut manifest = valid_manifest();
        manifest.hooks[0].name = "9lives".to_string();
        assert!(validate_manifest(&manifest).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_parts() {
        let mut manifest = valid_manifest();
        manifest.version = "  ".to_string();
        assert!(validate_manifest(&manifest).is_err());

        let mut manifest = valid_manifest();
        manifest.hooks.clear();
        assert!(validate_manifest(&manifest).is_err());

        let mut manifest = valid_manifest();
        manifest.hooks[0].events.clear();
        assert!(validate_manifest(&manifest).is_err());

        let mut manifest = valid_manifest();
        manifest.hooks[0].send.clear();
        assert!(validate_manifest(&manifest).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_regex_and_line_breaks() {
        let mut manifest = valid_manifest();
        manifest.hooks[0].body = Some("([".to_string());
        let err = validate_manifest(&manifest).unwrap_err();
        assert!(err.to_string().contains("invalid body pattern"));

        let mut manifest = valid_manifest();
        manifest.hooks[0].send = vec!["PRIVMSG #a :x\r\nQUIT".to_string()];
        assert!(validate_manifest(&manifest).is_err());
    }

    // ---- loading ----

    #[test]
    fn test_load_manifest_fingerprint_tracks_content() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("greeter");
        write_plugin_json(&dir, &valid_manifest());

        let first = load_manifest(&dir).unwrap();
        assert_eq!(first.fingerprint().unwrap().len(), 64);
        assert_eq!(first.origin(), PluginOrigin::Manifest(dir.clone()));

        let mut changed = valid_manifest();
        changed.version = "1.1.0".to_string();
        write_plugin_json(&dir, &changed);
        let second = load_manifest(&dir).unwrap();
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_load_manifest_missing_and_malformed() {
        let tmp = TempDir::new().unwrap();
        let err = load_manifest(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("No plugin.json found"));

        fs::write(tmp.path().join(MANIFEST_FILE), "{ broken json").unwrap();
        assert!(matches!(load_manifest(tmp.path()), Err(BotError::Json(_))));
    }

    #[test]
    fn test_source_discovers_and_skips_invalid() {
        let tmp = TempDir::new().unwrap();
        write_plugin_json(&tmp.path().join("greeter"), &valid_manifest());
        fs::create_dir(tmp.path().join("broken")).unwrap();
        fs::write(tmp.path().join("broken").join(MANIFEST_FILE), "{").unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        fs::write(tmp.path().join("stray.txt"), "hello").unwrap();

        let source = ManifestSource::new(vec![
            tmp.path().to_path_buf(),
            PathBuf::from("/nonexistent/hookbot/plugins"),
        ]);
        assert_eq!(source.discover(), vec!["greeter"]);
        assert!(source.find("greeter").unwrap().is_some());
        assert!(source.find("unknown").unwrap().is_none());
        assert!(source.find("broken").is_err());
    }

    // ---- hooks ----

    #[test]
    fn test_render_placeholders() {
        let event = Event::new("PRIVMSG")
            .with_origin("alice!a@h")
            .with_target("hookbot")
            .with_body("hi");
        let line = render(
            "PRIVMSG {{reply}} :{{nick}}/{{ident}}/{{host}} said '{{body}}' to {{me}} via {{name}} ({{origin}})",
            &event,
            "hookbot",
        );
        assert_eq!(
            line,
            "PRIVMSG alice :alice/a/h said 'hi' to hookbot via PRIVMSG (alice!a@h)"
        );

        let bare = render("{{nick}}|{{target}}", &Event::new("PING"), "me");
        assert_eq!(bare, "|");
    }

    #[test]
    fn test_render_keeps_user_text_literal() {
        let event = Event::new("PRIVMSG")
            .with_origin("{{me}}!a@secret.host")
            .with_target("#chan")
            .with_body("{{host}} {{me}} {{body}}");
        let line = render("PRIVMSG {{reply}} :{{nick}} said {{body}}", &event, "hookbot");
        assert_eq!(line, "PRIVMSG #chan :{{me}} said {{host}} {{me}} {{body}}");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let event = Event::new("PING").with_body("x");
        assert_eq!(render("{{uptime}} {{body}}", &event, "me"), "{{uptime}} x");
    }

    #[test]
    fn test_manifest_hooks_fire_through_loader() {
        let tmp = TempDir::new().unwrap();
        let mut manifest = valid_manifest();
        manifest.requires = vec!["default".to_string()];
        manifest.hooks.push(ManifestHookDef {
            name: "uptime".to_string(),
            events: vec!["PRIVMSG".to_string()],
            body: Some("^!uptime$".to_string()),
            admin_only: true,
            send: vec!["PRIVMSG {{reply}} :{{me}} is up".to_string()],
        });
        write_plugin_json(&tmp.path().join("greeter"), &manifest);

        let mut loader = PluginLoader::new(vec![
            Box::new(BuiltinSource::new()),
            Box::new(ManifestSource::new(vec![tmp.path().to_path_buf()])),
        ]);
        let mut registry = HookRegistry::new();
        let plugin = loader.get("greeter", &mut registry).unwrap();
        assert_eq!(plugin.requires, vec!["default", "auth"]);
        assert_eq!(plugin.hooks, vec!["greet", "uptime"]);

        let mut config = Config::default();
        config.set("auth", json!({ "admins": ["alice"] }));
        let (bot, mut receivers) = BotHandle::detached(config);

        let greet = registry.iter().find(|t| t.name() == "greet").unwrap();
        let mut hook = greet.build(&bot);
        let join = Event::new("JOIN")
            .with_origin("bob!b@x")
            .with_target("#rust");
        assert!(hook.matches(&join));
        hook.call(&join).unwrap();
        assert_eq!(
            receivers.outbound.try_recv().unwrap(),
            "PRIVMSG #rust :welcome, bob!\r\n"
        );

        let uptime = registry.iter().find(|t| t.name() == "uptime").unwrap();
        let hook = uptime.build(&bot);
        let from_admin = Event::new("PRIVMSG")
            .with_origin("alice!a@h")
            .with_target("#rust")
            .with_body("!uptime");
        let from_other = Event::new("PRIVMSG")
            .with_origin("mallory!m@h")
            .with_target("#rust")
            .with_body("!uptime");
        assert!(hook.matches(&from_admin));
        assert!(!hook.matches(&from_other));
        assert!(!hook.matches(&from_admin.clone().with_body("!uptime now")));
    }
}
