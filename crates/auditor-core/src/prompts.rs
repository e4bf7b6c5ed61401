//! Prompt library for the language-model backends
//!
//! Prompts are Markdown files with YAML frontmatter and `# System` / `# User`
//! sections. Resolution has two layers:
//! 1. Override in the data dir (~/.local/share/auditor/prompts/overrides/)
//! 2. Embedded default (compiled into the binary)

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod defaults {
    pub const GENERATE_AUDIT: &str = include_str!("../../../prompts/generate_audit.md");
    pub const AUDIT_CHAT: &str = include_str!("../../../prompts/audit_chat.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Monthly audit synthesis, expects a JSON object back
    GenerateAudit,
    /// Free-text answers about an audit
    AuditChat,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateAudit => "generate_audit",
            Self::AuditChat => "audit_chat",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::GenerateAudit, Self::AuditChat]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::GenerateAudit => defaults::GENERATE_AUDIT,
            Self::AuditChat => defaults::AUDIT_CHAT,
        }
    }
}

impl std::str::FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|id| id.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown prompt: {}", s))
    }
}

/// Prompt frontmatter
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Bumped whenever the expected response shape changes
    pub version: u32,
    /// Kind of work the prompt asks for (reasoning, narrative)
    pub task_type: String,
}

/// A loaded prompt
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Body after the frontmatter
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

/// A prompt with its variables filled in, split into chat roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: Option<String>,
    pub user: String,
}

impl RenderedPrompt {
    /// System and user text joined, for completion-style APIs
    pub fn combined(&self) -> String {
        match &self.system {
            Some(system) => format!("{}\n\n{}", system, self.user),
            None => self.user.clone(),
        }
    }
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Fill in `{{var}}` placeholders and resolve `{{#if var}}` blocks
    pub fn render(&self, vars: &HashMap<&str, &str>) -> RenderedPrompt {
        let system = self.system_section().map(|s| fill_template(s, vars));
        let user = match self.user_section() {
            Some(user) => fill_template(user, vars),
            None => fill_template(&self.content, vars),
        };
        RenderedPrompt { system, user }
    }
}

/// Loads prompts (override first, then embedded) and caches them
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Library using the default override directory
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Library that ignores override files
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        match self.cache.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let prompt = load_prompt(self.override_dir.as_ref(), id)?;
                Ok(entry.insert(prompt))
            }
        }
    }

    /// Load and render a prompt in one step
    pub fn render(&mut self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<RenderedPrompt> {
        Ok(self.get(id)?.render(vars))
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let override_path = self.override_path(id).filter(|p| p.exists());
                let (version, task_type) = match self.get(id) {
                    Ok(p) => (p.metadata.version, p.metadata.task_type.clone()),
                    Err(_) => (0, String::new()),
                };
                PromptInfo {
                    id: id.as_str().to_string(),
                    version,
                    task_type,
                    has_override: override_path.is_some(),
                    override_path,
                }
            })
            .collect()
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_path(id).is_some_and(|p| p.exists())
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Drop cached prompts so edited overrides are picked up
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing entry for `auditor prompts list`
#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub task_type: String,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("auditor").join("prompts").join("overrides"))
}

/// Embedded default text for a prompt (used by `auditor prompts show --default`)
pub fn default_prompt_text(id: PromptId) -> &'static str {
    id.default_content()
}

fn load_prompt(override_dir: Option<&PathBuf>, id: PromptId) -> Result<Prompt> {
    if let Some(dir) = override_dir {
        let path = dir.join(format!("{}.md", id.as_str()));
        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::InvalidData(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
                override_path: Some(path),
            });
        }
    }

    let (metadata, body) = parse_prompt(id.default_content())?;
    Ok(Prompt {
        metadata,
        content: body,
        is_override: false,
        override_path: None,
    })
}

/// Split a prompt file into frontmatter and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let metadata: PromptMetadata = serde_yaml::from_str(rest[..end].trim())
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, rest[end + 3..].trim().to_string()))
}

/// Text between `header` and the next top-level heading
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after = &content[start + header.len()..];
    let end = after.find("\n# ").unwrap_or(after.len());
    Some(after[..end].trim())
}

fn fill_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let resolved = resolve_conditionals(template, vars);
    let mut out = resolved;
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out.trim().to_string()
}

/// Keep `{{#if var}}...{{/if}}` bodies when `var` is non-empty, drop them otherwise
fn resolve_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_len) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_len].trim().to_string();
        let block_start = var_start + var_len + 2;
        let Some(block_len) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_end = block_start + block_len;
        let keep = vars
            .get(var_name.as_str())
            .is_some_and(|v| !v.trim().is_empty());

        let replacement = if keep {
            result[block_start..block_end].to_string()
        } else {
            String::new()
        };
        result = format!("{}{}{}", &result[..if_start], replacement, &result[block_end + 7..]);
    }

    result
}
