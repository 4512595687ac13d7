//! Section tokenizer for Bundler's `Gemfile.lock` format.
//!
//! Produces a structural view of the file; normalization into
//! [`Dependency`](crate::ir::Dependency) records happens in the parent module.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

/// `name (version[-platform])`, four-space indent.
static SPEC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\s()!]+) \(([^-()\s]+)(?:-([^()\s]+))?\)$").unwrap());

/// `name` or `name (requirement)`, six-space indent under a spec.
static NESTED_DEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\s()!]+)(?: \(([^()]+)\))?$").unwrap());

/// `name`, `name (requirement)` or `name!`, two-space indent under DEPENDENCIES.
static DECLARED_DEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\s()!]+)(?: \(([^()]+)\))?(!)?$").unwrap());

/// `key: value` or `specs:` inside a source section.
static SOURCE_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z_]+):(?: (.*))?$").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Gem,
    Git,
    Path,
    Plugin,
}

impl SourceKind {
    fn from_header(header: &str) -> Option<Self> {
        match header {
            "GEM" => Some(Self::Gem),
            "GIT" => Some(Self::Git),
            "PATH" => Some(Self::Path),
            "PLUGIN SOURCE" => Some(Self::Plugin),
            _ => None,
        }
    }
}

/// One `GEM`/`GIT`/`PATH`/`PLUGIN SOURCE` block.
#[derive(Debug, Clone)]
pub struct LockSource {
    pub kind: SourceKind,
    pub remote: Option<String>,
    pub specs: Vec<LockSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpec {
    pub name: String,
    pub version: String,
    pub platform: Option<String>,
    pub dependencies: Vec<String>,
}

/// An entry of the `DEPENDENCIES` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub name: String,
    pub requirement: Option<String>,
    /// `name!`: pinned to a git or path source.
    pub pinned: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedLockfile {
    pub sources: Vec<LockSource>,
    pub platforms: Vec<String>,
    pub dependencies: Vec<DeclaredDependency>,
    pub ruby_version: Option<String>,
    pub bundled_with: Option<String>,
}

impl ParsedLockfile {
    /// All specs across sources, in file order.
    pub fn specs(&self) -> impl Iterator<Item = (&LockSource, &LockSpec)> {
        self.sources
            .iter()
            .flat_map(|source| source.specs.iter().map(move |spec| (source, spec)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Source { in_specs: bool },
    Platforms,
    Dependencies,
    RubyVersion,
    BundledWith,
    Skipped,
}

/// Tokenize lock file text.
pub fn parse(content: &str) -> Result<ParsedLockfile, SyntaxError> {
    let mut lockfile = ParsedLockfile::default();
    let mut section = Section::None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let err = |message: String| SyntaxError {
            line: line_no,
            message,
        };

        if raw.starts_with("<<<<<<<") || raw.starts_with("=======") || raw.starts_with(">>>>>>>")
        {
            return Err(err("merge conflict marker".into()));
        }
        if raw.trim().is_empty() {
            continue;
        }

        let body = raw.trim_start_matches(' ');
        let indent = raw.len() - body.len();
        if body.starts_with('\t') {
            return Err(err("tab indentation is not allowed".into()));
        }
        let body = body.trim_end();

        if indent == 0 {
            section = open_section(&mut lockfile, body);
            continue;
        }

        match section {
            Section::None => {
                return Err(err(format!("indented line outside any section: '{}'", body)));
            }
            Section::Source { in_specs } => {
                let source = lockfile
                    .sources
                    .last_mut()
                    .ok_or_else(|| err("source section without header".into()))?;
                match indent {
                    2 => {
                        let caps = SOURCE_ATTR_RE
                            .captures(body)
                            .ok_or_else(|| err(format!("malformed source attribute '{}'", body)))?;
                        let key = &caps[1];
                        let value = caps.get(2).map(|m| m.as_str().trim().to_string());
                        if key == "specs" {
                            section = Section::Source { in_specs: true };
                        } else if key == "remote" {
                            let remote = value
                                .filter(|v| !v.is_empty())
                                .ok_or_else(|| err("empty remote".into()))?;
                            if source.kind == SourceKind::Gem && Url::parse(&remote).is_err() {
                                return Err(err(format!("invalid remote URL '{}'", remote)));
                            }
                            source.remote = Some(remote);
                        }
                    }
                    4 => {
                        if !in_specs {
                            return Err(err(format!("spec '{}' outside of a specs block", body)));
                        }
                        let caps = SPEC_RE
                            .captures(body)
                            .ok_or_else(|| err(format!("malformed spec entry '{}'", body)))?;
                        source.specs.push(LockSpec {
                            name: caps[1].to_string(),
                            version: caps[2].to_string(),
                            platform: caps.get(3).map(|m| m.as_str().to_string()),
                            dependencies: Vec::new(),
                        });
                    }
                    6 => {
                        let spec = source
                            .specs
                            .last_mut()
                            .filter(|_| in_specs)
                            .ok_or_else(|| err(format!("dependency '{}' without a spec", body)))?;
                        let caps = NESTED_DEP_RE
                            .captures(body)
                            .ok_or_else(|| err(format!("malformed dependency '{}'", body)))?;
                        spec.dependencies.push(caps[1].to_string());
                    }
                    _ => return Err(err(format!("unexpected indentation of {} spaces", indent))),
                }
            }
            Section::Platforms => {
                if indent != 2 {
                    return Err(err(format!("unexpected indentation of {} spaces", indent)));
                }
                lockfile.platforms.push(body.to_string());
            }
            Section::Dependencies => {
                if indent != 2 {
                    return Err(err(format!("unexpected indentation of {} spaces", indent)));
                }
                let caps = DECLARED_DEP_RE
                    .captures(body)
                    .ok_or_else(|| err(format!("malformed DEPENDENCIES entry '{}'", body)))?;
                lockfile.dependencies.push(DeclaredDependency {
                    name: caps[1].to_string(),
                    requirement: caps.get(2).map(|m| m.as_str().to_string()),
                    pinned: caps.get(3).is_some(),
                });
            }
            Section::RubyVersion => lockfile.ruby_version = Some(body.to_string()),
            Section::BundledWith => lockfile.bundled_with = Some(body.to_string()),
            Section::Skipped => {}
        }
    }

    Ok(lockfile)
}

fn open_section(lockfile: &mut ParsedLockfile, header: &str) -> Section {
    if let Some(kind) = SourceKind::from_header(header) {
        lockfile.sources.push(LockSource {
            kind,
            remote: None,
            specs: Vec::new(),
        });
        return Section::Source { in_specs: false };
    }
    match header {
        "PLATFORMS" => Section::Platforms,
        "DEPENDENCIES" => Section::Dependencies,
        "RUBY VERSION" => Section::RubyVersion,
        "BUNDLED WITH" => Section::BundledWith,
        other => {
            tracing::debug!(section = other, "skipping lock file section");
            Section::Skipped
        }
    }
}
