pub mod profile;

use crate::error::SparkError;
use directories::BaseDirs;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Variables to set and `PATH` entries to add when a module is installed.
///
/// Path tokens may reference other variables as `%KEY%`; each shell dialect
/// renders those references in its own syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvPatch {
    pub set_vars: BTreeMap<String, String>,
    pub path_additions: Vec<String>,
}

impl EnvPatch {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.set_vars.insert(key.to_string(), value.into());
    }

    pub fn add_path(&mut self, token: impl Into<String>) {
        let token = token.into();
        if !self.path_additions.contains(&token) {
            self.path_additions.push(token);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.set_vars.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.set_vars.is_empty() && self.path_additions.is_empty()
    }
}

/// Grammar of one family of startup scripts.
#[derive(Debug, PartialEq, Eq)]
pub struct Dialect {
    pub keyword: &'static str,
    /// Flag written on new statements (`set -x`).
    pub flag: Option<&'static str>,
    /// Flags accepted when parsing existing statements.
    pub flag_pattern: Option<&'static str>,
    pub kv_separator: &'static str,
    pub list_separator: char,
    pub ref_open: &'static str,
    pub ref_close: &'static str,
}

impl Dialect {
    pub const POSIX: Dialect = Dialect {
        keyword: "export",
        flag: None,
        flag_pattern: None,
        kv_separator: "=",
        list_separator: ':',
        ref_open: "$",
        ref_close: "",
    };

    pub const FISH: Dialect = Dialect {
        keyword: "set",
        flag: Some("-x"),
        flag_pattern: Some("-[a-zA-Z]+"),
        kv_separator: " ",
        list_separator: ' ',
        ref_open: "$",
        ref_close: "",
    };

    pub const CSH: Dialect = Dialect {
        keyword: "setenv",
        flag: None,
        flag_pattern: None,
        kv_separator: " ",
        list_separator: ':',
        ref_open: "${",
        ref_close: "}",
    };

    pub fn reference(&self, key: &str) -> String {
        format!("{}{}{}", self.ref_open, key, self.ref_close)
    }

    fn statement_pattern(&self) -> String {
        let flag = match self.flag_pattern {
            Some(pattern) => format!(r"(?P<flag>(?:\s+{pattern})*)"),
            None => "(?P<flag>)".to_string(),
        };
        let kv = if self.kv_separator.trim().is_empty() {
            r"\s+".to_string()
        } else {
            regex::escape(self.kv_separator)
        };
        format!(
            r"^(?P<indent>\s*){}{flag}\s+(?P<key>[A-Za-z_][A-Za-z0-9_]*){kv}(?P<value>.*?)\s*$",
            regex::escape(self.keyword)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    Csh,
    Unknown,
}

impl ShellType {
    /// Guesses the login shell from `$SHELL`.
    pub fn detect() -> Self {
        std::env::var("SHELL")
            .map(|shell| Self::from_shell_path(&shell))
            .unwrap_or(Self::Unknown)
    }

    pub fn from_shell_path(path: &str) -> Self {
        let name = Path::new(path.trim())
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("zsh") {
            Self::Zsh
        } else if name.contains("bash") {
            Self::Bash
        } else if name.contains("fish") {
            Self::Fish
        } else if name.contains("csh") {
            Self::Csh
        } else {
            Self::Unknown
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::Csh => "csh",
            Self::Unknown => "sh",
        }
    }

    pub fn dialect(&self) -> &'static Dialect {
        match self {
            Self::Fish => &Dialect::FISH,
            Self::Csh => &Dialect::CSH,
            _ => &Dialect::POSIX,
        }
    }

    /// Startup files relative to the home directory, in preference order.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Bash => &[".bash_profile", ".bashrc", ".profile"],
            Self::Zsh => &[".zshenv", ".zshrc"],
            Self::Fish => &[".config/fish/config.fish"],
            Self::Csh => &[".cshrc", ".tcshrc"],
            Self::Unknown => &[".profile"],
        }
    }

    /// The first existing candidate, or the first candidate if none exist.
    pub fn startup_file_in(&self, home: &Path) -> PathBuf {
        let candidates = self.candidates();
        candidates
            .iter()
            .map(|candidate| home.join(candidate))
            .find(|path| path.is_file())
            .unwrap_or_else(|| home.join(candidates[0]))
    }

    pub fn startup_file(&self) -> Result<PathBuf, SparkError> {
        let base = BaseDirs::new()
            .ok_or_else(|| SparkError::Config("cannot determine home directory".into()))?;
        Ok(self.startup_file_in(base.home_dir()))
    }
}

impl fmt::Display for ShellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShellType {
    type Err = SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bash" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            "fish" => Ok(Self::Fish),
            "csh" | "tcsh" => Ok(Self::Csh),
            "sh" | "unknown" => Ok(Self::Unknown),
            other => Err(SparkError::Config(format!("unsupported shell type [{other}]"))),
        }
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%").expect("placeholder pattern compiles"))
}

enum LineEdit {
    Keep,
    Drop,
    Replace(String),
}

/// Rewrites startup scripts of one dialect.
pub struct ShellAdapter {
    dialect: &'static Dialect,
    statement: Regex,
}

impl ShellAdapter {
    pub fn new(dialect: &'static Dialect) -> Result<Self, SparkError> {
        let statement = Regex::new(&dialect.statement_pattern())
            .map_err(|err| SparkError::Config(format!("invalid statement grammar: {err}")))?;
        Ok(Self { dialect, statement })
    }

    /// Removes stale statements for `vars` and `paths`, then appends one
    /// statement per variable and a single consolidated `PATH` statement.
    pub fn set_envs(&self, doc: &str, vars: &BTreeMap<String, String>, paths: &[String]) -> String {
        let lookup = |key: &str| vars.get(key).cloned().or_else(|| std::env::var(key).ok());
        let keys: Vec<String> = vars.keys().cloned().collect();
        let mut out = self.strip(doc, &keys, paths, &lookup);
        if vars.is_empty() && paths.is_empty() {
            return out;
        }

        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        for (key, value) in vars {
            out.push_str(&self.statement(key, &quote(&self.render(value))));
        }
        if !paths.is_empty() {
            let mut entries: Vec<String> = paths.iter().map(|path| quote(&self.render(path))).collect();
            entries.push(self.dialect.reference("PATH"));
            out.push_str(&self.statement("PATH", &self.join(&entries)));
        }
        out
    }

    /// Removes statements for `keys` and the `paths` entries from `PATH`.
    pub fn del_envs(&self, doc: &str, keys: &[String], paths: &[String]) -> String {
        let lookup = |key: &str| std::env::var(key).ok();
        self.strip(doc, keys, paths, &lookup)
    }

    fn strip(
        &self,
        doc: &str,
        keys: &[String],
        paths: &[String],
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> String {
        let forms: Vec<Vec<String>> = paths.iter().map(|path| self.forms(path, lookup)).collect();
        let mut out = String::with_capacity(doc.len());
        for line in doc.split_inclusive('\n') {
            match self.edit_line(line, keys, &forms) {
                LineEdit::Keep => out.push_str(line),
                LineEdit::Drop => {}
                LineEdit::Replace(replacement) => out.push_str(&replacement),
            }
        }
        out
    }

    fn edit_line(&self, line: &str, keys: &[String], forms: &[Vec<String>]) -> LineEdit {
        let body = line.trim_end_matches(['\r', '\n']);
        let eol = &line[body.len()..];
        let is_candidate = body
            .trim_start()
            .strip_prefix(self.dialect.keyword)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace));
        if !is_candidate {
            return LineEdit::Keep;
        }
        let Some(caps) = self.statement.captures(body) else {
            return LineEdit::Keep;
        };

        let key = &caps["key"];
        if key != "PATH" {
            return if keys.iter().any(|managed| managed == key) {
                LineEdit::Drop
            } else {
                LineEdit::Keep
            };
        }
        if forms.is_empty() {
            return LineEdit::Keep;
        }

        let (entries, shell_syntax) = scan_list(&caps["value"], self.dialect.list_separator);
        if shell_syntax {
            return LineEdit::Keep;
        }
        let total = entries.len();
        let kept: Vec<ListEntry> = entries
            .into_iter()
            .filter(|entry| !forms.iter().any(|form| form.contains(&entry.value)))
            .collect();
        if kept.len() == total {
            return LineEdit::Keep;
        }
        if kept.is_empty() || (kept.len() == 1 && self.is_path_ref(&kept[0].value)) {
            return LineEdit::Drop;
        }
        let kept: Vec<String> = kept.into_iter().map(|entry| entry.raw).collect();
        LineEdit::Replace(format!(
            "{}{}{} PATH{}{}{}",
            &caps["indent"],
            self.dialect.keyword,
            &caps["flag"],
            self.dialect.kv_separator,
            self.join(&kept),
            eol
        ))
    }

    fn is_path_ref(&self, entry: &str) -> bool {
        entry == self.dialect.reference("PATH") || entry == "$PATH" || entry == "${PATH}"
    }

    /// Every spelling of `token` that counts as the same `PATH` entry.
    fn forms(&self, token: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
        let mut forms = vec![
            token.to_string(),
            self.render(token),
            substitute(token, |key| Some(format!("${key}"))),
            substitute(token, |key| Some(format!("${{{key}}}"))),
        ];
        if let Some(expanded) = try_substitute(token, lookup) {
            forms.push(expanded);
        }
        forms.sort();
        forms.dedup();
        forms
    }

    fn render(&self, token: &str) -> String {
        substitute(token, |key| Some(self.dialect.reference(key)))
    }

    fn join(&self, entries: &[String]) -> String {
        entries.join(&self.dialect.list_separator.to_string())
    }

    fn statement(&self, key: &str, value: &str) -> String {
        match self.dialect.flag {
            Some(flag) => format!(
                "{} {flag} {key}{}{value}\n",
                self.dialect.keyword, self.dialect.kv_separator
            ),
            None => format!("{} {key}{}{value}\n", self.dialect.keyword, self.dialect.kv_separator),
        }
    }
}

fn substitute(token: &str, replace: impl Fn(&str) -> Option<String>) -> String {
    placeholder_pattern()
        .replace_all(token, |caps: &regex::Captures| {
            replace(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Like [`substitute`], but gives up when any reference is unresolved.
fn try_substitute(token: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    let all_resolved = placeholder_pattern()
        .captures_iter(token)
        .all(|caps| lookup(&caps[1]).is_some());
    all_resolved.then(|| substitute(token, lookup))
}

fn quote(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[derive(Clone, Copy)]
enum Scan {
    Unquoted,
    Single,
    Double,
    Escaped(Quoting),
}

#[derive(Clone, Copy)]
enum Quoting {
    Unquoted,
    Double,
}

/// One list entry, unquoted, with the text it was written as.
struct ListEntry {
    value: String,
    raw: String,
}

/// Splits a list value on `separator`, honoring quotes and backslash escapes.
/// A space separator matches any whitespace. Empty entries are dropped.
pub fn split_list(value: &str, separator: char) -> Vec<String> {
    scan_list(value, separator).0.into_iter().map(|entry| entry.value).collect()
}

/// The entries of a list value, and whether an unquoted `#`, `;`, `&` or `|`
/// shows the value is more than a plain list.
fn scan_list(value: &str, separator: char) -> (Vec<ListEntry>, bool) {
    let is_separator = |c: char| c == separator || (separator == ' ' && c.is_whitespace());
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut raw = String::new();
    let mut shell_syntax = false;
    let mut state = Scan::Unquoted;

    for c in value.chars() {
        if matches!(state, Scan::Unquoted) && is_separator(c) {
            if !current.is_empty() {
                entries.push(ListEntry {
                    value: std::mem::take(&mut current),
                    raw: std::mem::take(&mut raw),
                });
            }
            raw.clear();
            continue;
        }
        raw.push(c);
        state = match state {
            Scan::Escaped(previous) => {
                current.push(c);
                match previous {
                    Quoting::Unquoted => Scan::Unquoted,
                    Quoting::Double => Scan::Double,
                }
            }
            Scan::Single if c == '\'' => Scan::Unquoted,
            Scan::Single => {
                current.push(c);
                Scan::Single
            }
            Scan::Double if c == '"' => Scan::Unquoted,
            Scan::Double if c == '\\' => Scan::Escaped(Quoting::Double),
            Scan::Double => {
                current.push(c);
                Scan::Double
            }
            Scan::Unquoted if c == '\'' => Scan::Single,
            Scan::Unquoted if c == '"' => Scan::Double,
            Scan::Unquoted if c == '\\' => Scan::Escaped(Quoting::Unquoted),
            Scan::Unquoted => {
                shell_syntax |= matches!(c, '#' | ';' | '&' | '|');
                current.push(c);
                Scan::Unquoted
            }
        };
    }
    if !current.is_empty() {
        entries.push(ListEntry { value: current, raw });
    }
    (entries, shell_syntax)
}
