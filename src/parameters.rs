//! Parameter declarations attached to compiler adapters.

use glob::Pattern;
use regex::Regex;
use std::path::Path;

pub const VERSION: &str = "Version";
pub const OUTPUT_LANGUAGE: &str = "OutputLanguage";
pub const EXTRA_OPTIONS: &str = "ExtraOptions";
pub const ENTRY_POINT: &str = "EntryPoint";

/// Filter target naming the language entering the step rather than a parameter.
pub const INPUT_LANGUAGE_FILTER: &str = "__InputLanguage";

pub const DEFAULT_VERSION: &str = "trunk";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParameterKind {
    TextBox,
    ComboBox,
    CheckBox,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParameterFilter {
    pub name: String,
    pub values: Vec<String>,
}

impl ParameterFilter {
    pub fn matches(&self, value: &str) -> bool {
        self.values.iter().any(|allowed| allowed == value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub display_name: String,
    pub kind: ParameterKind,
    pub options: Vec<String>,
    pub default_value: String,
    pub description: String,
    pub filter: Option<ParameterFilter>,
}

impl Parameter {
    fn new(name: &str, display_name: &str, kind: ParameterKind, default_value: &str) -> Self {
        Parameter {
            name: name.to_string(),
            display_name: display_name.to_string(),
            kind,
            options: Vec::new(),
            default_value: default_value.to_string(),
            description: String::new(),
            filter: None,
        }
    }

    pub fn text(name: &str, display_name: &str, default_value: &str) -> Self {
        Parameter::new(name, display_name, ParameterKind::TextBox, default_value)
    }

    pub fn combo<S: AsRef<str>>(
        name: &str,
        display_name: &str,
        options: &[S],
        default_value: &str,
    ) -> Self {
        let mut parameter = Parameter::new(name, display_name, ParameterKind::ComboBox, default_value);
        parameter.options = options.iter().map(|option| option.as_ref().to_string()).collect();
        parameter
    }

    pub fn check(name: &str, display_name: &str, default_value: bool) -> Self {
        let default_value = if default_value { "true" } else { "false" };
        Parameter::new(name, display_name, ParameterKind::CheckBox, default_value)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Only show this parameter while `name` resolves to one of `values`.
    pub fn with_filter<S: AsRef<str>>(mut self, name: &str, values: &[S]) -> Self {
        self.filter = Some(ParameterFilter {
            name: name.to_string(),
            values: values.iter().map(|value| value.as_ref().to_string()).collect(),
        });
        self
    }

    pub fn allows(&self, value: &str) -> bool {
        match self.kind {
            ParameterKind::TextBox => true,
            ParameterKind::ComboBox => self.options.iter().any(|option| option == value),
            ParameterKind::CheckBox => parse_bool(value).is_some(),
        }
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Versions installed under `<binaries_path>/<tool>`, one directory each.
pub fn installed_versions(binaries_path: &Path, tool: &str) -> Vec<String> {
    let tool_path = binaries_path.join(tool);
    let pattern = format!("{}/*", Pattern::escape(&tool_path.to_string_lossy()));

    let mut versions: Vec<String> = match glob::glob(&pattern) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.to_string())
            })
            .collect(),
        Err(err) => {
            warn!("Invalid binaries pattern {:?}: {}", pattern, err);
            Vec::new()
        }
    };
    versions.sort();
    versions
}

pub fn version_parameter(binaries_path: &Path, tool: &str) -> Parameter {
    let mut versions = installed_versions(binaries_path, tool);
    if versions.is_empty() {
        debug!("No installed versions of {} under {:?}", tool, binaries_path);
        versions.push(DEFAULT_VERSION.to_string());
    }

    let default_version = if versions.iter().any(|version| version == DEFAULT_VERSION) {
        DEFAULT_VERSION.to_string()
    } else {
        versions[versions.len() - 1].clone()
    };

    Parameter::combo(VERSION, "Version", &versions, &default_version)
        .with_description(&format!("Version of {} to run.", tool))
}

pub fn output_parameter<S: AsRef<str>>(languages: &[S]) -> Parameter {
    let default_language = languages
        .first()
        .map(|language| language.as_ref().to_string())
        .unwrap_or_default();
    Parameter::combo(OUTPUT_LANGUAGE, "Output format", languages, &default_language)
}

pub fn extra_options_parameter() -> Parameter {
    Parameter::text(EXTRA_OPTIONS, "Extra options", "")
        .with_description("Additional command-line options, passed verbatim to the tool.")
}

pub fn entry_point_parameter(default_value: &str) -> Parameter {
    Parameter::text(ENTRY_POINT, "Entry point", default_value)
}

lazy_static! {
    static ref OPTION_TOKEN: Regex =
        Regex::new(r#"(?:[^\s"']+|"(?:[^"\\]|\\.)*"|'[^']*'|["'])+"#).unwrap();
}

/// Split free-form command-line text into arguments, honoring quotes.
/// An unbalanced quote is kept in its token as typed.
pub fn split_extra_options(text: &str) -> Vec<String> {
    OPTION_TOKEN
        .find_iter(text)
        .map(|token| {
            let token = token.as_str();
            if !token.contains('"') && !token.contains('\'') {
                return token.to_string();
            }
            if !quotes_balanced(token) {
                warn!("Unbalanced quote in extra options: {}", token);
                return token.to_string();
            }
            snailquote::unescape(token).unwrap_or_else(|err| {
                warn!("Malformed extra option {}: {}", token, err);
                token.to_string()
            })
        })
        .collect()
}

// unescape accepts an unterminated quote and drops it
fn quotes_balanced(token: &str) -> bool {
    let mut open: Option<char> = None;
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        match (open, c) {
            (Some('"'), '\\') => {
                chars.next();
            }
            (Some(quote), c) if c == quote => open = None,
            (None, '"') | (None, '\'') => open = Some(c),
            _ => {}
        }
    }
    open.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_allows_only_options() {
        let parameter = Parameter::combo("Optimization", "Optimization", &["-O0", "-O3"], "-O3");
        assert!(parameter.allows("-O0"));
        assert!(!parameter.allows("-O9"));
    }

    #[test]
    fn check_allows_booleans() {
        let parameter = Parameter::check("Debug", "Debug info", false);
        assert_eq!(parameter.default_value, "false");
        assert!(parameter.allows("true"));
        assert!(parameter.allows("FALSE"));
        assert!(!parameter.allows("yes"));
    }

    #[test]
    fn version_defaults_to_trunk_when_nothing_is_installed() {
        let root = tempfile::tempdir().unwrap();
        let parameter = version_parameter(root.path(), "dxc");
        assert_eq!(parameter.options, vec!["trunk".to_string()]);
        assert_eq!(parameter.default_value, "trunk");
    }

    #[test]
    fn version_lists_installed_directories() {
        let root = tempfile::tempdir().unwrap();
        for version in &["1.6.2104", "1.7.2207", "trunk"] {
            std::fs::create_dir_all(root.path().join("dxc").join(version)).unwrap();
        }
        std::fs::write(root.path().join("dxc").join("README"), b"not a version").unwrap();

        let parameter = version_parameter(root.path(), "dxc");
        assert_eq!(parameter.options, vec!["1.6.2104", "1.7.2207", "trunk"]);
        assert_eq!(parameter.default_value, "trunk");
    }

    #[test]
    fn version_prefers_the_newest_without_trunk() {
        let root = tempfile::tempdir().unwrap();
        for version in &["2.0", "2.1"] {
            std::fs::create_dir_all(root.path().join("mali").join(version)).unwrap();
        }
        let parameter = version_parameter(root.path(), "mali");
        assert_eq!(parameter.default_value, "2.1");
    }

    #[test]
    fn output_parameter_defaults_to_first_language() {
        let parameter = output_parameter(&["DXIL", "SPIR-V"]);
        assert_eq!(parameter.name, OUTPUT_LANGUAGE);
        assert_eq!(parameter.kind, ParameterKind::ComboBox);
        assert_eq!(parameter.default_value, "DXIL");
    }

    #[test]
    fn extra_options_respect_quotes() {
        assert_eq!(
            split_extra_options(r#"-Zi  -I "include dir" -D 'X=1 2'"#),
            vec!["-Zi", "-I", "include dir", "-D", "X=1 2"]
        );
        assert!(split_extra_options("   ").is_empty());
    }

    #[test]
    fn extra_options_keep_unbalanced_quotes() {
        assert_eq!(
            split_extra_options(r#"-I "include dir"#),
            vec!["-I", "\"include", "dir"]
        );
        assert_eq!(
            split_extra_options("-D NAME='value"),
            vec!["-D", "NAME='value"]
        );
    }
}
