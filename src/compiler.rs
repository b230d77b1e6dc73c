use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::parameters::{self, parse_bool, Parameter, ParameterKind, INPUT_LANGUAGE_FILTER};
use crate::process::{ProcessOutput, ProcessRunner};
use crate::result::CompilerResult;
use crate::utilities::{path_exists, TempDir, TempFile};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Static description of one adapter: identity, accepted languages and the
/// parameters a caller may set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerDescriptor {
    pub name: String,
    pub display_name: String,
    pub url: String,
    pub description: String,
    pub input_languages: Vec<String>,
    pub output_languages: Vec<String>,
    pub parameters: Vec<Parameter>,
}

impl CompilerDescriptor {
    pub fn new(name: &str, display_name: &str) -> Self {
        CompilerDescriptor {
            name: name.to_string(),
            display_name: display_name.to_string(),
            url: String::new(),
            description: String::new(),
            input_languages: Vec::new(),
            output_languages: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_input_languages(mut self, languages: &[&str]) -> Self {
        self.input_languages = languages.iter().map(|language| language.to_string()).collect();
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declare the produced languages. More than one adds the implicit
    /// `OutputLanguage` parameter, so call this after the other parameters.
    pub fn with_output_languages(mut self, languages: &[&str]) -> Self {
        self.output_languages = languages.iter().map(|language| language.to_string()).collect();
        if languages.len() > 1 {
            self.parameters.push(parameters::output_parameter(languages));
        }
        self
    }

    pub fn accepts(&self, language: &str) -> bool {
        self.input_languages.iter().any(|input| input == language)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    /// The output language when it does not depend on a chosen parameter.
    pub fn fixed_output_language(&self) -> Option<&str> {
        if self.output_languages.len() == 1 {
            Some(&self.output_languages[0])
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::descriptor(&self.display_name, "name is empty"));
        }

        if self.input_languages.is_empty() {
            return Err(Error::descriptor(&self.name, "no input languages declared"));
        }

        let mut names = HashSet::new();
        for parameter in &self.parameters {
            if !names.insert(parameter.name.as_str()) {
                return Err(Error::descriptor(
                    &self.name,
                    format!("parameter '{}' is declared twice", parameter.name),
                ));
            }

            match parameter.kind {
                ParameterKind::ComboBox if !parameter.allows(&parameter.default_value) => {
                    return Err(Error::descriptor(
                        &self.name,
                        format!(
                            "default '{}' of '{}' is not one of its options",
                            parameter.default_value, parameter.name
                        ),
                    ));
                }
                ParameterKind::CheckBox if parse_bool(&parameter.default_value).is_none() => {
                    return Err(Error::descriptor(
                        &self.name,
                        format!("default of '{}' is not a boolean", parameter.name),
                    ));
                }
                _ => {}
            }
        }

        for parameter in &self.parameters {
            if let Some(ref filter) = parameter.filter {
                let known = filter.name == INPUT_LANGUAGE_FILTER
                    || (filter.name != parameter.name && names.contains(filter.name.as_str()));
                if !known {
                    return Err(Error::descriptor(
                        &self.name,
                        format!(
                            "'{}' is filtered on unknown parameter '{}'",
                            parameter.name, filter.name
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Per-process resources handed to every adapter invocation.
#[derive(Clone, Debug)]
pub struct CompileContext {
    binaries_path: PathBuf,
    temp_path: PathBuf,
    runner: ProcessRunner,
}

impl CompileContext {
    pub fn new(config: &Config) -> Self {
        CompileContext::with_runner(
            &config.binaries_path,
            &config.temp_path,
            ProcessRunner::from_config(config),
        )
    }

    pub fn with_runner(binaries_path: &Path, temp_path: &Path, runner: ProcessRunner) -> Self {
        CompileContext {
            binaries_path: binaries_path.to_path_buf(),
            temp_path: temp_path.to_path_buf(),
            runner,
        }
    }

    pub fn binaries_path(&self) -> &Path {
        &self.binaries_path
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Stage `code` in a temp file that is deleted when the handle drops.
    pub fn temp_file(&self, code: &ShaderCode) -> Result<TempFile> {
        TempFile::from_shader_code(&self.temp_path, code)
    }

    /// A fresh working directory under the temp path, removed on drop.
    pub fn temp_dir(&self) -> Result<TempDir> {
        TempDir::create(&self.temp_path)
    }

    /// Locate `<binaries>/<tool>/<Version>/<executable>`, falling back to the
    /// `.exe` build of the tool when no native one is installed.
    pub fn binary_path(
        &self,
        tool: &str,
        arguments: &ShaderCompilerArguments,
        executable: &str,
    ) -> PathBuf {
        let version = arguments
            .get_string(parameters::VERSION)
            .unwrap_or(parameters::DEFAULT_VERSION);
        let directory = self.binaries_path.join(tool).join(version);

        let native = directory.join(executable);
        if path_exists(&native) {
            return native;
        }

        let windows = directory.join(format!("{}.exe", executable));
        if path_exists(&windows) {
            return windows;
        }

        native
    }

    pub fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput> {
        self.runner.run(program, args)
    }
}

/// One external tool wrapped behind a uniform contract.
///
/// `compile` is only called with code in one of the declared input languages.
/// Tool failures are returned as an unsuccessful `CompilerResult`; `Err` is
/// reserved for environment problems (missing binaries, unwritable temp dir).
pub trait ShaderCompiler: Send + Sync {
    fn descriptor(&self) -> &CompilerDescriptor;

    fn compile(
        &self,
        context: &CompileContext,
        code: &ShaderCode,
        arguments: &ShaderCompilerArguments,
        previous: &[ShaderCompilerArguments],
    ) -> Result<CompilerResult>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}
