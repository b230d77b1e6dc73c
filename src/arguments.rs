use crate::compiler::CompilerDescriptor;
use crate::error::{Error, Result};
use crate::parameters::{self, parse_bool, ParameterKind, INPUT_LANGUAGE_FILTER};
use std::collections::HashMap;

/// Final value of one declared parameter for one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedArgument {
    pub name: String,
    pub value: String,
    /// Whether the parameter's visibility filter is satisfied. Inactive
    /// parameters still carry a value.
    pub active: bool,
}

/// Fully resolved arguments for one step: every declared parameter maps to
/// exactly one value, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderCompilerArguments {
    compiler: String,
    arguments: Vec<ResolvedArgument>,
}

impl ShaderCompilerArguments {
    /// Apply defaults, reject values outside a parameter's domain and
    /// evaluate visibility filters against the resolved values.
    pub fn resolve(
        descriptor: &CompilerDescriptor,
        submitted: &HashMap<String, String>,
        input_language: &str,
    ) -> Result<Self> {
        for name in submitted.keys() {
            if descriptor.parameter(name).is_none() {
                debug!(
                    "Ignoring argument '{}' not declared by '{}'",
                    name, descriptor.name
                );
            }
        }

        let mut values: Vec<(String, String)> = Vec::with_capacity(descriptor.parameters.len());
        for parameter in &descriptor.parameters {
            let value = match submitted.get(&parameter.name) {
                Some(value) => {
                    if !parameter.allows(value) {
                        return Err(Error::invalid_argument(
                            &descriptor.name,
                            &parameter.name,
                            value,
                        ));
                    }
                    match parameter.kind {
                        ParameterKind::CheckBox => value.to_ascii_lowercase(),
                        _ => value.to_owned(),
                    }
                }
                None => parameter.default_value.clone(),
            };
            values.push((parameter.name.clone(), value));
        }

        let arguments = descriptor
            .parameters
            .iter()
            .zip(values.iter())
            .map(|(parameter, (name, value))| {
                let active = match parameter.filter {
                    None => true,
                    Some(ref filter) if filter.name == INPUT_LANGUAGE_FILTER => {
                        filter.matches(input_language)
                    }
                    Some(ref filter) => values
                        .iter()
                        .find(|(other, _)| *other == filter.name)
                        .map(|(_, other_value)| filter.matches(other_value))
                        .unwrap_or(false),
                };
                ResolvedArgument {
                    name: name.clone(),
                    value: value.clone(),
                    active,
                }
            })
            .collect();

        Ok(ShaderCompilerArguments {
            compiler: descriptor.name.clone(),
            arguments,
        })
    }

    /// Name of the compiler these arguments were resolved for.
    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedArgument> {
        self.arguments.iter().find(|argument| argument.name == name)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).map(|argument| argument.value.as_str())
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get_string(name).and_then(parse_bool).unwrap_or(false)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.get(name).map(|argument| argument.active).unwrap_or(false)
    }

    /// The chosen output language for adapters with several outputs.
    pub fn output_language(&self) -> Option<&str> {
        self.get_string(parameters::OUTPUT_LANGUAGE)
    }

    /// `ExtraOptions` split into individual command-line arguments.
    pub fn extra_options(&self) -> Vec<String> {
        self.get_string(parameters::EXTRA_OPTIONS)
            .map(parameters::split_extra_options)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedArgument> {
        self.arguments.iter()
    }
}

/// The nearest earlier step run by `compiler`.
pub fn find_previous<'a>(
    previous: &'a [ShaderCompilerArguments],
    compiler: &str,
) -> Option<&'a ShaderCompilerArguments> {
    previous
        .iter()
        .rev()
        .find(|arguments| arguments.compiler() == compiler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parameters::Parameter;

    fn descriptor() -> CompilerDescriptor {
        CompilerDescriptor::new("glslc", "glslc")
            .with_input_languages(&["GLSL", "HLSL"])
            .with_parameter(Parameter::text("EntryPoint", "Entry point", "main"))
            .with_parameter(Parameter::combo("Mode", "Mode", &["x", "y"], "y"))
            .with_parameter(Parameter::check("Detail", "Detail", false).with_filter("Mode", &["x"]))
            .with_parameter(
                Parameter::check("HlslOffsets", "HLSL offsets", true)
                    .with_filter(INPUT_LANGUAGE_FILTER, &["HLSL"]),
            )
            .with_output_languages(&["SPIR-V", "SPIR-V Assembly"])
    }

    fn submitted(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn omitted_parameters_take_their_default() {
        let arguments =
            ShaderCompilerArguments::resolve(&descriptor(), &HashMap::new(), "GLSL").unwrap();
        assert_eq!(arguments.get_string("EntryPoint"), Some("main"));
        assert_eq!(arguments.get_string("Mode"), Some("y"));
        assert_eq!(arguments.output_language(), Some("SPIR-V"));
        assert_eq!(arguments.iter().count(), 5);
        assert_eq!(arguments.compiler(), "glslc");
    }

    #[test]
    fn submitted_values_override_defaults() {
        let arguments = ShaderCompilerArguments::resolve(
            &descriptor(),
            &submitted(&[("EntryPoint", "PSMain"), ("OutputLanguage", "SPIR-V Assembly")]),
            "GLSL",
        )
        .unwrap();
        assert_eq!(arguments.get_string("EntryPoint"), Some("PSMain"));
        assert_eq!(arguments.output_language(), Some("SPIR-V Assembly"));
    }

    #[test]
    fn values_outside_the_options_are_rejected() {
        let err = ShaderCompilerArguments::resolve(
            &descriptor(),
            &submitted(&[("Mode", "z")]),
            "GLSL",
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidArgument {
                compiler: "glslc".to_string(),
                parameter: "Mode".to_string(),
                value: "z".to_string(),
            }
        );
    }

    #[test]
    fn booleans_are_normalised() {
        let arguments = ShaderCompilerArguments::resolve(
            &descriptor(),
            &submitted(&[("Detail", "TRUE")]),
            "GLSL",
        )
        .unwrap();
        assert_eq!(arguments.get_string("Detail"), Some("true"));
        assert!(arguments.get_bool("Detail"));

        let err = ShaderCompilerArguments::resolve(
            &descriptor(),
            &submitted(&[("Detail", "maybe")]),
            "GLSL",
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn filters_follow_the_referenced_value() {
        let hidden = ShaderCompilerArguments::resolve(
            &descriptor(),
            &submitted(&[("Mode", "y")]),
            "GLSL",
        )
        .unwrap();
        assert!(!hidden.is_active("Detail"));
        assert_eq!(hidden.get_string("Detail"), Some("false"));

        let shown = ShaderCompilerArguments::resolve(
            &descriptor(),
            &submitted(&[("Mode", "x")]),
            "GLSL",
        )
        .unwrap();
        assert!(shown.is_active("Detail"));
        assert!(shown.is_active("EntryPoint"));
    }

    #[test]
    fn input_language_filter_uses_the_step_input() {
        let glsl =
            ShaderCompilerArguments::resolve(&descriptor(), &HashMap::new(), "GLSL").unwrap();
        assert!(!glsl.is_active("HlslOffsets"));
        assert!(glsl.get_bool("HlslOffsets"));

        let hlsl =
            ShaderCompilerArguments::resolve(&descriptor(), &HashMap::new(), "HLSL").unwrap();
        assert!(hlsl.is_active("HlslOffsets"));
    }

    #[test]
    fn unknown_arguments_are_ignored() {
        let arguments = ShaderCompilerArguments::resolve(
            &descriptor(),
            &submitted(&[("NotAParameter", "1")]),
            "GLSL",
        )
        .unwrap();
        assert!(arguments.get("NotAParameter").is_none());
    }

    #[test]
    fn previous_arguments_are_searched_backwards() {
        let metal = CompilerDescriptor::new("metal", "Metal")
            .with_input_languages(&["Metal"])
            .with_parameter(Parameter::combo("MetalVersion", "Version", &["metal3.0", "metal3.1"], "metal3.1"));
        let first = ShaderCompilerArguments::resolve(
            &metal,
            &submitted(&[("MetalVersion", "metal3.0")]),
            "Metal",
        )
        .unwrap();
        let second = ShaderCompilerArguments::resolve(&metal, &HashMap::new(), "Metal").unwrap();
        let other = ShaderCompilerArguments::resolve(&descriptor(), &HashMap::new(), "GLSL").unwrap();

        let history = vec![first, second, other];
        let found = find_previous(&history, "metal").unwrap();
        assert_eq!(found.get_string("MetalVersion"), Some("metal3.1"));
        assert!(find_previous(&history, "metallib").is_none());
    }
}
