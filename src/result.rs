use crate::code::ShaderCode;
use base64::{engine::general_purpose, Engine as _};

/// Display name of the entry carrying the tool's own diagnostics.
pub const OUTPUT: &str = "Output";

/// Failure code attached to steps that failed; only its presence matters.
pub const FAILURE_CODE: i32 = 1;

/// One labeled view of a step (diagnostics, disassembly, summary).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerOutput {
    pub display_name: String,
    pub language: Option<String>,
    pub value: Option<String>,
}

impl CompilerOutput {
    pub fn new(display_name: &str, language: Option<&str>, value: Option<String>) -> Self {
        CompilerOutput {
            display_name: display_name.to_string(),
            language: language.map(|language| language.to_string()),
            value,
        }
    }

    /// The plain-text `Output` entry.
    pub fn output<T: Into<String>>(value: T) -> Self {
        CompilerOutput::new(OUTPUT, None, Some(value.into()))
    }
}

/// Result of one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerResult {
    pub success: bool,
    /// Code handed to the next step; always present on success.
    pub pipeable_output: Option<ShaderCode>,
    pub failure_code: Option<i32>,
    pub outputs: Vec<CompilerOutput>,
}

impl CompilerResult {
    pub fn success(code: ShaderCode, outputs: Vec<CompilerOutput>) -> Self {
        CompilerResult {
            success: true,
            pipeable_output: Some(code),
            failure_code: None,
            outputs,
        }
    }

    pub fn failure(failure_code: i32, outputs: Vec<CompilerOutput>) -> Self {
        CompilerResult {
            success: false,
            pipeable_output: None,
            failure_code: Some(failure_code),
            outputs,
        }
    }

    /// Failed step synthesized by the pipeline before the adapter ran.
    pub fn validation_failure<T: Into<String>>(message: T) -> Self {
        CompilerResult::failure(FAILURE_CODE, vec![CompilerOutput::output(message)])
    }

    pub fn output(&self, display_name: &str) -> Option<&CompilerOutput> {
        self.outputs
            .iter()
            .find(|output| output.display_name == display_name)
    }

    /// Size in bytes of the code passed to the next step.
    pub fn output_size(&self) -> Option<usize> {
        self.pipeable_output.as_ref().map(|code| code.len())
    }

    /// Base64 of a binary pipeable output, for download.
    pub fn binary_output(&self) -> Option<String> {
        self.pipeable_output
            .as_ref()
            .and_then(|code| code.as_binary())
            .map(|data| general_purpose::STANDARD.encode(data))
    }

    /// On failure, the view that should be shown first: the diagnostics.
    pub fn selected_output_index(&self) -> Option<usize> {
        if self.success {
            return None;
        }
        self.outputs
            .iter()
            .position(|output| output.display_name == OUTPUT)
    }

    pub fn to_response(&self) -> CompilerResultResponse {
        CompilerResultResponse {
            success: self.success,
            output_size: self.output_size(),
            binary_output: self.binary_output(),
            failure_code: self.failure_code,
            outputs: self
                .outputs
                .iter()
                .map(|output| CompilerOutputResponse {
                    display_name: output.display_name.clone(),
                    language: output.language.clone(),
                    value: output.value.clone(),
                })
                .collect(),
            selected_output_index: self.selected_output_index(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOutputResponse {
    pub display_name: String,
    pub language: Option<String>,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerResultResponse {
    pub success: bool,
    pub output_size: Option<usize>,
    pub binary_output: Option<String>,
    pub failure_code: Option<i32>,
    pub outputs: Vec<CompilerOutputResponse>,
    pub selected_output_index: Option<usize>,
}
