//! Catalog of the shader representations flowing between compilers.
//!
//! Language identifiers are plain strings so that adapters can declare
//! representations the catalog does not know; the catalog only adds an
//! extension hint for staging files on disk.

pub const HLSL: &str = "HLSL";
pub const GLSL: &str = "GLSL";
pub const SPIRV: &str = "SPIR-V";
pub const SPIRV_ASSEMBLY: &str = "SPIR-V Assembly";
pub const DXIL: &str = "DXIL";
pub const DXBC: &str = "DXBC";
pub const METAL: &str = "Metal";
pub const METAL_IR: &str = "Metal IR";
pub const METAL_LIB: &str = "Metallib";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Language {
    pub name: &'static str,
    pub extension: Option<&'static str>,
}

pub static LANGUAGES: &[Language] = &[
    Language {
        name: HLSL,
        extension: Some("hlsl"),
    },
    Language {
        name: GLSL,
        extension: Some("glsl"),
    },
    Language {
        name: SPIRV,
        extension: Some("spv"),
    },
    Language {
        name: SPIRV_ASSEMBLY,
        extension: Some("spvasm"),
    },
    Language {
        name: DXIL,
        extension: Some("dxil"),
    },
    Language {
        name: DXBC,
        extension: Some("dxbc"),
    },
    Language {
        name: METAL,
        extension: Some("metal"),
    },
    Language {
        name: METAL_IR,
        extension: Some("air"),
    },
    Language {
        name: METAL_LIB,
        extension: Some("metallib"),
    },
];

pub fn find(name: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|language| language.name == name)
}

pub fn file_extension(name: &str) -> Option<&'static str> {
    find(name).and_then(|language| language.extension)
}
