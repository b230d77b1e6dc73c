use crate::compiler::{CompilerDescriptor, ShaderCompiler};
use crate::config::Config;
use crate::drivers;
use crate::error::{Error, Result};
use crate::language::{self, Language};
use std::collections::HashMap;

/// Catalog of every available compiler, built once at startup and read-only
/// afterwards so workers can share it without locking.
pub struct CompilerRegistry {
    compilers: Vec<Box<dyn ShaderCompiler>>,
    by_name: HashMap<String, usize>,
}

/// Serializable export of the catalog for front ends.
#[derive(Debug, Serialize)]
pub struct RegistryMetadata<'a> {
    pub languages: &'static [Language],
    pub compilers: Vec<&'a CompilerDescriptor>,
}

impl CompilerRegistry {
    pub fn new(compilers: Vec<Box<dyn ShaderCompiler>>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(compilers.len());
        for (index, compiler) in compilers.iter().enumerate() {
            let descriptor = compiler.descriptor();
            descriptor.validate()?;
            if by_name.insert(descriptor.name.clone(), index).is_some() {
                return Err(Error::duplicate_compiler(&descriptor.name));
            }
        }
        Ok(CompilerRegistry { compilers, by_name })
    }

    /// Registry of all built-in drivers.
    pub fn builtin(config: &Config) -> Result<Self> {
        let registry = CompilerRegistry::new(drivers::all(config))?;
        info!("Registered {} compilers", registry.len());
        for compiler in registry.iter() {
            let descriptor = compiler.descriptor();
            debug!(
                "{} ({}): {:?} -> {:?}",
                descriptor.name,
                descriptor.display_name,
                descriptor.input_languages,
                descriptor.output_languages
            );
        }
        Ok(registry)
    }

    pub fn find_by_name(&self, name: &str) -> Result<&dyn ShaderCompiler> {
        match self.by_name.get(name) {
            Some(&index) => Ok(self.compilers[index].as_ref()),
            None => Err(Error::unknown_compiler(name)),
        }
    }

    pub fn find_by_input_language(&self, language: &str) -> Vec<&dyn ShaderCompiler> {
        self.iter()
            .filter(|compiler| compiler.descriptor().accepts(language))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ShaderCompiler> {
        self.compilers.iter().map(|compiler| compiler.as_ref())
    }

    pub fn len(&self) -> usize {
        self.compilers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compilers.is_empty()
    }

    pub fn metadata(&self) -> RegistryMetadata<'_> {
        RegistryMetadata {
            languages: language::LANGUAGES,
            compilers: self.iter().map(|compiler| compiler.descriptor()).collect(),
        }
    }
}
