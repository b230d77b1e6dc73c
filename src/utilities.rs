use crate::code::{Payload, ShaderCode};
use crate::error::{ErrorKind, Result};
use crate::language;
use failure::ResultExt;
use filebuffer::FileBuffer;
use normalize_line_endings::normalized;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::iter::FromIterator;
use std::path::{Path, PathBuf};
use uuid::Uuid;

cfg_if! {
    if #[cfg(windows)] {
        pub fn wine_wrap(cmd: &Path, _wine_path: Option<&Path>) -> (PathBuf, Vec<String>) {
            (cmd.to_path_buf(), Vec::new())
        }
    } else {
        /// Route Windows-only `.exe` tools through wine when a launcher is configured.
        pub fn wine_wrap(cmd: &Path, wine_path: Option<&Path>) -> (PathBuf, Vec<String>) {
            let is_exe = cmd
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("exe"))
                .unwrap_or(false);
            match wine_path {
                Some(wine) if is_exe => (wine.to_path_buf(), vec![cmd.to_string_lossy().to_string()]),
                _ => (cmd.to_path_buf(), Vec::new()),
            }
        }
    }
}

pub fn path_exists<P: AsRef<Path>>(path: P) -> bool {
    std::fs::metadata(path.as_ref()).is_ok()
}

pub fn read_file_string<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut file = File::open(path.as_ref())?;
    let mut text = String::new();
    if let Ok(meta) = file.metadata() {
        text.reserve(meta.len() as usize); // Safe to truncate, since it's only a suggestion
    }
    file.read_to_string(&mut text)?;
    let text = String::from_iter(normalized(text.chars()));
    Ok(text)
}

/// Read a tool artifact. `None` when the tool did not produce it.
pub fn read_file_if_exists<P: AsRef<Path>>(path: P) -> Result<Option<Vec<u8>>> {
    let path = path.as_ref();
    if !path_exists(path) {
        return Ok(None);
    }
    let buffer = FileBuffer::open(path).with_context(|_| ErrorKind::path(path))?;
    Ok(Some(buffer.to_vec()))
}

/// Text flavour of `read_file_if_exists`; invalid UTF-8 is replaced and line
/// endings are normalized.
pub fn read_text_if_exists<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    Ok(read_file_if_exists(path)?.map(|data| {
        let text = String::from_utf8_lossy(&data);
        String::from_iter(normalized(text.chars()))
    }))
}

pub fn string_from_path(path: &Path) -> Option<String> {
    path.as_os_str().to_str().map(|path_str| path_str.to_string())
}

/// A private working directory for tools that resolve names relative to
/// where they run. Removed with everything in it when dropped.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn create(temp_path: &Path) -> Result<Self> {
        let path = temp_path.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&path).with_context(|_| ErrorKind::path(&path))?;
        Ok(TempDir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage `code` inside this directory.
    pub fn stage(&self, code: &ShaderCode) -> Result<TempFile> {
        TempFile::from_shader_code(&self.path, code)
    }

    pub fn exists(&self) -> bool {
        path_exists(&self.path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if self.exists() {
            if let Err(err) = std::fs::remove_dir_all(&self.path) {
                error!(
                    "Error occurred trying to delete temp dir! path: {:?} - {:?}",
                    self.path, err
                );
            }
        }
    }
}

/// A uniquely named file under the temp directory, deleted when dropped.
///
/// The handle owns the path whether or not the file was ever written, so a
/// tool's output location can be reserved up front and cleaned up on every
/// exit path.
pub struct TempFile {
    pub uuid: Uuid,
    pub path: PathBuf,
}

impl TempFile {
    pub fn new(temp_path: &Path) -> Self {
        let file_uuid = Uuid::new_v4();
        let file_path = temp_path.join(file_uuid.to_string());
        Self {
            uuid: file_uuid,
            path: file_path,
        }
    }

    pub fn with_extension(temp_path: &Path, extension: &str) -> Self {
        let file_uuid = Uuid::new_v4();
        let file_path = temp_path.join(format!("{}.{}", file_uuid, extension));
        Self {
            uuid: file_uuid,
            path: file_path,
        }
    }

    /// Stage a shader payload on disk, named with its language's extension hint.
    pub fn from_shader_code(temp_path: &Path, code: &ShaderCode) -> Result<Self> {
        std::fs::create_dir_all(temp_path).with_context(|_| ErrorKind::path(temp_path))?;

        let handle = match language::file_extension(code.language()) {
            Some(extension) => TempFile::with_extension(temp_path, extension),
            None => TempFile::new(temp_path),
        };

        let data = match *code.payload() {
            Payload::Text(ref text) => text.as_bytes(),
            Payload::Binary(ref data) => &data[..],
        };
        handle.write(data)?;
        Ok(handle)
    }

    /// Reserve `<this path>.<extension>`, e.g. the output next to an input.
    pub fn sibling(&self, extension: &str) -> TempFile {
        let mut file_name = self.path.as_os_str().to_owned();
        file_name.push(".");
        file_name.push(extension);
        TempFile {
            uuid: self.uuid,
            path: PathBuf::from(file_name),
        }
    }

    pub fn write(&self, data: &[u8]) -> Result<()> {
        let file = File::create(&self.path).with_context(|_| ErrorKind::path(&self.path))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(data)
            .with_context(|_| ErrorKind::path(&self.path))?;
        writer.flush().with_context(|_| ErrorKind::path(&self.path))?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn as_str(&self) -> String {
        string_from_path(&self.path).unwrap_or_else(|| "PATH_ERROR".to_string())
    }

    pub fn exists(&self) -> bool {
        path_exists(&self.path)
    }

    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        read_file_if_exists(&self.path)
    }

    pub fn read_text(&self) -> Result<Option<String>> {
        read_text_if_exists(&self.path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.exists() {
            if let Err(err) = std::fs::remove_file(&self.path) {
                error!(
                    "Error occurred trying to delete temp file! path: {:?} - {:?}",
                    self.path, err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_file_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let code = ShaderCode::text(language::HLSL, "float4 main() : SV_Target { return 1; }");
        let path = {
            let handle = TempFile::from_shader_code(root.path(), &code).unwrap();
            assert!(handle.exists());
            assert_eq!(handle.path().extension().unwrap(), "hlsl");
            assert_eq!(
                std::fs::read(handle.path()).unwrap(),
                code.as_bytes().to_vec()
            );
            handle.path().clone()
        };
        assert!(!path_exists(&path));
    }

    #[test]
    fn sibling_extends_the_file_name() {
        let root = tempfile::tempdir().unwrap();
        let input = TempFile::with_extension(root.path(), "metal");
        let output = input.sibling("air");
        let expected = format!("{}.metal.air", input.uuid);
        assert_eq!(output.path().file_name().unwrap().to_str().unwrap(), expected);
        assert!(!output.exists());
        assert_eq!(output.read().unwrap(), None);
    }

    #[test]
    fn unwritten_handle_drops_quietly() {
        let root = tempfile::tempdir().unwrap();
        let handle = TempFile::new(root.path());
        assert!(!handle.exists());
        drop(handle);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn temp_dir_is_removed_with_contents() {
        let root = tempfile::tempdir().unwrap();
        let code = ShaderCode::text(language::GLSL, "void main() {}");
        let path = {
            let dir = TempDir::create(root.path()).unwrap();
            let input = dir.stage(&code).unwrap();
            assert_eq!(input.path().parent().unwrap(), dir.path());
            // tool output written next to the input, never tracked by a handle
            std::fs::write(dir.path().join("a.spv"), b"\x03\x02\x23\x07").unwrap();
            dir.path().to_path_buf()
        };
        assert!(!path_exists(&path));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn binary_payload_round_trips_through_disk() {
        let root = tempfile::tempdir().unwrap();
        let code = ShaderCode::binary(language::SPIRV, vec![0x03, 0x02, 0x23, 0x07]);
        let handle = TempFile::from_shader_code(root.path(), &code).unwrap();
        assert_eq!(handle.read().unwrap(), Some(vec![0x03, 0x02, 0x23, 0x07]));
    }

    #[cfg(not(windows))]
    #[test]
    fn wine_wraps_only_exe_tools() {
        let wine = Path::new("/usr/bin/wine64");
        let (command, args) = wine_wrap(Path::new("/opt/fxc/trunk/fxc.exe"), Some(wine));
        assert_eq!(command, wine.to_path_buf());
        assert_eq!(args, vec!["/opt/fxc/trunk/fxc.exe".to_string()]);

        let (command, args) = wine_wrap(Path::new("/opt/dxc/trunk/dxc"), Some(wine));
        assert_eq!(command, PathBuf::from("/opt/dxc/trunk/dxc"));
        assert!(args.is_empty());

        let (command, _) = wine_wrap(Path::new("/opt/fxc/trunk/fxc.exe"), None);
        assert_eq!(command, PathBuf::from("/opt/fxc/trunk/fxc.exe"));
    }
}
