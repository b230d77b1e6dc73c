use std::fmt;

/// Shader payload: either source/assembly text or an opaque binary blob.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Payload::Text(ref text) => write!(f, "Text({} chars)", text.len()),
            Payload::Binary(ref data) => write!(f, "Binary({} bytes)", data.len()),
        }
    }
}

/// A shader in one language, produced by one step and consumed by the next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderCode {
    language: String,
    payload: Payload,
}

impl ShaderCode {
    pub fn text<L: Into<String>, T: Into<String>>(language: L, text: T) -> Self {
        ShaderCode {
            language: language.into(),
            payload: Payload::Text(text.into()),
        }
    }

    pub fn binary<L: Into<String>>(language: L, data: Vec<u8>) -> Self {
        ShaderCode {
            language: language.into(),
            payload: Payload::Binary(data),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn as_text(&self) -> Option<&str> {
        match self.payload {
            Payload::Text(ref text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self.payload {
            Payload::Text(_) => None,
            Payload::Binary(ref data) => Some(data),
        }
    }

    /// Raw bytes of the payload regardless of its flavour.
    pub fn as_bytes(&self) -> &[u8] {
        match self.payload {
            Payload::Text(ref text) => text.as_bytes(),
            Payload::Binary(ref data) => data,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        match self.payload {
            Payload::Binary(_) => true,
            Payload::Text(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_binary_are_exclusive() {
        let text = ShaderCode::text("GLSL", "void main() {}");
        assert_eq!(text.as_text(), Some("void main() {}"));
        assert_eq!(text.as_binary(), None);
        assert!(!text.is_binary());

        let binary = ShaderCode::binary("SPIR-V", vec![1, 2, 3]);
        assert_eq!(binary.as_text(), None);
        assert_eq!(binary.as_binary(), Some(&[1u8, 2, 3][..]));
        assert_eq!(binary.len(), 3);
        assert!(binary.is_binary());
    }

    #[test]
    fn debug_does_not_dump_payloads() {
        let code = ShaderCode::binary("DXIL", vec![0; 4096]);
        let debug = format!("{:?}", code);
        assert!(debug.contains("4096 bytes"));
    }
}
