use serde::Serialize;

/// Structural format check run against an extracted artifact. Validators see
/// the head and tail of the written bytes plus the total length, never the
/// whole body, so validation cost stays constant in artifact size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Validator {
    Jpeg,
    Png,
    Gif,
    Pdf,
    Elf,
    Pe,
    Macho,
    None,
}

impl Validator {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "pdf" => Some(Self::Pdf),
            "elf" => Some(Self::Elf),
            "pe" => Some(Self::Pe),
            "macho" => Some(Self::Macho),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn validate(&self, head: &[u8], tail: &[u8], len: u64) -> bool {
        match self {
            Self::Jpeg => head.starts_with(&[0xFF, 0xD8, 0xFF]) && tail.ends_with(&[0xFF, 0xD9]),
            Self::Png => {
                head.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
                    && head.len() >= 16
                    && &head[12..16] == b"IHDR"
                    && contains(tail, b"IEND")
            }
            Self::Gif => {
                (head.starts_with(b"GIF89a") || head.starts_with(b"GIF87a"))
                    && tail.ends_with(&[0x3B])
            }
            Self::Pdf => head.starts_with(b"%PDF-") && contains(tail, b"%%EOF"),
            Self::Elf => {
                head.starts_with(&[0x7F, 0x45, 0x4C, 0x46])
                    && head.len() >= 6
                    && matches!(head[4], 1 | 2)
                    && matches!(head[5], 1 | 2)
                    && len >= 52
            }
            Self::Pe => {
                if !head.starts_with(b"MZ") || head.len() < 64 || len < 64 {
                    return false;
                }
                let e_lfanew = u32::from_le_bytes([head[60], head[61], head[62], head[63]]) as u64;
                if e_lfanew + 4 > len {
                    return false;
                }
                // check the PE signature when it falls inside the probed head
                let at = e_lfanew as usize;
                if at + 4 <= head.len() {
                    &head[at..at + 4] == b"PE\0\0"
                } else {
                    true
                }
            }
            Self::Macho => {
                (head.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
                    || head.starts_with(&[0xCE, 0xFA, 0xED, 0xFE]))
                    && len >= 32
            }
            Self::None => true,
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_requires_eoi_marker() {
        let head = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0];
        assert!(Validator::Jpeg.validate(&head, &[0x00, 0xFF, 0xD9], 32));
        assert!(!Validator::Jpeg.validate(&head, &[0x00, 0x00], 32));
    }

    #[test]
    fn png_checks_ihdr_and_iend() {
        let mut head = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        head.extend_from_slice(&[0, 0, 0, 13]);
        head.extend_from_slice(b"IHDR");
        let tail = b"xxIENDyyyy";
        assert!(Validator::Png.validate(&head, tail, 64));
        assert!(!Validator::Png.validate(&head, b"no trailer", 64));
    }

    #[test]
    fn pdf_checks_eof_comment() {
        assert!(Validator::Pdf.validate(b"%PDF-1.7\n", b"startxref\n123\n%%EOF\n", 200));
        assert!(!Validator::Pdf.validate(b"%PDF-1.7\n", b"truncated", 200));
    }

    #[test]
    fn pe_checks_lfanew_bounds() {
        let mut head = vec![0u8; 64];
        head[0] = b'M';
        head[1] = b'Z';
        head[60..64].copy_from_slice(&1024u32.to_le_bytes());
        assert!(Validator::Pe.validate(&head, &[], 4096));
        assert!(!Validator::Pe.validate(&head, &[], 512));
    }

    #[test]
    fn unknown_validator_name_is_rejected() {
        assert!(Validator::from_name("tiff").is_none());
        assert_eq!(Validator::from_name("none"), Some(Validator::None));
    }
}
