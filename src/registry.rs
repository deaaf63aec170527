use std::collections::HashSet;

use crate::config::{Config, ConfigError};
use crate::validate::Validator;

/// One artifact type the scanner knows how to carve.
#[derive(Debug, Clone)]
pub struct SignatureSpec {
    pub type_name: String,
    pub extension: String,
    pub header: Vec<u8>,
    pub footer: Option<Vec<u8>>,
    pub max_size: u64,
    pub validator: Validator,
}

/// Immutable table of signature specs, validated once at job start.
///
/// Specs are held in priority order: longer headers first, declaration order
/// breaking ties. When two headers match at the same offset, the earlier
/// spec wins.
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    specs: Vec<SignatureSpec>,
    max_pattern_len: usize,
}

impl SignatureRegistry {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let mut specs = Vec::new();
        let mut seen = HashSet::new();
        for sig in &cfg.signatures {
            if !seen.insert(sig.id.to_ascii_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate signature type: {}",
                    sig.id
                )));
            }
            let header = decode_hex(&sig.header, &sig.id, "header")?;
            if header.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "signature {} has an empty header",
                    sig.id
                )));
            }
            let footer = match &sig.footer {
                Some(hex) => {
                    let bytes = decode_hex(hex, &sig.id, "footer")?;
                    if bytes.is_empty() { None } else { Some(bytes) }
                }
                None => None,
            };
            let combined = header.len() as u64 + footer.as_ref().map_or(0, |f| f.len() as u64);
            if sig.max_size < combined {
                return Err(ConfigError::Invalid(format!(
                    "signature {} max_size {} is smaller than header+footer length {}",
                    sig.id, sig.max_size, combined
                )));
            }
            let validator = Validator::from_name(sig.validator.trim()).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "signature {} references unknown validator {}",
                    sig.id, sig.validator
                ))
            })?;
            specs.push(SignatureSpec {
                type_name: sig.id.clone(),
                extension: sig.extension.trim_start_matches('.').to_ascii_lowercase(),
                header,
                footer,
                max_size: sig.max_size,
                validator,
            });
        }

        specs.sort_by(|a, b| b.header.len().cmp(&a.header.len()));
        Ok(Self::from_specs(specs))
    }

    fn from_specs(specs: Vec<SignatureSpec>) -> Self {
        let max_pattern_len = specs
            .iter()
            .flat_map(|s| {
                std::iter::once(s.header.len()).chain(s.footer.iter().map(|f| f.len()))
            })
            .max()
            .unwrap_or(0);
        Self {
            specs,
            max_pattern_len,
        }
    }

    /// Restrict the registry to the requested type names. Returns the
    /// filtered registry plus any requested names the registry does not
    /// know, for the caller to warn about. `None` keeps every spec.
    pub fn specs_for(&self, requested: Option<&[String]>) -> (Self, Vec<String>) {
        let Some(requested) = requested else {
            return (self.clone(), Vec::new());
        };
        let mut allow = HashSet::new();
        for entry in requested {
            let trimmed = entry.trim();
            if !trimmed.is_empty() {
                allow.insert(trimmed.to_ascii_lowercase());
            }
        }
        let known: HashSet<String> = self
            .specs
            .iter()
            .map(|s| s.type_name.to_ascii_lowercase())
            .collect();
        let mut unknown: Vec<String> = allow.difference(&known).cloned().collect();
        unknown.sort();

        let specs = self
            .specs
            .iter()
            .filter(|s| allow.contains(&s.type_name.to_ascii_lowercase()))
            .cloned()
            .collect();
        (Self::from_specs(specs), unknown)
    }

    pub fn specs(&self) -> &[SignatureSpec] {
        &self.specs
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Bytes each chunk must carry over so a pattern can straddle a window
    /// edge and still match whole.
    pub fn carry_len(&self) -> usize {
        self.max_pattern_len.saturating_sub(1)
    }
}

fn decode_hex(hex_str: &str, type_name: &str, kind: &str) -> Result<Vec<u8>, ConfigError> {
    hex::decode(hex_str.trim()).map_err(|e| {
        ConfigError::Invalid(format!("invalid {kind} pattern for {type_name}: {e}"))
    })
}
