use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

const LINE_WIDTH: usize = 64;

/// Armors `der` as PEM: 64 character lines, CRLF line endings, no trailing
/// line break after the END marker.
pub fn to_pem(label: &str, der: &[u8]) -> String {
    let label = label.to_uppercase();
    let body = STANDARD.encode(der);
    let lines: Vec<&str> = body
        .as_bytes()
        .chunks(LINE_WIDTH)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();

    let mut pem = format!("-----BEGIN {}-----\r\n", label);
    pem.push_str(&lines.join("\r\n"));
    pem.push_str(&format!("\r\n-----END {}-----", label));
    pem
}

/// Decodes the first PEM block in `pem`, returning its label and contents.
pub fn parse_pem(pem: &str) -> Result<(String, Vec<u8>)> {
    let mut label = None;
    let mut body = String::new();

    for line in pem.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("-----BEGIN ") {
            let name = rest
                .strip_suffix("-----")
                .ok_or_else(|| Error::Format(format!("malformed BEGIN line '{}'", line)))?;
            label = Some(name.to_string());
            continue;
        }
        if line.starts_with("-----END ") {
            if label.is_some() {
                break;
            }
            return Err(Error::Format("END line before BEGIN line".to_string()));
        }
        if label.is_some() {
            body.extend(line.chars().filter(|c| !c.is_whitespace()));
        }
    }

    let label = label.ok_or_else(|| Error::Format("missing BEGIN line".to_string()))?;
    let der = STANDARD.decode(body.as_bytes())?;
    Ok((label, der))
}

/// Decodes a PEM block, ignoring its label.
pub fn from_pem(pem: &str) -> Result<Vec<u8>> {
    parse_pem(pem).map(|(_, der)| der)
}

/// Decodes a PEM block and checks that it carries `expected` as its label.
pub fn from_pem_labeled(pem: &str, expected: &str) -> Result<Vec<u8>> {
    let (label, der) = parse_pem(pem)?;
    if !label.eq_ignore_ascii_case(expected) {
        return Err(Error::Format(format!(
            "expected a {} block, found {}",
            expected, label
        )));
    }
    Ok(der)
}
