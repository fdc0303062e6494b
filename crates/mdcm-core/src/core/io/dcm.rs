use super::traits::FormatFile;
use crate::core::models::charge::ChargeSite;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Expected {expected} charge sites but found {found}")]
    SiteCountMismatch { expected: usize, found: usize },
}

fn parse_site(line: &str, line_num: usize, skip: usize) -> Result<ChargeSite, ModelFileError> {
    let parts: Vec<&str> = line.split_whitespace().skip(skip).collect();
    if parts.len() < 4 {
        return Err(ModelFileError::Parse {
            line: line_num,
            message: "expected 'x y z q'".into(),
        });
    }
    let mut fields = [0.0; 4];
    for (k, token) in parts[..4].iter().enumerate() {
        fields[k] = token.parse().map_err(|_| ModelFileError::Parse {
            line: line_num,
            message: format!("invalid number '{}'", token),
        })?;
    }
    Ok(ChargeSite::new(fields[0], fields[1], fields[2], fields[3]))
}

/// Reads count-prefixed site records, skipping `#` comments and blank lines.
fn read_records(
    reader: &mut impl BufRead,
    skip_fields: usize,
    collect_comment: bool,
) -> Result<(Vec<ChargeSite>, Vec<String>), ModelFileError> {
    let mut comments = Vec::new();
    let mut expected: Option<usize> = None;
    let mut sites = Vec::new();
    let mut comment_line_pending = collect_comment;

    for (idx, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = idx + 1;
        let trimmed = line.trim();

        match expected {
            None => {
                if trimmed.is_empty() {
                    continue;
                }
                if let Some(comment) = trimmed.strip_prefix('#') {
                    comments.push(comment.trim().to_string());
                    continue;
                }
                expected = Some(trimmed.parse().map_err(|_| ModelFileError::Parse {
                    line: line_num,
                    message: format!("invalid site count '{}'", trimmed),
                })?);
            }
            Some(count) => {
                if comment_line_pending {
                    comment_line_pending = false;
                    comments.push(trimmed.to_string());
                    continue;
                }
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                if sites.len() == count {
                    break;
                }
                sites.push(parse_site(trimmed, line_num, skip_fields)?);
            }
        }
    }

    let expected = expected.ok_or(ModelFileError::Parse {
        line: 0,
        message: "missing site count".into(),
    })?;
    if sites.len() != expected {
        return Err(ModelFileError::SiteCountMismatch {
            expected,
            found: sites.len(),
        });
    }
    Ok((sites, comments))
}

/// Local charge model records: a site count followed by one fixed-width
/// `x y z q` record per site, positions in the site's local frame (Angstroms).
pub struct LocalModelFile;

impl FormatFile for LocalModelFile {
    type Data = Vec<ChargeSite>;
    /// Comment lines, written with a leading `#`.
    type Metadata = Vec<String>;
    type Error = ModelFileError;

    fn read_from(
        reader: &mut impl BufRead,
    ) -> Result<(Vec<ChargeSite>, Vec<String>), ModelFileError> {
        read_records(reader, 0, false)
    }

    fn write_to(
        sites: &Vec<ChargeSite>,
        comments: &Vec<String>,
        writer: &mut impl Write,
    ) -> Result<(), ModelFileError> {
        for comment in comments {
            writeln!(writer, "# {}", comment)?;
        }
        writeln!(writer, "{}", sites.len())?;
        for site in sites {
            writeln!(
                writer,
                " {:>19.12} {:>19.12} {:>19.12} {:>19.12}",
                site.position.x, site.position.y, site.position.z, site.charge
            )?;
        }
        Ok(())
    }
}

/// Global charge model in XYZ layout: `X x y z q` per charge (Angstroms).
pub struct GlobalModelFile;

impl FormatFile for GlobalModelFile {
    type Data = Vec<ChargeSite>;
    /// The XYZ comment line.
    type Metadata = String;
    type Error = ModelFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Vec<ChargeSite>, String), ModelFileError> {
        let (sites, mut comments) = read_records(reader, 1, true)?;
        Ok((sites, comments.pop().unwrap_or_default()))
    }

    fn write_to(
        sites: &Vec<ChargeSite>,
        comment: &String,
        writer: &mut impl Write,
    ) -> Result<(), ModelFileError> {
        writeln!(writer, "{}", sites.len())?;
        writeln!(writer, "{}", comment)?;
        for site in sites {
            writeln!(
                writer,
                "X {:>19.12} {:>19.12} {:>19.12} {:>19.12}",
                site.position.x, site.position.y, site.position.z, site.charge
            )?;
        }
        Ok(())
    }
}
