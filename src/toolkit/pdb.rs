//! Structure archive download

use crate::core::params::{validate_pdb_code, FetchParams};
use crate::toolkit::ToolkitError;
use tracing::debug;

/// Download URL of a structure entry; archive ids are upper case
pub fn structure_url(base: &str, pdb_code: &str) -> String {
    format!(
        "{}/{}.pdb",
        base.trim_end_matches('/'),
        pdb_code.to_ascii_uppercase()
    )
}

/// Keep only records whose line starts with one of `groups`
///
/// An empty group list keeps the file unchanged.
pub fn filter_records(content: &str, groups: &[String]) -> String {
    if groups.is_empty() {
        return content.to_string();
    }

    let mut filtered = String::with_capacity(content.len());
    for line in content.lines() {
        if groups.iter().any(|group| line.starts_with(group.as_str())) {
            filtered.push_str(line);
            filtered.push('\n');
        }
    }
    filtered
}

/// Fetch a structure and apply the record filter
pub async fn download_structure(
    http: &reqwest::Client,
    pdb_code: &str,
    params: &FetchParams,
) -> Result<String, ToolkitError> {
    validate_pdb_code(pdb_code)?;

    let url = structure_url(&params.pdb_url, pdb_code);
    debug!("GET {}", url);

    let response = http.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ToolkitError::HttpStatus {
            url,
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    Ok(filter_records(&body, &params.filter))
}
