use std::path::Path;

use opml::{Outline, OPML};

use crate::error::Result;
use crate::models::NewSubscription;

pub fn parse_opml_file(path: &Path) -> Result<Vec<NewSubscription>> {
    let content = std::fs::read_to_string(path)?;
    parse_opml(&content)
}

/// Collect every outline with an `xmlUrl`, including nested folders.
pub fn parse_opml(content: &str) -> Result<Vec<NewSubscription>> {
    let document = OPML::from_str(content)?;
    let mut subs = Vec::new();
    collect_outlines(&document.body.outlines, &mut subs);
    Ok(subs)
}

fn collect_outlines(outlines: &[Outline], subs: &mut Vec<NewSubscription>) {
    for outline in outlines {
        if let Some(url) = outline.xml_url.as_ref().filter(|u| !u.trim().is_empty()) {
            let name = outline
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| outline.text.clone());
            let name = if name.trim().is_empty() { url.clone() } else { name };
            subs.push(NewSubscription {
                url: url.trim().to_string(),
                name,
            });
        }
        collect_outlines(&outline.outlines, subs);
    }
}
