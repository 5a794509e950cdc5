//! Block extraction: free-form generated text -> named file set
//!
//! Fences are paired first (opening line, then the next closing marker). A block is
//! labeled when the prose between the previous block and its opening fence ends with
//! a heading (`### main.tf`) or bold label (`**main.tf**`) naming a file with the
//! target extension, so text inside a block never becomes a label.
//! - labeled blocks win: when any block is labeled, only labeled blocks are kept
//! - otherwise every block is kept, named after the default stem
//!
//! Extraction never fails. Text without usable fences yields an empty [`FileSet`].

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;

use iac_agent_sdk::log_warning;

use crate::iac::types::FileSet;

pub const DEFAULT_EXTENSION: &str = ".tf";
pub const DEFAULT_STEM: &str = "main";

/// Fenced block body: everything up to the next triple-backtick marker
const FENCED_BODY: &str = r"```[^\n]*\n(.*?)```";

/// Extracts configuration files from generated text
#[derive(Debug, Clone)]
pub struct BlockExtractor {
    labeled: Regex,
    fenced: Regex,
    extension: String,
    default_stem: String,
}

impl BlockExtractor {
    /// Build an extractor for files ending in `extension` (e.g. `.tf`)
    pub fn new(extension: &str, default_stem: &str) -> Result<Self> {
        let extension = normalize_extension(extension);

        // Anchored at the end of the prose preceding a fence
        let labeled = format!(
            r"(?:#+[ \t]+|\*\*)`?([^\n*]*?{ext})`?(?:\*\*)?[ \t]*:?\s*\z",
            ext = regex::escape(&extension),
        );
        let labeled = Regex::new(&labeled)
            .with_context(|| format!("Invalid label pattern for extension '{}'", extension))?;
        let fenced = Regex::new(&format!("(?s){}", FENCED_BODY))
            .context("Invalid fenced block pattern")?;

        Ok(Self {
            labeled,
            fenced,
            extension,
            default_stem: default_stem.to_string(),
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Parse a generation response into a file set
    pub fn extract(&self, response_text: &str) -> FileSet {
        let mut labeled = Vec::new();
        let mut unlabeled = Vec::new();
        let mut prose_start = 0;

        for caps in self.fenced.captures_iter(response_text) {
            let (Some(block), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let prose = &response_text[prose_start..block.start()];
            prose_start = block.end();

            let body = body.as_str().trim();
            match self.label_for(prose) {
                Some(name) => labeled.push((name, body)),
                None => unlabeled.push(body),
            }
        }

        let mut files = FileSet::new();

        if !labeled.is_empty() {
            if !unlabeled.is_empty() {
                log_warning!(
                    "Skipped {} unlabeled code block(s) in a response with labeled files",
                    unlabeled.len()
                );
            }
            for (name, body) in labeled {
                self.insert_unique(&mut files, name, body);
            }
            return files;
        }

        if unlabeled.len() == 1 {
            files.insert(self.default_name(), unlabeled[0]);
        } else {
            for (index, body) in unlabeled.into_iter().enumerate() {
                let name = format!("{}_{}{}", self.default_stem, index + 1, self.extension);
                self.insert_unique(&mut files, name, body);
            }
        }

        files
    }

    /// Filename named by a label at the very end of `prose`, if any
    fn label_for(&self, prose: &str) -> Option<String> {
        let label = self.labeled.captures(prose)?.get(1)?;
        sanitize_label(label.as_str(), &self.extension)
    }

    fn default_name(&self) -> String {
        format!("{}{}", self.default_stem, self.extension)
    }

    /// Insert `name`, renaming collisions to `stem_2.ext`, `stem_3.ext`, ...
    fn insert_unique(&self, files: &mut FileSet, name: String, content: &str) {
        if !files.contains(&name) {
            files.insert(name, content);
            return;
        }

        let stem = name.strip_suffix(self.extension.as_str()).unwrap_or(&name);
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}{}", stem, n, self.extension);
            if !files.contains(&candidate) {
                files.insert(candidate, content);
                return;
            }
            n += 1;
        }
    }
}

/// `tf` -> `.tf`; an extension that already has its dot is kept as is
pub fn normalize_extension(extension: &str) -> String {
    if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}

/// Reduce a heading/bold label to a bare filename
///
/// `File: main.tf` -> `main.tf`, `modules/../x.tf` -> `x.tf`. Returns `None` when
/// nothing but the extension is left.
fn sanitize_label(raw: &str, extension: &str) -> Option<String> {
    let token = raw.split_whitespace().last()?;
    let token = token.trim_matches(|c| c == '`' || c == '"' || c == '\'');
    let name = token.rsplit(['/', '\\']).next()?;

    if name.len() <= extension.len() || !name.ends_with(extension) {
        return None;
    }
    Some(name.to_string())
}

fn default_extractor() -> &'static BlockExtractor {
    static EXTRACTOR: OnceLock<BlockExtractor> = OnceLock::new();
    EXTRACTOR.get_or_init(|| {
        BlockExtractor::new(DEFAULT_EXTENSION, DEFAULT_STEM)
            .expect("default extractor patterns are valid")
    })
}

/// Extract Terraform files (`.tf`, default `main.tf`) from generated text
pub fn extract(response_text: &str) -> FileSet {
    default_extractor().extract(response_text)
}
