//! BibTeX rendering and output.
//!
//! Records are rendered in the order given, one `@type{key, ...}` entry per
//! record. The whole document is built in memory and then written to a
//! temporary file next to the destination, which is renamed into place.
//! Values coming from the service are escaped so every entry stays
//! brace-balanced.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;
use thiserror::Error;
use tracing::debug;

use crate::record::BibliographicRecord;

/// Note attached to every entry, as in the ADS BibTeX export.
pub const ADS_NOTE: &str = "Provided by the SAO/NASA Astrophysics Data System";

/// Abstract page of a bibcode.
pub const ADS_ABS_URL: &str = "https://ui.adsabs.harvard.edu/abs/";

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Errors that can occur when writing the bibliography.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// BibTeX entry types produced by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Article,
    InProceedings,
    Proceedings,
    Book,
    InCollection,
    PhdThesis,
    MastersThesis,
    TechReport,
    Misc,
}

impl EntryType {
    /// Maps an ADS `doctype` to a BibTeX entry type, defaulting to `misc`.
    pub fn from_doctype(doctype: Option<&str>) -> Self {
        match doctype.map(str::to_ascii_lowercase).as_deref() {
            Some("article") | Some("eprint") => EntryType::Article,
            Some("inproceedings") | Some("abstract") => EntryType::InProceedings,
            Some("proceedings") => EntryType::Proceedings,
            Some("book") => EntryType::Book,
            Some("inbook") => EntryType::InCollection,
            Some("phdthesis") => EntryType::PhdThesis,
            Some("mastersthesis") => EntryType::MastersThesis,
            Some("techreport") => EntryType::TechReport,
            _ => EntryType::Misc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Article => "article",
            EntryType::InProceedings => "inproceedings",
            EntryType::Proceedings => "proceedings",
            EntryType::Book => "book",
            EntryType::InCollection => "incollection",
            EntryType::PhdThesis => "phdthesis",
            EntryType::MastersThesis => "mastersthesis",
            EntryType::TechReport => "techreport",
            EntryType::Misc => "misc",
        }
    }

    /// BibTeX field that holds the publication venue (ADS `pub`).
    fn venue_field(&self) -> &'static str {
        match self {
            EntryType::Article => "journal",
            EntryType::InProceedings | EntryType::InCollection => "booktitle",
            EntryType::PhdThesis | EntryType::MastersThesis => "school",
            EntryType::TechReport => "institution",
            EntryType::Proceedings | EntryType::Book | EntryType::Misc => "howpublished",
        }
    }
}

/// Makes a service value safe inside a braced BibTeX field.
///
/// HTML entities are decoded, bare `&`, `%` and `#` outside `$...$` are
/// escaped, and unmatched braces are dropped. Existing LaTeX markup such as
/// `{\"o}` or `\&` is kept as is.
pub fn escape_bibtex(value: &str) -> String {
    let decoded = value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    escape_specials(&balance_braces(&decoded))
}

/// Drops every `{` or `}` without a partner, together with a backslash
/// directly before it. BibTeX counts braces without regard to escapes.
fn balance_braces(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut keep = vec![true; chars.len()];
    let mut open = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' => open.push(i),
            '}' if open.pop().is_none() => keep[i] = false,
            _ => {}
        }
    }
    for i in open {
        keep[i] = false;
    }
    for i in 1..chars.len() {
        if !keep[i] && chars[i - 1] == '\\' {
            keep[i - 1] = false;
        }
    }

    chars
        .iter()
        .zip(keep)
        .filter_map(|(&c, kept)| kept.then_some(c))
        .collect()
}

fn escape_specials(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut escaped = false;
    let mut math = false;

    for c in value.chars() {
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => escaped = true,
            '$' => math = !math,
            '&' | '%' | '#' if !math => out.push('\\'),
            _ => {}
        }
        out.push(c);
    }
    // A trailing backslash would swallow the closing brace
    if escaped {
        out.pop();
    }

    out
}

/// Formats one ADS author (`Family, Given`) with the family name braced.
fn format_author(author: &str) -> String {
    let author = escape_bibtex(author.trim());
    let author = author.as_str();
    match author.split_once(',') {
        Some((family, given)) => format!("{{{}}}, {}", family.trim(), given.trim())
            .trim_end_matches([',', ' '])
            .to_string(),
        None => format!("{{{}}}", author),
    }
}

fn format_people(record: &BibliographicRecord, field: &str) -> Option<String> {
    let people: Vec<String> = record
        .get(field)?
        .to_list()
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format_author(p))
        .collect();
    if people.is_empty() {
        None
    } else {
        Some(people.join(" and "))
    }
}

/// Three-letter month macro from an ADS `pubdate` such as `1998-06-00`.
fn month_from_pubdate(pubdate: &str) -> Option<&'static str> {
    let month: usize = pubdate.split('-').nth(1)?.parse().ok()?;
    MONTHS.get(month.checked_sub(1)?).copied()
}

/// arXiv identifier from the ADS `identifier` list.
fn arxiv_id(record: &BibliographicRecord) -> Option<String> {
    record
        .get("identifier")?
        .to_list()
        .into_iter()
        .find_map(|id| id.strip_prefix("arXiv:").map(str::to_string))
}

/// Renders a single record as a BibTeX entry, ending with a newline.
pub fn render_entry(record: &BibliographicRecord) -> String {
    let entry_type = EntryType::from_doctype(record.text("doctype").as_deref());

    // (name, value, braced)
    let mut fields: Vec<(&str, String, bool)> = Vec::new();

    if let Some(authors) = format_people(record, "author") {
        fields.push(("author", authors, true));
    }
    if let Some(title) = record.text("title") {
        fields.push(("title", format!("{{{}}}", escape_bibtex(&title)), true));
    }
    let venue = match entry_type {
        EntryType::InProceedings | EntryType::InCollection => {
            record.text("booktitle").or_else(|| record.text("pub"))
        }
        _ => record.text("pub"),
    };
    if let Some(venue) = venue {
        fields.push((entry_type.venue_field(), escape_bibtex(&venue), true));
    }
    if let Some(year) = record.text("year") {
        fields.push(("year", year, false));
    }
    if let Some(month) = record.text("pubdate").as_deref().and_then(month_from_pubdate) {
        fields.push(("month", month.to_string(), false));
    }
    for (source, target) in [("volume", "volume"), ("issue", "number"), ("page", "pages")] {
        if let Some(value) = record.text(source) {
            fields.push((target, escape_bibtex(&value), true));
        }
    }
    if let Some(editors) = format_people(record, "editor") {
        fields.push(("editor", editors, true));
    }
    if let Some(publisher) = record.text("publisher") {
        fields.push(("publisher", escape_bibtex(&publisher), true));
    }
    if let Some(doi) = record.text("doi") {
        fields.push(("doi", balance_braces(&doi), true));
    }
    if let Some(eprint) = arxiv_id(record) {
        fields.push(("archivePrefix", "arXiv".to_string(), true));
        fields.push(("eprint", balance_braces(&eprint), true));
    }
    fields.push(("adsurl", format!("{}{}", ADS_ABS_URL, record.key), true));
    fields.push(("adsnote", ADS_NOTE.to_string(), true));

    let width = fields.iter().map(|(name, _, _)| name.len()).max().unwrap_or(0);
    let body: Vec<String> = fields
        .iter()
        .map(|(name, value, braced)| {
            if *braced {
                format!("  {:>width$} = {{{}}}", name, value, width = width)
            } else {
                format!("  {:>width$} = {}", name, value, width = width)
            }
        })
        .collect();

    format!(
        "@{}{{{},\n{}\n}}\n",
        entry_type.as_str(),
        record.key,
        body.join(",\n")
    )
}

/// Renders all records, separated by blank lines.
///
/// An empty record list renders as an empty document.
pub fn render_bibliography(records: &[&BibliographicRecord]) -> String {
    records
        .iter()
        .map(|r| render_entry(r))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes the rendered bibliography to `path`, replacing any existing file.
///
/// Returns the number of entries written. On error the destination is left
/// untouched and no temporary file remains.
pub fn write_bibliography(
    path: &Path,
    records: &[&BibliographicRecord],
) -> Result<usize, WriteError> {
    let document = render_bibliography(records);
    let io_err = |source: std::io::Error| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // New files get 0o666 minus the umask; an existing file keeps its mode.
    let existing = fs::metadata(path).ok().map(|m| m.permissions());
    let mut builder = Builder::new();
    builder.prefix(".tex2bib-").suffix(".bib");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }

    let mut tmp = builder.tempfile_in(dir).map_err(io_err)?;
    tmp.write_all(document.as_bytes()).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    if let Some(permissions) = existing {
        tmp.as_file().set_permissions(permissions).map_err(io_err)?;
    }

    tmp.persist(path).map_err(|e| io_err(e.error))?;
    debug!(path = %path.display(), bytes = document.len(), "bibliography written");

    Ok(records.len())
}
