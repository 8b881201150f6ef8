use crate::error::CatalogError;
use crate::models::DocumentReference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const GRAND_TEST_DOCUMENTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: serde_json::Value,
    pub title: String,
    pub course_code: String,
    pub topic_number: String,
    pub link: String,
    pub file_name: String,
    pub date: String,
    #[serde(default)]
    pub file_size: Option<String>,
}

impl CatalogRecord {
    pub fn reference(&self, base_url: &str) -> DocumentReference {
        DocumentReference::with_label(join_locator(base_url, &self.link), self.title.clone())
    }
}

#[derive(Debug, Clone)]
pub struct CourseGroup<'a> {
    pub course_code: &'a str,
    pub records: Vec<&'a CatalogRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrandTestSources {
    pub references: Vec<DocumentReference>,
    pub labels: Vec<String>,
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogRecord>, CatalogError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn group_by_course(records: &[CatalogRecord]) -> Vec<CourseGroup<'_>> {
    let mut groups: Vec<CourseGroup<'_>> = Vec::new();
    for record in records {
        match groups
            .iter_mut()
            .find(|group| group.course_code == record.course_code)
        {
            Some(group) => group.records.push(record),
            None => groups.push(CourseGroup {
                course_code: &record.course_code,
                records: vec![record],
            }),
        }
    }
    groups
}

pub fn grand_test_sources(
    records: &[CatalogRecord],
    course_code: &str,
    base_url: &str,
) -> Result<GrandTestSources, CatalogError> {
    let selected = records
        .iter()
        .filter(|record| record.course_code.eq_ignore_ascii_case(course_code))
        .take(GRAND_TEST_DOCUMENTS)
        .collect::<Vec<_>>();

    if selected.is_empty() {
        return Err(CatalogError::UnknownCourse(course_code.to_string()));
    }

    Ok(GrandTestSources {
        references: selected
            .iter()
            .map(|record| record.reference(base_url))
            .collect(),
        labels: selected.iter().map(|record| record.title.clone()).collect(),
    })
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn folder_sources(folder: &Path) -> GrandTestSources {
    let references = discover_pdf_files(folder)
        .into_iter()
        .map(|path| {
            let label = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            DocumentReference::with_label(path.to_string_lossy(), label)
        })
        .collect::<Vec<_>>();

    let labels = references
        .iter()
        .map(|reference| reference.label.clone().unwrap_or_default())
        .collect();

    GrandTestSources { references, labels }
}

fn join_locator(base_url: &str, link: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        link.to_string()
    } else {
        format!("{base}/{}", link.trim_start_matches('/'))
    }
}
