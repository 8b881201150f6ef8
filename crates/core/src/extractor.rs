use crate::error::ExtractError;
use crate::models::{
    DocumentReference, ExtractedDocument, ExtractedPage, ExtractorOptions, PageSource,
    NO_TEXT_SENTINEL,
};
use crate::ocr::OcrEngine;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage};
use lopdf::{Document, ObjectId};
use pdfium_render::prelude::*;
use reqwest::Client;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct PageRaster {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub png_bytes: Vec<u8>,
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, reference: &DocumentReference) -> Result<Vec<u8>, ExtractError>;
}

pub trait PdfBackend: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, ExtractError>;
}

pub trait PdfDocument: Send {
    fn page_count(&self) -> u32;

    fn text_items(&self, page_number: u32) -> Result<Vec<String>, ExtractError>;
}

// Blocking; called from `spawn_blocking`.
pub trait PageRenderer: Send + Sync {
    fn render(
        &self,
        pdf_bytes: &[u8],
        page_number: u32,
        render_scale: f32,
    ) -> Result<PageRaster, ExtractError>;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, reference: &DocumentReference) -> String;
}

#[derive(Default)]
pub struct LocatorFetcher {
    client: Client,
}

impl LocatorFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentFetcher for LocatorFetcher {
    async fn fetch(&self, reference: &DocumentReference) -> Result<Vec<u8>, ExtractError> {
        let locator = reference.locator.trim();
        if locator.is_empty() {
            return Err(ExtractError::InvalidReference(
                "empty document locator".to_string(),
            ));
        }

        match Url::parse(locator) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let response = self.client.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(ExtractError::FetchStatus {
                        locator: locator.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                Ok(response.bytes().await?.to_vec())
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|_| {
                    ExtractError::InvalidReference(format!("not a local file url: {locator}"))
                })?;
                Ok(tokio::fs::read(path).await?)
            }
            _ => Ok(tokio::fs::read(PathBuf::from(locator)).await?),
        }
    }
}

#[derive(Default)]
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, ExtractError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ExtractError::PdfParse(error.to_string()))?;
        let pages = document.get_pages();
        Ok(Box::new(LopdfDocument { document, pages }))
    }
}

struct LopdfDocument {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn text_items(&self, page_number: u32) -> Result<Vec<String>, ExtractError> {
        let text = self
            .document
            .extract_text(&[page_number])
            .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[derive(Default)]
pub struct PdfiumRenderer;

impl PageRenderer for PdfiumRenderer {
    fn render(
        &self,
        pdf_bytes: &[u8],
        page_number: u32,
        render_scale: f32,
    ) -> Result<PageRaster, ExtractError> {
        let failed = |details: String| ExtractError::Render {
            page: page_number,
            details,
        };

        let pdfium = Pdfium::new(
            Pdfium::bind_to_system_library()
                .map_err(|error| failed(format!("pdfium bind failed: {error}")))?,
        );
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|error| failed(format!("pdfium open failed: {error}")))?;

        let index = page_number
            .checked_sub(1)
            .and_then(|index| u16::try_from(index).ok())
            .ok_or_else(|| failed("page number out of range".to_string()))?;
        let page = document
            .pages()
            .get(index)
            .map_err(|error| failed(format!("page access failed: {error}")))?;

        let width = (page.width().value * render_scale).round() as i32;
        let height = (page.height().value * render_scale).round() as i32;
        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height),
            )
            .map_err(|error| failed(format!("render failed: {error}")))?;

        let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
        let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| failed("bitmap does not match its dimensions".to_string()))?;

        let mut png_bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|error| failed(format!("png encode failed: {error}")))?;

        Ok(PageRaster {
            page_number,
            width,
            height,
            png_bytes,
        })
    }
}

pub struct PdfTextExtractor {
    fetcher: Arc<dyn DocumentFetcher>,
    backend: Arc<dyn PdfBackend>,
    renderer: Arc<dyn PageRenderer>,
    ocr: Option<Arc<dyn OcrEngine>>,
    options: ExtractorOptions,
}

impl PdfTextExtractor {
    pub fn new(options: ExtractorOptions) -> Self {
        Self {
            fetcher: Arc::new(LocatorFetcher::default()),
            backend: Arc::new(LopdfBackend),
            renderer: Arc::new(PdfiumRenderer),
            ocr: None,
            options,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    pub async fn extract_document(
        &self,
        reference: &DocumentReference,
    ) -> Result<ExtractedDocument, ExtractError> {
        let bytes: Arc<[u8]> = self.fetcher.fetch(reference).await?.into();
        let document = self.backend.open(&bytes)?;
        let page_count = document.page_count();

        let mut pages = Vec::with_capacity(page_count as usize);
        for page_number in 1..=page_count {
            let items = document.text_items(page_number)?;

            if !items.is_empty() {
                pages.push(ExtractedPage {
                    page_number,
                    text: items.join(" "),
                    sourced_via: PageSource::TextLayer,
                });
                continue;
            }

            warn!(page = page_number, document = %reference, "page is scanned, running OCR");
            let text = self.recognize(&bytes, page_number).await?;
            pages.push(ExtractedPage {
                page_number,
                text,
                sourced_via: PageSource::Ocr,
            });
        }

        debug!(
            document = %reference,
            pages = pages.len(),
            "extracted document"
        );
        Ok(ExtractedDocument { pages })
    }

    // Never fails: errors yield "" and a document with no text on any page
    // yields NO_TEXT_SENTINEL.
    pub async fn extract(&self, reference: &DocumentReference) -> String {
        match self.extract_document(reference).await {
            Ok(document) => {
                if document.pages.iter().all(|page| page.text.trim().is_empty()) {
                    NO_TEXT_SENTINEL.to_string()
                } else {
                    document.to_text()
                }
            }
            Err(extract_error) => {
                error!(document = %reference, error = %extract_error, "pdf extraction failed");
                String::new()
            }
        }
    }

    async fn recognize(
        &self,
        pdf_bytes: &Arc<[u8]>,
        page_number: u32,
    ) -> Result<String, ExtractError> {
        let Some(engine) = &self.ocr else {
            warn!(
                page = page_number,
                "no OCR engine configured, scanned page left empty"
            );
            return Ok(String::new());
        };

        let raster = self.render(pdf_bytes, page_number).await?;
        let recognition = engine.recognize(&raster, &self.options.ocr_language);
        match self.options.ocr_timeout {
            Some(limit) => tokio::time::timeout(limit, recognition)
                .await
                .map_err(|_| ExtractError::OcrTimeout {
                    page: page_number,
                    after: limit,
                })?,
            None => recognition.await,
        }
    }

    async fn render(
        &self,
        pdf_bytes: &Arc<[u8]>,
        page_number: u32,
    ) -> Result<PageRaster, ExtractError> {
        let renderer = Arc::clone(&self.renderer);
        let pdf_bytes = Arc::clone(pdf_bytes);
        let render_scale = self.options.render_scale;

        tokio::task::spawn_blocking(move || renderer.render(&pdf_bytes, page_number, render_scale))
            .await
            .map_err(|error| ExtractError::Render {
                page: page_number,
                details: format!("render task failed: {error}"),
            })?
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, reference: &DocumentReference) -> String {
        self.extract(reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticFetcher;

    #[async_trait]
    impl DocumentFetcher for StaticFetcher {
        async fn fetch(&self, _reference: &DocumentReference) -> Result<Vec<u8>, ExtractError> {
            Ok(b"%PDF-fake".to_vec())
        }
    }

    struct FakeBackend {
        pages: Vec<Vec<&'static str>>,
    }

    impl PdfBackend for FakeBackend {
        fn open(&self, _bytes: &[u8]) -> Result<Box<dyn PdfDocument>, ExtractError> {
            Ok(Box::new(FakeDocument {
                pages: self.pages.clone(),
            }))
        }
    }

    struct FakeDocument {
        pages: Vec<Vec<&'static str>>,
    }

    impl PdfDocument for FakeDocument {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn text_items(&self, page_number: u32) -> Result<Vec<String>, ExtractError> {
            Ok(self.pages[(page_number - 1) as usize]
                .iter()
                .map(|item| item.to_string())
                .collect())
        }
    }

    // Pages are 400 x 600 points.
    struct FakeRenderer;

    impl PageRenderer for FakeRenderer {
        fn render(
            &self,
            _pdf_bytes: &[u8],
            page_number: u32,
            render_scale: f32,
        ) -> Result<PageRaster, ExtractError> {
            Ok(PageRaster {
                page_number,
                width: (400.0 * render_scale) as u32,
                height: (600.0 * render_scale) as u32,
                png_bytes: b"\x89PNG".to_vec(),
            })
        }
    }

    struct BrokenRenderer;

    impl PageRenderer for BrokenRenderer {
        fn render(
            &self,
            _pdf_bytes: &[u8],
            page_number: u32,
            _render_scale: f32,
        ) -> Result<PageRaster, ExtractError> {
            Err(ExtractError::Render {
                page: page_number,
                details: "no pdfium".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingOcr {
        calls: Mutex<Vec<(u32, u32, u32, String)>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl OcrEngine for RecordingOcr {
        async fn recognize(
            &self,
            raster: &PageRaster,
            language: &str,
        ) -> Result<String, ExtractError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((
                    raster.page_number,
                    raster.width,
                    raster.height,
                    language.to_string(),
                ));
            }
            Ok(format!("recognized page {}", raster.page_number))
        }
    }

    fn extractor(pages: Vec<Vec<&'static str>>) -> PdfTextExtractor {
        PdfTextExtractor::new(ExtractorOptions::default())
            .with_fetcher(Arc::new(StaticFetcher))
            .with_backend(Arc::new(FakeBackend { pages }))
            .with_renderer(Arc::new(FakeRenderer))
    }

    #[tokio::test]
    async fn text_layer_items_are_joined_with_spaces() {
        let extractor = extractor(vec![vec!["Rule", "of law"], vec!["Checks and balances"]]);
        let text = extractor.extract(&DocumentReference::new("civics.pdf")).await;

        assert_eq!(
            text,
            "Page 1:\nRule of law\n\nPage 2:\nChecks and balances\n\n"
        );
    }

    #[tokio::test]
    async fn scanned_pages_are_rendered_at_scale_then_recognized() {
        let ocr = Arc::new(RecordingOcr::default());
        let extractor =
            extractor(vec![vec!["Typed page"], Vec::new()]).with_ocr(ocr.clone());
        let text = extractor.extract(&DocumentReference::new("mixed.pdf")).await;

        assert_eq!(
            text,
            "Page 1:\nTyped page\n\nPage 2 (OCR):\nrecognized page 2\n\n"
        );
        let calls = ocr.calls.lock().map(|calls| calls.clone()).unwrap_or_default();
        assert_eq!(calls, vec![(2, 600, 900, "eng".to_string())]);
    }

    #[tokio::test]
    async fn render_failure_degrades_to_empty_text() {
        let extractor = extractor(vec![vec!["Typed page"], Vec::new()])
            .with_renderer(Arc::new(BrokenRenderer))
            .with_ocr(Arc::new(RecordingOcr::default()));
        let reference = DocumentReference::new("scan.pdf");

        assert!(matches!(
            extractor.extract_document(&reference).await,
            Err(ExtractError::Render { page: 2, .. })
        ));
        assert_eq!(extractor.extract(&reference).await, "");
    }

    #[tokio::test]
    async fn document_without_any_text_returns_sentinel() {
        let empty = extractor(Vec::new());
        assert_eq!(
            empty.extract(&DocumentReference::new("empty.pdf")).await,
            NO_TEXT_SENTINEL
        );

        let blank_scans = extractor(vec![Vec::new(), Vec::new()]);
        assert_eq!(
            blank_scans.extract(&DocumentReference::new("blank.pdf")).await,
            NO_TEXT_SENTINEL
        );
    }

    #[tokio::test]
    async fn scanned_page_without_engine_keeps_ocr_header() {
        let extractor = extractor(vec![vec!["Cover"], Vec::new()]);
        let document = extractor
            .extract_document(&DocumentReference::new("scan.pdf"))
            .await
            .expect("extraction should succeed");

        assert_eq!(document.pages[1].sourced_via, PageSource::Ocr);
        assert_eq!(document.pages[1].text, "");
        assert_eq!(document.ocr_page_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ocr_past_timeout_degrades_to_empty_text() {
        let ocr = Arc::new(RecordingOcr {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let extractor = PdfTextExtractor::new(ExtractorOptions {
            ocr_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        })
        .with_fetcher(Arc::new(StaticFetcher))
        .with_backend(Arc::new(FakeBackend {
            pages: vec![Vec::new()],
        }))
        .with_renderer(Arc::new(FakeRenderer))
        .with_ocr(ocr);

        let reference = DocumentReference::new("slow.pdf");
        let failure = extractor.extract_document(&reference).await;
        assert!(matches!(failure, Err(ExtractError::OcrTimeout { page: 1, .. })));
        assert_eq!(extractor.extract(&reference).await, "");
    }

    #[tokio::test]
    async fn unreadable_pdf_degrades_to_empty_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        let extractor = PdfTextExtractor::new(ExtractorOptions::default());
        let reference = DocumentReference::new(path.to_string_lossy());
        assert!(matches!(
            extractor.extract_document(&reference).await,
            Err(ExtractError::PdfParse(_))
        ));
        assert_eq!(extractor.extract(&reference).await, "");
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let fetcher = LocatorFetcher::default();
        let result = fetcher
            .fetch(&DocumentReference::new("/definitely/not/here.pdf"))
            .await;
        assert!(matches!(result, Err(ExtractError::Io(_))));
    }

    #[tokio::test]
    async fn file_urls_are_read_from_disk() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"bytes")?;
        let url = Url::from_file_path(&path).map_err(|_| "path is not absolute")?;

        let bytes = LocatorFetcher::default()
            .fetch(&DocumentReference::new(url.as_str()))
            .await?;
        assert_eq!(bytes, b"bytes");
        Ok(())
    }

    #[tokio::test]
    async fn empty_locator_is_rejected() {
        let result = LocatorFetcher::default()
            .fetch(&DocumentReference::new("  "))
            .await;
        assert!(matches!(result, Err(ExtractError::InvalidReference(_))));
    }
}
