use crate::error::AggregationError;
use crate::extractor::TextExtractor;
use crate::models::DocumentReference;
use std::sync::Arc;
use tracing::{error, info};

// Input order is kept. A task that panics or is cancelled fails the whole
// aggregate once every task has settled.
pub async fn aggregate<E>(
    extractor: Arc<E>,
    references: &[DocumentReference],
    labels: &[String],
) -> Result<String, AggregationError>
where
    E: TextExtractor + ?Sized + 'static,
{
    info!(documents = references.len(), "aggregating documents");

    let handles = references
        .iter()
        .cloned()
        .map(|reference| {
            let extractor = Arc::clone(&extractor);
            tokio::spawn(async move { extractor.extract_text(&reference).await })
        })
        .collect::<Vec<_>>();

    let mut texts = Vec::with_capacity(handles.len());
    let mut failure = None;
    for (position, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(text) => texts.push(text),
            Err(join_error) => {
                error!(position, error = %join_error, "extraction task failed");
                failure.get_or_insert(AggregationError::TaskFailed {
                    position,
                    reason: join_error.to_string(),
                });
            }
        }
    }

    if let Some(failure) = failure {
        return Err(failure);
    }

    Ok(texts
        .iter()
        .enumerate()
        .map(|(position, text)| {
            let label = label_for(position, labels, references.get(position));
            format!("=== {label} ===\n{text}\n\n")
        })
        .collect())
}

pub fn label_for(
    position: usize,
    labels: &[String],
    reference: Option<&DocumentReference>,
) -> String {
    labels
        .get(position)
        .map(String::as_str)
        .filter(|label| !label.trim().is_empty())
        .or_else(|| {
            reference
                .and_then(|reference| reference.label.as_deref())
                .filter(|label| !label.trim().is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("Document {}", position + 1))
}
