//! QTI quiz export extraction.
//!
//! Walks an IMS QTI 1.2 assessment export and emits the long-format question
//! bank: one stem row per `<item>` followed by one row per
//! `<response_label>`, in document order. Element names are matched on their
//! local name, so namespaced exports parse the same as bare ones.

use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Anomaly, PipelineError, StageOutcome};
use crate::model::QuestionResponse;
use crate::text::decode_entities;

/// Where a `<mattext>` was found, which decides what its text is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextContext {
    Stem,
    Metadata,
    Response,
}

#[derive(Debug, Default)]
struct ResponseDraft {
    ident: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Default)]
struct ItemDraft {
    ordinal: usize,
    ident: Option<String>,
    stem: Option<String>,
    correct: Option<String>,
    responses: Vec<ResponseDraft>,
    in_metadata: usize,
    in_response: bool,
    in_condition: usize,
}

#[derive(Debug)]
struct Capture {
    context: TextContext,
    depth: usize,
    buf: String,
}

/// Extract the question bank from a QTI export held in memory.
pub fn extract_questions(xml: &str) -> Result<StageOutcome<Vec<QuestionResponse>>, PipelineError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut rows = Vec::new();
    let mut anomalies = Vec::new();
    let mut items_seen = 0usize;
    let mut items_kept = 0usize;

    let mut depth = 0usize;
    let mut item: Option<ItemDraft> = None;
    let mut mattext: Option<Capture> = None;
    let mut varequal: Option<Capture> = None;

    loop {
        let event = reader.read_event().map_err(|e| PipelineError::MalformedXml {
            position: reader.error_position(),
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                depth += 1;
                open_element(&e, depth, &mut item, &mut mattext, &mut varequal, &mut items_seen);
            }
            Event::Empty(e) => {
                // Self-closing elements open and close in one step.
                open_element(
                    &e,
                    depth + 1,
                    &mut item,
                    &mut mattext,
                    &mut varequal,
                    &mut items_seen,
                );
                let name = local_name(&e);
                close_element(
                    &name,
                    depth + 1,
                    &mut item,
                    &mut mattext,
                    &mut varequal,
                    &mut rows,
                    &mut anomalies,
                    &mut items_kept,
                );
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                close_element(
                    &name,
                    depth,
                    &mut item,
                    &mut mattext,
                    &mut varequal,
                    &mut rows,
                    &mut anomalies,
                    &mut items_kept,
                );
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) => {
                let text = match e.unescape() {
                    Ok(text) => text.into_owned(),
                    // Named HTML entities such as &nbsp; are not XML; decode per reference.
                    Err(_) => decode_entities(&String::from_utf8_lossy(&e)).into_owned(),
                };
                append_text(&text, &mut mattext, &mut varequal);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                append_text(&text, &mut mattext, &mut varequal);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if items_seen == 0 {
        return Err(PipelineError::NoQuestions);
    }
    if items_kept == 0 {
        return Err(PipelineError::NothingExtracted {
            skipped: anomalies.len(),
        });
    }

    tracing::info!(
        questions = items_kept,
        rows = rows.len(),
        skipped = anomalies.len(),
        "extracted question bank"
    );

    Ok(StageOutcome::new(rows, anomalies))
}

/// Read and extract a QTI export from disk.
pub fn extract_questions_file(path: &Path) -> Result<StageOutcome<Vec<QuestionResponse>>> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz export: {}", path.display()))?;
    extract_questions(&xml).with_context(|| format!("failed to extract {}", path.display()))
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    let attr = e.try_get_attribute(key).ok().flatten()?;
    let value = attr.unescape_value().ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn open_element(
    e: &BytesStart<'_>,
    depth: usize,
    item: &mut Option<ItemDraft>,
    mattext: &mut Option<Capture>,
    varequal: &mut Option<Capture>,
    items_seen: &mut usize,
) {
    let name = local_name(e);

    if name == "item" {
        if item.is_none() {
            *items_seen += 1;
            *item = Some(ItemDraft {
                ordinal: *items_seen,
                ident: attribute(e, "ident"),
                ..ItemDraft::default()
            });
        }
        return;
    }

    let Some(draft) = item.as_mut() else {
        return;
    };

    match name.as_str() {
        "itemmetadata" => draft.in_metadata += 1,
        "conditionvar" => draft.in_condition += 1,
        "response_label" => {
            draft.responses.push(ResponseDraft {
                ident: attribute(e, "ident"),
                text: None,
            });
            draft.in_response = true;
        }
        "mattext" if mattext.is_none() => {
            let context = if draft.in_metadata > 0 {
                TextContext::Metadata
            } else if draft.in_response {
                TextContext::Response
            } else {
                TextContext::Stem
            };
            *mattext = Some(Capture {
                context,
                depth,
                buf: String::new(),
            });
        }
        "varequal" if draft.in_condition > 0 && draft.correct.is_none() && varequal.is_none() => {
            *varequal = Some(Capture {
                context: TextContext::Stem,
                depth,
                buf: String::new(),
            });
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn close_element(
    name: &str,
    depth: usize,
    item: &mut Option<ItemDraft>,
    mattext: &mut Option<Capture>,
    varequal: &mut Option<Capture>,
    rows: &mut Vec<QuestionResponse>,
    anomalies: &mut Vec<Anomaly>,
    items_kept: &mut usize,
) {
    if name == "item" {
        if let Some(draft) = item.take() {
            *mattext = None;
            *varequal = None;
            if finish_item(draft, rows, anomalies) {
                *items_kept += 1;
            }
        }
        return;
    }

    let Some(draft) = item.as_mut() else {
        return;
    };

    match name {
        "itemmetadata" => draft.in_metadata = draft.in_metadata.saturating_sub(1),
        "conditionvar" => draft.in_condition = draft.in_condition.saturating_sub(1),
        "response_label" => draft.in_response = false,
        "mattext" if mattext.as_ref().is_some_and(|c| c.depth == depth) => {
            if let Some(capture) = mattext.take() {
                let text = capture.buf.trim().to_string();
                match capture.context {
                    TextContext::Metadata => {}
                    TextContext::Response => {
                        if let Some(resp) = draft.responses.last_mut() {
                            if resp.text.is_none() {
                                resp.text = Some(text);
                            }
                        }
                    }
                    TextContext::Stem => {
                        if draft.stem.is_none() && !text.is_empty() {
                            draft.stem = Some(text);
                        }
                    }
                }
            }
        }
        "varequal" if varequal.as_ref().is_some_and(|c| c.depth == depth) => {
            if let Some(capture) = varequal.take() {
                let text = capture.buf.trim();
                if !text.is_empty() {
                    draft.correct = Some(text.to_string());
                }
            }
        }
        _ => {}
    }
}

fn append_text(text: &str, mattext: &mut Option<Capture>, varequal: &mut Option<Capture>) {
    if let Some(capture) = mattext.as_mut() {
        capture.buf.push_str(text);
    }
    if let Some(capture) = varequal.as_mut() {
        capture.buf.push_str(text);
    }
}

/// Emit a finished item's rows. Returns `false` if the item was skipped.
fn finish_item(
    draft: ItemDraft,
    rows: &mut Vec<QuestionResponse>,
    anomalies: &mut Vec<Anomaly>,
) -> bool {
    let entry = format!("item #{}", draft.ordinal);

    let Some(question_id) = draft.ident else {
        tracing::warn!("skipping {entry}: missing ident attribute");
        anomalies.push(Anomaly::SkippedEntry {
            entry,
            reason: "missing ident attribute".into(),
        });
        return false;
    };

    let mut responses = Vec::with_capacity(draft.responses.len());
    for (i, resp) in draft.responses.into_iter().enumerate() {
        match resp.ident {
            Some(ident) => responses.push((ident, resp.text.unwrap_or_default())),
            None => {
                let entry = format!("response #{} of item {question_id}", i + 1);
                tracing::warn!("skipping {entry}: missing ident attribute");
                anomalies.push(Anomaly::SkippedEntry {
                    entry,
                    reason: "missing ident attribute".into(),
                });
            }
        }
    }

    if responses.is_empty() {
        tracing::warn!("skipping item {question_id}: no usable response_label elements");
        anomalies.push(Anomaly::SkippedEntry {
            entry: format!("item {question_id}"),
            reason: "no usable response_label elements".into(),
        });
        return false;
    }

    if draft.correct.is_none() {
        tracing::warn!("item {question_id} has no correct-response marker");
    }

    rows.push(QuestionResponse::stem(
        question_id.clone(),
        draft.stem.unwrap_or_default(),
    ));
    for (ident, text) in responses {
        let is_correct = draft.correct.as_deref() == Some(ident.as_str());
        rows.push(QuestionResponse::response(
            question_id.clone(),
            ident,
            text,
            is_correct,
        ));
    }
    true
}
