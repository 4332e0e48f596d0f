//! Single-pass default resolution.
//!
//! Descriptors are visited in table order. A condition sees another option's
//! default only when that option's descriptor came earlier in the table;
//! [`DescriptorTable::forward_references`] reports entries that break this.
//!
//! A second pass changes nothing only when that list is empty: a condition
//! that missed a later default in the first pass sees it in the second.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config_annotator::{AppliedDefault, Annotator, DefaultReason, NoopAnnotator};
use crate::config_descriptor::{DefaultRule, DescriptorTable};
use crate::config_types::{ConfigDocument, Region};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The descriptor table is malformed: a multi-rule default produced a non-array piece.
    #[error("Value merging is available only for arrays: `{option}` got {}", render_candidates(.candidates))]
    NonArrayMerge {
        option: String,
        candidates: Vec<Option<Value>>,
    },
}

fn render_candidates(candidates: &[Option<Value>]) -> String {
    candidates
        .iter()
        .map(|candidate| candidate.as_ref().map_or_else(|| "<no value>".to_string(), Value::to_string))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fills every missing option that has a default policy and returns the document.
pub fn resolve(table: &DescriptorTable, document: ConfigDocument) -> Result<ConfigDocument, ResolveError> {
    resolve_with(table, document, &mut NoopAnnotator)
}

/// Like [`resolve`], reporting each filled option to `annotator`.
pub fn resolve_with<A: Annotator + ?Sized>(
    table: &DescriptorTable,
    mut document: ConfigDocument,
    annotator: &mut A,
) -> Result<ConfigDocument, ResolveError> {
    resolve_in_place(table, &mut document, annotator)?;
    Ok(document)
}

/// On error the options before the failing descriptor are already written
/// and the rest are not; the document should be discarded.
pub fn resolve_in_place<A: Annotator + ?Sized>(
    table: &DescriptorTable,
    document: &mut ConfigDocument,
    annotator: &mut A,
) -> Result<(), ResolveError> {
    let mut filled = 0usize;

    for (key, descriptor) in table.iter() {
        let Some(policy) = &descriptor.default else {
            trace!(key, "no default policy");
            continue;
        };
        let region = descriptor.region();
        if document.is_defined(region, &descriptor.name) {
            trace!(option = %descriptor.name, "already defined");
            continue;
        }

        let (candidates, reasons): (Vec<_>, Vec<_>) = policy
            .rules()
            .iter()
            .map(|rule| evaluate_rule(document, region, rule))
            .unzip();

        let merged = merge_candidates(&descriptor.name, candidates)
            .inspect_err(|err| warn!(option = %descriptor.name, error = %err, "default merge failed"))?;
        let Some(value) = merged else {
            debug!(option = %descriptor.name, "no applicable default");
            continue;
        };

        debug!(option = %descriptor.name, ?region, %value, "filled default");
        annotator.record_default(&AppliedDefault {
            descriptor,
            value: &value,
            reasons: &reasons,
        });
        document.set(region, &descriptor.name, value);
        filled += 1;
    }

    debug!(filled, descriptors = table.len(), "resolution pass complete");
    Ok(())
}

fn evaluate_rule<'r>(
    document: &ConfigDocument,
    own_region: Region,
    rule: &'r DefaultRule,
) -> (Option<Value>, DefaultReason<'r>) {
    match rule {
        DefaultRule::Literal(value) => (Some(value.clone()), DefaultReason::Literal),
        DefaultRule::Presence { option, defined, not_defined } => {
            if document.is_defined(Region::Root, option) {
                (Some(defined.clone()), DefaultReason::Defined { option })
            } else if let Some(value) = not_defined {
                (Some(value.clone()), DefaultReason::NotDefined { option })
            } else {
                (None, DefaultReason::NoValue { option })
            }
        }
        DefaultRule::MultiValue { option, values, otherwise } => {
            let matched = document
                .get(own_region, option)
                .and_then(|current| values.iter().find(|(candidate, _)| candidate == current));

            match (matched, otherwise) {
                (Some((value, result)), _) => (Some(result.clone()), DefaultReason::Matched { option, value }),
                (None, Some(fallback)) => (
                    Some(fallback.clone()),
                    DefaultReason::Otherwise { option, tried: values },
                ),
                (None, None) => (None, DefaultReason::NoValue { option }),
            }
        }
    }
}

/// One candidate is taken as is. Several candidates must all be arrays (or
/// no value) and are concatenated in rule order.
fn merge_candidates(option: &str, candidates: Vec<Option<Value>>) -> Result<Option<Value>, ResolveError> {
    if candidates.len() == 1 {
        return Ok(candidates.into_iter().flatten().next());
    }

    if candidates.iter().flatten().any(|piece| !piece.is_array()) {
        return Err(ResolveError::NonArrayMerge {
            option: option.to_string(),
            candidates,
        });
    }
    if candidates.iter().all(Option::is_none) {
        return Ok(None);
    }

    let merged = candidates
        .into_iter()
        .flatten()
        .filter_map(|piece| match piece {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .flatten()
        .collect();
    Ok(Some(Value::Array(merged)))
}
