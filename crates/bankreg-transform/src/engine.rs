//! Batch execution of a [`RuleSet`].
//!
//! Single-record rules run per record on the rayon pool; records share
//! nothing but the read-only rule set, and results are collected back in
//! source order. Cross-record rules run afterwards, in declared order, over
//! the records that survived.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use bankreg_model::{Annotation, CanonicalRecord, CanonicalValue, DataQualityError, RawRecord};
use rayon::prelude::*;
use tracing::{debug, info_span, warn};

use crate::record::WorkingRecord;
use crate::rule::{CrossRecordRule, Outcome, Rule, RuleKind, Severity};
use crate::rule_set::{CleanOptions, ErrorPolicy, RuleSet};

/// Result of cleaning one batch.
#[derive(Debug, Clone, Default)]
pub struct CleanOutcome {
    /// Surviving records, in source order unless a sort rule re-sorted them.
    pub records: Vec<CanonicalRecord>,
    /// Single-record errors by row, then cross-record errors.
    pub errors: Vec<DataQualityError>,
    /// Number of source records excluded by hard failures.
    pub excluded: usize,
    /// Set when [`ErrorPolicy::AbortBatch`] stopped the batch after the
    /// single-record phase.
    pub halted: bool,
}

impl CleanOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn annotations(&self) -> impl Iterator<Item = (&CanonicalRecord, &Annotation)> {
        self.records
            .iter()
            .flat_map(|record| record.annotations().iter().map(move |a| (record, a)))
    }
}

/// Clean `raw` with the rule set's own options.
pub fn clean(raw: &[RawRecord], rules: &RuleSet) -> CleanOutcome {
    clean_with_options(raw, rules, rules.options())
}

pub fn clean_with_options(
    raw: &[RawRecord],
    rules: &RuleSet,
    options: CleanOptions,
) -> CleanOutcome {
    let span = info_span!("clean", records = raw.len(), rules = rules.len());
    let _guard = span.enter();
    let start = Instant::now();

    let single: Vec<&Rule> = rules.single_record().collect();
    let mut evaluated: Vec<WorkingRecord> = raw
        .par_iter()
        .map(|record| run_single_record(record, &single))
        .collect();

    let mut errors = Vec::new();
    let mut excluded = 0;
    evaluated.retain_mut(|record| {
        if record.is_rejected() {
            excluded += 1;
            warn!(
                row = %record.row(),
                section = record.section(),
                "record excluded by hard rule"
            );
            errors.extend(record.take_errors());
            false
        } else {
            true
        }
    });

    let halted = options.error_policy == ErrorPolicy::AbortBatch && !errors.is_empty();
    if halted {
        warn!(
            errors = errors.len(),
            "hard failure under abort policy, skipping cross-record rules"
        );
    } else {
        for rule in rules.cross_record() {
            let before = evaluated.len();
            run_cross_record(rule, &mut evaluated, &mut errors);
            excluded += before - evaluated.len();
        }
    }

    let records: Vec<CanonicalRecord> = evaluated.into_iter().map(WorkingRecord::finish).collect();
    debug!(
        records = records.len(),
        excluded,
        errors = errors.len(),
        annotations = records.iter().map(|r| r.annotations().len()).sum::<usize>(),
        halted,
        duration_ms = start.elapsed().as_millis(),
        "clean complete"
    );
    CleanOutcome {
        records,
        errors,
        excluded,
        halted,
    }
}

fn run_single_record(raw: &RawRecord, rules: &[&Rule]) -> WorkingRecord {
    let mut record = WorkingRecord::from_raw(raw);
    for rule in rules {
        if !rule.applies_to(record.section()) {
            continue;
        }
        if rule.inputs().iter().any(|field| record.is_failed(field)) {
            continue;
        }
        match rule.evaluate(&record) {
            Outcome::Pass | Outcome::Skip => {}
            Outcome::Set(value) => {
                if let Some(target) = rule.target_field() {
                    record.set(target, value);
                }
            }
            Outcome::Clear => {
                if let Some(target) = rule.target_field() {
                    record.clear(target);
                }
            }
            Outcome::Fail(message) => {
                if rule.is_coercion()
                    && let Some(target) = rule.target_field()
                {
                    record.mark_failed(target);
                }
                report_failure(&mut record, rule, message);
            }
        }
    }
    record
}

fn report_failure(record: &mut WorkingRecord, rule: &Rule, message: String) {
    let field = rule.subject_field().map(str::to_string);
    match rule.severity {
        Severity::Hard => {
            let error = DataQualityError {
                row: record.row(),
                section: record.section().to_string(),
                field,
                rule: rule.id.clone(),
                message,
            };
            record.reject(error);
        }
        Severity::Soft => record.annotate(Annotation {
            rule: rule.id.clone(),
            field,
            message,
        }),
    }
}

type Key = Vec<Option<CanonicalValue>>;

fn run_cross_record(
    rule: &Rule,
    records: &mut Vec<WorkingRecord>,
    errors: &mut Vec<DataQualityError>,
) {
    let RuleKind::CrossRecord(kind) = &rule.kind else {
        return;
    };
    match kind {
        CrossRecordRule::UniqueKey { key, max_per_key } => {
            let mut seen: BTreeMap<(String, Key), usize> = BTreeMap::new();
            let verdicts: Vec<Option<String>> = records
                .iter()
                .map(|record| {
                    if !rule.applies_to(record.section()) {
                        return None;
                    }
                    let values = record.key(key);
                    let rendered = render_key(&values);
                    let count = seen
                        .entry((record.section().to_string(), values))
                        .or_insert(0);
                    *count += 1;
                    (*count > *max_per_key).then(|| {
                        format!(
                            "duplicate key {rendered}: occurrence {count} exceeds the limit of {max_per_key}"
                        )
                    })
                })
                .collect();
            apply_verdicts(rule, records, verdicts, errors);
        }
        CrossRecordRule::ReferenceExists {
            key,
            parent_section,
            parent_key,
        } => {
            let parents: BTreeSet<Key> = records
                .iter()
                .filter(|record| record.section() == parent_section)
                .map(|record| record.key(parent_key))
                .filter(|values| values.iter().all(Option::is_some))
                .collect();
            let verdicts: Vec<Option<String>> = records
                .iter()
                .map(|record| {
                    if !rule.applies_to(record.section()) {
                        return None;
                    }
                    let values = record.key(key);
                    if values.iter().any(Option::is_none) {
                        return Some(format!(
                            "key {} is incomplete, no {parent_section} record can match",
                            render_key(&values)
                        ));
                    }
                    (!parents.contains(&values)).then(|| {
                        format!(
                            "key {} has no matching {parent_section} record",
                            render_key(&values)
                        )
                    })
                })
                .collect();
            apply_verdicts(rule, records, verdicts, errors);
        }
        CrossRecordRule::SortByKey { key } => {
            let slots: Vec<usize> = records
                .iter()
                .enumerate()
                .filter(|(_, record)| rule.applies_to(record.section()))
                .map(|(index, _)| index)
                .collect();
            let mut section: Vec<WorkingRecord> =
                slots.iter().map(|&index| records[index].clone()).collect();
            section.sort_by_cached_key(|record| record.key(key));
            for (slot, record) in slots.into_iter().zip(section) {
                records[slot] = record;
            }
        }
    }
}

/// Hard verdicts exclude the record; soft ones annotate it.
fn apply_verdicts(
    rule: &Rule,
    records: &mut Vec<WorkingRecord>,
    verdicts: Vec<Option<String>>,
    errors: &mut Vec<DataQualityError>,
) {
    let mut kept = Vec::with_capacity(records.len());
    for (mut record, verdict) in std::mem::take(records).into_iter().zip(verdicts) {
        match verdict {
            None => kept.push(record),
            Some(message) => {
                report_failure(&mut record, rule, message);
                if record.is_rejected() {
                    warn!(
                        row = %record.row(),
                        section = record.section(),
                        rule = %rule.id,
                        "record excluded by cross-record rule"
                    );
                    errors.extend(record.take_errors());
                } else {
                    kept.push(record);
                }
            }
        }
    }
    *records = kept;
}

fn render_key(values: &[Option<CanonicalValue>]) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|value| {
            value
                .as_ref()
                .map_or_else(|| "<missing>".to_string(), CanonicalValue::render)
        })
        .collect();
    format!("({})", parts.join(", "))
}
