//! Teardown reporting.

use std::io::Write as _;

use prettytable::{Attr, Cell, Row, Table};
use serde::Serialize;

use crate::instance::Interlay;
use crate::objects::{LeakClass, ObjectKind, TypeCounts};
use crate::timing::FnTiming;

/// Formats a duration in nanoseconds into a human-readable string with
/// appropriate units.
pub fn format_duration(ns: u64) -> String {
    if ns < 1_000 {
        format!("{} ns", ns)
    } else if ns < 1_000_000 {
        format!("{:.2} µs", ns as f64 / 1_000.0)
    } else if ns < 1_000_000_000 {
        format!("{:.2} ms", ns as f64 / 1_000_000.0)
    } else {
        format!("{:.2} s", ns as f64 / 1_000_000_000.0)
    }
}

/// One tracked object type's final accounting, for structured output.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectReport {
    pub label: &'static str,
    pub class: LeakClass,
    #[serde(flatten)]
    pub counts: TypeCounts,
}

/// Everything the teardown report covers, captured in one pass.
#[derive(Serialize)]
pub struct Snapshot {
    pub elapsed_ns: u64,
    pub objects: Vec<ObjectReport>,
    pub timing: Vec<FnTiming>,
}

impl Snapshot {
    pub fn collect(intercept: &Interlay) -> Self {
        let objects = ObjectKind::ALL
            .iter()
            .filter_map(|&kind| {
                let counts = intercept.objects().snapshot(kind);
                match counts.classify() {
                    LeakClass::Untouched => None,
                    class => Some(ObjectReport {
                        label: kind.label(),
                        class,
                        counts,
                    }),
                }
            })
            .collect();
        Self {
            elapsed_ns: intercept.elapsed().as_nanos() as u64,
            objects,
            timing: intercept.timing().snapshot(),
        }
    }
}

/// How teardown results are emitted.
///
/// The built-in reporters cover plain text and JSON; embedders can supply
/// their own to feed CI or logging systems instead.
pub trait Reporter: Send + Sync {
    fn report(&self, intercept: &Interlay) -> Result<(), Box<dyn std::error::Error>>;
}

pub struct TableReporter;

impl Reporter for TableReporter {
    fn report(&self, intercept: &Interlay) -> Result<(), Box<dyn std::error::Error>> {
        let mut out = std::io::stdout().lock();

        writeln!(out)?;
        writeln!(
            out,
            "[interlay] teardown report ({})",
            format_duration(intercept.elapsed().as_nanos() as u64)
        )?;
        writeln!(out)?;
        intercept.objects().write_report(&mut out)?;

        let rows = intercept.timing().snapshot();
        if !rows.is_empty() {
            let mut table = Table::new();
            table.add_row(Row::new(
                ["Function", "Calls", "Total", "Avg", "Min", "Max"]
                    .iter()
                    .map(|header| Cell::new(header).with_style(Attr::Bold))
                    .collect(),
            ));
            for row in &rows {
                table.add_row(Row::new(vec![
                    Cell::new(row.name),
                    Cell::new(&row.calls.to_string()),
                    Cell::new(&format_duration(row.total_ns)),
                    Cell::new(&format_duration(row.avg_ns())),
                    Cell::new(&format_duration(row.min_ns)),
                    Cell::new(&format_duration(row.max_ns)),
                ]));
            }
            table.print(&mut out)?;
        }
        Ok(())
    }
}

pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, intercept: &Interlay) -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = Snapshot::collect(intercept);
        println!("{}", serde_json::to_string(&snapshot)?);
        Ok(())
    }
}
