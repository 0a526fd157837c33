//! CSV export for per-cycle control records.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::dlm::types::CycleSummary;

/// Schema v1 column header for CSV telemetry export.
///
/// One row per session decision, with the cycle-level fields repeated; a
/// cycle without decisions still contributes one row so degraded cycles stay
/// visible in the export.
pub const CYCLE_SCHEMA_V1_HEADER: &str = "cycle,ceiling_kw,metered_kw,ev_kw,base_kw,\
                                          headroom_kw,battery_soc_pct,device,connector,\
                                          status,current_kw,max_kw,allocated_kw,limit_w,\
                                          applied,error";

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// Writes cycle summaries as CSV to any writer.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_cycle_csv(writer: impl Write, summaries: &[CycleSummary]) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(CYCLE_SCHEMA_V1_HEADER.split(',').map(str::trim))?;

    for summary in summaries {
        let cycle_fields = [
            summary.cycle.to_string(),
            format!("{:.4}", summary.ceiling_kw),
            opt(summary.metered_load_kw),
            format!("{:.4}", summary.ev_load_kw),
            opt(summary.base_load_kw),
            opt(summary.headroom_kw),
            opt(summary.battery_soc),
        ];

        if summary.sessions.is_empty() {
            let mut record: Vec<String> = cycle_fields.to_vec();
            record.extend(std::iter::repeat_n(String::new(), 8));
            record.push(summary.errors.join("; "));
            wtr.write_record(&record)?;
            continue;
        }

        for decision in &summary.sessions {
            let mut record: Vec<String> = cycle_fields.to_vec();
            record.extend([
                decision.device_id.clone(),
                decision.connector_id.to_string(),
                decision.status.to_string(),
                format!("{:.4}", decision.current_power_kw),
                format!("{:.4}", decision.max_power_kw),
                format!("{:.4}", decision.allocated_kw),
                decision.limit_w.to_string(),
                decision.applied.to_string(),
                decision.error.clone().unwrap_or_default(),
            ]);
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()
}

/// Exports cycle summaries to a CSV file at the given path.
pub fn export_csv(summaries: &[CycleSummary], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_cycle_csv(io::BufWriter::new(file), summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlm::types::{SessionDecision, SessionStatus};

    fn summary_with_sessions(cycle: u64, count: usize) -> CycleSummary {
        CycleSummary {
            cycle,
            ceiling_kw: 50.0,
            metered_load_kw: Some(31.4),
            ev_load_kw: 14.0,
            base_load_kw: Some(17.4),
            headroom_kw: Some(32.6),
            battery_soc: Some(62.0),
            sessions: (0..count)
                .map(|i| SessionDecision {
                    device_id: format!("charger-00{}", i + 1),
                    connector_id: 1,
                    status: SessionStatus::Charging,
                    current_power_kw: 7.0,
                    max_power_kw: 11.0,
                    allocated_kw: 9.5,
                    limit_w: 9_500,
                    applied: true,
                    error: None,
                })
                .collect(),
            errors: Vec::new(),
            aborted: false,
        }
    }

    #[test]
    fn csv_has_schema_header_and_one_row_per_decision() {
        let summaries = vec![summary_with_sessions(1, 2), summary_with_sessions(2, 2)];
        let mut out = Vec::new();
        write_cycle_csv(&mut out, &summaries).expect("csv export should succeed");

        let csv = String::from_utf8(out).expect("csv output should be valid UTF-8");
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert_eq!(header.split(',').count(), 16);
        assert!(header.starts_with("cycle,ceiling_kw"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn degraded_cycle_still_contributes_a_row() {
        let summaries = vec![CycleSummary::aborted(3, 50.0, "site load unavailable")];
        let mut out = Vec::new();
        write_cycle_csv(&mut out, &summaries).unwrap();

        let csv = String::from_utf8(out).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("3,50.0000,"));
        assert!(row.contains("site load unavailable"));
    }
}
