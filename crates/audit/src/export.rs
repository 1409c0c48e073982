//! Collaborator-facing exports: flat CSV and a human-readable report.
//!
//! Both summarize counts by type and module over whatever slice of events the
//! caller passes in (typically a query result), then list the full
//! chronological detail.

use std::collections::BTreeMap;

use crate::event::AuditEvent;

/// Delimited export, one row per event, header first.
pub fn export_csv(events: &[AuditEvent]) -> String {
    let mut csv = String::from(
        "id,timestamp,type,module,description,amount,currency,account_id,reference,status\n",
    );
    for e in events {
        let row = [
            e.id.to_string(),
            e.timestamp.to_rfc3339(),
            e.event_type.to_string(),
            e.module.to_string(),
            e.description.clone(),
            e.amount.map(|a| a.to_string()).unwrap_or_default(),
            e.currency.as_ref().map(|c| c.to_string()).unwrap_or_default(),
            e.account_id.map(|a| a.to_string()).unwrap_or_default(),
            e.reference.clone().unwrap_or_default(),
            format!("{:?}", e.status).to_ascii_uppercase(),
        ];
        let quoted: Vec<String> = row
            .iter()
            .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
            .collect();
        csv.push_str(&quoted.join(","));
        csv.push('\n');
    }
    csv
}

/// Human-readable report: executive summary plus detailed chronological log.
pub fn export_report(events: &[AuditEvent]) -> String {
    let rule = "=".repeat(63);
    let sep = "-".repeat(63);

    let total_volume: i64 = events.iter().filter_map(|e| e.amount).sum();

    let mut report = format!(
        "{rule}\n  Custodia Ledger - Audit Event Log\n{rule}\n\n\
         Total events: {}\nTotal volume (minor units): {}\n\n\
         By event type:\n{}\nBy module:\n{}\n{rule}\nDETAILED EVENT LOG\n{rule}\n",
        events.len(),
        total_volume,
        counts_block(events.iter().map(|e| e.event_type.to_string())),
        counts_block(events.iter().map(|e| e.module.to_string())),
    );

    for (index, e) in events.iter().enumerate() {
        report.push_str(&format!(
            "\n{}. [{}] {}\n   Id:          {}\n   Module:      {}\n   Description: {}\n   Status:      {:?}\n",
            index + 1,
            e.timestamp.to_rfc3339(),
            e.event_type,
            e.id,
            e.module,
            e.description,
            e.status,
        ));
        if let (Some(amount), Some(currency)) = (e.amount, e.currency.as_ref()) {
            report.push_str(&format!("   Amount:      {currency} {amount}\n"));
        }
        if let Some(account) = e.account_id {
            report.push_str(&format!("   Account:     {account}\n"));
        }
        if let Some(reference) = &e.reference {
            report.push_str(&format!("   Reference:   {reference}\n"));
        }
        if !e.metadata.is_empty() {
            report.push_str(&format!(
                "   Metadata:    {}\n",
                serde_json::Value::Object(e.metadata.clone())
            ));
        }
        report.push_str(&sep);
        report.push('\n');
    }

    report
}

fn counts_block(keys: impl Iterator<Item = String>) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    if counts.is_empty() {
        return "  (no events)\n".to_string();
    }
    counts
        .into_iter()
        .map(|(key, count)| format!("  {key}: {count}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditDraft, AuditEventType, AuditModule};
    use custodia_core::Currency;

    fn sample_events() -> Vec<AuditEvent> {
        let usd = Currency::new("USD").unwrap();
        vec![
            AuditDraft::new(
                AuditEventType::AccountCreated,
                AuditModule::CustodyAccounts,
                "account opened",
            )
            .amount(1_000, &usd)
            .into_event(),
            AuditDraft::new(
                AuditEventType::TransferCreated,
                AuditModule::TransferCoordinator,
                "transfer, with comma",
            )
            .reference("TRF-1")
            .into_event(),
        ]
    }

    #[test]
    fn csv_has_header_and_one_row_per_event() {
        let csv = export_csv(&sample_events());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,timestamp,type"));
        assert!(lines[1].contains("ACCOUNT_CREATED"));
        assert!(lines[2].contains("\"transfer, with comma\""));
    }

    #[test]
    fn report_summarizes_counts_by_type_and_module() {
        let report = export_report(&sample_events());
        assert!(report.contains("Total events: 2"));
        assert!(report.contains("ACCOUNT_CREATED: 1"));
        assert!(report.contains("TRANSFER_COORDINATOR: 1"));
        assert!(report.contains("Reference:   TRF-1"));
    }
}
