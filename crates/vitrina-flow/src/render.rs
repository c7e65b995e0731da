//! Text rendering of reports and the journal
//!
//! Structured report data becomes plain text in the reader's language.
//! Long output is chunked by the delivery layer, not here.

use vitrina_i18n::Localizer;
use vitrina_reports::{Journal, VitrineReport};
use vitrina_types::{JournalPeriod, Language, MovementKind};

pub(crate) fn journal(
    localizer: &Localizer,
    language: Language,
    journal: &Journal,
    period: JournalPeriod,
) -> String {
    let period_label = localizer.text(period_key(period), language);

    if journal.lines.is_empty() {
        return format!(
            "{} {}",
            localizer.text("operations_not_found", language),
            period_label
        );
    }

    let mut out = format!(
        "{} ({})\n",
        localizer.text("operations_journal", language),
        period_label
    );
    for line in &journal.lines {
        let kind = localizer.text(kind_key(line.kind), language);
        let status = localizer.text(status_key(&line), language);
        out.push_str(&format!(
            "\n{} | {} | {} x{}",
            line.created_at.format("%d.%m.%Y %H:%M"),
            kind,
            line.product_name,
            line.quantity
        ));
        match (&line.from_vitrine, &line.to_vitrine) {
            (Some(from), Some(to)) => out.push_str(&format!(" | {from} -> {to}")),
            (Some(from), None) => out.push_str(&format!(" | {from}")),
            (None, Some(to)) => out.push_str(&format!(" | {to}")),
            (None, None) => {}
        }
        out.push_str(&format!(" | {status}"));
    }

    out.push_str(&format!(
        "\n\n{}: {}",
        localizer.text("total_operations", language),
        journal.total
    ));
    out.push_str(&format!("\n{}\n", localizer.text("operations_statistics", language)));

    let pcs = localizer.text("pcs", language);
    for (key, value) in [
        ("given", journal.totals.given),
        ("taken", journal.totals.taken),
        ("returned", journal.totals.returned),
        ("sold", journal.totals.sold),
        ("transferred", journal.totals.transferred),
    ] {
        out.push_str(&format!("\n{}: {} {}", localizer.text(key, language), value, pcs));
    }
    out
}

pub(crate) fn vitrine_report(
    localizer: &Localizer,
    language: Language,
    report: &VitrineReport,
) -> String {
    let mut out = localizer.text_with(
        "report_title",
        language,
        &[("vitrine", report.vitrine.clone())],
    );

    if report.products.is_empty() {
        out.push('\n');
        out.push_str(&localizer.text("no_products", language));
        return out;
    }

    let pcs = localizer.text("pcs", language);
    let balance_label = localizer.text("balance", language);
    for product in &report.products {
        out.push_str(&format!(
            "\n\n{}\n{}: {} {}",
            product.product_name, balance_label, product.balance, pcs
        ));
        for (key, value) in [
            ("given", product.given + product.transferred_in),
            ("taken", product.taken + product.transferred_out),
            ("returned", product.returned),
            ("sold", product.sold),
        ] {
            if value > 0 {
                out.push_str(&format!("\n{}: {} {}", localizer.text(key, language), value, pcs));
            }
        }
    }
    out
}

fn period_key(period: JournalPeriod) -> &'static str {
    match period {
        JournalPeriod::All | JournalPeriod::ExportCsv => "all_time",
        JournalPeriod::Today => "today",
        JournalPeriod::Week => "week",
        JournalPeriod::Month => "month",
    }
}

fn kind_key(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::Give => "kind_give",
        MovementKind::Take => "kind_take",
        MovementKind::Return => "kind_return",
        MovementKind::Sale => "kind_sale",
        MovementKind::Transfer => "kind_transfer",
    }
}

fn status_key(line: &vitrina_reports::JournalLine) -> &'static str {
    match line.status {
        vitrina_types::TransactionStatus::Pending => "waiting_confirmation",
        vitrina_types::TransactionStatus::Confirmed => "operation_confirmed",
        vitrina_types::TransactionStatus::Rejected => "operation_rejected",
    }
}
