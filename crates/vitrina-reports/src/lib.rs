//! Vitrina Reports - read-side queries over the ledger
//!
//! Structured, language-agnostic views for the flow controller to render:
//! the operations journal with per-kind totals, per-vitrine stock
//! summaries and a CSV export. Balances and statuses are read as-is;
//! nothing here mutates the store.

pub mod csv;
pub mod error;

pub use error::{ReportError, ReportResult};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use vitrina_store::Store;
use vitrina_types::{
    JournalPeriod, MovementKind, Transaction, TransactionStatus, User, UserId,
};

/// Journal lines shown per page
pub const JOURNAL_LIMIT: usize = 100;

/// One journal line with parties and product resolved to display names
#[derive(Debug, Clone, PartialEq)]
pub struct JournalLine {
    pub created_at: DateTime<Utc>,
    pub kind: MovementKind,
    pub product_sku: String,
    pub product_name: String,
    pub quantity: u32,
    pub from_vitrine: Option<String>,
    pub to_vitrine: Option<String>,
    pub status: TransactionStatus,
}

/// Confirmed quantity totals per movement kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindTotals {
    pub given: u32,
    pub taken: u32,
    pub returned: u32,
    pub sold: u32,
    pub transferred: u32,
}

/// The operations journal over a period
#[derive(Debug, Clone, PartialEq)]
pub struct Journal {
    pub lines: Vec<JournalLine>,
    /// Total operations in range, before the line limit
    pub total: usize,
    pub totals: KindTotals,
}

/// Per-product summary line of a vitrine report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSummary {
    pub product_name: String,
    pub given: u32,
    pub returned: u32,
    pub taken: u32,
    pub sold: u32,
    pub transferred_in: u32,
    pub transferred_out: u32,
    pub balance: u32,
}

/// Stock summary of one vitrine over confirmed movements
#[derive(Debug, Clone, PartialEq)]
pub struct VitrineReport {
    pub vitrine: String,
    pub products: Vec<ProductSummary>,
}

/// Read-side reporting over the ledger store
#[derive(Clone)]
pub struct Reports {
    store: Store,
}

impl Reports {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The operations journal for a period, newest first, with per-kind
    /// confirmed totals computed over the whole range.
    pub async fn journal(&self, period: JournalPeriod) -> ReportResult<Journal> {
        let (from, to) = period_range(period, Utc::now());
        let transactions = self.store.transactions().in_range(from, to, None).await?;

        let mut totals = KindTotals::default();
        for tx in &transactions {
            if tx.status != TransactionStatus::Confirmed {
                continue;
            }
            match tx.kind {
                MovementKind::Give => totals.given += tx.quantity,
                MovementKind::Take => totals.taken += tx.quantity,
                MovementKind::Return => totals.returned += tx.quantity,
                MovementKind::Sale => totals.sold += tx.quantity,
                MovementKind::Transfer => totals.transferred += tx.quantity,
            }
        }

        let total = transactions.len();
        let names = self.display_names().await?;
        let lines = transactions
            .into_iter()
            .take(JOURNAL_LIMIT)
            .map(|tx| self.resolve_line(tx, &names))
            .collect();

        Ok(Journal { lines, total, totals })
    }

    /// Stock summary of one vitrine from its confirmed movements
    pub async fn vitrine_report(&self, vitrine_id: UserId) -> ReportResult<VitrineReport> {
        let vitrine = self
            .store
            .users()
            .by_id(vitrine_id)
            .await?
            .ok_or_else(|| ReportError::UnknownVitrine(vitrine_id))?;

        let products: HashMap<_, _> = self
            .store
            .products()
            .all()
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut summaries: HashMap<_, ProductSummary> = HashMap::new();
        for tx in self.store.transactions().for_vitrine(vitrine_id).await? {
            if tx.status != TransactionStatus::Confirmed {
                continue;
            }
            let summary = summaries.entry(tx.product_id).or_insert_with(|| ProductSummary {
                product_name: products
                    .get(&tx.product_id)
                    .cloned()
                    .unwrap_or_else(|| tx.product_id.to_string()),
                ..ProductSummary::default()
            });
            match tx.kind {
                MovementKind::Give => summary.given += tx.quantity,
                MovementKind::Return => summary.returned += tx.quantity,
                MovementKind::Take => summary.taken += tx.quantity,
                MovementKind::Sale => summary.sold += tx.quantity,
                MovementKind::Transfer => {
                    if tx.to_vitrine_id == Some(vitrine_id) {
                        summary.transferred_in += tx.quantity;
                    } else {
                        summary.transferred_out += tx.quantity;
                    }
                }
            }
        }

        for balance in self.store.balances().for_vitrine(vitrine_id).await? {
            let summary = summaries.entry(balance.product_id).or_insert_with(|| ProductSummary {
                product_name: products
                    .get(&balance.product_id)
                    .cloned()
                    .unwrap_or_else(|| balance.product_id.to_string()),
                ..ProductSummary::default()
            });
            summary.balance = balance.quantity;
        }

        let mut products: Vec<_> = summaries.into_values().collect();
        products.sort_by(|a, b| a.product_name.cmp(&b.product_name));

        Ok(VitrineReport { vitrine: vitrine.username, products })
    }

    /// CSV export of the journal over a period
    pub async fn export_csv(&self, period: JournalPeriod) -> ReportResult<String> {
        let (from, to) = period_range(period, Utc::now());
        let transactions = self.store.transactions().in_range(from, to, None).await?;
        let names = self.display_names().await?;

        let mut out = String::from(
            "Date and Time,Operation Type,Product SKU,Product Name,Quantity,\
             Sender Showcase,Receiver Showcase,Status\n",
        );
        for tx in transactions {
            let line = self.resolve_line(tx, &names);
            let row = [
                line.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                line.kind.as_str().to_string(),
                line.product_sku,
                line.product_name,
                line.quantity.to_string(),
                line.from_vitrine.unwrap_or_default(),
                line.to_vitrine.unwrap_or_default(),
                line.status.as_str().to_string(),
            ];
            out.push_str(&csv::render_row(&row));
            out.push('\n');
        }
        Ok(out)
    }

    fn resolve_line(&self, tx: Transaction, names: &DisplayNames) -> JournalLine {
        let (sku, name) = names
            .products
            .get(&tx.product_id)
            .cloned()
            .unwrap_or_else(|| (String::new(), tx.product_id.to_string()));
        JournalLine {
            created_at: tx.created_at,
            kind: tx.kind,
            product_sku: sku,
            product_name: name,
            quantity: tx.quantity,
            from_vitrine: tx.from_vitrine_id.and_then(|id| names.users.get(&id).cloned()),
            to_vitrine: tx.to_vitrine_id.and_then(|id| names.users.get(&id).cloned()),
            status: tx.status,
        }
    }

    async fn display_names(&self) -> ReportResult<DisplayNames> {
        let products = self
            .store
            .products()
            .all()
            .await?
            .into_iter()
            .map(|p| (p.id, (p.sku, p.name)))
            .collect();

        let mut users = HashMap::new();
        for user in self.all_users().await? {
            users.insert(user.id, user.username);
        }

        Ok(DisplayNames { products, users })
    }

    async fn all_users(&self) -> ReportResult<Vec<User>> {
        let mut users = self.store.users().vitrines().await?;
        users.extend(self.store.users().admins().await?);
        Ok(users)
    }
}

struct DisplayNames {
    products: HashMap<vitrina_types::ProductId, (String, String)>,
    users: HashMap<UserId, String>,
}

/// Date range of a journal period; CSV export covers the full history.
pub fn period_range(
    period: JournalPeriod,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let from = match period {
        JournalPeriod::All | JournalPeriod::ExportCsv => None,
        JournalPeriod::Today => now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc()),
        JournalPeriod::Week => Some(now - chrono::Duration::days(7)),
        JournalPeriod::Month => Some(now - chrono::Duration::days(30)),
    };
    (from, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_store::repos::NewTransaction;
    use vitrina_types::{ChatId, Language, ProductId, Role};

    struct Fixture {
        store: Store,
        reports: Reports,
        a: UserId,
        b: UserId,
        p: ProductId,
    }

    async fn fixture() -> Fixture {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.init_schema().await.unwrap();

        let a = store
            .users()
            .create(ChatId(1), "shop-a", Role::Vitrine, Language::Ru)
            .await
            .unwrap();
        let b = store
            .users()
            .create(ChatId(2), "shop-b", Role::Vitrine, Language::Uz)
            .await
            .unwrap();
        let p = store.products().create("SKU-1", "Widget", None).await.unwrap();

        Fixture { reports: Reports::new(store.clone()), store, a: a.id, b: b.id, p: p.id }
    }

    async fn record(
        f: &Fixture,
        kind: MovementKind,
        quantity: u32,
        from: Option<UserId>,
        to: Option<UserId>,
        status: TransactionStatus,
    ) {
        f.store
            .transactions()
            .create(NewTransaction {
                kind,
                product_id: f.p,
                quantity,
                from_vitrine_id: from,
                to_vitrine_id: to,
                admin_id: None,
                status,
                needs_confirmation: false,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn journal_totals_count_confirmed_only() {
        let f = fixture().await;
        record(&f, MovementKind::Give, 5, None, Some(f.a), TransactionStatus::Confirmed).await;
        record(&f, MovementKind::Give, 7, None, Some(f.a), TransactionStatus::Pending).await;
        record(&f, MovementKind::Sale, 2, Some(f.a), None, TransactionStatus::Confirmed).await;
        record(&f, MovementKind::Transfer, 3, Some(f.a), Some(f.b), TransactionStatus::Rejected)
            .await;

        let journal = f.reports.journal(JournalPeriod::All).await.unwrap();
        assert_eq!(journal.total, 4);
        assert_eq!(journal.lines.len(), 4);
        assert_eq!(journal.totals.given, 5);
        assert_eq!(journal.totals.sold, 2);
        assert_eq!(journal.totals.transferred, 0);
        // newest first
        assert_eq!(journal.lines[0].kind, MovementKind::Transfer);
    }

    #[tokio::test]
    async fn journal_lines_resolve_names() {
        let f = fixture().await;
        record(&f, MovementKind::Transfer, 3, Some(f.a), Some(f.b), TransactionStatus::Confirmed)
            .await;

        let journal = f.reports.journal(JournalPeriod::All).await.unwrap();
        let line = &journal.lines[0];
        assert_eq!(line.product_sku, "SKU-1");
        assert_eq!(line.product_name, "Widget");
        assert_eq!(line.from_vitrine.as_deref(), Some("shop-a"));
        assert_eq!(line.to_vitrine.as_deref(), Some("shop-b"));
    }

    #[tokio::test]
    async fn vitrine_report_sums_confirmed_movements_and_balance() {
        let f = fixture().await;
        f.store.balances().credit(f.a, f.p, 3).await.unwrap();
        record(&f, MovementKind::Give, 5, None, Some(f.a), TransactionStatus::Confirmed).await;
        record(&f, MovementKind::Sale, 2, Some(f.a), None, TransactionStatus::Confirmed).await;
        record(&f, MovementKind::Give, 9, None, Some(f.a), TransactionStatus::Rejected).await;
        record(&f, MovementKind::Transfer, 1, Some(f.b), Some(f.a), TransactionStatus::Confirmed)
            .await;

        let report = f.reports.vitrine_report(f.a).await.unwrap();
        assert_eq!(report.vitrine, "shop-a");
        assert_eq!(report.products.len(), 1);
        let summary = &report.products[0];
        assert_eq!(summary.given, 5);
        assert_eq!(summary.sold, 2);
        assert_eq!(summary.transferred_in, 1);
        assert_eq!(summary.balance, 3);
    }

    #[tokio::test]
    async fn csv_has_header_and_quoted_fields() {
        let f = fixture().await;
        f.store
            .products()
            .create("SKU-2", "Widget, deluxe \"pro\"", None)
            .await
            .unwrap();
        let deluxe = f.store.products().by_sku("SKU-2").await.unwrap().unwrap();
        f.store
            .transactions()
            .create(NewTransaction {
                kind: MovementKind::Sale,
                product_id: deluxe.id,
                quantity: 1,
                from_vitrine_id: Some(f.a),
                to_vitrine_id: None,
                admin_id: None,
                status: TransactionStatus::Confirmed,
                needs_confirmation: false,
            })
            .await
            .unwrap();

        let csv = f.reports.export_csv(JournalPeriod::All).await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date and Time,Operation Type,Product SKU,Product Name,Quantity,Sender Showcase,Receiver Showcase,Status"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("\"Widget, deluxe \"\"pro\"\"\""));
        assert!(row.ends_with("confirmed"));
    }

    #[tokio::test]
    async fn period_ranges() {
        let now = Utc::now();
        assert_eq!(period_range(JournalPeriod::All, now), (None, None));
        let (from, _) = period_range(JournalPeriod::Week, now);
        assert_eq!(from, Some(now - chrono::Duration::days(7)));
        let (from, _) = period_range(JournalPeriod::Today, now);
        assert!(from.unwrap() <= now);
    }
}
