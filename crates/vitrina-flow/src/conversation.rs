//! Per-user conversation state
//!
//! Every pipeline is a tagged union of its steps; each step carries the
//! fields collected so far, so the terminal step always works from
//! fully-typed data. State lives in process memory only and is lost on
//! restart, which at worst costs the user a restarted pipeline.

use vitrina_types::{Language, Product, User};

/// Where a user's conversation currently stands
#[derive(Debug, Clone, Default)]
pub enum Conversation {
    #[default]
    Idle,
    /// First contact: waiting for a language pick
    ChoosingLanguage,
    /// Unregistered user, language picked, waiting for the vitrine password
    AwaitingPassword { language: Language },
    Give(GiveStep),
    Take(TakeStep),
    Transfer(TransferStep),
    Return(ReturnStep),
    Sale(SaleStep),
    /// Admin picking a vitrine for a stock report
    PickingReportVitrine,
    /// Admin picking a journal period
    PickingJournalPeriod,
}

impl Conversation {
    pub fn is_idle(&self) -> bool {
        matches!(self, Conversation::Idle)
    }
}

/// Admin hands stock to a vitrine
#[derive(Debug, Clone)]
pub enum GiveStep {
    PickVitrine,
    PickProduct { vitrine: User },
    EnterQuantity { vitrine: User, product: Product },
}

/// Admin takes stock back from a vitrine
#[derive(Debug, Clone)]
pub enum TakeStep {
    PickVitrine,
    PickProduct { vitrine: User },
    EnterQuantity { vitrine: User, product: Product, available: u32 },
}

/// Admin moves stock between two vitrines
#[derive(Debug, Clone)]
pub enum TransferStep {
    PickSource,
    PickProduct { source: User },
    PickTarget { source: User, product: Product, available: u32 },
    EnterQuantity { source: User, product: Product, available: u32, target: User },
}

/// Vitrine sends stock back to an admin
#[derive(Debug, Clone)]
pub enum ReturnStep {
    PickProduct,
    EnterQuantity { product: Product, available: u32 },
}

/// Vitrine sells stock
#[derive(Debug, Clone)]
pub enum SaleStep {
    PickProduct,
    EnterQuantity { product: Product, available: u32 },
}
