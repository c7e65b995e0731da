//! Typed UI vocabulary
//!
//! Buttons carry a typed action plus payload; the chat adapter maps a
//! button press back to the action it was rendered with. The core never
//! matches localized button labels.

use crate::{Language, TransactionId};
use serde::{Deserialize, Serialize};

/// Main-menu entries, role-filtered by the flow controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuCommand {
    /// Product catalog (admin) / own stock (vitrine)
    Products,
    /// List registered vitrines and start a give (admin)
    Vitrines,
    /// Per-vitrine reports
    Reports,
    /// Operations journal (admin)
    Operations,
    /// Take stock back from a vitrine (admin)
    TakeProduct,
    /// Move stock between vitrines (admin)
    Transfer,
    /// Return stock to an admin (vitrine)
    Returns,
    /// Sell stock (vitrine)
    Sales,
    /// Pick a new interface language
    ChangeLanguage,
}

/// Journal period choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalPeriod {
    All,
    Today,
    Week,
    Month,
    ExportCsv,
}

/// What a rendered button does when pressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ButtonAction {
    /// Open a main-menu entry
    Menu(MenuCommand),
    /// Pick a vitrine by name in a selection step
    SelectVitrine { name: String },
    /// Pick a product by name in a selection step
    SelectProduct { name: String },
    /// Pick an interface language
    SelectLanguage(Language),
    /// Reply to a confirmation prompt
    Confirm { transaction_id: TransactionId, accept: bool },
    /// Pick a journal period
    Period(JournalPeriod),
    /// Abort the current pipeline
    BackToMain,
}
