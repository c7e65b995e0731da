//! Vitrina Conversation Flow Controller
//!
//! Turns inbound chat events into replies and side effects. One
//! [`Conversation`] per chat id, held in a [`DashMap`]; each inbound
//! action is dispatched against the user's role and current pipeline
//! step.
//!
//! Inbound is typed: the chat adapter maps button presses back to the
//! [`ButtonAction`] they were rendered with, so the controller never
//! matches localized labels. Free text is meaningful only where a step
//! expects it (names, quantities, the registration password).
//!
//! Every handler failure is caught here: the user gets a generic error
//! message in their language and the failure goes on the audit trail, so
//! one bad message never takes the dispatch loop down.

pub mod conversation;
pub mod error;
pub mod keyboards;
mod pipelines;
mod render;

pub use conversation::Conversation;
pub use error::{FlowError, FlowResult};

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, info};
use vitrina_audit::{AuditEntry, AuditSink};
use vitrina_confirm::{ConfirmError, ConfirmationWorkflow, ReplyOutcome};
use vitrina_delivery::{Delivery, Outgoing};
use vitrina_engine::{Engine, EngineError};
use vitrina_i18n::Localizer;
use vitrina_reports::Reports;
use vitrina_store::Store;
use vitrina_types::{
    ButtonAction, ChatId, JournalPeriod, Language, MenuCommand, Role, TransactionId, User,
};

use conversation::{GiveStep, ReturnStep, SaleStep, TakeStep, TransferStep};

/// A decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// First contact or an explicit restart
    Start,
    /// A button press, mapped back to the action it was rendered with
    Button(ButtonAction),
    /// Free text
    Text(String),
}

/// Static flow configuration from the service binary
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Chat ids that register (and act) as admins
    pub admin_chat_ids: Vec<ChatId>,
    /// Password gating vitrine self-registration
    pub vitrine_password: String,
}

impl FlowConfig {
    fn is_admin_chat(&self, chat_id: ChatId) -> bool {
        self.admin_chat_ids.contains(&chat_id)
    }
}

pub struct FlowController {
    pub(crate) store: Store,
    pub(crate) engine: Engine,
    pub(crate) confirm: ConfirmationWorkflow,
    pub(crate) reports: Reports,
    pub(crate) localizer: Arc<Localizer>,
    pub(crate) delivery: Arc<dyn Delivery>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) config: FlowConfig,
    pub(crate) conversations: DashMap<ChatId, Conversation>,
}

impl FlowController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        engine: Engine,
        confirm: ConfirmationWorkflow,
        reports: Reports,
        localizer: Arc<Localizer>,
        delivery: Arc<dyn Delivery>,
        audit: Arc<dyn AuditSink>,
        config: FlowConfig,
    ) -> Self {
        Self {
            store,
            engine,
            confirm,
            reports,
            localizer,
            delivery,
            audit,
            config,
            conversations: DashMap::new(),
        }
    }

    /// Handle one inbound event; returns the replies for the sender.
    ///
    /// Side notifications (counterparty prompts, admin broadcasts) go out
    /// through the delivery seam directly.
    pub async fn handle(&self, chat_id: ChatId, username: &str, action: Action) -> Vec<Outgoing> {
        match self.handle_inner(chat_id, username, action).await {
            Ok(replies) => replies,
            Err(e) => {
                error!(chat_id = chat_id.as_i64(), error = %e, "handler failed");
                self.audit
                    .record(AuditEntry::error(Some(chat_id), "flow", e.to_string()))
                    .await;

                let language = self.language_of(chat_id).await;
                vec![Outgoing::text(self.t("error_occurred", language))]
            }
        }
    }

    async fn handle_inner(
        &self,
        chat_id: ChatId,
        username: &str,
        action: Action,
    ) -> FlowResult<Vec<Outgoing>> {
        match self.store.users().by_chat_id(chat_id).await? {
            None => self.onboard(chat_id, username, action).await,
            Some(user) => self.dispatch(user, action).await,
        }
    }

    // ---- onboarding ----------------------------------------------------

    async fn onboard(
        &self,
        chat_id: ChatId,
        username: &str,
        action: Action,
    ) -> FlowResult<Vec<Outgoing>> {
        let default = self.localizer.default_language();
        let state = self.state(chat_id);

        match (state, action) {
            (Conversation::ChoosingLanguage, Action::Button(ButtonAction::SelectLanguage(language))) => {
                if self.config.is_admin_chat(chat_id) {
                    let user = self
                        .store
                        .users()
                        .create(chat_id, &display_name(username, chat_id), Role::Admin, language)
                        .await?;
                    self.clear(chat_id);
                    info!(chat_id = chat_id.as_i64(), "admin registered");
                    Ok(vec![Outgoing::with_keyboard(
                        self.t("welcome_admin", language),
                        keyboards::main_menu(&self.localizer, language, user.role),
                    )])
                } else {
                    self.set(chat_id, Conversation::AwaitingPassword { language });
                    Ok(vec![Outgoing::text(self.t("enter_password", language))])
                }
            }
            (Conversation::ChoosingLanguage, _) => Ok(vec![Outgoing::with_keyboard(
                self.t("choose_language_from_list", default),
                keyboards::languages(),
            )]),
            (Conversation::AwaitingPassword { language }, Action::Text(password)) => {
                if password.trim() == self.config.vitrine_password {
                    let user = self
                        .store
                        .users()
                        .create(chat_id, &display_name(username, chat_id), Role::Vitrine, language)
                        .await?;
                    self.clear(chat_id);
                    info!(chat_id = chat_id.as_i64(), username = %user.username, "vitrine registered");
                    Ok(vec![Outgoing::with_keyboard(
                        self.t("welcome_vitrine", language),
                        keyboards::main_menu(&self.localizer, language, user.role),
                    )])
                } else {
                    Ok(vec![Outgoing::text(self.t("wrong_password", language))])
                }
            }
            (Conversation::AwaitingPassword { language }, _) => {
                Ok(vec![Outgoing::text(self.t("enter_password", language))])
            }
            // first contact, whatever the action was
            _ => {
                self.set(chat_id, Conversation::ChoosingLanguage);
                Ok(vec![Outgoing::with_keyboard(
                    self.t("welcome_choose_language", default),
                    keyboards::languages(),
                )])
            }
        }
    }

    // ---- registered users ----------------------------------------------

    async fn dispatch(&self, user: User, action: Action) -> FlowResult<Vec<Outgoing>> {
        match action {
            Action::Start => {
                self.clear(user.chat_id);
                Ok(vec![self.menu_reply(&user, "welcome_back")])
            }
            Action::Button(ButtonAction::BackToMain) => {
                self.clear(user.chat_id);
                Ok(vec![self.menu_reply(&user, "main_menu")])
            }
            Action::Button(ButtonAction::SelectLanguage(language)) => {
                self.store.users().set_language(user.id, language).await?;
                self.clear(user.chat_id);
                Ok(vec![Outgoing::with_keyboard(
                    self.t("language_changed", language),
                    keyboards::main_menu(&self.localizer, language, user.role),
                )])
            }
            Action::Button(ButtonAction::Confirm { transaction_id, accept }) => {
                self.handle_confirm_reply(&user, transaction_id, accept).await
            }
            Action::Button(ButtonAction::Menu(command)) => self.start_command(&user, command).await,
            Action::Button(ButtonAction::Period(period)) => self.handle_period(&user, period).await,
            Action::Button(ButtonAction::SelectVitrine { name })
            | Action::Button(ButtonAction::SelectProduct { name }) => {
                self.advance(&user, &name).await
            }
            Action::Text(text) => self.advance(&user, text.trim()).await,
        }
    }

    async fn start_command(&self, user: &User, command: MenuCommand) -> FlowResult<Vec<Outgoing>> {
        // starting a command abandons any pipeline in progress
        self.clear(user.chat_id);

        match (user.role, command) {
            (_, MenuCommand::ChangeLanguage) => Ok(vec![Outgoing::with_keyboard(
                self.t("choose_language", user.language),
                keyboards::languages(),
            )]),
            (Role::Admin, MenuCommand::Products) => self.list_catalog(user).await,
            (Role::Vitrine, MenuCommand::Products) => self.list_own_stock(user).await,
            (Role::Admin, MenuCommand::Vitrines) => {
                self.begin_vitrine_selection(
                    user,
                    Conversation::Give(GiveStep::PickVitrine),
                    "select_vitrine",
                )
                .await
            }
            (Role::Admin, MenuCommand::TakeProduct) => {
                self.begin_vitrine_selection(
                    user,
                    Conversation::Take(TakeStep::PickVitrine),
                    "select_vitrine_for_take",
                )
                .await
            }
            (Role::Admin, MenuCommand::Transfer) => {
                self.begin_vitrine_selection(
                    user,
                    Conversation::Transfer(TransferStep::PickSource),
                    "select_sender_vitrine",
                )
                .await
            }
            (Role::Admin, MenuCommand::Reports) => {
                self.begin_vitrine_selection(
                    user,
                    Conversation::PickingReportVitrine,
                    "select_vitrine",
                )
                .await
            }
            (Role::Vitrine, MenuCommand::Reports) => {
                let report = self.reports.vitrine_report(user.id).await?;
                Ok(vec![Outgoing::with_keyboard(
                    render::vitrine_report(&self.localizer, user.language, &report),
                    keyboards::main_menu(&self.localizer, user.language, user.role),
                )])
            }
            (Role::Admin, MenuCommand::Operations) => {
                self.set(user.chat_id, Conversation::PickingJournalPeriod);
                Ok(vec![Outgoing::with_keyboard(
                    self.t("select_period", user.language),
                    keyboards::periods(&self.localizer, user.language),
                )])
            }
            (Role::Vitrine, MenuCommand::Returns) => {
                self.begin_own_product_selection(
                    user,
                    Conversation::Return(ReturnStep::PickProduct),
                    "no_products_for_return",
                )
                .await
            }
            (Role::Vitrine, MenuCommand::Sales) => {
                self.begin_own_product_selection(
                    user,
                    Conversation::Sale(SaleStep::PickProduct),
                    "no_products_for_sale",
                )
                .await
            }
            // a command outside the user's role falls back to the menu
            _ => Ok(vec![self.menu_reply(user, "main_menu")]),
        }
    }

    async fn handle_confirm_reply(
        &self,
        user: &User,
        transaction_id: TransactionId,
        accept: bool,
    ) -> FlowResult<Vec<Outgoing>> {
        match self.confirm.process_reply(user, transaction_id, accept).await {
            Ok(ReplyOutcome::Confirmed { .. }) => {
                Ok(vec![self.menu_reply(user, "operation_confirmed")])
            }
            Ok(ReplyOutcome::Rejected) => Ok(vec![self.menu_reply(user, "operation_rejected")]),
            Ok(ReplyOutcome::AlreadyProcessed) => {
                Ok(vec![Outgoing::text(self.t("already_processed", user.language))])
            }
            Err(ConfirmError::Engine(EngineError::InsufficientStock { available, requested })) => {
                Ok(vec![Outgoing::text(self.tw(
                    "not_enough_products",
                    user.language,
                    &[
                        ("available", available.to_string()),
                        ("requested", requested.to_string()),
                    ],
                ))])
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_period(&self, user: &User, period: JournalPeriod) -> FlowResult<Vec<Outgoing>> {
        if !matches!(self.state(user.chat_id), Conversation::PickingJournalPeriod) {
            return Ok(vec![self.menu_reply(user, "main_menu")]);
        }
        self.clear(user.chat_id);

        if period == JournalPeriod::ExportCsv {
            let csv = self.reports.export_csv(period).await?;
            return Ok(vec![
                Outgoing::text(csv),
                self.menu_reply(user, "main_menu"),
            ]);
        }

        let journal = self.reports.journal(period).await?;
        Ok(vec![Outgoing::with_keyboard(
            render::journal(&self.localizer, user.language, &journal, period),
            keyboards::main_menu(&self.localizer, user.language, user.role),
        )])
    }

    // ---- listings ------------------------------------------------------

    async fn list_catalog(&self, user: &User) -> FlowResult<Vec<Outgoing>> {
        let products = self.store.products().all().await?;
        if products.is_empty() {
            return Ok(vec![Outgoing::text(self.t("no_products", user.language))]);
        }

        let mut text = self.t("products_list", user.language);
        for product in products {
            text.push_str(&format!("\n- {} ({})", product.name, product.sku));
        }
        Ok(vec![Outgoing::with_keyboard(
            text,
            keyboards::main_menu(&self.localizer, user.language, user.role),
        )])
    }

    async fn list_own_stock(&self, user: &User) -> FlowResult<Vec<Outgoing>> {
        let stock = self.stocked_products(user.id).await?;
        if stock.is_empty() {
            return Ok(vec![Outgoing::text(self.t("no_products", user.language))]);
        }

        let pcs = self.t("pcs", user.language);
        let mut text = self.t("my_products", user.language);
        for (product, quantity) in stock {
            text.push_str(&format!("\n- {}: {} {}", product.name, quantity, pcs));
        }
        Ok(vec![Outgoing::with_keyboard(
            text,
            keyboards::main_menu(&self.localizer, user.language, user.role),
        )])
    }

    // ---- shared helpers ------------------------------------------------

    pub(crate) fn t(&self, key: &str, language: Language) -> String {
        self.localizer.text(key, language)
    }

    pub(crate) fn tw(&self, key: &str, language: Language, params: &[(&str, String)]) -> String {
        self.localizer.text_with(key, language, params)
    }

    pub(crate) fn state(&self, chat_id: ChatId) -> Conversation {
        self.conversations
            .get(&chat_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub(crate) fn set(&self, chat_id: ChatId, state: Conversation) {
        self.conversations.insert(chat_id, state);
    }

    pub(crate) fn clear(&self, chat_id: ChatId) {
        self.conversations.remove(&chat_id);
    }

    pub(crate) fn menu_reply(&self, user: &User, key: &str) -> Outgoing {
        Outgoing::with_keyboard(
            self.t(key, user.language),
            keyboards::main_menu(&self.localizer, user.language, user.role),
        )
    }

    async fn language_of(&self, chat_id: ChatId) -> Language {
        match self.store.users().by_chat_id(chat_id).await {
            Ok(Some(user)) => user.language,
            _ => self.localizer.default_language(),
        }
    }

    /// Products a vitrine has on hand, with quantities
    pub(crate) async fn stocked_products(
        &self,
        vitrine: vitrina_types::UserId,
    ) -> FlowResult<Vec<(vitrina_types::Product, u32)>> {
        let balances = self.store.balances().with_stock(vitrine).await?;
        let mut stock = Vec::with_capacity(balances.len());
        for balance in balances {
            if let Some(product) = self.store.products().by_id(balance.product_id).await? {
                stock.push((product, balance.quantity));
            }
        }
        Ok(stock)
    }

    async fn begin_vitrine_selection(
        &self,
        user: &User,
        state: Conversation,
        prompt_key: &str,
    ) -> FlowResult<Vec<Outgoing>> {
        let vitrines = self.store.users().vitrines().await?;
        if vitrines.is_empty() {
            return Ok(vec![self.menu_reply(user, "no_vitrines")]);
        }

        self.set(user.chat_id, state);
        let names: Vec<String> = vitrines.into_iter().map(|v| v.username).collect();
        Ok(vec![Outgoing::with_keyboard(
            self.t(prompt_key, user.language),
            keyboards::vitrines(&self.localizer, user.language, &names),
        )])
    }

    async fn begin_own_product_selection(
        &self,
        user: &User,
        state: Conversation,
        empty_key: &str,
    ) -> FlowResult<Vec<Outgoing>> {
        let stock = self.stocked_products(user.id).await?;
        if stock.is_empty() {
            return Ok(vec![self.menu_reply(user, empty_key)]);
        }

        self.set(user.chat_id, state);
        let names: Vec<String> = stock.into_iter().map(|(p, _)| p.name).collect();
        Ok(vec![Outgoing::with_keyboard(
            self.t("select_product", user.language),
            keyboards::products(&self.localizer, user.language, &names),
        )])
    }
}

fn display_name(username: &str, chat_id: ChatId) -> String {
    if username.trim().is_empty() {
        format!("user_{}", chat_id.as_i64())
    } else {
        username.trim().to_string()
    }
}
