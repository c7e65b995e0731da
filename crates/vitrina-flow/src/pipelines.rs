//! Pipeline step advancement
//!
//! Selection steps resolve the input against known entity names and
//! re-prompt on a miss; quantity steps parse and bound-check the input.
//! A finished pipeline always clears the conversation and hands the user
//! back the main menu.

use tracing::warn;
use vitrina_confirm::ConfirmError;
use vitrina_delivery::{Keyboard, Outgoing};
use vitrina_engine::{CreatedMovement, EngineError, MovementRequest};
use vitrina_types::{
    parse_quantity, Language, MovementKind, Product, QuantityError, User, UserId,
};

use crate::conversation::{Conversation, GiveStep, ReturnStep, SaleStep, TakeStep, TransferStep};
use crate::{keyboards, FlowController, FlowResult};

impl FlowController {
    /// Feed a name or free-text input into the current pipeline step
    pub(crate) async fn advance(&self, user: &User, input: &str) -> FlowResult<Vec<Outgoing>> {
        match self.state(user.chat_id) {
            Conversation::Idle => Ok(vec![self.menu_reply(user, "main_menu")]),
            Conversation::ChoosingLanguage | Conversation::AwaitingPassword { .. } => {
                // a registered user has no business in onboarding states
                self.clear(user.chat_id);
                Ok(vec![self.menu_reply(user, "main_menu")])
            }
            Conversation::Give(step) => self.advance_give(user, step, input).await,
            Conversation::Take(step) => self.advance_take(user, step, input).await,
            Conversation::Transfer(step) => self.advance_transfer(user, step, input).await,
            Conversation::Return(step) => self.advance_return(user, step, input).await,
            Conversation::Sale(step) => self.advance_sale(user, step, input).await,
            Conversation::PickingReportVitrine => self.finish_report(user, input).await,
            Conversation::PickingJournalPeriod => Ok(vec![Outgoing::with_keyboard(
                self.t("select_period_from_list", user.language),
                keyboards::periods(&self.localizer, user.language),
            )]),
        }
    }

    // ---- give ----------------------------------------------------------

    async fn advance_give(
        &self,
        user: &User,
        step: GiveStep,
        input: &str,
    ) -> FlowResult<Vec<Outgoing>> {
        match step {
            GiveStep::PickVitrine => {
                let Some(vitrine) = self.find_vitrine(input).await? else {
                    return Ok(vec![Outgoing::with_keyboard(
                        self.t("vitrine_not_found", user.language),
                        self.vitrine_keyboard(user.language).await?,
                    )]);
                };
                self.set(user.chat_id, Conversation::Give(GiveStep::PickProduct { vitrine }));
                Ok(vec![Outgoing::with_keyboard(
                    self.t("select_product", user.language),
                    self.catalog_keyboard(user.language).await?,
                )])
            }
            GiveStep::PickProduct { vitrine } => {
                let Some(product) = self.find_product(input).await? else {
                    return Ok(vec![Outgoing::with_keyboard(
                        self.t("product_not_found", user.language),
                        self.catalog_keyboard(user.language).await?,
                    )]);
                };
                self.set(
                    user.chat_id,
                    Conversation::Give(GiveStep::EnterQuantity { vitrine, product }),
                );
                Ok(vec![Outgoing::with_keyboard(
                    self.t("enter_quantity", user.language),
                    keyboards::back_only(&self.localizer, user.language),
                )])
            }
            GiveStep::EnterQuantity { vitrine, product } => {
                let quantity = match parse_quantity(input) {
                    Ok(q) => q,
                    Err(e) => return Ok(vec![self.quantity_reprompt(user.language, e)]),
                };

                let created = self
                    .engine
                    .create_movement(
                        MovementRequest {
                            kind: MovementKind::Give,
                            product_id: product.id,
                            quantity,
                            from_vitrine_id: None,
                            to_vitrine_id: Some(vitrine.id),
                        },
                        user.id,
                    )
                    .await?;

                self.clear(user.chat_id);
                let key = match self.confirm.request_confirmation(&created.transaction).await {
                    Ok(true) => "give_request_sent",
                    Ok(false) => "confirmation_error",
                    Err(ConfirmError::CounterpartyUnavailable) => "admins_unavailable",
                    Err(e) => return Err(e.into()),
                };
                Ok(vec![self.menu_reply(user, key)])
            }
        }
    }

    // ---- take ----------------------------------------------------------

    async fn advance_take(
        &self,
        user: &User,
        step: TakeStep,
        input: &str,
    ) -> FlowResult<Vec<Outgoing>> {
        match step {
            TakeStep::PickVitrine => {
                let Some(vitrine) = self.find_vitrine(input).await? else {
                    return Ok(vec![Outgoing::with_keyboard(
                        self.t("vitrine_not_found", user.language),
                        self.vitrine_keyboard(user.language).await?,
                    )]);
                };
                let stock = self.stocked_products(vitrine.id).await?;
                if stock.is_empty() {
                    self.clear(user.chat_id);
                    return Ok(vec![self.menu_reply(user, "no_products")]);
                }
                let keyboard = self.stock_keyboard(&stock, user.language);
                self.set(user.chat_id, Conversation::Take(TakeStep::PickProduct { vitrine }));
                Ok(vec![Outgoing::with_keyboard(
                    self.t("select_product", user.language),
                    keyboard,
                )])
            }
            TakeStep::PickProduct { vitrine } => {
                match self.find_stocked_product(vitrine.id, input).await? {
                    Some((product, available)) => {
                        let prompt = self.tw(
                            "quantity_range_prompt",
                            user.language,
                            &[
                                ("product", product.name.clone()),
                                ("available", available.to_string()),
                            ],
                        );
                        self.set(
                            user.chat_id,
                            Conversation::Take(TakeStep::EnterQuantity {
                                vitrine,
                                product,
                                available,
                            }),
                        );
                        Ok(vec![Outgoing::with_keyboard(
                            prompt,
                            keyboards::back_only(&self.localizer, user.language),
                        )])
                    }
                    None => {
                        let stock = self.stocked_products(vitrine.id).await?;
                        let keyboard = self.stock_keyboard(&stock, user.language);
                        Ok(vec![Outgoing::with_keyboard(
                            self.t("product_not_found", user.language),
                            keyboard,
                        )])
                    }
                }
            }
            TakeStep::EnterQuantity { vitrine, product, available: _ } => {
                let quantity = match parse_quantity(input) {
                    Ok(q) => q,
                    Err(e) => return Ok(vec![self.quantity_reprompt(user.language, e)]),
                };

                let created = match self
                    .engine
                    .create_movement(
                        MovementRequest {
                            kind: MovementKind::Take,
                            product_id: product.id,
                            quantity,
                            from_vitrine_id: Some(vitrine.id),
                            to_vitrine_id: None,
                        },
                        user.id,
                    )
                    .await
                {
                    Ok(created) => created,
                    Err(EngineError::InsufficientStock { available, requested }) => {
                        return Ok(vec![self.insufficient_reprompt(user.language, available, requested)]);
                    }
                    Err(e) => return Err(e.into()),
                };

                let balance = created.new_source_balance.unwrap_or(0);
                self.notify_vitrine_of_take(user, &vitrine, &product, quantity, balance).await;

                self.clear(user.chat_id);
                let text = self.tw(
                    "take_completed",
                    user.language,
                    &[
                        ("vitrine", vitrine.username),
                        ("product", product.name),
                        ("quantity", quantity.to_string()),
                        ("balance", balance.to_string()),
                    ],
                );
                Ok(vec![Outgoing::with_keyboard(
                    text,
                    keyboards::main_menu(&self.localizer, user.language, user.role),
                )])
            }
        }
    }

    // ---- transfer ------------------------------------------------------

    async fn advance_transfer(
        &self,
        user: &User,
        step: TransferStep,
        input: &str,
    ) -> FlowResult<Vec<Outgoing>> {
        match step {
            TransferStep::PickSource => {
                let Some(source) = self.find_vitrine(input).await? else {
                    return Ok(vec![Outgoing::with_keyboard(
                        self.t("vitrine_not_found", user.language),
                        self.vitrine_keyboard(user.language).await?,
                    )]);
                };
                let stock = self.stocked_products(source.id).await?;
                if stock.is_empty() {
                    self.clear(user.chat_id);
                    return Ok(vec![self.menu_reply(user, "no_products_for_transfer")]);
                }
                let keyboard = self.stock_keyboard(&stock, user.language);
                self.set(user.chat_id, Conversation::Transfer(TransferStep::PickProduct { source }));
                Ok(vec![Outgoing::with_keyboard(
                    self.t("select_product", user.language),
                    keyboard,
                )])
            }
            TransferStep::PickProduct { source } => {
                match self.find_stocked_product(source.id, input).await? {
                    Some((product, available)) => {
                        let targets = self.store.users().vitrines_except(source.id).await?;
                        if targets.is_empty() {
                            self.clear(user.chat_id);
                            return Ok(vec![self.menu_reply(user, "no_other_vitrines")]);
                        }
                        let names: Vec<String> =
                            targets.into_iter().map(|v| v.username).collect();
                        self.set(
                            user.chat_id,
                            Conversation::Transfer(TransferStep::PickTarget {
                                source,
                                product,
                                available,
                            }),
                        );
                        Ok(vec![Outgoing::with_keyboard(
                            self.t("select_receiver_vitrine", user.language),
                            keyboards::vitrines(&self.localizer, user.language, &names),
                        )])
                    }
                    None => {
                        let stock = self.stocked_products(source.id).await?;
                        let keyboard = self.stock_keyboard(&stock, user.language);
                        Ok(vec![Outgoing::with_keyboard(
                            self.t("product_not_found", user.language),
                            keyboard,
                        )])
                    }
                }
            }
            TransferStep::PickTarget { source, product, available } => {
                let target = self.find_vitrine(input).await?;
                let target = match target {
                    Some(t) if t.id != source.id => t,
                    _ => {
                        let targets = self.store.users().vitrines_except(source.id).await?;
                        let names: Vec<String> =
                            targets.into_iter().map(|v| v.username).collect();
                        return Ok(vec![Outgoing::with_keyboard(
                            self.t("vitrine_not_found", user.language),
                            keyboards::vitrines(&self.localizer, user.language, &names),
                        )]);
                    }
                };

                let prompt = self.tw(
                    "quantity_range_prompt",
                    user.language,
                    &[
                        ("product", product.name.clone()),
                        ("available", available.to_string()),
                    ],
                );
                self.set(
                    user.chat_id,
                    Conversation::Transfer(TransferStep::EnterQuantity {
                        source,
                        product,
                        available,
                        target,
                    }),
                );
                Ok(vec![Outgoing::with_keyboard(
                    prompt,
                    keyboards::back_only(&self.localizer, user.language),
                )])
            }
            TransferStep::EnterQuantity { source, product, target, .. } => {
                let quantity = match parse_quantity(input) {
                    Ok(q) => q,
                    Err(e) => return Ok(vec![self.quantity_reprompt(user.language, e)]),
                };

                let created = match self
                    .engine
                    .create_movement(
                        MovementRequest {
                            kind: MovementKind::Transfer,
                            product_id: product.id,
                            quantity,
                            from_vitrine_id: Some(source.id),
                            to_vitrine_id: Some(target.id),
                        },
                        user.id,
                    )
                    .await
                {
                    Ok(created) => created,
                    Err(EngineError::InsufficientStock { available, requested }) => {
                        return Ok(vec![self.insufficient_reprompt(user.language, available, requested)]);
                    }
                    Err(e) => return Err(e.into()),
                };

                self.clear(user.chat_id);
                let key = match self.confirm.request_confirmation(&created.transaction).await {
                    Ok(true) => "transfer_request_sent",
                    Ok(false) => "confirmation_error",
                    Err(ConfirmError::CounterpartyUnavailable) => "admins_unavailable",
                    Err(e) => return Err(e.into()),
                };
                Ok(vec![self.menu_reply(user, key)])
            }
        }
    }

    // ---- return --------------------------------------------------------

    async fn advance_return(
        &self,
        user: &User,
        step: ReturnStep,
        input: &str,
    ) -> FlowResult<Vec<Outgoing>> {
        match step {
            ReturnStep::PickProduct => {
                match self.pick_own_product(user, input).await? {
                    PickOutcome::Picked(product, available) => {
                        let reply = self.quantity_range_reply(user, &product.name, available);
                        self.set(
                            user.chat_id,
                            Conversation::Return(ReturnStep::EnterQuantity { product, available }),
                        );
                        Ok(vec![reply])
                    }
                    PickOutcome::Replies(replies) => Ok(replies),
                }
            }
            ReturnStep::EnterQuantity { product, available: _ } => {
                let quantity = match parse_quantity(input) {
                    Ok(q) => q,
                    Err(e) => return Ok(vec![self.quantity_reprompt(user.language, e)]),
                };

                let created = match self
                    .engine
                    .create_movement(
                        MovementRequest {
                            kind: MovementKind::Return,
                            product_id: product.id,
                            quantity,
                            from_vitrine_id: Some(user.id),
                            to_vitrine_id: None,
                        },
                        user.id,
                    )
                    .await
                {
                    Ok(created) => created,
                    Err(EngineError::InsufficientStock { available, requested }) => {
                        return Ok(vec![self.insufficient_reprompt(user.language, available, requested)]);
                    }
                    Err(e) => return Err(e.into()),
                };

                self.clear(user.chat_id);
                match self.confirm.request_confirmation(&created.transaction).await {
                    Ok(true) => {
                        let text = self.tw(
                            "return_request_sent",
                            user.language,
                            &[
                                ("product", product.name),
                                ("quantity", quantity.to_string()),
                            ],
                        );
                        Ok(vec![Outgoing::with_keyboard(
                            text,
                            keyboards::main_menu(&self.localizer, user.language, user.role),
                        )])
                    }
                    Ok(false) => Ok(vec![self.menu_reply(user, "confirmation_error")]),
                    Err(ConfirmError::CounterpartyUnavailable) => {
                        Ok(vec![self.menu_reply(user, "admins_unavailable")])
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    // ---- sale ----------------------------------------------------------

    async fn advance_sale(
        &self,
        user: &User,
        step: SaleStep,
        input: &str,
    ) -> FlowResult<Vec<Outgoing>> {
        match step {
            SaleStep::PickProduct => {
                match self.pick_own_product(user, input).await? {
                    PickOutcome::Picked(product, available) => {
                        let reply = self.quantity_range_reply(user, &product.name, available);
                        self.set(
                            user.chat_id,
                            Conversation::Sale(SaleStep::EnterQuantity { product, available }),
                        );
                        Ok(vec![reply])
                    }
                    PickOutcome::Replies(replies) => Ok(replies),
                }
            }
            SaleStep::EnterQuantity { product, available: _ } => {
                let quantity = match parse_quantity(input) {
                    Ok(q) => q,
                    Err(e) => return Ok(vec![self.quantity_reprompt(user.language, e)]),
                };

                let created: CreatedMovement = match self
                    .engine
                    .create_movement(
                        MovementRequest {
                            kind: MovementKind::Sale,
                            product_id: product.id,
                            quantity,
                            from_vitrine_id: Some(user.id),
                            to_vitrine_id: None,
                        },
                        user.id,
                    )
                    .await
                {
                    Ok(created) => created,
                    Err(EngineError::InsufficientStock { available, requested }) => {
                        return Ok(vec![self.insufficient_reprompt(user.language, available, requested)]);
                    }
                    Err(e) => return Err(e.into()),
                };

                let balance = created.new_source_balance.unwrap_or(0);
                self.broadcast_sale(user, &product, quantity, balance).await?;

                self.clear(user.chat_id);
                let text = self.tw(
                    "sale_registered",
                    user.language,
                    &[
                        ("product", product.name),
                        ("quantity", quantity.to_string()),
                        ("balance", balance.to_string()),
                    ],
                );
                Ok(vec![Outgoing::with_keyboard(
                    text,
                    keyboards::main_menu(&self.localizer, user.language, user.role),
                )])
            }
        }
    }

    // ---- report --------------------------------------------------------

    async fn finish_report(&self, user: &User, input: &str) -> FlowResult<Vec<Outgoing>> {
        let Some(vitrine) = self.find_vitrine(input).await? else {
            return Ok(vec![Outgoing::with_keyboard(
                self.t("vitrine_not_found", user.language),
                self.vitrine_keyboard(user.language).await?,
            )]);
        };

        self.clear(user.chat_id);
        let report = self.reports.vitrine_report(vitrine.id).await?;
        Ok(vec![Outgoing::with_keyboard(
            crate::render::vitrine_report(&self.localizer, user.language, &report),
            keyboards::main_menu(&self.localizer, user.language, user.role),
        )])
    }

    // ---- notifications -------------------------------------------------

    /// Tell the vitrine that an admin just took stock from it.
    /// Best-effort: the take is already applied either way.
    async fn notify_vitrine_of_take(
        &self,
        admin: &User,
        vitrine: &User,
        product: &Product,
        quantity: u32,
        balance: u32,
    ) {
        let text = self.tw(
            "admin_took_product",
            vitrine.language,
            &[
                ("admin", admin.username.clone()),
                ("product", product.name.clone()),
                ("quantity", quantity.to_string()),
                ("balance", balance.to_string()),
            ],
        );
        if !self.delivery.send(vitrine.chat_id, Outgoing::text(text)).await {
            warn!(vitrine = %vitrine.username, "take notification undelivered");
        }
    }

    /// Tell every admin about a sale, each in their own language. One
    /// failed delivery does not stop the rest.
    async fn broadcast_sale(
        &self,
        vitrine: &User,
        product: &Product,
        quantity: u32,
        balance: u32,
    ) -> FlowResult<()> {
        for admin in self.store.users().admins().await? {
            let text = self.tw(
                "vitrine_sold_product",
                admin.language,
                &[
                    ("vitrine", vitrine.username.clone()),
                    ("product", product.name.clone()),
                    ("quantity", quantity.to_string()),
                    ("balance", balance.to_string()),
                ],
            );
            if !self.delivery.send(admin.chat_id, Outgoing::text(text)).await {
                warn!(admin = %admin.username, "sale notification undelivered");
            }
        }
        Ok(())
    }

    // ---- step helpers --------------------------------------------------

    async fn find_vitrine(&self, name: &str) -> FlowResult<Option<User>> {
        Ok(self.store.users().vitrine_by_username(name).await?)
    }

    async fn find_product(&self, name: &str) -> FlowResult<Option<Product>> {
        Ok(self.store.products().by_name(name).await?)
    }

    /// A product the vitrine actually has on hand, with its quantity
    async fn find_stocked_product(
        &self,
        vitrine: UserId,
        name: &str,
    ) -> FlowResult<Option<(Product, u32)>> {
        let Some(product) = self.find_product(name).await? else {
            return Ok(None);
        };
        let available = self.store.balances().quantity(vitrine, product.id).await?;
        if available == 0 {
            return Ok(None);
        }
        Ok(Some((product, available)))
    }

    /// Resolve a product pick against the user's own stock; a miss keeps
    /// the current step and re-prompts.
    async fn pick_own_product(&self, user: &User, input: &str) -> FlowResult<PickOutcome> {
        match self.find_stocked_product(user.id, input).await? {
            Some((product, available)) => Ok(PickOutcome::Picked(product, available)),
            None => {
                let stock = self.stocked_products(user.id).await?;
                let keyboard = self.stock_keyboard(&stock, user.language);
                Ok(PickOutcome::Replies(vec![Outgoing::with_keyboard(
                    self.t("product_not_found", user.language),
                    keyboard,
                )]))
            }
        }
    }

    fn quantity_range_reply(&self, user: &User, product_name: &str, available: u32) -> Outgoing {
        let prompt = self.tw(
            "quantity_range_prompt",
            user.language,
            &[
                ("product", product_name.to_string()),
                ("available", available.to_string()),
            ],
        );
        Outgoing::with_keyboard(prompt, keyboards::back_only(&self.localizer, user.language))
    }

    fn quantity_reprompt(&self, language: Language, error: QuantityError) -> Outgoing {
        let key = match error {
            QuantityError::NotANumber => "quantity_error",
            QuantityError::NotPositive => "quantity_positive_error",
            QuantityError::TooLarge => "quantity_max_error",
        };
        Outgoing::with_keyboard(self.t(key, language), keyboards::back_only(&self.localizer, language))
    }

    fn insufficient_reprompt(&self, language: Language, available: u32, requested: u32) -> Outgoing {
        Outgoing::with_keyboard(
            self.tw(
                "not_enough_products",
                language,
                &[
                    ("available", available.to_string()),
                    ("requested", requested.to_string()),
                ],
            ),
            keyboards::back_only(&self.localizer, language),
        )
    }

    async fn vitrine_keyboard(&self, language: Language) -> FlowResult<Keyboard> {
        let names: Vec<String> = self
            .store
            .users()
            .vitrines()
            .await?
            .into_iter()
            .map(|v| v.username)
            .collect();
        Ok(keyboards::vitrines(&self.localizer, language, &names))
    }

    async fn catalog_keyboard(&self, language: Language) -> FlowResult<Keyboard> {
        let names: Vec<String> = self
            .store
            .products()
            .all()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        Ok(keyboards::products(&self.localizer, language, &names))
    }

    fn stock_keyboard(&self, stock: &[(Product, u32)], language: Language) -> Keyboard {
        let names: Vec<String> = stock.iter().map(|(p, _)| p.name.clone()).collect();
        keyboards::products(&self.localizer, language, &names)
    }
}

enum PickOutcome {
    Picked(Product, u32),
    Replies(Vec<Outgoing>),
}
